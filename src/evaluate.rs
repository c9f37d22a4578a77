use std::borrow::Cow;

use crate::{BinaryOp, CompareOp, Context, EvalError, Expr, Value};

/// Evaluate `expr` against `ctx`. Stateless: nothing is retained between calls.
pub(crate) fn evaluate<'a>(expr: &'a Expr, ctx: &'a Context) -> Result<Cow<'a, Value>, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(Cow::Borrowed(value)),
        Expr::Variable { root, segments } => crate::resolve::resolve(root, segments, ctx),
        Expr::Not(inner) => {
            let value = evaluate(inner, ctx)?;
            Ok(Cow::Owned(Value::Bool(!boolean("!", &*value)?)))
        }
        Expr::All(operands) => junction("&&", operands, ctx, false).map(bool_value),
        Expr::Any(operands) => junction("||", operands, ctx, true).map(bool_value),
        Expr::Binary { op, left, right } => match op {
            BinaryOp::Compare(cmp) => {
                let lhs = evaluate(left, ctx)?;
                let rhs = evaluate(right, ctx)?;
                compare(*cmp, &lhs, &rhs).map(|b| Cow::Owned(Value::Bool(b)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                let lhs = evaluate(left, ctx)?;
                let rhs = evaluate(right, ctx)?;
                arithmetic(*op, &lhs, &rhs).map(Cow::Owned)
            }
        },
    }
}

fn bool_value<'a>(b: bool) -> Cow<'a, Value> {
    Cow::Owned(Value::Bool(b))
}

/// Left to right over a flat `&&`/`||` chain. The first operand equal to
/// `decisive` ends the walk and is the result.
fn junction(
    operator: &str,
    operands: &[Expr],
    ctx: &Context,
    decisive: bool,
) -> Result<bool, EvalError> {
    for operand in operands {
        if boolean(operator, &*evaluate(operand, ctx)?)? == decisive {
            return Ok(decisive);
        }
    }
    Ok(!decisive)
}

fn boolean(operator: &str, value: &Value) -> Result<bool, EvalError> {
    value.as_bool().ok_or_else(|| EvalError::TypeMismatch {
        operator: operator.to_owned(),
        expected: "bool",
        found: value.kind(),
    })
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    lhs.compare(op, rhs).ok_or_else(|| EvalError::TypeMismatch {
        operator: op.to_string(),
        expected: "number",
        found: if lhs.is_numeric() { rhs.kind() } else { lhs.kind() },
    })
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let overflow = || EvalError::ArithmeticOverflow {
        operator: op.to_string(),
    };
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Sub => a.checked_sub(*b),
                BinaryOp::Mul => a.checked_mul(*b),
                _ if *b == 0 => return Err(EvalError::DivisionByZero),
                // Rust integer division already truncates toward zero.
                _ => a.checked_div(*b),
            };
            result.map(Value::Int).ok_or_else(overflow)
        }
        _ => {
            let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
                return Err(EvalError::TypeMismatch {
                    operator: op.to_string(),
                    expected: "number",
                    found: if lhs.is_numeric() { rhs.kind() } else { lhs.kind() },
                });
            };
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ if b == 0.0 => return Err(EvalError::DivisionByZero),
                _ => a / b,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Context, EvalError, Expression, Value};

    fn eval(source: &str, ctx: &Context) -> Result<Value, EvalError> {
        Expression::parse(source).unwrap().evaluate(ctx)
    }

    fn eval_empty(source: &str) -> Result<Value, EvalError> {
        eval(source, &Context::new())
    }

    #[test]
    fn numeric_promotion() {
        let ctx = Context::new().set("i", 5_i64).set("f", 2.5_f64);
        assert_eq!(eval("i + f", &ctx), Ok(Value::Float(7.5)));
        assert_eq!(eval_empty("5 > 3"), Ok(Value::Bool(true)));
        assert_eq!(eval_empty("5.0 > 3"), Ok(Value::Bool(true)));
        assert_eq!(eval_empty("5 / 2"), Ok(Value::Int(2)));
        assert_eq!(eval_empty("5.0 / 2"), Ok(Value::Float(2.5)));
        assert_eq!(eval_empty("-7 / 2"), Ok(Value::Int(-3)));
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval_empty("2 + 3 * 4"), Ok(Value::Int(14)));
        assert_eq!(eval_empty("10 - 4 - 3"), Ok(Value::Int(3)));
        assert_eq!(eval_empty("150.0 * 0.8"), Ok(Value::Float(120.0)));
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(eval_empty("1 / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval_empty("1.5 / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval_empty("1 / 0.0"), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let ctx = Context::new().set("max", i64::MAX);
        assert!(matches!(
            eval("max + 1", &ctx),
            Err(EvalError::ArithmeticOverflow { .. })
        ));
        let ctx = Context::new().set("min", i64::MIN);
        assert!(matches!(
            eval("min / -1", &ctx),
            Err(EvalError::ArithmeticOverflow { .. })
        ));
    }

    #[test]
    fn arithmetic_rejects_non_numbers() {
        let err = eval_empty("'a' + 1").unwrap_err();
        assert_eq!(
            err,
            EvalError::TypeMismatch {
                operator: "+".into(),
                expected: "number",
                found: "string",
            }
        );
    }

    #[test]
    fn relational_rejects_non_numbers() {
        let ctx = Context::new().set("name", "bob");
        assert_eq!(
            eval("name > 3", &ctx),
            Err(EvalError::TypeMismatch {
                operator: ">".into(),
                expected: "number",
                found: "string",
            })
        );
        assert!(matches!(
            eval_empty("3 <= true"),
            Err(EvalError::TypeMismatch { found: "bool", .. })
        ));
    }

    #[test]
    fn equality_across_kinds() {
        assert_eq!(eval_empty("1 == 1.0"), Ok(Value::Bool(true)));
        assert_eq!(eval_empty("'1' == 1"), Ok(Value::Bool(false)));
        assert_eq!(eval_empty("'1' != 1"), Ok(Value::Bool(true)));
        assert_eq!(eval_empty("true == true"), Ok(Value::Bool(true)));
        let ctx = Context::new().set("nothing", Value::Null);
        assert_eq!(eval("nothing == nothing", &ctx), Ok(Value::Bool(true)));
        assert_eq!(eval("nothing == 0", &ctx), Ok(Value::Bool(false)));
    }

    #[test]
    fn string_equality_with_either_quote() {
        let ctx = Context::new().set("userType", "VIP");
        assert_eq!(eval("userType == 'VIP'", &ctx), Ok(Value::Bool(true)));
        assert_eq!(eval("userType == \"VIP\"", &ctx), Ok(Value::Bool(true)));
        assert_eq!(eval("userType == 'vip'", &ctx), Ok(Value::Bool(false)));
    }

    #[test]
    fn short_circuit_skips_unbound_right_side() {
        assert_eq!(eval_empty("false && missing.field"), Ok(Value::Bool(false)));
        assert_eq!(eval_empty("true || missing[3]"), Ok(Value::Bool(true)));
        assert_eq!(
            eval_empty("false && 1 / 0 > 0"),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn no_short_circuit_when_left_is_not_decisive() {
        assert_eq!(
            eval_empty("true && missing"),
            Err(EvalError::UnboundVariable {
                name: "missing".into()
            })
        );
        assert_eq!(
            eval_empty("false || missing"),
            Err(EvalError::UnboundVariable {
                name: "missing".into()
            })
        );
    }

    #[test]
    fn logical_operators_require_booleans() {
        assert!(matches!(
            eval_empty("1 && true"),
            Err(EvalError::TypeMismatch { found: "int", .. })
        ));
        assert!(matches!(
            eval_empty("false || 'x'"),
            Err(EvalError::TypeMismatch { found: "string", .. })
        ));
        assert!(matches!(
            eval_empty("!3"),
            Err(EvalError::TypeMismatch { found: "int", .. })
        ));
    }

    #[test]
    fn decided_chain_ignores_later_operands() {
        assert_eq!(eval_empty("true || 'x'"), Ok(Value::Bool(true)));
        assert_eq!(eval_empty("true && false && 'x'"), Ok(Value::Bool(false)));
        assert!(matches!(
            eval_empty("true && true && 'x'"),
            Err(EvalError::TypeMismatch { operator, found: "string", .. }) if operator == "&&"
        ));
    }

    #[test]
    fn long_flat_chains_evaluate() {
        let ctx = Context::new().set("x", 1_i64);
        let all = vec!["x > 0"; 20_000].join(" && ");
        assert_eq!(eval(&all, &ctx), Ok(Value::Bool(true)));

        let any = format!("{} || x == 1", vec!["x > 5"; 20_000].join(" || "));
        assert_eq!(eval(&any, &ctx), Ok(Value::Bool(true)));
    }

    #[test]
    fn bare_boolean_paths() {
        let ctx = Context::new().set("flags.vip", true);
        assert_eq!(eval("flags.vip", &ctx), Ok(Value::Bool(true)));
        assert_eq!(eval("!flags.vip", &ctx), Ok(Value::Bool(false)));
        assert_eq!(eval_empty("true"), Ok(Value::Bool(true)));
    }

    #[test]
    fn list_equality_is_structural() {
        let ctx = Context::new()
            .set("a", vec![1_i64, 2])
            .set("b", vec![1.0_f64, 2.0]);
        assert_eq!(eval("a == b", &ctx), Ok(Value::Bool(true)));
    }
}
