use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use super::context::Context;
use super::error::EvalError;
use super::Value;
use crate::parse::ExpressionError;

/// Comparison operators shared by expressions and field conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Binary operators below the logical level, grouped by the precedence level
/// that parses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Compare(CompareOp),
    Add,
    Sub,
    Mul,
    Div,
}

/// One step of a variable path after its root.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// `.name`
    Field(String),
    /// `.name()`
    Call(String),
    /// `[expr]`
    Index(Box<Expr>),
}

/// Parsed expression tree. Immutable once built.
///
/// `&&` and `||` chains are flat: `a && b && c` is one [`Expr::All`] with
/// three operands. Every other operator nests, and the parser rejects trees
/// taller than 64 levels.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// A context key followed by zero or more segments.
    Variable {
        root: String,
        segments: Vec<PathSegment>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    /// `a && b && ...`, evaluated left to right until one is false.
    All(Vec<Expr>),
    /// `a || b || ...`, evaluated left to right until one is true.
    Any(Vec<Expr>),
}

impl Expr {
    pub(crate) fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// An expression parsed once from source text and evaluated many times.
///
/// ```
/// use rulefire::{Context, Expression, Value};
///
/// let expr = Expression::parse("user.goods.size() > 1 && vip").unwrap();
/// let ctx = Context::new()
///     .set("user.goods", vec![1_i64, 2, 3])
///     .set("vip", true);
/// assert_eq!(expr.evaluate(&ctx).unwrap(), Value::Bool(true));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// Tokenize and parse `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError`] on a malformed token or grammar violation.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let root = crate::parse::parse(source)?;
        Ok(Self {
            source: source.to_owned(),
            root,
        })
    }

    /// The text this expression was parsed from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed tree.
    #[must_use]
    pub fn ast(&self) -> &Expr {
        &self.root
    }

    /// Evaluate against `ctx`, producing any value kind.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] when a path cannot be resolved or an operator
    /// receives operands it does not accept.
    pub fn evaluate(&self, ctx: &Context) -> Result<Value, EvalError> {
        crate::evaluate::evaluate(&self.root, ctx).map(Cow::into_owned)
    }

    /// Evaluate as a condition. A non-boolean result is a type mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] on any evaluation failure.
    pub fn evaluate_bool(&self, ctx: &Context) -> Result<bool, EvalError> {
        let value = crate::evaluate::evaluate(&self.root, ctx)?;
        value.as_bool().ok_or_else(|| EvalError::TypeMismatch {
            operator: "condition".to_owned(),
            expected: "bool",
            found: value.kind(),
        })
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Neq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Compare(op) => write!(f, "{op}"),
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, ".{name}"),
            PathSegment::Call(name) => write!(f, ".{name}()"),
            PathSegment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::String(s)) => write!(f, "'{s}'"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Variable { root, segments } => {
                write!(f, "{root}")?;
                segments.iter().try_for_each(|s| write!(f, "{s}"))
            }
            Expr::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            Expr::Not(inner) => write!(f, "!{inner}"),
            Expr::All(operands) => write_chain(f, operands, "&&"),
            Expr::Any(operands) => write_chain(f, operands, "||"),
        }
    }
}

fn write_chain(f: &mut fmt::Formatter<'_>, operands: &[Expr], op: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        write!(f, "{operand}")?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(root: &str, segments: Vec<PathSegment>) -> Expr {
        Expr::Variable {
            root: root.to_owned(),
            segments,
        }
    }

    #[test]
    fn display_binary_tree() {
        let expr = Expr::All(vec![
            Expr::binary(
                BinaryOp::Compare(CompareOp::Eq),
                var("userType", vec![]),
                Expr::Literal("VIP".into()),
            ),
            Expr::binary(
                BinaryOp::Compare(CompareOp::Gt),
                var("orderTotal", vec![]),
                Expr::Literal(Value::Int(100)),
            ),
            Expr::Not(Box::new(var("banned", vec![]))),
        ]);
        assert_eq!(
            expr.to_string(),
            "((userType == 'VIP') && (orderTotal > 100) && !banned)"
        );
    }

    #[test]
    fn display_path_segments() {
        let expr = var(
            "user",
            vec![
                PathSegment::Field("goods".into()),
                PathSegment::Index(Box::new(Expr::Literal(Value::Int(1)))),
                PathSegment::Call("size".into()),
            ],
        );
        assert_eq!(expr.to_string(), "user.goods[1].size()");
    }

    #[test]
    fn display_not() {
        let expr = Expr::Not(Box::new(var("banned", vec![])));
        assert_eq!(expr.to_string(), "!banned");
    }

    #[test]
    fn expression_keeps_source_text() {
        let expr: Expression = "a.b  >  3".parse().unwrap();
        assert_eq!(expr.source(), "a.b  >  3");
        assert_eq!(expr.to_string(), "a.b  >  3");
        assert!(matches!(
            expr.ast(),
            Expr::Binary {
                op: BinaryOp::Compare(CompareOp::Gt),
                ..
            }
        ));
    }

    #[test]
    fn evaluate_bool_rejects_non_boolean() {
        let expr = Expression::parse("1 + 2").unwrap();
        let err = expr.evaluate_bool(&Context::new()).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { found: "int", .. }));
        assert_eq!(expr.evaluate(&Context::new()).unwrap(), Value::Int(3));
    }

    #[test]
    fn same_expression_many_contexts() {
        let expr = Expression::parse("score >= 10").unwrap();
        for (score, expected) in [(5_i64, false), (10, true), (11, true)] {
            let ctx = Context::new().set("score", score);
            assert_eq!(expr.evaluate_bool(&ctx).unwrap(), expected);
        }
    }
}
