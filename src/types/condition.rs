use std::fmt;
use std::ops::Not;

use super::context::Context;
use super::error::{ConfigError, EvalError};
use super::expr::{CompareOp, Expression, PathSegment};
use super::fire_report::Diagnostic;
use super::Value;
use crate::parse::ExpressionError;

/// How a composite condition combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "AND"),
            LogicalOp::Or => write!(f, "OR"),
            LogicalOp::Not => write!(f, "NOT"),
        }
    }
}

/// A boolean predicate over a [`Context`].
///
/// Evaluation fails closed: an error raised while evaluating an expression or
/// field comparison makes the condition `false` and is reported as a
/// [`Diagnostic`] instead of being propagated.
///
/// ```
/// use rulefire::{field, Condition, Context};
///
/// let vip = Condition::expression("userType == 'VIP'").unwrap();
/// let cond = vip.and(field("orderTotal").gt(100_i64));
///
/// let ctx = Context::new().set("userType", "VIP").set("orderTotal", 150.0);
/// assert!(cond.evaluate(&ctx));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    node: Node,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Expression(Expression),
    Field(FieldComparison),
    Composite { op: LogicalOp, children: Vec<Condition> },
}

impl Condition {
    /// Parse an expression condition. Parsing happens once, here.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError`] if `source` does not tokenize or parse.
    pub fn expression(source: &str) -> Result<Self, ExpressionError> {
        Expression::parse(source).map(Self::from)
    }

    /// Combine `children` with `op`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotArity`] if `op` is [`LogicalOp::Not`] and
    /// there is not exactly one child.
    pub fn composite(
        op: LogicalOp,
        children: impl IntoIterator<Item = Condition>,
    ) -> Result<Self, ConfigError> {
        let children: Vec<Condition> = children.into_iter().collect();
        if op == LogicalOp::Not && children.len() != 1 {
            return Err(ConfigError::NotArity {
                found: children.len(),
            });
        }
        Ok(Self {
            node: Node::Composite { op, children },
        })
    }

    /// True when every child is true. An empty list is always true.
    #[must_use]
    pub fn all(children: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            node: Node::Composite {
                op: LogicalOp::And,
                children: children.into_iter().collect(),
            },
        }
    }

    /// True when any child is true. An empty list is also true.
    #[must_use]
    pub fn any(children: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            node: Node::Composite {
                op: LogicalOp::Or,
                children: children.into_iter().collect(),
            },
        }
    }

    #[must_use]
    pub fn negate(condition: Condition) -> Self {
        Self {
            node: Node::Composite {
                op: LogicalOp::Not,
                children: vec![condition],
            },
        }
    }

    #[must_use]
    pub fn and(self, other: Condition) -> Self {
        Self::all([self, other])
    }

    #[must_use]
    pub fn or(self, other: Condition) -> Self {
        Self::any([self, other])
    }

    /// Evaluate against `ctx`, logging and discarding any errors.
    #[must_use]
    pub fn evaluate(&self, ctx: &Context) -> bool {
        let mut sink = Vec::new();
        self.evaluate_into(ctx, &mut sink)
    }

    /// Evaluate against `ctx`, appending a [`Diagnostic`] for every error
    /// that was downgraded to `false`.
    pub fn evaluate_into(&self, ctx: &Context, diagnostics: &mut Vec<Diagnostic>) -> bool {
        match &self.node {
            Node::Expression(expr) => {
                let result = expr.evaluate_bool(ctx);
                downgrade(expr.source(), result, diagnostics)
            }
            Node::Field(cmp) => {
                let result = cmp.evaluate(ctx);
                downgrade(&cmp.to_string(), result, diagnostics)
            }
            Node::Composite { op, children } => match op {
                LogicalOp::And => children.iter().all(|c| c.evaluate_into(ctx, diagnostics)),
                LogicalOp::Or => {
                    children.is_empty()
                        || children.iter().any(|c| c.evaluate_into(ctx, diagnostics))
                }
                LogicalOp::Not => !children
                    .iter()
                    .all(|c| c.evaluate_into(ctx, diagnostics)),
            },
        }
    }
}

fn downgrade(
    subject: &str,
    result: Result<bool, EvalError>,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    match result {
        Ok(matched) => matched,
        Err(error) => {
            tracing::warn!(condition = subject, %error, "condition failed to evaluate, treating as false");
            diagnostics.push(Diagnostic::new(subject, error));
            false
        }
    }
}

impl From<Expression> for Condition {
    fn from(expr: Expression) -> Self {
        Self {
            node: Node::Expression(expr),
        }
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::negate(self)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Node::Expression(expr) => write!(f, "{expr}"),
            Node::Field(cmp) => write!(f, "{cmp}"),
            Node::Composite {
                op: LogicalOp::Not,
                children,
            } => match children.as_slice() {
                [inner] => write!(f, "(NOT {inner})"),
                _ => write!(f, "(NOT ?)"),
            },
            Node::Composite { op, children } if children.is_empty() => {
                write!(f, "{}()", op.to_string().to_lowercase())
            }
            Node::Composite { op, children } => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {op} ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// -- Field comparisons ------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldOp {
    Compare(CompareOp),
    Contains,
}

impl fmt::Display for FieldOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldOp::Compare(op) => write!(f, "{op}"),
            FieldOp::Contains => write!(f, "contains"),
        }
    }
}

/// Compares the value at a dotted path with a constant.
#[derive(Debug, Clone, PartialEq)]
struct FieldComparison {
    path: String,
    op: FieldOp,
    value: Value,
}

impl FieldComparison {
    fn evaluate(&self, ctx: &Context) -> Result<bool, EvalError> {
        let mut parts = self.path.split('.');
        let root = parts.next().unwrap_or_default();
        let segments: Vec<PathSegment> = parts.map(|p| PathSegment::Field(p.to_owned())).collect();

        // A missing or null field only equals null.
        let absent = || self.op == FieldOp::Compare(CompareOp::Eq) && self.value.is_null();
        let actual = match crate::resolve::resolve(root, &segments, ctx) {
            Ok(value) if value.is_null() => return Ok(absent()),
            Ok(value) => value,
            Err(EvalError::UnboundVariable { .. } | EvalError::NoSuchField { .. }) => {
                return Ok(absent());
            }
            Err(e) => return Err(e),
        };

        match self.op {
            FieldOp::Compare(op) => actual.compare(op, &self.value).ok_or_else(|| {
                EvalError::TypeMismatch {
                    operator: op.to_string(),
                    expected: "number",
                    found: if actual.is_numeric() {
                        self.value.kind()
                    } else {
                        actual.kind()
                    },
                }
            }),
            FieldOp::Contains => match (&*actual, &self.value) {
                (Value::String(haystack), Value::String(needle)) => {
                    Ok(haystack.contains(needle.as_str()))
                }
                (Value::List(items), needle) => Ok(items.iter().any(|item| item.equals(needle))),
                (other, _) => Err(EvalError::TypeMismatch {
                    operator: "contains".to_owned(),
                    expected: "string or list",
                    found: other.kind(),
                }),
            },
        }
    }
}

impl fmt::Display for FieldComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::String(s) => write!(f, "{} {} '{s}'", self.path, self.op),
            value => write!(f, "{} {} {value}", self.path, self.op),
        }
    }
}

/// Intermediate builder for field comparison conditions.
/// Created by [`field()`]; a comparison method produces the [`Condition`].
#[derive(Debug, Clone)]
pub struct FieldCondition {
    path: String,
}

impl FieldCondition {
    fn build(self, op: FieldOp, value: impl Into<Value>) -> Condition {
        Condition {
            node: Node::Field(FieldComparison {
                path: self.path,
                op,
                value: value.into(),
            }),
        }
    }

    #[must_use]
    pub fn eq(self, value: impl Into<Value>) -> Condition {
        self.build(FieldOp::Compare(CompareOp::Eq), value)
    }

    #[must_use]
    pub fn neq(self, value: impl Into<Value>) -> Condition {
        self.build(FieldOp::Compare(CompareOp::Neq), value)
    }

    #[must_use]
    pub fn gt(self, value: impl Into<Value>) -> Condition {
        self.build(FieldOp::Compare(CompareOp::Gt), value)
    }

    #[must_use]
    pub fn gte(self, value: impl Into<Value>) -> Condition {
        self.build(FieldOp::Compare(CompareOp::Gte), value)
    }

    #[must_use]
    pub fn lt(self, value: impl Into<Value>) -> Condition {
        self.build(FieldOp::Compare(CompareOp::Lt), value)
    }

    #[must_use]
    pub fn lte(self, value: impl Into<Value>) -> Condition {
        self.build(FieldOp::Compare(CompareOp::Lte), value)
    }

    /// Substring test on strings, element membership on lists.
    #[must_use]
    pub fn contains(self, value: impl Into<Value>) -> Condition {
        self.build(FieldOp::Contains, value)
    }
}

/// Start a field comparison on a dot-separated path.
#[must_use]
pub fn field(path: &str) -> FieldCondition {
    FieldCondition {
        path: path.to_owned(),
    }
}
