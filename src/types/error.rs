use thiserror::Error;

use crate::parse::ExpressionError;

/// Runtime failures while evaluating an expression against a context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unbound variable '{name}'")]
    UnboundVariable { name: String },

    #[error("no field '{field}' on {kind}")]
    NoSuchField { field: String, kind: &'static str },

    #[error("no method '{method}()' on {kind}")]
    NoSuchMethod { method: String, kind: &'static str },

    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("cannot index into {kind}")]
    NotIndexable { kind: &'static str },

    #[error("type mismatch: '{operator}' expects {expected}, found {found}")]
    TypeMismatch {
        operator: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{operator}'")]
    ArithmeticOverflow { operator: String },
}

/// Invalid rule, condition, or engine configuration. Always raised while
/// building, never during a firing pass.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rule id is required")]
    MissingId,

    #[error("NOT takes exactly one condition, got {found}")]
    NotArity { found: usize },

    #[error("invalid expression '{expression}' in rule '{rule}': {source}")]
    InvalidExpression {
        rule: String,
        expression: String,
        source: ExpressionError,
    },

    #[error("rule '{rule}' has effective_from after effective_until")]
    InvalidWindow { rule: String },

    #[error("duplicate rule id '{id}'")]
    DuplicateRule { id: String },
}

/// Failure raised by an action. Aborts the firing pass that ran it.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action '{action}' could not evaluate its expression: {source}")]
    Eval { action: String, source: EvalError },

    #[error("action '{action}' found invalid input at '{key}': {reason}")]
    InvalidInput {
        action: String,
        key: String,
        reason: String,
    },

    #[error("action '{action}' failed: {message}")]
    Failed { action: String, message: String },
}

impl ActionError {
    /// Convenience constructor for caller-defined actions.
    pub fn failed(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            action: action.into(),
            message: message.into(),
        }
    }
}
