use thiserror::Error;

use crate::parse::{ExpressionError, LexError, ParseError};
use crate::{ActionError, ConfigError, EvalError};

/// Unified error type covering expression parsing, rule configuration,
/// evaluation, and action execution.
///
/// Every error in the crate converts into it with `?`, which is convenient
/// for callers that build an engine and fire it in the same function.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

impl From<LexError> for RuleError {
    fn from(err: LexError) -> Self {
        Self::Expression(err.into())
    }
}

impl From<ParseError> for RuleError {
    fn from(err: ParseError) -> Self {
        Self::Expression(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Context, Expression, RuleEngineBuilder};

    fn run() -> Result<(), RuleError> {
        let engine = RuleEngineBuilder::new()
            .rule("r", |r| r.then_set("x", "missing + 1"))
            .build()?;
        engine.fire(&mut Context::new())?;
        Ok(())
    }

    #[test]
    fn action_error_converts() {
        assert!(matches!(run(), Err(RuleError::Action(_))));
    }

    #[test]
    fn expression_errors_convert() {
        let err: RuleError = Expression::parse("a ==").unwrap_err().into();
        assert!(matches!(err, RuleError::Expression(ExpressionError::Parse(_))));
        assert!(err.to_string().starts_with("parse error at 4"));
    }

    #[test]
    fn eval_error_converts() {
        let eval = || -> Result<bool, RuleError> {
            Ok(Expression::parse("x > 1")?.evaluate_bool(&Context::new())?)
        };
        assert!(matches!(eval(), Err(RuleError::Eval(EvalError::UnboundVariable { .. }))));
    }
}
