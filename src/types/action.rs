use std::fmt;

use super::context::Context;
use super::error::ActionError;
use super::expr::Expression;
use crate::parse::ExpressionError;

/// A side effect applied to the context when a rule matches.
///
/// Any `Fn(&mut Context) -> Result<(), ActionError>` closure is an action:
///
/// ```
/// use rulefire::{Action, ActionError, Context, Value};
///
/// let flag = |ctx: &mut Context| -> Result<(), ActionError> {
///     ctx.insert("flagged", true);
///     Ok(())
/// };
/// let mut ctx = Context::new();
/// flag.execute(&mut ctx).unwrap();
/// assert_eq!(ctx.get("flagged"), Some(&Value::Bool(true)));
/// ```
pub trait Action: Send + Sync {
    /// Apply the action. An error aborts the remaining actions and rules of
    /// the firing pass; effects already applied are kept.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] when the action cannot complete.
    fn execute(&self, ctx: &mut Context) -> Result<(), ActionError>;

    /// Short name used in logs and errors.
    fn name(&self) -> &str {
        "action"
    }
}

impl<F> Action for F
where
    F: Fn(&mut Context) -> Result<(), ActionError> + Send + Sync,
{
    fn execute(&self, ctx: &mut Context) -> Result<(), ActionError> {
        self(ctx)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// Writes the value of an expression to a context path.
#[derive(Debug, Clone, PartialEq)]
pub struct SetAction {
    key: String,
    expression: Expression,
    name: String,
}

impl SetAction {
    /// Parse `expression` once; it is evaluated on every execution.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError`] if `expression` does not parse.
    pub fn new(key: &str, expression: &str) -> Result<Self, ExpressionError> {
        Ok(Self::from_expression(key, Expression::parse(expression)?))
    }

    #[must_use]
    pub fn from_expression(key: &str, expression: Expression) -> Self {
        Self {
            key: key.to_owned(),
            name: format!("set {key}"),
            expression,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn expression(&self) -> &Expression {
        &self.expression
    }
}

impl Action for SetAction {
    fn execute(&self, ctx: &mut Context) -> Result<(), ActionError> {
        let value = self
            .expression
            .evaluate(ctx)
            .map_err(|source| ActionError::Eval {
                action: self.name.clone(),
                source,
            })?;
        tracing::debug!(key = %self.key, %value, "set");
        ctx.insert(&self.key, value);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for SetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.key, self.expression)
    }
}

/// Emits an `info` event with a message and the current values of some paths.
#[derive(Debug, Clone, PartialEq)]
pub struct LogAction {
    message: String,
    keys: Vec<String>,
}

impl LogAction {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            keys: Vec::new(),
        }
    }

    /// Include the value at `path` in the event. Missing paths print as `null`.
    #[must_use]
    pub fn with_key(mut self, path: &str) -> Self {
        self.keys.push(path.to_owned());
        self
    }

    fn render(&self, ctx: &Context) -> String {
        self.keys
            .iter()
            .map(|k| match ctx.get(k) {
                Some(v) => format!("{k}={v}"),
                None => format!("{k}=null"),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Action for LogAction {
    fn execute(&self, ctx: &mut Context) -> Result<(), ActionError> {
        let values = self.render(ctx);
        tracing::info!(values = %values, "{}", self.message);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EvalError, Value};

    #[test]
    fn set_action_writes_expression_value() {
        let action = SetAction::new("finalPrice", "orderTotal * 0.8").unwrap();
        let mut ctx = Context::new().set("orderTotal", 150.0);
        action.execute(&mut ctx).unwrap();
        assert_eq!(ctx.get("finalPrice"), Some(&Value::Float(120.0)));
        assert_eq!(action.name(), "set finalPrice");
        assert_eq!(action.to_string(), "finalPrice = orderTotal * 0.8");
    }

    #[test]
    fn set_action_dotted_key() {
        let action = SetAction::new("order.discount", "10").unwrap();
        let mut ctx = Context::new();
        action.execute(&mut ctx).unwrap();
        assert_eq!(ctx.get("order.discount"), Some(&Value::Int(10)));
    }

    #[test]
    fn set_action_eval_error() {
        let action = SetAction::new("x", "missing + 1").unwrap();
        let err = action.execute(&mut Context::new()).unwrap_err();
        assert!(matches!(
            err,
            ActionError::Eval { ref action, source: EvalError::UnboundVariable { .. } } if action == "set x"
        ));
        assert!(err.to_string().contains("unbound variable 'missing'"));
    }

    #[test]
    fn set_action_rejects_bad_expression() {
        assert!(SetAction::new("x", "1 +").is_err());
    }

    #[test]
    fn closure_action() {
        let action = |ctx: &mut Context| -> Result<(), ActionError> {
            ctx.insert("count", 1_i64);
            Ok(())
        };
        let mut ctx = Context::new();
        action.execute(&mut ctx).unwrap();
        assert_eq!(Action::name(&action), "closure");
        assert_eq!(ctx.get("count"), Some(&Value::Int(1)));
    }

    #[test]
    fn log_action_renders_values() {
        let action = LogAction::new("applied").with_key("a").with_key("b");
        let ctx = Context::new().set("a", 1_i64);
        assert_eq!(action.render(&ctx), "a=1 b=null");
        let mut ctx = ctx;
        assert!(action.execute(&mut ctx).is_ok());
    }
}
