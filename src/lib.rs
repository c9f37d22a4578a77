//! A prioritized rule engine with a small path-aware expression language.
//!
//! Rules pair a [`Condition`] with a list of [`Action`]s. A [`RuleEngine`]
//! fires them against a mutable [`Context`] in descending priority order,
//! honoring validity windows and exclusive rules. Conditions can be written
//! as expressions such as `user.goods[1].price > 200 && vip`, which are
//! parsed once when the rule is built.
//!
//! ```
//! use rulefire::{Context, RuleEngineBuilder, Value};
//!
//! let engine = RuleEngineBuilder::new()
//!     .rule("vip-discount", |r| {
//!         r.priority(10)
//!             .exclusive()
//!             .when_expression("userType == 'VIP' && orderTotal > 100")
//!             .then_set("finalPrice", "orderTotal * 0.8")
//!     })
//!     .build()
//!     .unwrap();
//!
//! let mut ctx = Context::new().set("userType", "VIP").set("orderTotal", 150.0);
//! engine.fire(&mut ctx).unwrap();
//! assert_eq!(ctx.get("finalPrice"), Some(&Value::Float(120.0)));
//! ```

mod compile;
mod error;
mod evaluate;
pub mod lottery;
pub mod parse;
mod resolve;
mod types;

pub use error::RuleError;
pub use parse::{ExpressionError, LexError, LexErrorKind, ParseError};
pub use types::{
    field, Accessor, Action, ActionError, BinaryOp, CompareOp, Condition, ConfigError, Context,
    Diagnostic, EvalError, Expr, Expression, FieldCondition, FireReport, LogAction, LogicalOp,
    Object, PathSegment, Rule, RuleBuilder, RuleEngine, RuleEngineBuilder, SetAction, Value,
};
