mod action;
mod condition;
mod context;
mod engine;
mod error;
mod expr;
mod fire_report;
mod object;
mod rule;
mod value;

pub use action::{Action, LogAction, SetAction};
pub use condition::{field, Condition, FieldCondition, LogicalOp};
pub use context::Context;
pub use engine::{RuleEngine, RuleEngineBuilder};
pub use error::{ActionError, ConfigError, EvalError};
pub use expr::{BinaryOp, CompareOp, Expr, Expression, PathSegment};
pub use fire_report::{Diagnostic, FireReport};
pub use object::{Accessor, Object};
pub(crate) use rule::{PendingAction, PendingCondition};
pub use rule::{Rule, RuleBuilder};
pub use value::Value;
