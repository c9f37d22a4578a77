use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::action::Action;
use super::condition::Condition;
use super::context::Context;
use super::error::{ActionError, ConfigError};
use super::fire_report::Diagnostic;

/// A prioritized condition/action pair with an optional validity window.
///
/// Built with [`RuleBuilder`]; immutable and cheap to clone afterwards.
#[derive(Clone)]
pub struct Rule {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) priority: i32,
    pub(crate) exclusive: bool,
    pub(crate) effective_from: Option<DateTime<Utc>>,
    pub(crate) effective_until: Option<DateTime<Utc>>,
    pub(crate) condition: Condition,
    pub(crate) actions: Vec<Arc<dyn Action>>,
}

impl Rule {
    /// Start building a rule with the given id.
    #[must_use]
    pub fn builder(id: &str) -> RuleBuilder {
        RuleBuilder::new().id(id)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name; the id unless one was set.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether a match ends the firing pass.
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    #[must_use]
    pub fn effective_from(&self) -> Option<DateTime<Utc>> {
        self.effective_from
    }

    #[must_use]
    pub fn effective_until(&self) -> Option<DateTime<Utc>> {
        self.effective_until
    }

    #[must_use]
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Names of this rule's actions, in execution order.
    #[must_use]
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    /// Whether `now` lies within `[effective_from, effective_until]`.
    /// A missing bound is unbounded on that side.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_from.map_or(true, |from| now >= from)
            && self.effective_until.map_or(true, |until| now <= until)
    }

    /// Evaluate the condition, tagging any diagnostics with this rule's id.
    pub(crate) fn matches(&self, ctx: &Context, diagnostics: &mut Vec<Diagnostic>) -> bool {
        let start = diagnostics.len();
        let matched = self.condition.evaluate_into(ctx, diagnostics);
        for diag in &mut diagnostics[start..] {
            diag.tag(&self.id);
        }
        matched
    }

    /// Run every action in order, stopping at the first failure.
    pub(crate) fn apply(&self, ctx: &mut Context) -> Result<(), ActionError> {
        self.actions.iter().try_for_each(|action| {
            action.execute(ctx).inspect_err(|error| {
                tracing::error!(rule = %self.id, action = action.name(), %error, "action failed");
            })
        })
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("exclusive", &self.exclusive)
            .field("effective_from", &self.effective_from)
            .field("effective_until", &self.effective_until)
            .field("condition", &self.condition)
            .field("actions", &self.action_names())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (priority {}", self.id, self.priority)?;
        if self.exclusive {
            write!(f, ", exclusive")?;
        }
        write!(
            f,
            "): {} => [{}]",
            self.condition,
            self.action_names().join(", ")
        )
    }
}

pub(crate) enum PendingCondition {
    Ready(Condition),
    Source(String),
}

pub(crate) enum PendingAction {
    Ready(Arc<dyn Action>),
    Set { key: String, expression: String },
}

/// Builder for a [`Rule`]. Expression text given to
/// [`when_expression`](Self::when_expression) and [`then_set`](Self::then_set)
/// is parsed by [`build`](Self::build), so syntax errors surface before the
/// rule is ever registered.
///
/// ```
/// use rulefire::Rule;
///
/// let rule = Rule::builder("vip-discount")
///     .priority(10)
///     .exclusive()
///     .when_expression("userType == 'VIP' && orderTotal > 100")
///     .then_set("finalPrice", "orderTotal * 0.8")
///     .build()
///     .unwrap();
/// assert_eq!(rule.priority(), 10);
/// ```
#[derive(Default)]
pub struct RuleBuilder {
    pub(crate) id: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) priority: i32,
    pub(crate) exclusive: bool,
    pub(crate) effective_from: Option<DateTime<Utc>>,
    pub(crate) effective_until: Option<DateTime<Utc>>,
    pub(crate) condition: Option<PendingCondition>,
    pub(crate) actions: Vec<PendingAction>,
}

impl RuleBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Unique id. Required.
    #[must_use]
    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_owned());
        self
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self
    }

    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    /// Higher priorities fire first. Defaults to 0.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Stop the firing pass after this rule matches.
    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    #[must_use]
    pub fn effective_from(mut self, from: DateTime<Utc>) -> Self {
        self.effective_from = Some(from);
        self
    }

    #[must_use]
    pub fn effective_until(mut self, until: DateTime<Utc>) -> Self {
        self.effective_until = Some(until);
        self
    }

    /// Set the condition. Without one the rule always matches.
    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(PendingCondition::Ready(condition));
        self
    }

    /// Set the condition from expression text, parsed at build time.
    #[must_use]
    pub fn when_expression(mut self, source: &str) -> Self {
        self.condition = Some(PendingCondition::Source(source.to_owned()));
        self
    }

    /// Append an action.
    #[must_use]
    pub fn then(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(PendingAction::Ready(Arc::new(action)));
        self
    }

    /// Append a [`SetAction`](super::SetAction) writing `expression` to `key`,
    /// parsed at build time.
    #[must_use]
    pub fn then_set(mut self, key: &str, expression: &str) -> Self {
        self.actions.push(PendingAction::Set {
            key: key.to_owned(),
            expression: expression.to_owned(),
        });
        self
    }

    /// Validate and build the rule.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the id is missing, an expression does not
    /// parse, or the validity window is inverted.
    pub fn build(self) -> Result<Rule, ConfigError> {
        crate::compile::compile_rule(self)
    }
}

impl fmt::Debug for RuleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleBuilder")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("exclusive", &self.exclusive)
            .field("actions", &self.actions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::{field, LogAction};

    #[test]
    fn defaults() {
        let rule = Rule::builder("r1").build().unwrap();
        assert_eq!(rule.id(), "r1");
        assert_eq!(rule.name(), "r1");
        assert_eq!(rule.priority(), 0);
        assert!(!rule.is_exclusive());
        assert!(rule.description().is_none());
        assert!(rule.condition().evaluate(&Context::new()));
        assert!(rule.action_names().is_empty());
    }

    #[test]
    fn time_window_is_inclusive() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let rule = Rule::builder("jan")
            .effective_from(from)
            .effective_until(until)
            .build()
            .unwrap();
        assert!(rule.is_active_at(from));
        assert!(rule.is_active_at(until));
        assert!(!rule.is_active_at(from - Duration::seconds(1)));
        assert!(!rule.is_active_at(until + Duration::seconds(1)));
    }

    #[test]
    fn unbounded_window_always_active() {
        let rule = Rule::builder("always").build().unwrap();
        assert!(rule.is_active_at(Utc::now()));
        assert!(rule.is_active_at(DateTime::<Utc>::MIN_UTC));
    }

    #[test]
    fn diagnostics_are_tagged_with_rule_id() {
        let rule = Rule::builder("r1")
            .when_expression("missing > 1")
            .build()
            .unwrap();
        let mut diagnostics = Vec::new();
        assert!(!rule.matches(&Context::new(), &mut diagnostics));
        assert_eq!(diagnostics[0].rule(), Some("r1"));
    }

    #[test]
    fn actions_stop_at_first_failure() {
        let rule = Rule::builder("r1")
            .then_set("a", "1")
            .then(|_: &mut Context| -> Result<(), ActionError> {
                Err(ActionError::failed("boom", "nope"))
            })
            .then_set("b", "2")
            .build()
            .unwrap();
        let mut ctx = Context::new();
        assert!(rule.apply(&mut ctx).is_err());
        assert!(ctx.contains_key("a"));
        assert!(!ctx.contains_key("b"));
    }

    #[test]
    fn display() {
        let rule = Rule::builder("adult")
            .priority(5)
            .exclusive()
            .when(field("age").gte(18_i64))
            .then(LogAction::new("adult"))
            .build()
            .unwrap();
        assert_eq!(rule.to_string(), "adult (priority 5, exclusive): age >= 18 => [log]");
    }
}
