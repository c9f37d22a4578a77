use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};

use super::context::Context;
use super::error::{ActionError, ConfigError};
use super::fire_report::FireReport;
use super::rule::{Rule, RuleBuilder};

/// Builder for constructing a [`RuleEngine`] in one expression.
///
/// # Example
///
/// ```
/// use rulefire::{Context, RuleEngineBuilder, Value};
///
/// let engine = RuleEngineBuilder::new()
///     .rule("vip", |r| {
///         r.priority(10)
///             .exclusive()
///             .when_expression("userType == 'VIP' && orderTotal > 100")
///             .then_set("finalPrice", "orderTotal * 0.8")
///     })
///     .rule("big-spender", |r| {
///         r.priority(5)
///             .when_expression("orderTotal > 200")
///             .then_set("finalPrice", "orderTotal * 0.9")
///     })
///     .build()
///     .unwrap();
///
/// let mut ctx = Context::new().set("userType", "VIP").set("orderTotal", 150.0);
/// engine.fire(&mut ctx).unwrap();
/// assert_eq!(ctx.get("finalPrice"), Some(&Value::Float(120.0)));
/// ```
#[derive(Debug, Default)]
pub struct RuleEngineBuilder {
    rules: Vec<RuleBuilder>,
}

impl RuleEngineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a rule with the given id. The closure configures the rest.
    #[must_use]
    pub fn rule(mut self, id: &str, f: impl FnOnce(RuleBuilder) -> RuleBuilder) -> Self {
        self.rules.push(f(Rule::builder(id)));
        self
    }

    /// Build every rule and register them in definition order.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] raised by a rule, or
    /// [`ConfigError::DuplicateRule`] if two rules share an id.
    pub fn build(self) -> Result<RuleEngine, ConfigError> {
        let mut engine = RuleEngine::new();
        for builder in self.rules {
            engine.register(builder.build()?)?;
        }
        Ok(engine)
    }
}

/// An ordered registry of rules that fires them against a [`Context`].
///
/// Rules are kept sorted by descending priority; rules with equal priority
/// keep their registration order. Firing takes `&self`, so one engine can be
/// shared (for example behind `Arc`) by threads that each own their context.
/// Registration takes `&mut self` and cannot overlap a firing pass.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> RuleEngineBuilder {
        RuleEngineBuilder::new()
    }

    /// Add a rule.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateRule`] if a rule with the same id is
    /// already registered; the registry is left unchanged.
    pub fn register(&mut self, rule: Rule) -> Result<(), ConfigError> {
        crate::compile::insert_sorted(&mut self.rules, rule)
    }

    /// Remove and return the rule with the given id.
    pub fn remove(&mut self, id: &str) -> Option<Rule> {
        let at = self.rules.iter().position(|r| r.id == id)?;
        Some(self.rules.remove(at))
    }

    /// Remove every rule.
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Registered rules in firing order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rule ids in firing order.
    #[must_use]
    pub fn rule_order(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id.as_str()).collect()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Fire every rule against `ctx` using the current time for window checks.
    ///
    /// # Errors
    ///
    /// Returns the first [`ActionError`]. Rules after the failing action do
    /// not run; effects of earlier actions stay in `ctx`.
    pub fn fire(&self, ctx: &mut Context) -> Result<(), ActionError> {
        self.fire_at(ctx, Utc::now())
    }

    /// Fire every rule against `ctx`, checking windows against `now`.
    ///
    /// # Errors
    ///
    /// Same as [`fire`](Self::fire).
    pub fn fire_at(&self, ctx: &mut Context, now: DateTime<Utc>) -> Result<(), ActionError> {
        self.pass(ctx, now, None)
    }

    /// Fire with detailed diagnostics using the current time.
    ///
    /// # Errors
    ///
    /// Same as [`fire`](Self::fire).
    pub fn fire_detailed(&self, ctx: &mut Context) -> Result<FireReport, ActionError> {
        self.fire_detailed_at(ctx, Utc::now())
    }

    /// Fire with detailed diagnostics, checking windows against `now`.
    ///
    /// Returns a [`FireReport`] with the rules that were skipped, evaluated,
    /// and fired, any downgraded condition errors, and timing information.
    ///
    /// # Errors
    ///
    /// Same as [`fire`](Self::fire).
    pub fn fire_detailed_at(
        &self,
        ctx: &mut Context,
        now: DateTime<Utc>,
    ) -> Result<FireReport, ActionError> {
        let start = Instant::now();
        let mut report = FireReport::new();
        self.pass(ctx, now, Some(&mut report))?;
        Ok(report.finish(start.elapsed()))
    }

    /// Run the rules once in execution order, recording each decision into
    /// `report` when one is given.
    fn pass(
        &self,
        ctx: &mut Context,
        now: DateTime<Utc>,
        mut report: Option<&mut FireReport>,
    ) -> Result<(), ActionError> {
        let mut scratch = Vec::new();
        for rule in &self.rules {
            if !rule.is_active_at(now) {
                tracing::debug!(rule = %rule.id, "outside effective window, skipped");
                if let Some(report) = report.as_deref_mut() {
                    report.record_skipped(&rule.id);
                }
                continue;
            }
            let diagnostics = match report.as_deref_mut() {
                Some(report) => {
                    report.record_evaluated(&rule.id);
                    report.diagnostics_mut()
                }
                None => {
                    scratch.clear();
                    &mut scratch
                }
            };
            if !rule.matches(ctx, diagnostics) {
                tracing::debug!(rule = %rule.id, "condition not met");
                continue;
            }
            tracing::debug!(rule = %rule.id, "fired");
            if let Some(report) = report.as_deref_mut() {
                report.record_fired(&rule.id);
            }
            rule.apply(ctx)?;
            if rule.exclusive {
                tracing::debug!(rule = %rule.id, "exclusive rule matched, stopping");
                if let Some(report) = report.as_deref_mut() {
                    report.record_stop(&rule.id);
                }
                break;
            }
        }
        Ok(())
    }
}

impl fmt::Display for RuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exclusive = self.rules.iter().filter(|r| r.exclusive).count();
        write!(
            f,
            "RuleEngine({} rules, {} exclusive)",
            self.rules.len(),
            exclusive
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{field, Value};

    fn record(id: &'static str) -> impl Fn(&mut Context) -> Result<(), ActionError> {
        move |ctx: &mut Context| {
            let mut seen = match ctx.lookup("seen") {
                Some(Value::List(items)) => items.clone(),
                _ => Vec::new(),
            };
            seen.push(Value::from(id));
            ctx.insert("seen", seen);
            Ok(())
        }
    }

    fn seen(ctx: &Context) -> Vec<String> {
        ctx.get("seen")
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect()
    }

    #[test]
    fn builder_registers_in_priority_order() {
        let engine = RuleEngineBuilder::new()
            .rule("low", |r| r.priority(1))
            .rule("high", |r| r.priority(10))
            .rule("mid", |r| r.priority(5))
            .build()
            .unwrap();
        assert_eq!(engine.rule_order(), vec!["high", "mid", "low"]);
        assert_eq!(engine.len(), 3);
    }

    #[test]
    fn builder_rejects_duplicates() {
        let result = RuleEngineBuilder::new()
            .rule("a", |r| r)
            .rule("a", |r| r.priority(2))
            .build();
        assert!(matches!(result, Err(ConfigError::DuplicateRule { id }) if id == "a"));
    }

    #[test]
    fn fires_in_order_and_sees_earlier_writes() {
        let engine = RuleEngineBuilder::new()
            .rule("second", |r| {
                r.priority(1)
                    .when_expression("stage == 1")
                    .then(record("second"))
            })
            .rule("first", |r| {
                r.priority(2).then(record("first")).then_set("stage", "1")
            })
            .build()
            .unwrap();
        let mut ctx = Context::new();
        engine.fire(&mut ctx).unwrap();
        assert_eq!(seen(&ctx), vec!["first", "second"]);
    }

    #[test]
    fn exclusive_match_stops_pass() {
        let engine = RuleEngineBuilder::new()
            .rule("a", |r| r.priority(10).exclusive().then(record("a")))
            .rule("b", |r| r.priority(5).then(record("b")))
            .build()
            .unwrap();
        let mut ctx = Context::new();
        let report = engine.fire_detailed(&mut ctx).unwrap();
        assert_eq!(seen(&ctx), vec!["a"]);
        assert_eq!(report.stopped_by(), Some("a"));
        assert_eq!(report.evaluated(), &["a"]);
    }

    #[test]
    fn exclusive_without_match_continues() {
        let engine = RuleEngineBuilder::new()
            .rule("a", |r| {
                r.priority(10)
                    .exclusive()
                    .when(field("go").eq(true))
                    .then(record("a"))
            })
            .rule("b", |r| r.priority(5).then(record("b")))
            .build()
            .unwrap();
        let mut ctx = Context::new();
        engine.fire(&mut ctx).unwrap();
        assert_eq!(seen(&ctx), vec!["b"]);
    }

    #[test]
    fn window_gates_rules() {
        let now = Utc::now();
        let engine = RuleEngineBuilder::new()
            .rule("future", |r| {
                r.effective_from(now + Duration::hours(1)).then(record("future"))
            })
            .rule("past", |r| {
                r.effective_until(now - Duration::hours(1)).then(record("past"))
            })
            .rule("open", |r| r.then(record("open")))
            .build()
            .unwrap();
        let mut ctx = Context::new();
        let report = engine.fire_detailed_at(&mut ctx, now).unwrap();
        assert_eq!(seen(&ctx), vec!["open"]);
        assert_eq!(report.skipped(), &["future", "past"]);
    }

    #[test]
    fn condition_errors_do_not_stop_pass() {
        let engine = RuleEngineBuilder::new()
            .rule("broken", |r| {
                r.priority(2)
                    .when_expression("customer.tier == 'gold'")
                    .then(record("broken"))
            })
            .rule("fine", |r| r.priority(1).then(record("fine")))
            .build()
            .unwrap();
        let mut ctx = Context::new();
        let report = engine.fire_detailed(&mut ctx).unwrap();
        assert_eq!(seen(&ctx), vec!["fine"]);
        assert_eq!(report.diagnostics().len(), 1);
        assert_eq!(report.diagnostics()[0].rule(), Some("broken"));
    }

    #[test]
    fn plain_and_detailed_passes_agree() {
        let now = Utc::now();
        let engine = RuleEngineBuilder::new()
            .rule("expired", |r| {
                r.priority(9)
                    .effective_until(now - Duration::hours(1))
                    .then(record("expired"))
            })
            .rule("broken", |r| {
                r.priority(8)
                    .when_expression("customer.tier == 'gold'")
                    .then(record("broken"))
            })
            .rule("vip", |r| {
                r.priority(7)
                    .when(field("tier").eq("vip"))
                    .then(record("vip"))
            })
            .rule("stop", |r| r.priority(5).exclusive().then(record("stop")))
            .rule("after", |r| r.priority(1).then(record("after")))
            .build()
            .unwrap();

        let input = Context::new().set("tier", "vip");
        let mut plain = input.clone();
        engine.fire_at(&mut plain, now).unwrap();
        let mut detailed = input;
        let report = engine.fire_detailed_at(&mut detailed, now).unwrap();

        assert_eq!(seen(&plain), vec!["vip", "stop"]);
        assert_eq!(seen(&plain), seen(&detailed));
        assert_eq!(report.fired(), &["vip", "stop"]);
        assert_eq!(report.skipped(), &["expired"]);
        assert_eq!(report.evaluated(), &["broken", "vip", "stop"]);
        assert_eq!(report.stopped_by(), Some("stop"));
        assert_eq!(report.diagnostics().len(), 1);
    }

    #[test]
    fn action_error_aborts_pass_without_rollback() {
        let engine = RuleEngineBuilder::new()
            .rule("first", |r| r.priority(3).then(record("first")))
            .rule("failing", |r| {
                r.priority(2)
                    .then(record("failing"))
                    .then(|_: &mut Context| -> Result<(), ActionError> {
                        Err(ActionError::failed("explode", "boom"))
                    })
            })
            .rule("never", |r| r.priority(1).then(record("never")))
            .build()
            .unwrap();
        let mut ctx = Context::new();
        let err = engine.fire(&mut ctx).unwrap_err();
        assert!(matches!(err, ActionError::Failed { .. }));
        assert_eq!(seen(&ctx), vec!["first", "failing"]);
    }

    #[test]
    fn register_remove_clear() {
        let mut engine = RuleEngine::new();
        engine.register(Rule::builder("a").build().unwrap()).unwrap();
        engine
            .register(Rule::builder("b").priority(1).build().unwrap())
            .unwrap();
        assert!(engine
            .register(Rule::builder("a").build().unwrap())
            .is_err());
        assert_eq!(engine.rule_order(), vec!["b", "a"]);

        assert_eq!(engine.remove("b").map(|r| r.id().to_owned()), Some("b".into()));
        assert!(engine.remove("b").is_none());
        assert!(engine.get("a").is_some());

        engine.clear();
        assert!(engine.is_empty());
        let mut ctx = Context::new();
        engine.fire(&mut ctx).unwrap();
        assert!(ctx.is_empty());
    }

    #[test]
    fn display() {
        let engine = RuleEngineBuilder::new()
            .rule("a", |r| r.exclusive())
            .rule("b", |r| r)
            .build()
            .unwrap();
        assert_eq!(engine.to_string(), "RuleEngine(2 rules, 1 exclusive)");
    }
}
