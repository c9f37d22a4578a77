use std::fmt;
use std::time::Duration;

use super::error::EvalError;

/// A condition error that was downgraded to "condition is false".
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    rule: Option<String>,
    subject: String,
    error: EvalError,
}

impl Diagnostic {
    pub(crate) fn new(subject: impl Into<String>, error: EvalError) -> Self {
        Self {
            rule: None,
            subject: subject.into(),
            error,
        }
    }

    pub(crate) fn tag(&mut self, rule: &str) {
        self.rule = Some(rule.to_owned());
    }

    /// Id of the rule whose condition failed, when evaluated by an engine.
    #[must_use]
    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }

    /// The condition text that failed to evaluate.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn error(&self) -> &EvalError {
        &self.error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "rule '{rule}': ")?;
        }
        write!(f, "{} => {}", self.subject, self.error)
    }
}

/// Detailed outcome of one firing pass, returned by
/// [`RuleEngine::fire_detailed()`](super::engine::RuleEngine::fire_detailed).
///
/// Contains the rules that were evaluated, skipped by their time window, and
/// fired, whether an exclusive rule ended the pass, the downgraded condition
/// errors, and the wall-clock duration of the pass.
#[derive(Debug, Clone)]
#[must_use]
pub struct FireReport {
    evaluated: Vec<String>,
    skipped: Vec<String>,
    fired: Vec<String>,
    stopped_by: Option<String>,
    diagnostics: Vec<Diagnostic>,
    duration: Duration,
}

impl FireReport {
    pub(crate) fn new() -> Self {
        Self {
            evaluated: Vec::new(),
            skipped: Vec::new(),
            fired: Vec::new(),
            stopped_by: None,
            diagnostics: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub(crate) fn record_skipped(&mut self, id: &str) {
        self.skipped.push(id.to_owned());
    }

    pub(crate) fn record_evaluated(&mut self, id: &str) {
        self.evaluated.push(id.to_owned());
    }

    pub(crate) fn record_fired(&mut self, id: &str) {
        self.fired.push(id.to_owned());
    }

    pub(crate) fn record_stop(&mut self, id: &str) {
        self.stopped_by = Some(id.to_owned());
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut Vec<Diagnostic> {
        &mut self.diagnostics
    }

    pub(crate) fn finish(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Ids of rules whose condition was evaluated, in evaluation order.
    #[must_use]
    pub fn evaluated(&self) -> &[String] {
        &self.evaluated
    }

    /// Ids of rules skipped because the evaluation instant fell outside their window.
    #[must_use]
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Ids of rules that matched and ran their actions, in order.
    #[must_use]
    pub fn fired(&self) -> &[String] {
        &self.fired
    }

    /// The exclusive rule that ended the pass early, if any.
    #[must_use]
    pub fn stopped_by(&self) -> Option<&str> {
        self.stopped_by.as_deref()
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Wall-clock duration of the pass.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for FireReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fired: [{}]", self.fired.join(", "))?;
        if let Some(id) = &self.stopped_by {
            write!(f, " (stopped by '{id}')")?;
        }
        write!(f, ", evaluated: [{}]", self.evaluated.join(", "))?;
        if !self.skipped.is_empty() {
            write!(f, ", skipped: [{}]", self.skipped.join(", "))?;
        }
        if !self.diagnostics.is_empty() {
            write!(f, ", diagnostics: {}", self.diagnostics.len())?;
        }
        write!(f, ", duration: {:?}", self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FireReport {
        let mut report = FireReport::new();
        report.record_skipped("expired");
        report.record_evaluated("vip");
        report.record_fired("vip");
        report.record_stop("vip");
        report.finish(Duration::from_nanos(500))
    }

    #[test]
    fn report_accessors() {
        let report = sample();
        assert_eq!(report.evaluated(), &["vip"]);
        assert_eq!(report.skipped(), &["expired"]);
        assert_eq!(report.fired(), &["vip"]);
        assert_eq!(report.stopped_by(), Some("vip"));
        assert!(report.diagnostics().is_empty());
        assert_eq!(report.duration(), Duration::from_nanos(500));
    }

    #[test]
    fn report_display() {
        let s = sample().to_string();
        assert!(s.contains("fired: [vip] (stopped by 'vip')"));
        assert!(s.contains("skipped: [expired]"));
        assert!(!s.contains("diagnostics"));
    }

    #[test]
    fn diagnostic_display_includes_rule() {
        let mut diag = Diagnostic::new(
            "orderTotal > 100",
            EvalError::UnboundVariable {
                name: "orderTotal".into(),
            },
        );
        diag.tag("vip");
        assert_eq!(diag.rule(), Some("vip"));
        assert_eq!(
            diag.to_string(),
            "rule 'vip': orderTotal > 100 => unbound variable 'orderTotal'"
        );
    }
}
