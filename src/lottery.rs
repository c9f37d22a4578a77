//! Time-windowed random draws.
//!
//! [`draw`] picks distinct winners among candidates whose purchase time falls
//! inside a [`TimeWindow`]. [`LotteryAction`] runs the same draw as a rule
//! action over a candidate list stored in the context.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::{Action, ActionError, Context, Value};

/// Anything that carries a purchase timestamp.
pub trait Purchaser {
    /// `None` when the purchase time is unknown; such candidates are never eligible.
    fn purchase_time(&self) -> Option<DateTime<Utc>>;
}

impl Purchaser for DateTime<Utc> {
    fn purchase_time(&self) -> Option<DateTime<Utc>> {
        Some(*self)
    }
}

/// A closed time interval. Either bound may be open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// `[start, end]`. An inverted window contains nothing.
    #[must_use]
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    #[must_use]
    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    #[must_use]
    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// Contains every instant.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// The `length` leading up to and including `now`. A `length` reaching
    /// past the earliest representable instant leaves the start open.
    #[must_use]
    pub fn trailing(length: Duration, now: DateTime<Utc>) -> Self {
        Self {
            start: now.checked_sub_signed(length),
            end: Some(now),
        }
    }

    #[must_use]
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<DateTime<Utc>>| b.map_or_else(|| "*".to_owned(), |t| t.to_rfc3339());
        write!(f, "[{}, {}]", bound(self.start), bound(self.end))
    }
}

fn eligible<'a, T: Purchaser>(candidates: &'a [T], window: &TimeWindow) -> Vec<&'a T> {
    candidates
        .iter()
        .filter(|c| c.purchase_time().is_some_and(|t| window.contains(t)))
        .collect()
}

/// Draw up to `k` distinct winners, uniformly at random without replacement,
/// from the candidates whose purchase time lies in `window`.
///
/// Returns `min(k, eligible)` winners; an empty list when nobody is eligible
/// or `k` is zero.
///
/// ```
/// use chrono::{Duration, Utc};
/// use rulefire::lottery::{draw, TimeWindow};
///
/// let now = Utc::now();
/// let buyers: Vec<_> = (0..10).map(|i| now - Duration::minutes(i * 5)).collect();
/// let window = TimeWindow::trailing(Duration::minutes(30), now);
///
/// let winners = draw(&buyers, &window, 2, &mut rand::rng());
/// assert_eq!(winners.len(), 2);
/// assert!(winners.iter().all(|t| window.contains(**t)));
/// ```
pub fn draw<'a, T, R>(candidates: &'a [T], window: &TimeWindow, k: usize, rng: &mut R) -> Vec<&'a T>
where
    T: Purchaser,
    R: Rng + ?Sized,
{
    if k == 0 {
        return Vec::new();
    }
    eligible(candidates, window)
        .choose_multiple(rng, k)
        .copied()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WindowSpec {
    Fixed(TimeWindow),
    Trailing(Duration),
}

/// A candidate list entry with its timestamp already decoded.
struct Entry<'a> {
    value: &'a Value,
    at: Option<DateTime<Utc>>,
}

impl Purchaser for Entry<'_> {
    fn purchase_time(&self) -> Option<DateTime<Utc>> {
        self.at
    }
}

/// Draws winners from a candidate list in the context and writes them back.
///
/// Each candidate is a map or object whose time field (default
/// `purchaseTime`) holds epoch milliseconds or RFC 3339 text. Candidates
/// without that field are never eligible. The winners, unchanged, are stored
/// as a list under the result key; the list is empty when the candidate key
/// is absent or nobody qualifies.
///
/// ```
/// use chrono::{Duration, Utc};
/// use rulefire::lottery::LotteryAction;
/// use rulefire::{Action, Context, Value};
///
/// let now = Utc::now();
/// let buyers: Vec<Value> = (0..5)
///     .map(|i| Value::map([
///         ("id", Value::Int(i)),
///         ("purchaseTime", Value::Int((now - Duration::minutes(i)).timestamp_millis())),
///     ]))
///     .collect();
///
/// let lottery = LotteryAction::new("buyers", "winners", 2)
///     .trailing(Duration::minutes(30))
///     .seed(7);
/// let mut ctx = Context::new().set("buyers", buyers);
/// lottery.execute(&mut ctx).unwrap();
/// assert_eq!(ctx.get("winners").and_then(Value::as_list).map(<[_]>::len), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LotteryAction {
    name: String,
    candidates_key: String,
    result_key: String,
    winners: usize,
    time_field: String,
    window: WindowSpec,
    seed: Option<u64>,
}

impl LotteryAction {
    /// Draw `winners` entries from the list at `candidates_key` into `result_key`.
    /// The window is unbounded until one is set.
    #[must_use]
    pub fn new(candidates_key: &str, result_key: &str, winners: usize) -> Self {
        Self {
            name: "lottery".to_owned(),
            candidates_key: candidates_key.to_owned(),
            result_key: result_key.to_owned(),
            winners,
            time_field: "purchaseTime".to_owned(),
            window: WindowSpec::Fixed(TimeWindow::unbounded()),
            seed: None,
        }
    }

    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    /// Only consider purchases inside `window`.
    #[must_use]
    pub fn window(mut self, window: TimeWindow) -> Self {
        self.window = WindowSpec::Fixed(window);
        self
    }

    /// Only consider purchases in the `length` before the moment the action runs.
    #[must_use]
    pub fn trailing(mut self, length: Duration) -> Self {
        self.window = WindowSpec::Trailing(length);
        self
    }

    /// Read timestamps from `field` instead of `purchaseTime`.
    #[must_use]
    pub fn time_field(mut self, field: &str) -> Self {
        self.time_field = field.to_owned();
        self
    }

    /// Use a deterministic generator; every run with the same input draws the same winners.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn window_at(&self, now: DateTime<Utc>) -> TimeWindow {
        match self.window {
            WindowSpec::Fixed(window) => window,
            WindowSpec::Trailing(length) => TimeWindow::trailing(length, now),
        }
    }

    fn timestamp(&self, candidate: &Value) -> Result<Option<DateTime<Utc>>, String> {
        let raw = match candidate {
            Value::Map(fields) => fields.get(&self.time_field).cloned(),
            Value::Object(obj) => obj
                .field(&self.time_field)
                .or_else(|| obj.call(&self.time_field)),
            other => return Err(format!("expected a map or object, found {}", other.kind())),
        };
        match raw {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Int(millis)) => DateTime::from_timestamp_millis(millis)
                .map(Some)
                .ok_or_else(|| format!("timestamp {millis} is out of range")),
            Some(Value::String(text)) => DateTime::parse_from_rfc3339(&text)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|e| format!("invalid timestamp '{text}': {e}")),
            Some(other) => Err(format!(
                "expected epoch milliseconds or RFC 3339 text in '{}', found {}",
                self.time_field,
                other.kind()
            )),
        }
    }

    fn invalid(&self, key: String, reason: String) -> ActionError {
        ActionError::InvalidInput {
            action: self.name.clone(),
            key,
            reason,
        }
    }
}

impl Action for LotteryAction {
    fn execute(&self, ctx: &mut Context) -> Result<(), ActionError> {
        let items = match ctx.get(&self.candidates_key) {
            None | Some(Value::Null) => {
                tracing::info!(action = %self.name, key = %self.candidates_key, "no candidates");
                ctx.insert(&self.result_key, Value::List(Vec::new()));
                return Ok(());
            }
            Some(Value::List(items)) => items,
            Some(other) => {
                return Err(self.invalid(
                    self.candidates_key.clone(),
                    format!("expected a list, found {}", other.kind()),
                ));
            }
        };

        let entries = items
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let at = self
                    .timestamp(value)
                    .map_err(|reason| self.invalid(format!("{}[{i}]", self.candidates_key), reason))?;
                Ok(Entry { value, at })
            })
            .collect::<Result<Vec<_>, ActionError>>()?;

        let window = self.window_at(Utc::now());
        let chosen = match self.seed {
            Some(seed) => draw(&entries, &window, self.winners, &mut StdRng::seed_from_u64(seed)),
            None => draw(&entries, &window, self.winners, &mut rand::rng()),
        };
        let winners: Vec<Value> = chosen.into_iter().map(|e| e.value.clone()).collect();

        tracing::info!(
            action = %self.name,
            %window,
            candidates = entries.len(),
            eligible = eligible(&entries, &window).len(),
            winners = winners.len(),
            "lottery drawn"
        );
        ctx.insert(&self.result_key, Value::List(winners));
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
