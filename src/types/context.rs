use std::collections::{BTreeMap, HashMap};

use super::Value;

/// Mutable key/value store that conditions read from and actions write to.
///
/// Top-level keys are the roots of expression paths. Dot-separated paths given
/// to [`set`](Self::set) and [`insert`](Self::insert) create nested
/// [`Value::Map`] records, so `"user.profile.age"` is reachable from the
/// expression `user.profile.age`.
#[derive(Debug, Clone, Default)]
pub struct Context {
    data: HashMap<String, Value>,
}

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value at a dot-separated path. Creates intermediate nested maps as needed.
    #[must_use]
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.insert(path, value);
        self
    }

    /// Insert a value at a dot-separated path (mutable reference version).
    pub fn insert(&mut self, path: &str, value: impl Into<Value>) {
        let value = value.into();
        match path.split_once('.') {
            None => {
                self.data.insert(path.to_owned(), value);
            }
            Some((root, rest)) => {
                let entry = self
                    .data
                    .entry(root.to_owned())
                    .or_insert_with(|| Value::Map(BTreeMap::new()));
                let segments: Vec<&str> = rest.split('.').collect();
                insert_nested(entry, &segments, value);
            }
        }
    }

    /// Look up a value by dot-separated path, descending through nested maps.
    /// Returns `None` if any segment is missing or lands on a non-map value.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let root = self.data.get(segments.next()?)?;
        segments.try_fold(root, |current, segment| match current {
            Value::Map(fields) => fields.get(segment),
            _ => None,
        })
    }

    /// Look up a top-level key without interpreting dots.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Remove a top-level key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over top-level entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn insert_nested(target: &mut Value, segments: &[&str], value: Value) {
    if !matches!(target, Value::Map(_)) {
        *target = Value::Map(BTreeMap::new());
    }
    let Value::Map(fields) = target else {
        return;
    };
    match segments {
        [] => {}
        [last] => {
            fields.insert((*last).to_owned(), value);
        }
        [first, rest @ ..] => {
            let entry = fields
                .entry((*first).to_owned())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            insert_nested(entry, rest, value);
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
