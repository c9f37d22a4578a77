use std::fmt;
use std::sync::Arc;

use super::Value;

/// Capability interface for caller-owned structured data.
///
/// Anything placed in a [`Context`](super::Context) as a [`Value::Object`]
/// is read through this trait: `user.name` becomes `field("name")` and
/// `user.tier()` becomes `call("tier")`. Implementations must not mutate
/// themselves while being read.
///
/// ```
/// use rulefire::{Accessor, Value};
///
/// #[derive(Debug)]
/// struct Customer {
///     id: String,
///     orders: Vec<i64>,
/// }
///
/// impl Accessor for Customer {
///     fn field(&self, name: &str) -> Option<Value> {
///         match name {
///             "id" => Some(self.id.clone().into()),
///             "orders" => Some(self.orders.clone().into()),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Accessor: fmt::Debug + Send + Sync {
    /// Read a named field.
    fn field(&self, name: &str) -> Option<Value>;

    /// Invoke a named zero-argument accessor. Unsupported names return `None`.
    fn call(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }

    /// Name reported in diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to an [`Accessor`]. Cloning is cheap; equality is identity.
#[derive(Clone)]
pub struct Object(Arc<dyn Accessor>);

impl Object {
    pub fn new(accessor: impl Accessor + 'static) -> Self {
        Self(Arc::new(accessor))
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        self.0.field(name)
    }

    #[must_use]
    pub fn call(&self, name: &str) -> Option<Value> {
        self.0.call(name)
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }
}

impl From<Arc<dyn Accessor>> for Object {
    fn from(inner: Arc<dyn Accessor>) -> Self {
        Self(inner)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.0).cast::<()>() == Arc::as_ptr(&other.0).cast::<()>()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
