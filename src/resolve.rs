//! Walks a variable path from a context key to a leaf value.
//!
//! Values owned by the context are borrowed all the way down; only values
//! produced by accessors or built-in calls are allocated.

use std::borrow::Cow;

use crate::{Context, EvalError, Expr, PathSegment, Value};

pub(crate) fn resolve<'a>(
    root: &str,
    segments: &'a [PathSegment],
    ctx: &'a Context,
) -> Result<Cow<'a, Value>, EvalError> {
    let start = ctx
        .lookup(root)
        .map(Cow::Borrowed)
        .ok_or_else(|| EvalError::UnboundVariable {
            name: root.to_owned(),
        })?;

    segments
        .iter()
        .try_fold(start, |current, segment| match segment {
            PathSegment::Field(name) => field(current, name),
            PathSegment::Call(name) => call(&current, name).map(Cow::Owned),
            PathSegment::Index(index) => element(current, index, ctx),
        })
}

fn field<'a>(target: Cow<'a, Value>, name: &str) -> Result<Cow<'a, Value>, EvalError> {
    let missing = |kind| EvalError::NoSuchField {
        field: name.to_owned(),
        kind,
    };
    match target {
        Cow::Borrowed(Value::Map(fields)) => {
            fields.get(name).map(Cow::Borrowed).ok_or(missing("map"))
        }
        Cow::Owned(Value::Map(mut fields)) => {
            fields.remove(name).map(Cow::Owned).ok_or(missing("map"))
        }
        other => match &*other {
            Value::Object(obj) => obj
                .field(name)
                .map(Cow::Owned)
                .ok_or_else(|| missing(obj.type_name())),
            value => Err(missing(value.kind())),
        },
    }
}

/// Built-ins on collections and strings first, then the object's own accessors.
fn call(target: &Value, name: &str) -> Result<Value, EvalError> {
    let len = match target {
        Value::List(items) => Some(items.len()),
        Value::Map(fields) => Some(fields.len()),
        Value::String(s) => Some(s.chars().count()),
        _ => None,
    };
    match (name, len) {
        ("size" | "length", Some(n)) => Ok(Value::Int(i64::try_from(n).unwrap_or(i64::MAX))),
        ("isEmpty", Some(n)) => Ok(Value::Bool(n == 0)),
        _ => match target {
            Value::Object(obj) => obj.call(name).ok_or_else(|| EvalError::NoSuchMethod {
                method: name.to_owned(),
                kind: obj.type_name(),
            }),
            value => Err(EvalError::NoSuchMethod {
                method: name.to_owned(),
                kind: value.kind(),
            }),
        },
    }
}

fn element<'a>(
    target: Cow<'a, Value>,
    index: &Expr,
    ctx: &Context,
) -> Result<Cow<'a, Value>, EvalError> {
    let position = |len: usize| -> Result<usize, EvalError> {
        let value = crate::evaluate::evaluate(index, ctx)?;
        let i = value.as_i64().ok_or_else(|| EvalError::TypeMismatch {
            operator: "[]".to_owned(),
            expected: "int",
            found: value.kind(),
        })?;
        usize::try_from(i)
            .ok()
            .filter(|&u| u < len)
            .ok_or(EvalError::IndexOutOfBounds { index: i, len })
    };

    match target {
        Cow::Borrowed(Value::List(items)) => Ok(Cow::Borrowed(&items[position(items.len())?])),
        Cow::Owned(Value::List(mut items)) => {
            let u = position(items.len())?;
            Ok(Cow::Owned(items.swap_remove(u)))
        }
        other => Err(EvalError::NotIndexable { kind: other.kind() }),
    }
}
