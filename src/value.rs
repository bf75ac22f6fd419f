//! Dynamically typed values held by observables.

use std::{cell::RefCell,
          fmt::{Debug, Display},
          rc::Rc};
use anyhow::Result;
use indexmap::IndexMap;
use kstring::KString;
use serde::{Serialize, Serializer, ser::{SerializeMap, SerializeSeq}};

use crate::{observable::Observable,
            observable_array::ObservableArray,
            error::{webi_error, WebiErrorKind}};

/// Plain (non-reactive) containers are shared, so that they have
/// reference identity and can be assigned into in place.
pub type PlainMap = Rc<RefCell<IndexMap<KString, Value>>>;
pub type PlainList = Rc<RefCell<Vec<Value>>>;

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(KString),
    Map(PlainMap),
    List(PlainList),
    Object(Observable),
    Array(ObservableArray),
}

/// Whether `part` is a pure non-negative integer literal.
pub(crate) fn is_index(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

impl Value {
    pub fn new_map() -> Value {
        Value::Map(Rc::new(RefCell::new(IndexMap::new())))
    }

    pub fn new_list() -> Value {
        Value::List(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn map_from(entries: impl IntoIterator<Item = (KString, Value)>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    pub fn list_from(items: impl IntoIterator<Item = Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Maps, lists and their observable variants.
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Map(_) | Value::List(_) | Value::Object(_) | Value::Array(_))
    }

    pub fn is_array_like(&self) -> bool {
        matches!(self, Value::List(_) | Value::Array(_))
    }

    /// JavaScript truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => !(*n == 0.0 || n.is_nan()),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Identity: primitives are compared by value, containers by
    /// reference.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_observable(&self) -> Option<&Observable> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ObservableArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Property lookup: map keys, and index literals for lists.
    pub fn child(&self, key: &str) -> Option<Value> {
        match self {
            Value::Map(m) => m.borrow().get(key).cloned(),
            Value::Object(o) => o.get_own(key),
            Value::List(l) if is_index(key) =>
                key.parse::<usize>().ok().and_then(|i| l.borrow().get(i).cloned()),
            Value::Array(a) if is_index(key) =>
                key.parse::<usize>().ok().and_then(|i| a.get(i)),
            _ => None,
        }
    }

    /// A copy of the items of list-like values.
    pub fn entries(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(l) => Some(l.borrow().clone()),
            Value::Array(a) => Some(a.to_vec()),
            _ => None,
        }
    }

    /// Copies the entries of `other` (a map or observable) into self
    /// (a map or observable). A falsy `other` is a no-op.
    pub fn extend(&self, other: &Value) -> Result<()> {
        let entries: Vec<(KString, Value)> = match other {
            Value::Map(m) => m.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Value::Object(o) => o.entries(),
            v if !v.is_truthy() => return Ok(()),
            v => return Err(webi_error(WebiErrorKind::InvalidArgument(
                format!("cannot extend with {v:?}, it is not an object")))),
        };
        match self {
            Value::Map(m) => {
                let mut m = m.borrow_mut();
                for (k, v) in entries {
                    m.insert(k, v);
                }
            }
            Value::Object(o) => {
                for (k, v) in entries {
                    o.set(&k, v);
                }
            }
            v => return Err(webi_error(WebiErrorKind::InvalidArgument(
                format!("cannot extend {v:?}, it is not an object")))),
        }
        Ok(())
    }

    /// Deep conversion, observables included.
    pub fn to_json(&self) -> serde_json::Value {
        // all map keys are strings, this can't fail
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).into()
    } else if n == 0.0 {
        // also for -0
        "0".into()
    } else {
        // Rust does not print a ".0" for integral values
        format!("{n}")
    }
}

/// Same as JavaScript string conversion, which is what ends up in
/// the generated markup.
impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Map(_) | Value::Object(_) => f.write_str("[object Object]"),
            Value::List(l) => join_items(f, &l.borrow()),
            Value::Array(a) => join_items(f, &a.to_vec()),
        }
    }
}

/// Null items show as the empty string.
fn join_items(f: &mut std::fmt::Formatter<'_>, items: &[Value]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        if !item.is_null() {
            Display::fmt(item, f)?;
        }
    }
    Ok(())
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "{b:?}"),
            Value::Number(n) => write!(f, "{n:?}"),
            Value::String(s) => write!(f, "{:?}", s.as_str()),
            Value::Map(m) => f.debug_map().entries(
                m.borrow().iter().map(|(k, v)| (k.as_str(), v.clone()))).finish(),
            Value::List(l) => f.debug_list().entries(l.borrow().iter()).finish(),
            Value::Object(o) => Debug::fmt(o, f),
            Value::Array(a) => Debug::fmt(a, f),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) =>
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                },
            Value::String(s) => serializer.serialize_str(s),
            Value::Map(m) => {
                let m = m.borrow();
                let mut ser = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m.iter() {
                    ser.serialize_entry(k.as_str(), v)?;
                }
                ser.end()
            }
            Value::Object(o) => {
                let entries = o.entries();
                let mut ser = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in &entries {
                    ser.serialize_entry(k.as_str(), v)?;
                }
                ser.end()
            }
            Value::List(l) => {
                let l = l.borrow();
                let mut ser = serializer.serialize_seq(Some(l.len()))?;
                for v in l.iter() {
                    ser.serialize_element(v)?;
                }
                ser.end()
            }
            Value::Array(a) => {
                let items = a.to_vec();
                let mut ser = serializer.serialize_seq(Some(items.len()))?;
                for v in &items {
                    ser.serialize_element(v)?;
                }
                ser.end()
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        match j {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(KString::from_string(s)),
            serde_json::Value::Array(items) =>
                Value::list_from(items.into_iter().map(Value::from)),
            serde_json::Value::Object(m) =>
                Value::map_from(m.into_iter().map(
                    |(k, v)| (KString::from_string(k), Value::from(v)))),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(KString::from_ref(s))
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(KString::from_ref(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(KString::from_string(s))
    }
}

impl From<KString> for Value {
    fn from(s: KString) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<Observable> for Value {
    fn from(o: Observable) -> Self {
        Value::Object(o)
    }
}

impl From<ObservableArray> for Value {
    fn from(a: ObservableArray) -> Self {
        Value::Array(a)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
