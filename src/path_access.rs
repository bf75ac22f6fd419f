//! Dotted path lookup and assignment.
//!
//! A path is split on `.`. When a part is reached at an array-like
//! value and the part is not an index literal, the first entry having
//! that property is used instead (or the first entry, if none has
//! it). This is what lets `{{entries.name}}` refer into a list.

use anyhow::Result;
use kstring::KString;

use crate::{error::{webi_error, WebiErrorKind},
            observable::Observable,
            value::{is_index, Value}};

/// The entry of array-like `container` to use for `part`.
fn select_entry(container: &Value, part: &str) -> Option<Value> {
    let entries = container.entries()?;
    entries.iter()
        .find(|e| e.child(part).is_some())
        .or_else(|| entries.first())
        .cloned()
}

/// One step of path resolution.
pub(crate) fn step(container: &Value, part: &str) -> Option<Value> {
    if container.is_array_like() && !is_index(part) {
        select_entry(container, part)?.child(part)
    } else {
        container.child(part)
    }
}

/// `None` if the path leads through a missing key or a value that
/// does not have properties.
pub fn resolve(root: &Value, path: &str) -> Option<Value> {
    let mut current = root.clone();
    for part in path.split('.') {
        current = step(&current, part)?;
    }
    Some(current)
}

fn invalid_path(path: &str, reason: String) -> anyhow::Error {
    webi_error(WebiErrorKind::InvalidPath { path: path.into(), reason })
}

/// Like `select_entry`, but for an empty array a new empty map is
/// appended and used.
fn select_or_create_entry(container: &Value, part: &str) -> Value {
    if let Some(entry) = select_entry(container, part) {
        return entry
    }
    let entry = Value::new_map();
    match container {
        Value::List(l) => l.borrow_mut().push(entry.clone()),
        Value::Array(a) => { a.push(entry.clone()); }
        _ => (),
    }
    entry
}

/// The list index `part` may address, up to and including `len`
/// (which appends).
fn store_index(part: &str, len: usize, path: &str) -> Result<usize> {
    let i: usize = part.parse().map_err(
        |_| invalid_path(path, format!("{part:?} is not an index")))?;
    if i > len {
        return Err(invalid_path(path, format!(
            "index {i} is beyond the end of the list (length {len})")))
    }
    Ok(i)
}

fn store(container: &Value, part: &str, value: Value, path: &str) -> Result<()> {
    match container {
        Value::Object(o) => o.set(part, value),
        Value::Map(m) => { m.borrow_mut().insert(KString::from_ref(part), value); }
        Value::List(l) => {
            let mut l = l.borrow_mut();
            let len = l.len();
            let i = store_index(part, len, path)?;
            if i == len { l.push(value) } else { l[i] = value }
        }
        Value::Array(a) => {
            let len = a.len();
            let i = store_index(part, len, path)?;
            if i == len {
                a.push(value);
            } else {
                a.splice(i, 1, vec![value]);
            }
        }
        v => return Err(invalid_path(path, format!(
            "cannot set {part:?} on {v:?}, it is not an object"))),
    }
    Ok(())
}

/// Assigns `value` at `path` below `root`. Missing or falsy
/// intermediate values are replaced by new maps (which `root.set`
/// promotes to nested observables); a truthy non-container on the way
/// is an error. The last part is assigned via `set` if its container
/// is an Observable (which notifies), directly otherwise. List
/// indices may address an existing entry or append one.
pub fn assign(root: &Observable, path: &str, value: Value) -> Result<()> {
    let mut parts: Vec<&str> = path.split('.').collect();
    let last = parts.pop().unwrap_or(path);
    let mut container = Value::Object(root.clone());
    for part in parts {
        if container.is_array_like() && !is_index(part) {
            container = select_or_create_entry(&container, part);
        }
        container = match container.child(part) {
            Some(v) if v.is_structured() => v,
            Some(v) if v.is_truthy() => return Err(invalid_path(path, format!(
                "{part:?} holds {v:?}, which is not an object"))),
            _ => {
                store(&container, part, Value::new_map(), path)?;
                container.child(part).ok_or_else(
                    || invalid_path(path, format!("could not create {part:?}")))?
            }
        };
    }
    if container.is_array_like() && !is_index(last) {
        container = select_or_create_entry(&container, last);
    }
    store(&container, last, value, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(j: serde_json::Value) -> Value {
        Value::from(j)
    }

    #[test]
    fn t_resolve() {
        let x = v(json!({"a": [{"b": 1}, {"c": {"d": "x"}}], "s": "str"}));
        assert_eq!(resolve(&x, "a.c.d").unwrap().to_string(), "x");
        assert_eq!(resolve(&x, "a.1.c.d").unwrap().to_string(), "x");
        assert_eq!(resolve(&x, "a.b").unwrap().to_string(), "1");
        assert!(resolve(&x, "a.e").is_none());
        assert!(resolve(&x, "s.length").is_none());
        assert!(resolve(&x, "").is_none());
        assert!(resolve(&v(json!({"l": []})), "l.x").is_none());
    }

    #[test]
    fn t_assign_plain() {
        let root = Observable::new();
        root.set("m", Value::new_map());
        // existing structured value: "m" stays a plain map
        root.set("m", json!({"list": []}));
        assign(&root, "m.list.name", Value::from("n")).unwrap();
        assign(&root, "m.list.0.other", Value::from(1)).unwrap();
        assert_eq!(root.to_json(), json!({"m": {"list": [{"name": "n", "other": 1}]}}));
        assign(&root, "m.falsy", Value::from(0)).unwrap();
        assign(&root, "m.falsy.x", Value::from(2)).unwrap();
        assert_eq!(root.get("m.falsy.x", "").to_string(), "2");
    }

    #[test]
    fn t_assign_errors() {
        let root = Observable::from_json(json!({"s": "x", "l": [1]})).unwrap();
        assert!(assign(&root, "s.a.b", Value::Null).is_err());
        assert!(assign(&root, "l.3", Value::Null).is_err());
        assign(&root, "l.0", Value::from(5)).unwrap();
        assert_eq!(root.get("l", "").to_string(), "5");
    }
}
