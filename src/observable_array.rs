//! A list with change listeners. Every operation, including the
//! non-mutating `concat`, `join` and `reduce`, notifies all listeners
//! after it has been applied. Entries are stored as given (not
//! promoted).

use std::{cell::RefCell,
          cmp::Ordering,
          fmt::Debug,
          rc::Rc};

use crate::{listeners::{ListenerList, Unwatch, WatchKey},
            value::Value};

/// Array listeners get the array itself (which is both the new and
/// the old value).
pub type ArrayListener = dyn Fn(&ObservableArray);

struct ArrayInner {
    items: RefCell<Vec<Value>>,
    listeners: RefCell<ListenerList<ArrayListener>>,
}

#[derive(Clone)]
pub struct ObservableArray(Rc<ArrayInner>);

impl Default for ObservableArray {
    fn default() -> Self {
        ObservableArray::new()
    }
}

impl ObservableArray {
    pub fn new() -> ObservableArray {
        ObservableArray::from_values(Vec::new())
    }

    pub fn from_values(items: Vec<Value>) -> ObservableArray {
        ObservableArray(Rc::new(ArrayInner {
            items: RefCell::new(items),
            listeners: RefCell::new(ListenerList::new()),
        }))
    }

    pub fn ptr_eq(&self, other: &ObservableArray) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn watch(&self, listener: impl Fn(&ObservableArray) + 'static) -> Unwatch {
        let id = self.0.listeners.borrow_mut().add(WatchKey::All, Rc::new(listener));
        let inner = Rc::downgrade(&self.0);
        Unwatch::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.borrow_mut().remove(id);
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    fn trigger(&self) {
        let listeners = self.0.listeners.borrow().snapshot(None);
        for (id, listener) in listeners {
            if self.0.listeners.borrow().contains(id) {
                listener(self);
            }
        }
    }

    /// Applies `f` to the items, then notifies.
    fn with_items<T>(&self, f: impl FnOnce(&mut Vec<Value>) -> T) -> T {
        let result = f(&mut self.0.items.borrow_mut());
        self.trigger();
        result
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.items.borrow().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.with_items(|items| {
            items.push(value);
            items.len()
        })
    }

    pub fn pop(&self) -> Option<Value> {
        self.with_items(|items| items.pop())
    }

    pub fn shift(&self) -> Option<Value> {
        self.with_items(|items| {
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        })
    }

    /// Inserts `values` at the front (in their order), returns the new
    /// length.
    pub fn unshift(&self, values: Vec<Value>) -> usize {
        self.with_items(|items| {
            items.splice(0..0, values);
            items.len()
        })
    }

    /// Removes `delete_count` items at `start` and inserts `insert`
    /// there; both `start` and the count are clamped to the length.
    /// Returns the removed items.
    pub fn splice(&self, start: usize, delete_count: usize, insert: Vec<Value>) -> Vec<Value> {
        self.with_items(|items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            items.splice(start..end, insert).collect()
        })
    }

    /// A new (unwatched) array with the items of self followed by
    /// `others`; array-like values in `others` are spliced in.
    pub fn concat(&self, others: &[Value]) -> ObservableArray {
        let result = self.with_items(|items| {
            let mut result = items.clone();
            for v in others {
                match v.entries() {
                    Some(entries) => result.extend(entries),
                    None => result.push(v.clone()),
                }
            }
            result
        });
        ObservableArray::from_values(result)
    }

    pub fn join(&self, separator: &str) -> String {
        self.with_items(|items| {
            let mut s = String::new();
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    s.push_str(separator);
                }
                if !v.is_null() {
                    s.push_str(&v.to_string());
                }
            }
            s
        })
    }

    /// `f(accumulator, item, index)`; runs on a copy of the items, `f`
    /// may access the array.
    pub fn reduce<T>(&self, init: T, f: impl FnMut(T, &Value, usize) -> T) -> T {
        let items = self.to_vec();
        let mut f = f;
        let result = items.iter().enumerate().fold(init, |acc, (i, v)| f(acc, v, i));
        self.trigger();
        result
    }

    pub fn reverse(&self) {
        self.with_items(|items| items.reverse())
    }

    /// Sorts by string representation.
    pub fn sort(&self) {
        self.with_items(|items| items.sort_by_cached_key(|v| v.to_string()))
    }

    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) {
        self.with_items(|items| items.sort_by(compare))
    }
}

impl Debug for ObservableArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ObservableArray")?;
        f.debug_list().entries(self.0.items.borrow().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counted(values: &[i32]) -> (ObservableArray, Rc<Cell<usize>>) {
        let arr = ObservableArray::from_values(values.iter().map(|v| Value::from(*v)).collect());
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        arr.watch(move |_| c.set(c.get() + 1));
        (arr, count)
    }

    fn items(arr: &ObservableArray) -> String {
        arr.join(",")
    }

    #[test]
    fn t_mutations() {
        let (arr, count) = counted(&[1, 2, 3]);
        assert_eq!(arr.push(4), 4);
        assert_eq!(arr.pop().unwrap().to_string(), "4");
        assert_eq!(arr.shift().unwrap().to_string(), "1");
        assert_eq!(arr.unshift(vec![Value::from(9), Value::from(8)]), 4);
        assert_eq!(count.get(), 4);
        assert_eq!(items(&arr), "9,8,2,3");
        let removed = arr.splice(1, 2, vec![Value::from("x")]);
        assert_eq!(Value::list_from(removed).to_string(), "8,2");
        assert_eq!(items(&arr), "9,x,3");
        assert!(arr.splice(10, 1, vec![]).is_empty());
        arr.reverse();
        assert_eq!(items(&arr), "3,x,9");
        arr.sort();
        assert_eq!(items(&arr), "3,9,x");
        arr.sort_by(|a, b| b.to_string().cmp(&a.to_string()));
        assert_eq!(items(&arr), "x,9,3");
    }

    #[test]
    fn t_non_mutating_notify() {
        let (arr, count) = counted(&[1, 2]);
        let c = arr.concat(&[Value::from(3), Value::list_from(vec![Value::from(4)])]);
        assert_eq!(c.join("-"), "1-2-3-4");
        assert_eq!(arr.reduce(0.0, |acc, v, _| acc + v.as_f64().unwrap()), 3.0);
        assert_eq!(count.get(), 2);
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn t_empty_ops() {
        let (arr, count) = counted(&[]);
        assert!(arr.pop().is_none());
        assert!(arr.shift().is_none());
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn t_unwatch() {
        let (arr, count) = counted(&[]);
        let u = arr.watch(|_| ());
        assert_eq!(arr.listener_count(), 2);
        u.unwatch();
        assert_eq!(arr.listener_count(), 1);
        arr.push(1);
        assert_eq!(count.get(), 1);
    }
}
