//! Reactive key/value scopes.
//!
//! All reads and writes go through `get`/`set` (and the path
//! variants); every mutation of a key notifies the listeners
//! registered for that key, then the wildcard listeners, synchronously
//! before `set` returns.

use std::{cell::{Cell, RefCell},
          collections::HashMap,
          fmt::Debug,
          rc::{Rc, Weak}};
use anyhow::Result;
use indexmap::IndexMap;
use kstring::KString;

use webi_util::trace;

use crate::{error::{webi_error, WebiErrorKind},
            listeners::{ListenerList, Unwatch, WatchKey},
            observable_array::ObservableArray,
            path_access,
            value::Value};

/// What a listener is told about a change. `old` is `None` when the
/// key did not exist before (or, for path watchers, when the old value
/// at the path is not known).
#[derive(Debug, Clone, Copy)]
pub struct Change<'a> {
    pub key: &'a str,
    pub value: &'a Value,
    pub old: Option<&'a Value>,
}

pub type Listener = dyn Fn(&Change);

struct Inner {
    data: RefCell<IndexMap<KString, Value>>,
    listeners: RefCell<ListenerList<Listener>>,
    /// Subscriptions on ObservableArray values, forwarding their
    /// mutations as a change of the key they are stored under.
    forwarders: RefCell<HashMap<KString, Unwatch>>,
    parent: Option<WeakObservable>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for (_, forwarder) in self.forwarders.get_mut().drain() {
            forwarder.unwatch();
        }
    }
}

#[derive(Clone)]
pub struct Observable(Rc<Inner>);

/// Non-owning reference to an Observable.
#[derive(Clone)]
pub struct WeakObservable(Weak<Inner>);

impl WeakObservable {
    pub fn upgrade(&self) -> Option<Observable> {
        self.0.upgrade().map(Observable)
    }
}

impl Debug for WeakObservable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WeakObservable")
    }
}

impl Default for Observable {
    fn default() -> Self {
        Observable::new()
    }
}

impl Observable {
    fn with_parent_option(parent: Option<WeakObservable>) -> Observable {
        Observable(Rc::new(Inner {
            data: RefCell::new(IndexMap::new()),
            listeners: RefCell::new(ListenerList::new()),
            forwarders: RefCell::new(HashMap::new()),
            parent,
        }))
    }

    pub fn new() -> Observable {
        Observable::with_parent_option(None)
    }

    /// An empty scope whose `parent()` is `parent`. The parent does
    /// not own (or know about) it.
    pub fn with_parent(parent: &Observable) -> Observable {
        Observable::with_parent_option(Some(parent.downgrade()))
    }

    /// Builds a scope from a `Value::Map` (entries are `set` one by
    /// one, so nested values get promoted); an `Object` is returned
    /// as is.
    pub fn from_value(value: &Value, parent: Option<&Observable>) -> Result<Observable> {
        match value {
            Value::Object(o) => Ok(o.clone()),
            Value::Map(m) => {
                let o = Observable::with_parent_option(parent.map(Observable::downgrade));
                let entries: Vec<(KString, Value)> = m.borrow().iter()
                    .map(|(k, v)| (k.clone(), v.clone())).collect();
                for (k, v) in entries {
                    o.set(&k, v);
                }
                Ok(o)
            }
            v => Err(webi_error(WebiErrorKind::InvalidArgument(
                format!("an Observable can only be made from an object, got {v:?}")))),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Result<Observable> {
        Observable::from_value(&Value::from(json), None)
    }

    pub fn downgrade(&self) -> WeakObservable {
        WeakObservable(Rc::downgrade(&self.0))
    }

    pub fn parent(&self) -> Option<Observable> {
        self.0.parent.as_ref().and_then(WeakObservable::upgrade)
    }

    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ------------------------------------------------------------------
    // Reading

    /// The value of an own key, no path splitting.
    pub fn get_own(&self, key: &str) -> Option<Value> {
        self.0.data.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.data.borrow().contains_key(key)
    }

    /// Resolves the dotted `path`; see `path_access::resolve` for the
    /// treatment of arrays.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        path_access::resolve(&Value::Object(self.clone()), path)
    }

    pub fn get(&self, path: &str, default: impl Into<Value>) -> Value {
        match self.lookup(path) {
            Some(v) => v,
            None => default.into(),
        }
    }

    pub fn keys(&self) -> Vec<KString> {
        self.0.data.borrow().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(KString, Value)> {
        self.0.data.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.0.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.data.borrow().is_empty()
    }

    /// Calls `f` for each own key in insertion order. Iterates over a
    /// copy taken when called: `f` may mutate self, but the iteration
    /// does not see those mutations.
    pub fn for_each(&self, mut f: impl FnMut(&str, &Value)) {
        for (k, v) in self.entries() {
            f(&k, &v);
        }
    }

    /// Shallow: nested observables are kept as `Value::Object`.
    pub fn to_object(&self) -> IndexMap<KString, Value> {
        self.0.data.borrow().clone()
    }

    /// Deep conversion.
    pub fn to_json(&self) -> serde_json::Value {
        Value::Object(self.clone()).to_json()
    }

    /// Keys in insertion order.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&Value::Object(self.clone()))?)
    }

    // ------------------------------------------------------------------
    // Writing

    fn promote(&self, old: Option<&Value>, value: Value) -> Value {
        match value {
            Value::Map(_) if !old.map_or(false, Value::is_structured) => {
                match Observable::from_value(&value, Some(self)) {
                    Ok(o) => Value::Object(o),
                    Err(_) => value,
                }
            }
            Value::List(l) => {
                let items = l.borrow().clone();
                Value::Array(ObservableArray::from_values(items))
            }
            v => v,
        }
    }

    fn update_forwarder(&self, key: &str, value: &Value) {
        let previous = self.0.forwarders.borrow_mut().remove(key);
        if let Some(previous) = previous {
            previous.unwatch();
        }
        if let Value::Array(arr) = value {
            let owner = self.downgrade();
            let k = KString::from_ref(key);
            let unwatch = arr.watch(move |arr| {
                if let Some(owner) = owner.upgrade() {
                    let v = Value::Array(arr.clone());
                    owner.trigger(&k, &v, Some(&v));
                }
            });
            self.0.forwarders.borrow_mut().insert(KString::from_ref(key), unwatch);
        }
    }

    /// Sets an own key (no path splitting). Plain maps are promoted to
    /// nested Observables (unless the key held a structured value
    /// already), plain lists to ObservableArrays. Notifies only if the
    /// key is new or the value differs by identity.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let old = self.get_own(key);
        let value = self.promote(old.as_ref(), value.into());
        if let Some(old) = &old {
            if old.same(&value) {
                return
            }
        }
        trace!("set {key:?} = {value:?}");
        self.0.data.borrow_mut().insert(KString::from_ref(key), value.clone());
        self.update_forwarder(key, &value);
        self.trigger(key, &value, old.as_ref());
    }

    /// `set` for a dotted path, creating missing intermediate maps; see
    /// `path_access::assign`.
    pub fn path_set(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        path_access::assign(self, path, value.into())
    }

    /// Calls the listeners for `key` (then the wildcard ones) as if
    /// `key` changed from `old` to `value`.
    pub(crate) fn trigger(&self, key: &str, value: &Value, old: Option<&Value>) {
        let listeners = self.0.listeners.borrow().snapshot(Some(key));
        let change = Change { key, value, old };
        for (id, listener) in listeners {
            // might have been removed by a previous listener
            if self.0.listeners.borrow().contains(id) {
                listener(&change);
            }
        }
    }

    // ------------------------------------------------------------------
    // Watching

    fn add_listener(&self, key: WatchKey, listener: Rc<Listener>) -> Unwatch {
        let id = self.0.listeners.borrow_mut().add(key, listener);
        let inner = Rc::downgrade(&self.0);
        Unwatch::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.borrow_mut().remove(id);
            }
        })
    }

    /// Watches `key`, or all keys if `key` is `"*"`.
    pub fn watch(&self, key: &str, listener: impl Fn(&Change) + 'static) -> Unwatch {
        self.add_listener(WatchKey::new(key), Rc::new(listener))
    }

    /// One listener for several keys; the returned handle removes all
    /// of those registrations.
    pub fn watch_keys(&self, keys: &[&str], listener: impl Fn(&Change) + 'static) -> Unwatch {
        let listener: Rc<Listener> = Rc::new(listener);
        Unwatch::all(
            keys.iter().map(|k| self.add_listener(WatchKey::new(k), listener.clone()))
                .collect())
    }

    pub fn watch_all(&self, listener: impl Fn(&Change) + 'static) -> Unwatch {
        self.add_listener(WatchKey::All, Rc::new(listener))
    }

    /// Watches a dotted path through nested observables: the listener
    /// is called when the final key changes, or when any intermediate
    /// key is replaced (then with the newly resolved value, and `old`
    /// set to `None`). `key` in the change is the whole path.
    pub fn watch_path(&self, path: &str, listener: impl Fn(&Change) + 'static) -> Unwatch {
        if !path.contains('.') {
            return self.watch(path, listener)
        }
        let watcher = Rc::new(PathWatcher {
            root: self.downgrade(),
            path: KString::from_ref(path),
            parts: path.split('.').map(KString::from_ref).collect(),
            listener: Box::new(listener),
            subscriptions: RefCell::new(Vec::new()),
            active: Cell::new(true),
        });
        watcher.subscribe();
        Unwatch::new(move || watcher.deactivate())
    }

    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }
}

struct PathWatcher {
    root: WeakObservable,
    path: KString,
    parts: Vec<KString>,
    listener: Box<Listener>,
    subscriptions: RefCell<Vec<Unwatch>>,
    active: Cell<bool>,
}

impl PathWatcher {
    fn unsubscribe(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.borrow_mut());
        for s in subscriptions {
            s.unwatch();
        }
    }

    /// (Re-)registers on every observable along the path, as far as
    /// the path currently resolves through observables.
    fn subscribe(self: &Rc<Self>) {
        self.unsubscribe();
        let mut current = match self.root.upgrade() {
            Some(root) => root,
            None => return,
        };
        let mut subscriptions = Vec::new();
        for (i, part) in self.parts.iter().enumerate() {
            let watcher = self.clone();
            let is_last = i + 1 == self.parts.len();
            subscriptions.push(current.watch(part, move |change| {
                watcher.changed(is_last, change)
            }));
            if is_last {
                break
            }
            match path_access::step(&Value::Object(current.clone()), part) {
                Some(Value::Object(next)) => current = next,
                _ => break,
            }
        }
        *self.subscriptions.borrow_mut() = subscriptions;
    }

    fn changed(self: &Rc<Self>, is_last: bool, change: &Change) {
        if !self.active.get() {
            return
        }
        if is_last {
            (self.listener)(&Change { key: &self.path, ..*change });
        } else {
            self.subscribe();
            let root = match self.root.upgrade() {
                Some(root) => root,
                None => return,
            };
            let value = root.get(&self.path, Value::Null);
            (self.listener)(&Change { key: &self.path, value: &value, old: None });
        }
    }

    fn deactivate(&self) {
        self.active.set(false);
        self.unsubscribe();
    }
}

impl Debug for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Observable")?;
        f.debug_map().entries(self.entries()).finish()
    }
}
