//! Listener registries and the handles that remove registrations.

use std::{fmt::Debug, rc::Rc};
use kstring::KString;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchKey {
    Key(KString),
    /// The wildcard `*`
    All,
}

impl WatchKey {
    pub fn new(key: &str) -> WatchKey {
        if key == "*" {
            WatchKey::All
        } else {
            WatchKey::Key(KString::from_ref(key))
        }
    }
}

/// Registrations in registration order. `L` is the (unsized) listener
/// function type.
pub(crate) struct ListenerList<L: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, WatchKey, Rc<L>)>,
}

impl<L: ?Sized> ListenerList<L> {
    pub fn new() -> Self {
        ListenerList {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, key: WatchKey, listener: Rc<L>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, key, listener));
        id
    }

    pub fn remove(&mut self, id: u64) {
        self.entries.retain(|(i, _, _)| *i != id);
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(i, _, _)| *i == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The listeners to invoke for a change of `key`: those for
    /// exactly that key first, then the wildcard ones, each group in
    /// registration order. With `None`, all listeners in registration
    /// order.
    pub fn snapshot(&self, key: Option<&str>) -> Vec<(u64, Rc<L>)> {
        match key {
            None => self.entries.iter().map(|(id, _, l)| (*id, l.clone())).collect(),
            Some(key) => {
                let specific = self.entries.iter().filter(
                    |(_, k, _)| matches!(k, WatchKey::Key(k) if k.as_str() == key));
                let wildcard = self.entries.iter().filter(
                    |(_, k, _)| *k == WatchKey::All);
                specific.chain(wildcard).map(|(id, _, l)| (*id, l.clone())).collect()
            }
        }
    }
}

/// Removes the registration(s) it was returned for. Can be called any
/// number of times, including from within a listener; dropping it does
/// *not* unregister anything.
#[derive(Clone)]
pub struct Unwatch(Rc<dyn Fn()>);

impl Unwatch {
    pub fn new(f: impl Fn() + 'static) -> Unwatch {
        Unwatch(Rc::new(f))
    }

    pub fn noop() -> Unwatch {
        Unwatch::new(|| ())
    }

    /// Unwatches all of `unwatchers`, in order.
    pub fn all(unwatchers: Vec<Unwatch>) -> Unwatch {
        Unwatch::new(move || {
            for u in &unwatchers {
                u.unwatch();
            }
        })
    }

    pub fn unwatch(&self) {
        (self.0)()
    }
}

impl Debug for Unwatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Unwatch")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_snapshot_order() {
        let mut l: ListenerList<str> = ListenerList::new();
        let all1 = l.add(WatchKey::All, Rc::from("all1"));
        let a1 = l.add(WatchKey::new("a"), Rc::from("a1"));
        let _b = l.add(WatchKey::new("b"), Rc::from("b"));
        let all2 = l.add(WatchKey::new("*"), Rc::from("all2"));
        let a2 = l.add(WatchKey::new("a"), Rc::from("a2"));
        let names = |v: Vec<(u64, Rc<str>)>| -> Vec<String> {
            v.iter().map(|(_, s)| s.to_string()).collect()
        };
        assert_eq!(names(l.snapshot(Some("a"))), ["a1", "a2", "all1", "all2"]);
        assert_eq!(names(l.snapshot(None)), ["all1", "a1", "b", "all2", "a2"]);
        l.remove(a1);
        l.remove(a1);
        assert!(!l.contains(a1));
        assert!(l.contains(a2) && l.contains(all1) && l.contains(all2));
        assert_eq!(l.len(), 4);
    }
}
