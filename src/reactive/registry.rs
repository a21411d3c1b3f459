//! NamedRegistry - string key → ObservableValue.
//!
//! Lets code subscribe, set and get by key without holding a container.
//! A key maps to at most one container for as long as the entry lives;
//! [`get_or_create`](NamedRegistry::get_or_create) never replaces an existing
//! entry, while [`get`](NamedRegistry::get) never fabricates one.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{ObservableValue, Subscription, subscribe_all};

/// Keyed table of observables. Clones share the same table.
pub struct NamedRegistry<T> {
    entries: Rc<RefCell<HashMap<String, ObservableValue<T>>>>,
}

impl<T> Clone for NamedRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<T> Default for NamedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NamedRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Existing container for `name`, or a fresh unset one registered under it.
    pub fn get_or_create(&self, name: &str) -> ObservableValue<T> {
        self.entries
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| ObservableValue::named(name))
            .clone()
    }

    /// Container for `name` if one exists.
    pub fn lookup(&self, name: &str) -> Option<ObservableValue<T>> {
        self.entries.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drop the entry for `name`. Existing handles keep working but are no
    /// longer reachable by key.
    pub fn remove(&self, name: &str) -> Option<ObservableValue<T>> {
        self.entries.borrow_mut().remove(name)
    }

    /// Drop every entry whose key ends with `suffix`. Returns how many went.
    pub fn sweep_suffix(&self, suffix: &str) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|key, _| !key.ends_with(suffix));
        before - entries.len()
    }
}

impl<T: Clone> NamedRegistry<T> {
    /// `set(get_or_create(name), value)`.
    pub fn set(&self, name: &str, value: T) {
        // Entry borrow ends before subscribers run
        let container = self.get_or_create(name);
        container.set(value);
    }

    /// Read without creating. `None` if the key is absent or unset.
    pub fn get(&self, name: &str) -> Option<T> {
        self.lookup(name).and_then(|container| container.get())
    }
}

impl<T: 'static> NamedRegistry<T> {
    /// Subscribe to the container for `name`, creating it if absent.
    pub fn subscribe(&self, name: &str, callback: impl Fn(&T) + 'static) -> Subscription {
        self.get_or_create(name).subscribe(callback)
    }

    /// Attach one value-less callback to each named container, in order.
    pub fn subscribe_keys(&self, names: &[&str], callback: impl Fn() + 'static) -> Vec<Subscription> {
        let containers: Vec<ObservableValue<T>> =
            names.iter().map(|name| self.get_or_create(name)).collect();
        subscribe_all(&containers, callback)
    }
}
