//! ObservableValue - a single value plus an ordered subscriber list.
//!
//! ```ignore
//! use dynel::reactive::ObservableValue;
//!
//! let count = ObservableValue::new(0);
//! count.subscribe(|v| println!("count is now {v}"));
//! count.set(1); // prints synchronously before returning
//! assert_eq!(count.get(), Some(1));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::Subscription;

type Callback<T> = Rc<dyn Fn(&T)>;

struct ObservableInner<T> {
    name: Option<String>,
    value: Option<T>,
    subscribers: Vec<(u64, Callback<T>)>,
    next_id: u64,
}

/// Shared single-slot container.
///
/// Cloning yields another handle to the same slot and subscriber list.
pub struct ObservableValue<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for ObservableValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ObservableValue")
            .field("name", &inner.name)
            .field("value", &inner.value)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl<T> Default for ObservableValue<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> ObservableValue<T> {
    fn from_parts(name: Option<String>, value: Option<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                name,
                value,
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Create a container seeded with `value`.
    pub fn new(value: T) -> Self {
        Self::from_parts(None, Some(value))
    }

    /// Create an unset container.
    pub fn empty() -> Self {
        Self::from_parts(None, None)
    }

    /// Create an unset container carrying a debug name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::from_parts(Some(name.into()), None)
    }

    pub fn name(&self) -> Option<String> {
        self.inner.borrow().name.clone()
    }

    pub fn is_set(&self) -> bool {
        self.inner.borrow().value.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Whether two handles point at the same slot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> ObservableValue<T> {
    /// Append `callback` to the subscriber list.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, Rc::new(callback)));
            id
        };

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().subscribers.retain(|(sub_id, _)| *sub_id != id);
            }
        })
    }
}

impl<T: Clone> ObservableValue<T> {
    /// Last stored value, `None` if never set.
    pub fn get(&self) -> Option<T> {
        self.inner.borrow().value.clone()
    }

    /// Store `value`, then call every current subscriber with it, in order.
    pub fn set(&self, value: T) {
        // Snapshot so callbacks can re-enter this container freely
        let subscribers: Vec<Callback<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.value = Some(value.clone());
            inner.subscribers.iter().map(|(_, cb)| Rc::clone(cb)).collect()
        };

        for callback in subscribers {
            callback(&value);
        }
    }
}

/// Attach one value-less callback to several containers, in the given order.
///
/// The callback is a generic "something changed" signal and fires once per
/// write to any of them.
pub fn subscribe_all<T: 'static>(
    containers: &[ObservableValue<T>],
    callback: impl Fn() + 'static,
) -> Vec<Subscription> {
    let callback: Rc<dyn Fn()> = Rc::new(callback);
    containers
        .iter()
        .map(|container| {
            let callback = Rc::clone(&callback);
            container.subscribe(move |_| callback())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_get_unset() {
        let obs: ObservableValue<i32> = ObservableValue::empty();
        assert_eq!(obs.get(), None);
        assert!(!obs.is_set());

        let seeded = ObservableValue::new(5);
        assert_eq!(seeded.get(), Some(5));
    }

    #[test]
    fn test_subscribers_fire_in_registration_order() {
        let obs = ObservableValue::empty();
        let log = Rc::new(RefCell::new(Vec::new()));

        for name in ["a", "b", "c"] {
            let log = log.clone();
            obs.subscribe(move |v: &i32| log.borrow_mut().push(format!("{name}({v})")));
        }

        obs.set(7);
        assert_eq!(*log.borrow(), vec!["a(7)", "b(7)", "c(7)"]);
    }

    #[test]
    fn test_dropped_subscription_stays_registered() {
        let obs = ObservableValue::empty();
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();

        drop(obs.subscribe(move |_: &i32| hits_clone.set(hits_clone.get() + 1)));
        obs.set(1);
        obs.set(2);

        assert_eq!(hits.get(), 2);
        assert_eq!(obs.subscriber_count(), 1);
    }

    #[test]
    fn test_cancel_removes_callback() {
        let obs = ObservableValue::empty();
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();

        let sub = obs.subscribe(move |_: &i32| hits_clone.set(hits_clone.get() + 1));
        obs.set(1);
        sub.cancel();
        obs.set(2);

        assert_eq!(hits.get(), 1);
        assert_eq!(obs.subscriber_count(), 0);
    }

    #[test]
    fn test_cancel_during_notification_applies_to_next_write() {
        let obs = ObservableValue::empty();
        let log = Rc::new(RefCell::new(Vec::new()));
        let later: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        {
            let log = log.clone();
            let later = later.clone();
            obs.subscribe(move |v: &i32| {
                log.borrow_mut().push(format!("a({v})"));
                let sub = later.borrow_mut().take();
                if let Some(sub) = sub {
                    sub.cancel();
                }
            });
        }
        {
            let log = log.clone();
            let sub = obs.subscribe(move |v: &i32| log.borrow_mut().push(format!("b({v})")));
            *later.borrow_mut() = Some(sub);
        }

        obs.set(1);
        assert_eq!(*log.borrow(), vec!["a(1)", "b(1)"]);
        assert_eq!(obs.subscriber_count(), 1);

        obs.set(2);
        assert_eq!(*log.borrow(), vec!["a(1)", "b(1)", "a(2)"]);
    }

    #[test]
    fn test_reentrant_set_is_depth_first() {
        let obs = ObservableValue::empty();
        let log = Rc::new(RefCell::new(Vec::new()));

        {
            let obs_inner = obs.clone();
            let log = log.clone();
            obs.subscribe(move |v: &i32| {
                log.borrow_mut().push(format!("first({v})"));
                if *v == 1 {
                    obs_inner.set(2);
                }
            });
        }
        {
            let log = log.clone();
            obs.subscribe(move |v: &i32| log.borrow_mut().push(format!("second({v})")));
        }

        obs.set(1);

        assert_eq!(
            *log.borrow(),
            vec!["first(1)", "first(2)", "second(2)", "second(1)"]
        );
        // Last completed write wins the slot
        assert_eq!(obs.get(), Some(2));
    }

    #[test]
    fn test_subscribe_during_notification_waits_for_next_write() {
        let obs = ObservableValue::empty();
        let late_hits = Rc::new(Cell::new(0));

        {
            let obs_inner = obs.clone();
            let late_hits = late_hits.clone();
            let added = Cell::new(false);
            obs.subscribe(move |_: &i32| {
                if !added.replace(true) {
                    let late_hits = late_hits.clone();
                    obs_inner.subscribe(move |_| late_hits.set(late_hits.get() + 1));
                }
            });
        }

        obs.set(1);
        assert_eq!(late_hits.get(), 0);
        obs.set(2);
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn test_subscribe_all_fires_without_value() {
        let a = ObservableValue::empty();
        let b = ObservableValue::empty();
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();

        subscribe_all(&[a.clone(), b.clone()], move || hits_clone.set(hits_clone.get() + 1));
        a.set(1);
        b.set(2);
        b.set(3);

        assert_eq!(hits.get(), 3);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn last_write_wins(values in proptest::collection::vec(any::<i64>(), 1..50), subs in 0usize..5) {
                let obs = ObservableValue::empty();
                let seen = Rc::new(RefCell::new(Vec::new()));
                for _ in 0..subs {
                    let seen = seen.clone();
                    obs.subscribe(move |v: &i64| seen.borrow_mut().push(*v));
                }
                for v in &values {
                    obs.set(*v);
                }
                prop_assert_eq!(obs.get(), values.last().copied());
                prop_assert_eq!(seen.borrow().len(), values.len() * subs);
            }
        }
    }
}
