//! EventBus - named multicast channels.
//!
//! Separate namespace from [`NamedRegistry`](super::NamedRegistry): an event
//! named `count` and an observable keyed `count` never meet.
//!
//! ```ignore
//! let bus = EventBus::new();
//! bus.add_listener("saved", |payload| println!("saved: {payload:?}"));
//! bus.trigger("saved", &EventPayload::None);
//! bus.trigger("nobody-listens", &EventPayload::None); // silent no-op
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::Subscription;

type Listener<P> = Rc<dyn Fn(&P)>;

struct BusInner<P> {
    channels: HashMap<String, Vec<(u64, Listener<P>)>>,
    next_id: u64,
}

/// Event channels keyed by name. Clones share the same channels.
pub struct EventBus<P> {
    inner: Rc<RefCell<BusInner<P>>>,
}

impl<P> Clone for EventBus<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> EventBus<P> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(BusInner {
                channels: HashMap::new(),
                next_id: 0,
            })),
        }
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.inner.borrow().channels.contains_key(name)
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.inner
            .borrow()
            .channels
            .get(name)
            .map_or(0, |listeners| listeners.len())
    }
}

impl<P: 'static> EventBus<P> {
    /// Get-or-create the channel `name` and append `listener`.
    pub fn add_listener(&self, name: &str, listener: impl Fn(&P) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner
                .channels
                .entry(name.to_string())
                .or_default()
                .push((id, Rc::new(listener)));
            id
        };

        let weak = Rc::downgrade(&self.inner);
        let name = name.to_string();
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Some(listeners) = inner.borrow_mut().channels.get_mut(&name) {
                    listeners.retain(|(listener_id, _)| *listener_id != id);
                }
            }
        })
    }

    /// Call every listener of `name` with `payload`, in order.
    ///
    /// Returns how many listeners ran; an unknown channel is a silent no-op.
    pub fn trigger(&self, name: &str, payload: &P) -> usize {
        let listeners: Vec<Listener<P>> = {
            let inner = self.inner.borrow();
            match inner.channels.get(name) {
                Some(listeners) => listeners.iter().map(|(_, l)| Rc::clone(l)).collect(),
                None => return 0,
            }
        };

        tracing::trace!(event = name, listeners = listeners.len(), "event.trigger");
        for listener in &listeners {
            listener(payload);
        }
        listeners.len()
    }
}
