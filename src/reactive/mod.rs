//! Reactive primitives - observable values, keyed registry, event bus.
//!
//! - [`ObservableValue`]: single-slot container that notifies subscribers on
//!   every write
//! - [`NamedRegistry`]: string key → `ObservableValue` with get-or-create
//! - [`EventBus`]: named fire-and-forget multicast channels
//! - [`Subscription`]: handle returned by every subscribe call
//!
//! # Notification contract
//!
//! All fan-out is synchronous and runs on the calling turn. Callbacks fire in
//! registration order. No interior borrow is held while a callback runs, so a
//! callback may write, read, subscribe or trigger again; a nested write
//! finishes notifying before the outer write continues (depth-first).
//!
//! Subscriber lists are append-only: dropping a [`Subscription`] keeps the
//! callback registered. Removal only happens through
//! [`Subscription::cancel`].

mod bus;
mod observable;
mod registry;

pub use bus::*;
pub use observable::*;
pub use registry::*;

/// Handle for a registered callback.
///
/// Dropping it does nothing; call [`cancel`](Subscription::cancel) to remove
/// the callback. A cancel issued during a notification pass takes effect from
/// the next pass.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the callback from its list.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
