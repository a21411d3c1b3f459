//! TemplateCache - fetch once, instantiate many.
//!
//! Each template kind moves through `Unrequested → Pending → Ready`. The first
//! requester issues the load and registers an empty rendezvous
//! [`ObservableValue`] under the kind; anyone arriving while it is pending
//! subscribes to that container instead of loading again. When the load
//! resolves, the first requester's callback runs, then the fragment is stored
//! in the container, which wakes every queued waiter.
//!
//! # Failure
//!
//! A failed load is handed to the first requester and to every waiter (each
//! exactly once), and the kind goes back to `Unrequested`, so the next
//! request retries with a fresh load.
//!
//! The cached fragment is shared by all instances and must be treated as
//! read-only; assembly always works on a deep copy.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::task::{LocalSpawn, LocalSpawnExt};

use crate::error::TemplateError;
use crate::reactive::{NamedRegistry, ObservableValue};

/// Outcome delivered to every requester.
pub type TemplateResult<N> = Result<N, TemplateError>;

/// Future producing a materialized fragment.
pub type TemplateLoad<N> = LocalBoxFuture<'static, TemplateResult<N>>;

type Callback<N> = Box<dyn FnOnce(TemplateResult<N>)>;
type CallbackSlot<N> = Rc<RefCell<Option<Callback<N>>>>;

/// Where a template kind is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateState {
    Unrequested,
    Pending,
    Ready,
}

/// Single-flight cache of template fragments keyed by kind.
pub struct TemplateCache<N> {
    rendezvous: NamedRegistry<TemplateResult<N>>,
    spawner: Rc<dyn LocalSpawn>,
}

impl<N> Clone for TemplateCache<N> {
    fn clone(&self) -> Self {
        Self {
            rendezvous: self.rendezvous.clone(),
            spawner: Rc::clone(&self.spawner),
        }
    }
}

impl<N: Clone + 'static> TemplateCache<N> {
    /// Loads are driven by `spawner` (e.g. `LocalPool::spawner()`).
    pub fn new(spawner: impl LocalSpawn + 'static) -> Self {
        Self {
            rendezvous: NamedRegistry::new(),
            spawner: Rc::new(spawner),
        }
    }

    pub fn state(&self, kind: &str) -> TemplateState {
        match self.rendezvous.lookup(kind) {
            None => TemplateState::Unrequested,
            Some(container) if container.is_set() => TemplateState::Ready,
            Some(_) => TemplateState::Pending,
        }
    }

    /// Cached fragment for `kind`, if ready.
    pub fn cached(&self, kind: &str) -> Option<N> {
        self.rendezvous.get(kind).and_then(Result::ok)
    }

    /// Kinds currently pending or ready.
    pub fn kinds(&self) -> Vec<String> {
        self.rendezvous.keys()
    }

    /// Request the fragment for `kind`.
    ///
    /// - Ready: `on_result` runs now, synchronously.
    /// - Pending: `on_result` is queued on the rendezvous container.
    /// - Unrequested: `load` is called to issue the fetch; `on_result` runs
    ///   when it resolves.
    ///
    /// `load` is only called in the unrequested case.
    pub fn fetch<L, F>(&self, kind: &str, load: L, on_result: F)
    where
        L: FnOnce() -> TemplateLoad<N>,
        F: FnOnce(TemplateResult<N>) + 'static,
    {
        if let Some(container) = self.rendezvous.lookup(kind) {
            match container.get() {
                Some(ready) => {
                    tracing::trace!(kind, "template.cache_hit");
                    on_result(ready);
                }
                None => {
                    tracing::debug!(kind, waiters = container.subscriber_count() + 1, "template.coalesced");
                    let slot: CallbackSlot<N> = Rc::new(RefCell::new(Some(Box::new(on_result))));
                    container.subscribe(move |result: &TemplateResult<N>| {
                        let callback = slot.borrow_mut().take();
                        if let Some(callback) = callback {
                            callback(result.clone());
                        }
                    });
                }
            }
            return;
        }

        let container = self.rendezvous.get_or_create(kind);
        tracing::debug!(kind, "template.fetch_issued");

        let first: CallbackSlot<N> = Rc::new(RefCell::new(Some(Box::new(on_result))));
        let pending = load();

        let cache = self.clone();
        let task_kind = kind.to_string();
        let task_container = container.clone();
        let task_first = Rc::clone(&first);
        let task = async move {
            let result = pending.await;
            cache.complete(&task_kind, &task_container, &task_first, result);
        };

        if let Err(err) = self.spawner.spawn_local(task) {
            let error = TemplateError::Spawn {
                kind: kind.to_string(),
                message: err.to_string(),
            };
            self.complete(kind, &container, &first, Err(error));
        }
    }

    /// Warm `kind` without a consumer.
    pub fn preload<L>(&self, kind: &str, load: L)
    where
        L: FnOnce() -> TemplateLoad<N>,
    {
        self.fetch(kind, load, |_| {});
    }

    fn complete(
        &self,
        kind: &str,
        container: &ObservableValue<TemplateResult<N>>,
        first: &CallbackSlot<N>,
        result: TemplateResult<N>,
    ) {
        let callback = first.borrow_mut().take();

        match result {
            Ok(fragment) => {
                tracing::debug!(kind, waiters = container.subscriber_count(), "template.ready");
                if let Some(callback) = callback {
                    callback(Ok(fragment.clone()));
                }
                container.set(Ok(fragment));
            }
            Err(error) => {
                tracing::warn!(kind, waiters = container.subscriber_count(), %error, "template.failed");
                // Back to unrequested before anyone is told, so a retry from
                // inside a callback issues a fresh load
                let current = self.rendezvous.lookup(kind);
                if current.is_some_and(|current| current.ptr_eq(container)) {
                    self.rendezvous.remove(kind);
                }
                if let Some(callback) = callback {
                    callback(Err(error.clone()));
                }
                container.set(Err(error));
            }
        }
    }
}
