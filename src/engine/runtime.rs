//! Runtime - the context object every subsystem is reached through.
//!
//! One `Runtime` owns one set of tables: keyed values, event channels,
//! component definitions, live instances, the template cache and the current
//! configuration. Nothing is global, so independent runtimes can coexist in
//! one process and tests stay hermetic.
//!
//! # Example
//!
//! ```ignore
//! use dynel::{MemoryDocument, MemoryFetcher, Runtime, Value};
//! use futures::executor::LocalPool;
//!
//! let mut pool = LocalPool::new();
//! let doc = MemoryDocument::from_markup("<x-counter prop-start=\"3\"></x-counter>")?;
//! let fetcher = MemoryFetcher::new()
//!     .with("/components/x-counter.dynel.html", "<span ref=\"out\"></span>");
//! let runtime = Runtime::new(doc, fetcher, pool.spawner());
//!
//! runtime.define("x-counter", None, false)?;
//! let host = runtime.document().first_by_tag("x-counter").unwrap();
//! let id = runtime.attach(&host)?;
//! pool.run_until_stalled();
//!
//! assert_eq!(runtime.get_prop(&id, "start"), Some(Value::from("3")));
//! ```

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use futures::future::FutureExt;
use futures::task::LocalSpawn;

use super::registry::{Definition, InstanceRegistry, Lifecycle, instance_key, instance_key_suffix};
use super::script::{ScriptHost, TracingScriptHost};
use crate::config::{Config, ConfigPatch};
use crate::dom::Document;
use crate::error::{Error, Result, TemplateError};
use crate::pipeline::{Fetcher, TemplateCache, TemplateLoad, TemplateResult, TemplateState};
use crate::reactive::{EventBus, NamedRegistry, Subscription};
use crate::types::{EventPayload, InstanceId, Value};

/// Attribute carrying an attached host's instance id.
pub const INSTANCE_ATTRIBUTE: &str = "data-instance";

pub(crate) struct RuntimeInner<D: Document> {
    pub(crate) document: Rc<RefCell<D>>,
    pub(crate) config: RefCell<Config>,
    pub(crate) values: NamedRegistry<Value>,
    pub(crate) events: EventBus<EventPayload>,
    pub(crate) templates: TemplateCache<D::Node>,
    pub(crate) instances: RefCell<InstanceRegistry<D::Node>>,
    pub(crate) fetcher: Rc<dyn Fetcher>,
    pub(crate) scripts: RefCell<Rc<dyn ScriptHost<D>>>,
}

/// Shared handle to one component runtime. Clones are cheap and share state.
pub struct Runtime<D: Document> {
    pub(crate) inner: Rc<RuntimeInner<D>>,
}

impl<D: Document> Clone for Runtime<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<D: Document + 'static> Runtime<D> {
    /// Build a runtime over `document`.
    ///
    /// Template fetches are issued through `fetcher` and driven by `spawner`.
    pub fn new(
        document: D,
        fetcher: impl Fetcher + 'static,
        spawner: impl LocalSpawn + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                document: Rc::new(RefCell::new(document)),
                config: RefCell::new(Config::default()),
                values: NamedRegistry::new(),
                events: EventBus::new(),
                templates: TemplateCache::new(spawner),
                instances: RefCell::new(InstanceRegistry::new()),
                fetcher: Rc::new(fetcher),
                scripts: RefCell::new(Rc::new(TracingScriptHost)),
            }),
        }
    }

    /// Install the host that runs bound `<script>` text.
    pub fn with_script_host(self, host: impl ScriptHost<D> + 'static) -> Self {
        self.set_script_host(host);
        self
    }

    pub fn set_script_host(&self, host: impl ScriptHost<D> + 'static) {
        *self.inner.scripts.borrow_mut() = Rc::new(host);
    }

    /// Make instance ids reproducible.
    pub fn with_id_seed(self, seed: u64) -> Self {
        self.inner.instances.borrow_mut().reseed(seed);
        self
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner<D>> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn script_host(&self) -> Rc<dyn ScriptHost<D>> {
        Rc::clone(&self.inner.scripts.borrow())
    }

    // =========================================================================
    // Shared tables
    // =========================================================================

    /// Borrow the document. Do not hold the guard across runtime calls.
    pub fn document(&self) -> Ref<'_, D> {
        self.inner.document.borrow()
    }

    /// Mutably borrow the document. Do not hold the guard across runtime calls.
    pub fn document_mut(&self) -> RefMut<'_, D> {
        self.inner.document.borrow_mut()
    }

    /// Keyed values (props, state and anything else set by key).
    pub fn values(&self) -> &NamedRegistry<Value> {
        &self.inner.values
    }

    pub fn events(&self) -> &EventBus<EventPayload> {
        &self.inner.events
    }

    pub fn templates(&self) -> &TemplateCache<D::Node> {
        &self.inner.templates
    }

    pub fn config(&self) -> Config {
        self.inner.config.borrow().clone()
    }

    /// Update process-wide defaults. Only later fetches see the change.
    pub fn configure(&self, patch: ConfigPatch) {
        tracing::debug!(?patch, "runtime.configure");
        self.inner.config.borrow_mut().apply(patch);
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    /// Register component `tag`, assembled from template `source_kind`
    /// (defaults to the tag name).
    pub fn define(&self, tag: &str, source_kind: Option<&str>, isolated: bool) -> Result<()> {
        let definition = Definition::new(tag, source_kind, isolated);
        let tag = definition.tag.clone();
        let kind = definition.kind.clone();
        if !self.inner.instances.borrow_mut().define(definition) {
            return Err(Error::AlreadyDefined { tag });
        }
        tracing::debug!(tag = %tag, kind = %kind, isolated, "component.defined");
        Ok(())
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.inner.instances.borrow().is_defined(tag)
    }

    /// Start fetching the template for `kind` ahead of any instance.
    pub fn preload(&self, kind: &str) {
        let load = self.template_loader(kind);
        self.inner.templates.preload(kind, load);
    }

    pub fn template_state(&self, kind: &str) -> TemplateState {
        self.inner.templates.state(kind)
    }

    // =========================================================================
    // Instance lifecycle
    // =========================================================================

    /// Attach a component instance to `host`, whose tag must be defined.
    ///
    /// Returns the existing id if `host` is already attached. Assembly happens
    /// once the template is available, possibly before this returns.
    pub fn attach(&self, host: &D::Node) -> Result<InstanceId> {
        if let Some(existing) = self.instance_of(host) {
            return Ok(existing);
        }

        let tag = self.document().tag_name(host).ok_or(Error::NotAnElement)?;
        let definition = self
            .inner
            .instances
            .borrow()
            .definition(&tag)
            .cloned()
            .ok_or_else(|| Error::UndefinedTag { tag: tag.clone() })?;

        let root = if definition.isolated {
            self.document_mut().attach_isolated_root(host)
        } else {
            host.clone()
        };

        let id = self
            .inner
            .instances
            .borrow_mut()
            .allocate(host.clone(), root, &definition);
        self.document_mut()
            .set_attribute(host, INSTANCE_ATTRIBUTE, id.as_str());
        tracing::debug!(instance = %id, tag = %tag, kind = %definition.kind, "component.attached");

        self.inner
            .instances
            .borrow_mut()
            .set_lifecycle(&id, Lifecycle::AwaitingTemplate);
        self.request_template(&id, &definition.kind);
        Ok(id)
    }

    /// Attach every defined, not yet attached element below `node`.
    ///
    /// Returns the ids attached by this call, in document order.
    pub fn upgrade(&self, node: &D::Node) -> Vec<InstanceId> {
        let candidates: Vec<D::Node> = {
            let doc = self.document();
            let instances = self.inner.instances.borrow();
            doc.descendants(node)
                .into_iter()
                .filter(|candidate| {
                    doc.tag_name(candidate)
                        .is_some_and(|tag| instances.is_defined(&tag))
                        && instances.instance_of(candidate).is_none()
                })
                .collect()
        };

        // Attaching can assemble synchronously, so no borrows are held here
        candidates
            .iter()
            .filter_map(|candidate| match self.attach(candidate) {
                Ok(id) => Some(id),
                Err(error) => {
                    tracing::warn!(%error, "component.upgrade_failed");
                    None
                }
            })
            .collect()
    }

    /// Tear down instance `id`: nested instances first, then detach callbacks,
    /// then every keyed value ending in `.id`.
    ///
    /// Returns `false` if `id` was not attached.
    pub fn detach(&self, id: &InstanceId) -> bool {
        let Some(root) = self.inner.instances.borrow().record(id).map(|r| r.root.clone()) else {
            return false;
        };

        let nested: Vec<InstanceId> = {
            let doc = self.document();
            let instances = self.inner.instances.borrow();
            doc.descendants(&root)
                .iter()
                .filter_map(|node| instances.instance_of(node))
                .collect()
        };
        for child in nested.iter().rev() {
            self.detach(child);
        }

        let released = self.inner.instances.borrow_mut().release(id);
        let Some((record, callbacks)) = released else {
            return false;
        };
        for callback in callbacks {
            callback();
        }

        let swept = self.inner.values.sweep_suffix(&instance_key_suffix(id));
        tracing::debug!(instance = %id, kind = %record.kind, swept, "component.detached");
        true
    }

    /// Run `callback` when `id` is detached.
    pub fn on_detach(&self, id: &InstanceId, callback: impl FnOnce() + 'static) {
        self.inner.instances.borrow_mut().on_detach(id, callback);
    }

    pub fn instance_of(&self, host: &D::Node) -> Option<InstanceId> {
        self.inner.instances.borrow().instance_of(host)
    }

    pub fn lifecycle(&self, id: &InstanceId) -> Option<Lifecycle> {
        self.inner.instances.borrow().lifecycle(id)
    }

    pub fn instance_ids(&self) -> Vec<InstanceId> {
        self.inner.instances.borrow().ids()
    }

    pub fn host(&self, id: &InstanceId) -> Option<D::Node> {
        self.inner.instances.borrow().record(id).map(|r| r.host.clone())
    }

    /// Where the instance's content lives: the host, or its isolated root.
    pub fn root(&self, id: &InstanceId) -> Option<D::Node> {
        self.inner.instances.borrow().record(id).map(|r| r.root.clone())
    }

    pub fn kind(&self, id: &InstanceId) -> Option<String> {
        self.inner.instances.borrow().record(id).map(|r| r.kind.clone())
    }

    pub(crate) fn set_lifecycle(&self, id: &InstanceId, lifecycle: Lifecycle) -> bool {
        self.inner.instances.borrow_mut().set_lifecycle(id, lifecycle)
    }

    // =========================================================================
    // Template acquisition
    // =========================================================================

    fn template_loader(&self, kind: &str) -> impl FnOnce() -> TemplateLoad<D::Node> + 'static {
        let kind = kind.to_string();
        let fetcher = Rc::clone(&self.inner.fetcher);
        let document = Rc::clone(&self.inner.document);
        let url = self.inner.config.borrow().template_url(&kind);

        move || {
            tracing::debug!(kind = %kind, url = %url, "template.request");
            let request = fetcher.fetch(&url);
            async move {
                let text = match request.await {
                    Ok(text) => text,
                    Err(source) => return Err(TemplateError::Fetch { kind, source }),
                };
                if text.trim().is_empty() {
                    return Err(TemplateError::Empty { kind });
                }
                document
                    .borrow_mut()
                    .parse_fragment(&text)
                    .map_err(|source| TemplateError::Parse { kind, source })
            }
            .boxed_local()
        }
    }

    fn request_template(&self, id: &InstanceId, kind: &str) {
        let weak = self.downgrade();
        let id = id.clone();
        let load = self.template_loader(kind);

        self.inner.templates.fetch(kind, load, move |result| {
            if let Some(inner) = weak.upgrade() {
                Runtime { inner }.template_arrived(&id, result);
            }
        });
    }

    fn template_arrived(&self, id: &InstanceId, result: TemplateResult<D::Node>) {
        if self.lifecycle(id).is_none() {
            tracing::trace!(instance = %id, "template.instance_gone");
            return;
        }

        match result {
            Ok(fragment) => self.assemble(id, &fragment),
            Err(error) => {
                let kind = error.kind().to_string();
                tracing::warn!(instance = %id, %error, "component.template_unavailable");
                self.set_lifecycle(id, Lifecycle::Failed);
                self.emit(&format!("error:{kind}"), EventPayload::Instance(id.clone()));
            }
        }
    }

    // =========================================================================
    // Props
    // =========================================================================

    /// Set prop `name` and reflect it onto the host's prefixed attribute.
    ///
    /// The attribute is written before subscribers are notified.
    pub fn set_prop(&self, id: &InstanceId, name: &str, value: impl Into<Value>) {
        let value = value.into();
        if let Some(host) = self.host(id) {
            let attribute = format!("{}{}", self.inner.config.borrow().prop_prefix, name);
            self.document_mut()
                .set_attribute(&host, &attribute, &value.to_string());
        }
        self.inner.values.set(&instance_key(name, id), value);
    }

    pub fn get_prop(&self, id: &InstanceId, name: &str) -> Option<Value> {
        self.inner.values.get(&instance_key(name, id))
    }

    pub fn on_prop(&self, id: &InstanceId, name: &str, callback: impl Fn(&Value) + 'static) -> Subscription {
        self.inner.values.subscribe(&instance_key(name, id), callback)
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Set internal state `name`. Never visible as an attribute.
    pub fn set_state(&self, id: &InstanceId, name: &str, value: impl Into<Value>) {
        self.inner.values.set(&instance_key(name, id), value.into());
    }

    pub fn get_state(&self, id: &InstanceId, name: &str) -> Option<Value> {
        self.inner.values.get(&instance_key(name, id))
    }

    pub fn on_state(&self, id: &InstanceId, name: &str, callback: impl Fn(&Value) + 'static) -> Subscription {
        self.inner.values.subscribe(&instance_key(name, id), callback)
    }

    // =========================================================================
    // Refs
    // =========================================================================

    /// First node in the instance's root whose ref attribute equals `name`.
    ///
    /// Re-queried on every call.
    pub fn refs(&self, id: &InstanceId, name: &str) -> Option<D::Node> {
        let root = self.root(id)?;
        let attribute = self.inner.config.borrow().ref_attribute.clone();
        self.document().find_by_attribute(&root, &attribute, name)
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn on(&self, event: &str, callback: impl Fn(&EventPayload) + 'static) -> Subscription {
        self.inner.events.add_listener(event, callback)
    }

    /// Fire `event`. Returns how many listeners ran.
    pub fn emit(&self, event: &str, payload: impl Into<EventPayload>) -> usize {
        self.inner.events.trigger(event, &payload.into())
    }

    /// Listen for `ready:<kind>`.
    pub fn on_ready(&self, kind: &str, callback: impl Fn(&InstanceId) + 'static) -> Subscription {
        self.on(&format!("ready:{kind}"), move |payload| {
            if let Some(id) = payload.instance() {
                callback(id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;
    use crate::pipeline::MemoryFetcher;
    use futures::executor::LocalPool;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn ready_runtime(pool: &mut LocalPool) -> (Runtime<MemoryDocument>, InstanceId) {
        let doc = MemoryDocument::from_markup("<x-a></x-a>").unwrap();
        let fetcher = MemoryFetcher::new().with("/components/x-a.dynel.html", "<b ref=\"b\">b</b>");
        let runtime = Runtime::new(doc, fetcher, pool.spawner()).with_id_seed(9);
        runtime.define("x-a", None, false).unwrap();
        let host = runtime.document().first_by_tag("x-a").unwrap();
        let id = runtime.attach(&host).unwrap();
        pool.run_until_stalled();
        (runtime, id)
    }

    #[test]
    fn test_lifecycle_reaches_ready() {
        let mut pool = LocalPool::new();
        let (runtime, id) = ready_runtime(&mut pool);

        assert_eq!(runtime.lifecycle(&id), Some(Lifecycle::Ready));
        assert_eq!(runtime.instance_ids(), vec![id.clone()]);
        assert_eq!(runtime.root(&id), runtime.host(&id));
        assert!(runtime.refs(&id, "b").is_some());
    }

    #[test]
    fn test_unknown_instance_accessors() {
        let mut pool = LocalPool::new();
        let (runtime, _) = ready_runtime(&mut pool);
        let ghost = InstanceId::from("ghost");

        assert_eq!(runtime.get_prop(&ghost, "x"), None);
        assert_eq!(runtime.refs(&ghost, "b"), None);
        assert_eq!(runtime.lifecycle(&ghost), None);
        assert!(!runtime.detach(&ghost));
    }

    #[test]
    fn test_get_never_creates_keys() {
        let mut pool = LocalPool::new();
        let (runtime, id) = ready_runtime(&mut pool);

        assert_eq!(runtime.get_state(&id, "missing"), None);
        assert!(!runtime.values().contains(&instance_key("missing", &id)));
    }

    #[test]
    fn test_state_write_inside_prop_callback_is_depth_first() {
        let mut pool = LocalPool::new();
        let (runtime, id) = ready_runtime(&mut pool);
        let log = Rc::new(RefCell::new(Vec::new()));

        let (rt, l) = (runtime.clone(), log.clone());
        let inner_id = id.clone();
        runtime.on_prop(&id, "n", move |v| {
            l.borrow_mut().push(format!("prop {v}"));
            rt.set_state(&inner_id, "double", v.as_int().unwrap_or(0) * 2);
            l.borrow_mut().push("prop done".to_string());
        });
        let l = log.clone();
        runtime.on_state(&id, "double", move |v| l.borrow_mut().push(format!("state {v}")));

        runtime.set_prop(&id, "n", 4);

        assert_eq!(*log.borrow(), vec!["prop 4", "state 8", "prop done"]);
        assert_eq!(runtime.get_state(&id, "double"), Some(Value::Int(8)));
    }

    #[test]
    fn test_on_ready_ignores_foreign_payloads() {
        let mut pool = LocalPool::new();
        let (runtime, _) = ready_runtime(&mut pool);
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        runtime.on_ready("x-a", move |_| c.set(c.get() + 1));

        assert_eq!(runtime.emit("ready:x-a", Value::from(1)), 1);
        assert_eq!(calls.get(), 0);
        assert_eq!(runtime.emit("ready:x-a", InstanceId::from("k")), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_preload_fetches_without_instances() {
        let mut pool = LocalPool::new();
        let fetcher = MemoryFetcher::new().with("/t/x-b.html", "<i></i>");
        let runtime = Runtime::new(MemoryDocument::new(), fetcher, pool.spawner());
        runtime.configure(ConfigPatch::default().base_url("/t/").extension(".html"));

        runtime.preload("x-b");
        assert_eq!(runtime.template_state("x-b"), TemplateState::Pending);
        pool.run_until_stalled();
        assert_eq!(runtime.template_state("x-b"), TemplateState::Ready);
    }
}
