//! Instance Registry - component definitions, instance ids and lifetimes.
//!
//! Manages the bookkeeping side of component instances:
//! - Tag → definition table (`define`)
//! - Instance id allocation (monotonic counter + random tail)
//! - Host node ↔ instance id mapping
//! - Lifecycle state per instance
//! - Detach callbacks per instance
//!
//! Per-instance props and state do not live here; they live in the runtime's
//! [`NamedRegistry`](crate::reactive::NamedRegistry) under keys built by
//! [`instance_key`].

use std::collections::HashMap;
use std::hash::Hash;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::scoping::ScopeRules;
use crate::types::InstanceId;

// =============================================================================
// Key Derivation
// =============================================================================

/// `entity + "." + instance` - the sole namespacing rule.
pub fn instance_key(entity: &str, instance: &InstanceId) -> String {
    format!("{entity}.{instance}")
}

/// Suffix shared by every key belonging to `instance`.
pub fn instance_key_suffix(instance: &InstanceId) -> String {
    format!(".{instance}")
}

// =============================================================================
// Definitions
// =============================================================================

/// A registered component kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Lowercase tag name instances are recognised by.
    pub tag: String,
    /// Template kind fetched for this tag.
    pub kind: String,
    /// Assemble into an isolated sub-root instead of the host itself.
    pub isolated: bool,
    /// Which embedded content gets rewritten per instance.
    pub rules: ScopeRules,
}

impl Definition {
    pub fn new(tag: &str, source_kind: Option<&str>, isolated: bool) -> Self {
        let tag = tag.to_ascii_lowercase();
        let kind = source_kind.map_or_else(|| tag.clone(), str::to_string);
        Self {
            tag,
            kind,
            isolated,
            rules: ScopeRules::for_isolation(isolated),
        }
    }
}

// =============================================================================
// Instances
// =============================================================================

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Attached,
    AwaitingTemplate,
    Assembled,
    Ready,
    /// Template could not be obtained. The instance keeps its original content.
    Failed,
}

/// One attached component instance.
#[derive(Debug, Clone)]
pub struct InstanceRecord<N> {
    pub id: InstanceId,
    pub kind: String,
    pub host: N,
    /// The host itself, or its isolated sub-root.
    pub root: N,
    pub isolated: bool,
    pub rules: ScopeRules,
    pub lifecycle: Lifecycle,
}

/// Definitions plus live instances.
pub struct InstanceRegistry<N> {
    definitions: HashMap<String, Definition>,
    instances: HashMap<InstanceId, InstanceRecord<N>>,
    hosts: HashMap<N, InstanceId>,
    detach_callbacks: HashMap<InstanceId, Vec<Box<dyn FnOnce()>>>,
    counter: u64,
    rng: StdRng,
}

impl<N: Clone + Eq + Hash> Default for InstanceRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Clone + Eq + Hash> InstanceRegistry<N> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic id tails, for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            definitions: HashMap::new(),
            instances: HashMap::new(),
            hosts: HashMap::new(),
            detach_callbacks: HashMap::new(),
            counter: 0,
            rng,
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    // -------------------------------------------------------------------------
    // Definitions
    // -------------------------------------------------------------------------

    /// Register `definition`. Returns `false` if its tag is taken.
    pub fn define(&mut self, definition: Definition) -> bool {
        if self.definitions.contains_key(&definition.tag) {
            return false;
        }
        self.definitions.insert(definition.tag.clone(), definition);
        true
    }

    pub fn definition(&self, tag: &str) -> Option<&Definition> {
        self.definitions.get(&tag.to_ascii_lowercase())
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.definition(tag).is_some()
    }

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------

    /// Fresh id: base-36 counter followed by 8 random hex digits.
    ///
    /// The random tail is fixed width, so distinct counters can never
    /// produce the same string.
    pub fn next_id(&mut self) -> InstanceId {
        let counter = self.counter;
        self.counter += 1;
        let tail: u32 = self.rng.r#gen();
        InstanceId::new(format!("{}{:08x}", to_base36(counter), tail))
    }

    /// Record a new instance for `host` and return its id.
    pub fn allocate(&mut self, host: N, root: N, definition: &Definition) -> InstanceId {
        let id = self.next_id();
        self.hosts.insert(host.clone(), id.clone());
        self.instances.insert(
            id.clone(),
            InstanceRecord {
                id: id.clone(),
                kind: definition.kind.clone(),
                host,
                root,
                isolated: definition.isolated,
                rules: definition.rules,
                lifecycle: Lifecycle::Attached,
            },
        );
        id
    }

    /// Forget `id`. Returns its record and any detach callbacks to run.
    pub fn release(&mut self, id: &InstanceId) -> Option<(InstanceRecord<N>, Vec<Box<dyn FnOnce()>>)> {
        let record = self.instances.remove(id)?;
        self.hosts.remove(&record.host);
        let callbacks = self.detach_callbacks.remove(id).unwrap_or_default();
        Some((record, callbacks))
    }

    /// Register a callback to run when `id` is detached.
    pub fn on_detach(&mut self, id: &InstanceId, callback: impl FnOnce() + 'static) {
        self.detach_callbacks
            .entry(id.clone())
            .or_default()
            .push(Box::new(callback));
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    pub fn record(&self, id: &InstanceId) -> Option<&InstanceRecord<N>> {
        self.instances.get(id)
    }

    pub fn instance_of(&self, host: &N) -> Option<InstanceId> {
        self.hosts.get(host).cloned()
    }

    pub fn lifecycle(&self, id: &InstanceId) -> Option<Lifecycle> {
        self.instances.get(id).map(|record| record.lifecycle)
    }

    /// Returns `false` if `id` is not live.
    pub fn set_lifecycle(&mut self, id: &InstanceId, lifecycle: Lifecycle) -> bool {
        match self.instances.get_mut(id) {
            Some(record) => {
                record.lifecycle = lifecycle;
                true
            }
            None => false,
        }
    }

    /// Live instance ids, sorted.
    pub fn ids(&self) -> Vec<InstanceId> {
        let mut ids: Vec<InstanceId> = self.instances.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::rc::Rc;

    fn definition(tag: &str) -> Definition {
        Definition::new(tag, None, false)
    }

    #[test]
    fn test_key_derivation() {
        assert_eq!(instance_key("x", &InstanceId::from("42")), "x.42");
        assert_eq!(instance_key_suffix(&InstanceId::from("42")), ".42");
    }

    #[test]
    fn test_define_rejects_duplicate_tags() {
        let mut registry: InstanceRegistry<u32> = InstanceRegistry::seeded(1);
        assert!(registry.define(definition("x-card")));
        assert!(!registry.define(Definition::new("X-Card", Some("other"), true)));
        assert_eq!(registry.definition("X-CARD").map(|d| d.kind.as_str()), Some("x-card"));
    }

    #[test]
    fn test_source_kind_overrides_tag() {
        let def = Definition::new("fancy-button", Some("button-v2"), true);
        assert_eq!(def.kind, "button-v2");
        assert!(def.isolated);
        assert!(!def.rules.contains(ScopeRules::STYLES));
    }

    #[test]
    fn test_allocate_and_release() {
        let mut registry: InstanceRegistry<u32> = InstanceRegistry::seeded(7);
        let def = definition("x-card");

        let a = registry.allocate(10, 10, &def);
        let b = registry.allocate(11, 11, &def);

        assert_ne!(a, b);
        assert_eq!(registry.instance_of(&10), Some(a.clone()));
        assert_eq!(registry.lifecycle(&a), Some(Lifecycle::Attached));
        assert_eq!(registry.len(), 2);

        let (record, _) = registry.release(&a).unwrap();
        assert_eq!(record.host, 10);
        assert_eq!(registry.instance_of(&10), None);
        assert!(registry.release(&a).is_none());
        assert_eq!(registry.ids(), vec![b]);
    }

    #[test]
    fn test_detach_callbacks_returned_on_release() {
        let mut registry: InstanceRegistry<u32> = InstanceRegistry::seeded(3);
        let id = registry.allocate(1, 1, &definition("x-a"));
        let called = Rc::new(Cell::new(false));
        let called_clone = called.clone();

        registry.on_detach(&id, move || called_clone.set(true));
        let (_, callbacks) = registry.release(&id).unwrap();
        assert!(!called.get());
        for callback in callbacks {
            callback();
        }
        assert!(called.get());
    }

    #[test]
    fn test_ids_are_unique_and_dot_free() {
        let mut registry: InstanceRegistry<u32> = InstanceRegistry::new();
        let ids: HashSet<InstanceId> = (0..2000).map(|_| registry.next_id()).collect();
        assert_eq!(ids.len(), 2000);
        assert!(ids.iter().all(|id| !id.as_str().contains('.')));
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn distinct_ids_never_share_keys(entity in "[a-z]{1,8}", a in "[a-z0-9]{1,12}", b in "[a-z0-9]{1,12}") {
                prop_assume!(a != b);
                let ka = instance_key(&entity, &InstanceId::new(a));
                let kb = instance_key(&entity, &InstanceId::new(b));
                prop_assert_ne!(ka, kb);
            }
        }
    }
}
