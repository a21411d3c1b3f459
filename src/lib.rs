//! # dynel
//!
//! Reactive keyed state and template-driven components for Rust.
//!
//! ## Architecture
//!
//! dynel keeps component state out of components. Every prop and every piece
//! of internal state is an observable value in one flat registry, keyed by
//! `<name>.<instance id>`. A component instance is just an id, a host node and
//! an assembled copy of its template:
//!
//! ```text
//! attach → TemplateCache (single flight) → assembly → seed props → "ready:<kind>"
//! ```
//!
//! Templates are fetched once per kind, deep-copied per instance, and have
//! their embedded styles and scripts rewritten so a generic template ends up
//! bound to exactly one instance.
//!
//! ## Modules
//!
//! - [`reactive`] - ObservableValue, NamedRegistry, EventBus
//! - [`pipeline`] - Fetcher, TemplateCache, mount/unmount
//! - [`engine`] - Runtime, definitions, assembly, style/script rewrites
//! - [`dom`] - the Document trait and the in-memory implementation
//! - [`config`] - runtime defaults and patches
//! - [`types`] - Value, InstanceId, EventPayload
//! - [`error`] - error enums

pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod reactive;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use config::{Config, ConfigPatch};

pub use error::{DocumentError, Error, FetchError, Result, TemplateError};

pub use reactive::{EventBus, NamedRegistry, ObservableValue, Subscription, subscribe_all};

pub use dom::{Document, MemoryDocument, NodeId};

pub use pipeline::{
    FetchFuture, Fetcher, MemoryFetcher, MountHandle, TemplateCache, TemplateState, mount,
    unmount,
};

pub use engine::{
    Definition, INSTANCE_ATTRIBUTE, Lifecycle, Runtime, ScopeRules, ScriptHost,
    TracingScriptHost, bind_script, instance_key, scope_styles,
};
