//! Template Pipeline
//!
//! Everything between a template kind and a parsed fragment ready for
//! assembly, plus the mount entry point that starts it.
//!
//! # Pipeline Architecture
//!
//! ```text
//! kind → Config::template_url → Fetcher → parse_fragment → TemplateCache → assembly
//! ```
//!
//! ## Key Design Principles
//!
//! - **Single flight**: one fetch per kind at a time, waiters share the result
//! - **Injectable transport**: the engine only sees the [`Fetcher`] trait
//! - **Executor agnostic**: loads run on whatever `LocalSpawn` the runtime was given

pub mod fetch;
pub mod mount;
pub mod template_cache;

// Re-exports
pub use fetch::{FetchFuture, Fetcher, MemoryFetcher};
pub use mount::{MountHandle, mount, unmount};
pub use template_cache::{TemplateCache, TemplateLoad, TemplateResult, TemplateState};
