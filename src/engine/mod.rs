//! Component engine - definitions, instances and assembly.
//!
//! The engine ties the reactive layer to the document:
//! - Registry: tag definitions, instance id allocation, host mapping
//! - Runtime: the context object and the per-instance props/state/refs API
//! - Assembly: template copy, slot projection, embedded rewrites
//! - Scoping/Script: the two text rewrites applied during assembly
//!
//! # Architecture
//!
//! Instances are NOT objects holding their own state. An instance is an id,
//! and everything it owns lives in the runtime's keyed registry under
//! `<name>.<id>`:
//!
//! ```text
//! count.0a1b2c3d4   → Int(3)
//! label.0a1b2c3d4   → Text("Clicks")
//! count.1ff00aa11   → Int(0)
//! ```
//!
//! Scripts, external code and the engine itself all reach that state through
//! the same key derivation, which is what lets a generic template be bound to
//! exactly one instance.

mod assembly;
mod registry;
mod runtime;
mod scoping;
mod script;

pub use assembly::SLOT_TAG;
pub use registry::*;
pub use runtime::*;
pub use scoping::*;
pub use script::*;
