//! Mount API - attach every defined component below a node, detach them later.
//!
//! # Example
//!
//! ```ignore
//! use dynel::pipeline::mount;
//!
//! let root = runtime.document().root();
//! let mut handle = mount(&runtime, &root);
//! pool.run_until_stalled();
//!
//! // Later
//! handle.unmount();
//! ```

use crate::dom::Document;
use crate::engine::Runtime;
use crate::types::InstanceId;

// =============================================================================
// Mount Handle
// =============================================================================

/// Handle returned by [`mount`].
///
/// Dropping it leaves the instances attached; call
/// [`unmount`](MountHandle::unmount) to tear them down. Unmounting twice is a
/// no-op.
#[must_use = "dropping a MountHandle leaves its instances attached"]
pub struct MountHandle<D: Document + 'static> {
    runtime: Runtime<D>,
    ids: Vec<InstanceId>,
    mounted: bool,
}

impl<D: Document + 'static> MountHandle<D> {
    /// Instances attached by the mount call, in document order.
    ///
    /// Components created later by assembly are not listed; they are torn
    /// down together with the instance whose content holds them.
    pub fn ids(&self) -> &[InstanceId] {
        &self.ids
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Detach every mounted instance, innermost first.
    ///
    /// Returns how many were still attached.
    pub fn unmount(&mut self) -> usize {
        if !self.mounted {
            return 0;
        }
        self.mounted = false;
        let detached = self
            .ids
            .iter()
            .rev()
            .filter(|id| self.runtime.detach(id))
            .count();
        tracing::debug!(detached, total = self.ids.len(), "mount.unmounted");
        detached
    }
}

// =============================================================================
// Mount Function
// =============================================================================

/// Attach every defined, not yet attached element below `root`.
///
/// Templates are requested immediately; assembly completes as the runtime's
/// executor drives the fetches.
pub fn mount<D: Document + 'static>(runtime: &Runtime<D>, root: &D::Node) -> MountHandle<D> {
    let ids = runtime.upgrade(root);
    tracing::debug!(instances = ids.len(), "mount.mounted");
    MountHandle {
        runtime: runtime.clone(),
        ids,
        mounted: true,
    }
}

/// Unmount and clean up.
pub fn unmount<D: Document + 'static>(mut handle: MountHandle<D>) -> usize {
    handle.unmount()
}
