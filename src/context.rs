//! Global mutable state, made explicit.
//!
//! The partition-callback registry and the rollback slot are, in
//! `update.cpp`/`rollback.cpp`, process-wide singletons.
//! `LiveUpdateContext` bundles them into a context object that's
//! constructible in tests; a module-level `lazy_static` +
//! `spin::Mutex` wrapper provides the production singleton, the same
//! way `memory.rs`'s `MAPPER`/`FRAME_ALLOCATOR` statics are wired up.
use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;
use lazy_static::lazy_static;
use spin::Mutex;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::net::NetworkStackId;
use crate::serialize::StorageFunc;
use crate::stream::StreamRegistry;

/// A single `(name, callback)` registration, run in registration order
/// during serialization. Held in a `Vec` rather than a map: the
/// partition table itself is a small fixed-capacity array
/// (`storage::MAX_PARTITIONS`), so linear scan-on-register is fine and
/// keeps the crate free of a hash map dependency.
struct Registration {
    key: String,
    callback: StorageFunc,
}

/// Explicit context object bundling what would otherwise be
/// "global mutable state": the partition-callback registry, the
/// rollback blob slot, the stream registry, the set of network stacks
/// awaiting a retransmit wakeup, and the configuration flags.
pub struct LiveUpdateContext {
    registrations: Vec<Registration>,
    rollback_blob: Option<Vec<u8>>,
    pub streams: StreamRegistry,
    slumbering: BTreeSet<NetworkStackId>,
    pub config: Config,
    live_updated: bool,
}

impl LiveUpdateContext {
    pub fn new(config: Config) -> Self {
        LiveUpdateContext {
            registrations: Vec::new(),
            rollback_blob: None,
            streams: StreamRegistry::new(),
            slumbering: BTreeSet::new(),
            config,
            live_updated: false,
        }
    }

    /// Set by the new image right after a successful jump (the other
    /// side of `Trampoline::hotswap`), mirroring `kernel::state()
    /// .is_live_updated` in the original. Never set by this crate
    /// itself: there is no code on this side of the jump to set it.
    pub fn mark_os_live_updated(&mut self) {
        self.live_updated = true;
    }

    pub fn os_is_liveupdated(&self) -> bool {
        self.live_updated
    }

    /// Register a serialization callback under `key`. Refuses a
    /// duplicate key, matching `LiveUpdate::register_partition`.
    pub fn register_partition(&mut self, key: &str, callback: StorageFunc) -> Result<()> {
        if self.registrations.iter().any(|r| r.key == key) {
            return Err(Error::DuplicateKey);
        }
        self.registrations.push(Registration {
            key: String::from(key),
            callback,
        });
        Ok(())
    }

    pub fn registrations(&self) -> impl Iterator<Item = (&str, &StorageFunc)> {
        self.registrations.iter().map(|r| (r.key.as_str(), &r.callback))
    }

    /// Run `f` against every registered `(key, callback)` pair in
    /// registration order. Taking a closure here, rather than handing
    /// out `&mut Vec<Registration>`, keeps `Registration` private
    /// while still letting the executor drive each callback with a
    /// `Serializer` it constructs itself.
    pub fn for_each_registration(&mut self, mut f: impl FnMut(&str, &mut StorageFunc)) {
        for r in self.registrations.iter_mut() {
            f(r.key.as_str(), &mut r.callback);
        }
    }

    pub fn set_rollback_blob(&mut self, blob: Vec<u8>) {
        self.rollback_blob = Some(blob);
    }

    pub fn rollback_blob(&self) -> Option<&[u8]> {
        self.rollback_blob.as_deref()
    }

    pub fn has_rollback_blob(&self) -> bool {
        self.rollback_blob
            .as_ref()
            .map(|b| b.len() > crate::exec::elf::ELF_MINIMUM)
            .unwrap_or(false)
    }

    pub fn mark_slumbering(&mut self, stack: NetworkStackId) {
        self.slumbering.insert(stack);
    }

    pub fn drain_slumbering(&mut self) -> BTreeSet<NetworkStackId> {
        core::mem::take(&mut self.slumbering)
    }
}

lazy_static! {
    /// Production singleton. `exec`/`resume`/`rollback` use this by
    /// default; tests construct their own `LiveUpdateContext` instead.
    pub static ref CONTEXT: Mutex<LiveUpdateContext> = Mutex::new(LiveUpdateContext::new(Config::default()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut ctx = LiveUpdateContext::new(Config::default());
        ctx.register_partition("app", alloc::boxed::Box::new(|_| {}))
            .unwrap();
        let err = ctx
            .register_partition("app", alloc::boxed::Box::new(|_| {}))
            .unwrap_err();
        assert_eq!(err, Error::DuplicateKey);
    }

    #[test]
    fn rollback_blob_requires_minimum_size() {
        let mut ctx = LiveUpdateContext::new(Config::default());
        assert!(!ctx.has_rollback_blob());
        ctx.set_rollback_blob(alloc::vec![0u8; 4]);
        assert!(!ctx.has_rollback_blob());
        ctx.set_rollback_blob(alloc::vec![0u8; 4096]);
        assert!(ctx.has_rollback_blob());
    }
}
