#![cfg_attr(not(test), no_std)]
#![allow(dead_code)]
#![deny(
    array_into_iter,
    bare_trait_objects,
    deprecated,
    illegal_floating_point_literal_pattern,
    improper_ctypes,
    non_shorthand_field_patterns,
    non_snake_case,
    non_upper_case_globals,
    no_mangle_generic_items,
    path_statements,
    redundant_semicolons,
    unconditional_recursion,
    unreachable_patterns,
    unused_allocation,
    unused_assignments,
    unused_attributes,
    unused_comparisons,
    unused_must_use,
    unused_mut,
    unused_parens,
    unused_unsafe,
    while_true
)]
//! Live in-place kernel replacement: storage region format, typed
//! serialize/restore, TCP connection snapshotting, the update executor
//! and hotswap trampoline contract, and rollback.
//!
//! This crate is the portable core of the original `LiveUpdate`
//! subsystem. It owns the wire format, the append-only writer/reader,
//! and the exec/rollback control flow; everything platform-specific
//! (the network stack, the actual machine code that performs the
//! in-place copy-and-jump, device quiescing, heap/kernel-image
//! extents) is an external collaborator reached through a trait —
//! [`memory::MemoryInfo`], [`net::NetworkStack`]/[`net::TcpConnection`],
//! [`exec::Trampoline`]/[`exec::InterruptControl`],
//! [`exec::DeviceControl`] — implemented by the embedding kernel.
extern crate alloc;

use alloc::boxed::Box;
use alloc::vec::Vec;

pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod memory;
pub mod net;
pub mod panic;
pub mod restore;
pub mod resume;
pub mod rollback;
pub mod serialize;
pub mod storage;
pub mod stream;
pub mod tcp;

pub use context::LiveUpdateContext;
pub use error::{Error, Result};
pub use exec::{DeviceControl, InterruptControl, NullDeviceControl, Trampoline, X86InterruptControl};
pub use memory::{Extent, MemoryInfo, NullMemoryInfo};
pub use net::{NetworkStack, NetworkStackId, TcpConnection};
pub use restore::Restore;
pub use serialize::{Serializer, StorageFunc};
pub use stream::{Stream, StreamRegistry};
pub use tcp::{Endpoint, TcpFlags, TcpSnapshot, TcpState};

use context::CONTEXT;

/// Register a partition's serialization routine against the process-wide
/// context. Refuses a duplicate `key`, matching the original
/// `LiveUpdate::register()`.
pub fn register_partition(key: &str, callback: StorageFunc) -> Result<()> {
    CONTEXT.lock().register_partition(key, callback)
}

/// Run every registered partition into `storage`, finalize the region,
/// quiesce devices and jump to the new image. Only returns on failure:
/// success hands control to `blob`'s entry point and never comes back.
#[allow(clippy::too_many_arguments)]
pub fn exec<M, T, I, D>(
    blob: &[u8],
    storage: &mut [u8],
    memory: &M,
    trampoline: &mut T,
    interrupts: &I,
    devices: &mut D,
) -> Result<()>
where
    M: MemoryInfo,
    T: Trampoline,
    I: InterruptControl,
    D: DeviceControl,
{
    let mut ctx = CONTEXT.lock();
    exec::exec(&mut ctx, blob, storage, memory, trampoline, interrupts, devices)
}

/// Serialize every registered partition into `storage` without jumping
/// anywhere, mirroring the original's `LiveUpdate::store`. Returns the
/// number of bytes the region occupies once finalized.
pub fn store(storage: &mut [u8]) -> Result<usize> {
    let mut ctx = CONTEXT.lock();
    let checksums = ctx.config.use_checksums;
    let mut region = storage::StorageRegion::new(storage, checksums)?;
    let mut first_err = None;
    ctx.for_each_registration(|key, callback| {
        if first_err.is_some() {
            return;
        }
        let idx = match region.create_partition(key) {
            Ok(idx) => idx,
            Err(e) => {
                first_err = Some(e);
                return;
            }
        };
        {
            let mut s = Serializer::new(&mut region);
            callback(&mut s);
        }
        if let Err(e) = region.finish_partition(idx) {
            first_err = Some(e);
        }
    });
    if let Some(e) = first_err {
        return Err(e);
    }
    region.finalize()?;
    Ok(region.stored_data_length())
}

/// True iff `storage` holds a validly-checksummed region, i.e. a prior
/// call to [`store`] or [`exec`] completed successfully against it.
pub fn is_resumable(storage: &mut [u8]) -> bool {
    let checksums = CONTEXT.lock().config.use_checksums;
    resume::is_resumable(storage, checksums)
}

/// Locate `key`'s partition in `storage` and hand `func` a cursor over
/// its entries, using the process-wide stream registry. Once `func`
/// returns, every stack in `stacks` has its slumbering connections
/// woken, the partition is zeroed, and the whole region is wiped once
/// empty. Holds the context lock for the duration of `func`, so `func`
/// must not itself call back into the functions in this module.
pub fn resume<F: FnOnce(&mut Restore)>(
    storage: &mut [u8],
    key: &str,
    stacks: &mut [&mut dyn NetworkStack],
    func: F,
) -> Result<()> {
    let ctx = CONTEXT.lock();
    let checksums = ctx.config.use_checksums;
    resume::on_resume(storage, checksums, &ctx.streams, key, stacks, func)
}

/// Total size of a finalized storage region at `storage`, per the
/// header's recorded `length` field.
pub fn stored_data_length(storage: &mut [u8]) -> Result<usize> {
    let checksums = CONTEXT.lock().config.use_checksums;
    let region = storage::StorageRegion::from_existing(storage, checksums)?;
    if !region.validate() {
        return Err(Error::MagicMismatch);
    }
    Ok(region.stored_data_length())
}

/// Stash `blob` as the rollback target for a future [`rollback_now`].
pub fn set_rollback_blob(blob: Vec<u8>) {
    CONTEXT.lock().set_rollback_blob(blob);
}

pub fn has_rollback_blob() -> bool {
    CONTEXT.lock().has_rollback_blob()
}

/// Re-run the exec pipeline against the stored rollback blob. Only
/// returns on failure, the same as [`exec`].
#[allow(clippy::too_many_arguments)]
pub fn rollback_now<M, T, I, D>(
    storage: &mut [u8],
    memory: &M,
    trampoline: &mut T,
    interrupts: &I,
    devices: &mut D,
) -> Result<()>
where
    M: MemoryInfo,
    T: Trampoline,
    I: InterruptControl,
    D: DeviceControl,
{
    let mut ctx = CONTEXT.lock();
    rollback::rollback_now(&mut ctx, storage, memory, trampoline, interrupts, devices)
}

/// Adopt a rollback blob handed across a hotswap by a soft-reset,
/// re-registering it with the process-wide context.
pub fn adopt_soft_reset_rollback_blob(preserved: &[u8]) {
    rollback::adopt_soft_reset_rollback_blob(&mut CONTEXT.lock(), preserved);
}

/// True iff the running image was entered via a live update jump
/// rather than a cold boot. Set by the new image itself, once, right
/// after control arrives at its entry point — this crate has no code
/// running on that side of the jump to set it automatically.
pub fn os_is_liveupdated() -> bool {
    CONTEXT.lock().os_is_liveupdated()
}

pub fn mark_os_live_updated() {
    CONTEXT.lock().mark_os_live_updated();
}

/// Re-enable interrupts after a failed [`exec`] left them disabled.
/// A no-op if `exec` never got far enough to disable them.
pub fn restore_environment<I: InterruptControl>(interrupts: &I) {
    interrupts.enable();
}

/// Toggle per-entry payload checksums on the process-wide context,
/// mirroring the original's `LiveUpdate::enable_extra_checks`.
pub fn enable_extra_checks(enabled: bool) {
    CONTEXT.lock().config.extra_checks = enabled;
}

#[cfg(test)]
mod tests {
    use super::*;
    extern crate std;
    use std::vec;

    #[test]
    fn store_and_resume_round_trip() {
        // Each test takes the CONTEXT lock via the public API below, so
        // give this one a partition name nothing else in the suite uses.
        register_partition(
            "lib-roundtrip",
            Box::new(|s: &mut Serializer| {
                s.add_int(1, 7).unwrap();
            }),
        )
        .ok();

        let mut storage = vec![0u8; 4096];
        let len = store(&mut storage).unwrap();
        assert!(len > 0);
        assert!(is_resumable(&mut storage));
        assert_eq!(stored_data_length(&mut storage).unwrap(), len);

        let mut seen = None;
        resume(&mut storage, "lib-roundtrip", &mut [], |r| {
            seen = Some(r.as_int().unwrap());
        })
        .unwrap();
        assert_eq!(seen, Some(7));
    }
}
