//! The rollback controller, grounded in
//! `rollback.cpp`: `rollback_now` is not a distinct code path at all,
//! it's `exec` pointed at the previously-known-good kernel blob
//! instead of a new one, so the same serialize-then-jump pipeline
//! carries connection state across a rollback the same way it does
//! across a forward update.
//!
//! `rollback.cpp` also wires `set_rollback_blob` straight into
//! `os::on_panic`, so a panic triggers an automatic rollback. This
//! crate doesn't replicate that wiring here: the panic hook in
//! [`crate::panic`] takes a bare `fn(&PanicInfo)`, which has nowhere
//! to carry the `Trampoline`/`InterruptControl`/`DeviceControl`
//! instances `rollback_now` needs. An embedder that wants
//! panic-triggered rollback registers its own hook that closes over
//! those and calls `rollback_now` itself.
use alloc::vec::Vec;

use log::warn;

use crate::context::LiveUpdateContext;
use crate::error::{Error, Result};
use crate::exec::executor::{self, DeviceControl};
use crate::exec::trampoline::{InterruptControl, Trampoline};
use crate::memory::MemoryInfo;

pub fn set_rollback_blob(ctx: &mut LiveUpdateContext, blob: Vec<u8>) {
    ctx.set_rollback_blob(blob);
}

pub fn has_rollback_blob(ctx: &LiveUpdateContext) -> bool {
    ctx.has_rollback_blob()
}

/// Re-run the full exec pipeline against the stored rollback blob.
/// Only returns on failure (no blob set, or the blob itself fails
/// validation); success hands control to the old kernel and never
/// returns, same as `exec::exec`.
pub fn rollback_now<M, T, I, D>(
    ctx: &mut LiveUpdateContext,
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
    let blob = ctx.rollback_blob().map(|b| b.to_vec()).ok_or_else(|| {
        warn!("rollback requested but no rollback blob is set");
        Error::NoRollbackBlob
    })?;
    executor::exec(ctx, &blob, storage, memory, trampoline, interrupts, devices)
}

/// Adopt a rollback blob handed across a hotswap by the soft-reset
/// mechanism (`softreset_service_handler` in the original): deep-copy
/// the bytes the trampoline preserved and re-register them, so rollback
/// capability survives the jump instead of ending with it.
pub fn adopt_soft_reset_rollback_blob(ctx: &mut LiveUpdateContext, preserved: &[u8]) {
    ctx.set_rollback_blob(preserved.to_vec());
}
