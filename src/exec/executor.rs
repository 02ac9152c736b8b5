//! The update executor, grounded in
//! `update.cpp`'s `LiveUpdate::exec`: run every registered partition
//! callback into the storage region, quiesce devices, hand the
//! rollback blob to the trampoline, and jump. Past the call to
//! [`Trampoline::hotswap`] there is no return; everything before it
//! can still fail and hand control back to the caller.
use log::{info, warn};

use crate::context::LiveUpdateContext;
use crate::error::{Error, Result};
use crate::exec::elf::{self, ScannedImage};
use crate::exec::trampoline::{InterruptControl, Trampoline};
use crate::memory::MemoryInfo;
use crate::serialize::Serializer;
use crate::storage::region::StorageRegion;

/// Quiesces whatever hardware would otherwise keep touching memory or
/// firing interrupts across the jump (the actual device drivers are
/// out of scope). Grounded in `update.cpp`'s
/// NIC-flush / `deactivate_devices()` step.
pub trait DeviceControl {
    fn quiesce(&mut self);
}

/// No-op device control, useful for tests and for platforms without
/// any devices that need quiescing.
pub struct NullDeviceControl;

impl DeviceControl for NullDeviceControl {
    fn quiesce(&mut self) {}
}

/// Run every registered partition's serializer into `storage`,
/// finalize the region, and return the image it produced alongside
/// the scanned update blob layout. Everything up to (but not
/// including) the trampoline jump, so it can be unit-tested without a
/// real `Trampoline`.
pub fn prepare<'a>(
    ctx: &mut LiveUpdateContext,
    blob: &[u8],
    storage: &'a mut [u8],
) -> Result<(StorageRegion<'a>, ScannedImage)> {
    let image = elf::scan(blob)?;

    let checksums = ctx.config.use_checksums;
    let mut region = StorageRegion::new(storage, checksums)?;
    let mut first_err: Option<Error> = None;

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
        warn!("partition serialization failed: {:?}", e);
        return Err(e);
    }

    region.finalize()?;

    Ok((region, image))
}

/// Validate the update blob, serialize every partition, quiesce
/// devices, and jump. Only returns on failure: success hands control
/// to the new image via `trampoline.hotswap`, which diverges.
pub fn exec<M, T, I, D>(
    ctx: &mut LiveUpdateContext,
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
    let (_region, image) = prepare(ctx, blob, storage)?;

    if image.segment_offset + image.total_len > blob.len() {
        return Err(Error::ElfIncomplete);
    }
    let segment = &blob[image.segment_offset..image.segment_offset + image.total_len];

    info!(
        "jumping to new image at physical {:#x}, entry {:#x}, {} bytes",
        image.physical_base,
        image.entry_point,
        segment.len()
    );
    devices.quiesce();

    let rollback_blob = ctx.rollback_blob().map(|b| b.to_vec());
    let zero_until = if ctx.config.zero_old_memory {
        Some(memory.heap_extent().end)
    } else {
        None
    };

    interrupts.disable();
    trampoline.hotswap(
        image.physical_base,
        segment,
        image.entry_point,
        rollback_blob.as_deref(),
        zero_until,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use alloc::vec;
    use alloc::vec::Vec;

    fn sample_blob() -> Vec<u8> {
        crate::exec::elf::tests_support::build_minimal_elf32()
    }

    #[test]
    fn prepare_runs_registered_callbacks() {
        let mut ctx = LiveUpdateContext::new(Config::default());
        ctx.register_partition(
            "app",
            alloc::boxed::Box::new(|s: &mut Serializer| {
                s.add_int(1, 42).unwrap();
            }),
        )
        .unwrap();
        let blob = sample_blob();
        let mut storage = vec![0u8; 4096];
        let (region, _image) = prepare(&mut ctx, &blob, &mut storage).unwrap();
        assert!(region.validate());
        assert!(region.find_partition("app").is_ok());
    }
}
