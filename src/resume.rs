//! The resume dispatcher, grounded in
//! `resume.cpp`: locate a partition in a previously-written storage
//! region and hand its bytes to a restore callback. Unlike
//! serialization, resume callbacks aren't kept in a persistent
//! registry — the embedder calls `on_resume` once, directly, for each
//! partition it's ready to restore.
use crate::error::{Error, Result};
use crate::memory::MemoryInfo;
use crate::net::NetworkStack;
use crate::restore::Restore;
use crate::storage::header::Header;
use crate::storage::region::StorageRegion;
use crate::stream::StreamRegistry;

/// True iff `storage` holds a validly-checksummed region containing a
/// partition named `key`.
pub fn partition_exists(storage: &mut [u8], checksums: bool, key: &str) -> Result<bool> {
    let region = StorageRegion::from_existing(storage, checksums)?;
    if !region.validate() {
        return Err(Error::MagicMismatch);
    }
    match region.find_partition(key) {
        Ok(_) => Ok(true),
        Err(Error::UnknownPartition) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Locate `key`'s partition in `storage` and hand `func` a cursor over
/// its entries. Returns `Err(UnknownPartition)` if no such partition
/// was ever written.
///
/// Once `func` returns, every network stack in `stacks` is told to
/// re-arm its slumbering connections' retransmit timers, the resumed
/// partition is zeroed out, and the whole region is wiped once no
/// partition remains in use — mirroring the original's
/// `wakeup_ip_networks()` / `zero_partition()` / `try_zero()` sequence.
pub fn on_resume<F: FnOnce(&mut Restore)>(
    storage: &mut [u8],
    checksums: bool,
    streams: &StreamRegistry,
    key: &str,
    stacks: &mut [&mut dyn NetworkStack],
    func: F,
) -> Result<()> {
    let mut region = StorageRegion::from_existing(storage, checksums)?;
    if !region.validate() {
        return Err(Error::MagicMismatch);
    }
    let idx = region.find_partition(key)?;
    let (offset, length) = region.partition_bounds(idx)?;
    let start = Header::SIZE + offset;
    let end = start + length;
    {
        let bytes = region.region_bytes();
        let mut restore = Restore::new(bytes, start, end, streams);
        func(&mut restore);
    }

    for stack in stacks.iter_mut() {
        stack.wake_slumbering_connections();
    }
    region.zero_partition(idx)?;
    if region.all_partitions_empty() {
        region.zero();
    }
    Ok(())
}

/// Is there *any* validly-checksummed LiveUpdate region at `storage`
/// at all? Used by an embedder at boot to decide whether it's a cold
/// boot or a post-update resume.
pub fn is_resumable(storage: &mut [u8], checksums: bool) -> bool {
    match StorageRegion::from_existing(storage, checksums) {
        Ok(region) => region.validate(),
        Err(_) => false,
    }
}

/// Wrap a raw `(pointer, length)` location as a byte slice, the way
/// the original's `location_t` does. The caller is asserting this
/// range is valid, writable, and alive for `'a`.
///
/// # Safety
/// `ptr` must be valid for reads and writes of `len` bytes for the
/// lifetime `'a`, and must not alias any other live reference.
pub unsafe fn resume_at<'a>(ptr: *mut u8, len: usize) -> &'a mut [u8] {
    core::slice::from_raw_parts_mut(ptr, len)
}

/// Resolve the default storage location from the embedding kernel's
/// reserved area, the way `update.cpp`'s `resolve_default` falls back
/// to `kernel::liveupdate_storage_area()` when the caller didn't name
/// one explicitly.
///
/// # Safety
/// The memory described by `memory.liveupdate_storage_extent()` must
/// really be valid, writable, and exclusively borrowed for `'a`.
pub unsafe fn resume_from_heap<'a, M: MemoryInfo>(memory: &M) -> Result<&'a mut [u8]> {
    let extent = memory.liveupdate_storage_extent();
    if extent.end <= extent.start {
        return Err(Error::InvalidRegion);
    }
    Ok(resume_at(extent.start as *mut u8, extent.end - extent.start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::Serializer;
    extern crate std;
    use std::vec;

    fn written_region(checksums: bool) -> vec::Vec<u8> {
        let mut bytes = vec![0u8; 4096];
        let mut region = StorageRegion::new(&mut bytes, checksums).unwrap();
        let idx = region.create_partition("app").unwrap();
        {
            let mut s = Serializer::new(&mut region);
            s.add_int(1, 99).unwrap();
        }
        region.finish_partition(idx).unwrap();
        region.finalize().unwrap();
        bytes
    }

    #[test]
    fn is_resumable_reports_true_after_finalize() {
        let mut bytes = written_region(true);
        assert!(is_resumable(&mut bytes, true));
    }

    #[test]
    fn is_resumable_reports_false_on_garbage() {
        let mut bytes = vec![0xAAu8; 4096];
        assert!(!is_resumable(&mut bytes, true));
    }

    #[test]
    fn partition_exists_distinguishes_known_and_unknown() {
        let mut bytes = written_region(true);
        assert!(partition_exists(&mut bytes, true, "app").unwrap());
        assert!(!partition_exists(&mut bytes, true, "missing").unwrap());
    }

    #[test]
    fn on_resume_hands_back_the_right_bytes() {
        let mut bytes = written_region(true);
        let streams = StreamRegistry::new();
        let mut seen = None;
        on_resume(&mut bytes, true, &streams, "app", &mut [], |r| {
            seen = Some(r.as_int().unwrap());
        })
        .unwrap();
        assert_eq!(seen, Some(99));
    }

    #[test]
    fn on_resume_fails_for_unknown_partition() {
        let mut bytes = written_region(true);
        let streams = StreamRegistry::new();
        let err = on_resume(&mut bytes, true, &streams, "missing", &mut [], |_| {}).unwrap_err();
        assert_eq!(err, Error::UnknownPartition);
    }

    #[test]
    fn on_resume_zeroes_the_last_partition_and_invalidates_the_region() {
        let mut bytes = written_region(true);
        let streams = StreamRegistry::new();
        on_resume(&mut bytes, true, &streams, "app", &mut [], |r| {
            let _ = r.as_int().unwrap();
        })
        .unwrap();
        let region = StorageRegion::from_existing(&mut bytes, true).unwrap();
        assert!(!region.validate());
    }

    struct CountingStack {
        woken: bool,
    }

    impl crate::net::NetworkStack for CountingStack {
        fn id(&self) -> crate::net::NetworkStackId {
            crate::net::NetworkStackId(0)
        }
        fn restore_connection(
            &mut self,
            _snapshot: &crate::tcp::snapshot::TcpSnapshot,
            _write_queue: &[u8],
            _read_queue: &[u8],
        ) -> bool {
            false
        }
        fn wake_slumbering_connections(&mut self) {
            self.woken = true;
        }
    }

    #[test]
    fn on_resume_wakes_every_handed_in_stack() {
        let mut bytes = written_region(true);
        let streams = StreamRegistry::new();
        let mut stack = CountingStack { woken: false };
        let mut stacks: [&mut dyn crate::net::NetworkStack; 1] = [&mut stack];
        on_resume(&mut bytes, true, &streams, "app", &mut stacks, |r| {
            let _ = r.as_int().unwrap();
        })
        .unwrap();
        assert!(stack.woken);
    }
}
