//! The Storage Region: append-only typed writes with forward
//! iteration, CRC protection, and partition isolation. Owns no memory;
//! wraps the caller-supplied byte range.
use zerocopy::LayoutVerified;

use crate::error::{Error, Result};
use crate::storage::crc::crc32;
use crate::storage::entry::{EntryHeader, EntryType};
use crate::storage::header::{Header, PartitionDescriptor, MAGIC, MAX_PARTITIONS};

/// Canary value written past the tip of a partition on close, the way
/// the original writes `0xbeefc4f3` into the about-to-be END entry's
/// length field and reads it back to prove the page is really writable
/// (catching the case where the region wrongly overlaps the heap).
const END_CANARY: i32 = 0x6eef_c4f3u32 as i32;

pub struct StorageRegion<'a> {
    bytes: &'a mut [u8],
    checksums: bool,
}

impl<'a> StorageRegion<'a> {
    /// Construct a fresh header at the start of `bytes`, zeroing the
    /// partition table and write cursor. `bytes` must be at least
    /// [`Header::SIZE`] long.
    pub fn new(bytes: &'a mut [u8], checksums: bool) -> Result<Self> {
        if bytes.len() < Header::SIZE {
            return Err(Error::InvalidRegion);
        }
        let mut region = StorageRegion { bytes, checksums };
        {
            let mut view = region.header_view_mut();
            *view = Header::default();
            view.magic = MAGIC;
        }
        Ok(region)
    }

    /// Wrap an existing, already-serialized region without touching it.
    /// Used on the resume side, where the header was written by a
    /// previous image.
    pub fn from_existing(bytes: &'a mut [u8], checksums: bool) -> Result<Self> {
        if bytes.len() < Header::SIZE {
            return Err(Error::InvalidRegion);
        }
        Ok(StorageRegion { bytes, checksums })
    }

    fn header_view(&self) -> LayoutVerified<&[u8], Header> {
        LayoutVerified::new(&self.bytes[..Header::SIZE]).expect("header prefix is exactly Header::SIZE")
    }

    fn header_view_mut(&mut self) -> LayoutVerified<&mut [u8], Header> {
        LayoutVerified::new(&mut self.bytes[..Header::SIZE]).expect("header prefix is exactly Header::SIZE")
    }

    /// Bytes used in the entries area so far (the write cursor).
    pub fn used_entries_len(&self) -> usize {
        let view = self.header_view();
        let length = view.length;
        length as usize
    }

    /// Total bytes written to the region: header plus entries area used.
    pub fn stored_data_length(&self) -> usize {
        Header::SIZE + self.used_entries_len()
    }

    fn entries_area_capacity(&self) -> usize {
        self.bytes.len() - Header::SIZE
    }

    fn entry_offset(&self, relative: usize) -> usize {
        Header::SIZE + relative
    }

    /// Create a new, empty partition named `name`. Fails on a name
    /// that's too long, a full table, or a duplicate name.
    pub fn create_partition(&mut self, name: &str) -> Result<usize> {
        {
            let view = self.header_view();
            let partitions = view.partitions;
            if partitions as usize >= MAX_PARTITIONS {
                return Err(Error::PartitionTableFull);
            }
            for i in 0..partitions as usize {
                let desc = view.ptable[i];
                if desc.name_str() == name {
                    return Err(Error::DuplicateKey);
                }
            }
        }
        let cursor = self.used_entries_len();
        let mut view = self.header_view_mut();
        let partitions = view.partitions;
        let idx = partitions as usize;
        let mut desc = PartitionDescriptor::default();
        desc.set_name(name)?;
        desc.offset = cursor as u32;
        view.ptable[idx] = desc;
        view.partitions = partitions + 1;
        Ok(idx)
    }

    /// Locate a partition by name. Fails hard with `ChecksumMismatch`
    /// if found but its CRC doesn't match (when checksums are on).
    pub fn find_partition(&self, name: &str) -> Result<usize> {
        let view = self.header_view();
        let partitions = view.partitions;
        for i in 0..partitions as usize {
            let desc = view.ptable[i];
            if desc.name_str() == name {
                if self.checksums {
                    let offset = desc.offset;
                    let length = desc.length;
                    let stored_crc = desc.crc;
                    let start = self.entry_offset(offset as usize);
                    let end = start + length as usize;
                    let computed = crc32(&self.bytes[start..end]);
                    if computed != stored_crc {
                        return Err(Error::ChecksumMismatch);
                    }
                }
                return Ok(i);
            }
        }
        Err(Error::UnknownPartition)
    }

    /// `(offset, length)` of a partition's entry bytes, relative to the
    /// entries area (i.e. relative to `Header::SIZE`).
    pub fn partition_bounds(&self, idx: usize) -> Result<(usize, usize)> {
        let view = self.header_view();
        let partitions = view.partitions;
        if idx >= partitions as usize {
            return Err(Error::UnknownPartition);
        }
        let desc = view.ptable[idx];
        let offset = desc.offset;
        let length = desc.length;
        Ok((offset as usize, length as usize))
    }

    pub fn region_bytes(&self) -> &[u8] {
        self.bytes
    }

    /// Append a typed entry at the current write cursor. `len_value`
    /// is the payload length for every type except `INTEGER`, which
    /// stores its value there directly with an empty payload.
    pub fn append(&mut self, ty: EntryType, id: u16, len_value: i32, payload: &[u8]) -> Result<()> {
        let cursor = self.used_entries_len();
        let entry_size = EntryHeader::SIZE + payload.len();
        // Keep room for a trailing END sentinel after this entry too.
        if self.entry_offset(cursor) + entry_size + EntryHeader::SIZE > self.bytes.len() {
            return Err(Error::RegionFull);
        }
        let at = self.entry_offset(cursor);
        {
            let mut view: LayoutVerified<&mut [u8], EntryHeader> =
                LayoutVerified::new(&mut self.bytes[at..at + EntryHeader::SIZE]).expect("sized slice");
            view.ty = ty as i16;
            view.id = id;
            view.len = len_value;
        }
        if !payload.is_empty() {
            self.bytes[at + EntryHeader::SIZE..at + entry_size].copy_from_slice(payload);
        }
        let new_cursor = cursor + entry_size;
        {
            let mut view = self.header_view_mut();
            view.length = new_cursor as u32;
        }
        self.write_scratch_end(new_cursor)
    }

    /// Write a temporary END header past the tip, without advancing the
    /// write cursor, so a truncated serialization can still be walked
    /// up to the last fully-written entry.
    fn write_scratch_end(&mut self, cursor: usize) -> Result<()> {
        let at = self.entry_offset(cursor);
        if at + EntryHeader::SIZE > self.bytes.len() {
            return Err(Error::RegionFull);
        }
        let mut view: LayoutVerified<&mut [u8], EntryHeader> =
            LayoutVerified::new(&mut self.bytes[at..at + EntryHeader::SIZE]).expect("sized slice");
        view.ty = EntryType::End as i16;
        view.id = 0;
        view.len = 0;
        Ok(())
    }

    /// Write a canary into the about-to-be-written tip, read it back,
    /// and confirm it stuck: a cheap proof the page here is really
    /// writable (catches a region that silently overlaps the heap).
    fn canary_check(&mut self) -> Result<()> {
        let cursor = self.used_entries_len();
        let at = self.entry_offset(cursor);
        if at + EntryHeader::SIZE > self.bytes.len() {
            return Err(Error::RegionFull);
        }
        {
            let mut view: LayoutVerified<&mut [u8], EntryHeader> =
                LayoutVerified::new(&mut self.bytes[at..at + EntryHeader::SIZE]).expect("sized slice");
            view.len = END_CANARY;
        }
        let view: LayoutVerified<&[u8], EntryHeader> =
            LayoutVerified::new(&self.bytes[at..at + EntryHeader::SIZE]).expect("sized slice");
        let observed = view.len;
        if observed != END_CANARY {
            return Err(Error::RegionFull);
        }
        Ok(())
    }

    /// Write a terminal END, record the partition's length, and
    /// compute its CRC (if enabled).
    pub fn finish_partition(&mut self, idx: usize) -> Result<()> {
        self.canary_check()?;
        self.append(EntryType::End, 0, 0, &[])?;
        let (offset, length, crc) = {
            let view = self.header_view();
            let partitions = view.partitions;
            if idx >= partitions as usize {
                return Err(Error::UnknownPartition);
            }
            let desc = view.ptable[idx];
            let offset = desc.offset as usize;
            let total_length = view.length as usize;
            let length = total_length - offset;
            (offset, length, 0u32)
        };
        let crc = if self.checksums {
            let start = self.entry_offset(offset);
            crc32(&self.bytes[start..start + length])
        } else {
            crc
        };
        let mut view = self.header_view_mut();
        let mut desc = view.ptable[idx];
        desc.length = length as u32;
        desc.crc = crc;
        view.ptable[idx] = desc;
        Ok(())
    }

    /// Write the final END (if nothing at all was written yet) and
    /// compute the header checksum.
    pub fn finalize(&mut self) -> Result<()> {
        {
            let cursor = self.used_entries_len();
            if cursor == 0 {
                self.append(EntryType::End, 0, 0, &[])?;
            }
        }
        let crc = if self.checksums { self.compute_header_crc() } else { 0 };
        let mut view = self.header_view_mut();
        view.crc = crc;
        Ok(())
    }

    fn compute_header_crc(&self) -> u32 {
        let mut header_bytes = [0u8; Header::SIZE];
        header_bytes.copy_from_slice(&self.bytes[..Header::SIZE]);
        // Zero the CRC field (bytes 8..12, right after the 8-byte magic) before hashing.
        header_bytes[8..12].copy_from_slice(&0u32.to_ne_bytes());
        crc32(&header_bytes)
    }

    /// True iff the magic matches and, when checksums are enabled, the
    /// header CRC matches.
    pub fn validate(&self) -> bool {
        let view = self.header_view();
        let magic = view.magic;
        if magic != MAGIC {
            return false;
        }
        if !self.checksums {
            return true;
        }
        let stored_crc = view.crc;
        stored_crc == self.compute_header_crc()
    }

    /// Zero a partition's entry bytes and clear its descriptor,
    /// regenerating the header CRC so the region stays self-consistent.
    pub fn zero_partition(&mut self, idx: usize) -> Result<()> {
        let (offset, length) = {
            let view = self.header_view();
            let partitions = view.partitions;
            if idx >= partitions as usize {
                return Err(Error::UnknownPartition);
            }
            let desc = view.ptable[idx];
            (desc.offset as usize, desc.length as usize)
        };
        let start = self.entry_offset(offset);
        for b in &mut self.bytes[start..start + length] {
            *b = 0;
        }
        {
            let mut view = self.header_view_mut();
            view.ptable[idx] = PartitionDescriptor::default();
        }
        if self.checksums {
            let crc = self.compute_header_crc();
            let mut view = self.header_view_mut();
            view.crc = crc;
        }
        Ok(())
    }

    /// True iff every partition slot in use is empty (zeroed).
    pub fn all_partitions_empty(&self) -> bool {
        let view = self.header_view();
        let partitions = view.partitions;
        for i in 0..partitions as usize {
            let desc = view.ptable[i];
            if !desc.is_empty() {
                return false;
            }
        }
        true
    }

    /// Wipe the entries area and reset the header to all zero
    /// (including the magic), for security hygiene once every
    /// partition has been consumed.
    pub fn zero(&mut self) {
        let used = self.used_entries_len();
        let start = Header::SIZE;
        for b in &mut self.bytes[start..start + used] {
            *b = 0;
        }
        let mut view = self.header_view_mut();
        *view = Header::default();
        view.magic = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    extern crate std;
    use std::vec;

    fn region(checksums: bool) -> vec::Vec<u8> {
        vec![0u8; 4096]
    }

    #[test]
    fn create_and_find_partition_round_trips() {
        let mut bytes = region(true);
        let mut r = StorageRegion::new(&mut bytes, true).unwrap();
        let idx = r.create_partition("app").unwrap();
        r.append(EntryType::Integer, 0, 42, &[]).unwrap();
        r.finish_partition(idx).unwrap();
        r.finalize().unwrap();
        assert!(r.validate());
        assert_eq!(r.find_partition("app").unwrap(), idx);
    }

    #[test]
    fn duplicate_partition_name_fails() {
        let mut bytes = region(true);
        let mut r = StorageRegion::new(&mut bytes, true).unwrap();
        r.create_partition("app").unwrap();
        assert_eq!(r.create_partition("app").unwrap_err(), Error::DuplicateKey);
    }

    #[test]
    fn name_too_long_fails() {
        let mut bytes = region(true);
        let mut r = StorageRegion::new(&mut bytes, true).unwrap();
        let long = "0123456789abcdef"; // 16 chars, == PARTITION_NAME_LEN
        assert_eq!(r.create_partition(long).unwrap_err(), Error::NameTooLong);
    }

    #[test]
    fn partition_table_full_fails() {
        let mut bytes = region(true);
        let mut r = StorageRegion::new(&mut bytes, true).unwrap();
        for i in 0..MAX_PARTITIONS {
            r.create_partition(&alloc::format!("p{}", i)).unwrap();
        }
        assert_eq!(r.create_partition("one-too-many").unwrap_err(), Error::PartitionTableFull);
    }

    #[test]
    fn bit_flip_breaks_validation() {
        let mut bytes = region(true);
        {
            let mut r = StorageRegion::new(&mut bytes, true).unwrap();
            let idx = r.create_partition("app").unwrap();
            r.append(EntryType::Buffer, 1, 4, &[1, 2, 3, 4]).unwrap();
            r.finish_partition(idx).unwrap();
            r.finalize().unwrap();
            assert!(r.validate());
        }
        bytes[Header::SIZE + 10] ^= 0xFF;
        let r = StorageRegion::from_existing(&mut bytes, true).unwrap();
        assert!(!r.validate() || r.find_partition("app").is_err());
    }

    #[test]
    fn zero_partition_then_zero_header() {
        let mut bytes = region(true);
        let mut r = StorageRegion::new(&mut bytes, true).unwrap();
        let idx = r.create_partition("app").unwrap();
        r.append(EntryType::Integer, 0, 1, &[]).unwrap();
        r.finish_partition(idx).unwrap();
        r.finalize().unwrap();
        r.zero_partition(idx).unwrap();
        assert!(r.all_partitions_empty());
        r.zero();
        assert!(!r.validate());
    }

    #[test]
    fn region_full_on_oversized_append() {
        let mut bytes = vec![0u8; Header::SIZE + EntryHeader::SIZE];
        let mut r = StorageRegion::new(&mut bytes, true).unwrap();
        let payload = [0u8; 64];
        assert_eq!(
            r.append(EntryType::Buffer, 0, payload.len() as i32, &payload).unwrap_err(),
            Error::RegionFull
        );
    }
}
