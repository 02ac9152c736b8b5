//! Wire layout of the storage region header and partition table.
//! Plain packed structs read in place over the
//! caller's byte range via `zerocopy`, the same way
//! `drivers/storage/part/src/gpt.rs` lays `Header`/`Partition` over a
//! raw LBA buffer.
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes};

/// `0xBAADB33FDEADC0DE`, constant across every image.
pub const MAGIC: u64 = 0xBAAD_B33F_DEAD_C0DE;

/// Fixed small constant for the partition name length.
pub const PARTITION_NAME_LEN: usize = 16;

/// Fixed partition table capacity.
pub const MAX_PARTITIONS: usize = 8;

/// The region-wide, fixed-size prefix.
#[repr(packed)]
#[derive(Clone, Copy, Debug, Default, FromBytes, AsBytes)]
pub struct Header {
    pub magic: u64,
    pub crc: u32,
    pub partitions: u32,
    pub length: u32,
    pub ptable: [PartitionDescriptor; MAX_PARTITIONS],
}
assert_eq_size!(Header, [u8; 8 + 4 + 4 + 4 + 28 * MAX_PARTITIONS]);

/// One partition table slot.
#[repr(packed)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, AsBytes)]
pub struct PartitionDescriptor {
    pub name: [u8; PARTITION_NAME_LEN],
    pub offset: u32,
    pub length: u32,
    pub crc: u32,
}
assert_eq_size!(PartitionDescriptor, [u8; PARTITION_NAME_LEN + 4 + 4 + 4]);

impl PartitionDescriptor {
    pub fn is_empty(&self) -> bool {
        self.name[0] == 0
    }

    pub fn name_str(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    pub fn set_name(&mut self, key: &str) -> crate::error::Result<()> {
        if key.len() >= PARTITION_NAME_LEN {
            return Err(crate::error::Error::NameTooLong);
        }
        self.name = [0u8; PARTITION_NAME_LEN];
        self.name[..key.len()].copy_from_slice(key.as_bytes());
        Ok(())
    }
}

impl Header {
    /// Fixed byte size of the header (magic + crc + partitions + length + ptable).
    pub const SIZE: usize = core::mem::size_of::<Header>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_name_round_trips() {
        let mut d = PartitionDescriptor::default();
        d.set_name("app").unwrap();
        assert_eq!(d.name_str(), "app");
        assert!(!d.is_empty());
    }

    #[test]
    fn name_too_long_is_rejected() {
        let mut d = PartitionDescriptor::default();
        assert!(d.set_name("this-name-is-definitely-too-long").is_err());
    }

    #[test]
    fn default_descriptor_is_empty() {
        assert!(PartitionDescriptor::default().is_empty());
    }
}
