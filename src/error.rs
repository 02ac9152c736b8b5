//! Error kinds produced by the LiveUpdate core.
use core::fmt;

/// Every failure mode the core can produce. Variants carry only `Copy`
/// diagnostic data: there is no free-text message budget once data lives
/// inside the storage region itself.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Storage location is null-ish, inside the kernel image, or inside the heap.
    InvalidRegion,
    /// Storage header magic is wrong.
    MagicMismatch,
    /// Header or partition CRC does not match.
    ChecksumMismatch,
    /// `register_partition` called twice with the same name.
    DuplicateKey,
    /// Exceeded fixed partition table capacity.
    PartitionTableFull,
    /// Partition name exceeds the fixed name length.
    NameTooLong,
    /// `find_partition` did not match any partition.
    UnknownPartition,
    /// A Restore accessor was used on the wrong entry type.
    TypeMismatch,
    /// `as_vector<T>` where the stored element size did not equal `sizeof(T)`.
    SizeMismatch,
    /// TCP snapshot format tag did not match.
    VersionMismatch,
    /// TCP state tag was not in `[0, 10]`.
    StateTagOutOfRange,
    /// `go_next` / `pop_marker(id)` moved past END, or found the wrong marker id.
    WalkPastEnd,
    /// No ELF header found at offset 0 or the sector offset.
    ElfInvalid,
    /// Blob is shorter than the expected total computed from section headers.
    ElfIncomplete,
    /// Program header lacks a usable loadable segment.
    ElfMalformed,
    /// Appending would write past the end of the region.
    RegionFull,
    /// Stored string bytes were not valid UTF-8.
    InvalidUtf8,
    /// `rollback_now` called with no rollback blob ever set.
    NoRollbackBlob,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::InvalidRegion => "storage location is invalid (null, in heap, or in kernel image)",
            Error::MagicMismatch => "storage header magic mismatch",
            Error::ChecksumMismatch => "storage header or partition CRC mismatch",
            Error::DuplicateKey => "partition key already registered",
            Error::PartitionTableFull => "partition table is full",
            Error::NameTooLong => "partition name exceeds the fixed name length",
            Error::UnknownPartition => "no partition with that name",
            Error::TypeMismatch => "restore accessor used on the wrong entry type",
            Error::SizeMismatch => "stored element size does not match requested type",
            Error::VersionMismatch => "TCP snapshot format version mismatch",
            Error::StateTagOutOfRange => "TCP state tag out of range",
            Error::WalkPastEnd => "walked past END, or found the wrong marker id",
            Error::ElfInvalid => "no ELF header found in blob",
            Error::ElfIncomplete => "blob is shorter than the expected ELF size",
            Error::ElfMalformed => "ELF program header lacks a usable segment",
            Error::RegionFull => "append would write past the end of the storage region",
            Error::InvalidUtf8 => "stored string bytes were not valid UTF-8",
            Error::NoRollbackBlob => "rollback requested but no rollback blob was ever set",
        };
        f.write_str(msg)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
