//! Entry type tags and the type-length-value entry header.
use zerocopy::{AsBytes, FromBytes};

/// 16-bit type tag in every entry header.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    End = 0,
    Marker = 1,
    Integer = 2,
    String = 3,
    Buffer = 4,
    Vector = 5,
    StringVector = 6,
    Tcp = 7,
    Stream = 8,
}

impl EntryType {
    pub fn from_i16(tag: i16) -> Option<EntryType> {
        Some(match tag {
            0 => EntryType::End,
            1 => EntryType::Marker,
            2 => EntryType::Integer,
            3 => EntryType::String,
            4 => EntryType::Buffer,
            5 => EntryType::Vector,
            6 => EntryType::StringVector,
            7 => EntryType::Tcp,
            8 => EntryType::Stream,
            _ => return None,
        })
    }
}

/// Fixed-size entry header; `len` bytes of payload (the `vla`) follow
/// immediately after it in the partition's byte range. `INTEGER`
/// entries carry their value directly in `len` and have a zero-length
/// payload.
#[repr(packed)]
#[derive(Clone, Copy, Debug, Default, FromBytes, AsBytes)]
pub struct EntryHeader {
    pub ty: i16,
    pub id: u16,
    pub len: i32,
}

impl EntryHeader {
    pub const SIZE: usize = core::mem::size_of::<EntryHeader>();

    pub fn entry_type(&self) -> Option<EntryType> {
        EntryType::from_i16({ self.ty })
    }

    /// Bytes of `vla` payload actually following this header. `END`,
    /// `MARKER` and `INTEGER` entries carry no payload at all —
    /// `INTEGER` stores its value directly in `len` — so only the
    /// other entry types have a payload sized by `len`.
    pub fn payload_len(&self) -> usize {
        match self.entry_type() {
            Some(EntryType::End) | Some(EntryType::Marker) | Some(EntryType::Integer) => 0,
            _ => self.len.max(0) as usize,
        }
    }

    /// Total on-wire size of this entry, header plus payload.
    pub fn total_len(&self) -> usize {
        EntryHeader::SIZE + self.payload_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_is_none() {
        assert_eq!(EntryType::from_i16(99), None);
    }

    #[test]
    fn known_tags_round_trip() {
        for tag in 0..=8i16 {
            let ty = EntryType::from_i16(tag).unwrap();
            assert_eq!(ty as i16, tag);
        }
    }

    #[test]
    fn total_len_includes_header() {
        let h = EntryHeader { ty: EntryType::Buffer as i16, id: 1, len: 10 };
        assert_eq!(h.total_len(), EntryHeader::SIZE + 10);
    }

    #[test]
    fn integer_entries_carry_no_payload() {
        let h = EntryHeader { ty: EntryType::Integer as i16, id: 1, len: 42 };
        assert_eq!(h.total_len(), EntryHeader::SIZE);
    }

    #[test]
    fn end_and_marker_entries_carry_no_payload() {
        let end = EntryHeader { ty: EntryType::End as i16, id: 0, len: 0 };
        let marker = EntryHeader { ty: EntryType::Marker as i16, id: 9, len: 0 };
        assert_eq!(end.total_len(), EntryHeader::SIZE);
        assert_eq!(marker.total_len(), EntryHeader::SIZE);
    }
}
