//! The serialization side of the public API (`Serializer`): a thin
//! typed-append wrapper over
//! [`crate::storage::region::StorageRegion`], handed to each
//! registered partition callback in turn.
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use zerocopy::AsBytes;

use crate::error::Result;
use crate::net::TcpConnection;
use crate::storage::entry::EntryType;
use crate::storage::region::StorageRegion;
use crate::stream::Stream;

/// A registered partition's serialization routine. Boxed rather than
/// generic so [`crate::context::LiveUpdateContext`] can hold a
/// homogeneous list of them.
pub type StorageFunc = Box<dyn FnMut(&mut Serializer)>;

/// Handed to a partition callback; every `add_*` call appends one
/// entry to that partition in the underlying region.
pub struct Serializer<'a, 'b> {
    region: &'a mut StorageRegion<'b>,
}

impl<'a, 'b> Serializer<'a, 'b> {
    pub fn new(region: &'a mut StorageRegion<'b>) -> Self {
        Serializer { region }
    }

    pub fn put_marker(&mut self, id: u16) -> Result<()> {
        self.region.append(EntryType::Marker, id, 0, &[])
    }

    pub fn add_int(&mut self, id: u16, value: i32) -> Result<()> {
        self.region.append(EntryType::Integer, id, value, &[])
    }

    pub fn add_string(&mut self, id: u16, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        self.region.append(EntryType::String, id, bytes.len() as i32, bytes)
    }

    pub fn add_buffer(&mut self, id: u16, value: &[u8]) -> Result<()> {
        self.region.append(EntryType::Buffer, id, value.len() as i32, value)
    }

    /// Append a vector of plain-old-data elements as one `VECTOR` entry.
    pub fn add_vector<T: AsBytes>(&mut self, id: u16, value: &[T]) -> Result<()> {
        let bytes = value.as_bytes();
        self.region.append(EntryType::Vector, id, bytes.len() as i32, bytes)
    }

    /// Append a vector of strings as one `STRING_VECTOR` entry: each
    /// string prefixed with its length as `u32`, concatenated.
    pub fn add_string_vector(&mut self, id: u16, value: &[String]) -> Result<()> {
        let mut bytes = Vec::new();
        for s in value {
            bytes.extend_from_slice(&(s.len() as u32).to_le_bytes());
            bytes.extend_from_slice(s.as_bytes());
        }
        self.region.append(EntryType::StringVector, id, bytes.len() as i32, &bytes)
    }

    /// Append one generic plain-old-data value (not part of the
    /// original's fixed type list, but useful for small fixed-size
    /// structs an embedder wants to snapshot verbatim).
    pub fn add<T: AsBytes>(&mut self, id: u16, value: &T) -> Result<()> {
        let bytes = value.as_bytes();
        self.region.append(EntryType::Buffer, id, bytes.len() as i32, bytes)
    }

    pub fn add_connection(&mut self, id: u16, conn: &dyn TcpConnection) -> Result<()> {
        let snapshot = conn.snapshot();
        let write_queue = conn.write_queue();
        let read_queue = conn.read_queue();
        let bytes = snapshot.to_bytes(&write_queue, &read_queue);
        self.region.append(EntryType::Tcp, id, bytes.len() as i32, &bytes)
    }

    pub fn add_stream(&mut self, id: u16, stream: &dyn Stream) -> Result<()> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&stream.subid().to_le_bytes());
        stream.serialize(&mut bytes);
        self.region.append(EntryType::Stream, id, bytes.len() as i32, &bytes)
    }
}
