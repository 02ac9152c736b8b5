//! The deserialization side of the public API (`Restore`/
//! `Deserializer`): a forward-only cursor over one
//! partition's entry bytes, mirroring [`crate::serialize::Serializer`]
//! on the way in.
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use zerocopy::{FromBytes, LayoutVerified};

use crate::error::{Error, Result};
use crate::stream::{Stream, StreamRegistry};
use crate::storage::entry::{EntryHeader, EntryType};
use crate::tcp::snapshot::TcpSnapshot;

pub struct Restore<'a> {
    bytes: &'a [u8],
    cursor: usize,
    end: usize,
    streams: &'a StreamRegistry,
}

impl<'a> Restore<'a> {
    /// `bytes` is the full region's entries area; `start`/`end` bound
    /// the partition being walked.
    pub fn new(bytes: &'a [u8], start: usize, end: usize, streams: &'a StreamRegistry) -> Self {
        Restore { bytes, cursor: start, end, streams }
    }

    fn header(&self) -> Result<EntryHeader> {
        if self.cursor + EntryHeader::SIZE > self.bytes.len() {
            return Err(Error::WalkPastEnd);
        }
        let view: LayoutVerified<&[u8], EntryHeader> =
            LayoutVerified::new(&self.bytes[self.cursor..self.cursor + EntryHeader::SIZE])
                .ok_or(Error::WalkPastEnd)?;
        Ok(*view)
    }

    fn current_type(&self) -> Result<EntryType> {
        let h = self.header()?;
        let tag = h.ty;
        EntryType::from_i16(tag).ok_or(Error::TypeMismatch)
    }

    fn payload(&self) -> Result<&'a [u8]> {
        let h = self.header()?;
        let len = h.len.max(0) as usize;
        let start = self.cursor + EntryHeader::SIZE;
        if start + len > self.bytes.len() {
            return Err(Error::WalkPastEnd);
        }
        Ok(&self.bytes[start..start + len])
    }

    pub fn is_end(&self) -> bool {
        self.cursor >= self.end || matches!(self.current_type(), Ok(EntryType::End))
    }

    pub fn is_marker(&self) -> bool {
        matches!(self.current_type(), Ok(EntryType::Marker))
    }

    pub fn is_int(&self) -> bool {
        matches!(self.current_type(), Ok(EntryType::Integer))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.current_type(), Ok(EntryType::String))
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self.current_type(), Ok(EntryType::Buffer))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self.current_type(), Ok(EntryType::Vector))
    }

    pub fn is_string_vector(&self) -> bool {
        matches!(self.current_type(), Ok(EntryType::StringVector))
    }

    pub fn is_tcp(&self) -> bool {
        matches!(self.current_type(), Ok(EntryType::Tcp))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.current_type(), Ok(EntryType::Stream))
    }

    /// The `id` tag of the entry currently under the cursor.
    pub fn next_id(&self) -> Result<u16> {
        Ok(self.header()?.id)
    }

    pub fn as_int(&self) -> Result<i32> {
        if !self.is_int() {
            return Err(Error::TypeMismatch);
        }
        Ok(self.header()?.len)
    }

    pub fn as_string(&self) -> Result<String> {
        if !self.is_string() {
            return Err(Error::TypeMismatch);
        }
        let bytes = self.payload()?;
        core::str::from_utf8(bytes).map(String::from).map_err(|_| Error::InvalidUtf8)
    }

    pub fn as_buffer(&self) -> Result<Vec<u8>> {
        if !self.is_buffer() {
            return Err(Error::TypeMismatch);
        }
        Ok(self.payload()?.to_vec())
    }

    /// Reinterpret the current `VECTOR` entry's payload as `&[T]`.
    /// Fails if the payload length isn't a whole number of `T`s.
    pub fn as_vector<T: FromBytes + Copy>(&self) -> Result<Vec<T>> {
        if !self.is_vector() {
            return Err(Error::TypeMismatch);
        }
        let bytes = self.payload()?;
        if bytes.len() % core::mem::size_of::<T>() != 0 {
            return Err(Error::SizeMismatch);
        }
        let count = bytes.len() / core::mem::size_of::<T>();
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let chunk = &bytes[i * core::mem::size_of::<T>()..(i + 1) * core::mem::size_of::<T>()];
            let view: LayoutVerified<&[u8], T> = LayoutVerified::new(chunk).ok_or(Error::SizeMismatch)?;
            out.push(*view);
        }
        Ok(out)
    }

    pub fn as_string_vector(&self) -> Result<Vec<String>> {
        if !self.is_string_vector() {
            return Err(Error::TypeMismatch);
        }
        let bytes = self.payload()?;
        let mut out = Vec::new();
        let mut at = 0;
        while at < bytes.len() {
            if at + 4 > bytes.len() {
                return Err(Error::SizeMismatch);
            }
            let mut len_bytes = [0u8; 4];
            len_bytes.copy_from_slice(&bytes[at..at + 4]);
            let len = u32::from_le_bytes(len_bytes) as usize;
            at += 4;
            if at + len > bytes.len() {
                return Err(Error::SizeMismatch);
            }
            let s = core::str::from_utf8(&bytes[at..at + len]).map_err(|_| Error::InvalidUtf8)?;
            out.push(String::from(s));
            at += len;
        }
        Ok(out)
    }

    /// Reconstruct the TCP snapshot plus its write/read queues.
    pub fn as_tcp_connection(&self) -> Result<(TcpSnapshot, Vec<u8>, Vec<u8>)> {
        if !self.is_tcp() {
            return Err(Error::TypeMismatch);
        }
        TcpSnapshot::from_bytes(self.payload()?)
    }

    /// Reconstruct a stream by dispatching on its leading `subid`.
    pub fn as_tls_stream(&self) -> Result<Box<dyn Stream>> {
        if !self.is_stream() {
            return Err(Error::TypeMismatch);
        }
        let bytes = self.payload()?;
        if bytes.len() < 2 {
            return Err(Error::SizeMismatch);
        }
        let mut subid_bytes = [0u8; 2];
        subid_bytes.copy_from_slice(&bytes[0..2]);
        let subid = u16::from_le_bytes(subid_bytes);
        self.streams.deserialize(subid, &bytes[2..])
    }

    /// Reinterpret the current entry's payload as a single `T`.
    pub fn as_type<T: FromBytes + Copy>(&self) -> Result<T> {
        let bytes = self.payload()?;
        let view: LayoutVerified<&[u8], T> = LayoutVerified::new(bytes).ok_or(Error::SizeMismatch)?;
        Ok(*view)
    }

    /// Advance past the current entry.
    pub fn go_next(&mut self) -> Result<()> {
        let total = self.header()?.total_len();
        self.cursor += total;
        Ok(())
    }

    /// Skip forward past any entries that aren't a marker, consume the
    /// marker found (if any), and return its id. Returns 0 if the
    /// partition ends before a marker turns up.
    pub fn pop_marker(&mut self) -> Result<u16> {
        while !self.is_marker() && !self.is_end() {
            self.go_next()?;
        }
        if self.is_marker() {
            let id = self.next_id()?;
            self.go_next()?;
            Ok(id)
        } else {
            Ok(0)
        }
    }

    /// Skip forward past any entries that aren't a marker, and require
    /// the marker found to carry `id`.
    pub fn pop_marker_id(&mut self, id: u16) -> Result<()> {
        while !self.is_marker() && !self.is_end() {
            self.go_next()?;
        }
        if self.is_marker() {
            if self.next_id()? != id {
                return Err(Error::WalkPastEnd);
            }
            self.go_next()?;
        }
        Ok(())
    }

    /// Stop walking this partition early; no further entries will be
    /// visited even if more remain in the underlying bytes.
    pub fn cancel(&mut self) {
        self.cursor = self.end;
    }
}
