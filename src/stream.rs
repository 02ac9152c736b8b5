//! Pluggable stream registry. Streams (TLS
//! sessions and similar transport wrappers over a TCP connection) are
//! dispatched by a numeric `subid` rather than through a vtable,
//! grounded in `serialize_s2n.cpp`'s `s2n::TLS_stream::SUBID`
//! constant: the serializer tags each `STREAM` entry with the
//! concrete type's subid, and restore looks that tag up in this
//! registry to find the matching deserializer.
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::error::{Error, Result};

/// A stream wrapping an underlying TCP connection, capable of
/// serializing its own session state (e.g. a TLS handshake record).
pub trait Stream {
    /// Numeric tag identifying the concrete stream type; must match a
    /// deserializer registered under the same id.
    fn subid(&self) -> u16;

    fn serialize(&self, out: &mut Vec<u8>);
}

/// Reconstructs a boxed stream from its serialized bytes. Returns
/// `None` on malformed input; the caller turns that into
/// `Error::TypeMismatch`.
pub type DeserializeFn = fn(&[u8]) -> Option<Box<dyn Stream>>;

/// `{subid -> deserializer}`, populated by every stream type an
/// embedder wants resumable before the first call to `resume`.
pub struct StreamRegistry {
    deserializers: BTreeMap<u16, DeserializeFn>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        StreamRegistry { deserializers: BTreeMap::new() }
    }

    pub fn register(&mut self, subid: u16, f: DeserializeFn) -> Result<()> {
        if self.deserializers.contains_key(&subid) {
            return Err(Error::DuplicateKey);
        }
        self.deserializers.insert(subid, f);
        Ok(())
    }

    pub fn deserialize(&self, subid: u16, bytes: &[u8]) -> Result<Box<dyn Stream>> {
        let f = self.deserializers.get(&subid).ok_or(Error::TypeMismatch)?;
        f(bytes).ok_or(Error::TypeMismatch)
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        StreamRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(u16);
    impl Stream for Dummy {
        fn subid(&self) -> u16 {
            self.0
        }
        fn serialize(&self, out: &mut Vec<u8>) {
            out.push(self.0 as u8);
        }
    }

    fn make_dummy(bytes: &[u8]) -> Option<Box<dyn Stream>> {
        bytes.first().map(|b| Box::new(Dummy(*b as u16)) as Box<dyn Stream>)
    }

    #[test]
    fn unregistered_subid_fails() {
        let reg = StreamRegistry::new();
        assert_eq!(reg.deserialize(7, &[1]).unwrap_err(), Error::TypeMismatch);
    }

    #[test]
    fn registered_subid_round_trips() {
        let mut reg = StreamRegistry::new();
        reg.register(7, make_dummy).unwrap();
        let stream = reg.deserialize(7, &[9]).unwrap();
        assert_eq!(stream.subid(), 9);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut reg = StreamRegistry::new();
        reg.register(7, make_dummy).unwrap();
        assert_eq!(reg.register(7, make_dummy).unwrap_err(), Error::DuplicateKey);
    }
}
