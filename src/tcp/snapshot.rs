//! TCP connection snapshot/restore, grounded in
//! `serialize_tcp.cpp`: the fixed control-block fields are laid out as
//! a packed struct the way [`crate::storage::header`] lays out the
//! region header, and the write/read queues are appended as
//! length-prefixed byte ranges after it, all inside one `TCP` entry's
//! payload.
use alloc::vec::Vec;

use bitflags::bitflags;
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, LayoutVerified};

use crate::error::{Error, Result};
use crate::tcp::state::TcpState;

bitflags! {
    /// Retransmission/congestion bookkeeping booleans, packed into one
    /// byte on the wire the way `serialize_tcp.cpp` packs them into
    /// adjacent bitfields.
    #[derive(Default)]
    pub struct TcpFlags: u8 {
        const FAST_RECOVERY   = 1 << 0;
        const RENO_FPACK_SEEN = 1 << 1;
        const LIMITED_TX      = 1 << 2;
        const RTX_IS_RUNNING  = 1 << 3;
    }
}

/// One IPv4 TCP endpoint: address plus port.
#[repr(packed)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, AsBytes)]
pub struct Endpoint {
    pub address: [u8; 4],
    pub port: u16,
    _pad: u16,
}
assert_eq_size!(Endpoint, [u8; 8]);

impl Endpoint {
    pub fn new(address: [u8; 4], port: u16) -> Self {
        Endpoint { address, port, _pad: 0 }
    }
}

/// Format tag stamped into every `TcpFixed`, bumped whenever the
/// layout changes. `from_bytes` treats a mismatch as a hard error
/// rather than attempting to interpret bytes written by a different
/// layout.
pub const TCP_SNAPSHOT_VERSION: u16 = 1;

/// The fixed-size portion of a TCP snapshot: endpoints, transmission
/// control block, retransmission bookkeeping, and the two state tags.
/// `state_prev` lets resume tell a connection that was mid-close from
/// one that was freshly established.
#[repr(packed)]
#[derive(Clone, Copy, Debug, Default, FromBytes, AsBytes)]
pub struct TcpFixed {
    pub version: u16,
    _pad0: u16,
    pub local: Endpoint,
    pub remote: Endpoint,

    // Transmission control block (RFC 793 naming).
    pub send_una: u32,
    pub send_nxt: u32,
    pub send_wnd: u32,
    pub recv_nxt: u32,
    pub recv_wnd: u32,
    pub iss: u32,
    pub irs: u32,

    pub state_now: u8,
    pub state_prev: u8,
    pub flags: u8,
    _pad: u8,

    pub rttm: u32,
    pub rtx_attempt: u32,
    pub syn_rtx: u32,
    pub dup_acks: u32,
    pub queued: u32,
    pub highest_ack: u32,
    pub prev_highest_ack: u32,
    pub last_acked_ts: u32,
    pub dack: u32,
    pub last_ack_sent: u32,
}
assert_eq_size!(TcpFixed, [u8; 4 + 8 + 8 + 28 + 4 + 40]);

impl TcpFixed {
    pub const SIZE: usize = core::mem::size_of::<TcpFixed>();
}

/// A TCP connection snapshot, ready to serialize into a `TCP` storage
/// entry or to restore a connection from.
#[derive(Debug, Clone)]
pub struct TcpSnapshot {
    pub local: Endpoint,
    pub remote: Endpoint,
    pub send_una: u32,
    pub send_nxt: u32,
    pub send_wnd: u32,
    pub recv_nxt: u32,
    pub recv_wnd: u32,
    pub iss: u32,
    pub irs: u32,
    pub state_now: TcpState,
    pub state_prev: TcpState,
    pub flags: TcpFlags,
    pub rttm: u32,
    pub rtx_attempt: u32,
    pub syn_rtx: u32,
    pub dup_acks: u32,
    pub queued: u32,
    pub highest_ack: u32,
    pub prev_highest_ack: u32,
    pub last_acked_ts: u32,
    pub dack: u32,
    pub last_ack_sent: u32,
}

impl TcpSnapshot {
    /// Serialize the fixed fields followed by the two length-prefixed
    /// queues, matching the on-wire layout of a `TCP` entry's payload.
    pub fn to_bytes(&self, write_queue: &[u8], read_queue: &[u8]) -> Vec<u8> {
        let fixed = TcpFixed {
            version: TCP_SNAPSHOT_VERSION,
            _pad0: 0,
            local: self.local,
            remote: self.remote,
            send_una: self.send_una,
            send_nxt: self.send_nxt,
            send_wnd: self.send_wnd,
            recv_nxt: self.recv_nxt,
            recv_wnd: self.recv_wnd,
            iss: self.iss,
            irs: self.irs,
            state_now: self.state_now.tag(),
            state_prev: self.state_prev.tag(),
            flags: self.flags.bits(),
            _pad: 0,
            rttm: self.rttm,
            rtx_attempt: self.rtx_attempt,
            syn_rtx: self.syn_rtx,
            dup_acks: self.dup_acks,
            queued: self.queued,
            highest_ack: self.highest_ack,
            prev_highest_ack: self.prev_highest_ack,
            last_acked_ts: self.last_acked_ts,
            dack: self.dack,
            last_ack_sent: self.last_ack_sent,
        };
        let mut out = Vec::with_capacity(
            TcpFixed::SIZE + 4 + write_queue.len() + 4 + read_queue.len(),
        );
        out.extend_from_slice(fixed.as_bytes());
        out.extend_from_slice(&(write_queue.len() as u32).to_le_bytes());
        out.extend_from_slice(write_queue);
        out.extend_from_slice(&(read_queue.len() as u32).to_le_bytes());
        out.extend_from_slice(read_queue);
        out
    }

    /// Parse a `TCP` entry's payload back into a snapshot plus the two
    /// queues. Fails hard on an out-of-range state tag or a length
    /// prefix that runs past the end of the buffer.
    pub fn from_bytes(buf: &[u8]) -> Result<(TcpSnapshot, Vec<u8>, Vec<u8>)> {
        if buf.len() < TcpFixed::SIZE {
            return Err(Error::SizeMismatch);
        }
        let view: LayoutVerified<&[u8], TcpFixed> =
            LayoutVerified::new(&buf[..TcpFixed::SIZE]).ok_or(Error::SizeMismatch)?;
        let fixed: TcpFixed = *view;
        let version = fixed.version;
        if version != TCP_SNAPSHOT_VERSION {
            return Err(Error::VersionMismatch);
        }
        let mut cursor = TcpFixed::SIZE;

        let write_len = read_u32(buf, cursor)? as usize;
        cursor += 4;
        if cursor + write_len > buf.len() {
            return Err(Error::SizeMismatch);
        }
        let write_queue = buf[cursor..cursor + write_len].to_vec();
        cursor += write_len;

        let read_len = read_u32(buf, cursor)? as usize;
        cursor += 4;
        if cursor + read_len > buf.len() {
            return Err(Error::SizeMismatch);
        }
        let read_queue = buf[cursor..cursor + read_len].to_vec();

        let state_now_tag = fixed.state_now;
        let state_prev_tag = fixed.state_prev;
        let state_now = TcpState::from_tag(state_now_tag).ok_or(Error::StateTagOutOfRange)?;
        let state_prev = TcpState::from_tag(state_prev_tag).ok_or(Error::StateTagOutOfRange)?;

        let snapshot = TcpSnapshot {
            local: fixed.local,
            remote: fixed.remote,
            send_una: fixed.send_una,
            send_nxt: fixed.send_nxt,
            send_wnd: fixed.send_wnd,
            recv_nxt: fixed.recv_nxt,
            recv_wnd: fixed.recv_wnd,
            iss: fixed.iss,
            irs: fixed.irs,
            state_now,
            state_prev,
            flags: TcpFlags::from_bits_truncate(fixed.flags),
            rttm: fixed.rttm,
            rtx_attempt: fixed.rtx_attempt,
            syn_rtx: fixed.syn_rtx,
            dup_acks: fixed.dup_acks,
            queued: fixed.queued,
            highest_ack: fixed.highest_ack,
            prev_highest_ack: fixed.prev_highest_ack,
            last_acked_ts: fixed.last_acked_ts,
            dack: fixed.dack,
            last_ack_sent: fixed.last_ack_sent,
        };
        Ok((snapshot, write_queue, read_queue))
    }
}

fn read_u32(buf: &[u8], at: usize) -> Result<u32> {
    if at + 4 > buf.len() {
        return Err(Error::SizeMismatch);
    }
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[at..at + 4]);
    Ok(u32::from_le_bytes(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    extern crate std;

    fn sample() -> TcpSnapshot {
        TcpSnapshot {
            local: Endpoint::new([10, 0, 0, 1], 8080),
            remote: Endpoint::new([10, 0, 0, 2], 55000),
            send_una: 100,
            send_nxt: 200,
            send_wnd: 65535,
            recv_nxt: 300,
            recv_wnd: 65535,
            iss: 1000,
            irs: 2000,
            state_now: TcpState::Established,
            state_prev: TcpState::SynRcvd,
            flags: TcpFlags::RENO_FPACK_SEEN | TcpFlags::RTX_IS_RUNNING,
            rttm: 42,
            rtx_attempt: 0,
            syn_rtx: 1,
            dup_acks: 0,
            queued: 0,
            highest_ack: 199,
            prev_highest_ack: 150,
            last_acked_ts: 123456,
            dack: 0,
            last_ack_sent: 200,
        }
    }

    #[test]
    fn round_trips_with_queues() {
        let snap = sample();
        let write_queue = std::vec![1u8, 2, 3, 4, 5];
        let read_queue = std::vec![9u8, 8, 7];
        let bytes = snap.to_bytes(&write_queue, &read_queue);
        let (restored, wq, rq) = TcpSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(wq, write_queue);
        assert_eq!(rq, read_queue);
        assert_eq!(restored.state_now, TcpState::Established);
        assert_eq!(restored.state_prev, TcpState::SynRcvd);
        assert_eq!({ restored.local.port }, 8080);
        assert_eq!({ restored.send_una }, 100);
        assert!(restored.flags.contains(TcpFlags::RENO_FPACK_SEEN));
        assert!(!restored.flags.contains(TcpFlags::FAST_RECOVERY));
    }

    #[test]
    fn round_trips_with_empty_queues() {
        let snap = sample();
        let bytes = snap.to_bytes(&[], &[]);
        let (_, wq, rq) = TcpSnapshot::from_bytes(&bytes).unwrap();
        assert!(wq.is_empty());
        assert!(rq.is_empty());
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let snap = sample();
        let bytes = snap.to_bytes(&[1, 2, 3], &[4, 5]);
        assert!(TcpSnapshot::from_bytes(&bytes[..bytes.len() - 10]).is_err());
    }

    #[test]
    fn mismatched_version_tag_is_rejected() {
        let snap = sample();
        let mut bytes = snap.to_bytes(&[1, 2, 3], &[4, 5]);
        bytes[0..2].copy_from_slice(&(TCP_SNAPSHOT_VERSION + 1).to_ne_bytes());
        assert_eq!(TcpSnapshot::from_bytes(&bytes).unwrap_err(), Error::VersionMismatch);
    }
}
