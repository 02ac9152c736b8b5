//! Network stack contract. LiveUpdate snapshots TCP connections and hands them back on
//! resume, but never owns a socket, a route table, or a NIC driver:
//! the host network stack implements these traits and is handed to
//! `liveupdate::store`/`resume` by the embedder, the same way
//! `MemoryInfo` stands in for the allocator.
use alloc::vec::Vec;

use crate::tcp::snapshot::TcpSnapshot;

/// Opaque handle identifying one network stack instance (there may be
/// more than one NIC/stack in a single image). Used only as a map key
/// for the "awaiting retransmit wakeup" set in [`crate::context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NetworkStackId(pub u32);

/// Everything the TCP snapshot/restore path needs from a live
/// connection, independent of whatever stack implements TCP.
pub trait TcpConnection {
    fn snapshot(&self) -> TcpSnapshot;

    /// Bytes currently sitting in the connection's write queue, oldest
    /// first, not yet acknowledged by the peer.
    fn write_queue(&self) -> Vec<u8>;

    /// Bytes currently sitting in the connection's read queue, not yet
    /// delivered to the application.
    fn read_queue(&self) -> Vec<u8>;
}

/// A host network stack capable of handing back connections found by a
/// `(local, remote)` address pair and of restoring a connection from a
/// snapshot plus its queued bytes.
pub trait NetworkStack {
    fn id(&self) -> NetworkStackId;

    /// Re-create a TCP connection from a snapshot and its queued bytes.
    /// Returns `false` if the stack could not place the connection
    /// (e.g. the local port is already bound by something else).
    fn restore_connection(&mut self, snapshot: &TcpSnapshot, write_queue: &[u8], read_queue: &[u8]) -> bool;

    /// Ask the stack to re-arm retransmission timers for every
    /// connection restored so far. Called once resume has finished
    /// restoring all partitions, draining the "slumbering" set in
    /// [`crate::context::LiveUpdateContext`].
    fn wake_slumbering_connections(&mut self);
}
