//! TCP connection snapshot and restore.
pub mod snapshot;
pub mod state;

pub use snapshot::{Endpoint, TcpFlags, TcpSnapshot};
pub use state::TcpState;
