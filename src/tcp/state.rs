//! TCP connection state, the subset relevant to snapshot/restore,
//! grounded in `serialize_tcp.cpp`'s `Connection::State` enum and its
//! `(state_now, state_prev)` pair.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpState {
    Closed = 0,
    Listen = 1,
    SynSent = 2,
    SynRcvd = 3,
    Established = 4,
    FinWait1 = 5,
    FinWait2 = 6,
    CloseWait = 7,
    Closing = 8,
    LastAck = 9,
    TimeWait = 10,
}

impl TcpState {
    /// Decode a wire tag. Unlike most of this crate's parsing, an
    /// out-of-range tag here is a hard failure rather than something
    /// to skip past: a corrupt TCP state can't be reasoned about.
    pub fn from_tag(tag: u8) -> Option<TcpState> {
        Some(match tag {
            0 => TcpState::Closed,
            1 => TcpState::Listen,
            2 => TcpState::SynSent,
            3 => TcpState::SynRcvd,
            4 => TcpState::Established,
            5 => TcpState::FinWait1,
            6 => TcpState::FinWait2,
            7 => TcpState::CloseWait,
            8 => TcpState::Closing,
            9 => TcpState::LastAck,
            10 => TcpState::TimeWait,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_round_trips() {
        for tag in 0..=10u8 {
            let state = TcpState::from_tag(tag).unwrap();
            assert_eq!(state.tag(), tag);
        }
    }

    #[test]
    fn out_of_range_tag_is_none() {
        assert_eq!(TcpState::from_tag(11), None);
        assert_eq!(TcpState::from_tag(255), None);
    }
}
