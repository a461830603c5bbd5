//! Outbound stop-and-wait state.
//!
//! [`Sender`] tracks the one-bit sequence number of the next information
//! frame and interprets the peer's supervisory replies.  It does **not**
//! touch the transport; [`crate::connection::Connection`] owns the
//! write / wait / retransmit loop.
//!
//! # Stop-and-Wait contract
//! - At most **one** information frame is outstanding.
//! - `RR(seq ^ 1)` acknowledges it: the sequence number toggles.
//! - `REJ(seq)` asks for an immediate retransmission of the same frame.
//! - Anything else (a stale `RR(seq)`, a `REJ` for the other number) is
//!   ignored and the sender keeps waiting.

use crate::frame::{encode, Control, Seq};

/// What a reply means for the outstanding frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Positive acknowledgement; the sequence number has advanced.
    Acked,
    /// Negative acknowledgement; retransmit now.
    Rejected,
    /// Not about the outstanding frame.
    Ignored,
}

/// Supervisory frames a sender listens for while a frame is outstanding.
pub const REPLIES: [Control; 4] = [
    Control::Rr(Seq::Zero),
    Control::Rr(Seq::One),
    Control::Rej(Seq::Zero),
    Control::Rej(Seq::One),
];

#[derive(Debug, Default)]
pub struct Sender {
    seq: Seq,
}

impl Sender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next (or outstanding) information frame carries.
    pub fn seq(&self) -> Seq {
        self.seq
    }

    /// Encoded information frame for `payload` with the current number.
    pub fn build_info_frame(&self, address: u8, payload: &[u8]) -> Vec<u8> {
        encode(address, Control::Info(self.seq), payload)
    }

    /// Interpret a supervisory reply to the outstanding frame.
    pub fn on_reply(&mut self, control: Control) -> Reply {
        match control {
            Control::Rr(n) if n == self.seq.next() => {
                self.seq = n;
                Reply::Acked
            }
            Control::Rej(n) if n == self.seq => Reply::Rejected,
            _ => Reply::Ignored,
        }
    }
}
