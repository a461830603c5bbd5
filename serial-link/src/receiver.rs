//! Inbound stop-and-wait state.
//!
//! The [`Receiver`] decides what happens to an information frame *after*
//! the scanner has recognised it and *before* its payload reaches the
//! application:
//! - A frame carrying the expected sequence number is accepted; the
//!   expected number toggles and `RR(next)` acknowledges it.
//! - A frame carrying the other number is a retransmission whose
//!   acknowledgement was lost.  It is acknowledged again with the same
//!   `RR`, but its payload is **not** delivered a second time.
//! - A frame that failed BCC2 is answered with `REJ(expected)`.
//!
//! The [`Receiver`] does not write replies itself; it returns the control
//! code that [`crate::connection::Connection`] sends back.

use crate::frame::{Control, Seq};

/// Outcome of an intact information frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// New data: deliver the payload, then send `reply`.
    Accept { reply: Control },
    /// Already delivered: send `reply`, drop the payload.
    Duplicate { reply: Control },
}

#[derive(Debug, Default)]
pub struct Receiver {
    expected: Seq,
}

impl Receiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the next new information frame.
    pub fn expected(&self) -> Seq {
        self.expected
    }

    pub fn on_info(&mut self, seq: Seq) -> Delivery {
        if seq == self.expected {
            self.expected = seq.next();
            Delivery::Accept {
                reply: Control::Rr(self.expected),
            }
        } else {
            Delivery::Duplicate {
                reply: Control::Rr(self.expected),
            }
        }
    }

    /// Reply for an information frame whose BCC2 did not check.
    pub fn on_corrupted(&self) -> Control {
        Control::Rej(self.expected)
    }
}
