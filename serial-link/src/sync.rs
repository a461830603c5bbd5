//! Receive-side frame synchronisation.
//!
//! [`FrameSync`] is a byte-at-a-time scanner that recovers frame boundaries
//! from a raw, possibly noisy stream.  It validates the header against the
//! address and control codes that are acceptable in the current protocol
//! phase, destuffs the payload as it streams in, and checks BCC2 when the
//! closing flag arrives.
//!
//! ```text
//!  Idle ─FLAG─▶ SawFlag ─addr─▶ SawAddress ─ctrl─▶ SawControl ─bcc1─▶ HeaderValidated
//!                  ▲ FLAG                                                │     │
//!                  └──────── any violating FLAG ◀────────────────────────┘     │ data
//!                                                                            ▼
//!               Complete ◀──FLAG── InPayload ◀──byte^0x20── Escaped ◀──ESC───┘
//! ```
//!
//! Any byte that violates the expected transition drops back to `Idle`,
//! except a `FLAG`, which always restarts frame acquisition at `SawFlag`.
//!
//! The scanner owns no I/O; the caller feeds it bytes read from the
//! transport and acts on the frames it yields.

use crate::error::LinkError;
use crate::frame::{bcc1, bcc2, Control, Frame, ESCAPE, ESCAPE_MASK, FLAG};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Idle,
    SawFlag,
    SawAddress,
    SawControl(Control),
    HeaderValidated(Control),
    InPayload(Control),
    Escaped(Control),
}

/// Streaming frame scanner for one protocol phase.
#[derive(Debug)]
pub struct FrameSync {
    address: u8,
    accepts: Vec<Control>,
    max_payload: usize,
    state: SyncState,
    /// Destuffed bytes of the frame in progress; the last one is BCC2.
    buf: Vec<u8>,
}

impl FrameSync {
    /// Scanner that accepts frames addressed with `address` whose control
    /// field is one of `accepts`.
    pub fn new(address: u8, accepts: &[Control]) -> Self {
        Self {
            address,
            accepts: accepts.to_vec(),
            max_payload: usize::MAX - 1,
            state: SyncState::Idle,
            buf: Vec::new(),
        }
    }

    /// Abandon information frames whose payload grows past `max_payload`.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload.min(usize::MAX - 1);
        self
    }

    /// Forget any partially acquired frame.
    pub fn reset(&mut self) {
        self.state = SyncState::Idle;
        self.buf.clear();
    }

    /// Consume one byte from the stream.
    ///
    /// Returns `Some(Ok(frame))` when a complete, valid frame has been
    /// recognised and `Some(Err(LinkError::FrameCorrupted { .. }))` when an
    /// information frame completed with a BCC2 mismatch.  Returns `None`
    /// while more bytes are needed.
    pub fn feed(&mut self, byte: u8) -> Option<Result<Frame, LinkError>> {
        use SyncState::*;

        let mut out = None;
        self.state = match self.state {
            Idle => resync(byte),
            SawFlag => match byte {
                FLAG => SawFlag,
                b if b == self.address => SawAddress,
                _ => Idle,
            },
            SawAddress => match Control::from_byte(byte) {
                Some(c) if self.accepts.contains(&c) => SawControl(c),
                _ => resync(byte),
            },
            SawControl(c) => {
                if byte == bcc1(self.address, c.to_byte()) {
                    self.buf.clear();
                    HeaderValidated(c)
                } else {
                    resync(byte)
                }
            }
            HeaderValidated(c) if !c.is_info() => {
                if byte == FLAG {
                    out = Some(Ok(Frame::command(self.address, c)));
                }
                Idle
            }
            HeaderValidated(c) | InPayload(c) => match byte {
                ESCAPE => Escaped(c),
                FLAG if self.buf.is_empty() => SawFlag,
                FLAG => {
                    out = Some(self.complete(c));
                    Idle
                }
                b => self.push(c, b),
            },
            Escaped(c) => match byte {
                FLAG => {
                    log::warn!("[sync] flag inside escape sequence; frame dropped");
                    self.buf.clear();
                    SawFlag
                }
                b if b == FLAG ^ ESCAPE_MASK || b == ESCAPE ^ ESCAPE_MASK => {
                    self.push(c, b ^ ESCAPE_MASK)
                }
                b => {
                    log::warn!("[sync] invalid escape pair 0x{ESCAPE:02x} 0x{b:02x}; frame dropped");
                    self.buf.clear();
                    Idle
                }
            },
        };
        out
    }

    fn push(&mut self, control: Control, byte: u8) -> SyncState {
        // payload plus the trailing BCC2
        if self.buf.len() > self.max_payload {
            log::warn!(
                "[sync] {control} exceeds {} payload bytes; frame dropped",
                self.max_payload
            );
            self.buf.clear();
            return SyncState::Idle;
        }
        self.buf.push(byte);
        SyncState::InPayload(control)
    }

    fn complete(&mut self, control: Control) -> Result<Frame, LinkError> {
        let mut payload = std::mem::take(&mut self.buf);
        let check = payload.pop().unwrap_or_default();
        if bcc2(&payload) != check {
            return Err(LinkError::FrameCorrupted { control });
        }
        Ok(Frame {
            address: self.address,
            control,
            payload,
        })
    }
}

#[inline]
fn resync(byte: u8) -> SyncState {
    if byte == FLAG {
        SyncState::SawFlag
    } else {
        SyncState::Idle
    }
}
