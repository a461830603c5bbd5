//! Crate-wide error type.
//!
//! Byte-level noise and single-frame corruption are absorbed by the frame
//! synchroniser and the ARQ loop; only the variants that end a session are
//! ever returned from the public [`crate::connection::Connection`] API.

use thiserror::Error;

use crate::frame::Control;
use crate::state::{HandshakePhase, LinkState};

#[derive(Error, Debug)]
pub enum LinkError {
    /// The serial device could not be opened or configured.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// I/O failure on an already-open transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SET/UA or DISC/DISC/UA exchange exhausted its retry budget.
    #[error("{phase} handshake timed out after {attempts} attempt(s)")]
    HandshakeTimeout { phase: HandshakePhase, attempts: u32 },

    /// BCC2 mismatch on a complete information frame.
    #[error("frame corrupted: BCC2 mismatch on {control}")]
    FrameCorrupted { control: Control },

    /// An information frame was never acknowledged.
    #[error("retransmission limit exceeded after {attempts} attempt(s)")]
    RetransmissionLimitExceeded { attempts: u32 },

    /// A well-formed frame arrived that does not fit the current exchange.
    #[error("unexpected frame type {0}")]
    UnexpectedFrameType(Control),

    #[error("operation not allowed while link is {state}")]
    BadState { state: LinkState },

    #[error("payload of {len} bytes exceeds the maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The peer started the disconnect handshake while we were receiving.
    #[error("peer disconnected")]
    PeerDisconnected,

    /// Nothing arrived for longer than the peer's whole retransmission budget.
    #[error("peer silent for {0:?}")]
    PeerSilent(std::time::Duration),

    #[error("malformed application packet: {0}")]
    MalformedPacket(String),
}

pub type Result<T> = std::result::Result<T, LinkError>;
