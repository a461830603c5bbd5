//! Link finite-state machine types.
//!
//! State transitions are driven by [`crate::connection`]; this module only
//! names the states and the peer roles.
//!
//! ```text
//!  CLOSED ──open()──▶ CONNECTING ──SET/UA──▶ OPEN
//!    ▲                    │                    │
//!    │   retries exhausted│            close() │ or peer DISC
//!    ├────────────────────┘                    ▼
//!    └─────────────── DISC/DISC/UA ─────── CLOSING
//! ```

use std::fmt;
use std::str::FromStr;

use crate::frame::address;

/// Current state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No session; initial and final state.
    #[default]
    Closed,
    /// Initiator has sent SET / responder is waiting for it.
    Connecting,
    /// Handshake complete; information frames may flow.
    Open,
    /// Disconnect handshake in progress.
    Closing,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Which side of the link this endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Originates the connection (SET) and the disconnect (DISC).
    Initiator,
    /// Waits for the peer's SET and DISC.
    Responder,
}

impl Role {
    /// Address carried by commands this side originates (and the replies
    /// the peer sends back to them).
    pub fn command_address(self) -> u8 {
        match self {
            Role::Initiator => address::TRANSMITTER,
            Role::Responder => address::RECEIVER,
        }
    }

    /// Address carried by the peer's commands (and our replies to them).
    pub fn peer_address(self) -> u8 {
        match self {
            Role::Initiator => address::RECEIVER,
            Role::Responder => address::TRANSMITTER,
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tx" | "initiator" => Ok(Role::Initiator),
            "rx" | "responder" => Ok(Role::Responder),
            _ => Err(format!("Unknown role: {s} (expected tx or rx)")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Responder => write!(f, "responder"),
        }
    }
}

/// Which handshake failed, for [`crate::error::LinkError::HandshakeTimeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Open,
    Close,
}

impl fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakePhase::Open => write!(f, "open"),
            HandshakePhase::Close => write!(f, "close"),
        }
    }
}
