//! Engine configuration.
//!
//! The CLI (or any other embedding) fills a [`LinkConfig`]; the connection
//! validates it once at open and reads it for the rest of the session.

use std::time::Duration;

use crate::error::{LinkError, Result};
use crate::state::Role;

/// Default line speed.
pub const DEFAULT_BAUD_RATE: u32 = 38_400;
/// Default number of transmissions per frame before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default time to wait for a reply before retransmitting.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// Default maximum information-frame payload.
pub const DEFAULT_MAX_PAYLOAD: usize = 1000;
/// Default transport inter-byte timer.
pub const DEFAULT_READ_POLL: Duration = Duration::from_millis(100);

/// Upper bounds accepted by [`LinkConfig::validate`].
pub const MAX_RETRIES_LIMIT: u32 = 1000;
pub const MAX_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const MAX_CONNECT_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Everything the engine needs to run one session.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Serial device path, e.g. `/dev/ttyS0`.
    pub port: String,
    pub baud_rate: u32,
    pub role: Role,
    /// Total transmissions of one frame (first attempt included).
    pub max_retries: u32,
    /// Per-attempt wait for the expected reply.
    pub timeout: Duration,
    pub max_payload: usize,
    /// Upper bound on one blocking transport read.  Also the granularity at
    /// which retransmission deadlines are noticed.
    pub read_poll: Duration,
    /// How long a responder waits for the first SET.  `None` waits forever.
    pub connect_wait: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyS0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            role: Role::Initiator,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            max_payload: DEFAULT_MAX_PAYLOAD,
            read_poll: DEFAULT_READ_POLL,
            connect_wait: None,
        }
    }
}

impl LinkConfig {
    pub fn new(port: impl Into<String>, role: Role) -> Self {
        Self {
            port: port.into(),
            role,
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 || self.max_retries > MAX_RETRIES_LIMIT {
            return Err(LinkError::InvalidConfig(format!(
                "max_retries must be within 1..={MAX_RETRIES_LIMIT}, got {}",
                self.max_retries
            )));
        }
        if self.timeout.is_zero() || self.timeout > MAX_TIMEOUT {
            return Err(LinkError::InvalidConfig(format!(
                "timeout must be non-zero and at most {MAX_TIMEOUT:?}, got {:?}",
                self.timeout
            )));
        }
        if self.read_poll.is_zero() || self.read_poll > self.timeout {
            return Err(LinkError::InvalidConfig(format!(
                "read_poll must be non-zero and at most the timeout, got {:?}",
                self.read_poll
            )));
        }
        if let Some(wait) = self.connect_wait {
            if wait > MAX_CONNECT_WAIT {
                return Err(LinkError::InvalidConfig(format!(
                    "connect_wait must be at most {MAX_CONNECT_WAIT:?}, got {wait:?}"
                )));
            }
        }
        if self.max_payload == 0 || self.max_payload > u16::MAX as usize {
            return Err(LinkError::InvalidConfig(format!(
                "max_payload must be within 1..={}, got {}",
                u16::MAX,
                self.max_payload
            )));
        }
        Ok(())
    }

    /// Longest a receiver waits in silence before concluding the peer has
    /// exhausted its own retransmission budget.
    pub fn silence_limit(&self) -> Duration {
        self.timeout
            .saturating_mul(self.max_retries.saturating_add(1))
    }
}
