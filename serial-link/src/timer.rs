//! Retransmission deadline and attempt budget.
//!
//! There is no background timer task and no signal handler.  The
//! [`RetransmitTimer`] only records *when* the current attempt expires;
//! the connection's read loop compares [`RetransmitTimer::deadline`] with
//! the clock between blocking single-byte reads, which are themselves
//! bounded by the transport's inter-byte timer.
//!
//! Each call to [`RetransmitTimer::start_attempt`] consumes one unit of the
//! budget and re-arms the deadline; once the budget is spent the caller
//! gives up with a fatal error.

use std::time::{Duration, Instant};

/// Per-frame retransmission state.
#[derive(Debug)]
pub struct RetransmitTimer {
    timeout: Duration,
    max_attempts: u32,
    attempts: u32,
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    pub fn new(timeout: Duration, max_attempts: u32) -> Self {
        Self {
            timeout,
            max_attempts,
            attempts: 0,
            deadline: None,
        }
    }

    /// Consume one attempt and arm the deadline.
    ///
    /// Returns `false` (leaving the timer disarmed) when the budget is
    /// already exhausted.
    pub fn start_attempt(&mut self) -> bool {
        if self.attempts >= self.max_attempts {
            self.deadline = None;
            return false;
        }
        self.attempts += 1;
        self.deadline = Some(Instant::now() + self.timeout);
        true
    }

    /// Stop waiting: the expected reply arrived.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// When the current attempt runs out, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Number of attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `true` for the second and later attempts.
    pub fn is_retry(&self) -> bool {
        self.attempts > 1
    }
}
