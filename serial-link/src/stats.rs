//! Transfer statistics.
//!
//! Observability only; nothing in the protocol reads these counters.

use std::time::Duration;

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub frames_sent: u64,       // every frame written, retransmissions included
    pub frames_received: u64,   // complete, valid frames accepted by the scanner
    pub retransmissions: u64,   // second and later copies of the same frame
    pub timeouts: u64,          // attempts that expired without a reply
    pub rej_sent: u64,          // BCC2 failures answered with REJ
    pub rej_received: u64,
    pub duplicates: u64,        // information frames re-acknowledged, not delivered
    pub payload_bytes_sent: u64,
    pub payload_bytes_delivered: u64,
}

impl Statistics {
    /// Emit a summary through the `log` facade.
    pub fn log_summary(&self, elapsed: Duration) {
        log::info!(
            "[stats] frames sent={} received={} retransmissions={} timeouts={}",
            self.frames_sent,
            self.frames_received,
            self.retransmissions,
            self.timeouts
        );
        log::info!(
            "[stats] REJ sent={} received={} duplicates={}",
            self.rej_sent,
            self.rej_received,
            self.duplicates
        );
        log::info!(
            "[stats] payload bytes sent={} delivered={} elapsed={:.3}s",
            self.payload_bytes_sent,
            self.payload_bytes_delivered,
            elapsed.as_secs_f64()
        );
    }
}
