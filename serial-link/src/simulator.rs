//! In-memory serial line with fault injection.
//!
//! Real serial lines drop, corrupt and (through retransmission races)
//! duplicate frames.  To exercise the reliability mechanisms without
//! hardware, [`pair`] returns two connected [`MemoryTransport`] endpoints
//! (device A and device B of a null-modem cable) and each endpoint applies a
//! configurable fault model to the bytes it writes:
//!
//! | Fault       | Description                                          |
//! |-------------|------------------------------------------------------|
//! | Loss        | Drop a whole write (one frame) with `loss_rate`.     |
//! | Corruption  | Flip one bit of one byte with `corrupt_rate`.        |
//! | Duplication | Deliver a write twice with `duplicate_rate`.         |
//!
//! Every endpoint draws from its own seeded RNG so failures reproduce.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::transport::Transport;

/// Inter-byte timer of the in-memory line.
pub const DEFAULT_POLL: Duration = Duration::from_millis(5);

/// Fault model for one direction of the line.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub duplicate_rate: f64,
    pub seed: u64,
    /// How long `read_byte` waits before reporting silence.
    pub poll: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults: a transparent pass-through.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            duplicate_rate: 0.0,
            seed: 0,
            poll: DEFAULT_POLL,
        }
    }
}

impl SimulatorConfig {
    pub fn lossy(loss_rate: f64, corrupt_rate: f64, seed: u64) -> Self {
        Self {
            loss_rate,
            corrupt_rate,
            seed,
            ..Self::default()
        }
    }
}

/// One end of an in-memory serial line.
#[derive(Debug)]
pub struct MemoryTransport {
    tx: Option<Sender<u8>>,
    rx: Receiver<u8>,
    faults: SimulatorConfig,
    rng: StdRng,
    closed: bool,
}

/// Two endpoints wired back to back.  Both directions use `config`; the
/// second endpoint's RNG is seeded with `config.seed + 1`.
pub fn pair(config: SimulatorConfig) -> (MemoryTransport, MemoryTransport) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    let mut b_faults = config.clone();
    b_faults.seed = config.seed.wrapping_add(1);
    (
        MemoryTransport::new(a_tx, a_rx, config),
        MemoryTransport::new(b_tx, b_rx, b_faults),
    )
}

impl MemoryTransport {
    fn new(tx: Sender<u8>, rx: Receiver<u8>, faults: SimulatorConfig) -> Self {
        Self {
            tx: Some(tx),
            rx,
            rng: StdRng::seed_from_u64(faults.seed),
            faults,
            closed: false,
        }
    }

    /// Replace the fault model applied to this endpoint's writes.
    pub fn set_faults(&mut self, faults: SimulatorConfig) {
        self.rng = StdRng::seed_from_u64(faults.seed);
        self.faults = faults;
    }

    fn roll(&mut self, p: f64) -> bool {
        self.rng.random_bool(p.clamp(0.0, 1.0))
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "memory transport closed"));
        }
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        self.ensure_open()?;
        match self.rx.recv_timeout(self.faults.poll) {
            Ok(b) => Ok(Some(b)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                // Peer hung up: the line just stays quiet.
                std::thread::sleep(self.faults.poll);
                Ok(None)
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.ensure_open()?;

        if self.roll(self.faults.loss_rate) {
            log::debug!("[sim] dropped {} byte(s)", bytes.len());
            return Ok(());
        }

        let mut wire = bytes.to_vec();
        if !wire.is_empty() && self.roll(self.faults.corrupt_rate) {
            let i = self.rng.random_range(0..wire.len());
            let bit = self.rng.random_range(0..8u32);
            wire[i] ^= 1 << bit;
            log::debug!("[sim] flipped bit {bit} of byte {i}");
        }

        let copies = if self.roll(self.faults.duplicate_rate) { 2 } else { 1 };
        if let Some(tx) = &self.tx {
            for _ in 0..copies {
                for &b in &wire {
                    if tx.send(b).is_err() {
                        // Nobody listening on the other end; bytes vanish.
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.tx = None;
        self.closed = true;
        Ok(())
    }
}
