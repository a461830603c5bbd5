//! Shared helpers for the integration tests.
//!
//! A [`RawPeer`] is a hand-scripted far end: it writes frames built with
//! `frame::encode` and reads whatever the engine under test puts on the
//! line through its own `FrameSync`.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use serial_link::frame::{self, address, Control, Frame, Seq};
use serial_link::simulator::{self, MemoryTransport, SimulatorConfig};
use serial_link::sync::FrameSync;
use serial_link::{Connection, LinkConfig, Role, Transport};

/// Every control code, for scanners that should see all traffic.
pub const ALL_CONTROLS: [Control; 9] = [
    Control::Set,
    Control::Ua,
    Control::Disc,
    Control::Info(Seq::Zero),
    Control::Info(Seq::One),
    Control::Rr(Seq::Zero),
    Control::Rr(Seq::One),
    Control::Rej(Seq::Zero),
    Control::Rej(Seq::One),
];

/// How long a raw peer waits for the engine's next frame.
pub const WAIT: Duration = Duration::from_secs(2);

/// Short timers so retransmission paths run quickly.
pub fn config(role: Role) -> LinkConfig {
    LinkConfig {
        max_retries: 3,
        timeout: Duration::from_millis(200),
        read_poll: Duration::from_millis(5),
        ..LinkConfig::new("memory", role)
    }
}

pub struct RawPeer {
    pub line: MemoryTransport,
}

impl RawPeer {
    pub fn new(line: MemoryTransport) -> Self {
        Self { line }
    }

    pub fn write(&mut self, address: u8, control: Control, payload: &[u8]) {
        self.line
            .write_bytes(&frame::encode(address, control, payload))
            .expect("raw write");
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.line.write_bytes(bytes).expect("raw write");
    }

    /// Next intact frame carrying `address`, or `None` if `within` elapses.
    pub fn read_frame(&mut self, address: u8, within: Duration) -> Option<Frame> {
        let mut sync = FrameSync::new(address, &ALL_CONTROLS).with_max_payload(u16::MAX as usize);
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            let Some(byte) = self.line.read_byte().expect("raw read") else {
                continue;
            };
            if let Some(Ok(frame)) = sync.feed(byte) {
                return Some(frame);
            }
        }
        None
    }

    /// Control code of the next frame carrying `address`.
    pub fn expect(&mut self, address: u8) -> Control {
        self.read_frame(address, WAIT)
            .unwrap_or_else(|| panic!("no frame with address 0x{address:02x}"))
            .control
    }

    /// Collect every frame carrying `address` until the line is quiet for
    /// `quiet`.
    pub fn drain_frames(&mut self, address: u8, quiet: Duration) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.read_frame(address, quiet) {
            frames.push(frame);
        }
        frames
    }

    /// Raw bytes until the line is quiet for `quiet`.
    pub fn drain_bytes(&mut self, quiet: Duration) -> Vec<u8> {
        let mut out = Vec::new();
        let mut deadline = Instant::now() + quiet;
        while Instant::now() < deadline {
            if let Some(byte) = self.line.read_byte().expect("raw read") {
                out.push(byte);
                deadline = Instant::now() + quiet;
            }
        }
        out
    }
}

/// Initiator connection whose far end is a raw peer.  The UA is queued
/// before the SET goes out, so no thread is needed.
pub fn initiator_against_raw(config: LinkConfig) -> (Connection<MemoryTransport>, RawPeer) {
    let (a, b) = simulator::pair(SimulatorConfig::default());
    let mut peer = RawPeer::new(b);
    peer.write(address::TRANSMITTER, Control::Ua, &[]);
    let conn = Connection::open_with(a, config).expect("initiator open");
    assert_eq!(peer.expect(address::TRANSMITTER), Control::Set);
    (conn, peer)
}

/// Responder connection whose far end is a raw peer.
pub fn responder_against_raw(config: LinkConfig) -> (Connection<MemoryTransport>, RawPeer) {
    let (a, b) = simulator::pair(SimulatorConfig::default());
    let mut peer = RawPeer::new(b);
    peer.write(address::TRANSMITTER, Control::Set, &[]);
    let conn = Connection::open_with(a, config).expect("responder open");
    assert_eq!(peer.expect(address::TRANSMITTER), Control::Ua);
    (conn, peer)
}

/// Deterministic payload of `len` bytes that includes FLAG and ESCAPE.
pub fn payload(len: usize, salt: u8) -> Vec<u8> {
    (0..len)
        .map(|i| match i % 7 {
            0 => frame::FLAG,
            3 => frame::ESCAPE,
            _ => (i as u8).wrapping_mul(31).wrapping_add(salt),
        })
        .collect()
}
