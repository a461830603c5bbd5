//! Per-session protocol engine.
//!
//! A [`Connection`] owns the complete state of one link session.  Its
//! responsibilities are:
//! - Running the SET/UA handshake on open and DISC/DISC/UA on close.
//! - Stop-and-wait transfer of information frames, coordinating
//!   [`crate::sender`] and [`crate::receiver`].
//! - Feeding transport bytes into a [`crate::sync::FrameSync`] scanner
//!   configured for the frames acceptable in the current phase.
//! - Retransmitting on REJ or on deadline expiry via [`crate::timer`].
//!
//! Everything happens on the caller's thread in a read-decide-act loop:
//! blocking one-byte reads, bounded by the transport's inter-byte timer,
//! with the retransmission deadline checked between reads.

use std::time::{Duration, Instant};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::frame::{Control, Frame, Seq};
use crate::receiver::{Delivery, Receiver};
use crate::sender::{Reply, Sender, REPLIES};
use crate::state::{HandshakePhase, LinkState, Role};
use crate::stats::Statistics;
use crate::sync::FrameSync;
use crate::timer::RetransmitTimer;
use crate::transport::{SerialPort, Transport};

/// Result of waiting for one frame.
enum Scan {
    Frame(Frame),
    Corrupted(Control),
    Expired,
}

/// One reliable link session over a [`Transport`].
pub struct Connection<T: Transport> {
    transport: T,
    config: LinkConfig,
    state: LinkState,
    sender: Sender,
    receiver: Receiver,
    stats: Statistics,
    opened_at: Instant,
    /// The peer's DISC has already been seen (inside `receive`).
    peer_disc: bool,
}

impl Connection<SerialPort> {
    /// Open the configured serial device and establish the link.
    pub fn open(config: LinkConfig) -> Result<Self> {
        config.validate()?;
        let port = SerialPort::open(&config.port, config.baud_rate, config.read_poll)?;
        Self::open_with(port, config)
    }
}

impl<T: Transport> Connection<T> {
    /// Establish the link over an already-open transport.
    ///
    /// The initiator sends SET until UA arrives or the retry budget runs
    /// out; the responder waits for SET (forever unless
    /// [`LinkConfig::connect_wait`] is set) and answers UA.  On failure the
    /// transport is closed before the error is returned.
    pub fn open_with(mut transport: T, config: LinkConfig) -> Result<Self> {
        if let Err(e) = config.validate() {
            let _ = transport.close();
            return Err(e);
        }

        let mut conn = Self {
            transport,
            config,
            state: LinkState::Connecting,
            sender: Sender::new(),
            receiver: Receiver::new(),
            stats: Statistics::default(),
            opened_at: Instant::now(),
            peer_disc: false,
        };
        log::info!("[link] {} connecting", conn.role());

        let result = match conn.role() {
            Role::Initiator => conn.connect_initiator(),
            Role::Responder => conn.connect_responder(),
        };

        match result {
            Ok(()) => {
                conn.state = LinkState::Open;
                conn.opened_at = Instant::now();
                log::info!("[link] {} open", conn.role());
                Ok(conn)
            }
            Err(e) => {
                log::error!("[link] open failed: {e}");
                let _ = conn.transport.close();
                conn.state = LinkState::Closed;
                Err(e)
            }
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Sequence number the next information frame will carry.
    pub fn send_sequence(&self) -> Seq {
        self.sender.seq()
    }

    /// Sequence number of the next new information frame from the peer.
    pub fn expected_sequence(&self) -> Seq {
        self.receiver.expected()
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Time since the link reached [`LinkState::Open`].
    pub fn elapsed(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Reliably deliver one payload to the peer.
    ///
    /// Blocks until the frame is acknowledged.  A REJ triggers an immediate
    /// retransmission; silence triggers one when the per-attempt timeout
    /// expires.  Returns the number of payload bytes delivered.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize> {
        self.require_open()?;
        if payload.len() > self.config.max_payload {
            return Err(LinkError::PayloadTooLarge {
                len: payload.len(),
                max: self.config.max_payload,
            });
        }

        let address = self.role().command_address();
        let control = Control::Info(self.sender.seq());
        let bytes = self.sender.build_info_frame(address, payload);
        let mut sync = FrameSync::new(address, &REPLIES);
        let mut timer = self.timer();

        'attempts: while timer.start_attempt() {
            self.transmit(&bytes, control, timer.is_retry())?;
            sync.reset();

            loop {
                let frame = match self.next_frame(&mut sync, timer.deadline())? {
                    Scan::Frame(frame) => frame,
                    Scan::Corrupted(_) => continue,
                    Scan::Expired => {
                        self.stats.timeouts += 1;
                        log::warn!(
                            "[link] no reply to {control} (attempt {}/{})",
                            timer.attempts(),
                            self.config.max_retries
                        );
                        continue 'attempts;
                    }
                };

                match self.sender.on_reply(frame.control) {
                    Reply::Acked => {
                        timer.disarm();
                        self.stats.payload_bytes_sent += payload.len() as u64;
                        return Ok(payload.len());
                    }
                    Reply::Rejected => {
                        self.stats.rej_received += 1;
                        log::warn!("[link] ← {}; retransmitting {control}", frame.control);
                        continue 'attempts;
                    }
                    Reply::Ignored => {
                        log::debug!("[link] {}", LinkError::UnexpectedFrameType(frame.control));
                    }
                }
            }
        }

        log::error!("[link] {control} never acknowledged");
        Err(LinkError::RetransmissionLimitExceeded {
            attempts: timer.attempts(),
        })
    }

    /// Block until the next new payload from the peer arrives.
    ///
    /// Corrupted frames are answered with REJ and duplicates are
    /// re-acknowledged without being returned.  Fails with
    /// [`LinkError::PeerDisconnected`] if the peer starts the disconnect
    /// handshake, and with [`LinkError::PeerSilent`] if nothing arrives for
    /// longer than the peer's whole retransmission budget.
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        self.require_open()?;

        let peer = self.role().peer_address();
        let mut accepts = vec![Control::Info(Seq::Zero), Control::Info(Seq::One)];
        if self.role() == Role::Responder {
            // lost UA (peer repeats SET) and the start of the disconnect
            accepts.extend([Control::Set, Control::Disc]);
        }
        let mut sync = FrameSync::new(peer, &accepts).with_max_payload(self.config.max_payload);
        let silence = self.config.silence_limit();

        loop {
            let deadline = Instant::now() + silence;
            match self.next_frame(&mut sync, Some(deadline))? {
                Scan::Expired => {
                    log::error!("[link] peer silent for {silence:?}");
                    return Err(LinkError::PeerSilent(silence));
                }
                Scan::Corrupted(control) => {
                    let reply = self.receiver.on_corrupted();
                    self.stats.rej_sent += 1;
                    log::warn!("[link] ← {control} failed BCC2; → {reply}");
                    self.reply(peer, reply)?;
                }
                Scan::Frame(frame) => match frame.control {
                    Control::Info(seq) => match self.receiver.on_info(seq) {
                        Delivery::Accept { reply } => {
                            self.reply(peer, reply)?;
                            self.stats.payload_bytes_delivered += frame.payload.len() as u64;
                            return Ok(frame.payload);
                        }
                        Delivery::Duplicate { reply } => {
                            self.stats.duplicates += 1;
                            log::warn!("[link] ← duplicate {}; → {reply}", frame.control);
                            self.reply(peer, reply)?;
                        }
                    },
                    Control::Set => {
                        log::debug!("[link] ← SET while open; → UA");
                        self.reply(peer, Control::Ua)?;
                    }
                    Control::Disc => {
                        log::info!("[link] ← DISC; peer is closing");
                        self.peer_disc = true;
                        self.state = LinkState::Closing;
                        return Err(LinkError::PeerDisconnected);
                    }
                    other => {
                        log::debug!("[link] {}", LinkError::UnexpectedFrameType(other));
                    }
                },
            }
        }
    }

    /// Tear the link down and release the transport.
    ///
    /// The transport is closed and the state becomes
    /// [`LinkState::Closed`] even when the disconnect handshake fails.
    /// With `show_statistics` the session counters are logged.
    pub fn close(&mut self, show_statistics: bool) -> Result<()> {
        if self.state == LinkState::Closed {
            return Ok(());
        }

        self.state = LinkState::Closing;
        log::info!("[link] {} closing", self.role());
        let mut result = match self.role() {
            Role::Initiator => self.disconnect_initiator(),
            Role::Responder => self.disconnect_responder(),
        };

        if show_statistics {
            log::info!(
                "[stats] port={} role={} max_retries={} timeout={:?}",
                self.config.port,
                self.role(),
                self.config.max_retries,
                self.config.timeout
            );
            self.stats.log_summary(self.elapsed());
        }

        if let Err(e) = self.transport.close() {
            log::warn!("[link] transport close failed: {e}");
            if result.is_ok() {
                result = Err(e.into());
            }
        }
        self.state = LinkState::Closed;

        match &result {
            Ok(()) => log::info!("[link] {} closed", self.role()),
            Err(e) => log::error!("[link] close failed: {e}"),
        }
        result
    }

    // -----------------------------------------------------------------------
    // Handshakes
    // -----------------------------------------------------------------------

    fn connect_initiator(&mut self) -> Result<()> {
        let address = self.role().command_address();
        let set = Frame::command(address, Control::Set).encode();
        let mut sync = FrameSync::new(address, &[Control::Ua]);
        let mut timer = self.timer();

        while timer.start_attempt() {
            self.transmit(&set, Control::Set, timer.is_retry())?;
            sync.reset();
            if self.await_frame(&mut sync, timer.deadline())?.is_some() {
                return Ok(());
            }
            self.stats.timeouts += 1;
            log::warn!(
                "[link] UA not received (attempt {}/{})",
                timer.attempts(),
                self.config.max_retries
            );
        }

        Err(LinkError::HandshakeTimeout {
            phase: HandshakePhase::Open,
            attempts: timer.attempts(),
        })
    }

    fn connect_responder(&mut self) -> Result<()> {
        let peer = self.role().peer_address();
        let mut sync = FrameSync::new(peer, &[Control::Set]);
        let deadline = self.config.connect_wait.map(|wait| Instant::now() + wait);

        if self.await_frame(&mut sync, deadline)?.is_none() {
            return Err(LinkError::HandshakeTimeout {
                phase: HandshakePhase::Open,
                attempts: 1,
            });
        }
        self.reply(peer, Control::Ua)
    }

    /// DISC → (DISC) → UA.
    fn disconnect_initiator(&mut self) -> Result<()> {
        let address = self.role().command_address();
        let peer = self.role().peer_address();
        let disc = Frame::command(address, Control::Disc).encode();
        let mut sync = FrameSync::new(peer, &[Control::Disc]);
        let mut timer = self.timer();

        while timer.start_attempt() {
            self.transmit(&disc, Control::Disc, timer.is_retry())?;
            sync.reset();
            if self.await_frame(&mut sync, timer.deadline())?.is_some() {
                timer.disarm();
                return self.reply(peer, Control::Ua);
            }
            self.stats.timeouts += 1;
            log::warn!(
                "[link] DISC not answered (attempt {}/{})",
                timer.attempts(),
                self.config.max_retries
            );
        }

        Err(LinkError::HandshakeTimeout {
            phase: HandshakePhase::Close,
            attempts: timer.attempts(),
        })
    }

    /// (DISC) → DISC → UA.
    fn disconnect_responder(&mut self) -> Result<()> {
        let address = self.role().command_address();

        if !self.peer_disc {
            self.await_peer_disc()?;
        }

        let disc = Frame::command(address, Control::Disc).encode();
        let mut sync = FrameSync::new(address, &[Control::Ua]);
        let mut timer = self.timer();

        while timer.start_attempt() {
            self.transmit(&disc, Control::Disc, timer.is_retry())?;
            sync.reset();
            if self.await_frame(&mut sync, timer.deadline())?.is_some() {
                return Ok(());
            }
            self.stats.timeouts += 1;
            log::warn!(
                "[link] final UA not received (attempt {}/{})",
                timer.attempts(),
                self.config.max_retries
            );
        }

        Err(LinkError::HandshakeTimeout {
            phase: HandshakePhase::Close,
            attempts: timer.attempts(),
        })
    }

    /// Wait for the initiator's DISC, re-acknowledging retransmitted
    /// information frames whose RR was lost.
    fn await_peer_disc(&mut self) -> Result<()> {
        let peer = self.role().peer_address();
        let accepts = [Control::Disc, Control::Info(Seq::Zero), Control::Info(Seq::One)];
        let mut sync = FrameSync::new(peer, &accepts).with_max_payload(self.config.max_payload);
        let silence = self.config.silence_limit();

        loop {
            let deadline = Instant::now() + silence;
            match self.next_frame(&mut sync, Some(deadline))? {
                Scan::Expired => {
                    return Err(LinkError::HandshakeTimeout {
                        phase: HandshakePhase::Close,
                        attempts: 1,
                    })
                }
                Scan::Corrupted(_) => {}
                Scan::Frame(frame) => match frame.control {
                    Control::Disc => {
                        self.peer_disc = true;
                        return Ok(());
                    }
                    Control::Info(seq) if seq != self.receiver.expected() => {
                        self.stats.duplicates += 1;
                        self.reply(peer, Control::Rr(self.receiver.expected()))?;
                    }
                    other => {
                        log::warn!("[link] discarding {other} received while closing");
                    }
                },
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn require_open(&self) -> Result<()> {
        if self.state != LinkState::Open {
            return Err(LinkError::BadState { state: self.state });
        }
        Ok(())
    }

    fn timer(&self) -> RetransmitTimer {
        RetransmitTimer::new(self.config.timeout, self.config.max_retries)
    }

    fn transmit(&mut self, bytes: &[u8], control: Control, retry: bool) -> Result<()> {
        self.transport.write_bytes(bytes)?;
        self.stats.frames_sent += 1;
        if retry {
            self.stats.retransmissions += 1;
            log::warn!("[link] → {control} len={} (retransmission)", bytes.len());
        } else {
            log::debug!("[link] → {control} len={}", bytes.len());
        }
        Ok(())
    }

    fn reply(&mut self, address: u8, control: Control) -> Result<()> {
        let bytes = Frame::command(address, control).encode();
        self.transmit(&bytes, control, false)
    }

    /// Read until `sync` yields a frame or `deadline` passes.
    ///
    /// The deadline is only checked between reads, so it is noticed at most
    /// one inter-byte period late.
    fn next_frame(&mut self, sync: &mut FrameSync, deadline: Option<Instant>) -> Result<Scan> {
        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(Scan::Expired);
            }
            let Some(byte) = self.transport.read_byte()? else {
                continue;
            };
            match sync.feed(byte) {
                None => {}
                Some(Ok(frame)) => {
                    self.stats.frames_received += 1;
                    log::debug!("[link] ← {} len={}", frame.control, frame.payload.len());
                    return Ok(Scan::Frame(frame));
                }
                Some(Err(LinkError::FrameCorrupted { control })) => {
                    return Ok(Scan::Corrupted(control));
                }
                Some(Err(e)) => return Err(e),
            }
        }
    }

    /// Like [`next_frame`](Self::next_frame) but skips corrupted frames;
    /// `None` on expiry.
    fn await_frame(&mut self, sync: &mut FrameSync, deadline: Option<Instant>) -> Result<Option<Frame>> {
        loop {
            match self.next_frame(sync, deadline)? {
                Scan::Frame(frame) => return Ok(Some(frame)),
                Scan::Corrupted(_) => {}
                Scan::Expired => return Ok(None),
            }
        }
    }
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.config.role)
            .field("state", &self.state)
            .field("send_seq", &self.sender.seq())
            .field("expected_seq", &self.receiver.expected())
            .finish()
    }
}
