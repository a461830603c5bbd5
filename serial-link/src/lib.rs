//! `serial-link`: a reliable point-to-point data link over a serial line.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  I(0)/I(1)   ┌──────────┐
//!  │  Sender  │─────────────▶│ Receiver │
//!  └────┬─────┘              └─────┬────┘
//!       │                          │
//!       │       RR / REJ           │
//!       │◀─────────────────────────┘
//!       │
//!  ┌────▼──────────────────────────────┐
//!  │           Connection              │
//!  │  (handshakes, ARQ loop, stats)    │
//!  └────┬───────────────────▲──────────┘
//!       │ frame::encode     │ sync::FrameSync
//!  ┌────▼───────────────────┴──────────┐
//!  │            Transport              │  (serial port or
//!  └───────────────────────────────────┘   in-memory simulator)
//! ```
//!
//! Each module has a single responsibility:
//! - [`frame`]      : wire format, BCC checks and byte stuffing
//! - [`sync`]       : receive-side frame synchronisation state machine
//! - [`connection`] : session lifecycle: open / send / receive / close
//! - [`sender`]     : stop-and-wait outbound sequence state
//! - [`receiver`]   : stop-and-wait inbound sequence state
//! - [`state`]      : link states, roles and addresses
//! - [`timer`]      : retransmission deadline and attempt budget
//! - [`config`]     : session parameters and their defaults
//! - [`transport`]  : byte I/O trait and the serial port
//! - [`simulator`]  : lossy in-memory line for testing
//! - [`stats`]      : transfer counters
//! - [`application`]: file transfer packets on top of the link
//! - [`error`]      : crate-wide error type

pub mod application;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod receiver;
pub mod sender;
pub mod simulator;
pub mod state;
pub mod stats;
pub mod sync;
pub mod timer;
pub mod transport;

pub use config::LinkConfig;
pub use connection::Connection;
pub use error::{LinkError, Result};
pub use state::{LinkState, Role};
pub use transport::Transport;
