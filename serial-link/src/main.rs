//! Entry point for `serial-link`.
//!
//! Parses CLI arguments and runs one file transfer in either **tx** or
//! **rx** role.  All protocol work is delegated to library modules;
//! `main.rs` owns only process setup (logging, argument parsing).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use serial_link::application::{receive_file, send_file};
use serial_link::config::{DEFAULT_BAUD_RATE, DEFAULT_MAX_RETRIES};
use serial_link::{Connection, LinkConfig, Role};

/// Reliable file transfer over a serial line.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Serial device, e.g. /dev/ttyS0.
    port: String,

    /// `tx` sends the file, `rx` receives it.
    role: Role,

    /// File to send (tx) or to write (rx).
    file: PathBuf,

    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Transmissions of one frame before giving up.
    #[arg(short, long, default_value_t = DEFAULT_MAX_RETRIES)]
    retries: u32,

    /// Seconds to wait for a reply before retransmitting.
    #[arg(short, long, default_value_t = 3)]
    timeout: u64,

    /// Log transfer statistics on close.
    #[arg(long)]
    stats: bool,
}

fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    let config = LinkConfig {
        baud_rate: cli.baud,
        max_retries: cli.retries,
        timeout: Duration::from_secs(cli.timeout),
        ..LinkConfig::new(cli.port.clone(), cli.role)
    };

    log::info!("Starting {} on {} at {} baud", cli.role, cli.port, cli.baud);
    let mut conn = Connection::open(config).context("failed to open link")?;

    let transfer = match cli.role {
        Role::Initiator => send_file(&mut conn, &cli.file),
        Role::Responder => receive_file(&mut conn, &cli.file),
    };
    let closed = conn.close(cli.stats);

    let bytes = transfer.with_context(|| format!("transfer of {} failed", cli.file.display()))?;
    closed.context("failed to close link")?;
    log::info!("Done: {bytes} bytes");
    Ok(())
}
