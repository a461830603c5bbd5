//! Byte-level I/O beneath the link layer.
//!
//! [`Transport`] is the only thing the protocol engine needs from the
//! outside world: write a buffer, read *one* byte with a bounded wait, and
//! close.  All framing and reliability logic lives elsewhere; this module
//! owns only byte I/O.
//!
//! [`SerialPort`] implements it on a real serial device through the
//! `serialport` crate.  The in-memory implementation used by tests lives in
//! [`crate::simulator`].

use std::io;

/// Half-duplex byte channel.
pub trait Transport {
    /// Block until one byte arrives or the inter-byte timer fires.
    ///
    /// `Ok(None)` means nothing arrived in time; it is not an error.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Write the whole buffer.
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Release the device.  Further reads and writes fail.
    fn close(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_bytes(bytes)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

pub use self::serial::SerialPort;

mod serial {
    use std::io::{self, Read, Write};
    use std::time::Duration;

    use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort as _, StopBits};

    use super::Transport;
    use crate::error::{LinkError, Result};

    /// Raw 8N1 serial device without flow control.
    pub struct SerialPort {
        path: String,
        port: Option<Box<dyn serialport::SerialPort>>,
    }

    impl std::fmt::Debug for SerialPort {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SerialPort")
                .field("path", &self.path)
                .field("open", &self.port.is_some())
                .finish()
        }
    }

    impl SerialPort {
        /// Open and configure `path`.
        ///
        /// `read_poll` becomes the inter-byte timer: a read that sees no byte
        /// within it reports silence.
        pub fn open(path: &str, baud_rate: u32, read_poll: Duration) -> Result<Self> {
            let port = serialport::new(path, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(read_poll)
                .open()
                .map_err(|e| LinkError::TransportUnavailable(format!("{path}: {e}")))?;

            // drop whatever a previous session left in the buffers
            port.clear(ClearBuffer::All)
                .map_err(|e| LinkError::TransportUnavailable(format!("{path}: {e}")))?;

            log::info!("[serial] opened {path} at {baud_rate} baud");
            Ok(Self {
                path: path.to_string(),
                port: Some(port),
            })
        }

        fn port(&mut self) -> io::Result<&mut Box<dyn serialport::SerialPort>> {
            self.port
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port closed"))
        }
    }

    impl Transport for SerialPort {
        fn read_byte(&mut self) -> io::Result<Option<u8>> {
            let mut byte = [0u8; 1];
            match self.port()?.read(&mut byte) {
                Ok(1) => Ok(Some(byte[0])),
                Ok(_) => Ok(None),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) =>
                {
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        }

        fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
            let port = self.port()?;
            port.write_all(bytes)?;
            port.flush()
        }

        fn close(&mut self) -> io::Result<()> {
            let Some(mut port) = self.port.take() else {
                return Ok(());
            };
            let flushed = port.flush();
            drop(port);
            log::info!("[serial] closed {}", self.path);
            flushed
        }
    }

    impl Drop for SerialPort {
        fn drop(&mut self) {
            let _ = self.close();
        }
    }

}
