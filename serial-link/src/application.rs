//! File transfer on top of the link.
//!
//! A transfer is a START control packet, the file as a run of DATA packets,
//! and an END control packet that repeats START's parameters.  Each packet
//! travels as one information frame.
//!
//! ```text
//!  control  [ C | T₁ | L₁ | V₁ … | T₂ | L₂ | V₂ … ]     C = 1 (START) / 3 (END)
//!  data     [ 2 | N | L₂ | L₁ | bytes … ]              N = sequence mod 256
//! ```
//!
//! Control packets carry TLVs: `FILE_SIZE` (big-endian, shortest encoding)
//! and `FILE_NAME` (UTF-8).

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::connection::Connection;
use crate::error::{LinkError, Result};
use crate::transport::Transport;

pub mod kind {
    pub const START: u8 = 1;
    pub const DATA: u8 = 2;
    pub const END: u8 = 3;
}

pub mod tlv {
    pub const FILE_SIZE: u8 = 0;
    pub const FILE_NAME: u8 = 1;
}

/// Bytes in a DATA packet ahead of the file bytes.
pub const DATA_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Start { size: u64, name: String },
    Data { seq: u8, bytes: Vec<u8> },
    End { size: u64, name: String },
}

impl Packet {
    /// Serialise the packet.  Fails when a length does not fit its field:
    /// 65535 bytes of DATA, or a 255-byte file name.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Packet::Start { size, name } => encode_control(kind::START, *size, name),
            Packet::End { size, name } => encode_control(kind::END, *size, name),
            Packet::Data { seq, bytes } => {
                let len = u16::try_from(bytes.len())
                    .map_err(|_| malformed(format!("{} data bytes do not fit one packet", bytes.len())))?;
                let mut out = Vec::with_capacity(DATA_HEADER_LEN + bytes.len());
                out.push(kind::DATA);
                out.push(*seq);
                out.extend_from_slice(&len.to_be_bytes());
                out.extend_from_slice(bytes);
                Ok(out)
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&tag, body) = bytes
            .split_first()
            .ok_or_else(|| malformed("empty packet"))?;

        match tag {
            kind::DATA => {
                if body.len() < DATA_HEADER_LEN - 1 {
                    return Err(malformed("truncated data header"));
                }
                let len = u16::from_be_bytes([body[1], body[2]]) as usize;
                let data = &body[3..];
                if data.len() != len {
                    return Err(malformed(format!(
                        "data length field says {len}, packet carries {}",
                        data.len()
                    )));
                }
                Ok(Packet::Data {
                    seq: body[0],
                    bytes: data.to_vec(),
                })
            }
            kind::START | kind::END => {
                let (size, name) = decode_tlvs(body)?;
                Ok(if tag == kind::START {
                    Packet::Start { size, name }
                } else {
                    Packet::End { size, name }
                })
            }
            other => Err(malformed(format!("unknown packet type {other}"))),
        }
    }
}

fn malformed(msg: impl Into<String>) -> LinkError {
    LinkError::MalformedPacket(msg.into())
}

fn encode_control(kind: u8, size: u64, name: &str) -> Result<Vec<u8>> {
    let name_len = u8::try_from(name.len())
        .map_err(|_| malformed(format!("file name of {} bytes does not fit a TLV", name.len())))?;
    let size_bytes = size.to_be_bytes();
    let skip = size_bytes.iter().take(7).take_while(|&&b| b == 0).count();
    let size_bytes = &size_bytes[skip..];

    let mut out = Vec::with_capacity(5 + size_bytes.len() + name.len());
    out.push(kind);
    out.push(tlv::FILE_SIZE);
    // at most 8
    out.push(size_bytes.len() as u8);
    out.extend_from_slice(size_bytes);
    out.push(tlv::FILE_NAME);
    out.push(name_len);
    out.extend_from_slice(name.as_bytes());
    Ok(out)
}

fn decode_tlvs(mut body: &[u8]) -> Result<(u64, String)> {
    let mut size = None;
    let mut name = None;

    while !body.is_empty() {
        let [t, l, rest @ ..] = body else {
            return Err(malformed("truncated TLV header"));
        };
        let l = *l as usize;
        if rest.len() < l {
            return Err(malformed(format!("TLV {t} claims {l} bytes, {} left", rest.len())));
        }
        let (value, tail) = rest.split_at(l);
        match *t {
            tlv::FILE_SIZE => {
                if value.is_empty() || value.len() > 8 {
                    return Err(malformed(format!("file size of {l} bytes")));
                }
                size = Some(value.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)));
            }
            tlv::FILE_NAME => {
                let s = std::str::from_utf8(value).map_err(|_| malformed("file name is not UTF-8"))?;
                name = Some(s.to_string());
            }
            other => log::debug!("[app] skipping unknown TLV {other}"),
        }
        body = tail;
    }

    match (size, name) {
        (Some(size), Some(name)) => Ok((size, name)),
        (None, _) => Err(malformed("control packet without file size")),
        (_, None) => Err(malformed("control packet without file name")),
    }
}

/// Send the file at `path`: START, DATA…, END.  Returns the file bytes sent.
pub fn send_file<T: Transport>(conn: &mut Connection<T>, path: &Path) -> Result<u64> {
    let chunk_len = conn.config().max_payload.saturating_sub(DATA_HEADER_LEN);
    if chunk_len == 0 {
        return Err(LinkError::InvalidConfig(format!(
            "max_payload must exceed {DATA_HEADER_LEN} to carry file data"
        )));
    }

    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let start = Packet::Start { size, name: name.clone() }.encode()?;

    log::info!("[app] sending {name} ({size} bytes)");
    conn.send(&start)?;

    let mut buf = vec![0u8; chunk_len];
    let mut seq: u8 = 0;
    let mut sent: u64 = 0;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        let packet = Packet::Data {
            seq,
            bytes: buf[..n].to_vec(),
        };
        conn.send(&packet.encode()?)?;
        sent += n as u64;
        seq = seq.wrapping_add(1);
        log::debug!("[app] {sent}/{size} bytes");
    }

    conn.send(&Packet::End { size, name }.encode()?)?;
    log::info!("[app] sent {sent} bytes");
    Ok(sent)
}

/// Receive one file into `out`.  Returns the bytes written.
pub fn receive_file<T: Transport>(conn: &mut Connection<T>, out: &Path) -> Result<u64> {
    let (size, name) = match Packet::decode(&conn.receive()?)? {
        Packet::Start { size, name } => (size, name),
        other => return Err(malformed(format!("expected START, got {other:?}"))),
    };
    log::info!("[app] receiving {name} ({size} bytes) into {}", out.display());

    let mut writer = BufWriter::new(File::create(out)?);
    let mut expected: u8 = 0;
    let mut written: u64 = 0;

    loop {
        match Packet::decode(&conn.receive()?)? {
            Packet::Data { seq, bytes } => {
                if seq != expected {
                    return Err(malformed(format!("data packet {seq} out of order, expected {expected}")));
                }
                writer.write_all(&bytes)?;
                written += bytes.len() as u64;
                expected = expected.wrapping_add(1);
            }
            Packet::End { size: end_size, .. } => {
                writer.flush()?;
                if end_size != size || written != size {
                    return Err(malformed(format!(
                        "announced {size} bytes, END says {end_size}, received {written}"
                    )));
                }
                log::info!("[app] received {written} bytes");
                return Ok(written);
            }
            Packet::Start { .. } => return Err(malformed("START inside a transfer")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_packet_layout() {
        let bytes = Packet::Data {
            seq: 7,
            bytes: vec![0xAA; 300],
        }
        .encode()
        .unwrap();
        assert_eq!(&bytes[..4], &[kind::DATA, 7, 0x01, 0x2C]);
        assert_eq!(bytes.len(), 304);
    }

    #[test]
    fn file_size_uses_shortest_encoding() {
        let bytes = Packet::Start {
            size: 10_968,
            name: "penguin.gif".into(),
        }
        .encode()
        .unwrap();
        assert_eq!(&bytes[..5], &[kind::START, tlv::FILE_SIZE, 2, 0x2A, 0xD8]);
        assert_eq!(&bytes[5..7], &[tlv::FILE_NAME, 11]);
        assert_eq!(&bytes[7..], b"penguin.gif");
    }

    #[test]
    fn empty_file_still_has_one_size_byte() {
        let bytes = Packet::End {
            size: 0,
            name: String::new(),
        }
        .encode()
        .unwrap();
        assert_eq!(bytes, vec![kind::END, tlv::FILE_SIZE, 1, 0, tlv::FILE_NAME, 0]);
        assert_eq!(
            Packet::decode(&bytes).unwrap(),
            Packet::End {
                size: 0,
                name: String::new()
            }
        );
    }

    #[test]
    fn decodes_control_packet_with_large_size() {
        let packet = Packet::Start {
            size: u64::MAX - 1,
            name: "big.bin".into(),
        };
        assert_eq!(Packet::decode(&packet.encode().unwrap()).unwrap(), packet);
    }

    #[test]
    fn unknown_tlv_is_skipped() {
        let bytes = [kind::START, 9, 2, 0xFF, 0xFF, tlv::FILE_SIZE, 1, 5, tlv::FILE_NAME, 1, b'a'];
        assert_eq!(
            Packet::decode(&bytes).unwrap(),
            Packet::Start {
                size: 5,
                name: "a".into()
            }
        );
    }

    #[test]
    fn rejects_malformed_packets() {
        let cases: [&[u8]; 6] = [
            &[],
            &[9, 0],
            &[kind::DATA, 0, 0],
            &[kind::DATA, 0, 0, 3, 1, 2],
            &[kind::START, tlv::FILE_SIZE, 4, 0],
            &[kind::END, tlv::FILE_NAME, 1, b'x'],
        ];
        for bytes in cases {
            assert!(
                matches!(Packet::decode(bytes), Err(LinkError::MalformedPacket(_))),
                "{bytes:?}"
            );
        }
    }

    #[test]
    fn lengths_that_overflow_their_fields_are_refused() {
        let data = Packet::Data {
            seq: 0,
            bytes: vec![0; u16::MAX as usize + 1],
        };
        assert!(matches!(data.encode(), Err(LinkError::MalformedPacket(_))));

        let start = Packet::Start {
            size: 1,
            name: "n".repeat(256),
        };
        assert!(matches!(start.encode(), Err(LinkError::MalformedPacket(_))));

        // the largest lengths still fit
        let data = Packet::Data {
            seq: 0,
            bytes: vec![0; u16::MAX as usize],
        };
        assert_eq!(data.encode().unwrap().len(), DATA_HEADER_LEN + u16::MAX as usize);
        let end = Packet::End {
            size: 1,
            name: "n".repeat(255),
        };
        assert_eq!(Packet::decode(&end.encode().unwrap()).unwrap(), end);
    }
}
