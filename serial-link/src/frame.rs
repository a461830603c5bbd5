//! Wire-format definitions for link-layer frames.
//!
//! Every unit exchanged on the serial line is a [`Frame`].  This module is
//! responsible for:
//! - Defining the reserved bytes, peer addresses and control codes.
//! - Serialising a frame into its byte-stuffed wire form.
//! - The XOR block check characters (BCC1 over the header, BCC2 over the
//!   payload).
//!
//! Decoding is incremental and lives in [`crate::sync`], because the
//! receiver has to destuff while it scans the stream byte by byte.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! ```text
//! +------+---------+---------+---------+-------------------+---------------+------+
//! | FLAG | ADDRESS | CONTROL |  BCC1   | payload (stuffed) | BCC2 (stuffed)| FLAG |
//! +------+---------+---------+---------+-------------------+---------------+------+
//!   0x7E     1B        1B      A ^ C        0..N bytes        I-frames only  0x7E
//! ```
//!
//! Inside the payload/BCC2 region, `FLAG` and `ESCAPE` are replaced by
//! `ESCAPE, byte ^ 0x20`.

use std::fmt;

/// Frame delimiter.
pub const FLAG: u8 = 0x7E;
/// Escape byte introducing a stuffed pair.
pub const ESCAPE: u8 = 0x7D;
/// XOR mask applied to the byte following [`ESCAPE`].
pub const ESCAPE_MASK: u8 = 0x20;

/// FLAG + address + control + BCC1.
pub const HEADER_LEN: usize = 4;

/// Peer-role address codes.
///
/// Commands sent by the initiator, and the replies to them, carry
/// [`TRANSMITTER`](address::TRANSMITTER); commands sent by the responder,
/// and the replies to them, carry [`RECEIVER`](address::RECEIVER).
pub mod address {
    pub const TRANSMITTER: u8 = 0x03;
    pub const RECEIVER: u8 = 0x01;
}

/// Raw control-byte values.
pub mod codes {
    pub const SET: u8 = 0x03;
    pub const UA: u8 = 0x07;
    pub const DISC: u8 = 0x0B;
    pub const I_0: u8 = 0x00;
    pub const I_1: u8 = 0x80;
    pub const RR_0: u8 = 0x05;
    pub const RR_1: u8 = 0x85;
    pub const REJ_0: u8 = 0x01;
    pub const REJ_1: u8 = 0x81;
}

/// One-bit alternating sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Seq {
    #[default]
    Zero,
    One,
}

impl Seq {
    /// The complement: the sequence number that follows this one.
    pub fn next(self) -> Self {
        match self {
            Seq::Zero => Seq::One,
            Seq::One => Seq::Zero,
        }
    }

    pub fn bit(self) -> u8 {
        match self {
            Seq::Zero => 0,
            Seq::One => 1,
        }
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bit())
    }
}

/// Decoded control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Connection request.
    Set,
    /// Unnumbered acknowledgement.
    Ua,
    /// Disconnect request.
    Disc,
    /// Information frame carrying its send sequence number.
    Info(Seq),
    /// Receiver ready; carries the next sequence number expected.
    Rr(Seq),
    /// Reject; carries the sequence number of the rejected frame.
    Rej(Seq),
}

impl Control {
    pub fn to_byte(self) -> u8 {
        match self {
            Control::Set => codes::SET,
            Control::Ua => codes::UA,
            Control::Disc => codes::DISC,
            Control::Info(Seq::Zero) => codes::I_0,
            Control::Info(Seq::One) => codes::I_1,
            Control::Rr(Seq::Zero) => codes::RR_0,
            Control::Rr(Seq::One) => codes::RR_1,
            Control::Rej(Seq::Zero) => codes::REJ_0,
            Control::Rej(Seq::One) => codes::REJ_1,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            codes::SET => Control::Set,
            codes::UA => Control::Ua,
            codes::DISC => Control::Disc,
            codes::I_0 => Control::Info(Seq::Zero),
            codes::I_1 => Control::Info(Seq::One),
            codes::RR_0 => Control::Rr(Seq::Zero),
            codes::RR_1 => Control::Rr(Seq::One),
            codes::REJ_0 => Control::Rej(Seq::Zero),
            codes::REJ_1 => Control::Rej(Seq::One),
            _ => return None,
        })
    }

    /// `true` for frames that carry a payload and a BCC2 byte.
    pub fn is_info(self) -> bool {
        matches!(self, Control::Info(_))
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Set => write!(f, "SET"),
            Control::Ua => write!(f, "UA"),
            Control::Disc => write!(f, "DISC"),
            Control::Info(s) => write!(f, "I({s})"),
            Control::Rr(s) => write!(f, "RR({s})"),
            Control::Rej(s) => write!(f, "REJ({s})"),
        }
    }
}

/// A logical frame: header fields plus (destuffed) payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: u8,
    pub control: Control,
    /// Empty for supervisory and unnumbered frames.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a supervisory/unnumbered frame (no payload).
    pub fn command(address: u8, control: Control) -> Self {
        Self {
            address,
            control,
            payload: Vec::new(),
        }
    }

    /// Serialise into the stuffed wire form.
    pub fn encode(&self) -> Vec<u8> {
        encode(self.address, self.control, &self.payload)
    }
}

/// Header check: `address ^ control`.
#[inline]
pub fn bcc1(address: u8, control: u8) -> u8 {
    address ^ control
}

/// Payload check: XOR of every (unstuffed) payload byte.
pub fn bcc2(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, b| acc ^ b)
}

/// Append `byte` to `out`, escaping it if it collides with a reserved byte.
#[inline]
pub fn stuff_into(out: &mut Vec<u8>, byte: u8) {
    match byte {
        FLAG | ESCAPE => {
            out.push(ESCAPE);
            out.push(byte ^ ESCAPE_MASK);
        }
        _ => out.push(byte),
    }
}

/// Serialise a frame.
///
/// Information frames get their payload and trailing BCC2 stuffed; all
/// other control codes produce the fixed five-byte form and `payload` is
/// ignored.
pub fn encode(address: u8, control: Control, payload: &[u8]) -> Vec<u8> {
    let c = control.to_byte();
    let mut out = Vec::with_capacity(HEADER_LEN + 2 * payload.len() + 3);
    out.extend_from_slice(&[FLAG, address, c, bcc1(address, c)]);

    if control.is_info() {
        let mut check = 0u8;
        for &b in payload {
            stuff_into(&mut out, b);
            check ^= b;
        }
        stuff_into(&mut out, check);
    }

    out.push(FLAG);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supervisory_frame_is_five_bytes() {
        let bytes = encode(address::TRANSMITTER, Control::Set, &[]);
        assert_eq!(bytes, vec![FLAG, 0x03, 0x03, 0x00, FLAG]);
    }

    #[test]
    fn supervisory_frame_ignores_payload() {
        let bytes = encode(address::RECEIVER, Control::Ua, b"ignored");
        assert_eq!(bytes, vec![FLAG, 0x01, 0x07, 0x01 ^ 0x07, FLAG]);
    }

    #[test]
    fn info_frame_stuffs_payload_and_bcc2() {
        let bytes = encode(address::TRANSMITTER, Control::Info(Seq::Zero), &[0x01, 0x7E, 0x7D, 0x02]);
        assert_eq!(
            bytes,
            vec![FLAG, 0x03, 0x00, 0x03, 0x01, 0x7D, 0x5E, 0x7D, 0x5D, 0x02, 0x00, FLAG]
        );
    }

    #[test]
    fn bcc2_is_stuffed_when_reserved() {
        // 0x7E alone gives BCC2 == FLAG, which must be escaped too.
        let bytes = encode(address::TRANSMITTER, Control::Info(Seq::One), &[0x7E]);
        assert_eq!(
            bytes,
            vec![FLAG, 0x03, 0x80, 0x83, ESCAPE, 0x5E, ESCAPE, 0x5E, FLAG]
        );
    }

    #[test]
    fn empty_info_frame_carries_zero_bcc2() {
        let bytes = encode(address::TRANSMITTER, Control::Info(Seq::Zero), &[]);
        assert_eq!(bytes, vec![FLAG, 0x03, 0x00, 0x03, 0x00, FLAG]);
    }

    #[test]
    fn no_reserved_bytes_between_flags() {
        let payload: Vec<u8> = (0..=255).collect();
        let bytes = encode(address::TRANSMITTER, Control::Info(Seq::One), &payload);
        let inner = &bytes[1..bytes.len() - 1];
        assert!(!inner.contains(&FLAG));
        // 0x7D and 0x7E take two bytes each; BCC2 of 0..=255 is zero
        assert_eq!(bytes.len(), HEADER_LEN + 258 + 1 + 1);
    }

    #[test]
    fn control_bytes_roundtrip_and_are_distinct() {
        let all = [
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
        let mut seen = std::collections::HashSet::new();
        for c in all {
            assert!(seen.insert(c.to_byte()), "duplicate code for {c}");
            assert_eq!(Control::from_byte(c.to_byte()), Some(c));
        }
        assert_eq!(Control::from_byte(0x42), None);
    }

    #[test]
    fn seq_alternates() {
        assert_eq!(Seq::Zero.next(), Seq::One);
        assert_eq!(Seq::One.next(), Seq::Zero);
        assert_eq!(Seq::default(), Seq::Zero);
    }

    #[test]
    fn bcc2_xors_all_bytes() {
        assert_eq!(bcc2(&[]), 0);
        assert_eq!(bcc2(&[0x0F, 0xF0]), 0xFF);
        assert_eq!(bcc2(&[0xAA, 0xAA]), 0);
    }
}
