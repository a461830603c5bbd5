//! End-to-end file transfer between two connections on an in-memory line.

mod common;

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use common::{config, payload, RawPeer};
use serial_link::application::{receive_file, send_file, Packet};
use serial_link::frame::{address, Control, Seq};
use serial_link::simulator::{self, MemoryTransport, SimulatorConfig};
use serial_link::{Connection, LinkConfig, LinkError, LinkState, Role};

/// Fresh scratch directory under the system temp dir.
fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("serial-link-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

/// Run one transfer of `contents` and return what the receiver wrote.
fn transfer(name: &str, contents: &[u8], line: SimulatorConfig, link: LinkConfig) -> Vec<u8> {
    let dir = scratch(name);
    let src = dir.join("source.bin");
    let dst = dir.join("copy.bin");
    fs::write(&src, contents).expect("write source");

    let (a, b) = simulator::pair(line);
    let responder_cfg = LinkConfig {
        role: Role::Responder,
        ..link.clone()
    };
    let out = dst.clone();
    let responder = thread::spawn(move || {
        let mut conn = Connection::open_with(b, responder_cfg).expect("responder open");
        let written = receive_file(&mut conn, &out).expect("receive file");
        let _ = conn.close(false);
        written
    });

    let mut conn = Connection::open_with(a, link).expect("initiator open");
    let sent = send_file(&mut conn, &src).expect("send file");
    let _ = conn.close(true);
    assert_eq!(conn.state(), LinkState::Closed);

    let written = responder.join().expect("responder panicked");
    assert_eq!(sent, contents.len() as u64);
    assert_eq!(written, sent);

    let copy = fs::read(&dst).expect("read copy");
    let _ = fs::remove_dir_all(&dir);
    copy
}

#[test]
fn clean_line_transfer() {
    let contents = payload(10_968, 3);
    let copy = transfer("clean", &contents, SimulatorConfig::default(), config(Role::Initiator));
    assert_eq!(copy, contents);
}

/// More than 256 DATA packets, so the 8-bit packet number wraps.
#[test]
fn packet_number_wraps() {
    let contents = payload(28 * 300 + 5, 9);
    let link = LinkConfig {
        max_payload: 32,
        ..config(Role::Initiator)
    };
    let copy = transfer("wrap", &contents, SimulatorConfig::default(), link);
    assert_eq!(copy, contents);
}

#[test]
fn empty_file_transfer() {
    let copy = transfer("empty", &[], SimulatorConfig::default(), config(Role::Initiator));
    assert!(copy.is_empty());
}

#[test]
fn lossy_line_transfer() {
    let contents = payload(4_000, 5);
    let link = LinkConfig {
        max_retries: 12,
        timeout: Duration::from_millis(60),
        max_payload: 256,
        ..config(Role::Initiator)
    };
    let copy = transfer("lossy", &contents, SimulatorConfig::lossy(0.1, 0.05, 1234), link);
    assert_eq!(copy, contents);
}

/// Drive `receive_file` with hand-made packets from a raw initiator.
fn responder_with_packets(packets: &[Vec<u8>]) -> (Connection<MemoryTransport>, RawPeer) {
    let (conn, mut peer) = common::responder_against_raw(config(Role::Responder));
    let mut seq = Seq::Zero;
    for p in packets {
        peer.write(address::TRANSMITTER, Control::Info(seq), p);
        seq = seq.next();
    }
    (conn, peer)
}

#[test]
fn out_of_order_data_packet_is_malformed() {
    let dir = scratch("order");
    let packets = vec![
        Packet::Start { size: 2, name: "f".into() }.encode().unwrap(),
        Packet::Data { seq: 1, bytes: vec![1, 2] }.encode().unwrap(),
    ];
    let (mut conn, _peer) = responder_with_packets(&packets);

    let err = receive_file(&mut conn, &dir.join("out")).unwrap_err();
    assert!(matches!(err, LinkError::MalformedPacket(_)), "{err}");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn size_mismatch_is_malformed() {
    let dir = scratch("size");
    let packets = vec![
        Packet::Start { size: 5, name: "f".into() }.encode().unwrap(),
        Packet::Data { seq: 0, bytes: vec![1, 2] }.encode().unwrap(),
        Packet::End { size: 5, name: "f".into() }.encode().unwrap(),
    ];
    let (mut conn, _peer) = responder_with_packets(&packets);

    let err = receive_file(&mut conn, &dir.join("out")).unwrap_err();
    assert!(matches!(err, LinkError::MalformedPacket(_)), "{err}");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn transfer_must_begin_with_start() {
    let dir = scratch("start");
    let packets = vec![Packet::Data { seq: 0, bytes: vec![1] }.encode().unwrap()];
    let (mut conn, _peer) = responder_with_packets(&packets);

    let err = receive_file(&mut conn, &dir.join("out")).unwrap_err();
    assert!(matches!(err, LinkError::MalformedPacket(_)), "{err}");
    let _ = fs::remove_dir_all(&dir);
}
