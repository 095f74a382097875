//! S2 (single-segment transfer), S3 (windowed transfer with loss), S5
//! (metadata prelude).

mod support;

use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::Duration;

use gbn::{Endpoint, Metadata, NullHandlers, Segment, TransportConfig};
use support::{FakeNetwork, RecordingHandlers};

fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}

#[test]
fn s2_single_segment_transfer_advances_cumulative_ack() {
    let a_addr = addr(19101);
    let b_addr = addr(19102);

    let handlers_b = RecordingHandlers::new();
    let state_b = handlers_b.state.clone();
    let mut ep_a: Endpoint<UdpSocket> =
        Endpoint::bind(a_addr, TransportConfig::default(), Box::new(NullHandlers)).unwrap();
    let mut ep_b: Endpoint<UdpSocket> =
        Endpoint::bind(b_addr, TransportConfig::default(), Box::new(handlers_b)).unwrap();

    let b_thread = thread::spawn(move || {
        ep_b.listen(Some(Duration::from_secs(5))).unwrap(); // handshake
        ep_b
    });
    ep_a.handshake(b_addr).unwrap();
    let mut ep_b = b_thread.join().unwrap();

    let pre_seq = ep_a.connection(b_addr).unwrap().send.seq_num;

    let b_thread = thread::spawn(move || {
        ep_b.listen(Some(Duration::from_secs(5))).unwrap(); // data segment -> ack
        ep_b
    });
    ep_a.send_segment(b_addr, &Segment::data(pre_seq, b"hello".to_vec())).unwrap();
    let ep_b = b_thread.join().unwrap();

    ep_a.listen(Some(Duration::from_secs(5))).unwrap(); // collect the ack

    assert_eq!(state_b.lock().unwrap().payloads, vec![b"hello".to_vec()]);
    assert_eq!(ep_a.connection(b_addr).unwrap().send.seq_num, pre_seq.add(1));
    let _ = ep_b;
}

#[test]
fn s3_windowed_transfer_survives_one_dropped_segment() {
    let a_addr = addr(19111);
    let b_addr = addr(19112);
    let net = FakeNetwork::new();

    let handlers_b = RecordingHandlers::new();
    let state_b = handlers_b.state.clone();
    let mut ep_a = Endpoint::with_socket(net.socket(a_addr), TransportConfig::default(), Box::new(NullHandlers));
    let mut ep_b = Endpoint::with_socket(net.socket(b_addr), TransportConfig::default(), Box::new(handlers_b));

    let b_thread = thread::spawn(move || {
        ep_b.listen(Some(Duration::from_secs(5))).unwrap(); // handshake
        ep_b
    });
    ep_a.handshake(b_addr).unwrap();
    let mut ep_b = b_thread.join().unwrap();

    // Drop the third segment overall: metadata (frame 0), content frame 1,
    // content frame 2 -- i.e. seq_base + 2.
    let seq_base = ep_a.connection(b_addr).unwrap().send.seq_num;
    ep_a.raw_socket().drop_once_seq(seq_base.add(2).0);

    let content: Vec<u8> = (0..180_000u32).map(|i| (i % 251) as u8).collect();
    let metadata = Metadata { filename: "report".into(), extension: "bin".into() };

    let b_thread = thread::spawn(move || {
        for _ in 0..40 {
            if ep_b.listen(Some(Duration::from_secs(5))).is_err() {
                continue;
            }
            if state_b.lock().unwrap().closes >= 1 {
                break;
            }
        }
        (ep_b, state_b)
    });

    ep_a.transfer(b_addr, &metadata, &content).expect("transfer should complete despite one loss");

    let (_ep_b, state_b) = b_thread.join().unwrap();
    let state_b = state_b.lock().unwrap();

    assert_eq!(state_b.payloads.len(), 7, "1 metadata + 6 content frames");
    let received: Vec<u8> = state_b.payloads[1..].concat();
    assert_eq!(received, content, "reassembled content must match byte-for-byte, in order");
    assert_eq!(state_b.closes, 1);
}

#[test]
fn s5_metadata_prelude_is_delivered_first_and_separately() {
    let a_addr = addr(19121);
    let b_addr = addr(19122);

    let handlers_b = RecordingHandlers::new();
    let state_b = handlers_b.state.clone();
    let mut ep_a: Endpoint<UdpSocket> =
        Endpoint::bind(a_addr, TransportConfig::default(), Box::new(NullHandlers)).unwrap();
    let mut ep_b: Endpoint<UdpSocket> =
        Endpoint::bind(b_addr, TransportConfig::default(), Box::new(handlers_b)).unwrap();

    let b_thread = thread::spawn(move || {
        ep_b.listen(Some(Duration::from_secs(5))).unwrap(); // handshake
        ep_b
    });
    ep_a.handshake(b_addr).unwrap();
    let mut ep_b = b_thread.join().unwrap();

    let metadata = Metadata { filename: "/tmp/report".into(), extension: "pdf".into() };
    let payload = b"%PDF-1.4 fake contents".to_vec();

    let b_thread = thread::spawn(move || {
        for _ in 0..10 {
            if ep_b.listen(Some(Duration::from_secs(5))).is_err() {
                continue;
            }
            if state_b.lock().unwrap().closes >= 1 {
                break;
            }
        }
        (ep_b, state_b)
    });

    ep_a.transfer(b_addr, &metadata, &payload).unwrap();

    let (_ep_b, state_b) = b_thread.join().unwrap();
    let state_b = state_b.lock().unwrap();

    assert_eq!(state_b.payloads.len(), 2);
    let decoded_meta: Metadata = serde_json::from_slice(&state_b.payloads[0]).unwrap();
    assert_eq!(decoded_meta, metadata);
    assert_eq!(state_b.payloads[1], payload);
}
