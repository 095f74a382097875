//! Shared test fixtures: an in-memory lossy "socket" that lets integration
//! tests inject a single packet drop deterministically, plus a handler that
//! records everything it's told.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use gbn::TransportHandlers;

type Hub = Arc<Mutex<HashMap<SocketAddr, VecDeque<(SocketAddr, Vec<u8>)>>>>;

#[derive(Default)]
struct DropOnce {
    target_seq: Option<u32>,
    dropped: bool,
}

#[derive(Clone)]
pub struct FakeNetwork {
    hub: Hub,
}

impl FakeNetwork {
    pub fn new() -> Self {
        FakeNetwork { hub: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn socket(&self, local_addr: SocketAddr) -> FakeSocket {
        self.hub.lock().unwrap().entry(local_addr).or_default();
        FakeSocket {
            local_addr,
            hub: self.hub.clone(),
            timeout: Mutex::new(None),
            drop_once: Arc::new(Mutex::new(DropOnce::default())),
        }
    }
}

/// An in-memory stand-in for [`gbn::datagram::Datagram`]. `recv_from` busy-polls
/// a per-address queue until data arrives or the configured timeout elapses.
pub struct FakeSocket {
    local_addr: SocketAddr,
    hub: Hub,
    timeout: Mutex<Option<Duration>>,
    drop_once: Arc<Mutex<DropOnce>>,
}

impl FakeSocket {
    /// Arranges for the first pure-data segment with sequence number
    /// `seq` to be silently dropped, simulating one lost packet.
    pub fn drop_once_seq(&self, seq: u32) {
        *self.drop_once.lock().unwrap() = DropOnce { target_seq: Some(seq), dropped: false };
    }
}

impl gbn::datagram::Datagram for FakeSocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        let flags = buf.get(8).copied().unwrap_or(0);
        let seq = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let mut plan = self.drop_once.lock().unwrap();
        if flags == 0 && plan.target_seq == Some(seq) && !plan.dropped {
            plan.dropped = true;
            return Ok(buf.len());
        }
        drop(plan);

        self.hub
            .lock()
            .unwrap()
            .entry(addr)
            .or_default()
            .push_back((self.local_addr, buf.to_vec()));
        Ok(buf.len())
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let timeout = *self.timeout.lock().unwrap();
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(front) = self.hub.lock().unwrap().get_mut(&self.local_addr).and_then(|q| q.pop_front()) {
                let (src, data) = front;
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                return Ok((n, src));
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(io::Error::new(io::ErrorKind::WouldBlock, "fake socket timed out"));
                }
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        *self.timeout.lock().unwrap() = timeout;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordedState {
    pub payloads: Vec<Vec<u8>>,
    pub connects: u32,
    pub closes: u32,
}

#[derive(Clone)]
pub struct RecordingHandlers {
    pub state: Arc<Mutex<RecordedState>>,
}

impl RecordingHandlers {
    pub fn new() -> Self {
        RecordingHandlers { state: Arc::new(Mutex::new(RecordedState::default())) }
    }
}

impl TransportHandlers for RecordingHandlers {
    fn on_payload(&mut self, _peer: SocketAddr, payload: &[u8]) {
        self.state.lock().unwrap().payloads.push(payload.to_vec());
    }

    fn on_connect(&mut self, _peer: SocketAddr) {
        self.state.lock().unwrap().connects += 1;
    }

    fn on_close(&mut self, _peer: SocketAddr) {
        self.state.lock().unwrap().closes += 1;
    }
}
