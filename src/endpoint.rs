//! The endpoint: owns the datagram socket, the connection table, and the
//! inbound dispatch routine (§4.3 of the spec).

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use log::{debug, info, trace, warn};
use rand::Rng;

use crate::config::TransportConfig;
use crate::connection::{Connection, ReceiveState, SendState};
use crate::datagram::Datagram;
use crate::error::{Result, TransportError};
use crate::handlers::TransportHandlers;
use crate::segment::{Flags, Segment};
use crate::seqnum::SeqNum;

pub struct Endpoint<S: Datagram = UdpSocket> {
    pub(crate) socket: S,
    pub(crate) config: TransportConfig,
    pub(crate) table: HashMap<SocketAddr, Connection>,
    pub(crate) handlers: Box<dyn TransportHandlers>,
    pub(crate) pending_peers: Vec<SocketAddr>,
}

impl Endpoint<UdpSocket> {
    /// Creates the datagram socket and binds it to `local_addr`.
    pub fn bind(
        local_addr: SocketAddr,
        config: TransportConfig,
        handlers: Box<dyn TransportHandlers>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(local_addr)?;
        Ok(Endpoint { socket, config, table: HashMap::new(), handlers, pending_peers: Vec::new() })
    }
}

impl<S: Datagram> Endpoint<S> {
    /// Builds an endpoint around an already-constructed [`Datagram`], for
    /// tests that need a lossy in-memory fake instead of a real socket.
    pub fn with_socket(socket: S, config: TransportConfig, handlers: Box<dyn TransportHandlers>) -> Self {
        Endpoint { socket, config, table: HashMap::new(), handlers, pending_peers: Vec::new() }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Direct access to the underlying socket, for callers (tests, mostly)
    /// that need to put raw or deliberately-corrupt bytes on the wire
    /// instead of going through [`Segment::encode`].
    pub fn raw_socket(&self) -> &S {
        &self.socket
    }

    pub fn connection(&self, remote: SocketAddr) -> Option<&Connection> {
        self.table.get(&remote)
    }

    pub fn is_established(&self, remote: SocketAddr) -> bool {
        self.table
            .get(&remote)
            .map(|c| c.send.is_connected && c.receive.is_connected)
            .unwrap_or(false)
    }

    /// Encodes and transmits one datagram. Never blocks beyond the OS
    /// buffer; never retries.
    pub fn send_segment(&self, remote: SocketAddr, segment: &Segment) -> Result<()> {
        trace!("[Segment SEQ={}] sending flags={:?} to {remote}", segment.seq_num, segment.flags);
        self.socket.send_to(&segment.encode(), remote)?;
        Ok(())
    }

    /// Receives at most one datagram and decodes it, without running
    /// dispatch. Used directly by the broadcast-acceptor path.
    pub fn listen_base(&self, timeout: Option<Duration>) -> Result<(SocketAddr, Segment, bool)> {
        self.socket.set_read_timeout(timeout)?;
        let mut buf = vec![0u8; self.config.recv_buffer];
        let (n, addr) = match self.socket.recv_from(&mut buf) {
            Ok(v) => v,
            Err(e) if is_timeout(&e) => return Err(TransportError::Timeout),
            Err(e) => return Err(TransportError::Io(e)),
        };
        let (segment, checksum_ok) = Segment::decode(&buf[..n])?;
        Ok((addr, segment, checksum_ok))
    }

    /// Receives, decodes, dispatches, and returns the parsed segment.
    pub fn listen(&mut self, timeout: Option<Duration>) -> Result<(SocketAddr, Segment)> {
        let (addr, segment, checksum_ok) = self.listen_base(timeout)?;
        self.dispatch(addr, &segment, checksum_ok);
        Ok((addr, segment))
    }

    pub fn close(self) {
        info!("[~] endpoint closed");
    }

    /// The pure dispatch routine: §4.3 steps 1-7.
    fn dispatch(&mut self, addr: SocketAddr, segment: &Segment, checksum_ok: bool) {
        if !checksum_ok {
            warn!("[Segment SEQ={}] checksum failed, ack prev sequence number", segment.seq_num);
            let _ = self.send_segment(addr, &Segment::ack(segment.seq_num));
            return;
        }

        let flags = segment.flags;
        if flags.contains(Flags::SYN) && !flags.contains(Flags::ACK) {
            self.on_syn(addr, segment);
        } else if flags.contains(Flags::SYN) && flags.contains(Flags::ACK) {
            self.on_syn_ack(addr, segment);
        } else if flags.contains(Flags::FIN) && !flags.contains(Flags::ACK) {
            self.on_fin(addr);
        } else if flags.contains(Flags::FIN) && flags.contains(Flags::ACK) {
            self.on_fin_ack(addr);
        } else if flags.contains(Flags::ACK) {
            self.on_ack(addr, segment);
        } else {
            self.on_data(addr, segment);
        }
    }

    /// Step 2: passive open.
    fn on_syn(&mut self, addr: SocketAddr, segment: &Segment) {
        info!("[Handshake] received SYN from {addr}");
        let mut conn = Connection::new(addr, self.config.window_size);
        conn.receive.expected_seq_num = segment.seq_num.add(1);
        conn.receive.is_connected = true;
        conn.receive.state = ReceiveState::SynReceived;
        conn.send.seq_num = SeqNum::new(rand::thread_rng().gen());
        conn.send.state = SendState::SynSent;
        self.table.insert(addr, conn);

        let (seq, ack) = {
            let conn = &self.table[&addr];
            (conn.send.seq_num, conn.receive.expected_seq_num)
        };
        info!("[Handshake] sending SYN|ACK seq={seq} ack={ack} to {addr}");
        let _ = self.send_segment(addr, &Segment::syn_ack(seq, ack));

        // Bounded wait for the third-step ACK (§4.4 passive completion).
        let timeout = self.config.handshake_timeout;
        let retries = self.config.handshake_retries;
        self.wait_for(
            timeout,
            retries,
            |ep| ep.table.get(&addr).map(|c| c.send.is_connected).unwrap_or(false),
            |ep| ep.send_segment(addr, &Segment::syn_ack(seq, ack)),
        );
    }

    /// Step 3: active-open response (we receive SYN|ACK).
    fn on_syn_ack(&mut self, addr: SocketAddr, segment: &Segment) {
        info!("[Handshake] received SYN|ACK from {addr}");
        let reply_ack = segment.seq_num.add(1);
        let _ = self.send_segment(addr, &Segment::ack(reply_ack));

        if let Some(conn) = self.table.get_mut(&addr) {
            if !conn.send.is_connected && segment.ack_num == conn.send.seq_num.add(1) {
                conn.send.is_connected = true;
                conn.send.seq_num = segment.ack_num;
                conn.send.state = SendState::Established;
                conn.receive.expected_seq_num = segment.seq_num.add(1);
                conn.receive.is_connected = true;
                conn.receive.state = ReceiveState::Established;
                info!("[Handshake] connection established with {addr}");
                self.handlers.on_connect(addr);
            }
        }
    }

    /// Step 4: peer-initiated close.
    fn on_fin(&mut self, addr: SocketAddr) {
        info!("[Termination] received FIN from {addr}");
        let should_reply = match self.table.get_mut(&addr) {
            Some(conn) if conn.receive.is_connected => {
                conn.receive.is_connected = false;
                conn.receive.state = ReceiveState::FinReceived;
                true
            }
            _ => false,
        };
        if !should_reply {
            return;
        }

        let _ = self.send_segment(addr, &Segment::fin_ack());
        info!("[Termination] sent FIN|ACK to {addr}, waiting for ACK");

        let timeout = self.config.teardown_timeout;
        let retries = self.config.teardown_retries;
        self.wait_for(
            timeout,
            retries,
            |ep| !ep.table.contains_key(&addr),
            |ep| ep.send_segment(addr, &Segment::fin_ack()),
        );
    }

    /// Step 5: our FIN was ACKed via a FIN|ACK.
    fn on_fin_ack(&mut self, addr: SocketAddr) {
        let _ = self.send_segment(addr, &Segment::ack(SeqNum::ZERO));
        if let Some(conn) = self.table.get(&addr) {
            if conn.send.is_connected {
                self.table.remove(&addr);
                info!("[Termination] connection closed with {addr}");
                self.handlers.on_close(addr);
            }
        }
    }

    /// Step 6: ACK-only segment.
    fn on_ack(&mut self, addr: SocketAddr, segment: &Segment) {
        debug!("[Handshake] received ACK num={} from {addr}", segment.ack_num);
        let Some(conn) = self.table.get_mut(&addr) else { return };

        if !conn.receive.is_connected {
            conn.send.is_connected = false;
            conn.send.state = SendState::Closed;
            self.table.remove(&addr);
            info!("[Termination] connection closed with {addr}");
            self.handlers.on_close(addr);
            return;
        }

        if !conn.send.is_connected {
            if segment.ack_num == conn.send.seq_num.add(1) {
                conn.send.is_connected = true;
                conn.send.seq_num = segment.ack_num;
                conn.send.state = SendState::Established;
                info!("[Handshake] connection established with {addr}");
                self.handlers.on_connect(addr);
            }
            return;
        }

        if conn.send.is_valid_ack(segment.ack_num) {
            conn.send.seq_num = segment.ack_num;
        }
    }

    /// Step 7: data segment.
    fn on_data(&mut self, addr: SocketAddr, segment: &Segment) {
        let Some(conn) = self.table.get_mut(&addr) else { return };
        if !conn.receive.is_connected {
            return;
        }

        if segment.seq_num == conn.receive.expected_seq_num {
            conn.receive.expected_seq_num = conn.receive.expected_seq_num.add(1);
            let ack = conn.receive.expected_seq_num;
            debug!("[Segment SEQ={}] delivered, ack sent", segment.seq_num);
            let _ = self.send_segment(addr, &Segment::ack(ack));
            self.handlers.on_payload(addr, &segment.payload);
        } else {
            let ack = conn.receive.expected_seq_num;
            debug!(
                "[Segment SEQ={}] out of order (expected {}), cumulative dup ack",
                segment.seq_num, ack
            );
            let _ = self.send_segment(addr, &Segment::ack(ack));
        }
    }

    /// Shared retry-loop shape used by the passive-open wait, the FIN wait,
    /// `handshake`, and `end_connection`: listen up to `retries` times,
    /// resending on each timeout until `done` reports success.
    pub(crate) fn wait_for(
        &mut self,
        timeout: Duration,
        retries: u32,
        done: impl Fn(&Self) -> bool,
        mut resend: impl FnMut(&mut Self) -> Result<()>,
    ) -> bool {
        for attempt in 0..retries.max(1) {
            match self.listen(Some(timeout)) {
                Ok(_) => {
                    if done(self) {
                        return true;
                    }
                }
                Err(TransportError::Timeout) => {
                    if done(self) {
                        return true;
                    }
                    if attempt + 1 < retries {
                        let _ = resend(self);
                    }
                }
                Err(_) => {
                    // Malformed segment: already logged by `listen_base`'s
                    // caller; keep waiting within the same budget.
                }
            }
        }
        done(self)
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
}
