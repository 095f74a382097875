//! Active-open handshake and teardown initiation (§4.4). Passive-side
//! waits live in [`crate::endpoint`] next to the dispatch steps they
//! complete.

use std::net::{SocketAddr, UdpSocket};

use log::info;
use rand::Rng;

use crate::connection::{Connection, SendState};
use crate::datagram::Datagram;
use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::segment::Segment;
use crate::seqnum::SeqNum;

impl<S: Datagram> Endpoint<S> {
    /// Active open: send SYN, retry on timeout up to `config.handshake_retries`
    /// attempts, fail with `HandshakeError` on exhaustion.
    pub fn handshake(&mut self, remote: SocketAddr) -> Result<()> {
        let seq = SeqNum::new(rand::thread_rng().gen());
        let mut conn = Connection::new(remote, self.config.window_size);
        conn.send.seq_num = seq;
        conn.send.state = SendState::SynSent;
        self.table.insert(remote, conn);

        info!("[Handshake] sending SYN to {remote}");
        self.send_segment(remote, &Segment::syn(seq))?;

        let timeout = self.config.handshake_timeout;
        let retries = self.config.handshake_retries;
        let connected = self.wait_for(
            timeout,
            retries,
            |ep| ep.table.get(&remote).map(|c| c.send.is_connected).unwrap_or(false),
            |ep| {
                info!("[Handshake] timeout, resending SYN to {remote}");
                ep.send_segment(remote, &Segment::syn(seq))
            },
        );

        if connected {
            Ok(())
        } else {
            self.table.remove(&remote);
            Err(TransportError::HandshakeError)
        }
    }

    /// Graceful close. A no-op if there is no connection record (idempotent,
    /// property 6).
    pub fn end_connection(&mut self, remote: SocketAddr) -> Result<()> {
        if !self.table.contains_key(&remote) {
            return Ok(());
        }

        self.send_segment(remote, &Segment::fin())?;
        info!("[Termination] sending FIN to {remote}");

        let timeout = self.config.teardown_timeout;
        let retries = self.config.teardown_retries;
        let closed = self.wait_for(
            timeout,
            retries,
            |ep| !ep.table.contains_key(&remote),
            |ep| {
                info!("[Termination] timeout, resending FIN to {remote}");
                ep.send_segment(remote, &Segment::fin())
            },
        );

        if closed {
            Ok(())
        } else {
            Err(TransportError::Timeout)
        }
    }
}

/// Convenience re-export so binaries constructing a plain UDP-backed
/// endpoint don't need to name `Endpoint<UdpSocket>` explicitly.
pub type UdpEndpoint = Endpoint<UdpSocket>;
