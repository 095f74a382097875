//! Sliding-window Go-Back-N bulk transfer (§4.5) and the broadcast
//! receive-request acceptor.

use std::net::SocketAddr;
use std::time::Duration;

use log::{info, warn};

use crate::datagram::Datagram;
use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::segment::{Flags, Metadata, Segment, MAX_PAYLOAD};

impl<S: Datagram> Endpoint<S> {
    /// Acceptor mode: records the source of each inbound SYN (that is not
    /// already pending) without responding. The later `handshake` call
    /// completes the three-way exchange. Returns `Ok(None)` for any segment
    /// that is not a fresh SYN, `Err(Timeout)` if nothing arrived.
    pub fn listen_broadcast(&mut self, timeout: Option<Duration>) -> Result<Option<SocketAddr>> {
        let (addr, segment, checksum_ok) = self.listen_base(timeout)?;
        if !checksum_ok || !segment.flags.contains(Flags::SYN) || segment.flags.contains(Flags::ACK) {
            return Ok(None);
        }
        if self.pending_peers.contains(&addr) {
            return Ok(None);
        }
        info!("[!] received broadcast request from {addr}");
        self.pending_peers.push(addr);
        Ok(Some(addr))
    }

    pub fn pending_peers(&self) -> &[SocketAddr] {
        &self.pending_peers
    }

    pub fn take_pending_peers(&mut self) -> Vec<SocketAddr> {
        std::mem::take(&mut self.pending_peers)
    }

    /// Ships `payload` to an already-handshaken `remote`, preceded by a
    /// JSON metadata prelude, using a fixed-size sliding window with
    /// Go-Back-N retransmission. Ends the connection once every frame is
    /// acknowledged.
    ///
    /// Frames -- including the metadata prelude -- are numbered one
    /// sequence number per frame (not per byte), matching the receiver's
    /// cumulative-ack-by-one bookkeeping in [`Endpoint::listen`]'s dispatch.
    pub fn transfer(&mut self, remote: SocketAddr, metadata: &Metadata, payload: &[u8]) -> Result<()> {
        let max_payload = self.config.max_payload.min(MAX_PAYLOAD);
        let content_frames = if payload.is_empty() {
            0
        } else {
            (payload.len() + max_payload - 1) / max_payload
        };
        let total_frames = 1 + content_frames as u32;

        let seq_base0 = self
            .table
            .get(&remote)
            .map(|c| c.send.seq_num)
            .ok_or_else(|| TransportError::HandshakeError)?;

        let meta_segment = Segment::metadata(seq_base0, metadata);
        let meta_bytes = meta_segment.payload;

        let frame_bytes = |idx: u32| -> Vec<u8> {
            if idx == 0 {
                meta_bytes.clone()
            } else {
                let start = (idx as usize - 1) * max_payload;
                let end = (start + max_payload).min(payload.len());
                payload[start..end].to_vec()
            }
        };

        let window = u32::from(self.config.window_size);
        let mut sent_segments: u32 = 0;

        while sent_segments < total_frames {
            let remaining = total_frames - sent_segments;
            let to_send = remaining.min(window);

            let seq_base = self
                .table
                .get(&remote)
                .map(|c| c.send.seq_num)
                .unwrap_or_else(|| seq_base0.add(sent_segments));

            for i in 0..to_send {
                let frame_idx = sent_segments + i;
                let seq = seq_base.add(i);
                let bytes = frame_bytes(frame_idx);
                info!("[Segment SEQ={seq}] sending frame {frame_idx}/{total_frames} to {remote}");
                self.send_segment(remote, &Segment::data(seq, bytes))?;
            }

            let start_seq = seq_base;
            let start_sent = sent_segments;
            let mut acked_in_window = 0u32;
            for _ in 0..to_send {
                match self.listen(Some(self.config.ack_timeout)) {
                    Ok(_) => {}
                    Err(TransportError::Timeout) => {
                        warn!("[Segment SEQ={start_seq}] ack timeout, window will be retransmitted");
                        break;
                    }
                    Err(_) => continue,
                }
                let current_seq = self.table.get(&remote).map(|c| c.send.seq_num).unwrap_or(start_seq);
                let diff = start_seq.diff(current_seq);
                if start_sent + diff > sent_segments {
                    sent_segments = start_sent + diff;
                }
                acked_in_window = diff;
                if acked_in_window == to_send {
                    break;
                }
            }
        }

        self.end_connection(remote)
    }
}

/// `"<base>.<ext>"` (just `"<base>"` if `extension` is empty), the
/// reconstructed output path for received metadata.
pub fn reconstruct_filename(metadata: &Metadata) -> String {
    if metadata.extension.is_empty() {
        metadata.filename.clone()
    } else {
        format!("{}.{}", metadata.filename, metadata.extension)
    }
}

/// Splits a file name into the `(base, extension)` pair the metadata prelude
/// carries. Only the final path component is kept -- the sender's directory
/// structure is never sent over the wire, so the receiver's `--output-dir`
/// is always honored. Files without an extension get an empty one.
pub fn split_filename(path: &str) -> Metadata {
    let name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    match name.rsplit_once('.') {
        Some((base, ext)) => Metadata { filename: base.to_string(), extension: ext.to_string() },
        None => Metadata { filename: name, extension: String::new() },
    }
}
