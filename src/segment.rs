//! The wire unit: a 12-byte header plus up to [`MAX_PAYLOAD`] bytes of
//! payload. See the spec's wire-format diagram for the exact byte layout.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::seqnum::SeqNum;

pub const HEADER_LEN: usize = 12;
pub const MAX_PAYLOAD: usize = 32_756;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        const FIN = 0b0000_0001;
        const SYN = 0b0000_0010;
        const ACK = 0b0001_0000;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub seq_num: SeqNum,
    pub ack_num: SeqNum,
    pub flags: Flags,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub filename: String,
    pub extension: String,
}

impl Segment {
    pub fn syn(seq: SeqNum) -> Self {
        Segment { seq_num: seq, ack_num: SeqNum::ZERO, flags: Flags::SYN, payload: Vec::new() }
    }

    pub fn ack(ack: SeqNum) -> Self {
        Segment { seq_num: SeqNum::ZERO, ack_num: ack, flags: Flags::ACK, payload: Vec::new() }
    }

    pub fn syn_ack(seq: SeqNum, ack: SeqNum) -> Self {
        Segment { seq_num: seq, ack_num: ack, flags: Flags::SYN | Flags::ACK, payload: Vec::new() }
    }

    pub fn fin() -> Self {
        Segment { seq_num: SeqNum::ZERO, ack_num: SeqNum::ZERO, flags: Flags::FIN, payload: Vec::new() }
    }

    pub fn fin_ack() -> Self {
        Segment { seq_num: SeqNum::ZERO, ack_num: SeqNum::ZERO, flags: Flags::FIN | Flags::ACK, payload: Vec::new() }
    }

    pub fn data(seq: SeqNum, payload: Vec<u8>) -> Self {
        Segment { seq_num: seq, ack_num: SeqNum::ZERO, flags: Flags::empty(), payload }
    }

    pub fn metadata(seq: SeqNum, metadata: &Metadata) -> Self {
        let payload = serde_json::to_vec(metadata).expect("metadata is always serializable");
        Segment::data(seq, payload)
    }

    /// Packs the header in network byte order followed by the payload,
    /// computing the checksum over the lot with the checksum field treated
    /// as zero.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.seq_num.0.to_be_bytes());
        buf.extend_from_slice(&self.ack_num.0.to_be_bytes());
        buf.push(self.flags.bits());
        buf.push(0); // reserved
        buf.extend_from_slice(&0u16.to_be_bytes()); // checksum placeholder
        buf.extend_from_slice(&self.payload);

        let checksum = checksum_complement(&buf);
        buf[10..12].copy_from_slice(&checksum.to_be_bytes());
        buf
    }

    /// Splits header and payload apart and reports whether the stored
    /// checksum validates. Fails only when the buffer is too short to
    /// contain a header at all.
    pub fn decode(bytes: &[u8]) -> Result<(Segment, bool), TransportError> {
        if bytes.len() < HEADER_LEN {
            return Err(TransportError::MalformedSegment(format!(
                "expected at least {HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let seq_num = SeqNum(u32::from_be_bytes(bytes[0..4].try_into().unwrap()));
        let ack_num = SeqNum(u32::from_be_bytes(bytes[4..8].try_into().unwrap()));
        let flags = Flags::from_bits_truncate(bytes[8]);
        let stored_checksum = u16::from_be_bytes(bytes[10..12].try_into().unwrap());
        let payload = bytes[HEADER_LEN..].to_vec();

        let recomputed = checksum_sum(bytes);
        let checksum_ok = recomputed.wrapping_add(stored_checksum) == 0xFFFF;

        Ok((Segment { seq_num, ack_num, flags, payload }, checksum_ok))
    }
}

/// Accumulates the folded 16-bit one's-complement sum over `bytes`, treating
/// bytes[10..12] (the checksum field) as zero regardless of their actual
/// content, and padding a trailing odd byte with a zero low byte.
fn checksum_sum(bytes: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        if i == 10 {
            // Checksum field itself (bytes 10..12) is treated as zero.
            i += 2;
            continue;
        }
        let hi = bytes[i];
        let lo = if i + 1 < bytes.len() { bytes[i + 1] } else { 0 };
        sum += u32::from(hi) << 8 | u32::from(lo);
        i += 2;
    }
    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xFFFF);
    }
    sum as u16
}

fn checksum_complement(bytes: &[u8]) -> u16 {
    !checksum_sum(bytes)
}
