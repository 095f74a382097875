use std::time::Duration;

/// The transport's tunable constants, collected in one place so the
/// handshake retry budget and timeouts -- flagged as fragile in the design
/// notes -- can be overridden per endpoint instead of hardcoded.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Number of outstanding unacknowledged frames the sender may have in
    /// flight at once.
    pub window_size: u16,
    /// Maximum bytes of payload per data segment.
    pub max_payload: usize,
    /// Size of the per-`recv` buffer; caps the largest datagram accepted.
    pub recv_buffer: usize,
    /// How many SYN retransmissions a handshake attempts before failing.
    pub handshake_retries: u32,
    /// How many FIN retransmissions a teardown attempts before giving up.
    pub teardown_retries: u32,
    /// Per-attempt deadline while waiting for the handshake's final ACK.
    pub handshake_timeout: Duration,
    /// Per-attempt deadline while waiting for teardown's final ACK.
    pub teardown_timeout: Duration,
    /// Per-attempt deadline while draining acks for an in-flight window.
    pub ack_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            window_size: 5,
            max_payload: 32_756,
            recv_buffer: 32_768,
            handshake_retries: 2,
            teardown_retries: 2,
            handshake_timeout: Duration::from_secs(2),
            teardown_timeout: Duration::from_secs(2),
            ack_timeout: Duration::from_secs(5),
        }
    }
}
