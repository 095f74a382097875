use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("segment malformed: {0}")]
    MalformedSegment(String),

    #[error("checksum mismatch")]
    ChecksumFailure,

    #[error("timed out waiting for a segment")]
    Timeout,

    #[error("handshake with peer did not complete within the attempt budget")]
    HandshakeError,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
