//! A reliable, connection-oriented file-transfer protocol layered atop UDP:
//! three-way handshake, sliding-window Go-Back-N data transfer, a 16-bit
//! one's-complement checksum, and a four-message graceful teardown.

pub mod config;
pub mod connection;
pub mod datagram;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod handshake;
pub mod segment;
pub mod seqnum;
pub mod transfer;

pub use config::TransportConfig;
pub use connection::{Connection, ReceiveHalf, SendHalf};
pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use handlers::{NullHandlers, TransportHandlers};
pub use handshake::UdpEndpoint;
pub use segment::{Flags, Metadata, Segment};
pub use seqnum::SeqNum;
pub use transfer::{reconstruct_filename, split_filename};
