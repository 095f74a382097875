//! The endpoint's application-facing callback interface.
//!
//! Replaces the source's separately-registered, individually-mutable
//! callback slots with one object supplied once at construction, per design
//! note.

use std::net::SocketAddr;

pub trait TransportHandlers: Send {
    /// Called with the payload of each in-order data segment delivered on
    /// an established connection. The first payload delivered after a
    /// transfer begins is the JSON metadata prelude; callers distinguish it
    /// from file content themselves (see [`crate::transfer`]).
    fn on_payload(&mut self, _peer: SocketAddr, _payload: &[u8]) {}

    /// Called exactly once when a connection's send half completes the
    /// three-way handshake.
    fn on_connect(&mut self, _peer: SocketAddr) {}

    /// Called exactly once when a connection's four-way teardown
    /// completes.
    fn on_close(&mut self, _peer: SocketAddr) {}
}

/// A handler that does nothing; useful for endpoints that only drive
/// `handshake`/`transfer`/`end_connection` and poll their own state rather
/// than reacting to callbacks.
#[derive(Default)]
pub struct NullHandlers;

impl TransportHandlers for NullHandlers {}
