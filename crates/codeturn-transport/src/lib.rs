//! Transport abstraction layer for Codeturn.
//!
//! A transport accepts connections and hands each one back as two
//! independent halves: a [`FrameSender`] owned by the connection's writer
//! task and a [`FrameReceiver`] owned by its reader loop. Frames are UTF-8
//! text, one encoded event per frame.

mod error;
mod websocket;

pub use error::TransportError;
pub use websocket::{WebSocketReceiver, WebSocketSender, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A freshly accepted connection, already split into its two halves.
pub struct Accepted<S, R> {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub sender: S,
    pub receiver: R,
}

/// Accepts new incoming connections.
pub trait Transport: Send + 'static {
    /// Outbound half of an accepted connection.
    type Sender: FrameSender;
    /// Inbound half of an accepted connection.
    type Receiver: FrameReceiver;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<
        Output = Result<Accepted<Self::Sender, Self::Receiver>, TransportError>,
    > + Send;
}

/// The writing half of a connection.
pub trait FrameSender: Send + 'static {
    /// Sends one text frame to the remote peer.
    fn send_text(
        &mut self,
        text: String,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends a close frame. Further sends fail.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// The reading half of a connection.
pub trait FrameReceiver: Send + 'static {
    /// Receives the next text frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed. Binary
    /// frames are accepted if they hold valid UTF-8.
    fn recv_text(&mut self) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_equality() {
        assert_eq!(ConnectionId::new(1), ConnectionId::new(1));
        assert_ne!(ConnectionId::new(1), ConnectionId::new(2));
    }
}
