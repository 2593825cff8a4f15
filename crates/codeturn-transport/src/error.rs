/// Errors raised while accepting connections or moving frames.
///
/// The handler treats everything except [`FrameTooLarge`](Self::FrameTooLarge)
/// as the end of the connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Writing a frame (or the close frame) to the socket failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// The socket errored, or a binary frame wasn't UTF-8.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or completing the WebSocket upgrade failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer sent a frame larger than the configured limit. The
    /// connection stays usable.
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },
}
