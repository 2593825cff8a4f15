//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire events.
///
/// When you see a `ProtocolError`, the problem is in the shape of the
/// bytes, not in networking or in session rules.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `event` tag,
    /// missing required fields, or wrong field types.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The frame is well-formed but violates a protocol rule, e.g. it is
    /// larger than the configured frame limit.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
