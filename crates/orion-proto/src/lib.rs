//! # orion-proto
//!
//! Wire protocol for the Orion rendezvous server.
//!
//! This crate defines everything that crosses a socket boundary:
//!
//! - **Frame codec** via [`frame`] — the `method:base64(JSON)` text
//!   frame carried on both the WebSocket control channel and the UDP
//!   datagram channel
//! - **Message catalogue** via [`messages`] — method-name constants and
//!   one payload struct per protocol message
//! - **Input validation** via [`validate`] — lobby/display name rules,
//!   capacity bounds, chat message bounds, lobby-ID format
//!
//! ## Architecture
//!
//! ```text
//! Application
//!     |
//!     v
//! payload struct (messages.rs)  -- serde, camelCase on the wire
//!     |
//!     v
//! Frame (frame.rs)              -- "<method>:<base64(JSON)>" text
//!     |
//!     v
//! WebSocket text frame / UDP datagram
//! ```

pub mod frame;
pub mod messages;
pub mod validate;

pub use frame::Frame;

/// Error types for protocol operations.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// Frame could not be decoded (missing separator, bad base-64,
    /// invalid JSON). Receivers drop such input silently.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Payload decoded to JSON but does not match the expected schema.
    #[error("schema error: {0}")]
    Schema(String),

    /// A user-supplied value failed validation. The message is the
    /// user-facing explanation surfaced over HTTP.
    #[error("{0}")]
    Validation(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtoError::Malformed("no separator".to_string());
        assert_eq!(err.to_string(), "malformed frame: no separator");

        let err = ProtoError::Validation("name is too long".to_string());
        assert_eq!(err.to_string(), "name is too long");
    }
}
