//! Frame codec for the Orion wire protocol.
//!
//! Every message on both the control channel (WebSocket text frames)
//! and the datagram channel (UDP) is one frame:
//!
//! ```text
//! <method>:<base64(JSON(payload))>
//! ```
//!
//! `method` is a fixed string naming the operation (see
//! [`crate::messages`]). The payload is the standard base-64 encoding
//! of the UTF-8 JSON serialization of the payload object. The empty
//! object `{}` encodes to `e30=`, a present and non-empty token, so a
//! well-formed frame always has text on both sides of the separator.
//!
//! Decoding is strict: a missing separator, invalid base-64, or
//! invalid JSON yields [`ProtoError::Malformed`]. Receivers drop
//! malformed input silently; there is no negative acknowledgement on
//! either channel.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{ProtoError, Result};

/// A decoded wire frame: a method name plus its JSON payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Method name, e.g. `"client_registered"`.
    pub method: String,
    /// Payload as parsed JSON.
    pub payload: serde_json::Value,
}

impl Frame {
    /// Build a frame from a method name and a serializable payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::Serialization`] if the payload cannot be
    /// represented as JSON.
    pub fn new(method: &str, payload: &impl Serialize) -> Result<Self> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| ProtoError::Serialization(e.to_string()))?;
        Ok(Self {
            method: method.to_string(),
            payload,
        })
    }

    /// Encode this frame to its wire text form.
    pub fn encode(&self) -> String {
        // Value serialization cannot fail for an already-parsed Value.
        let json = self.payload.to_string();
        format!("{}:{}", self.method, BASE64.encode(json.as_bytes()))
    }

    /// Decode a frame from its wire text form.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::Malformed`] if the separator is missing,
    /// the right half is not valid base-64, or the decoded bytes are
    /// not a JSON document.
    pub fn decode(text: &str) -> Result<Self> {
        let (method, encoded) = text
            .split_once(':')
            .ok_or_else(|| ProtoError::Malformed("missing ':' separator".to_string()))?;

        if method.is_empty() {
            return Err(ProtoError::Malformed("empty method".to_string()));
        }

        let json = BASE64
            .decode(encoded)
            .map_err(|e| ProtoError::Malformed(format!("invalid base64: {e}")))?;

        let payload: serde_json::Value = serde_json::from_slice(&json)
            .map_err(|e| ProtoError::Malformed(format!("invalid JSON payload: {e}")))?;

        Ok(Self {
            method: method.to_string(),
            payload,
        })
    }

    /// Deserialize the payload into a typed message struct.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::Schema`] if the payload does not match
    /// the expected shape.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| ProtoError::Schema(e.to_string()))
    }
}

/// Encode a method + payload pair directly to wire text.
///
/// Convenience for senders that do not need the intermediate [`Frame`].
///
/// # Errors
///
/// Returns [`ProtoError::Serialization`] if the payload cannot be
/// represented as JSON.
pub fn encode(method: &str, payload: &impl Serialize) -> Result<String> {
    Ok(Frame::new(method, payload)?.encode())
}
