//! Codec trait and implementations for line-framed messages.
//!
//! Every server message travels as exactly one line, so a codec works on
//! `String`s rather than raw bytes and must never emit a newline.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to single lines of text and decodes them back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one line (no terminator).
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails, or
    /// `ProtocolError::InvalidMessage` if the result spans several lines.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes one line back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the line is malformed or doesn't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, line: &str) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses compact JSON (via `serde_json`).
///
/// Compact JSON escapes newlines inside strings, so one value is always
/// one line: readable in a terminal with `nc` and trivial to parse in a
/// browser.
///
/// ```rust
/// use pairforge_protocol::{Codec, JsonCodec, ServerMessage};
///
/// let codec = JsonCodec;
/// let line = codec.encode(&ServerMessage::Reply { body: "hi".into() }).unwrap();
/// assert_eq!(line, r#"{"type":"Reply","body":"hi"}"#);
/// let back: ServerMessage = codec.decode(&line).unwrap();
/// assert_eq!(back, ServerMessage::Reply { body: "hi".into() });
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        let line = serde_json::to_string(value).map_err(ProtocolError::Encode)?;
        if line.contains('\n') {
            return Err(ProtocolError::InvalidMessage(
                "encoded message spans several lines".into(),
            ));
        }
        Ok(line)
    }

    fn decode<T: DeserializeOwned>(&self, line: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(line).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::ServerMessage;

    #[test]
    fn test_decode_rejects_garbage() {
        let result: Result<ServerMessage, _> = JsonCodec.decode("not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_escapes_embedded_newlines() {
        let line = JsonCodec
            .encode(&ServerMessage::Reply { body: "a\nb".into() })
            .unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains(r"a\nb"));
    }
}
