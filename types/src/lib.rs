//! Core types for the RCM configuration client.
//!
//! This crate contains the envelope parser and the values it produces. No IO, no async.
//! The HTTP side lives in `rcm-client`.
//!
//! An envelope is the plain-text document served by the configuration service:
//!
//! ```text
//! CREATED: 2021-03-01T10:00:00Z
//! UPDATED: 2021-03-04T08:12:45Z
//! FORMAT: JSON
//!
//! {"feature": true}
//! ```

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod envelope;
mod error;
mod metadata;

pub use envelope::{Envelope, ParseOptions};
pub use error::{DecodingError, EnvelopeError};
pub use metadata::{Codec, Format, Metadata, keys};

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Content
// ============================================================================

/// Envelope content after codec and format decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Raw (possibly base64-decoded) text.
    Text(String),
    /// JSON or YAML content decoded into a structured value.
    Structured(serde_json::Value),
}

impl Content {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Structured(_) => None,
        }
    }

    #[must_use]
    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            Content::Text(_) => None,
            Content::Structured(value) => Some(value),
        }
    }

    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(self, Content::Structured(_))
    }

    /// Deserialize structured content into a caller-defined type.
    ///
    /// Text content is offered to the deserializer as a JSON string.
    pub fn decode_into<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            Content::Text(text) => serde_json::from_value(serde_json::Value::String(text.clone())),
            Content::Structured(value) => T::deserialize(value),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Text(text) => f.write_str(text),
            Content::Structured(value) => write!(f, "{value}"),
        }
    }
}

// ============================================================================
// Payload
// ============================================================================

/// The subset of envelope metadata callers care about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Update-action marker set by the publisher (e.g. `RELOAD`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl Payload {
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            created: metadata.created().map(str::to_string),
            updated: metadata.updated().map(str::to_string),
            action: metadata.action().map(str::to_string),
        }
    }
}

// ============================================================================
// LoadedConfig
// ============================================================================

/// Result of loading one configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadedConfig {
    pub content: Content,
    pub payload: Payload,
}

impl From<Envelope> for LoadedConfig {
    fn from(envelope: Envelope) -> Self {
        let payload = envelope.payload();
        Self {
            content: envelope.content,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_display_text_is_verbatim() {
        let content = Content::Text("a: b\n".to_string());
        assert_eq!(content.to_string(), "a: b\n");
    }

    #[test]
    fn content_display_structured_is_json() {
        let content = Content::Structured(serde_json::json!({"k": 1}));
        assert_eq!(content.to_string(), r#"{"k":1}"#);
    }

    #[test]
    fn content_deserialize_structured() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Flags {
            beta: bool,
        }

        let content = Content::Structured(serde_json::json!({"beta": true}));
        let flags: Flags = content.decode_into().unwrap();
        assert_eq!(flags, Flags { beta: true });
    }

    #[test]
    fn content_serializes_untagged() {
        let text = serde_json::to_value(Content::Text("x".to_string())).unwrap();
        assert_eq!(text, serde_json::json!("x"));

        let structured =
            serde_json::to_value(Content::Structured(serde_json::json!([1, 2]))).unwrap();
        assert_eq!(structured, serde_json::json!([1, 2]));
    }

    #[test]
    fn loaded_config_projects_payload() {
        let envelope = Envelope::parse_default(
            "CREATED: c1\nUPDATED: u1\nACTION: RELOAD\nOWNER: ops\n\nbody",
        )
        .unwrap();
        let loaded = LoadedConfig::from(envelope);

        assert_eq!(
            loaded.payload,
            Payload {
                created: Some("c1".to_string()),
                updated: Some("u1".to_string()),
                action: Some("RELOAD".to_string()),
            }
        );
        assert_eq!(loaded.content, Content::Text("body".to_string()));
    }

    #[test]
    fn payload_serialization_skips_missing_fields() {
        let payload = Payload {
            updated: Some("u1".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"updated": "u1"}));
    }
}
