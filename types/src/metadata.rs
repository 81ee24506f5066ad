use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header keys with meaning to the client.
pub mod keys {
    pub const CREATED: &str = "CREATED";
    pub const UPDATED: &str = "UPDATED";
    pub const CODEC: &str = "CODEC";
    pub const FORMAT: &str = "FORMAT";
    pub const ACTION: &str = "ACTION";
}

/// Binary encoding applied to envelope content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Base64,
}

impl Codec {
    /// Match a `CODEC` header value. Matching is exact, as the service emits it.
    #[must_use]
    pub fn from_header(value: &str) -> Option<Self> {
        match value {
            "BASE64" => Some(Codec::Base64),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Codec::Base64 => "BASE64",
        }
    }
}

/// Structured format of envelope content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    #[must_use]
    pub fn from_header(value: &str) -> Option<Self> {
        match value {
            "JSON" => Some(Format::Json),
            "YAML" => Some(Format::Yaml),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Format::Json => "JSON",
            Format::Yaml => "YAML",
        }
    }
}

/// Header section of an envelope.
///
/// Keys and values are stored trimmed. A repeated key keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn created(&self) -> Option<&str> {
        self.get(keys::CREATED)
    }

    #[must_use]
    pub fn updated(&self) -> Option<&str> {
        self.get(keys::UPDATED)
    }

    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.get(keys::ACTION)
    }

    /// Recognized codec, or `None` when absent or unknown.
    #[must_use]
    pub fn codec(&self) -> Option<Codec> {
        self.get(keys::CODEC).and_then(Codec::from_header)
    }

    /// Recognized format, or `None` when absent or unknown.
    #[must_use]
    pub fn format(&self) -> Option<Format> {
        self.get(keys::FORMAT).and_then(Format::from_header)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
