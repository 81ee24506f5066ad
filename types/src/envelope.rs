//! Envelope parsing.
//!
//! The header section is a run of `KEY: VALUE` lines. It ends at the first line
//! without the `": "` separator, and never resumes after that. When the line that
//! ends the header section is blank it is treated as the separator and dropped.
//! The remaining lines are joined with `\n`, so content is exactly the text that
//! follows the separator.
//!
//! A header line with an empty key (`": value"`) is rejected as
//! [`EnvelopeError::MalformedHeader`]. Earlier clients stored it under the key
//! `""`; this parser is stricter.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::error::{DecodingError, EnvelopeError};
use crate::metadata::{Codec, Format, Metadata, keys};
use crate::{Content, Payload};

const HEADER_SEPARATOR: &str = ": ";

/// Standard alphabet, padding optional. The service has emitted both.
const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Decode `FORMAT: JSON` / `FORMAT: YAML` content into a structured value.
    pub decode: bool,
}

impl ParseOptions {
    /// Leave content as text regardless of `FORMAT`.
    pub const RAW: Self = Self { decode: false };
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { decode: true }
    }
}

/// A parsed envelope: header metadata plus decoded content.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub metadata: Metadata,
    pub content: Content,
}

impl Envelope {
    pub fn parse(raw: &str, options: ParseOptions) -> Result<Self, EnvelopeError> {
        let (metadata, body) = split_sections(raw)?;
        let content = decode_content(body, &metadata, options)?;
        Ok(Self { metadata, content })
    }

    /// Parse with structured decoding enabled.
    pub fn parse_default(raw: &str) -> Result<Self, EnvelopeError> {
        Self::parse(raw, ParseOptions::default())
    }

    #[must_use]
    pub fn payload(&self) -> Payload {
        Payload::from_metadata(&self.metadata)
    }
}

fn split_sections(raw: &str) -> Result<(Metadata, String), EnvelopeError> {
    let mut metadata = Metadata::new();
    let mut body: Vec<&str> = Vec::new();
    let mut in_header = true;

    for (index, line) in raw.split('\n').enumerate() {
        if in_header {
            let mut parts = line.split(HEADER_SEPARATOR);
            if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
                let key = key.trim();
                if key.is_empty() {
                    return Err(EnvelopeError::MalformedHeader { line: index + 1 });
                }
                // Text after a second separator is not part of the value.
                metadata.insert(key, value.trim());
                continue;
            }

            in_header = false;
            if line.trim_end_matches('\r').is_empty() {
                continue;
            }
        }
        body.push(line);
    }

    Ok((metadata, body.join("\n")))
}

fn decode_content(
    body: String,
    metadata: &Metadata,
    options: ParseOptions,
) -> Result<Content, DecodingError> {
    let text = match metadata.codec() {
        Some(codec @ Codec::Base64) => {
            tracing::debug!(codec = codec.as_str(), "decoding content");
            decode_base64(&body)?
        }
        None => {
            if let Some(codec) = metadata.get(keys::CODEC) {
                tracing::debug!(codec, "unrecognized codec, content left as-is");
            }
            body
        }
    };

    if !options.decode {
        return Ok(Content::Text(text));
    }

    let format = metadata.format();
    if let Some(format) = format {
        tracing::debug!(format = format.as_str(), "parsing structured content");
    }
    match format {
        Some(Format::Json) => Ok(Content::Structured(serde_json::from_str(&text)?)),
        Some(Format::Yaml) => Ok(Content::Structured(serde_yaml::from_str(&text)?)),
        None => {
            if let Some(format) = metadata.get(keys::FORMAT) {
                tracing::debug!(format, "unrecognized format, content left as text");
            }
            Ok(Content::Text(text))
        }
    }
}

fn decode_base64(body: &str) -> Result<String, DecodingError> {
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64_LENIENT.decode(compact)?;
    Ok(String::from_utf8(bytes)?)
}
