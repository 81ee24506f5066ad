use thiserror::Error;

/// Failure to turn raw envelope text into metadata and content.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// A header line had an empty key.
    #[error("malformed envelope header on line {line}: empty key")]
    MalformedHeader { line: usize },

    #[error(transparent)]
    Decoding(#[from] DecodingError),
}

/// Content could not be decoded according to its `CODEC`/`FORMAT` headers.
#[derive(Debug, Error)]
pub enum DecodingError {
    #[error("invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("base64 content is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid JSON content: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML content: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
