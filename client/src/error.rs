use rcm_types::EnvelopeError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// A required identifier was missing. Raised before any request is made.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode configuration: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    #[must_use]
    pub fn is_invalid_parameters(&self) -> bool {
        matches!(self, ClientError::InvalidParameters(_))
    }
}
