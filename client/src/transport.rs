//! HTTP transport seam.
//!
//! The loader only needs "GET this URL with these credentials, give me the body".
//! [`HttpTransport`] does that with `reqwest`; tests substitute their own
//! [`Transport`] to observe or script requests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::resolved::Credentials;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl TransportError {
    /// HTTP status for non-2xx responses.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Request { source, .. } => source.status().map(|s| s.as_u16()),
            TransportError::Client(_) => None,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Request { source, .. } if source.is_timeout())
    }
}

/// A single configuration fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRequest {
    pub url: Url,
    pub credentials: Credentials,
}

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, TransportError>> + Send + 'a>>;

pub trait Transport: Send + Sync {
    /// Perform the GET and return the response body as text.
    ///
    /// Non-2xx statuses must be reported as [`TransportError::Status`].
    fn get<'a>(&'a self, request: &'a ConfigRequest) -> TransportFuture<'a>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client })
    }

    /// Wrap an existing client, e.g. one with a custom connector or proxy.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, request: &'a ConfigRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            let builder = self.client.get(request.url.clone());
            let builder = match &request.credentials {
                Credentials::Anonymous => builder,
                Credentials::Bearer(token) => builder.bearer_auth(token.expose()),
                Credentials::Basic { app_id, app_secret } => {
                    builder.basic_auth(app_id, Some(app_secret.expose()))
                }
            };

            let response = builder
                .send()
                .await
                .map_err(|source| TransportError::Request {
                    url: request.url.to_string(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status {
                    url: request.url.to_string(),
                    status: status.as_u16(),
                });
            }

            response
                .text()
                .await
                .map_err(|source| TransportError::Request {
                    url: request.url.to_string(),
                    source,
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_exposes_code() {
        let err = TransportError::Status {
            url: "https://config.remosi.net/v1/config/app".to_string(),
            status: 404,
        };
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn http_transport_builds_with_timeout() {
        assert!(HttpTransport::new(Duration::from_secs(5), "rcm-client/test").is_ok());
    }
}
