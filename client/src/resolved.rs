//! Resolved, invariant-safe client configuration.
//!
//! Converts the optional, boundary-level [`ClientConfig`] into concrete values
//! so that the loader never handles `Option` defaults itself.
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::config::{ClientConfig, ConfigError};

pub(crate) const DEFAULT_USER_AGENT: &str = concat!("rcm-client/", env!("CARGO_PKG_VERSION"));

const CONFIG_PATH_PREFIX: [&str; 2] = ["v1", "config"];

/// A credential string that never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// How requests authenticate against the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Anonymous,
    Bearer(Secret),
    Basic { app_id: String, app_secret: Secret },
}

impl Credentials {
    fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(token) = non_empty(&config.token) {
            return Ok(Credentials::Bearer(Secret::new(token)));
        }

        match (non_empty(&config.app_id), non_empty(&config.app_secret)) {
            (Some(app_id), Some(app_secret)) => Ok(Credentials::Basic {
                app_id,
                app_secret: Secret::new(app_secret),
            }),
            (Some(_), None) => Err(ConfigError::Invalid(
                "app_id is set but app_secret is missing".to_string(),
            )),
            (None, Some(_)) => Err(ConfigError::Invalid(
                "app_secret is set but app_id is missing".to_string(),
            )),
            (None, None) => Ok(Credentials::Anonymous),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::Anonymous => "anonymous",
            Credentials::Bearer(_) => "bearer",
            Credentials::Basic { .. } => "basic",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub base_url: Url,
    pub credentials: Credentials,
    pub decode: bool,
    pub timeout: Duration,
    pub user_agent: String,
    pub config_name: Option<String>,
}

impl ResolvedConfig {
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let base_url = base_url(config)?;
        let credentials = Credentials::from_config(config)?;
        if matches!(credentials, Credentials::Anonymous) {
            tracing::warn!("No token or app credentials configured; requests are unauthenticated");
        }

        let user_agent = config
            .user_agent
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let config_name = config
            .config_name
            .clone()
            .filter(|s| !s.trim().is_empty());

        Ok(Self {
            base_url,
            credentials,
            decode: config.decode(),
            timeout: Duration::from_secs(u64::from(config.timeout_seconds())),
            user_agent,
            config_name,
        })
    }

    /// `{base}/v1/config/[{topic}/]{name}` with each segment percent-encoded.
    pub fn config_url(&self, name: &str, topic: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        // base_url is checked to be a hierarchical http(s) URL in `base_url()`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.clear().extend(CONFIG_PATH_PREFIX);
            if let Some(topic) = topic {
                segments.push(topic);
            }
            segments.push(name);
        }
        url
    }
}

fn base_url(config: &ClientConfig) -> Result<Url, ConfigError> {
    let raw = format!("{}://{}", config.protocol(), config.server());
    let mut url = Url::parse(&raw)
        .map_err(|e| ConfigError::Invalid(format!("invalid server '{}': {e}", config.server())))?;

    if url.cannot_be_a_base() || url.host().is_none() {
        return Err(ConfigError::Invalid(format!(
            "server '{}' is not a host name",
            config.server()
        )));
    }

    if let Some(port) = config.port {
        url.set_port(Some(port))
            .map_err(|()| ConfigError::Invalid(format!("cannot apply port {port}")))?;
    }

    Ok(url)
}
