//! Client for the RCM remote configuration service.
//!
//! # Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Boundary configuration (`ClientConfig`), TOML loading, env expansion |
//! | `resolved` | Internal: defaults applied, URL base and credentials resolved |
//! | [`transport`] | The `Transport` seam and its `reqwest` implementation |
//! | [`watch`] | Interval polling with change detection and cancellation |
//!
//! Envelope parsing lives in [`rcm_types`] and is re-exported here.
//!
//! # Usage
//!
//! ```ignore
//! use rcm_client::{ClientConfig, RcmClient, WatchEvent};
//!
//! let client = RcmClient::new(&ClientConfig {
//!     token: Some("secret".into()),
//!     ..Default::default()
//! })?;
//!
//! let loaded = client.load("checkout", None).await?;
//! println!("{} (updated {:?})", loaded.content, loaded.payload.updated);
//!
//! client.on(WatchEvent::Update, |event| {
//!     println!("{} changed: {:?}", event.config_name, event.action);
//! });
//! let handle = client.watch("checkout", None).await?;
//! // ...
//! handle.shutdown().await;
//! ```
//!
//! # Error Handling
//!
//! [`RcmClient::load`] returns every failure as a [`ClientError`]. Missing
//! identifiers fail with [`ClientError::InvalidParameters`] before any request
//! is sent. Transport failures are not retried.

pub mod config;
mod error;
mod resolved;
pub mod transport;
pub mod watch;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rcm_types::{Envelope, LoadedConfig, ParseOptions};
use url::Url;

pub use config::{ClientConfig, ConfigError, Protocol};
pub use error::ClientError;
pub use resolved::{Credentials, Secret};
pub use transport::{ConfigRequest, HttpTransport, Transport, TransportError};
pub use watch::{
    DEFAULT_WATCH_INTERVAL, EventTable, PollOutcome, UpdateEvent, WatchEvent, WatchHandle,
    Watcher,
};

pub use rcm_types;
pub use rcm_types::{Content, Payload};

use resolved::ResolvedConfig;

pub type LoadFuture<'a> =
    Pin<Box<dyn Future<Output = Result<LoadedConfig, ClientError>> + Send + 'a>>;

/// Anything that can load a named configuration. Implemented by the client;
/// watchers are generic over it.
pub trait ConfigLoader: Send + Sync {
    fn load<'a>(&'a self, name: &'a str, topic: Option<&'a str>) -> LoadFuture<'a>;
}

impl<L: ConfigLoader + ?Sized> ConfigLoader for Arc<L> {
    fn load<'a>(&'a self, name: &'a str, topic: Option<&'a str>) -> LoadFuture<'a> {
        (**self).load(name, topic)
    }
}

/// Shared by the client and its watch tasks.
struct ClientCore {
    config: ResolvedConfig,
    transport: Arc<dyn Transport>,
}

impl ClientCore {
    fn request(&self, name: &str, topic: Option<&str>) -> Result<ConfigRequest, ClientError> {
        if name.trim().is_empty() {
            return Err(ClientError::InvalidParameters(
                "configuration name is required".to_string(),
            ));
        }
        if topic.is_some_and(|t| t.trim().is_empty()) {
            return Err(ClientError::InvalidParameters(
                "topic must not be empty when given".to_string(),
            ));
        }

        Ok(ConfigRequest {
            url: self.config.config_url(name, topic),
            credentials: self.config.credentials.clone(),
        })
    }

    async fn load_config(
        &self,
        name: &str,
        topic: Option<&str>,
    ) -> Result<LoadedConfig, ClientError> {
        let request = self.request(name, topic)?;
        tracing::debug!(
            url = %request.url,
            auth = request.credentials.kind(),
            "Loading configuration"
        );

        let body = self.transport.get(&request).await?;

        let options = ParseOptions {
            decode: self.config.decode,
        };
        let envelope = Envelope::parse(&body, options)?;
        Ok(LoadedConfig::from(envelope))
    }
}

impl ConfigLoader for ClientCore {
    fn load<'a>(&'a self, name: &'a str, topic: Option<&'a str>) -> LoadFuture<'a> {
        Box::pin(self.load_config(name, topic))
    }
}

/// RCM configuration client.
///
/// Each client owns its own handler table; watches started from it share that
/// table but keep their own `UPDATED` marker.
pub struct RcmClient {
    core: Arc<ClientCore>,
    events: Arc<EventTable>,
}

impl std::fmt::Debug for RcmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RcmClient")
            .field("base_url", &self.core.config.base_url.as_str())
            .field("credentials", &self.core.config.credentials)
            .field("decode", &self.core.config.decode)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl RcmClient {
    /// Build a client that talks HTTP through `reqwest`.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let resolved = ResolvedConfig::from_config(config)?;
        let transport = HttpTransport::new(resolved.timeout, &resolved.user_agent)?;
        Ok(Self::from_parts(resolved, Arc::new(transport)))
    }

    /// Build a client with a caller-supplied transport.
    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        let resolved = ResolvedConfig::from_config(config)?;
        Ok(Self::from_parts(resolved, transport))
    }

    fn from_parts(config: ResolvedConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            core: Arc::new(ClientCore { config, transport }),
            events: Arc::new(EventTable::new()),
        }
    }

    /// URL that `load(name, topic)` would request.
    pub fn config_url(&self, name: &str, topic: Option<&str>) -> Result<Url, ClientError> {
        self.core.request(name, topic).map(|request| request.url)
    }

    /// Fetch and decode one configuration.
    pub async fn load(&self, name: &str, topic: Option<&str>) -> Result<LoadedConfig, ClientError> {
        self.core.load_config(name, topic).await
    }

    /// Load the `config_name` given in the client configuration.
    pub async fn load_default(&self) -> Result<LoadedConfig, ClientError> {
        let Some(name) = self.core.config.config_name.as_deref() else {
            return Err(ClientError::InvalidParameters(
                "no config_name configured".to_string(),
            ));
        };
        self.core.load_config(name, None).await
    }

    /// Register the handler for `event`, replacing any earlier one.
    ///
    /// Applies to watches already running from this client.
    pub fn on<F>(&self, event: WatchEvent, handler: F)
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        self.events.on(event, handler);
    }

    /// Start watching `name`. `interval` defaults to [`DEFAULT_WATCH_INTERVAL`].
    ///
    /// Performs one load immediately to record the baseline marker; if that load
    /// fails the error is returned and nothing is spawned.
    pub async fn watch(
        &self,
        name: &str,
        interval: Option<Duration>,
    ) -> Result<WatchHandle, ClientError> {
        self.watch_topic(name, None, interval).await
    }

    pub async fn watch_topic(
        &self,
        name: &str,
        topic: Option<&str>,
        interval: Option<Duration>,
    ) -> Result<WatchHandle, ClientError> {
        let watcher = Watcher::start(
            Arc::clone(&self.core),
            Arc::clone(&self.events),
            name,
            topic.map(str::to_string),
        )
        .await?;
        Ok(watcher.spawn(interval.unwrap_or(DEFAULT_WATCH_INTERVAL)))
    }
}

impl ConfigLoader for RcmClient {
    fn load<'a>(&'a self, name: &'a str, topic: Option<&'a str>) -> LoadFuture<'a> {
        Box::pin(self.core.load_config(name, topic))
    }
}
