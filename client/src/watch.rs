//! Change watching.
//!
//! A [`Watcher`] loads one configuration on a fixed interval and fires the
//! `update` handler whenever the envelope's `UPDATED` marker differs from the
//! last one seen. Polling runs in a single task, so each tick finishes its
//! load/compare/notify sequence before the next tick is awaited. Ticks missed
//! while a slow load is in flight are skipped.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rcm_types::{Content, LoadedConfig};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::{ClientError, ConfigLoader};

pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(60_000);

/// Events a watcher can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEvent {
    Update,
}

impl WatchEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            WatchEvent::Update => "update",
        }
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchEvent {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update" => Ok(WatchEvent::Update),
            other => Err(ClientError::InvalidParameters(format!(
                "unknown watch event '{other}'"
            ))),
        }
    }
}

/// Payload of the `update` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateEvent {
    pub config_name: String,
    pub action: Option<String>,
    pub content: Content,
}

type Handler = Arc<dyn Fn(&UpdateEvent) + Send + Sync>;

/// Registered event handlers. One handler per event; registering again replaces it.
#[derive(Default)]
pub struct EventTable {
    handlers: Mutex<HashMap<WatchEvent, Handler>>,
}

impl fmt::Debug for EventTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventTable")
            .field("registered", &handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EventTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, event: WatchEvent, handler: F)
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event, Arc::new(handler));
    }

    /// Invoke the handler for `event`, if any. Returns whether one ran.
    pub fn emit(&self, event: WatchEvent, payload: &UpdateEvent) -> bool {
        // Clone out of the lock so a handler may register handlers itself.
        let handler = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .cloned();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }
}

/// Result of a single poll.
#[derive(Debug)]
pub enum PollOutcome {
    Unchanged,
    Changed(UpdateEvent),
    Failed(ClientError),
}

/// Polling state for one configuration.
pub struct Watcher<L> {
    loader: L,
    events: Arc<EventTable>,
    config_name: String,
    topic: Option<String>,
    last_update: Option<String>,
    baseline: LoadedConfig,
}

impl<L> fmt::Debug for Watcher<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("config_name", &self.config_name)
            .field("topic", &self.topic)
            .field("last_update", &self.last_update)
            .finish_non_exhaustive()
    }
}

impl<L: ConfigLoader + 'static> Watcher<L> {
    /// Perform the initial load and record its `UPDATED` marker as the baseline.
    ///
    /// A failing initial load is returned to the caller; nothing is polled.
    /// The loaded document is kept as [`Watcher::baseline`].
    pub async fn start(
        loader: L,
        events: Arc<EventTable>,
        config_name: impl Into<String>,
        topic: Option<String>,
    ) -> Result<Self, ClientError> {
        let config_name = config_name.into();
        let initial = loader.load(&config_name, topic.as_deref()).await?;
        tracing::debug!(
            config = %config_name,
            updated = ?initial.payload.updated,
            "Watch baseline recorded"
        );
        Ok(Self {
            loader,
            events,
            config_name,
            topic,
            last_update: initial.payload.updated.clone(),
            baseline: initial,
        })
    }

    #[must_use]
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    #[must_use]
    pub fn last_update(&self) -> Option<&str> {
        self.last_update.as_deref()
    }

    /// Document returned by the initial load.
    #[must_use]
    pub fn baseline(&self) -> &LoadedConfig {
        &self.baseline
    }

    /// Load once and compare against the last seen marker.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let result = self.fetch().await;
        self.apply(result)
    }

    async fn fetch(&self) -> Result<LoadedConfig, ClientError> {
        self.loader
            .load(&self.config_name, self.topic.as_deref())
            .await
    }

    fn apply(&mut self, result: Result<LoadedConfig, ClientError>) -> PollOutcome {
        let loaded = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(config = %self.config_name, "Watch poll failed: {e}");
                return PollOutcome::Failed(e);
            }
        };

        if loaded.payload.updated == self.last_update {
            tracing::trace!(config = %self.config_name, "Configuration unchanged");
            return PollOutcome::Unchanged;
        }

        tracing::info!(
            config = %self.config_name,
            previous = ?self.last_update,
            updated = ?loaded.payload.updated,
            "Configuration updated"
        );
        let event = UpdateEvent {
            config_name: self.config_name.clone(),
            action: loaded.payload.action,
            content: loaded.content,
        };
        self.events.emit(WatchEvent::Update, &event);
        self.last_update = loaded.payload.updated;
        PollOutcome::Changed(event)
    }

    /// Move polling onto a background task ticking every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(mut self, interval: Duration) -> WatchHandle {
        let interval = if interval.is_zero() {
            DEFAULT_WATCH_INTERVAL
        } else {
            interval
        };
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let config_name = self.config_name.clone();
        let baseline = std::mem::take(&mut self.baseline);

        tracing::info!(
            config = %config_name,
            interval_ms = interval.as_millis() as u64,
            "Watching configuration"
        );

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    // Fires on cancel() and when the handle is dropped.
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                let result = self.fetch().await;
                if stop_requested(&stop_rx) {
                    break;
                }
                self.apply(result);
            }

            tracing::info!(config = %self.config_name, "Watch stopped");
        });

        WatchHandle {
            config_name,
            baseline,
            stop_tx,
            join,
        }
    }
}

fn stop_requested(stop_rx: &watch::Receiver<bool>) -> bool {
    *stop_rx.borrow() || stop_rx.has_changed().is_err()
}

/// Handle to a running watch. Dropping it stops the watch.
#[must_use = "dropping a WatchHandle stops the watch"]
#[derive(Debug)]
pub struct WatchHandle {
    config_name: String,
    baseline: LoadedConfig,
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WatchHandle {
    #[must_use]
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// Document returned by the initial load; its `UPDATED` marker is the
    /// one later polls are compared against.
    #[must_use]
    pub fn baseline(&self) -> &LoadedConfig {
        &self.baseline
    }

    /// Stop future ticks. A load already in flight completes but is ignored.
    pub fn cancel(&self) {
        self.stop_tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.stop_tx.borrow()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel and wait for the polling task to exit.
    pub async fn shutdown(self) {
        self.cancel();
        let WatchHandle { join, stop_tx, .. } = self;
        if let Err(e) = join.await {
            tracing::error!("Watch task ended abnormally: {e}");
        }
        drop(stop_tx);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn sample_event() -> UpdateEvent {
        UpdateEvent {
            config_name: "app".to_string(),
            action: None,
            content: Content::Text("body".to_string()),
        }
    }

    #[test]
    fn emit_without_handler_reports_nothing_ran() {
        let events = EventTable::new();
        assert!(!events.emit(WatchEvent::Update, &sample_event()));
    }

    #[test]
    fn registering_again_replaces_handler() {
        let events = EventTable::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        events.on(WatchEvent::Update, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&second);
        events.on(WatchEvent::Update, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(events.emit(WatchEvent::Update, &sample_event()));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_event_name_is_invalid_parameters() {
        let err = "change".parse::<WatchEvent>().unwrap_err();
        assert!(err.is_invalid_parameters());
        assert_eq!(WatchEvent::Update.to_string(), "update");
    }

    #[test]
    fn update_event_serializes_structured_content_inline() {
        let event = UpdateEvent {
            config_name: "flags".to_string(),
            action: Some("RELOAD".to_string()),
            content: Content::Structured(serde_json::json!({"beta": true})),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "config_name": "flags",
                "action": "RELOAD",
                "content": {"beta": true}
            })
        );
    }
}
