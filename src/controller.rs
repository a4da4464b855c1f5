//! Refresh/cache controller: owns the periodic fetch cycle and the
//! last-known-good warning list.
//!
//! State machine: `Loading → Empty | Ready`, then `Ready ⇄ Ready` /
//! `Ready ⇄ Empty` on later cycles. A successful cycle atomically replaces
//! the published [`FeedState`]; a failed cycle (transport or format error)
//! leaves the previous state untouched and reports a [`RefreshEvent::Failed`]
//! — stale-but-valid beats blanking the display.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};

use crate::feed::{fetch_feed, FeedFormatError, FetchError, ItemStream};
use crate::warning::{self, Warning};

/// A fatal cycle outcome. Per-item parse skips are never one of these.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Transport(#[from] FetchError),

    #[error(transparent)]
    Format(#[from] FeedFormatError),
}

/// The controller's published, immutable view of the warning list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSnapshot {
    /// No successful fetch yet.
    Loading,
    /// Fetch succeeded with zero warnings.
    Empty,
    /// Fetch succeeded; the shared list is immutable and cheap to clone.
    Ready(Arc<[Warning]>),
}

impl FeedSnapshot {
    pub fn warnings(&self) -> &[Warning] {
        match self {
            Self::Ready(list) => list,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// The published unit: snapshot plus display header.
///
/// The header is the feed's own channel title when the last successful cycle
/// supplied one, else the configured fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    pub header: String,
    pub snapshot: FeedSnapshot,
}

/// Cycle outcomes reported to the consumer alongside the watch channel.
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    /// A cycle committed a new snapshot. `skipped` counts titleless items
    /// dropped during parsing.
    Updated { warnings: usize, skipped: usize },
    /// A cycle failed; the previous snapshot is still live.
    Failed { error: String },
}

/// Owns the fetch → extract → parse → publish cycle for one feed URL.
///
/// Reads never block: [`snapshot`](Self::snapshot) borrows the latest
/// committed state from a watch channel, and a new list is fully built before
/// it is published. Overlapping triggers (a manual refresh racing the timer)
/// are serialized by an internal mutex, so writes cannot interleave.
pub struct RefreshController {
    client: reqwest::Client,
    feed_url: String,
    fallback_header: String,
    state_tx: watch::Sender<FeedState>,
    event_tx: Option<mpsc::Sender<RefreshEvent>>,
    cycle_guard: Mutex<()>,
}

impl RefreshController {
    /// Creates a controller in the `Loading` state. Nothing is fetched until
    /// [`trigger_cycle`](Self::trigger_cycle) or [`run`](Self::run).
    pub fn new(client: reqwest::Client, feed_url: String, fallback_header: String) -> Self {
        let (state_tx, _) = watch::channel(FeedState {
            header: fallback_header.clone(),
            snapshot: FeedSnapshot::Loading,
        });
        Self {
            client,
            feed_url,
            fallback_header,
            state_tx,
            event_tx: None,
            cycle_guard: Mutex::new(()),
        }
    }

    /// Attaches a channel for cycle outcome events.
    pub fn with_events(mut self, event_tx: mpsc::Sender<RefreshEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// The latest committed state. Non-blocking and cheap: `Ready` lists are
    /// behind an `Arc`.
    pub fn snapshot(&self) -> FeedState {
        self.state_tx.borrow().clone()
    }

    /// Subscribes to state changes. Each committed cycle wakes receivers.
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state_tx.subscribe()
    }

    /// Runs one full refresh cycle and commits the result.
    ///
    /// On success the snapshot becomes `Empty` or `Ready` and subscribers are
    /// notified. On failure the previous state stays live, the error is
    /// logged and reported as [`RefreshEvent::Failed`], and returned to the
    /// caller. Concurrent triggers queue behind the cycle guard rather than
    /// interleaving.
    pub async fn trigger_cycle(&self) -> Result<(), RefreshError> {
        let _guard = self.cycle_guard.lock().await;

        match self.run_cycle().await {
            Ok((state, skipped)) => {
                let count = state.snapshot.warnings().len();
                tracing::info!(
                    warnings = count,
                    skipped = skipped,
                    header = %state.header,
                    "Refresh cycle committed"
                );
                self.state_tx.send_replace(state);
                self.emit(RefreshEvent::Updated {
                    warnings: count,
                    skipped,
                })
                .await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    feed = %self.feed_url,
                    error = %e,
                    "Refresh cycle failed, keeping previous snapshot"
                );
                self.emit(RefreshEvent::Failed {
                    error: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    /// Periodic trigger: runs a cycle immediately, then on every interval
    /// tick, until dropped. Cycle failures are reported via events and
    /// otherwise ignored here — the next tick is the retry.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        // Interval instead of sleep-in-loop so a slow cycle cannot drift the
        // schedule; a hung fetch only delays its own publish.
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            let _ = self.trigger_cycle().await;
        }
    }

    /// Fetch → extract → parse, building the next state without touching the
    /// published one. The swap happens in `trigger_cycle` only after this
    /// returns, which is what makes the publish atomic.
    async fn run_cycle(&self) -> Result<(FeedState, usize), RefreshError> {
        let body = fetch_feed(&self.client, &self.feed_url).await?;
        let (items, channel_title) = ItemStream::new(&body).collect_all()?;

        let total = items.len();
        let warnings: Vec<Warning> = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let parsed = warning::parse(item);
                if parsed.is_none() {
                    tracing::debug!(index, "Skipping item without title");
                }
                parsed
            })
            .collect();
        let skipped = total - warnings.len();

        let snapshot = if warnings.is_empty() {
            FeedSnapshot::Empty
        } else {
            FeedSnapshot::Ready(warnings.into())
        };
        let header = channel_title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.fallback_header.clone());

        Ok((FeedState { header, snapshot }, skipped))
    }

    async fn emit(&self, event: RefreshEvent) {
        if let Some(tx) = &self.event_tx {
            if tx.send(event).await.is_err() {
                tracing::debug!("Event channel closed, dropping refresh event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn controller_for(uri: &str) -> RefreshController {
        RefreshController::new(
            reqwest::Client::new(),
            format!("{}/feed", uri),
            "Met Office Warnings".to_string(),
        )
    }

    #[tokio::test]
    async fn test_initial_state_is_loading_with_fallback_header() {
        let controller = controller_for("http://127.0.0.1:1");
        let state = controller.snapshot();
        assert!(state.snapshot.is_loading());
        assert_eq!(state.header, "Met Office Warnings");
    }

    #[tokio::test]
    async fn test_empty_feed_commits_empty_not_loading() {
        let empty_rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Warnings</title></channel></rss>"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(empty_rss))
            .mount(&mock_server)
            .await;

        let controller = controller_for(&mock_server.uri());
        controller.trigger_cycle().await.unwrap();

        let state = controller.snapshot();
        assert_eq!(state.snapshot, FeedSnapshot::Empty);
        assert_eq!(state.header, "Warnings");
    }

    #[tokio::test]
    async fn test_header_falls_back_when_channel_untitled() {
        let rss = r#"<rss version="2.0"><channel>
            <item><title>Yellow warning of Wind affecting Wales</title></item>
        </channel></rss>"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss))
            .mount(&mock_server)
            .await;

        let controller = controller_for(&mock_server.uri());
        controller.trigger_cycle().await.unwrap();
        assert_eq!(controller.snapshot().header, "Met Office Warnings");
    }

    #[tokio::test]
    async fn test_subscribers_notified_on_commit() {
        let rss = r#"<rss version="2.0"><channel><title>W</title></channel></rss>"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss))
            .mount(&mock_server)
            .await;

        let controller = controller_for(&mock_server.uri());
        let mut rx = controller.subscribe();

        controller.trigger_cycle().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().snapshot, FeedSnapshot::Empty);
    }

    #[tokio::test]
    async fn test_failed_cycle_emits_event_and_returns_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let (tx, mut rx) = mpsc::channel(4);
        let controller = controller_for(&mock_server.uri()).with_events(tx);

        let result = controller.trigger_cycle().await;
        assert!(matches!(result, Err(RefreshError::Transport(_))));

        match rx.recv().await.unwrap() {
            RefreshEvent::Failed { error } => assert!(error.contains("500")),
            other => panic!("Expected Failed event, got {:?}", other),
        }
    }
}
