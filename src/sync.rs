//! The fetch, compare, persist and notify cycle.
//!
//! The persisted settings are the single source of truth. The snapshot
//! cache only spares the renderer a decode on every draw and is written after
//! the store, never instead of it.

use crate::feeds::{FeedSnapshot, FetchError, SummaryFetcher};
use crate::settings::{PersistedSettings, SettingsHandle};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Presentation side of the sync cycle.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Show the new-cards notification. Resolves once the user has
    /// acknowledged it.
    async fn show_notification(&self, snapshot: &FeedSnapshot);

    /// Redraw anything currently showing the cached snapshot.
    fn refresh_display(&self);
}

pub trait SnapshotCache: Send + Sync {
    fn get(&self) -> Option<FeedSnapshot>;
    fn put(&self, snapshot: FeedSnapshot);
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: RwLock<Option<FeedSnapshot>>,
}

impl SnapshotCache for MemoryCache {
    fn get(&self) -> Option<FeedSnapshot> {
        self.slot.read().clone()
    }

    fn put(&self, snapshot: FeedSnapshot) {
        *self.slot.write() = Some(snapshot);
    }
}

#[derive(Debug)]
pub enum SyncOutcome {
    Updated { notified: bool },
    Failed(FetchError),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Updated { .. })
    }
}

/// Whether a freshly fetched snapshot warrants a popup.
///
/// A forced sync skips the `generated_at` comparison, so it notifies even
/// when nothing was cached before. The popup preference gates everything.
pub fn should_notify(
    show_popup: bool,
    previous: Option<&FeedSnapshot>,
    next: &FeedSnapshot,
    force: bool,
) -> bool {
    show_popup && (previous.is_some_and(|prev| next.differs_from(prev)) || force)
}

pub struct SummarySync {
    fetcher: Arc<dyn SummaryFetcher>,
    renderer: Arc<dyn Renderer>,
    settings: Mutex<SettingsHandle>,
    cache: Arc<dyn SnapshotCache>,
    in_flight: tokio::sync::Mutex<()>,
}

impl SummarySync {
    pub fn new(
        fetcher: Arc<dyn SummaryFetcher>,
        renderer: Arc<dyn Renderer>,
        settings: SettingsHandle,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            settings: Mutex::new(settings),
            cache: Arc::new(MemoryCache::default()),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn SnapshotCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Fetch the feed and, on success, notify (if warranted), persist and
    /// refresh the display.
    ///
    /// Never fails: a fetch error is logged and handed back in the outcome
    /// with all state left as it was. Overlapping calls run one at a time.
    pub async fn sync(&self, force_notify: bool) -> SyncOutcome {
        let _guard = self.in_flight.lock().await;

        let snapshot = match self.fetcher.fetch().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch daily summary");
                return SyncOutcome::Failed(err);
            }
        };

        let current = self.settings.lock().load();
        let notified = should_notify(
            current.show_new_cards_popup,
            current.last_fetched_snapshot.as_ref(),
            &snapshot,
            force_notify,
        );
        tracing::info!(
            previous = current
                .last_fetched_snapshot
                .as_ref()
                .map(|s| s.generated_at.as_str())
                .unwrap_or("none"),
            next = %snapshot.generated_at,
            force_notify,
            notified,
            "daily summary fetched"
        );

        if notified {
            self.renderer.show_notification(&snapshot).await;
        }

        let stored = snapshot.clone();
        let result = self.settings.lock().update(move |s| {
            s.last_fetched_snapshot = Some(stored);
            s.last_fetched_date = Some(Utc::now());
        });
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to persist fetched summary");
        }
        self.cache.put(snapshot);

        self.renderer.refresh_display();
        SyncOutcome::Updated { notified }
    }

    /// The snapshot to draw, hydrating the cache from the store on first use.
    pub fn display_snapshot(&self) -> Option<FeedSnapshot> {
        if let Some(snapshot) = self.cache.get() {
            return Some(snapshot);
        }
        let snapshot = self.settings.lock().load().last_fetched_snapshot?;
        self.cache.put(snapshot.clone());
        Some(snapshot)
    }

    pub fn settings(&self) -> PersistedSettings {
        self.settings.lock().load()
    }

    pub fn set_show_popup(&self, enabled: bool) -> Result<()> {
        self.settings
            .lock()
            .update(|s| s.show_new_cards_popup = enabled)?;
        tracing::info!(enabled, "popup preference changed");
        Ok(())
    }
}
