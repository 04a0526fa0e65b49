use super::widgets::popup::NotificationPopup;
use super::widgets::summary::SummaryDrawer;
use super::UiEvent;
use crate::config::Config;
use crate::feeds::FeedSnapshot;
use crate::settings::PersistedSettings;
use crate::sync::SummarySync;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tokio::task::JoinHandle;

/// Who asked for a sync, so the result lands on the right affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOrigin {
    Startup,
    Timer,
    Button,
    Force,
}

/// The drawer's refresh button. Presses are ignored unless idle; a settled
/// result reverts to idle after the hold period whatever the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshButton {
    Idle,
    Refreshing,
    Settled { succeeded: bool, until: Instant },
}

impl RefreshButton {
    pub fn label(&self) -> &'static str {
        match self {
            RefreshButton::Idle => "Refresh Now",
            RefreshButton::Refreshing => "Refreshing...",
            RefreshButton::Settled { succeeded: true, .. } => "Refreshed!",
            RefreshButton::Settled {
                succeeded: false, ..
            } => "Failed",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, RefreshButton::Idle)
    }

    /// Returns false if the button was busy.
    pub fn press(&mut self) -> bool {
        if !self.is_idle() {
            return false;
        }
        *self = RefreshButton::Refreshing;
        true
    }

    pub fn finish(&mut self, succeeded: bool, now: Instant, hold: Duration) {
        *self = RefreshButton::Settled {
            succeeded,
            until: now + hold,
        };
    }

    /// Returns true if the label changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match *self {
            RefreshButton::Settled { until, .. } if now >= until => {
                *self = RefreshButton::Idle;
                true
            }
            _ => false,
        }
    }
}

struct PendingNotification {
    snapshot: FeedSnapshot,
    ack: Option<oneshot::Sender<()>>,
}

pub struct App {
    service: Arc<SummarySync>,
    config: Config,
    events: UnboundedSender<UiEvent>,
    snapshot: Option<FeedSnapshot>,
    settings: PersistedSettings,
    drawer_open: bool,
    button: RefreshButton,
    notification: Option<PendingNotification>,
    status: Option<String>,
    should_quit: bool,
    syncs: Vec<JoinHandle<()>>,
}

impl App {
    pub fn new(config: Config, service: Arc<SummarySync>, events: UnboundedSender<UiEvent>) -> Self {
        let snapshot = service.display_snapshot();
        let settings = service.settings();
        Self {
            service,
            config,
            events,
            snapshot,
            settings,
            drawer_open: true,
            button: RefreshButton::Idle,
            notification: None,
            status: None,
            should_quit: false,
            syncs: Vec::new(),
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn button(&self) -> RefreshButton {
        self.button
    }

    pub fn has_notification(&self) -> bool {
        self.notification.is_some()
    }

    /// Run a sync in the background; the outcome comes back as
    /// [`UiEvent::SyncFinished`].
    pub fn spawn_sync(&mut self, origin: SyncOrigin) {
        let service = self.service.clone();
        let events = self.events.clone();
        let force = origin == SyncOrigin::Force;
        self.syncs.retain(|handle| !handle.is_finished());
        self.syncs.push(tokio::spawn(async move {
            let outcome = service.sync(force).await;
            let _ = events.send(UiEvent::SyncFinished {
                origin,
                success: outcome.is_success(),
            });
        }));
    }

    /// Wait for every sync started so far, so a fetched snapshot is persisted
    /// before the process exits.
    pub async fn wait_for_syncs(&mut self) {
        // A sync blocked on an open popup would never finish otherwise.
        self.dismiss_notification();
        let pending: Vec<_> = self.syncs.drain(..).collect();
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "waiting for running syncs");
        }
        for handle in pending {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "sync task failed");
            }
        }
    }

    /// Returns true when a redraw is needed.
    pub fn handle_event(&mut self, event: UiEvent) -> bool {
        match event {
            UiEvent::Input(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.handle_key(key);
                true
            }
            UiEvent::Input(Event::Resize(_, _)) => true,
            UiEvent::Input(_) => false,
            UiEvent::Notify { snapshot, ack } => {
                self.notification = Some(PendingNotification {
                    snapshot,
                    ack: Some(ack),
                });
                true
            }
            UiEvent::Refresh => {
                self.snapshot = self.service.display_snapshot();
                self.settings = self.service.settings();
                true
            }
            UiEvent::SyncFinished { origin, success } => {
                match origin {
                    SyncOrigin::Button => self.button.finish(
                        success,
                        Instant::now(),
                        Duration::from_millis(self.config.ui.button_reset_ms),
                    ),
                    SyncOrigin::Force => {
                        self.status = Some(if success {
                            "Sync complete".to_string()
                        } else {
                            "Sync failed, showing cached data".to_string()
                        });
                    }
                    SyncOrigin::Startup | SyncOrigin::Timer => {}
                }
                true
            }
        }
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        self.button.tick(now)
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.dismiss_notification();
            self.should_quit = true;
            return;
        }

        if self.notification.is_some() {
            match key.code {
                KeyCode::Enter | KeyCode::Esc | KeyCode::Char('g') => self.dismiss_notification(),
                KeyCode::Char('o') => self.open_link(true),
                KeyCode::Char('t') => self.open_link(false),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('r') => {
                if self.button.press() {
                    self.spawn_sync(SyncOrigin::Button);
                }
            }
            KeyCode::Char('f') => {
                self.status = Some("Forcing sync...".to_string());
                self.spawn_sync(SyncOrigin::Force);
            }
            KeyCode::Char('p') => self.toggle_popup_preference(),
            KeyCode::Enter | KeyCode::Char('d') => self.drawer_open = !self.drawer_open,
            KeyCode::Char('o') => self.open_link(true),
            KeyCode::Char('t') => self.open_link(false),
            _ => {}
        }
    }

    fn dismiss_notification(&mut self) {
        if let Some(mut pending) = self.notification.take() {
            if let Some(ack) = pending.ack.take() {
                let _ = ack.send(());
            }
        }
    }

    fn toggle_popup_preference(&mut self) {
        let enabled = !self.settings.show_new_cards_popup;
        match self.service.set_show_popup(enabled) {
            Ok(()) => self.status = None,
            Err(e) => {
                tracing::error!(error = %e, "failed to save popup preference");
                self.status = Some(format!("Could not save setting: {}", e));
            }
        }
        self.settings = self.service.settings();
    }

    fn open_link(&mut self, latest: bool) {
        let url = if latest {
            &self.config.feed.latest_url
        } else {
            &self.config.feed.trending_url
        };
        if let Err(e) = open::that(url) {
            tracing::warn!(url = %url, error = %e, "failed to open browser");
            self.status = Some(format!("Could not open {}", url));
        }
    }

    pub fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(area);

        let drawer = SummaryDrawer {
            snapshot: self.snapshot.as_ref(),
            settings: &self.settings,
            button_label: self.button.label(),
            button_idle: self.button.is_idle(),
            expanded: self.drawer_open,
        };
        drawer.render(frame, chunks[0]);

        let footer = match &self.status {
            Some(status) => Line::from(Span::styled(
                status.as_str(),
                Style::default().fg(Color::Yellow),
            )),
            None => Line::from(Span::styled(
                "q quit | r refresh | f force sync | p popup | o/t open | Enter drawer",
                Style::default().fg(Color::DarkGray),
            )),
        };
        frame.render_widget(Paragraph::new(footer), chunks[1]);

        if let Some(pending) = &self.notification {
            NotificationPopup {
                snapshot: &pending.snapshot,
            }
            .render(frame, area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::{FetchError, SummaryFetcher};
    use crate::settings::{MemoryStore, SettingsHandle};
    use crate::sync::Renderer;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct OfflineFetcher;

    #[async_trait]
    impl SummaryFetcher for OfflineFetcher {
        async fn fetch(&self) -> Result<FeedSnapshot, FetchError> {
            Err(FetchError::HttpStatus(503))
        }
    }

    struct SlowFetcher;

    #[async_trait]
    impl SummaryFetcher for SlowFetcher {
        async fn fetch(&self) -> Result<FeedSnapshot, FetchError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(snapshot())
        }
    }

    struct NullRenderer;

    #[async_trait]
    impl Renderer for NullRenderer {
        async fn show_notification(&self, _snapshot: &FeedSnapshot) {}
        fn refresh_display(&self) {}
    }

    fn snapshot() -> FeedSnapshot {
        FeedSnapshot {
            generated_at: "2024-01-02".to_string(),
            summary: "S".to_string(),
            cards: Vec::new(),
            trending_summary: None,
            trending_cards: None,
        }
    }

    fn app() -> (App, mpsc::UnboundedReceiver<UiEvent>, MemoryStore) {
        app_with(Arc::new(OfflineFetcher))
    }

    fn app_with(
        fetcher: Arc<dyn SummaryFetcher>,
    ) -> (App, mpsc::UnboundedReceiver<UiEvent>, MemoryStore) {
        let store = MemoryStore::new();
        let handle = SettingsHandle::open(Box::new(store.clone()), "aiCharacterCards").unwrap();
        let service = Arc::new(SummarySync::new(fetcher, Arc::new(NullRenderer), handle));
        let (tx, rx) = mpsc::unbounded_channel();
        (App::new(Config::default(), service, tx), rx, store)
    }

    fn key(code: KeyCode) -> UiEvent {
        UiEvent::Input(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    #[test]
    fn test_refresh_button_cycle() {
        let mut button = RefreshButton::Idle;
        assert_eq!(button.label(), "Refresh Now");
        assert!(button.press());
        assert_eq!(button.label(), "Refreshing...");
        assert!(!button.press());

        let now = Instant::now();
        let hold = Duration::from_millis(1500);
        button.finish(true, now, hold);
        assert_eq!(button.label(), "Refreshed!");
        assert!(!button.press());
        assert!(!button.tick(now + Duration::from_millis(1499)));
        assert!(button.tick(now + hold));
        assert!(button.is_idle());
    }

    #[test]
    fn test_refresh_button_failure_reverts_too() {
        let mut button = RefreshButton::Refreshing;
        let now = Instant::now();
        button.finish(false, now, Duration::from_millis(10));
        assert_eq!(button.label(), "Failed");
        assert!(button.tick(now + Duration::from_millis(10)));
        assert_eq!(button.label(), "Refresh Now");
    }

    #[tokio::test]
    async fn test_refresh_key_reports_failure_on_button() {
        let (mut app, mut rx, _) = app();
        app.handle_event(key(KeyCode::Char('r')));
        assert_eq!(app.button(), RefreshButton::Refreshing);

        // A second press while busy does not start another sync.
        app.handle_event(key(KeyCode::Char('r')));

        let finished = rx.recv().await.unwrap();
        assert!(matches!(
            finished,
            UiEvent::SyncFinished {
                origin: SyncOrigin::Button,
                success: false
            }
        ));
        app.handle_event(finished);
        assert_eq!(app.button().label(), "Failed");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_quit_waits_for_running_sync_to_persist() {
        let (mut app, rx, store) = app_with(Arc::new(SlowFetcher));
        let before = store.persist_count();
        app.handle_event(key(KeyCode::Char('r')));
        app.handle_event(key(KeyCode::Char('q')));
        assert!(app.should_quit());

        // The UI loop has gone away by the time we wait.
        drop(rx);
        app.wait_for_syncs().await;

        assert!(app.syncs.is_empty());
        assert_eq!(store.persist_count(), before + 1);
        let stored = app.service.settings();
        assert_eq!(
            stored.last_fetched_snapshot.map(|s| s.generated_at).as_deref(),
            Some("2024-01-02")
        );
        assert!(stored.last_fetched_date.is_some());
    }

    #[tokio::test]
    async fn test_finished_syncs_are_not_kept() {
        let (mut app, mut rx, _) = app();
        app.spawn_sync(SyncOrigin::Startup);
        assert!(rx.recv().await.is_some());
        while !app.syncs[0].is_finished() {
            tokio::task::yield_now().await;
        }

        app.spawn_sync(SyncOrigin::Timer);
        assert_eq!(app.syncs.len(), 1);
        app.wait_for_syncs().await;
        assert!(app.syncs.is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_syncs_releases_open_popup() {
        let (mut app, _rx, _) = app();
        let (ack, done) = oneshot::channel();
        app.handle_event(UiEvent::Notify {
            snapshot: snapshot(),
            ack,
        });
        app.wait_for_syncs().await;
        assert!(!app.has_notification());
        assert!(done.await.is_ok());
    }

    #[tokio::test]
    async fn test_dismissing_popup_acknowledges() {
        let (mut app, _rx, _) = app();
        let (ack, done) = oneshot::channel();
        app.handle_event(UiEvent::Notify {
            snapshot: snapshot(),
            ack,
        });
        assert!(app.has_notification());

        // Quit is not available while the popup is open.
        app.handle_event(key(KeyCode::Char('q')));
        assert!(!app.should_quit());

        app.handle_event(key(KeyCode::Enter));
        assert!(!app.has_notification());
        assert!(done.await.is_ok());
    }

    #[test]
    fn test_toggle_popup_preference_persists() {
        let (mut app, _rx, store) = app();
        let before = store.persist_count();
        app.handle_event(key(KeyCode::Char('p')));
        assert!(app.settings.show_new_cards_popup);
        assert_eq!(store.persist_count(), before + 1);

        app.handle_event(key(KeyCode::Char('p')));
        assert!(!app.settings.show_new_cards_popup);
    }

    #[test]
    fn test_quit_and_drawer_keys() {
        let (mut app, _rx, _) = app();
        assert!(app.drawer_open);
        app.handle_event(key(KeyCode::Char('d')));
        assert!(!app.drawer_open);
        app.handle_event(key(KeyCode::Char('q')));
        assert!(app.should_quit());
    }
}
