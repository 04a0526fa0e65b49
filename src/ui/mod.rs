pub mod app;
pub mod console;
pub mod widgets;

use crate::config::Config;
use crate::feeds::FeedSnapshot;
use crate::sync::{Renderer, SummarySync};
use anyhow::Result;
use app::{App, SyncOrigin};
use async_trait::async_trait;
use crossterm::{
    event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

pub enum UiEvent {
    Input(event::Event),
    Notify {
        snapshot: FeedSnapshot,
        ack: oneshot::Sender<()>,
    },
    Refresh,
    SyncFinished {
        origin: SyncOrigin,
        success: bool,
    },
}

/// Forwards the sync service's presentation calls to the UI loop.
pub struct TuiRenderer {
    events: mpsc::UnboundedSender<UiEvent>,
}

impl TuiRenderer {
    pub fn new(events: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Renderer for TuiRenderer {
    async fn show_notification(&self, snapshot: &FeedSnapshot) {
        let (ack, acknowledged) = oneshot::channel();
        let event = UiEvent::Notify {
            snapshot: snapshot.clone(),
            ack,
        };
        if self.events.send(event).is_err() {
            return;
        }
        // An Err here means the UI went away before the user answered.
        let _ = acknowledged.await;
    }

    fn refresh_display(&self) {
        let _ = self.events.send(UiEvent::Refresh);
    }
}

pub async fn run(
    config: Config,
    service: Arc<SummarySync>,
    events_tx: mpsc::UnboundedSender<UiEvent>,
    events_rx: mpsc::UnboundedReceiver<UiEvent>,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    spawn_input_reader(events_tx.clone());
    let mut app = App::new(config.clone(), service, events_tx);
    let result = event_loop(&mut terminal, &mut app, &config, events_rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // The event receiver is gone, so a notification from a late sync returns
    // at once and the sync goes on to persist.
    app.wait_for_syncs().await;

    result
}

fn spawn_input_reader(events: mpsc::UnboundedSender<UiEvent>) {
    tokio::task::spawn_blocking(move || {
        while !events.is_closed() {
            match event::poll(Duration::from_millis(200)) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if events.send(UiEvent::Input(ev)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "terminal input failed");
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(error = %e, "terminal poll failed");
                    break;
                }
            }
        }
    });
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    config: &Config,
    mut events: mpsc::UnboundedReceiver<UiEvent>,
) -> Result<()> {
    // The host's "application ready" moment.
    app.spawn_sync(SyncOrigin::Startup);

    let mut tick = tokio::time::interval(Duration::from_millis(250));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut auto_refresh = config.ui.auto_refresh_period().map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval
    });

    let mut needs_redraw = true;
    loop {
        if needs_redraw {
            terminal.draw(|f| app.draw(f))?;
        }
        if app.should_quit() {
            break;
        }

        tokio::select! {
            Some(event) = events.recv() => {
                needs_redraw = app.handle_event(event);
            }
            _ = tick.tick() => {
                needs_redraw = app.tick(Instant::now());
            }
            _ = next_auto_refresh(&mut auto_refresh) => {
                tracing::debug!("periodic refresh");
                app.spawn_sync(SyncOrigin::Timer);
                needs_redraw = false;
            }
        }
    }

    Ok(())
}

async fn next_auto_refresh(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
