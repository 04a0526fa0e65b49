use super::widgets::popup::POPUP_HEADLINE;
use super::widgets::summary::{plain_text, summary_lines};
use crate::feeds::FeedSnapshot;
use crate::settings::PersistedSettings;
use crate::sync::Renderer;
use async_trait::async_trait;
use chrono::Local;

/// Renderer for the headless commands: the notification is printed and
/// counts as acknowledged once written.
#[derive(Debug, Default)]
pub struct ConsoleRenderer;

#[async_trait]
impl Renderer for ConsoleRenderer {
    async fn show_notification(&self, snapshot: &FeedSnapshot) {
        println!("{}\n", POPUP_HEADLINE);
        println!("{}", snapshot_text(Some(snapshot)));
    }

    fn refresh_display(&self) {
        tracing::debug!("no display to refresh in console mode");
    }
}

pub fn snapshot_text(snapshot: Option<&FeedSnapshot>) -> String {
    plain_text(&summary_lines(snapshot)).trim_end().to_string()
}

/// The `show` command's output.
pub fn status_text(settings: &PersistedSettings, snapshot: Option<&FeedSnapshot>) -> String {
    let last_fetched = settings
        .last_fetched_date
        .map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());
    let popup = if settings.show_new_cards_popup {
        "on"
    } else {
        "off"
    };

    let mut out = format!("Last fetched: {}\nNew cards popup: {}\n", last_fetched, popup);
    if let Some(snapshot) = snapshot {
        out.push_str(&format!("Generated at: {}\n", snapshot.generated_at));
    }
    out.push('\n');
    out.push_str(&snapshot_text(snapshot));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::CardRef;
    use crate::ui::widgets::summary::EMPTY_TEXT;

    #[test]
    fn test_status_text_without_data() {
        let text = status_text(&PersistedSettings::default(), None);
        assert!(text.contains("Last fetched: never"));
        assert!(text.contains("New cards popup: off"));
        assert!(text.ends_with(EMPTY_TEXT));
    }

    #[test]
    fn test_status_text_with_data() {
        let snapshot = FeedSnapshot {
            generated_at: "2024-01-01".to_string(),
            summary: "Two new cards".to_string(),
            cards: vec![CardRef {
                thumbnail: "https://img/1.png".to_string(),
                title: "Knight".to_string(),
            }],
            trending_summary: None,
            trending_cards: None,
        };
        let settings = PersistedSettings {
            show_new_cards_popup: true,
            last_fetched_snapshot: Some(snapshot.clone()),
            last_fetched_date: Some(chrono::Utc::now()),
        };
        let text = status_text(&settings, Some(&snapshot));
        assert!(text.contains("New cards popup: on"));
        assert!(text.contains("Generated at: 2024-01-01"));
        assert!(text.contains("Knight"));
        assert!(text.contains("Two new cards"));
        assert!(!text.contains("never"));
    }
}
