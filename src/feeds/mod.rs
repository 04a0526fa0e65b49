pub mod daily_summary;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Number of cards shown per section, in the drawer and in the popup.
pub const MAX_BANNER_CARDS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub thumbnail: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
}

/// One payload of the daily summary feed. Replaced wholesale on every
/// successful fetch, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub generated_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cards: Vec<CardRef>,
    #[serde(default)]
    pub trending_summary: Option<String>,
    #[serde(default)]
    pub trending_cards: Option<Vec<CardRef>>,
}

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl FeedSnapshot {
    /// `generated_at` is an opaque token: any difference counts as new data.
    pub fn differs_from(&self, previous: &FeedSnapshot) -> bool {
        self.generated_at != previous.generated_at
    }

    pub fn latest_cards(&self) -> &[CardRef] {
        let end = self.cards.len().min(MAX_BANNER_CARDS);
        &self.cards[..end]
    }

    /// The trending section, if the feed carried both a summary and at least
    /// one card for it.
    pub fn trending(&self) -> Option<TrendingSection<'_>> {
        let summary = self.trending_summary.as_deref().filter(|s| !s.is_empty())?;
        let cards = self.trending_cards.as_deref().filter(|c| !c.is_empty())?;
        let end = cards.len().min(MAX_BANNER_CARDS);
        Some(TrendingSection {
            summary,
            cards: &cards[..end],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendingSection<'a> {
    pub summary: &'a str,
    pub cards: &'a [CardRef],
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("feed reported success=false")]
    Unsuccessful,
    #[error("feed response carried no data payload")]
    MissingData,
}

#[async_trait]
pub trait SummaryFetcher: Send + Sync {
    async fn fetch(&self) -> Result<FeedSnapshot, FetchError>;
}
