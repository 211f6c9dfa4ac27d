use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single playable entry of the playlist
///
/// `id` is derived from `url` alone, see [`super::id::derive`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub group: String,
    pub url: String,
    pub logo: Option<String>,
}

/// Point-in-time parsed view of a playlist document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSnapshot {
    pub channels: Vec<Channel>,
    pub categories: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

impl PlaylistSnapshot {
    #[must_use]
    pub fn new(channels: Vec<Channel>) -> Self {
        let categories = categories(&channels);
        Self {
            channels,
            categories,
            fetched_at: Utc::now(),
        }
    }

    /// Snapshot served when nothing could ever be fetched
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Looks up a channel by its unprefixed id
    ///
    /// Ids are truncated hashes, so two URLs may collide. The last channel
    /// carrying the id wins.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().rev().find(|c| c.id == id)
    }
}

/// Distinct non-empty groups, in first-seen order
#[must_use]
pub fn categories(channels: &[Channel]) -> Vec<String> {
    let mut seen = HashSet::new();
    channels
        .iter()
        .filter(|c| !c.group.is_empty())
        .filter(|c| seen.insert(c.group.as_str()))
        .map(|c| c.group.clone())
        .collect()
}
