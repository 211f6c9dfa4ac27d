use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, instrument};

use crate::{
    cache::SnapshotCache,
    playlist::{Channel, Fetcher, PlaylistSnapshot},
};

pub mod structs;

pub use structs::{BehaviorHints, CatalogEntry, ProxyHeaders, StreamDescriptor};

/// Prefix of every channel id handed out to clients
pub const ID_NAMESPACE: &str = "yiptvM3U:";
/// The only media kind this catalog serves
pub const SUPPORTED_KIND: &str = "tv";

const POSTER_SHAPE: &str = "square";

/// Sent along the primary stream, some upstreams refuse non-browser clients
const PLAYBACK_HEADERS: [(&str, &str); 5] = [
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    ),
    ("Accept", "*/*"),
    ("Accept-Language", "en-US,en;q=0.9"),
    ("Accept-Encoding", "gzip, deflate"),
    ("Connection", "keep-alive"),
];

/// Removes [`ID_NAMESPACE`] from a client supplied id, if present
#[must_use]
pub fn strip_namespace(id: &str) -> &str {
    id.strip_prefix(ID_NAMESPACE).unwrap_or(id)
}

/// Answers catalog and stream queries for one playlist source
pub struct Catalog<F> {
    cache: Arc<SnapshotCache<F>>,
    source: String,
}

impl<F: Fetcher> Catalog<F> {
    #[must_use]
    pub fn new(cache: Arc<SnapshotCache<F>>, source: impl Into<String>) -> Self {
        Self {
            cache,
            source: source.into(),
        }
    }

    /// Distinct channel categories, used to fill the genre filter
    pub async fn categories(&self) -> Vec<String> {
        self.cache.get(&self.source).await.categories.clone()
    }

    /// Channels of `genre`, in playlist order
    ///
    /// Empty when `kind` is not [`SUPPORTED_KIND`].
    #[instrument(skip(self))]
    pub async fn list_by_category(&self, kind: &str, genre: &str) -> Vec<CatalogEntry> {
        if kind != SUPPORTED_KIND {
            debug!("Unsupported kind");
            return Vec::new();
        }

        let snapshot = self.cache.get(&self.source).await;
        catalog_entries(&snapshot, genre)
    }

    /// Playable variants of the channel with the unprefixed `id`
    ///
    /// Empty when `kind` is not [`SUPPORTED_KIND`] or no such channel exists.
    #[instrument(skip(self))]
    pub async fn streams_for(&self, kind: &str, id: &str) -> Vec<StreamDescriptor> {
        if kind != SUPPORTED_KIND {
            debug!("Unsupported kind");
            return Vec::new();
        }

        let snapshot = self.cache.get(&self.source).await;
        let Some(channel) = snapshot.find(id) else {
            debug!("Unknown channel id");
            return Vec::new();
        };

        let streams = stream_descriptors(channel);
        debug!("Returning {} streams for {}", streams.len(), channel.name);
        streams
    }
}

fn catalog_entries(snapshot: &PlaylistSnapshot, genre: &str) -> Vec<CatalogEntry> {
    snapshot
        .channels
        .iter()
        .filter(|c| c.group == genre)
        .map(|c| CatalogEntry {
            id: format!("{ID_NAMESPACE}{}", c.id),
            kind: SUPPORTED_KIND.to_string(),
            name: c.name.clone(),
            poster: c.logo.clone(),
            poster_shape: POSTER_SHAPE.to_string(),
        })
        .collect()
}

fn is_transport_stream(url: &str) -> bool {
    url.contains(".ts") || url.contains("/ts/")
}

/// Ordered alternatives for one channel: primary, transport stream (when
/// the URL looks like one), direct
fn stream_descriptors(channel: &Channel) -> Vec<StreamDescriptor> {
    let request = PLAYBACK_HEADERS
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect::<BTreeMap<_, _>>();

    let mut streams = vec![StreamDescriptor {
        name: "Primary Stream".to_string(),
        title: channel.name.clone(),
        url: channel.url.clone(),
        kind: None,
        is_live: false,
        behavior_hints: BehaviorHints {
            not_web_ready: true,
            proxy_headers: Some(ProxyHeaders { request }),
            binge_group: None,
        },
    }];

    if is_transport_stream(&channel.url) {
        streams.push(StreamDescriptor {
            name: "MPEG-TS Stream".to_string(),
            title: format!("{} (TS)", channel.name),
            url: channel.url.clone(),
            kind: Some(SUPPORTED_KIND.to_string()),
            is_live: true,
            behavior_hints: BehaviorHints {
                not_web_ready: true,
                proxy_headers: None,
                binge_group: Some(format!("{SUPPORTED_KIND}-{}", channel.id)),
            },
        });
    }

    streams.push(StreamDescriptor {
        name: "Direct".to_string(),
        title: format!("{} (Direct)", channel.name),
        url: channel.url.clone(),
        kind: None,
        is_live: false,
        behavior_hints: BehaviorHints {
            not_web_ready: true,
            ..BehaviorHints::default()
        },
    });

    streams
}
