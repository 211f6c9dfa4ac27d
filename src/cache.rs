use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::{Mutex, RwLock},
    time::Instant,
};
use tracing::{debug, info, instrument, warn};

use crate::playlist::{Fetcher, PlaylistSnapshot, parse_playlist};

pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// A snapshot along with where and until when it is valid
///
/// Entries are never mutated. A successful refresh swaps in a new one.
#[derive(Debug)]
pub struct CacheEntry {
    pub source: String,
    pub snapshot: Arc<PlaylistSnapshot>,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Refresh slot of one source. Callers queue on `lock`, `attempts` tells a
/// queued caller whether someone else already tried while it waited.
#[derive(Debug, Default)]
struct Flight {
    lock: Mutex<()>,
    attempts: AtomicU64,
}

/// Time-bounded cache of parsed playlists, keyed by source
///
/// Concurrent callers hitting an empty or expired entry share one fetch.
pub struct SnapshotCache<F> {
    fetcher: F,
    ttl: Duration,
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    flights: Mutex<HashMap<String, Arc<Flight>>>,
}

impl<F: Fetcher> SnapshotCache<F> {
    #[must_use]
    pub fn new(fetcher: F, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            entries: RwLock::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Current entry for `source`, expired or not
    pub async fn entry(&self, source: &str) -> Option<Arc<CacheEntry>> {
        self.entries.read().await.get(source).cloned()
    }

    /// Returns the snapshot for `source`, refreshing it when missing or expired
    ///
    /// Never fails. A failed refresh serves the previous snapshot, or an empty
    /// one when there never was a successful fetch.
    #[instrument(skip(self))]
    pub async fn get(&self, source: &str) -> Arc<PlaylistSnapshot> {
        // Read before the first freshness check, so an attempt finishing
        // in between is noticed once the lock is ours
        let flight = self.flight(source).await;
        let seen = flight.attempts.load(Ordering::Acquire);

        if let Some(entry) = self.fresh_entry(source).await {
            return entry.snapshot.clone();
        }

        let _guard = flight.lock.lock().await;

        if let Some(entry) = self.fresh_entry(source).await {
            debug!("Snapshot refreshed while waiting");
            return entry.snapshot.clone();
        }
        if flight.attempts.load(Ordering::Acquire) != seen {
            debug!("Refresh attempt failed while waiting, serving fallback");
            return self.fallback(source).await;
        }

        let snapshot = self.refresh(source).await;
        flight.attempts.fetch_add(1, Ordering::Release);
        snapshot
    }

    async fn fresh_entry(&self, source: &str) -> Option<Arc<CacheEntry>> {
        self.entry(source).await.filter(|e| e.is_fresh())
    }

    async fn flight(&self, source: &str) -> Arc<Flight> {
        self.flights
            .lock()
            .await
            .entry(source.to_string())
            .or_default()
            .clone()
    }

    async fn fallback(&self, source: &str) -> Arc<PlaylistSnapshot> {
        self.entry(source).await.map_or_else(
            || Arc::new(PlaylistSnapshot::empty()),
            |e| e.snapshot.clone(),
        )
    }

    async fn refresh(&self, source: &str) -> Arc<PlaylistSnapshot> {
        let body = match self.fetcher.fetch(source).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Unable to refresh playlist: {e}");
                return self.fallback(source).await;
            }
        };

        let snapshot = Arc::new(PlaylistSnapshot::new(parse_playlist(&body)));
        info!(
            "Cached {} channels in {} categories (fetched at {})",
            snapshot.channels.len(),
            snapshot.categories.len(),
            snapshot.fetched_at
        );

        let entry = Arc::new(CacheEntry {
            source: source.to_string(),
            snapshot: snapshot.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        debug!("Entry for {} valid until {:?}", entry.source, entry.expires_at);
        self.entries.write().await.insert(source.to_string(), entry);

        snapshot
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::VecDeque,
        sync::atomic::AtomicUsize,
    };

    use async_trait::async_trait;
    use futures_util::future::join_all;

    use super::*;
    use crate::playlist::FetchError;

    pub const SOURCE: &str = "http://example.com/playlist.m3u";

    pub const PLAYLIST: &str = "#EXTM3U\n\
        #EXTINF:-1 group-title=\"News\",BBC News\n\
        http://example.com/bbc.m3u8\n\
        #EXTINF:-1 group-title=\"Sports\",Sky Sports\n\
        http://example.com/ts/sky\n\
        #EXTINF:-1 group-title=\"News\",CNN\n\
        http://example.com/cnn.m3u8\n";

    /// Scripted [`Fetcher`] counting its invocations
    ///
    /// Pops one response per call and repeats the last one when the script
    /// runs out.
    #[derive(Default)]
    pub struct MockFetcher {
        pub calls: AtomicUsize,
        delay: Duration,
        script: std::sync::Mutex<VecDeque<Option<String>>>,
    }

    impl MockFetcher {
        pub fn new(script: impl IntoIterator<Item = Option<&'static str>>) -> Self {
            Self {
                script: std::sync::Mutex::new(
                    script.into_iter().map(|s| s.map(str::to_string)).collect(),
                ),
                ..Self::default()
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, _source: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front().flatten()
                } else {
                    script.front().cloned().flatten()
                }
            };
            tokio::time::sleep(self.delay).await;
            next.ok_or(FetchError::Timeout)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn serves_from_cache_within_ttl() {
        let cache = SnapshotCache::new(MockFetcher::new([Some(PLAYLIST)]), DEFAULT_TTL);

        let first = cache.get(SOURCE).await;
        tokio::time::advance(DEFAULT_TTL - Duration::from_secs(1)).await;
        let second = cache.get(SOURCE).await;

        assert_eq!(cache.fetcher.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.channels.len(), 3);
        assert_eq!(first.categories, ["News", "Sports"]);
    }

    #[tokio::test(start_paused = true)]
    async fn refetches_after_expiry() {
        let cache = SnapshotCache::new(MockFetcher::new([Some(PLAYLIST)]), DEFAULT_TTL);

        cache.get(SOURCE).await;
        tokio::time::advance(DEFAULT_TTL).await;
        cache.get(SOURCE).await;
        cache.get(SOURCE).await;

        assert_eq!(cache.fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_prior_snapshot_and_expiry() {
        let cache = SnapshotCache::new(MockFetcher::new([Some(PLAYLIST), None]), DEFAULT_TTL);

        let first = cache.get(SOURCE).await;
        let expires_at = cache.entry(SOURCE).await.unwrap().expires_at;

        tokio::time::advance(DEFAULT_TTL).await;
        let second = cache.get(SOURCE).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.entry(SOURCE).await.unwrap().expires_at, expires_at);

        // Still expired, so the next call retries
        cache.get(SOURCE).await;
        assert_eq!(cache.fetcher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_prior_snapshot_is_empty() {
        let cache = SnapshotCache::new(MockFetcher::new([None]), DEFAULT_TTL);

        let snapshot = cache.get(SOURCE).await;
        assert!(snapshot.channels.is_empty());
        assert!(snapshot.categories.is_empty());
        assert!(cache.entry(SOURCE).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_failure() {
        let cache = SnapshotCache::new(MockFetcher::new([None, Some(PLAYLIST)]), DEFAULT_TTL);

        assert!(cache.get(SOURCE).await.channels.is_empty());
        assert_eq!(cache.get(SOURCE).await.channels.len(), 3);
        assert_eq!(cache.fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_fetch() {
        let fetcher = MockFetcher::new([Some(PLAYLIST)]).with_delay(Duration::from_millis(100));
        let cache = SnapshotCache::new(fetcher, DEFAULT_TTL);

        let snapshots = join_all((0..10).map(|_| cache.get(SOURCE))).await;

        assert_eq!(cache.fetcher.calls(), 1);
        assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &snapshots[0])));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_failures_share_one_fetch() {
        let fetcher = MockFetcher::new([None]).with_delay(Duration::from_millis(100));
        let cache = SnapshotCache::new(fetcher, DEFAULT_TTL);

        let snapshots = join_all((0..5).map(|_| cache.get(SOURCE))).await;

        assert_eq!(cache.fetcher.calls(), 1);
        assert!(snapshots.iter().all(|s| s.channels.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_expired_refresh_shares_fallback() {
        let fetcher =
            MockFetcher::new([Some(PLAYLIST), None]).with_delay(Duration::from_millis(100));
        let cache = SnapshotCache::new(fetcher, DEFAULT_TTL);

        let prior = cache.get(SOURCE).await;
        tokio::time::advance(DEFAULT_TTL).await;

        let snapshots = join_all((0..8).map(|_| cache.get(SOURCE))).await;

        assert_eq!(cache.fetcher.calls(), 2);
        assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &prior)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_tasks_share_one_fetch() {
        let fetcher = MockFetcher::new([None]).with_delay(Duration::from_millis(50));
        let cache = Arc::new(SnapshotCache::new(fetcher, DEFAULT_TTL));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..32 {
            let cache = cache.clone();
            tasks.spawn(async move { cache.get(SOURCE).await });
        }
        let snapshots = tasks.join_all().await;

        assert_eq!(cache.fetcher.calls(), 1);
        assert!(snapshots.iter().all(|s| s.channels.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn sources_are_cached_separately() {
        let cache = SnapshotCache::new(MockFetcher::new([Some(PLAYLIST)]), DEFAULT_TTL);

        cache.get(SOURCE).await;
        cache.get("http://example.com/other.m3u").await;
        cache.get(SOURCE).await;

        assert_eq!(cache.fetcher.calls(), 2);
        assert_eq!(
            cache.entry("http://example.com/other.m3u").await.unwrap().source,
            "http://example.com/other.m3u"
        );
    }
}
