//! The background cache: persistent entries plus live display handles

use crate::attribution::Attribution;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::handles::{DisplayHandle, HandleRegistry, DEFAULT_HANDLE_BASE};
use crate::normalize::{BlobNormalizer, HttpImageFetcher, ImageFetcher};
use crate::policy::{is_stale, ExpiryRule};
use crate::render::{Container, DiscardLocation, LocationNotifier, LogHints, UiHints};
use crate::settings::{last_changed_key, ScheduleSettings, SettingsMap, SettingsStore};
use crate::store::BackgroundStore;
use crate::types::{CacheEntry, CacheStats, CachedBackground, ImageBlob, ImageInput, Source};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Persistent background cache with schedule-driven expiration
pub struct BackgroundCache {
    store: BackgroundStore,
    normalizer: BlobNormalizer,
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn LocationNotifier>,
    hints: Arc<dyn UiHints>,
    /// Live display handles, one per source
    handles: RwLock<HandleRegistry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BackgroundCache {
    /// Create a cache backed by the database at `db_path`. The store is not
    /// opened until first use.
    pub fn new(db_path: impl Into<PathBuf>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            store: BackgroundStore::new(db_path),
            normalizer: BlobNormalizer::new(Arc::new(HttpImageFetcher::new())),
            settings,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(DiscardLocation),
            hints: Arc::new(LogHints),
            handles: RwLock::new(HandleRegistry::new(DEFAULT_HANDLE_BASE)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.normalizer = BlobNormalizer::new(fetcher);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn LocationNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_hints(mut self, hints: Arc<dyn UiHints>) -> Self {
        self.hints = hints;
        self
    }

    /// Prefix for minted handles, e.g. a route that serves them
    pub fn with_handle_base(mut self, base: impl Into<String>) -> Self {
        self.handles = RwLock::new(HandleRegistry::new(base));
        self
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    /// Open the persistent store. Safe to call repeatedly and concurrently.
    pub async fn init(&self) -> Result<()> {
        self.store.init().await.map(|_| ())
    }

    /// Normalize `image` and store it as the entry for `source`.
    ///
    /// Returns `false` on any failure; errors are logged, never returned.
    pub async fn cache_background(
        &self,
        source: Source,
        metadata: Value,
        image: impl Into<ImageInput>,
    ) -> bool {
        match self.try_cache_background(source, metadata, image.into()).await {
            Ok(()) => true,
            Err(e) => {
                error!(source = %source, error = %e, "Failed to cache background");
                false
            }
        }
    }

    async fn try_cache_background(
        &self,
        source: Source,
        metadata: Value,
        image: ImageInput,
    ) -> Result<()> {
        self.store.init().await?;
        let image = self.normalizer.normalize(image).await?;

        let now = self.clock.now_millis();
        let entry = CacheEntry {
            source,
            metadata,
            image,
            timestamp: now,
        };
        self.store.upsert(&entry).await?;

        // The old blob is gone; its handle must not outlive it
        self.handles.write().await.revoke(source);

        let mut changed = SettingsMap::new();
        changed.insert(last_changed_key(source), Value::from(now));
        if let Err(e) = self.settings.set(changed).await {
            warn!(source = %source, error = %e, "Failed to record last change time");
        }

        info!(source = %source, size = entry.image.len(), "Cached background");
        Ok(())
    }

    /// Load the entry for `source` together with a live display handle.
    pub async fn get_background(&self, source: Source) -> Result<Option<CachedBackground>> {
        let cached = match self.store.get(source).await? {
            Some(entry) => self.attach_handle(entry).await?,
            None => None,
        };

        if cached.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(source = %source, "No cached background");
        }
        Ok(cached)
    }

    /// Pair `entry` with a live handle. The entry is re-read while a newer
    /// write has replaced it, so a handle never wraps a superseded blob.
    async fn attach_handle(&self, mut entry: CacheEntry) -> Result<Option<CachedBackground>> {
        loop {
            let mut handles = self.handles.write().await;
            match self.store.timestamp(entry.source).await? {
                Some(current) if current == entry.timestamp => {
                    let handle = handles.acquire(entry.source, entry.timestamp, &entry.image);
                    return Ok(Some(CachedBackground { entry, handle }));
                }
                Some(_) => drop(handles),
                None => return Ok(None),
            }

            debug!(source = %entry.source, "Entry replaced during read, reloading");
            entry = match self.store.get(entry.source).await? {
                Some(entry) => entry,
                None => return Ok(None),
            };
        }
    }

    /// Whether the provider for `source` should fetch a new image.
    ///
    /// Errors count as expired.
    pub async fn is_expired(&self, source: Source, max_age: Duration) -> bool {
        let settings = match ScheduleSettings::load(self.settings.as_ref()).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(source = %source, error = %e, "Failed to read schedule, treating as expired");
                return true;
            }
        };

        match ExpiryRule::for_source(source, &settings) {
            ExpiryRule::Never => false,
            ExpiryRule::Always => true,
            ExpiryRule::RotateGallery => {
                self.handles.write().await.revoke(source);
                self.hints.suppress_stale_flash(source);
                true
            }
            ExpiryRule::MaxAge => match self.store.timestamp(source).await {
                Ok(written_at) => is_stale(written_at, self.clock.now_millis(), max_age),
                Err(e) => {
                    warn!(source = %source, error = %e, "Failed to read entry age, treating as expired");
                    true
                }
            },
        }
    }

    /// Render the cached background for `source` into `container`.
    ///
    /// Returns `false` when nothing is cached or rendering failed; the caller
    /// is expected to fetch a fresh image.
    pub async fn apply_background(&self, source: Source, container: &mut dyn Container) -> bool {
        let cached = match self.get_background(source).await {
            Ok(Some(cached)) => cached,
            Ok(None) => return false,
            Err(e) => {
                error!(source = %source, error = %e, "Failed to read cached background");
                return false;
            }
        };

        let attribution = Attribution::from_metadata(source, &cached.entry.metadata);
        let alt = attribution
            .as_ref()
            .map(|a| a.location_info().text)
            .unwrap_or_else(|| format!("{} background", source));

        container.clear();
        if let Err(e) = container.append_image(&cached.handle, &alt) {
            warn!(source = %source, error = %e, "Failed to render cached background");
            container.show_error("Failed to load cached background");
            return false;
        }

        if let Some(attribution) = attribution {
            let info = attribution.location_info();
            self.notifier.notify_location(
                &info.text,
                info.link_url.as_deref(),
                info.link_label.as_deref(),
            );
        }

        debug!(source = %source, handle = %cached.handle, "Applied cached background");
        true
    }

    /// Remove every entry, then release every live handle.
    ///
    /// On failure the handles are left untouched and `false` is returned.
    pub async fn clear_all(&self) -> bool {
        match self.store.clear().await {
            Ok(removed) => {
                let released = self.handles.write().await.revoke_all();
                info!(removed, released, "Cleared background cache");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to clear background cache");
                false
            }
        }
    }

    /// Blob behind a live handle, if it has not been revoked
    pub async fn resolve_handle(&self, handle: &str) -> Option<Arc<ImageBlob>> {
        self.handles.read().await.resolve(handle)
    }

    /// Live handle for `source`, without touching the store
    pub async fn live_handle(&self, source: Source) -> Option<DisplayHandle> {
        self.handles.read().await.live(source).cloned()
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let (entries, total_bytes) = self.store.totals().await?;
        Ok(CacheStats {
            entries,
            total_bytes,
            live_handles: self.handles.read().await.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }

    /// Cached sources, oldest first
    pub async fn sources_by_age(&self) -> Result<Vec<(Source, i64)>> {
        self.store.sources_by_age().await
    }
}
