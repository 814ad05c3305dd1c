//! Texture cache keyed by (path, premultiply flag)
//!
//! Loads are deduplicated: a key that is already cached re-decodes into its
//! existing backend handle instead of allocating a second one.
//!
//! Every successful [`TextureCache::get`] takes one reference on the entry and
//! the caller owns that reference. Models sharing a cache give theirs back with
//! [`TextureCache::release_handle`]; the backend handle is freed when the last
//! reference goes. [`TextureCache::release`], [`TextureCache::release_path`] and
//! [`TextureCache::release_all`] free entries outright, whoever still holds them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::fetcher::{fetch_bytes, ResourceFetcher};
use super::texture::{DecodedImage, TextureBackend, TextureError, TextureId, TextureInfo};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub path: String,
    pub premultiply: bool,
}

impl TextureKey {
    pub fn new(path: impl Into<String>, premultiply: bool) -> Self {
        Self {
            path: path.into(),
            premultiply,
        }
    }
}

/// Cache performance statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub allocations: u64,
    pub releases: u64,
    pub cache_entries: usize,
}

impl CacheStats {
    /// Cache hit ratio as a percentage
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    info: TextureInfo,
    refs: usize,
}

pub struct TextureCache {
    entries: RwLock<HashMap<TextureKey, CacheEntry>>,
    fetcher: Arc<dyn ResourceFetcher>,
    backend: Arc<dyn TextureBackend>,
    stats: RwLock<CacheStats>,
}

impl std::fmt::Debug for TextureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCache").finish_non_exhaustive()
    }
}

impl TextureCache {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, backend: Arc<dyn TextureBackend>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fetcher,
            backend,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Load `path` with the requested alpha mode, reusing the cached handle for the key if present
    pub async fn get(&self, path: &str, premultiply: bool) -> Result<TextureInfo, TextureError> {
        let key = TextureKey::new(path, premultiply);

        let cached = self.entries.read().await.contains_key(&key);
        {
            let mut stats = self.stats.write().await;
            if cached {
                stats.hits += 1;
                debug!("📋 Texture cache HIT for {} (premultiply: {})", path, premultiply);
            } else {
                stats.misses += 1;
                debug!("📋 Texture cache MISS for {} (premultiply: {})", path, premultiply);
            }
        }

        let bytes = fetch_bytes(self.fetcher.as_ref(), path).await?;
        if bytes.is_empty() {
            return Err(TextureError::NotFound(path.to_string()));
        }
        let image = DecodedImage::decode(&bytes, premultiply)?;

        // Another load of the same key may have finished while this one was decoding
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(&key) {
            self.backend.upload(entry.info.id, &image)?;
            entry.info.width = image.width;
            entry.info.height = image.height;
            entry.refs += 1;
            return Ok(entry.info.clone());
        }

        let id = self.backend.create_texture(&image)?;
        let info = TextureInfo {
            id,
            path: path.to_string(),
            width: image.width,
            height: image.height,
            premultiplied: premultiply,
        };
        entries.insert(
            key,
            CacheEntry {
                info: info.clone(),
                refs: 1,
            },
        );

        let mut stats = self.stats.write().await;
        stats.allocations += 1;
        stats.cache_entries = entries.len();
        Ok(info)
    }

    /// Free the entry for `key`; returns false if it was not cached
    pub async fn release(&self, key: &TextureKey) -> bool {
        let mut entries = self.entries.write().await;
        let released = match entries.remove(key) {
            Some(entry) => {
                self.backend.delete_texture(entry.info.id);
                true
            }
            None => false,
        };
        self.record_releases(released as usize, entries.len()).await;
        released
    }

    /// Free every entry cached for `path`, in either alpha mode
    pub async fn release_path(&self, path: &str) -> usize {
        let mut entries = self.entries.write().await;
        let keys: Vec<TextureKey> = entries.keys().filter(|key| key.path == path).cloned().collect();
        for key in &keys {
            if let Some(entry) = entries.remove(key) {
                self.backend.delete_texture(entry.info.id);
            }
        }
        self.record_releases(keys.len(), entries.len()).await;
        keys.len()
    }

    /// Give back one reference to the entry owning `id`, freeing it when none remain.
    /// Returns false if nothing owned `id`.
    pub async fn release_handle(&self, id: TextureId) -> bool {
        let mut entries = self.entries.write().await;
        let Some(key) = entries
            .iter()
            .find(|(_, entry)| entry.info.id == id)
            .map(|(key, _)| key.clone())
        else {
            return false;
        };

        let freed = match entries.get_mut(&key) {
            Some(entry) if entry.refs > 1 => {
                entry.refs -= 1;
                debug!("📋 Texture {:?} still held by {} owner(s)", id, entry.refs);
                false
            }
            _ => {
                entries.remove(&key);
                self.backend.delete_texture(id);
                true
            }
        };
        self.record_releases(freed as usize, entries.len()).await;
        true
    }

    pub async fn release_all(&self) {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        for (_, entry) in entries.drain() {
            self.backend.delete_texture(entry.info.id);
        }
        self.record_releases(count, 0).await;
        info!("📋 Released {} textures from cache", count);
    }

    async fn record_releases(&self, released: usize, remaining: usize) {
        let mut stats = self.stats.write().await;
        stats.releases += released as u64;
        stats.cache_entries = remaining;
    }

    pub async fn contains(&self, path: &str, premultiply: bool) -> bool {
        self.entries
            .read()
            .await
            .contains_key(&TextureKey::new(path, premultiply))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().await.clone();
        stats.cache_entries = self.entries.read().await.len();
        stats
    }
}
