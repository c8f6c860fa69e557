//! Image cache for decoded images.
//!
//! Keeps loaded images keyed by URL so a rebuild can re-materialize an image
//! element synchronously instead of going back to the network.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::loader::LoadedImage;

/// Entry in the image cache.
#[derive(Debug)]
struct CacheEntry {
    image: LoadedImage,
    last_accessed: Instant,
    size_bytes: usize,
}

/// Configuration for the image cache.
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    /// Maximum cache size in bytes.
    pub max_size_bytes: usize,
    /// Maximum age before eviction (if not accessed).
    pub max_age: Duration,
    /// Maximum number of entries.
    pub max_entries: usize,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 64 * 1024 * 1024, // 64 MB
            max_age: Duration::from_secs(600),
            max_entries: 256,
        }
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of evictions.
    pub evictions: u64,
}

/// LRU cache of loaded images with size and entry limits.
#[derive(Debug)]
pub struct ImageCache {
    entries: HashMap<String, CacheEntry>,
    config: ImageCacheConfig,
    current_size: usize,
    stats: CacheStats,
}

impl ImageCache {
    /// Create a cache with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ImageCacheConfig::default())
    }

    /// Create a cache with custom limits.
    #[must_use]
    pub fn with_config(config: ImageCacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
            current_size: 0,
            stats: CacheStats::default(),
        }
    }

    /// Get a cloned image by URL.
    pub fn get(&mut self, url: &str) -> Option<LoadedImage> {
        if let Some(entry) = self.entries.get_mut(url) {
            entry.last_accessed = Instant::now();
            self.stats.hits += 1;
            Some(entry.image.clone())
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// Insert an image. May evict older entries.
    pub fn insert(&mut self, url: String, image: LoadedImage) {
        let size_bytes = image.bytes.len();
        if size_bytes > self.config.max_size_bytes {
            tracing::debug!("Image {url} ({size_bytes} bytes) exceeds cache size, not cached");
            return;
        }

        if let Some(old) = self.entries.remove(&url) {
            self.current_size -= old.size_bytes;
        }

        self.evict_if_needed(size_bytes);

        self.current_size += size_bytes;
        self.entries.insert(
            url,
            CacheEntry {
                image,
                last_accessed: Instant::now(),
                size_bytes,
            },
        );
    }

    /// Check if a URL is cached.
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Number of cached images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.current_size
    }

    /// Cache statistics.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn evict_if_needed(&mut self, needed_bytes: usize) {
        self.evict_expired();

        while self.current_size + needed_bytes > self.config.max_size_bytes
            && !self.entries.is_empty()
        {
            self.evict_lru();
        }

        while self.entries.len() >= self.config.max_entries && !self.entries.is_empty() {
            self.evict_lru();
        }
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            self.remove_entry(&key);
        }
    }

    fn evict_expired(&mut self) {
        let now = Instant::now();
        let max_age = self.config.max_age;
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_accessed) > max_age)
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            self.remove_entry(&key);
        }
    }

    fn remove_entry(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.current_size -= entry.size_bytes;
            self.stats.evictions += 1;
        }
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn image(size: usize) -> LoadedImage {
        LoadedImage {
            bytes: Arc::new(vec![0u8; size]),
            mime: "image/png".to_string(),
            width: 10,
            height: 10,
        }
    }

    #[test]
    fn test_hit_and_miss() {
        let mut cache = ImageCache::new();
        assert!(cache.get("a").is_none());
        cache.insert("a".into(), image(100));
        assert!(cache.get("a").is_some());
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_size_limit_evicts() {
        let mut cache = ImageCache::with_config(ImageCacheConfig {
            max_size_bytes: 250,
            ..Default::default()
        });
        cache.insert("a".into(), image(100));
        cache.insert("b".into(), image(100));
        cache.insert("c".into(), image(100));

        assert!(cache.size_bytes() <= 250);
        assert_eq!(cache.len(), 2);
        assert!(cache.stats().evictions >= 1);
    }

    #[test]
    fn test_entry_limit_evicts() {
        let mut cache = ImageCache::with_config(ImageCacheConfig {
            max_entries: 2,
            ..Default::default()
        });
        cache.insert("a".into(), image(1));
        cache.insert("b".into(), image(1));
        cache.insert("c".into(), image(1));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_oversized_image_not_cached() {
        let mut cache = ImageCache::with_config(ImageCacheConfig {
            max_size_bytes: 10,
            ..Default::default()
        });
        cache.insert("big".into(), image(11));
        assert!(cache.is_empty());
    }
}
