//! In-process TTL cache.
//!
//! Used when no `REDIS_URL` is configured and as the cache double in tests.
//! Entries are not shared between processes. Expired entries are dropped
//! when read, and swept in bulk whenever the map doubles past its last size.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

const MIN_SWEEP_LEN: usize = 1024;

#[derive(Debug)]
struct Entries {
    map: HashMap<String, Entry>,
    // a write that grows the map to this size sweeps expired entries first
    sweep_at: usize,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            sweep_at: MIN_SWEEP_LEN,
        }
    }
}

impl Entries {
    fn evict_expired(&mut self) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.expires_at > now);
        self.sweep_at = (self.map.len() * 2).max(MIN_SWEEP_LEN);
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryClient {
    inner: Arc<Mutex<Entries>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry.
    pub fn evict_expired(&self) -> CacheResult<()> {
        self.inner.lock().map_err(|_| poisoned())?.evict_expired();
        Ok(())
    }

    /// Sweep expired entries every `every` on a background task.
    pub fn spawn_sweeper(&self, every: Duration) {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if let Err(err) = cache.evict_expired() {
                    tracing::warn!(error = %err, "memory cache sweep failed");
                }
            }
        });
    }

    #[cfg(test)]
    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|entries| entries.map.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> CacheError {
    CacheError::BackendCommand("memory cache lock poisoned".to_string())
}

#[async_trait]
impl CacheClient for MemoryClient {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.inner.lock().map_err(|_| poisoned())?;

        match entries.map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        let mut entries = self.inner.lock().map_err(|_| poisoned())?;
        if entries.map.len() >= entries.sweep_at && !entries.map.contains_key(key) {
            entries.evict_expired();
        }
        entries.map.insert(key.to_string(), entry);
        Ok(())
    }
}
