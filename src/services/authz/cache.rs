//! Verification cache: get-or-compute over a shared `CacheClient`.
//!
//! No coalescing: two requests missing the same key at the same time both
//! compute and both write. Entries are replaced wholesale, so the last
//! write wins.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::services::authz::cache_key::key_fingerprint;
use crate::services::authz::verification::VerificationResult;
use crate::services::cache::CacheClient;

#[derive(Clone)]
pub struct VerificationCache {
    cache: Arc<dyn CacheClient>,
}

impl VerificationCache {
    pub fn new(cache: Arc<dyn CacheClient>) -> Self {
        Self { cache }
    }

    pub fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    /// Return the cached result for `key`, or run `compute`, store its
    /// result (sentinel included) for `ttl` and return it.
    ///
    /// Backend failures never surface: a failed read is a miss and a failed
    /// write only loses the cache entry. A zero `ttl` disables storing.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> VerificationResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = VerificationResult>,
    {
        let fingerprint = key_fingerprint(key);

        if let Some(hit) = self.lookup(key, fingerprint).await {
            tracing::debug!(key = %fingerprint, active = hit.active, "verification cache hit");
            return hit;
        }

        tracing::debug!(key = %fingerprint, "verification cache miss");
        let result = compute().await;

        if ttl.is_zero() {
            return result;
        }

        match serde_json::to_string(&result) {
            Ok(encoded) => {
                if let Err(err) = self.cache.set_with_ttl(key, &encoded, ttl).await {
                    tracing::warn!(
                        error = %err,
                        backend = self.cache.backend_name(),
                        key = %fingerprint,
                        "verification cache write failed"
                    );
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, key = %fingerprint, "verification result not encodable");
            }
        }

        result
    }

    async fn lookup(&self, key: &str, fingerprint: &str) -> Option<VerificationResult> {
        let raw = match self.cache.get_string(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    backend = self.cache.backend_name(),
                    key = %fingerprint,
                    "verification cache read failed, treating as miss"
                );
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::warn!(error = %err, key = %fingerprint, "undecodable cache entry, treating as miss");
                None
            }
        }
    }
}
