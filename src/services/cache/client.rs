//! Cache client interface used by higher-level services (verification results, etc.).
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command).
///
/// Note:
/// - Kept independent from `AppError` so callers decide how to degrade.
///   The verification cache treats every error as a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
}

/// A minimal, string-based cache interface.
///
/// Shared as `Arc<dyn CacheClient>`, so implementations must be `Send + Sync`.
#[async_trait]
pub trait CacheClient: Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Get UTF-8 string value. Expired keys read as `None`.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    // Set (or replace) a value with TTL.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;
}
