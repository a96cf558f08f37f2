use async_trait::async_trait;
use std::time::Duration;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

/// Valkey/Redis-backed cache client.
///
/// Shared across every gateway process, so a verification computed by one
/// instance is reused by the others until its TTL runs out.
#[derive(Clone)]
pub struct ValkeyClient {
    manager: redis::aio::ConnectionManager,
}

impl ValkeyClient {
    // Create a Valkey client from a URL like `redis://localhost:6379`
    pub async fn new(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        Ok(Self { manager })
    }
}

#[async_trait]
impl CacheClient for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.manager.clone();

        let resp: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(resp)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        // `SET key value EX <seconds>` replaces the whole entry (last write wins).
        let mut conn = self.manager.clone();

        // EX expects integer seconds. We clamp to at least 1 sec.
        let ttl_seconds: u64 = ttl.as_secs().max(1);

        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(())
    }
}
