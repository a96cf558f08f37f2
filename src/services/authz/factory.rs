/// Factory: build `AuthzService` from application `Config`.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::PgPool;

use crate::config::Config;
use crate::services::authz::cache::VerificationCache;
use crate::services::authz::client::HttpVerifier;
use crate::services::authz::service::AuthzService;
use crate::services::authz::users::PgUserDirectory;
use crate::services::cache::{CacheClient, MemoryClient, ValkeyClient};

const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub async fn build_authz_service(config: &Config, db: PgPool) -> anyhow::Result<Arc<AuthzService>> {
    let cache: Arc<dyn CacheClient> = match &config.redis_url {
        Some(url) => Arc::new(
            ValkeyClient::new(url)
                .await
                .context("connect verification cache")?,
        ),
        None => {
            tracing::warn!("REDIS_URL not set, verification cache is process-local");
            let memory = MemoryClient::new();
            memory.spawn_sweeper(MEMORY_SWEEP_INTERVAL);
            Arc::new(memory)
        }
    };

    // Per-attempt timeouts are set on each request from the validated settings.
    let http = reqwest::Client::builder()
        .build()
        .context("build auth server http client")?;

    let authz = AuthzService::new(
        config.auth_server.clone(),
        VerificationCache::new(cache),
        Arc::new(HttpVerifier::new(http)),
        Arc::new(PgUserDirectory::new(db)),
    )
    .with_cache_prefix(config.cache_prefix.clone())
    .with_body_excluded_fields(config.body_excluded_fields.clone())
    .with_body_limit_bytes(config.body_limit_bytes);

    tracing::info!(
        cache_backend = authz.cache_backend(),
        auth_server = ?config.auth_server,
        "authorization service ready"
    );

    Ok(Arc::new(authz))
}
