/*
 * Responsibility
 * - Tracing init -> Config -> dependencies -> Router
 * - Apply HTTP-level middleware
 * - Start axum::serve()
 */
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use crate::{
    api,
    config::{AuthServerSettings, Config},
    middleware,
    services::authz::build_authz_service,
    state::AppState,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
// Left for the handler after a worst-case verification.
const HANDLER_MARGIN: Duration = Duration::from_secs(5);

pub async fn run() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("connect database")?;

    let authz = build_authz_service(&config, db).await?;
    let state = AppState::new(authz);

    let app = build_router(state);
    let timeout = request_timeout(REQUEST_TIMEOUT, &config.auth_server);
    let app = middleware::http::apply(app, config.body_limit_bytes, timeout);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Global timeout for a request: at least `floor`, and never shorter than a
/// full verification, so an unreachable auth server still ends in a cached 401.
fn request_timeout(floor: Duration, auth_server: &AuthServerSettings) -> Duration {
    floor.max(auth_server.verification_budget().saturating_add(HANDLER_MARGIN))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state)
}
