/*
 * Responsibility
 * - URL structure of v1
 * - Which routes sit behind the authz middleware is decided here
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{health::health, me::me};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new().route("/me", get(me));
    let protected = middleware::auth::access::apply(protected, state);

    Router::new().route("/health", get(health)).merge(protected)
}
