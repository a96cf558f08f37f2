/*
 * Responsibility
 * - GET /me: echo the authorized context the middleware attached
 * - Smallest possible consumer of the downstream contract
 */
use axum::Json;

use crate::api::v1::extractors::{AuthzCtx, AuthzCtxExtractor};

pub async fn me(AuthzCtxExtractor(ctx): AuthzCtxExtractor) -> Json<AuthzCtx> {
    Json(ctx)
}
