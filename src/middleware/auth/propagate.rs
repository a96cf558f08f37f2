//! Claim propagation: make an allowed decision visible to downstream handlers.
use axum::http::Extensions;

use crate::api::v1::extractors::AuthzCtx;
use crate::services::authz::Grant;

/// Insert the authorized context (roles, permissions, ext and the local
/// user as session identity) into the request extensions.
pub fn propagate(extensions: &mut Extensions, grant: Grant) {
    let ctx = AuthzCtx::from(grant);
    tracing::Span::current().record("user_id", ctx.user_id);
    extensions.insert(ctx);
}
