use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;

use super::AuthzCtx;

/// Extractor for handlers that need the authorized context.
/// Relies on the authz middleware having inserted `AuthzCtx` into extensions;
/// on a route without that middleware it rejects with 401.
pub struct AuthzCtxExtractor(pub AuthzCtx);

impl<S> FromRequestParts<S> for AuthzCtxExtractor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthzCtx>()
            .cloned()
            .map(AuthzCtxExtractor)
            .ok_or(AppError::Unauthorized {
                reason: "unauthenticated",
            })
    }
}
