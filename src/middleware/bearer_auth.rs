/*
 * Responsibility
 * - Pull the bearer token out of the Authorization header
 * - No verification here: that is the authz middleware's job
 */
use axum::http::{HeaderMap, header};

/// `Authorization: Bearer <token>`, scheme matched case-insensitively.
/// Returns `None` for a missing header, another scheme or an empty token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
