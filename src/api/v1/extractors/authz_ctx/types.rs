/*
 * Responsibility
 * - The authorized request context seen by handlers
 * - The middleware verifies and inserts it into request extensions;
 *   handlers only ever receive this type
 */
use serde::Serialize;

use crate::services::authz::{Grant, verification::VerificationExt};

/// Context attached to every authorized request.
///
/// - `user_id` is the local user the request runs as (session identity)
/// - `roles` / `permissions` are the auth server's claims, unchanged
/// - `ext` carries `authorized` plus whatever extension claims the server sent
#[derive(Debug, Clone, Serialize)]
pub struct AuthzCtx {
    pub user_id: i64,
    #[serde(rename = "authz_roles")]
    pub roles: Vec<String>,
    #[serde(rename = "authz_permissions")]
    pub permissions: Vec<String>,
    #[serde(rename = "authz_ext")]
    pub ext: VerificationExt,
}

impl From<Grant> for AuthzCtx {
    fn from(grant: Grant) -> Self {
        Self {
            user_id: grant.user_id,
            roles: grant.roles,
            permissions: grant.permissions,
            ext: grant.ext,
        }
    }
}
