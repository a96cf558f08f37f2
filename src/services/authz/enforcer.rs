/*
 * Responsibility
 * - Apply the two-part gate to a VerificationResult (active AND authorized)
 * - Resolve the subject to an existing local user (never create one)
 * - Return a Decision; HTTP status mapping happens in the middleware
 */
use async_trait::async_trait;

use crate::repos::error::RepoError;
use crate::services::authz::verification::{VerificationExt, VerificationResult};

/// Lookup of locally provisioned users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: i64) -> Result<bool, RepoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    Forbidden,
    MissingSubject,
    NotProvisioned,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::Forbidden => "forbidden",
            DenyReason::MissingSubject => "unauthenticated: missing subject",
            DenyReason::NotProvisioned => "unauthenticated: subject not provisioned",
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, DenyReason::Forbidden)
    }
}

/// What an allowed request carries downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub user_id: i64,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub ext: VerificationExt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow(Grant),
    Deny(DenyReason),
}

impl Decision {
    #[cfg(test)]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// Checks run in a fixed order; the first failing one decides the reason.
pub async fn enforce(
    result: VerificationResult,
    users: &dyn UserDirectory,
) -> Result<Decision, RepoError> {
    if !result.active {
        return Ok(Decision::Deny(DenyReason::Unauthenticated));
    }
    if !result.is_authorized() {
        return Ok(Decision::Deny(DenyReason::Forbidden));
    }
    let Some(user_id) = result.subject_id() else {
        return Ok(Decision::Deny(DenyReason::MissingSubject));
    };
    if !users.exists(user_id).await? {
        return Ok(Decision::Deny(DenyReason::NotProvisioned));
    }

    Ok(Decision::Allow(Grant {
        user_id,
        roles: result.roles,
        permissions: result.permissions,
        ext: result.ext.unwrap_or_default(),
    }))
}
