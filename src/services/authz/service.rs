//! Request authorization pipeline.
//!
//! canonicalize -> derive key -> cache (or remote verify) -> enforce.
use std::sync::Arc;

use serde_json::Value;

use crate::config::{AuthServerConfig, AuthServerSettings, ConfigError};
use crate::repos::error::RepoError;
use crate::services::authz::cache::VerificationCache;
use crate::services::authz::cache_key::{derive_key, key_fingerprint};
use crate::services::authz::client::{VerificationRequest, Verifier};
use crate::services::authz::context::StoreContext;
use crate::services::authz::enforcer::{self, Decision, UserDirectory};

/// One inbound request, as far as authorization is concerned.
pub struct IncomingRequest {
    pub method: String,
    pub path: String,
    pub route_name: Option<String>,
    pub path_params: Vec<(String, String)>,
    pub query: Option<String>,
    // Some only when the body participates in the context.
    pub body: Option<Value>,
    pub token: String,
}

impl IncomingRequest {
    pub fn new(method: &str, path: &str, token: impl Into<String>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: normalize_path(path),
            route_name: None,
            path_params: Vec::new(),
            query: None,
            body: None,
            token: token.into(),
        }
    }
}

/// One leading slash, no trailing slash (except for the root).
pub fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    format!("/{}", trimmed)
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct AuthzService {
    settings: AuthServerSettings,
    cache_prefix: String,
    body_excluded_fields: Vec<String>,
    body_limit_bytes: usize,
    cache: VerificationCache,
    verifier: Arc<dyn Verifier>,
    users: Arc<dyn UserDirectory>,
}

impl AuthzService {
    pub fn new(
        settings: AuthServerSettings,
        cache: VerificationCache,
        verifier: Arc<dyn Verifier>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            settings,
            cache_prefix: crate::config::DEFAULT_CACHE_PREFIX.to_string(),
            body_excluded_fields: crate::config::DEFAULT_EXCLUDED_BODY_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            body_limit_bytes: crate::config::DEFAULT_BODY_LIMIT_BYTES,
            cache,
            verifier,
            users,
        }
    }

    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    pub fn with_body_excluded_fields(mut self, fields: Vec<String>) -> Self {
        self.body_excluded_fields = fields;
        self
    }

    pub fn with_body_limit_bytes(mut self, limit: usize) -> Self {
        self.body_limit_bytes = limit;
        self
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_bytes
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend_name()
    }

    /// Decide whether `request` may proceed.
    ///
    /// Only misconfiguration and local user lookup failures are errors.
    /// Everything about the remote verification degrades to a `Deny`.
    pub async fn authorize(&self, request: &IncomingRequest) -> Result<Decision, AuthorizeError> {
        let config = self.settings.validate()?;

        let context = StoreContext::canonicalize(
            &request.path_params,
            request.query.as_deref(),
            request.body.clone(),
            &self.body_excluded_fields,
        );

        let key = derive_key(
            &self.cache_prefix,
            &config.service_name,
            &request.token,
            &request.method,
            &request.path,
            request.route_name.as_deref(),
            &context,
        );

        let result = self
            .cache
            .get_or_compute(&key, config.cache_ttl, || {
                self.verify_remote(&config, request, &context)
            })
            .await;

        let decision = enforcer::enforce(result, self.users.as_ref()).await?;

        match &decision {
            Decision::Allow(grant) => tracing::debug!(
                user_id = grant.user_id,
                method = %request.method,
                path = %request.path,
                key = %key_fingerprint(&key),
                "request authorized"
            ),
            Decision::Deny(reason) => tracing::info!(
                reason = reason.as_str(),
                method = %request.method,
                path = %request.path,
                key = %key_fingerprint(&key),
                "request denied"
            ),
        }

        Ok(decision)
    }

    async fn verify_remote(
        &self,
        config: &AuthServerConfig,
        request: &IncomingRequest,
        context: &StoreContext,
    ) -> crate::services::authz::verification::VerificationResult {
        let body = VerificationRequest {
            service: &config.service_name,
            token: &request.token,
            method: &request.method,
            path: &request.path,
            route_name: request.route_name.as_deref(),
            store_context: context,
        };
        self.verifier.verify(config, &body).await
    }
}
