//! Test doubles for the authorization pipeline.
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{AuthServerConfig, AuthServerSettings};
use crate::repos::error::RepoError;
use crate::services::authz::cache::VerificationCache;
use crate::services::authz::client::{VerificationRequest, Verifier};
use crate::services::authz::enforcer::UserDirectory;
use crate::services::authz::service::AuthzService;
use crate::services::authz::verification::VerificationResult;
use crate::services::cache::MemoryClient;

/// Verifier that answers a fixed JSON body and counts calls.
#[derive(Clone)]
pub struct StubVerifier {
    answer: Value,
    calls: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<Value>>>,
}

impl StubVerifier {
    pub fn answering(answer: Value) -> Self {
        Self {
            answer,
            calls: Arc::new(AtomicUsize::new(0)),
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The last request body, as the auth server would have received it.
    pub fn last_request(&self) -> Option<Value> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl Verifier for StubVerifier {
    async fn verify(
        &self,
        _config: &AuthServerConfig,
        request: &VerificationRequest<'_>,
    ) -> VerificationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(serde_json::to_value(request).unwrap());
        serde_json::from_value(self.answer.clone()).unwrap()
    }
}

/// User directory over a fixed id set, counting lookups.
#[derive(Clone, Default)]
pub struct StubUsers {
    known: HashSet<i64>,
    lookups: Arc<AtomicUsize>,
}

impl StubUsers {
    pub fn with(ids: &[i64]) -> Self {
        Self {
            known: ids.iter().copied().collect(),
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for StubUsers {
    async fn exists(&self, user_id: i64) -> Result<bool, RepoError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.known.contains(&user_id))
    }
}

pub fn complete_settings() -> AuthServerSettings {
    AuthServerSettings {
        base_url: "http://auth.test".to_string(),
        verify_path: "/api/authz/verify".to_string(),
        service_name: "sensors".to_string(),
        call_token: "svc-call-token".to_string(),
        timeout_seconds: 1,
        retries: 2,
        retry_delay_ms: 0,
        cache_ttl_seconds: 60,
    }
}

pub fn service_with(verifier: StubVerifier, users: StubUsers) -> AuthzService {
    AuthzService::new(
        complete_settings(),
        VerificationCache::new(Arc::new(MemoryClient::new())),
        Arc::new(verifier),
        Arc::new(users),
    )
}
