//! Remote verification call against the auth server.
//!
//! Fail-closed: every failure mode ends in `VerificationResult::inactive()`.
//! Callers never see a transport error, so "auth server unreachable" and
//! "token inactive" look the same from the outside. Only the logs tell them
//! apart.
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::AuthServerConfig;
use crate::services::authz::context::StoreContext;
use crate::services::authz::verification::VerificationResult;

/// JSON body posted to `{base_url}{verify_path}`.
///
/// Deliberately not `Debug`: it carries the user token.
#[derive(Serialize)]
pub struct VerificationRequest<'a> {
    pub service: &'a str,
    pub token: &'a str,
    pub method: &'a str,
    pub path: &'a str,
    pub route_name: Option<&'a str>,
    pub store_context: &'a StoreContext,
}

#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(
        &self,
        config: &AuthServerConfig,
        request: &VerificationRequest<'_>,
    ) -> VerificationResult;
}

#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("undecodable response: {0}")]
    Decode(reqwest::Error),
}

/// `Verifier` backed by `reqwest`.
#[derive(Clone, Debug, Default)]
pub struct HttpVerifier {
    http: Client,
}

impl HttpVerifier {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    async fn attempt(
        &self,
        config: &AuthServerConfig,
        request: &VerificationRequest<'_>,
    ) -> Result<VerificationResult, AttemptError> {
        let resp = self
            .http
            .post(&config.endpoint)
            .bearer_auth(&config.call_token)
            .timeout(config.timeout)
            .json(request)
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }

        resp.json::<VerificationResult>()
            .await
            .map_err(|e| if e.is_timeout() { AttemptError::Transport(e) } else { AttemptError::Decode(e) })
    }
}

#[async_trait]
impl Verifier for HttpVerifier {
    async fn verify(
        &self,
        config: &AuthServerConfig,
        request: &VerificationRequest<'_>,
    ) -> VerificationResult {
        let attempts = config.retries.saturating_add(1);

        for attempt in 1..=attempts {
            match self.attempt(config, request).await {
                // A 2xx answer is final, `active: false` included.
                Ok(result) => return result,
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        attempt,
                        attempts,
                        endpoint = %config.endpoint,
                        "auth server verification attempt failed"
                    );
                }
            }

            if attempt < attempts && !config.retry_delay.is_zero() {
                tokio::time::sleep(config.retry_delay).await;
            }
        }

        tracing::error!(
            attempts,
            endpoint = %config.endpoint,
            "auth server unreachable, failing closed"
        );
        VerificationResult::inactive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, retries: u32) -> AuthServerConfig {
        AuthServerConfig {
            endpoint: format!("{}/api/authz/verify", server.uri()),
            service_name: "sensors".to_string(),
            call_token: "svc-call-token".to_string(),
            timeout: Duration::from_millis(300),
            retries,
            retry_delay: Duration::from_millis(10),
            cache_ttl: Duration::from_secs(60),
        }
    }

    fn scenario_context() -> StoreContext {
        StoreContext::canonicalize(
            &[("storeNumber".to_string(), "42".to_string())],
            None,
            None,
            &[],
        )
    }

    async fn verify(server: &MockServer, retries: u32) -> VerificationResult {
        let config = config_for(server, retries);
        let context = scenario_context();
        let request = VerificationRequest {
            service: &config.service_name,
            token: "abc",
            method: "GET",
            path: "/stores/42/sensors",
            route_name: Some("/stores/{storeNumber}/sensors"),
            store_context: &context,
        };
        HttpVerifier::default().verify(&config, &request).await
    }

    async fn received(server: &MockServer) -> usize {
        server.received_requests().await.map(|r| r.len()).unwrap_or(0)
    }

    #[tokio::test]
    async fn posts_request_with_call_token_and_decodes_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/authz/verify"))
            .and(header("authorization", "Bearer svc-call-token"))
            .and(body_json(json!({
                "service": "sensors",
                "token": "abc",
                "method": "GET",
                "path": "/stores/42/sensors",
                "route_name": "/stores/{storeNumber}/sensors",
                "store_context": {"path": {"storeNumber": 42}, "query": {}, "body": {}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "active": true,
                "user": {"id": 7},
                "ext": {"authorized": true}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = verify(&server, 2).await;

        assert!(result.active);
        assert!(result.is_authorized());
        assert_eq!(result.subject_id(), Some(7));
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "active": true,
                "user": {"id": 7},
                "ext": {"authorized": true}
            })))
            .mount(&server)
            .await;

        let result = verify(&server, 2).await;

        assert!(result.active);
        assert_eq!(received(&server).await, 3);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_closed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = verify(&server, 2).await;

        assert_eq!(result, VerificationResult::inactive());
        assert_eq!(received(&server).await, 3);
    }

    #[tokio::test]
    async fn inactive_answer_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"active": false})))
            .mount(&server)
            .await;

        let result = verify(&server, 2).await;

        assert!(!result.active);
        assert_eq!(received(&server).await, 1);
    }

    #[tokio::test]
    async fn timeout_counts_as_failed_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"active": true, "ext": {"authorized": true}}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let result = verify(&server, 0).await;

        assert_eq!(result, VerificationResult::inactive());
    }

    #[tokio::test]
    async fn garbage_body_fails_closed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = verify(&server, 1).await;

        assert_eq!(result, VerificationResult::inactive());
        assert_eq!(received(&server).await, 2);
    }

    #[tokio::test]
    async fn unreachable_server_fails_closed() {
        let server = MockServer::start().await;
        let config = config_for(&server, 1);
        drop(server);

        let context = scenario_context();
        let request = VerificationRequest {
            service: "sensors",
            token: "abc",
            method: "GET",
            path: "/stores/42/sensors",
            route_name: None,
            store_context: &context,
        };

        let result = HttpVerifier::default().verify(&config, &request).await;

        assert_eq!(result, VerificationResult::inactive());
    }

    #[test]
    fn attempt_errors_render_their_cause() {
        assert_eq!(
            AttemptError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE).to_string(),
            "unexpected status 503 Service Unavailable"
        );
    }
}
