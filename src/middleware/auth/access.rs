//! Authorization middleware: bearer token -> remote verification (cached)
//! -> two-part gate -> AuthzCtx in request extensions.
//!
//! Order of checks:
//! - no bearer token: 401 before touching cache or network
//! - auth server settings incomplete: 500
//! - verification / enforcement: 401 or 403 on denial

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{FromRequest, FromRequestParts, MatchedPath, Multipart, OriginalUri, RawPathParams, State},
    http::{Request, header, request::Parts},
    middleware::{self, Next},
    response::Response,
};

use serde_json::{Map, Value};

use crate::error::AppError;
use crate::middleware::auth::propagate::propagate;
use crate::middleware::bearer_auth::bearer_token;
use crate::services::authz::context::{
    body_participates, decode_body, is_form_content, is_json_content, is_multipart_content,
};
use crate::services::authz::{AuthorizeError, Decision, IncomingRequest};
use crate::state::AppState;

/// Protect every route already added to `router`.
///
/// Uses `route_layer` so the middleware runs after routing and can see the
/// matched route template and its path parameters.
///
/// ```ignore
/// let protected = Router::new().route("/me", get(me));
/// let protected = middleware::auth::access::apply(protected, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .map(str::to_owned)
        .ok_or(AppError::MissingCredential)?;

    let (mut parts, body) = req.into_parts();
    let mut incoming = describe(&mut parts, &state, token).await;

    // Buffer the body only when it feeds the context, then hand the same
    // bytes to the downstream handler.
    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let content_type = content_type.as_deref();

    // Other content types (octet streams, plain text) add nothing to the context.
    let body = if body_participates(&incoming.method, content_type)
        && (is_json_content(content_type)
            || is_form_content(content_type)
            || is_multipart_content(content_type))
    {
        let bytes = axum::body::to_bytes(body, state.authz.body_limit_bytes())
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "request body unreadable");
                AppError::bad_request("INVALID_BODY", "request body too large or unreadable")
            })?;
        incoming.body = if is_multipart_content(content_type) {
            multipart_text_fields(content_type, bytes.clone()).await
        } else {
            decode_body(content_type, &bytes)
        };
        Body::from(bytes)
    } else {
        body
    };

    let decision = state.authz.authorize(&incoming).await.map_err(|err| {
        if let AuthorizeError::Repo(e) = &err {
            tracing::error!(error = ?e, "local user lookup failed");
        }
        AppError::from(err)
    })?;

    let mut req = Request::from_parts(parts, body);
    match decision {
        Decision::Allow(grant) => {
            propagate(req.extensions_mut(), grant);
            Ok(next.run(req).await)
        }
        Decision::Deny(reason) => Err(AppError::from(reason)),
    }
}

/// Everything but the body: method, full path, route template, params, query.
async fn describe(parts: &mut Parts, state: &AppState, token: String) -> IncomingRequest {
    // Inside nested routers `parts.uri` has the prefix stripped.
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|u| u.0.clone())
        .unwrap_or_else(|| parts.uri.clone());

    let mut incoming = IncomingRequest::new(parts.method.as_str(), uri.path(), token);
    incoming.query = uri.query().map(str::to_owned);
    incoming.route_name = parts
        .extensions
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_owned());
    incoming.path_params = match RawPathParams::from_request_parts(parts, state).await {
        Ok(params) => params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect(),
        Err(_) => Vec::new(),
    };

    incoming
}

/// Text parts of a multipart body as a flat map. Parts with a filename are
/// skipped; a malformed body yields `None`.
async fn multipart_text_fields(content_type: Option<&str>, bytes: Bytes) -> Option<Value> {
    let req = Request::builder()
        .header(header::CONTENT_TYPE, content_type?)
        .body(Body::from(bytes))
        .ok()?;
    let mut multipart = Multipart::from_request(req, &()).await.ok()?;

    let mut fields = Map::new();
    while let Some(field) = multipart.next_field().await.ok()? {
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        let text = field.text().await.ok()?;
        fields.insert(name, Value::String(text));
    }
    Some(Value::Object(fields))
}
