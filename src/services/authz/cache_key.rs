//! Cache key derivation for verification results.
//!
//! The raw bearer token never reaches the key (or the cache): only its
//! SHA-256 does. The request shape enters through the hash of the
//! canonical context, so an extra query parameter is a different entry.
use sha2::{Digest, Sha256};

use crate::services::authz::context::StoreContext;

/// Lowercase hex SHA-256.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Pure function of its inputs: same request signature, same key.
pub fn derive_key(
    prefix: &str,
    service_name: &str,
    token: &str,
    method: &str,
    path: &str,
    route_name: Option<&str>,
    context: &StoreContext,
) -> String {
    // A JSON array keeps component boundaries unambiguous ("a:b" + "c" != "a" + "b:c").
    let components = serde_json::json!([
        service_name,
        sha256_hex(token),
        method,
        path,
        route_name,
        sha256_hex(&context.canonical_json()),
    ]);

    format!(
        "{}:{}:{}",
        prefix,
        service_name,
        sha256_hex(&components.to_string())
    )
}

/// Short, log-safe fingerprint of a cache key.
pub fn key_fingerprint(key: &str) -> &str {
    let digest = key.rsplit(':').next().unwrap_or(key);
    digest.get(..12).unwrap_or(digest)
}
