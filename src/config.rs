/*
 * Responsibility
 * - Load settings from the environment (DATABASE_URL, REDIS_URL, auth server, cache)
 * - Startup settings are validated once (missing -> fail to boot)
 * - Auth server settings are validated per request (missing -> 500, not a crash)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CACHE_PREFIX: &str = "authz:verify";
pub const DEFAULT_VERIFY_PATH: &str = "/api/authz/verify";
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;
pub const DEFAULT_EXCLUDED_BODY_FIELDS: &[&str] = &[
    "file",
    "files",
    "attachment",
    "attachments",
    "image",
    "images",
    "photo",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    // None -> in-process cache (single instance only)
    pub redis_url: Option<String>,

    pub cache_prefix: String,
    pub body_excluded_fields: Vec<String>,
    pub body_limit_bytes: usize,

    pub auth_server: AuthServerSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let redis_url = std::env::var("REDIS_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let cache_prefix = std::env::var("AUTHZ_CACHE_PREFIX")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CACHE_PREFIX.to_string());

        let body_excluded_fields = match std::env::var("AUTHZ_BODY_EXCLUDED_FIELDS") {
            Ok(raw) => parse_list(&raw),
            Err(_) => DEFAULT_EXCLUDED_BODY_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let body_limit_bytes = match std::env::var("AUTHZ_BODY_LIMIT_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::Invalid("AUTHZ_BODY_LIMIT_BYTES"))?,
            Err(_) => DEFAULT_BODY_LIMIT_BYTES,
        };

        Ok(Self {
            addr,
            database_url,
            redis_url,
            cache_prefix,
            body_excluded_fields,
            body_limit_bytes,
            auth_server: AuthServerSettings::from_env(),
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Raw auth server settings as read from the environment.
///
/// Nothing here is checked at boot. `validate()` runs on every protected
/// request so a misconfigured deployment answers 500 instead of refusing to start.
#[derive(Clone, Default)]
pub struct AuthServerSettings {
    pub base_url: String,
    pub verify_path: String,
    pub service_name: String,
    pub call_token: String,
    pub timeout_seconds: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub cache_ttl_seconds: u64,
}

impl AuthServerSettings {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("AUTH_SERVER_BASE_URL").unwrap_or_default(),
            verify_path: env_string("AUTH_SERVER_VERIFY_PATH")
                .unwrap_or_else(|| DEFAULT_VERIFY_PATH.to_string()),
            service_name: env_string("AUTH_SERVER_SERVICE_NAME").unwrap_or_default(),
            call_token: env_string("AUTH_SERVER_CALL_TOKEN").unwrap_or_default(),
            timeout_seconds: env_parse("AUTH_SERVER_TIMEOUT_SECONDS").unwrap_or(3),
            retries: env_parse("AUTH_SERVER_RETRIES").unwrap_or(2),
            retry_delay_ms: env_parse("AUTH_SERVER_RETRY_DELAY_MS").unwrap_or(200),
            cache_ttl_seconds: env_parse("AUTHZ_CACHE_TTL_SECONDS").unwrap_or(60),
        }
    }

    pub fn validate(&self) -> Result<AuthServerConfig, ConfigError> {
        let base_url = required(&self.base_url, "AUTH_SERVER_BASE_URL")?;
        let verify_path = required(&self.verify_path, "AUTH_SERVER_VERIFY_PATH")?;
        let service_name = required(&self.service_name, "AUTH_SERVER_SERVICE_NAME")?;
        let call_token = required(&self.call_token, "AUTH_SERVER_CALL_TOKEN")?;

        Ok(AuthServerConfig {
            endpoint: join_endpoint(base_url, verify_path),
            service_name: service_name.to_string(),
            call_token: call_token.to_string(),
            // a zero timeout would fail every attempt
            timeout: Duration::from_secs(self.timeout_seconds.max(1)),
            retries: self.retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            cache_ttl: Duration::from_secs(self.cache_ttl_seconds),
        })
    }

    /// Worst-case wall time of one verification: every attempt runs into its
    /// timeout and every retry waits the full delay.
    pub fn verification_budget(&self) -> Duration {
        let attempts = self.retries.saturating_add(1);
        Duration::from_secs(self.timeout_seconds.max(1))
            .saturating_mul(attempts)
            .saturating_add(Duration::from_millis(self.retry_delay_ms).saturating_mul(self.retries))
    }
}

impl fmt::Debug for AuthServerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthServerSettings")
            .field("base_url", &self.base_url)
            .field("verify_path", &self.verify_path)
            .field("service_name", &self.service_name)
            .field("call_token", &redacted(&self.call_token))
            .field("timeout_seconds", &self.timeout_seconds)
            .field("retries", &self.retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("cache_ttl_seconds", &self.cache_ttl_seconds)
            .finish()
    }
}

/// Validated, ready-to-use auth server settings for a single request.
#[derive(Clone)]
pub struct AuthServerConfig {
    pub endpoint: String,
    pub service_name: String,
    pub call_token: String,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    pub cache_ttl: Duration,
}

impl fmt::Debug for AuthServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthServerConfig")
            .field("endpoint", &self.endpoint)
            .field("service_name", &self.service_name)
            .field("call_token", &redacted(&self.call_token))
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

fn required<'a>(value: &'a str, key: &'static str) -> Result<&'a str, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(key));
    }
    Ok(value)
}

/// `{base_url}{verify_path}` with exactly one slash between the two parts.
fn join_endpoint(base_url: &str, verify_path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        verify_path.trim_start_matches('/')
    )
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "<empty>" } else { "<redacted>" }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
