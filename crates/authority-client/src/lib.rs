//! Reqwest-backed implementation of the preferences `AuthorityTransport`.
//!
//! Every call carries a bounded timeout and a request id; transport errors
//! are retried within a bounded attempt budget, but a response that arrived
//! is never retried (the intent lifecycle has no automatic retry).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tickerdesk_prefs_core::wire::{AuthorityPreferencesResponse, write_request_body};
use tickerdesk_prefs_core::{AuthorityFailure, AuthorityFields, AuthorityTransport, UpdateIntent};
use uuid::Uuid;

pub const DEFAULT_TIMEOUT_MS: u64 = 4_000;
pub const DEFAULT_REQUEST_ATTEMPTS: usize = 2;
pub const DEFAULT_AUTHORITY_BASE_URL: &str = "http://127.0.0.1:8799";
pub const ENV_AUTHORITY_BASE_URL: &str = "TICKERDESK_PREFS_BASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorityClientConfigError {
    #[error("authority_base_url_missing")]
    BaseUrlMissing,
    #[error("authority_base_url_invalid")]
    BaseUrlInvalid,
}

#[derive(Debug, Clone)]
pub struct AuthorityClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub request_attempts: usize,
}

impl AuthorityClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            request_attempts: DEFAULT_REQUEST_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorityClient {
    base_url: String,
    timeout: Duration,
    request_attempts: usize,
    http: reqwest::Client,
}

impl AuthorityClient {
    pub fn new(config: AuthorityClientConfig) -> Result<Self, AuthorityClientConfigError> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            timeout: Duration::from_millis(config.timeout_ms.max(250)),
            request_attempts: config.request_attempts.max(1),
            http: reqwest::Client::new(),
        })
    }

    /// Resolves the base url from `TICKERDESK_PREFS_BASE_URL`, falling back
    /// to the local default.
    pub fn from_env() -> Result<Self, AuthorityClientConfigError> {
        let (base_url, source) = resolve_authority_base_url();
        tracing::debug!(base_url = %base_url, source, "authority base url resolved");
        Self::new(AuthorityClientConfig::new(base_url))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn preferences_path(user_id: u64) -> String {
        format!("/v1/users/{user_id}/preferences")
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn send_with_attempts(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AuthorityFailure> {
        let mut last_error: Option<String> = None;
        for attempt in 0..self.request_attempts {
            let request = build()
                .header("x-request-id", format!("req_{}", Uuid::new_v4().simple()))
                .timeout(self.timeout);
            match request.send().await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    last_error = Some(error.to_string());
                    if attempt + 1 >= self.request_attempts {
                        break;
                    }
                }
            }
        }
        Err(AuthorityFailure::Unreachable {
            message: last_error.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

#[async_trait]
impl AuthorityTransport for AuthorityClient {
    async fn fetch_preferences(&self, user_id: u64) -> Result<AuthorityFields, AuthorityFailure> {
        let url = self.endpoint(&Self::preferences_path(user_id));
        let response = self
            .send_with_attempts(|| self.http.get(url.as_str()))
            .await?;
        decode_preferences_response(response).await
    }

    async fn push_preference(
        &self,
        user_id: u64,
        intent: &UpdateIntent,
    ) -> Result<AuthorityFields, AuthorityFailure> {
        let url = self.endpoint(&Self::preferences_path(user_id));
        let body = write_request_body(user_id, intent.field, &intent.value);
        let response = self
            .send_with_attempts(|| self.http.post(url.as_str()).json(&body))
            .await?;
        decode_preferences_response(response).await
    }
}

async fn decode_preferences_response(
    response: reqwest::Response,
) -> Result<AuthorityFields, AuthorityFailure> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|error| AuthorityFailure::Unreachable {
            message: error.to_string(),
        })?;

    if !status.is_success() {
        return Err(rejected_from_body(status, &bytes));
    }

    match serde_json::from_slice::<AuthorityPreferencesResponse>(&bytes) {
        Ok(parsed) => Ok(parsed.decode()),
        Err(error) => Err(AuthorityFailure::Malformed {
            message: error.to_string(),
        }),
    }
}

/// Non-2xx responses may carry `{ "error": "<message>" }`; fall back to the
/// raw body when they do not.
fn rejected_from_body(status: StatusCode, body: &[u8]) -> AuthorityFailure {
    let message = serde_json::from_slice::<AuthorityPreferencesResponse>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .or_else(|| non_empty_string(String::from_utf8_lossy(body).to_string()))
        .unwrap_or_else(|| "<empty>".to_string());
    AuthorityFailure::Rejected {
        status: status.as_u16(),
        message,
    }
}

/// Resolves the authority base url and names where it came from.
#[must_use]
pub fn resolve_authority_base_url() -> (String, &'static str) {
    if let Some(base_url) = env_non_empty(ENV_AUTHORITY_BASE_URL) {
        return (base_url, ENV_AUTHORITY_BASE_URL);
    }
    (DEFAULT_AUTHORITY_BASE_URL.to_string(), "default_local")
}

pub fn normalize_base_url(raw: &str) -> Result<String, AuthorityClientConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthorityClientConfigError::BaseUrlMissing);
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AuthorityClientConfigError::BaseUrlInvalid);
    }
    let Some((_, remainder)) = trimmed.split_once("://") else {
        return Err(AuthorityClientConfigError::BaseUrlInvalid);
    };
    if remainder.trim().is_empty() || remainder.starts_with('/') {
        return Err(AuthorityClientConfigError::BaseUrlInvalid);
    }
    Ok(trimmed.to_string())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
}

fn non_empty_string(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn with_env<T>(value: Option<&str>, test: impl FnOnce() -> T) -> T {
        let lock = ENV_LOCK.get_or_init(|| Mutex::new(()));
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let previous = std::env::var(ENV_AUTHORITY_BASE_URL).ok();
        if let Some(value) = value {
            unsafe { std::env::set_var(ENV_AUTHORITY_BASE_URL, value) };
        } else {
            unsafe { std::env::remove_var(ENV_AUTHORITY_BASE_URL) };
        }

        let result = test();

        if let Some(value) = previous {
            unsafe { std::env::set_var(ENV_AUTHORITY_BASE_URL, value) };
        } else {
            unsafe { std::env::remove_var(ENV_AUTHORITY_BASE_URL) };
        }

        result
    }

    #[test]
    fn endpoint_builder_normalizes_paths() {
        let client = AuthorityClient::new(AuthorityClientConfig::new(
            "https://prefs.example.com/",
        ))
        .expect("authority client");
        assert_eq!(
            client.endpoint("/v1/users/7/preferences"),
            "https://prefs.example.com/v1/users/7/preferences"
        );
        assert_eq!(
            client.endpoint("v1/users/7/preferences"),
            "https://prefs.example.com/v1/users/7/preferences"
        );
    }

    #[test]
    fn preferences_path_is_deterministic() {
        assert_eq!(
            AuthorityClient::preferences_path(42),
            "/v1/users/42/preferences"
        );
    }

    #[test]
    fn base_url_missing_is_rejected() {
        let result = AuthorityClient::new(AuthorityClientConfig::new("   "));
        assert!(matches!(
            result,
            Err(AuthorityClientConfigError::BaseUrlMissing)
        ));
    }

    #[test]
    fn base_url_requires_http_scheme_and_host() {
        assert_eq!(
            normalize_base_url("prefs.example.com"),
            Err(AuthorityClientConfigError::BaseUrlInvalid)
        );
        assert_eq!(
            normalize_base_url("https:///nohost"),
            Err(AuthorityClientConfigError::BaseUrlInvalid)
        );
        assert_eq!(
            normalize_base_url(" https://prefs.example.com/ "),
            Ok("https://prefs.example.com".to_string())
        );
    }

    #[test]
    fn env_override_wins_over_default() {
        with_env(Some("https://staging.example.com/"), || {
            let (base_url, source) = resolve_authority_base_url();
            assert_eq!(base_url, "https://staging.example.com");
            assert_eq!(source, ENV_AUTHORITY_BASE_URL);
        });
    }

    #[test]
    fn default_base_url_applies_without_env() {
        with_env(None, || {
            let (base_url, source) = resolve_authority_base_url();
            assert_eq!(base_url, DEFAULT_AUTHORITY_BASE_URL);
            assert_eq!(source, "default_local");
        });
    }

    #[test]
    fn rejected_body_prefers_the_error_field() {
        let failure = rejected_from_body(
            StatusCode::BAD_REQUEST,
            br#"{"error":"unknown preference field"}"#,
        );
        assert_eq!(
            failure,
            AuthorityFailure::Rejected {
                status: 400,
                message: "unknown preference field".to_string(),
            }
        );
    }

    #[test]
    fn rejected_body_falls_back_to_raw_text() {
        let failure = rejected_from_body(StatusCode::BAD_GATEWAY, b" gateway failed ");
        assert_eq!(
            failure,
            AuthorityFailure::Rejected {
                status: 502,
                message: "gateway failed".to_string(),
            }
        );
        let empty = rejected_from_body(StatusCode::SERVICE_UNAVAILABLE, b" ");
        assert_eq!(
            empty,
            AuthorityFailure::Rejected {
                status: 503,
                message: "<empty>".to_string(),
            }
        );
    }
}
