//! OAuth token lifecycle.
//!
//! The token provider is an external collaborator reached through two
//! operations, exchange and refresh, carrying HTTP Basic client credentials.
//! The state check at callback is mandatory and rejects before any network
//! call. Constant-time comparison is used for the state equality test.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::errors::AppError;
use crate::session::Session;

/// Length of the anti-CSRF state string issued at login.
pub const STATE_LENGTH: usize = 16;

/// Scope required to read the user's top tracks.
pub const OAUTH_SCOPE: &str = "user-top-read";

/// Access/refresh token pair returned by the code exchange.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// External token provider: code exchange and token refresh.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn exchange(&self, code: &str) -> Result<TokenPair, AppError>;
    async fn refresh(&self, refresh_token: &str) -> Result<String, AppError>;
}

/// Generate a fresh alphanumeric login state.
pub fn generate_login_state() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// Build the provider authorize URL for the login redirect.
pub fn authorize_url(config: &Config, state: &str) -> Result<String, AppError> {
    let mut url = reqwest::Url::parse(&config.accounts_base_url)
        .and_then(|u| u.join("/authorize"))
        .map_err(|e| AppError::Internal(format!("Invalid accounts base URL: {}", e)))?;

    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("scope", OAUTH_SCOPE)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("state", state);

    Ok(url.into())
}

/// Constant-time state comparison.
fn state_matches(provided: &str, stored: &str) -> bool {
    provided.as_bytes().ct_eq(stored.as_bytes()).into()
}

/// Exchange an authorization code for tokens after verifying the state.
///
/// Rejects with `StateMismatch` when the returned state is absent or does
/// not equal the stored one; the provider is not contacted in that case.
pub async fn exchange_code(
    provider: &dyn TokenProvider,
    code: &str,
    state: Option<&str>,
    stored_state: Option<&str>,
) -> Result<TokenPair, AppError> {
    match (state, stored_state) {
        (Some(provided), Some(stored)) if state_matches(provided, stored) => {
            provider.exchange(code).await
        }
        _ => Err(AppError::StateMismatch),
    }
}

/// Return a usable access token for the session.
///
/// The cached token is trusted while present; expiry shows up as provider
/// rejection, handled by [`with_access_token`]. Without a cached token the
/// stored refresh token is redeemed and the result persisted on the session.
pub async fn valid_access_token(
    provider: &dyn TokenProvider,
    session: &mut Session,
) -> Result<String, AppError> {
    if let Some(token) = &session.access_token {
        return Ok(token.clone());
    }

    let refresh_token = session
        .refresh_token
        .clone()
        .ok_or_else(|| AppError::Auth("Not logged in".to_string()))?;

    let access_token = provider.refresh(&refresh_token).await?;
    session.access_token = Some(access_token.clone());
    Ok(access_token)
}

/// Run a provider call with a valid access token, refreshing and retrying
/// exactly once when the token is rejected.
pub async fn with_access_token<T, F, Fut>(
    provider: &dyn TokenProvider,
    session: &mut Session,
    call: F,
) -> Result<T, AppError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let token = valid_access_token(provider, session).await?;
    match call(token).await {
        Err(AppError::AuthRejected) => {
            tracing::info!("Access token rejected, refreshing and retrying once");
            session.access_token = None;
            let token = valid_access_token(provider, session).await?;
            call(token).await
        }
        other => other,
    }
}

/// HTTP implementation of [`TokenProvider`].
pub struct HttpTokenProvider {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl HttpTokenProvider {
    pub fn new(http: reqwest::Client, config: Arc<Config>) -> Self {
        Self { http, config }
    }

    fn token_url(&self) -> String {
        format!("{}/api/token", self.config.accounts_base_url)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Absent on refresh-grant responses
    refresh_token: Option<String>,
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn exchange(&self, code: &str) -> Result<TokenPair, AppError> {
        let response = self
            .http
            .post(self.token_url())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!("Token exchange failed with status {}", status);
            return Err(AppError::Auth(format!("Token exchange failed: {}", status)));
        }

        let body: TokenResponse = response.json().await?;
        let refresh_token = body.refresh_token.ok_or_else(|| {
            AppError::Auth("Token response missing refresh token".to_string())
        })?;

        Ok(TokenPair {
            access_token: body.access_token,
            refresh_token,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let response = self
            .http
            .post(self.token_url())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!("Token refresh failed with status {}", status);
            return Err(AppError::Auth(format!("Token refresh failed: {}", status)));
        }

        let body: TokenResponse = response.json().await?;
        Ok(body.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counting token-provider double.
    #[derive(Default)]
    struct CountingProvider {
        exchange_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn exchange(&self, _code: &str) -> Result<TokenPair, AppError> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            Ok(TokenPair {
                access_token: "access-1".to_string(),
                refresh_token: "refresh-1".to_string(),
            })
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<String, AppError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            Ok("access-2".to_string())
        }
    }

    fn test_config() -> Config {
        Config {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: "http://127.0.0.1:3000/callback".to_string(),
            accounts_base_url: "https://accounts.example.com".to_string(),
            api_base_url: "https://api.example.com/v1".to_string(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            http_timeout_secs: 5,
        }
    }

    #[test]
    fn test_generate_login_state() {
        let state = generate_login_state();
        assert_eq!(state.len(), STATE_LENGTH);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(state, generate_login_state());
    }

    #[test]
    fn test_authorize_url_params() {
        let url = authorize_url(&test_config(), "abc123").unwrap();
        assert!(url.starts_with("https://accounts.example.com/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("scope=user-top-read"));
        assert!(url.contains("state=abc123"));
    }

    #[test]
    fn test_state_matches() {
        assert!(state_matches("abc", "abc"));
        assert!(!state_matches("abc", "abd"));
        assert!(!state_matches("abc", "abcd"));
    }

    #[tokio::test]
    async fn test_exchange_code_happy_path() {
        let provider = CountingProvider::default();
        let pair = exchange_code(&provider, "code", Some("X"), Some("X"))
            .await
            .unwrap();
        assert_eq!(pair.access_token, "access-1");
        assert_eq!(provider.exchange_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exchange_code_state_mismatch_skips_network() {
        let provider = CountingProvider::default();

        let err = exchange_code(&provider, "code", Some("X"), None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), codes::STATE_MISMATCH);

        let err = exchange_code(&provider, "code", None, Some("X"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), codes::STATE_MISMATCH);

        let err = exchange_code(&provider, "code", Some("X"), Some("Y"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), codes::STATE_MISMATCH);

        // The provider was never contacted
        assert_eq!(provider.exchange_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_access_token_prefers_cache() {
        let provider = CountingProvider::default();
        let mut session = Session {
            access_token: Some("cached".to_string()),
            refresh_token: Some("refresh".to_string()),
            ..Session::default()
        };

        let token = valid_access_token(&provider, &mut session).await.unwrap();
        assert_eq!(token, "cached");
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_access_token_refreshes_when_absent() {
        let provider = CountingProvider::default();
        let mut session = Session {
            refresh_token: Some("refresh".to_string()),
            ..Session::default()
        };

        let token = valid_access_token(&provider, &mut session).await.unwrap();
        assert_eq!(token, "access-2");
        assert_eq!(session.access_token.as_deref(), Some("access-2"));
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_valid_access_token_without_login() {
        let provider = CountingProvider::default();
        let mut session = Session::default();

        let err = valid_access_token(&provider, &mut session).await.unwrap_err();
        assert_eq!(err.error_code(), codes::AUTH_ERROR);
    }

    #[tokio::test]
    async fn test_with_access_token_retries_once_on_rejection() {
        let provider = CountingProvider::default();
        let mut session = Session {
            access_token: Some("stale".to_string()),
            refresh_token: Some("refresh".to_string()),
            ..Session::default()
        };

        let attempts = AtomicUsize::new(0);
        let result = with_access_token(&provider, &mut session, |token| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(AppError::AuthRejected)
                } else {
                    Ok(token)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "access-2");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_access_token_no_second_retry() {
        let provider = CountingProvider::default();
        let mut session = Session {
            refresh_token: Some("refresh".to_string()),
            ..Session::default()
        };

        let attempts = AtomicUsize::new(0);
        let err = with_access_token(&provider, &mut session, |_token| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(AppError::AuthRejected) }
        })
        .await
        .unwrap_err();

        assert_eq!(err.error_code(), codes::AUTH_REJECTED);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
