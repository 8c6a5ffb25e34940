//! Configuration module for the Guessify backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth client id registered with the music provider
    pub client_id: String,
    /// OAuth client secret registered with the music provider
    pub client_secret: String,
    /// Redirect URI sent with the authorization request
    pub redirect_uri: String,
    /// Base URL of the provider's accounts service (authorize/token endpoints)
    pub accounts_base_url: String,
    /// Base URL of the provider's catalog API
    pub api_base_url: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Timeout applied to all outbound HTTP requests, in seconds
    pub http_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let client_id = env::var("GUESSIFY_CLIENT_ID").unwrap_or_default();
        let client_secret = env::var("GUESSIFY_CLIENT_SECRET").unwrap_or_default();

        let redirect_uri = env::var("GUESSIFY_REDIRECT_URI")
            .unwrap_or_else(|_| "http://127.0.0.1:3000/callback".to_string());

        let accounts_base_url = env::var("GUESSIFY_ACCOUNTS_BASE_URL")
            .unwrap_or_else(|_| "https://accounts.spotify.com".to_string());

        let api_base_url = env::var("GUESSIFY_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.spotify.com/v1".to_string());

        let bind_addr = env::var("GUESSIFY_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .expect("Invalid GUESSIFY_BIND_ADDR format");

        let log_level = env::var("GUESSIFY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let http_timeout_secs = env::var("GUESSIFY_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Self {
            client_id,
            client_secret,
            redirect_uri,
            accounts_base_url,
            api_base_url,
            bind_addr,
            log_level,
            http_timeout_secs,
        }
    }
}
