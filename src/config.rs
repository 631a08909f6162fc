// ABOUTME: Environment-driven configuration for provider endpoints and OAuth credentials
// ABOUTME: Typed Config with explicit constructors for tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::env;

use crate::constants::{endpoints, monitoring, oauth};

/// OAuth client configuration for the wearable provider
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID issued by the provider
    pub client_id: String,
    /// OAuth client secret issued by the provider
    pub client_secret: String,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Token revocation endpoint URL
    pub revoke_url: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
    /// Custom app-scheme redirect accepted alongside the HTTPS one
    pub app_scheme_redirect: String,
    /// Scopes to request
    pub scopes: Vec<String>,
}

/// Top-level configuration for the acquisition subsystem
#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth client settings
    pub oauth: OAuthConfig,
    /// Base URL of the provider data API
    pub api_base_url: String,
    /// Default monitoring interval (milliseconds)
    pub monitoring_interval_ms: u64,
}

impl Config {
    /// Build configuration from `HEARTBRIDGE_*` environment variables
    ///
    /// Unset endpoint variables fall back to the Fitbit production URLs;
    /// client credentials default to empty strings so tests can construct
    /// a config without any environment.
    #[must_use]
    pub fn from_env() -> Self {
        let api_base_url = env::var("HEARTBRIDGE_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.fitbit.com".into());
        let auth_base = env::var("HEARTBRIDGE_AUTH_BASE_URL")
            .unwrap_or_else(|_| "https://www.fitbit.com".into());

        let monitoring_interval_ms = env::var("HEARTBRIDGE_MONITOR_INTERVAL_MS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(monitoring::DEFAULT_INTERVAL_MS);

        Self {
            oauth: OAuthConfig {
                client_id: env::var("HEARTBRIDGE_CLIENT_ID").unwrap_or_default(),
                client_secret: env::var("HEARTBRIDGE_CLIENT_SECRET").unwrap_or_default(),
                auth_url: format!("{auth_base}{}", endpoints::AUTHORIZE_PATH),
                token_url: format!("{api_base_url}{}", endpoints::TOKEN_PATH),
                revoke_url: format!("{api_base_url}{}", endpoints::REVOKE_PATH),
                redirect_uri: env::var("HEARTBRIDGE_REDIRECT_URI")
                    .unwrap_or_else(|_| "https://heartbridge.app/auth/callback".into()),
                app_scheme_redirect: env::var("HEARTBRIDGE_APP_REDIRECT")
                    .unwrap_or_else(|_| "heartbridge://auth".into()),
                scopes: oauth::DEFAULT_SCOPES.iter().map(|s| (*s).to_owned()).collect(),
            },
            api_base_url,
            monitoring_interval_ms,
        }
    }

    /// Build a configuration with every endpoint rooted at `base_url`
    ///
    /// Used by tests that stand in for the provider with a local server.
    #[must_use]
    pub fn for_base_url(base_url: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            oauth: OAuthConfig {
                client_id: client_id.to_owned(),
                client_secret: client_secret.to_owned(),
                auth_url: format!("{base_url}{}", endpoints::AUTHORIZE_PATH),
                token_url: format!("{base_url}{}", endpoints::TOKEN_PATH),
                revoke_url: format!("{base_url}{}", endpoints::REVOKE_PATH),
                redirect_uri: "https://heartbridge.app/auth/callback".into(),
                app_scheme_redirect: "heartbridge://auth".into(),
                scopes: oauth::DEFAULT_SCOPES.iter().map(|s| (*s).to_owned()).collect(),
            },
            api_base_url: base_url.to_owned(),
            monitoring_interval_ms: monitoring::DEFAULT_INTERVAL_MS,
        }
    }
}
