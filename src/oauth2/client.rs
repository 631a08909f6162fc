// ABOUTME: OAuth2 client: authorization URL construction, code exchange, refresh, revoke
// ABOUTME: Token endpoint calls authenticate with HTTP Basic client credentials
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{Duration, Utc};
use serde::Deserialize;
use url::Url;

use crate::config::OAuthConfig;
use crate::constants::oauth::DEFAULT_TOKEN_EXPIRY_SECS;
use crate::errors::{AuthError, AuthResult};
use crate::http_client::oauth_client;
use crate::models::Credential;
use crate::oauth2::pkce::PkceParams;

/// Which grant flow an authorization attempt uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantFlow {
    /// Token returned directly in the redirect; no refresh token
    Implicit,
    /// Authorization code exchanged at the token endpoint, bound by PKCE
    AuthorizationCodePkce,
}

impl GrantFlow {
    /// The `response_type` parameter value for this flow
    #[must_use]
    pub const fn response_type(self) -> &'static str {
        match self {
            Self::Implicit => "token",
            Self::AuthorizationCodePkce => "code",
        }
    }
}

/// OAuth 2.0 client for the wearable provider
pub struct OAuth2Client {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl OAuth2Client {
    /// Create a client from provider configuration
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            client: oauth_client(),
        }
    }

    /// The OAuth configuration in use
    #[must_use]
    pub const fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL for a flow
    ///
    /// PKCE parameters are attached only for the authorization-code flow.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorization URL is malformed.
    pub fn authorization_url(
        &self,
        flow: GrantFlow,
        state: &str,
        pkce: Option<&PkceParams>,
    ) -> AuthResult<String> {
        let mut url = Url::parse(&self.config.auth_url)?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", flow.response_type())
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.config.redirect_uri)
                .append_pair("scope", &self.config.scopes.join(" "))
                .append_pair("state", state);

            if flow == GrantFlow::AuthorizationCodePkce {
                if let Some(pkce) = pkce {
                    query
                        .append_pair("code_challenge", &pkce.code_challenge)
                        .append_pair("code_challenge_method", &pkce.code_challenge_method);
                }
            }
        }

        Ok(url.to_string())
    }

    /// Exchange an authorization code for a credential
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the endpoint rejects the code.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> AuthResult<Credential> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
            ("client_id", self.config.client_id.as_str()),
        ];

        self.token_request(&params).await
    }

    /// Refresh an access token
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the refresh token is rejected.
    pub async fn refresh_token(&self, refresh_token: &str) -> AuthResult<Credential> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        self.token_request(&params).await
    }

    /// Revoke an access token, best effort
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn revoke_token(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .client
            .post(&self.config.revoke_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("token", access_token)])
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AuthError::TokenEndpoint {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> AuthResult<Credential> {
        let response = self
            .client
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: TokenResponse = response.json().await?;
        Ok(credential_from_response(body))
    }
}

/// Token endpoint response shape
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

fn credential_from_response(response: TokenResponse) -> Credential {
    let lifetime = response.expires_in.unwrap_or(DEFAULT_TOKEN_EXPIRY_SECS);
    Credential {
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        expires_at: Utc::now() + Duration::seconds(lifetime),
        user_id: response.user_id,
        scope: response.scope,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OAuthConfig {
        OAuthConfig {
            client_id: "client".into(),
            client_secret: "secret".into(),
            auth_url: "https://provider.example/oauth2/authorize".into(),
            token_url: "https://provider.example/oauth2/token".into(),
            revoke_url: "https://provider.example/oauth2/revoke".into(),
            redirect_uri: "https://heartbridge.app/auth/callback".into(),
            app_scheme_redirect: "heartbridge://auth".into(),
            scopes: vec!["heartrate".into(), "profile".into()],
        }
    }

    #[test]
    fn implicit_url_requests_token_response_type() {
        let client = OAuth2Client::new(test_config());
        let url = client
            .authorization_url(GrantFlow::Implicit, "state123", None)
            .unwrap();

        assert!(url.contains("response_type=token"));
        assert!(url.contains("state=state123"));
        assert!(!url.contains("code_challenge"));
    }

    #[test]
    fn pkce_url_attaches_challenge() {
        let client = OAuth2Client::new(test_config());
        let pkce = PkceParams::generate();
        let url = client
            .authorization_url(GrantFlow::AuthorizationCodePkce, "state123", Some(&pkce))
            .unwrap();

        assert!(url.contains("response_type=code"));
        assert!(url.contains(&format!("code_challenge={}", pkce.code_challenge)));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn response_defaults_expiry_when_omitted() {
        let credential = credential_from_response(TokenResponse {
            access_token: "tok".into(),
            refresh_token: None,
            expires_in: None,
            user_id: None,
            scope: None,
        });
        assert!(credential.is_valid());
        assert!(credential.expires_at > Utc::now() + Duration::hours(7));
    }
}
