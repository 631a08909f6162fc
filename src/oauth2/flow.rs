// ABOUTME: Authorization flow orchestration: grant flows, callback handling, refresh
// ABOUTME: Publishes completion events on a broadcast channel, decoupled from any UI
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::constants::{endpoints, oauth::DEFAULT_TOKEN_EXPIRY_SECS};
use crate::errors::{AuthError, AuthResult};
use crate::http_client::api_client;
use crate::models::Credential;
use crate::oauth2::callback::{CallbackParser, TokenExtraction};
use crate::oauth2::client::{GrantFlow, OAuth2Client};
use crate::oauth2::pkce::{generate_state, PkceParams};
use crate::profile::ProfileResponse;
use crate::store::RecordStore;

/// Events published as authorization attempts conclude
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// An authorization attempt finished
    Completed {
        /// Whether a validated credential is now stored
        success: bool,
        /// Provider user ID, when known
        user_id: Option<String>,
    },
    /// The stored credential was removed on explicit disconnect
    Disconnected,
}

/// The external user-agent round trip
///
/// `open` presents the authorization URL to the user (system browser,
/// custom tab, test stub) and suspends until the provider redirects back
/// or the user dismisses the agent. Dismissal resolves to `None`.
#[async_trait]
pub trait ExternalAuthorizer: Send + Sync {
    /// Open the authorization URL and wait for the redirect URL
    async fn open(&self, authorization_url: &str) -> Option<String>;
}

/// Drives the two supported grant flows and owns credential mutation
///
/// Only this manager (via callback handling and refresh) writes the
/// stored credential; refresh is serialized behind a lock so no dependent
/// request can race a half-finished refresh.
pub struct AuthorizationFlowManager {
    client: OAuth2Client,
    store: Arc<dyn RecordStore>,
    parser: CallbackParser,
    authorizer: Arc<dyn ExternalAuthorizer>,
    api_base_url: String,
    http: reqwest::Client,
    refresh_lock: Mutex<()>,
    pending_state: Mutex<Option<String>>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthorizationFlowManager {
    /// Create a flow manager from configuration, storage, and the
    /// external user-agent seam
    #[must_use]
    pub fn new(
        config: &Config,
        store: Arc<dyn RecordStore>,
        authorizer: Arc<dyn ExternalAuthorizer>,
    ) -> Self {
        let parser = CallbackParser::new(vec![
            config.oauth.redirect_uri.clone(),
            config.oauth.app_scheme_redirect.clone(),
        ]);
        let (events, _) = broadcast::channel(16);

        Self {
            client: OAuth2Client::new(config.oauth.clone()),
            store,
            parser,
            authorizer,
            api_base_url: config.api_base_url.clone(),
            http: api_client(),
            refresh_lock: Mutex::new(()),
            pending_state: Mutex::new(None),
            events,
        }
    }

    /// Subscribe to authorization completion events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Run an authorization attempt with the given flow
    ///
    /// Clears any previous credential, opens the provider's authorization
    /// endpoint in the external agent, and suspends until the agent
    /// returns a redirect or is dismissed. Dismissal yields `Ok(false)`
    /// with nothing stored. All authorization-level failures surface as
    /// `Ok(false)`; only storage faults propagate as errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored credential cannot be cleared or the
    /// verifier slot cannot be written.
    pub async fn authorize(&self, flow: GrantFlow) -> AuthResult<bool> {
        self.store.clear_credential().await?;

        let state = generate_state();
        *self.pending_state.lock().await = Some(state.clone());

        let pkce = match flow {
            GrantFlow::AuthorizationCodePkce => {
                let pkce = PkceParams::generate();
                self.store.save_code_verifier(&pkce.code_verifier).await?;
                Some(pkce)
            }
            GrantFlow::Implicit => None,
        };

        let url = self.client.authorization_url(flow, &state, pkce.as_ref())?;
        info!(flow = ?flow, "opening authorization endpoint in external agent");

        let Some(redirect) = self.authorizer.open(&url).await else {
            debug!("authorization dismissed by user before redirect");
            return Ok(false);
        };

        match self.handle_callback(&redirect).await {
            Ok(success) => Ok(success),
            Err(e) => {
                error!(error = %e, "callback handling failed");
                self.publish(AuthEvent::Completed {
                    success: false,
                    user_id: None,
                });
                Ok(false)
            }
        }
    }

    /// Handle a redirect/deep-link URL delivered by the platform
    ///
    /// # Errors
    ///
    /// Returns an error on transport or storage faults; recognized
    /// authorization failures (provider error, failed validation,
    /// rejected code) surface as `Ok(false)`.
    pub async fn handle_callback(&self, url: &str) -> AuthResult<bool> {
        let Some(extraction) = self.parser.extract(url) else {
            warn!("callback URL matched no extraction strategy");
            self.publish(AuthEvent::Completed {
                success: false,
                user_id: None,
            });
            return Ok(false);
        };

        match extraction {
            TokenExtraction::Denied { error, description } => {
                warn!(error, description = ?description, "provider denied authorization");
                self.publish(AuthEvent::Completed {
                    success: false,
                    user_id: None,
                });
                Ok(false)
            }
            TokenExtraction::AuthorizationCode { code } => self.complete_code_exchange(&code).await,
            TokenExtraction::DirectPath { access_token }
            | TokenExtraction::LooseToken { access_token } => {
                self.complete_token_callback(access_token, None, None, None, None)
                    .await
            }
            TokenExtraction::Fragment {
                access_token,
                expires_in,
                user_id,
                scope,
                state,
            } => {
                self.check_state_echo(state.as_deref()).await;
                self.complete_token_callback(access_token, expires_in, user_id, scope, state)
                    .await
            }
        }
    }

    /// Refresh the stored credential
    ///
    /// Returns `Ok(false)` when no refresh token is available or the
    /// endpoint rejects the refresh; the existing (possibly stale)
    /// credential is left untouched in that case.
    ///
    /// # Errors
    ///
    /// Returns an error only when storage fails.
    pub async fn refresh(&self) -> AuthResult<bool> {
        let _guard = self.refresh_lock.lock().await;

        let Some(current) = self.store.load_credential().await? else {
            debug!("refresh requested with no stored credential");
            return Ok(false);
        };
        let Some(refresh_token) = current.refresh_token.clone() else {
            debug!("credential has no refresh token; re-authorization required");
            return Ok(false);
        };

        match self.client.refresh_token(&refresh_token).await {
            Ok(mut renewed) => {
                // The provider may omit rotation and identity fields on
                // refresh; carry them over from the replaced credential.
                if renewed.refresh_token.is_none() {
                    renewed.refresh_token = Some(refresh_token);
                }
                if renewed.user_id.is_none() {
                    renewed.user_id = current.user_id;
                }
                if renewed.scope.is_none() {
                    renewed.scope = current.scope;
                }
                self.store.save_credential(&renewed).await?;
                info!("access token refreshed");
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed; keeping existing credential");
                Ok(false)
            }
        }
    }

    /// Whether a valid (unexpired) credential is currently stored
    pub async fn is_connected(&self) -> bool {
        match self.store.load_credential().await {
            Ok(Some(credential)) => credential.is_valid(),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "credential load failed during connection check");
                false
            }
        }
    }

    /// Revoke (best effort) and remove the stored credential
    ///
    /// # Errors
    ///
    /// Returns an error only when storage fails; a failed revoke call is
    /// logged and does not block the disconnect.
    pub async fn disconnect(&self) -> AuthResult<()> {
        if let Some(credential) = self.store.load_credential().await? {
            if let Err(e) = self.client.revoke_token(&credential.access_token).await {
                warn!(error = %e, "token revocation failed during disconnect");
            }
        }
        self.store.clear_credential().await?;
        self.publish(AuthEvent::Disconnected);
        info!("disconnected from provider");
        Ok(())
    }

    async fn complete_code_exchange(&self, code: &str) -> AuthResult<bool> {
        let Some(verifier) = self.store.take_code_verifier().await? else {
            warn!("authorization code arrived with no pending verifier");
            self.publish(AuthEvent::Completed {
                success: false,
                user_id: None,
            });
            return Ok(false);
        };

        match self.client.exchange_code(code, &verifier).await {
            Ok(credential) => {
                self.store.save_credential(&credential).await?;
                // The exchange itself proves the token; the profile call
                // here only warms identity and may fail without
                // invalidating anything.
                let user_id = match self.validate_token(&credential.access_token).await {
                    Some(id) => Some(id),
                    None => credential.user_id.clone(),
                };
                info!("authorization-code exchange completed");
                self.publish(AuthEvent::Completed {
                    success: true,
                    user_id,
                });
                Ok(true)
            }
            Err(AuthError::TokenEndpoint { status, body }) => {
                warn!(status, body, "token endpoint rejected authorization code");
                self.publish(AuthEvent::Completed {
                    success: false,
                    user_id: None,
                });
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn complete_token_callback(
        &self,
        access_token: String,
        expires_in: Option<i64>,
        user_id: Option<String>,
        scope: Option<String>,
        _state: Option<String>,
    ) -> AuthResult<bool> {
        let credential = Credential {
            access_token,
            refresh_token: None,
            expires_at: Utc::now()
                + Duration::seconds(expires_in.unwrap_or(DEFAULT_TOKEN_EXPIRY_SECS)),
            user_id,
            scope,
        };
        self.store.save_credential(&credential).await?;

        // A token lifted straight out of a redirect has never been proven
        // against the API. Keeping it on validation failure would leave
        // the UI reporting a false connected state, so it is removed.
        match self.validate_token(&credential.access_token).await {
            Some(validated_user_id) => {
                let user_id = if credential.user_id.is_some() {
                    credential.user_id
                } else {
                    let mut updated = credential.clone();
                    updated.user_id = Some(validated_user_id.clone());
                    self.store.save_credential(&updated).await?;
                    Some(validated_user_id)
                };
                info!("redirect token validated and stored");
                self.publish(AuthEvent::Completed {
                    success: true,
                    user_id,
                });
                Ok(true)
            }
            None => {
                warn!("extracted token failed validation; removing it");
                self.store.clear_credential().await?;
                self.publish(AuthEvent::Completed {
                    success: false,
                    user_id: None,
                });
                Ok(false)
            }
        }
    }

    /// Validate a token against the profile endpoint
    ///
    /// Any failure (transport, non-success status, unparseable body)
    /// counts as validation failure and returns `None`.
    async fn validate_token(&self, access_token: &str) -> Option<String> {
        let url = format!("{}{}", self.api_base_url, endpoints::PROFILE_PATH);
        let response = match self.http.get(&url).bearer_auth(access_token).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "token validation request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "token validation rejected");
            return None;
        }

        match response.json::<ProfileResponse>().await {
            Ok(profile) => Some(profile.user.encoded_id),
            Err(e) => {
                warn!(error = %e, "profile response unparseable during validation");
                None
            }
        }
    }

    /// Compare the echoed state with the one generated for this attempt
    ///
    /// Some redirect targets strip the parameter, so a mismatch or a
    /// missing echo is logged rather than treated as fatal.
    async fn check_state_echo(&self, echoed: Option<&str>) {
        let expected = self.pending_state.lock().await.take();
        match (expected, echoed) {
            (Some(expected), Some(echoed)) if expected != echoed => {
                warn!("state echoed by provider does not match the generated value");
            }
            (Some(_), None) => {
                debug!("redirect target stripped the state parameter");
            }
            _ => {}
        }
    }

    fn publish(&self, event: AuthEvent) {
        // Nobody listening is fine; events are advisory.
        let _ = self.events.send(event);
    }
}
