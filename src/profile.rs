// ABOUTME: Device identity resolution from the provider profile endpoint
// ABOUTME: One refresh-and-retry on 401; repeated failure never clears the token
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::constants::endpoints;
use crate::http_client::api_client;
use crate::models::{Credential, DeviceIdentity};
use crate::oauth2::flow::{AuthEvent, AuthorizationFlowManager};
use crate::store::RecordStore;

/// Profile endpoint response shape
#[derive(Debug, Deserialize)]
pub(crate) struct ProfileResponse {
    /// The profile payload
    pub user: ProfileUser,
}

/// Profile fields this subsystem consumes
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfileUser {
    /// Provider-assigned identifier
    pub encoded_id: String,
    /// Display name
    pub display_name: String,
    /// Battery level percentage, reported by some providers
    #[serde(default)]
    pub battery_level: Option<u8>,
    /// Device model, reported by some providers
    #[serde(default)]
    pub device_model: Option<String>,
}

/// Turns a stored credential into a connected-device identity
pub struct DeviceProfileResolver {
    api_base_url: String,
    http: reqwest::Client,
    store: Arc<dyn RecordStore>,
    flow: Arc<AuthorizationFlowManager>,
    cached: RwLock<Option<DeviceIdentity>>,
}

impl DeviceProfileResolver {
    /// Create a resolver over the given storage and flow manager
    #[must_use]
    pub fn new(
        api_base_url: impl Into<String>,
        store: Arc<dyn RecordStore>,
        flow: Arc<AuthorizationFlowManager>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            http: api_client(),
            store,
            flow,
            cached: RwLock::new(None),
        }
    }

    /// Resolve the connected device identity from the stored credential
    ///
    /// On a 401 a single refresh is attempted, then one retry. Repeated
    /// failure returns `None` without clearing the token, which may still
    /// be valid for other endpoints.
    pub async fn resolve(&self) -> Option<DeviceIdentity> {
        let credential = match self.store.load_credential().await {
            Ok(Some(credential)) => credential,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "credential load failed during identity resolution");
                return None;
            }
        };

        match self.fetch_identity(&credential).await {
            FetchOutcome::Resolved(identity) => {
                *self.cached.write().await = Some(identity.clone());
                Some(identity)
            }
            FetchOutcome::Unauthorized => self.retry_after_refresh().await,
            FetchOutcome::Failed => None,
        }
    }

    /// The identity cached by the last successful resolution
    pub async fn identity(&self) -> Option<DeviceIdentity> {
        self.cached.read().await.clone()
    }

    /// Drop the cached identity (called on disconnect)
    pub async fn clear_cache(&self) {
        *self.cached.write().await = None;
    }

    /// React to authorization events in the background
    ///
    /// A disconnect drops the cached identity so the resolver cannot keep
    /// serving the previous account after the credential is gone.
    pub fn spawn_event_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<AuthEvent>,
    ) -> JoinHandle<()> {
        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if matches!(event, AuthEvent::Disconnected) {
                    debug!("auth disconnect observed; dropping cached identity");
                    resolver.clear_cache().await;
                }
            }
        })
    }

    async fn retry_after_refresh(&self) -> Option<DeviceIdentity> {
        match self.flow.refresh().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("refresh unavailable; identity resolution gives up");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "refresh failed during identity resolution");
                return None;
            }
        }

        let credential = match self.store.load_credential().await {
            Ok(Some(credential)) => credential,
            _ => return None,
        };

        match self.fetch_identity(&credential).await {
            FetchOutcome::Resolved(identity) => {
                *self.cached.write().await = Some(identity.clone());
                Some(identity)
            }
            FetchOutcome::Unauthorized | FetchOutcome::Failed => None,
        }
    }

    async fn fetch_identity(&self, credential: &Credential) -> FetchOutcome {
        let url = format!("{}{}", self.api_base_url, endpoints::PROFILE_PATH);
        let response = match self
            .http
            .get(&url)
            .bearer_auth(&credential.access_token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "profile request failed");
                return FetchOutcome::Failed;
            }
        };

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("profile endpoint rejected the access token");
            return FetchOutcome::Unauthorized;
        }
        if !response.status().is_success() {
            warn!(status = %response.status(), "profile endpoint returned unexpected status");
            return FetchOutcome::Failed;
        }

        match response.json::<ProfileResponse>().await {
            Ok(profile) => FetchOutcome::Resolved(DeviceIdentity {
                id: profile.user.encoded_id,
                display_name: profile.user.display_name,
                battery_level: profile.user.battery_level,
                model: profile.user.device_model,
            }),
            Err(e) => {
                warn!(error = %e, "profile response unparseable");
                FetchOutcome::Failed
            }
        }
    }
}

enum FetchOutcome {
    Resolved(DeviceIdentity),
    Unauthorized,
    Failed,
}
