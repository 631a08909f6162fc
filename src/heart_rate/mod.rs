// ABOUTME: Tiered heart-rate acquisition: live device, cloud API, cache, simulator
// ABOUTME: Fallback order is explicit data; acquisition always yields a reading
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Physiological simulator used by the final tier
pub mod simulator;

use std::collections::VecDeque;
use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::constants::{endpoints, limits};
use crate::device::{MotionSource, WearableDevice};
use crate::errors::{ProviderError, ProviderResult};
use crate::http_client::api_client;
use crate::models::{Credential, HeartRateReading, HeartRateSource};
use crate::oauth2::flow::{AuthEvent, AuthorizationFlowManager};
use crate::store::RecordStore;
use simulator::HeartRateSimulator;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Intraday heart-rate series response
#[derive(Debug, Deserialize)]
struct HeartRateSeriesResponse {
    #[serde(rename = "activities-heart-intraday")]
    intraday: Option<IntradaySeries>,
}

#[derive(Debug, Deserialize)]
struct IntradaySeries {
    dataset: Vec<IntradaySample>,
}

#[derive(Debug, Deserialize)]
struct IntradaySample {
    #[allow(dead_code)]
    time: String,
    value: u32,
}

/// The tiered acquisition engine
///
/// `latest()` is infallible by contract: each tier is attempted in order
/// and the simulator guarantees a value when every real source is
/// unavailable. Every reading, whatever its tier, is appended to a
/// bounded persisted history.
pub struct HeartRateService {
    api_base_url: String,
    http: reqwest::Client,
    store: Arc<dyn RecordStore>,
    flow: Arc<AuthorizationFlowManager>,
    device: Option<Arc<dyn WearableDevice>>,
    motion: Option<Arc<dyn MotionSource>>,
    history: RwLock<VecDeque<HeartRateReading>>,
    simulator: Mutex<HeartRateSimulator>,
}

impl HeartRateService {
    /// Create the acquisition engine over storage and the flow manager
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
            device: None,
            motion: None,
            history: RwLock::new(VecDeque::new()),
            simulator: Mutex::new(HeartRateSimulator::new()),
        }
    }

    /// Attach the live-device collaborator (tier 1)
    #[must_use]
    pub fn with_device(mut self, device: Arc<dyn WearableDevice>) -> Self {
        self.device = Some(device);
        self
    }

    /// Attach the accelerometer source driving the simulator
    #[must_use]
    pub fn with_motion(mut self, motion: Arc<dyn MotionSource>) -> Self {
        self.motion = Some(motion);
        self
    }

    /// Load the persisted reading history into memory
    ///
    /// Called once at subsystem initialization so the cached tier
    /// survives restarts. Storage failures are logged and leave the
    /// history empty.
    pub async fn hydrate(&self) {
        match self.store.load_history().await {
            Ok(persisted) => {
                let mut history = self.history.write().await;
                *history = persisted.into_iter().collect();
                while history.len() > limits::HISTORY_CAPACITY {
                    history.pop_front();
                }
            }
            Err(e) => warn!(error = %e, "reading history could not be loaded"),
        }
    }

    /// Acquire the current heart rate through the tier chain
    ///
    /// Tier order: live device, cloud API, fresh cache, simulator. No
    /// tier failure is fatal; network and auth errors are logged and
    /// cause fallthrough.
    pub async fn latest(&self) -> HeartRateReading {
        if let Some(value) = self.try_live_device().await {
            return self.record(value, HeartRateSource::LiveDevice).await;
        }
        if let Some(value) = self.try_cloud_api().await {
            return self.record(value, HeartRateSource::CloudApi).await;
        }
        if let Some(value) = self.fresh_cached_value().await {
            return self.record(value, HeartRateSource::Cached).await;
        }

        let value = self.simulate().await;
        self.record(value, HeartRateSource::Simulated).await
    }

    /// Whether the cloud tier has a valid credential to work with
    pub async fn is_connected(&self) -> bool {
        match self.store.load_credential().await {
            Ok(Some(credential)) => credential.is_valid(),
            _ => false,
        }
    }

    /// Snapshot of the bounded reading history, oldest first
    pub async fn history(&self) -> Vec<HeartRateReading> {
        self.history.read().await.iter().cloned().collect()
    }

    /// Remove all readings from memory and storage
    pub async fn clear_history(&self) {
        self.history.write().await.clear();
        if let Err(e) = self.store.save_history(&[]).await {
            warn!(error = %e, "cleared history could not be persisted");
        }
    }

    /// React to authorization events in the background
    ///
    /// A disconnect clears the reading history so the cached tier cannot
    /// serve values that belonged to the previous account.
    pub fn spawn_event_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<AuthEvent>,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if matches!(event, AuthEvent::Disconnected) {
                    debug!("auth disconnect observed; clearing reading history");
                    service.clear_history().await;
                }
            }
        })
    }

    async fn try_live_device(&self) -> Option<u32> {
        let device = self.device.as_ref()?;
        if !device.is_session_active().await {
            return None;
        }
        match device.read_heart_rate().await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "live device read failed, falling through");
                None
            }
        }
    }

    async fn try_cloud_api(&self) -> Option<u32> {
        let credential = match self.store.load_credential().await {
            Ok(Some(credential)) if credential.is_valid() => credential,
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "credential load failed, skipping cloud tier");
                return None;
            }
        };

        match self.fetch_cloud(&credential).await {
            Ok(value) => Some(value),
            Err(e) if e.is_auth_error() => self.retry_cloud_after_refresh().await,
            Err(e) => {
                warn!(error = %e, "cloud fetch failed, falling through");
                None
            }
        }
    }

    /// One refresh-and-retry on 401; a second rejection clears the
    /// stored credential, which is by then known invalid.
    async fn retry_cloud_after_refresh(&self) -> Option<u32> {
        match self.flow.refresh().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("refresh unavailable after 401, falling through");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "refresh failed after 401, falling through");
                return None;
            }
        }

        let credential = match self.store.load_credential().await {
            Ok(Some(credential)) => credential,
            _ => return None,
        };

        match self.fetch_cloud(&credential).await {
            Ok(value) => Some(value),
            Err(e) if e.is_auth_error() => {
                warn!("token rejected again after refresh; clearing credential");
                if let Err(storage) = self.store.clear_credential().await {
                    error!(error = %storage, "failed to clear invalid credential");
                }
                None
            }
            Err(e) => {
                warn!(error = %e, "cloud retry failed, falling through");
                None
            }
        }
    }

    async fn fetch_cloud(&self, credential: &Credential) -> ProviderResult<u32> {
        let url = format!(
            "{}{}",
            self.api_base_url,
            endpoints::heart_rate_path("today")
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&credential.access_token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Unauthorized {
                provider: "cloud-api".into(),
            });
        }
        if !response.status().is_success() {
            return Err(ProviderError::UnexpectedStatus {
                provider: "cloud-api".into(),
                status: response.status().as_u16(),
            });
        }

        let series: HeartRateSeriesResponse = response.json().await?;
        series
            .intraday
            .and_then(|intraday| intraday.dataset.last().map(|sample| sample.value))
            .ok_or_else(|| ProviderError::NoData {
                provider: "cloud-api".into(),
            })
    }

    /// Newest real (device or cloud) reading still within the freshness
    /// window. Simulated and cached entries are not candidates, so the
    /// cache tier never launders a simulated value into a fresh-looking
    /// one.
    async fn fresh_cached_value(&self) -> Option<u32> {
        let history = self.history.read().await;
        history
            .iter()
            .rev()
            .find(|reading| {
                matches!(
                    reading.source,
                    HeartRateSource::LiveDevice | HeartRateSource::CloudApi
                ) && reading.is_fresh(limits::CACHE_FRESHNESS_SECS)
            })
            .map(|reading| reading.value)
    }

    async fn simulate(&self) -> u32 {
        let magnitude = match &self.motion {
            Some(motion) => motion.acceleration_magnitude().await,
            None => None,
        };

        let mut simulator = self.simulator.lock().await;
        match magnitude {
            Some(magnitude) => simulator.motion_sample(magnitude),
            None => simulator.tick(),
        }
    }

    async fn record(&self, value: u32, source: HeartRateSource) -> HeartRateReading {
        let reading = HeartRateReading::now(value, source);

        let snapshot = {
            let mut history = self.history.write().await;
            history.push_back(reading.clone());
            while history.len() > limits::HISTORY_CAPACITY {
                history.pop_front();
            }
            history.iter().cloned().collect::<Vec<_>>()
        };

        if let Err(e) = self.store.save_history(&snapshot).await {
            warn!(error = %e, "reading history could not be persisted");
        }

        reading
    }
}
