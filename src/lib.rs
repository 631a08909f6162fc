// ABOUTME: Wearable-device authorization and tiered heart-rate acquisition
// ABOUTME: OAuth2 flows, callback parsing, fallback source chain, monitoring loop
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wearable authorization and heart-rate acquisition.
//!
//! This crate obtains and refreshes OAuth2 credentials for a wearable
//! cloud API, extracts tokens from heterogeneous redirect formats, and
//! serves a current heart-rate value through an ordered fallback chain
//! (live device, cloud API, fresh cache, physiological simulator), with
//! a persisted periodic monitoring loop. Acquisition never leaves the
//! caller without a value, even when every real source is unavailable.

/// Environment-driven configuration
pub mod config;
/// Defaults, limits, and provider endpoint paths
pub mod constants;
/// Collaborator traits for the wearable session and motion input
pub mod device;
/// Error taxonomy for authorization, storage, and acquisition
pub mod errors;
/// Tiered heart-rate acquisition engine and simulator
pub mod heart_rate;
/// Shared HTTP client construction
pub mod http_client;
/// Structured logging setup
pub mod logging;
/// Core data model
pub mod models;
/// Periodic monitoring scheduler
pub mod monitor;
/// OAuth2 flows, PKCE, and callback parsing
pub mod oauth2;
/// Device identity resolution
pub mod profile;
/// Persisted record store
pub mod store;

// Re-export key types for convenience

pub use config::{Config, OAuthConfig};
pub use device::{MotionSource, WearableDevice};
pub use errors::{AuthError, AuthResult, ProviderError, ProviderResult, StorageError};
pub use heart_rate::{simulator::HeartRateSimulator, HeartRateService};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use models::{
    Credential, DeviceIdentity, HeartRateReading, HeartRateSource, MonitoringState,
};
pub use monitor::MonitoringScheduler;
pub use oauth2::{
    AuthEvent, AuthorizationFlowManager, CallbackParser, ExternalAuthorizer, GrantFlow,
    OAuth2Client, PkceParams, TokenExtraction,
};
pub use profile::DeviceProfileResolver;
pub use store::{FileStore, MemoryStore, RecordStore};
