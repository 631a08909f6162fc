// ABOUTME: Core data model: credentials, device identity, readings, monitoring state
// ABOUTME: All persisted records round-trip losslessly through serde
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An OAuth2 credential for the wearable cloud API
///
/// A credential is valid iff `expires_at` is in the future. Implicit-flow
/// credentials carry no refresh token and must be re-obtained through a
/// fresh authorization once expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer access token
    pub access_token: String,
    /// Refresh token, absent for implicit-flow credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry timestamp (UTC)
    pub expires_at: DateTime<Utc>,
    /// Provider user ID, when the token response carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Granted scopes, space separated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Credential {
    /// Whether the credential has not yet expired
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }

    /// Whether the credential expires within the next five minutes
    #[must_use]
    pub fn will_expire_soon(&self) -> bool {
        self.expires_at <= Utc::now() + Duration::minutes(5)
    }

    /// Whether a refresh can be attempted at all
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// Identity of the connected wearable account
///
/// Derived from a profile lookup after authorization; cached until
/// disconnect and not independently persisted beyond the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Provider-assigned identifier
    pub id: String,
    /// Display name shown to the user
    pub display_name: String,
    /// Battery level percentage, when the provider reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,
    /// Device model, when the provider reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Which acquisition tier produced a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartRateSource {
    /// Read directly from a connected wearable session
    LiveDevice,
    /// Fetched from the provider cloud API
    CloudApi,
    /// Served from the recent reading history
    Cached,
    /// Produced by the physiological simulator
    Simulated,
}

impl std::fmt::Display for HeartRateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::LiveDevice => "live-device",
            Self::CloudApi => "cloud-api",
            Self::Cached => "cached",
            Self::Simulated => "simulated",
        };
        f.write_str(name)
    }
}

/// A single heart-rate sample, immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateReading {
    /// Heart rate in beats per minute
    pub value: u32,
    /// When the sample was acquired (UTC)
    pub timestamp: DateTime<Utc>,
    /// Tier that produced the sample
    pub source: HeartRateSource,
}

impl HeartRateReading {
    /// Create a reading stamped with the current time
    #[must_use]
    pub fn now(value: u32, source: HeartRateSource) -> Self {
        Self {
            value,
            timestamp: Utc::now(),
            source,
        }
    }

    /// Whether the reading is younger than `max_age_secs`
    #[must_use]
    pub fn is_fresh(&self, max_age_secs: i64) -> bool {
        Utc::now() - self.timestamp < Duration::seconds(max_age_secs)
    }
}

/// Persisted monitoring loop state
///
/// Saved on every transition so an enabled loop resumes after restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringState {
    /// Whether the periodic fetch loop is enabled
    pub enabled: bool,
    /// Interval between scheduled fetches (milliseconds)
    pub interval_ms: u64,
    /// Failed fetches since the last success
    pub consecutive_failure_count: u32,
}

impl MonitoringState {
    /// State for a freshly enabled loop
    #[must_use]
    pub const fn enabled(interval_ms: u64) -> Self {
        Self {
            enabled: true,
            interval_ms,
            consecutive_failure_count: 0,
        }
    }

    /// State for a disabled loop, retaining the last interval
    #[must_use]
    pub const fn disabled(interval_ms: u64) -> Self {
        Self {
            enabled: false,
            interval_ms,
            consecutive_failure_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_credential_is_invalid() {
        let credential = Credential {
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: Utc::now() - Duration::hours(1),
            user_id: None,
            scope: None,
        };
        assert!(!credential.is_valid());
        assert!(!credential.can_refresh());
    }

    #[test]
    fn future_credential_is_valid() {
        let credential = Credential {
            access_token: "tok".into(),
            refresh_token: Some("refresh".into()),
            expires_at: Utc::now() + Duration::hours(8),
            user_id: Some("U1".into()),
            scope: Some("heartrate".into()),
        };
        assert!(credential.is_valid());
        assert!(!credential.will_expire_soon());
    }

    #[test]
    fn source_display_matches_wire_names() {
        assert_eq!(HeartRateSource::LiveDevice.to_string(), "live-device");
        assert_eq!(HeartRateSource::CloudApi.to_string(), "cloud-api");
        assert_eq!(HeartRateSource::Cached.to_string(), "cached");
        assert_eq!(HeartRateSource::Simulated.to_string(), "simulated");
    }

    #[test]
    fn reading_freshness_uses_age() {
        let fresh = HeartRateReading::now(72, HeartRateSource::CloudApi);
        assert!(fresh.is_fresh(300));

        let stale = HeartRateReading {
            value: 72,
            timestamp: Utc::now() - Duration::minutes(10),
            source: HeartRateSource::CloudApi,
        };
        assert!(!stale.is_fresh(300));
    }
}
