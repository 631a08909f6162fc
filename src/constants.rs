// ABOUTME: Default values, limits, and provider endpoint paths
// ABOUTME: Topical const modules shared across the crate
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Bounded-collection and freshness limits
pub mod limits {
    /// Newest readings retained in the acquisition history
    pub const HISTORY_CAPACITY: usize = 100;
    /// Age below which a cached reading can still be served (seconds)
    pub const CACHE_FRESHNESS_SECS: i64 = 300;
    /// Consecutive scheduled-fetch failures tolerated before monitoring
    /// disables itself
    pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;
}

/// OAuth flow parameters
pub mod oauth {
    /// Length of the generated PKCE code verifier (RFC 7636 requires 43-128)
    pub const CODE_VERIFIER_LENGTH: usize = 64;
    /// Length of the generated anti-CSRF state parameter
    pub const STATE_LENGTH: usize = 32;
    /// Token lifetime assumed when the provider omits `expires_in` (seconds)
    pub const DEFAULT_TOKEN_EXPIRY_SECS: i64 = 28_800;
    /// Scopes requested by default
    pub const DEFAULT_SCOPES: &[&str] = &["heartrate", "profile", "activity", "settings"];
}

/// Provider endpoint paths, relative to the API base URL
pub mod endpoints {
    /// Authorization endpoint (opened in the external user-agent)
    pub const AUTHORIZE_PATH: &str = "/oauth2/authorize";
    /// Token exchange and refresh endpoint
    pub const TOKEN_PATH: &str = "/oauth2/token";
    /// Token revocation endpoint
    pub const REVOKE_PATH: &str = "/oauth2/revoke";
    /// Profile endpoint used for identity lookup and token validation
    pub const PROFILE_PATH: &str = "/1/user/-/profile.json";

    /// Intraday heart-rate series path for a given date (`today` accepted)
    #[must_use]
    pub fn heart_rate_path(date: &str) -> String {
        format!("/1/user/-/activities/heart/date/{date}/1d/1min.json")
    }
}

/// Physiological simulation parameters
pub mod simulation {
    /// Resting baseline the simulator starts from (BPM)
    pub const BASELINE_BPM: f64 = 70.0;
    /// Exponential smoothing factor applied to the running value
    pub const SMOOTHING: f64 = 0.9;
    /// BPM gained per g of acceleration magnitude away from rest
    pub const MOTION_GAIN: f64 = 20.0;
    /// Bounds for the motion-driven mode (BPM)
    pub const MOTION_MIN_BPM: f64 = 60.0;
    /// Upper bound for the motion-driven mode (BPM)
    pub const MOTION_MAX_BPM: f64 = 180.0;
    /// Bounds for the time-driven fallback mode (BPM)
    pub const RESTING_MIN_BPM: f64 = 60.0;
    /// Upper bound for the time-driven fallback mode (BPM)
    pub const RESTING_MAX_BPM: f64 = 100.0;
    /// Largest per-tick perturbation in the time-driven mode (BPM)
    pub const TICK_PERTURBATION_BPM: f64 = 2.0;
}

/// Monitoring scheduler defaults
pub mod monitoring {
    /// Default interval between scheduled fetches (milliseconds)
    pub const DEFAULT_INTERVAL_MS: u64 = 60_000;
}
