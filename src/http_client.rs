// ABOUTME: Shared HTTP client construction with timeout presets
// ABOUTME: Separate presets for OAuth exchanges and data API calls
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

/// Create an HTTP client with the given timeouts
///
/// Falls back to a default client if the builder fails, so callers never
/// have to handle construction errors.
#[must_use]
pub fn client_with_timeout(timeout_secs: u64, connect_timeout_secs: u64) -> Client {
    ClientBuilder::new()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Client tuned for OAuth token exchanges, which should be fast
#[must_use]
pub fn oauth_client() -> Client {
    client_with_timeout(15, 5)
}

/// Client tuned for data API calls, which may take longer
#[must_use]
pub fn api_client() -> Client {
    client_with_timeout(30, 10)
}
