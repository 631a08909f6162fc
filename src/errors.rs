// ABOUTME: Error taxonomy for authorization, storage, and data acquisition
// ABOUTME: Structured thiserror enums with retryability classification
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::PathBuf;

/// Errors raised by the persisted record store
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("storage I/O failed for {path}")]
    Io {
        /// Path of the backing file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A persisted record could not be encoded or decoded
    #[error("record serialization failed")]
    Serialization {
        /// Underlying JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Errors raised by the authorization flow and callback handling
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider redirected back with an explicit error
    #[error("provider denied authorization: {error}")]
    ProviderDenied {
        /// OAuth error code from the callback (`error=`)
        error: String,
        /// Optional human-readable description (`error_description=`)
        description: Option<String>,
    },

    /// No extraction strategy recognized the redirect URL
    #[error("unrecognized callback URL")]
    CallbackUnrecognized,

    /// The token endpoint rejected an exchange or refresh request
    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint {
        /// HTTP status returned by the endpoint
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// A refresh was requested but the credential has no refresh token
    #[error("no refresh token available; re-authorization required")]
    MissingRefreshToken,

    /// An operation that requires a stored credential found none
    #[error("not authorized")]
    NotAuthorized,

    /// The authorization URL could not be constructed
    #[error("invalid authorization URL")]
    InvalidUrl(#[from] url::ParseError),

    /// Transport-level failure talking to the provider
    #[error("transport error during authorization")]
    Transport(#[from] reqwest::Error),

    /// The record store failed
    #[error("credential storage failed")]
    Storage(#[from] StorageError),
}

/// Errors raised by data-source tiers during acquisition
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider rejected the access token
    #[error("{provider} rejected the access token")]
    Unauthorized {
        /// Name of the rejecting source
        provider: String,
    },

    /// No wearable session is currently active
    #[error("no active device session")]
    NoActiveSession,

    /// The provider responded but carried no usable sample
    #[error("{provider} returned no data")]
    NoData {
        /// Name of the empty source
        provider: String,
    },

    /// The provider returned an unexpected status
    #[error("{provider} returned unexpected status {status}")]
    UnexpectedStatus {
        /// Name of the failing source
        provider: String,
        /// HTTP status code received
        status: u16,
    },

    /// Transport-level failure (connectivity, DNS, timeout)
    #[error("transport error reaching provider")]
    Transport(#[from] reqwest::Error),
}

impl ProviderError {
    /// Whether a retry against the same source could plausibly succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::UnexpectedStatus { .. } => true,
            Self::Unauthorized { .. } | Self::NoActiveSession | Self::NoData { .. } => false,
        }
    }

    /// Whether the failure indicates an invalid or expired token
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Result alias for authorization operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Result alias for acquisition-tier operations
pub type ProviderResult<T> = Result<T, ProviderError>;
