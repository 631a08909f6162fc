// ABOUTME: OAuth2 flow support: PKCE, client, callback parsing, flow management
// ABOUTME: Two grant flows (implicit, authorization-code + PKCE) over one client
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Redirect/deep-link extraction strategies
pub mod callback;
/// Token endpoint client and authorization URL construction
pub mod client;
/// Authorization flow orchestration and completion events
pub mod flow;
/// PKCE verifier/challenge and anti-CSRF state generation
pub mod pkce;

pub use callback::{CallbackParser, TokenExtraction};
pub use client::{GrantFlow, OAuth2Client};
pub use flow::{AuthEvent, AuthorizationFlowManager, ExternalAuthorizer};
pub use pkce::{generate_state, PkceParams};
