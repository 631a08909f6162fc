// ABOUTME: PKCE verifier/challenge generation and anti-CSRF state tokens
// ABOUTME: OS randomness primary, time-seeded ChaCha fallback with logged warning
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::constants::oauth::{CODE_VERIFIER_LENGTH, STATE_LENGTH};

/// RFC 7636 unreserved characters allowed in a code verifier
const VERIFIER_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// PKCE (Proof Key for Code Exchange) parameters for one authorization attempt
#[derive(Debug, Clone)]
pub struct PkceParams {
    /// Randomly generated code verifier (43-128 characters)
    pub code_verifier: String,
    /// SHA-256 hash of the verifier, base64url encoded without padding
    pub code_challenge: String,
    /// Challenge method, always "S256"
    pub code_challenge_method: String,
}

impl PkceParams {
    /// Generate PKCE parameters with the S256 challenge method
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = random_string(CODE_VERIFIER_LENGTH);
        let code_challenge = Self::challenge_from(&code_verifier);

        Self {
            code_verifier,
            code_challenge,
            code_challenge_method: "S256".into(),
        }
    }

    /// Compute the S256 challenge for a verifier
    #[must_use]
    pub fn challenge_from(verifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

/// Generate an opaque anti-CSRF state token, independent of the verifier
#[must_use]
pub fn generate_state() -> String {
    random_string(STATE_LENGTH)
}

/// Produce `len` random characters from the verifier alphabet
///
/// Prefers OS randomness; if the OS source fails, falls back to a
/// time-seeded ChaCha20 generator. The fallback is cryptographically
/// weaker and logs a warning.
fn random_string(len: usize) -> String {
    let mut bytes = vec![0_u8; len];

    if OsRng.try_fill_bytes(&mut bytes).is_err() {
        warn!("OS random source unavailable, using time-seeded fallback generator");
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        rng.fill_bytes(&mut bytes);
    }

    bytes
        .iter()
        .map(|b| VERIFIER_CHARS[usize::from(*b) % VERIFIER_CHARS.len()] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_meets_rfc_length_and_alphabet() {
        let pkce = PkceParams::generate();
        assert!(pkce.code_verifier.len() >= 43);
        assert!(pkce
            .code_verifier
            .bytes()
            .all(|b| VERIFIER_CHARS.contains(&b)));
        assert_eq!(pkce.code_challenge_method, "S256");
    }

    #[test]
    fn challenge_matches_rfc_7636_vector() {
        // Appendix B of RFC 7636
        let challenge =
            PkceParams::challenge_from("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn state_is_opaque_and_distinct_per_call() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), STATE_LENGTH);
        assert_ne!(a, b);
    }

    #[test]
    fn verifiers_do_not_repeat() {
        let a = PkceParams::generate();
        let b = PkceParams::generate();
        assert_ne!(a.code_verifier, b.code_verifier);
        assert_ne!(a.code_challenge, b.code_challenge);
    }
}
