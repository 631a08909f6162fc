// ABOUTME: Redirect/deep-link parsing through an ordered list of extraction strategies
// ABOUTME: First strategy to succeed wins; the outcome is tagged with its origin
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;
use url::Url;

/// Outcome of callback extraction, tagged with the strategy that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenExtraction {
    /// Token embedded as a literal path component (strategy 1)
    DirectPath {
        /// The extracted access token
        access_token: String,
    },
    /// Token found in the fragment/query of a recognized redirect (strategy 2)
    Fragment {
        /// The extracted access token
        access_token: String,
        /// Token lifetime in seconds, when present
        expires_in: Option<i64>,
        /// Provider user ID, when present
        user_id: Option<String>,
        /// Granted scopes, when present
        scope: Option<String>,
        /// Echoed anti-CSRF state, when the target did not strip it
        state: Option<String>,
    },
    /// Authorization code awaiting exchange (strategy 3)
    AuthorizationCode {
        /// The extracted authorization code
        code: String,
    },
    /// Provider reported an explicit error; terminal (strategy 4)
    Denied {
        /// OAuth error code
        error: String,
        /// Optional human-readable description
        description: Option<String>,
    },
    /// Token found by the last-resort whole-URL pass (strategy 5)
    LooseToken {
        /// The extracted access token
        access_token: String,
    },
}

impl TokenExtraction {
    /// Name of the strategy that produced this outcome, for logging
    #[must_use]
    pub const fn strategy(&self) -> &'static str {
        match self {
            Self::DirectPath { .. } => "direct-path",
            Self::Fragment { .. } => "fragment",
            Self::AuthorizationCode { .. } => "authorization-code",
            Self::Denied { .. } => "provider-error",
            Self::LooseToken { .. } => "loose-token",
        }
    }
}

/// Parser for redirect/deep-link URLs of heterogeneous shapes
///
/// Redirect targets differ between the HTTPS web fallback and the custom
/// app scheme, and some intermediaries reorder or strip parameters, so
/// extraction runs as an ordered cascade of tolerant strategies.
pub struct CallbackParser {
    recognized_redirects: Vec<String>,
}

impl CallbackParser {
    /// Create a parser that recognizes the given redirect URL prefixes
    #[must_use]
    pub fn new(recognized_redirects: Vec<String>) -> Self {
        Self {
            recognized_redirects,
        }
    }

    /// Run the extraction strategies in priority order
    ///
    /// Returns `None` only when no strategy matched at all; an explicit
    /// provider error is a successful extraction of a terminal failure.
    #[must_use]
    pub fn extract(&self, url: &str) -> Option<TokenExtraction> {
        let outcome = Self::try_direct_token_path(url)
            .or_else(|| self.try_fragment_token(url))
            .or_else(|| Self::try_authorization_code(url))
            .or_else(|| Self::try_provider_error(url))
            .or_else(|| Self::try_loose_token(url));

        if let Some(ref extraction) = outcome {
            debug!(strategy = extraction.strategy(), "callback extraction succeeded");
        } else {
            debug!(url, "no extraction strategy matched callback URL");
        }

        outcome
    }

    /// Strategy 1: token embedded as a literal path component
    ///
    /// Matches `.../token/<value>` path shapes; unambiguous, so it has the
    /// highest priority.
    fn try_direct_token_path(url: &str) -> Option<TokenExtraction> {
        let parsed = Url::parse(url).ok()?;
        let mut segments = parsed.path_segments()?;

        while let Some(segment) = segments.next() {
            if segment == "token" {
                let raw = segments.next().filter(|s| !s.is_empty())?;
                let access_token = percent_decode(raw);
                return Some(TokenExtraction::DirectPath { access_token });
            }
        }
        None
    }

    /// Strategy 2: `access_token=` in the fragment or query of a recognized
    /// redirect target, tolerant of `#`, `?`, and `&` delimiters
    fn try_fragment_token(&self, url: &str) -> Option<TokenExtraction> {
        if !self
            .recognized_redirects
            .iter()
            .any(|prefix| url.starts_with(prefix.as_str()))
        {
            return None;
        }

        let access_token = capture(token_re(), url)?;
        Some(TokenExtraction::Fragment {
            access_token,
            expires_in: capture(expires_re(), url).and_then(|v| v.parse().ok()),
            user_id: capture(user_re(), url),
            scope: capture(scope_re(), url).map(|s| s.replace('+', " ")),
            state: capture(state_re(), url),
        })
    }

    /// Strategy 3: bare `code=` parameter, handed to the code exchange
    fn try_authorization_code(url: &str) -> Option<TokenExtraction> {
        let code = capture(code_re(), url)?;
        Some(TokenExtraction::AuthorizationCode { code })
    }

    /// Strategy 4: explicit `error=` pair; terminal, never retried
    fn try_provider_error(url: &str) -> Option<TokenExtraction> {
        let error = capture(error_re(), url)?;
        let description =
            capture(error_desc_re(), url).map(|d| percent_decode(&d.replace('+', " ")));
        Some(TokenExtraction::Denied { error, description })
    }

    /// Strategy 5: last-resort pass for `access_token=` anywhere in the URL
    fn try_loose_token(url: &str) -> Option<TokenExtraction> {
        let access_token = capture(loose_token_re(), url)?;
        Some(TokenExtraction::LooseToken { access_token })
    }
}

fn capture(re: &Regex, url: &str) -> Option<String> {
    re.captures(url)
        .and_then(|c| c.get(1))
        .map(|m| percent_decode(m.as_str()))
}

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_owned(), |s| s.into_owned())
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[#?&]access_token=([A-Za-z0-9\-._~%/+]+)").unwrap_or_else(|_| never())
    })
}

fn expires_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[#?&]expires_in=(\d+)").unwrap_or_else(|_| never()))
}

fn user_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[#?&]user_id=([A-Za-z0-9%\-._~]+)").unwrap_or_else(|_| never()))
}

fn scope_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[#?&]scope=([A-Za-z0-9%+_.\-]+)").unwrap_or_else(|_| never()))
}

fn state_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[#?&]state=([A-Za-z0-9%\-._~]+)").unwrap_or_else(|_| never()))
}

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[#?&]code=([A-Za-z0-9%\-._~]+)").unwrap_or_else(|_| never()))
}

fn error_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[#?&]error=([A-Za-z0-9_]+)").unwrap_or_else(|_| never()))
}

fn error_desc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[#?&]error_description=([^&#]+)").unwrap_or_else(|_| never()))
}

fn loose_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"access_token=([A-Za-z0-9\-._~%/+]+)").unwrap_or_else(|_| never())
    })
}

// The literal patterns above are compile-time constants; a failed compile
// is unreachable but the lint policy forbids unwrap().
fn never() -> Regex {
    #[allow(clippy::unwrap_used)]
    Regex::new("$^").unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> CallbackParser {
        CallbackParser::new(vec![
            "https://heartbridge.app/auth/callback".into(),
            "heartbridge://auth".into(),
        ])
    }

    #[test]
    fn fragment_extraction_captures_token_fields() {
        let outcome = parser()
            .extract(
                "https://heartbridge.app/auth/callback#access_token=ABC123&expires_in=3600&user_id=U1",
            )
            .unwrap();

        assert_eq!(
            outcome,
            TokenExtraction::Fragment {
                access_token: "ABC123".into(),
                expires_in: Some(3600),
                user_id: Some("U1".into()),
                scope: None,
                state: None,
            }
        );
    }

    #[test]
    fn fragment_tolerates_query_style_delimiters() {
        let outcome = parser()
            .extract("heartbridge://auth?access_token=XYZ&scope=heartrate+profile")
            .unwrap();

        match outcome {
            TokenExtraction::Fragment {
                access_token,
                scope,
                ..
            } => {
                assert_eq!(access_token, "XYZ");
                assert_eq!(scope.as_deref(), Some("heartrate profile"));
            }
            other => panic!("expected fragment extraction, got {other:?}"),
        }
    }

    #[test]
    fn direct_path_takes_priority_over_fragment() {
        let outcome = parser()
            .extract("https://heartbridge.app/auth/token/PATHTOKEN#access_token=IGNORED")
            .unwrap();
        assert_eq!(
            outcome,
            TokenExtraction::DirectPath {
                access_token: "PATHTOKEN".into()
            }
        );
    }

    #[test]
    fn bare_code_parameter_is_extracted() {
        let outcome = parser()
            .extract("https://heartbridge.app/auth/callback?code=AUTHCODE42&state=abc")
            .unwrap();
        assert_eq!(
            outcome,
            TokenExtraction::AuthorizationCode {
                code: "AUTHCODE42".into()
            }
        );
    }

    #[test]
    fn provider_error_is_terminal_and_decoded() {
        let outcome = parser()
            .extract("https://heartbridge.app/auth/callback?error=access_denied&error_description=User+denied")
            .unwrap();
        assert_eq!(
            outcome,
            TokenExtraction::Denied {
                error: "access_denied".into(),
                description: Some("User denied".into()),
            }
        );
    }

    #[test]
    fn loose_pass_rescues_unknown_hosts() {
        let outcome = parser()
            .extract("https://mystery.example/landing?access_token=RESCUED")
            .unwrap();
        assert_eq!(
            outcome,
            TokenExtraction::LooseToken {
                access_token: "RESCUED".into()
            }
        );
    }

    #[test]
    fn unmatched_url_yields_none() {
        assert_eq!(parser().extract("https://example.com/nothing/here"), None);
    }
}
