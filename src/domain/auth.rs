use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Access/refresh token pair as issued by the token endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: Some(refresh.into()),
        }
    }

    /// The refresh token, if the pair carries a non-empty one.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh.as_deref().filter(|token| !token.is_empty())
    }

    pub fn claims(&self) -> Result<TokenClaims, ClaimsError> {
        TokenClaims::decode(&self.access)
    }
}

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("token is not a three-part JWT")]
    Malformed,
    #[error("token payload is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("token payload is not valid claims JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Claims read from an access token payload. The signature is not checked;
/// the server remains the authority on validity.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

impl TokenClaims {
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        let mut parts = token.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(ClaimsError::Malformed),
        };

        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Whether the token should be treated as expired at `now_ms`.
    ///
    /// Any remaining lifetime shorter than `guard_window` counts as expired,
    /// including an expiry equal to now.
    pub fn is_expired_at(&self, now_ms: i64, guard_window: Duration) -> bool {
        let remaining_ms = self.exp.saturating_mul(1000).saturating_sub(now_ms);
        let guard_ms = i64::try_from(guard_window.as_millis()).unwrap_or(i64::MAX);
        remaining_ms < guard_ms
    }

    pub fn is_expired(&self, guard_window: Duration) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp_millis(), guard_window)
    }
}

/// Decodes the access token and checks expiry; undecodable tokens count as expired.
pub fn access_token_expired(access: &str, guard_window: Duration) -> bool {
    match TokenClaims::decode(access) {
        Ok(claims) => claims.is_expired(guard_window),
        Err(e) => {
            tracing::debug!("Access token claims unreadable, treating as expired: {}", e);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::token_with_exp;

    const GUARD: Duration = Duration::from_secs(1);

    #[test]
    fn decodes_exp_from_payload() {
        let claims = TokenClaims::decode(&token_with_exp(1_700_000_000)).unwrap();
        assert_eq!(claims.exp, 1_700_000_000);
    }

    #[test]
    fn rejects_tokens_without_three_parts() {
        assert!(matches!(TokenClaims::decode("abc.def"), Err(ClaimsError::Malformed)));
        assert!(matches!(TokenClaims::decode("a.b.c.d"), Err(ClaimsError::Malformed)));
    }

    #[test]
    fn rejects_garbage_payload() {
        assert!(matches!(TokenClaims::decode("a.!!!.c"), Err(ClaimsError::Encoding(_))));
        let not_json = URL_SAFE_NO_PAD.encode(b"not json");
        assert!(matches!(
            TokenClaims::decode(&format!("a.{}.c", not_json)),
            Err(ClaimsError::Json(_))
        ));
    }

    #[test]
    fn expiry_equal_to_now_is_expired() {
        let claims = TokenClaims { exp: 1_000 };
        assert!(claims.is_expired_at(1_000_000, GUARD));
    }

    #[test]
    fn expiry_inside_guard_window_is_expired() {
        let claims = TokenClaims { exp: 1_000 };
        assert!(claims.is_expired_at(999_001, GUARD));
        assert!(!claims.is_expired_at(999_000, GUARD));
    }

    #[test]
    fn oversized_guard_window_saturates() {
        let claims = TokenClaims { exp: 4_000_000_000 };
        assert!(claims.is_expired_at(0, Duration::MAX));
    }

    #[test]
    fn past_and_future_tokens() {
        let now = chrono::Utc::now().timestamp();
        assert!(access_token_expired(&token_with_exp(now - 1), GUARD));
        assert!(!access_token_expired(&token_with_exp(now + 3600), GUARD));
    }

    #[test]
    fn unreadable_token_counts_as_expired() {
        assert!(access_token_expired("opaque-token", GUARD));
    }

    #[test]
    fn empty_refresh_token_is_missing() {
        let pair = CredentialPair { access: "a".into(), refresh: Some(String::new()) };
        assert_eq!(pair.refresh_token(), None);
        let pair: CredentialPair = serde_json::from_str(r#"{"access":"a"}"#).unwrap();
        assert_eq!(pair.refresh_token(), None);
    }
}
