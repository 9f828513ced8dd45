use crate::domain::CredentialPair;
use crate::protocol::http::{OutgoingRequest, Transport};
use anyhow::{anyhow, Context};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use url::Url;

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Body returned by both the login and the refresh endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access: String,
    pub refresh: Option<String>,
}

impl TokenResponse {
    /// Servers that do not rotate refresh tokens omit `refresh`; the previous one stays valid.
    pub fn into_pair(self, previous_refresh: Option<&str>) -> CredentialPair {
        CredentialPair {
            access: self.access,
            refresh: self.refresh.or_else(|| previous_refresh.map(str::to_string)),
        }
    }
}

/// Exchanges a refresh token for a new credential pair.
pub(crate) struct Refresher {
    transport: Arc<dyn Transport>,
    url: Url,
}

impl Refresher {
    pub fn new(transport: Arc<dyn Transport>, url: Url) -> Self {
        Self { transport, url }
    }

    pub async fn refresh(&self, refresh_token: &str) -> anyhow::Result<CredentialPair> {
        let body = serde_json::to_value(RefreshRequest { refresh: refresh_token })?;
        let request = OutgoingRequest::new(Method::POST, self.url.path()).with_body(body);

        let response = self
            .transport
            .execute(self.url.clone(), &request)
            .await
            .context("refresh endpoint unreachable")?;

        if !response.status.is_success() {
            return Err(anyhow!("refresh endpoint responded with {}", response.status));
        }

        let tokens: TokenResponse = response
            .json()
            .context("refresh endpoint returned an unexpected body")?;
        debug!("Access token refreshed");

        Ok(tokens.into_pair(Some(refresh_token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrotated_refresh_token_is_kept() {
        let tokens: TokenResponse = serde_json::from_str(r#"{"access":"new"}"#).unwrap();
        assert_eq!(tokens.into_pair(Some("old-refresh")), CredentialPair::new("new", "old-refresh"));
    }

    #[test]
    fn rotated_refresh_token_wins() {
        let tokens: TokenResponse = serde_json::from_str(r#"{"access":"a2","refresh":"r2"}"#).unwrap();
        assert_eq!(tokens.into_pair(Some("r1")), CredentialPair::new("a2", "r2"));
    }
}
