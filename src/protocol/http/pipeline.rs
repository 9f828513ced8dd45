//! Stages applied around the transport call, in a fixed order:
//! request stages, then the transport, then response stages.
//!
//! A failing request stage skips the transport, but its error still passes
//! through every response stage, so classification and notification happen
//! once for every outcome.

use crate::domain::{access_token_expired, CredentialPair, Navigator, Notifier, Session, Severity};
use crate::protocol::http::refresh::Refresher;
use crate::protocol::http::{ClientConfig, OutgoingRequest, RequestError, Response, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

#[async_trait::async_trait]
pub trait RequestStage: Send + Sync {
    async fn prepare(&self, request: &mut OutgoingRequest) -> Result<(), RequestError>;
}

#[async_trait::async_trait]
pub trait ResponseStage: Send + Sync {
    async fn complete(
        &self,
        request: &OutgoingRequest,
        result: Result<Response, RequestError>,
    ) -> Result<Response, RequestError>;
}

pub struct Pipeline {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    request_stages: Vec<Arc<dyn RequestStage>>,
    response_stages: Vec<Arc<dyn ResponseStage>>,
}

impl Pipeline {
    pub fn new(config: Arc<ClientConfig>, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            request_stages: Vec::new(),
            response_stages: Vec::new(),
        }
    }

    pub fn with_request_stage(mut self, stage: Arc<dyn RequestStage>) -> Self {
        self.request_stages.push(stage);
        self
    }

    pub fn with_response_stage(mut self, stage: Arc<dyn ResponseStage>) -> Self {
        self.response_stages.push(stage);
        self
    }

    pub async fn run(&self, mut request: OutgoingRequest) -> Result<Response, RequestError> {
        let mut result = self.prepare_and_send(&mut request).await;
        for stage in &self.response_stages {
            result = stage.complete(&request, result).await;
        }
        result
    }

    async fn prepare_and_send(&self, request: &mut OutgoingRequest) -> Result<Response, RequestError> {
        for stage in &self.request_stages {
            stage.prepare(request).await?;
        }

        let url = self
            .config
            .endpoint_url(&request.path)
            .map_err(|e| RequestError::InvalidRequest(format!("{}: {}", request.path, e)))?;
        let response = self.transport.execute(url, request).await?;

        if response.status.is_success() {
            Ok(response)
        } else {
            Err(RequestError::Status(response))
        }
    }
}

/// Attaches the session's access token, refreshing it first when it is
/// about to expire. Ends the session when it cannot be kept alive.
pub struct AttachCredentials {
    session: Session,
    refresher: Refresher,
    navigator: Arc<dyn Navigator>,
    guard_window: Duration,
}

impl AttachCredentials {
    pub(crate) fn new(
        session: Session,
        refresher: Refresher,
        navigator: Arc<dyn Navigator>,
        guard_window: Duration,
    ) -> Self {
        Self {
            session,
            refresher,
            navigator,
            guard_window,
        }
    }

    fn force_logout(&self, reason: &str) {
        warn!("Ending session: {}", reason);
        self.session.clear();
        self.navigator.redirect_to_login();
    }

    /// Returns a usable access token, sharing one refresh between all
    /// requests that saw the same expired token.
    async fn fresh_access_token(&self, stale: &CredentialPair) -> Result<String, RequestError> {
        let _refresh_guard = self.session.lock_refresh().await;

        let Some(latest) = self.session.current() else {
            return Err(RequestError::RefreshFailed("session ended while waiting for refresh".into()));
        };
        if latest.access != stale.access && !access_token_expired(&latest.access, self.guard_window) {
            debug!("Using access token refreshed by a concurrent request");
            return Ok(latest.access.clone());
        }

        let Some(refresh_token) = latest.refresh_token() else {
            self.force_logout("no refresh token");
            return Err(RequestError::SessionInvalid);
        };

        match self.refresher.refresh(refresh_token).await {
            Ok(pair) => {
                let access = pair.access.clone();
                match self.session.replace_if_current(&latest, pair) {
                    Ok(true) => Ok(access),
                    Ok(false) => Err(RequestError::RefreshFailed(
                        "session changed while refreshing".into(),
                    )),
                    Err(e) => {
                        warn!("Refreshed credentials could not be persisted: {:#}", e);
                        Ok(access)
                    }
                }
            }
            Err(e) => {
                self.force_logout("refresh failed");
                Err(RequestError::RefreshFailed(format!("{:#}", e)))
            }
        }
    }
}

#[async_trait::async_trait]
impl RequestStage for AttachCredentials {
    async fn prepare(&self, request: &mut OutgoingRequest) -> Result<(), RequestError> {
        let Some(pair) = self.session.current() else {
            debug!("No credentials, sending unauthenticated");
            return Ok(());
        };

        if pair.refresh_token().is_none() {
            self.force_logout("no refresh token");
            return Err(RequestError::SessionInvalid);
        }

        let access = if access_token_expired(&pair.access, self.guard_window) {
            debug!("Access token expired, refreshing");
            self.fresh_access_token(&pair).await?
        } else {
            pair.access.clone()
        };

        request
            .set_bearer(&access)
            .map_err(|e| RequestError::InvalidRequest(format!("access token is not a valid header: {}", e)))
    }
}

/// Reports every failed request to the notification sink exactly once, then
/// hands the error back to the caller.
pub struct ClassifyAndNotify {
    notifier: Arc<dyn Notifier>,
}

impl ClassifyAndNotify {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait::async_trait]
impl ResponseStage for ClassifyAndNotify {
    async fn complete(
        &self,
        request: &OutgoingRequest,
        result: Result<Response, RequestError>,
    ) -> Result<Response, RequestError> {
        if let Err(e) = &result {
            let kind = e.kind();
            error!("{} {} failed ({:?}): {}", request.method, request.path, kind, e);
            self.notifier.notify(kind.user_message(), Severity::Error);
        }
        result
    }
}
