use crate::domain::{Navigator, Notifier, Session};
use crate::protocol::http::refresh::{Refresher, TokenResponse};
use crate::protocol::http::{
    AttachCredentials, ClassifyAndNotify, ClientConfig, OutgoingRequest, Pipeline, RequestError,
    ReqwestTransport, Response, Transport,
};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug_span, info, Instrument};
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// HTTP client that keeps the session's access token fresh and reports every
/// failure through the notification sink.
///
/// Cheap to clone; clones share the session and the transport.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: Arc<ClientConfig>,
    session: Session,
    authenticated: Pipeline,
    public: Pipeline,
}

impl AuthClient {
    pub fn new(
        config: ClientConfig,
        session: Session,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, RequestError> {
        let config = Arc::new(config);
        let refresh_url = config
            .endpoint_url(&config.refresh_path)
            .map_err(|e| RequestError::InvalidRequest(format!("refresh path: {}", e)))?;

        let classify = Arc::new(ClassifyAndNotify::new(notifier));
        let attach = Arc::new(AttachCredentials::new(
            session.clone(),
            Refresher::new(transport.clone(), refresh_url),
            navigator,
            config.guard_window,
        ));

        let authenticated = Pipeline::new(config.clone(), transport.clone())
            .with_request_stage(attach)
            .with_response_stage(classify.clone());
        let public = Pipeline::new(config.clone(), transport).with_response_stage(classify);

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                session,
                authenticated,
                public,
            }),
        })
    }

    /// Builds a client backed by reqwest, configured from `config`.
    pub fn with_reqwest(
        config: ClientConfig,
        session: Session,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> anyhow::Result<Self> {
        let transport = Arc::new(ReqwestTransport::from_config(&config)?);
        Ok(Self::new(config, session, transport, notifier, navigator)?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        headers: Option<HeaderMap>,
    ) -> Result<Response, RequestError> {
        let mut request = OutgoingRequest::new(method, path);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        if let Some(headers) = headers {
            request = request.with_headers(headers);
        }
        self.execute(request).await
    }

    pub async fn execute(&self, request: OutgoingRequest) -> Result<Response, RequestError> {
        let span = debug_span!("request", id = %Uuid::new_v4(), method = %request.method, path = %request.path);
        self.inner.authenticated.run(request).instrument(span).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        let response = self.send(Method::GET, path, None, None).await?;
        Ok(response.json()?)
    }

    /// Exchanges username and password for a credential pair and starts a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), RequestError> {
        let body = serde_json::to_value(LoginRequest { username, password })?;
        let request = OutgoingRequest::new(Method::POST, self.inner.config.login_path.clone()).with_body(body);

        let span = debug_span!("login", id = %Uuid::new_v4());
        let response = self.inner.public.run(request).instrument(span).await?;
        let tokens: TokenResponse = response.json()?;

        if let Err(e) = self.inner.session.replace(tokens.into_pair(None)) {
            tracing::warn!("Credentials could not be persisted: {:#}", e);
        }
        info!("Logged in as {}", username);
        Ok(())
    }

    pub fn logout(&self) {
        self.inner.session.clear();
        info!("Logged out");
    }
}
