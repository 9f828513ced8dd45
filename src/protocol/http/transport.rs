use crate::protocol::http::{ClientConfig, TransportError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::trace;
use url::Url;

/// A request as callers describe it, relative to the base endpoint.
#[derive(Clone, Debug)]
pub struct OutgoingRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
}

impl OutgoingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets or replaces the `Authorization` header with a bearer token.
    pub fn set_bearer(&mut self, token: &str) -> Result<(), reqwest::header::InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
    }
}

/// A fully received response.
#[derive(Clone, Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Puts a request on the wire. An `Err` means no complete response exists;
/// `TransportError::Body` keeps the status when only the body was lost.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, url: Url, request: &OutgoingRequest) -> Result<Response, TransportError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());

        if let Some(path) = &config.root_certificate {
            let cert = std::fs::read(path)?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&cert)?);
        }
        if config.no_proxy {
            builder = builder.no_proxy();
        }

        Ok(Self { client: builder.build()? })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, url: Url, request: &OutgoingRequest) -> Result<Response, TransportError> {
        trace!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body {
                status,
                message: e.to_string(),
            })?
            .to_vec();

        Ok(Response { status, headers, body })
    }
}
