use crate::domain::{Navigator, Notifier, Severity};
use crate::protocol::http::{OutgoingRequest, Response, Transport, TransportError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

pub fn token_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"token_type":"access","exp":{},"user_id":7}}"#, exp));
    format!("{}.{}.signature", header, payload)
}

#[derive(Clone, Debug)]
pub struct SentRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Answers by URL path; unknown paths behave like an unreachable server.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: DashMap<String, (StatusCode, String)>,
    sent: Mutex<Vec<SentRequest>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn respond(&self, path: &str, status: StatusCode, body: &str) {
        self.routes.insert(path.to_string(), (status, body.to_string()));
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, url: Url, request: &OutgoingRequest) -> Result<Response, TransportError> {
        self.sent.lock().unwrap().push(SentRequest {
            method: request.method.clone(),
            path: url.path().to_string(),
            bearer: request.bearer().map(str::to_string),
            body: request.body.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let route = self.routes.get(url.path()).map(|entry| entry.value().clone());
        match route {
            Some((status, body)) => Ok(Response {
                status,
                headers: HeaderMap::new(),
                body: body.into_bytes(),
            }),
            None => Err(TransportError::Unreachable(url.to_string())),
        }
    }
}

/// Records notifications and login redirects.
#[derive(Default)]
pub struct Recorder {
    notifications: Mutex<Vec<String>>,
    redirects: AtomicUsize,
}

impl Recorder {
    pub fn notifications(&self) -> Vec<String> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Notifier for Recorder {
    fn notify(&self, message: &str, _severity: Severity) {
        self.notifications.lock().unwrap().push(message.to_string());
    }
}

impl Navigator for Recorder {
    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}
