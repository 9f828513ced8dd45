use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_REFRESH_PATH: &str = "api/token/refresh/";
pub const DEFAULT_LOGIN_PATH: &str = "api/token/";
pub const DEFAULT_GUARD_WINDOW: Duration = Duration::from_secs(1);
const DEFAULT_USER_AGENT: &str = concat!("course-client/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("base_url is required")]
    MissingBaseUrl,
    #[error("invalid base url {url:?}: {source}")]
    InvalidBaseUrl { url: String, source: url::ParseError },
    #[error("base url {0:?} cannot carry paths")]
    OpaqueBaseUrl(String),
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: Url,
    pub refresh_path: String,
    pub login_path: String,
    pub guard_window: Duration,
    pub user_agent: String,
    pub root_certificate: Option<PathBuf>,
    pub no_proxy: bool,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Resolves `path` against the base endpoint.
    ///
    /// Leading slashes on `path` are ignored so a base with a path prefix
    /// (`https://host/app/`) keeps its prefix.
    pub fn endpoint_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }
}

#[derive(Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    refresh_path: Option<String>,
    login_path: Option<String>,
    guard_window: Option<Duration>,
    user_agent: Option<String>,
    root_certificate: Option<PathBuf>,
    no_proxy: bool,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    pub fn guard_window(mut self, window: Duration) -> Self {
        self.guard_window = Some(window);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// PEM file added as an extra trusted root, e.g. a development certificate.
    pub fn root_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_certificate = Some(path.into());
        self
    }

    pub fn no_proxy(mut self, no_proxy: bool) -> Self {
        self.no_proxy = no_proxy;
        self
    }

    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let raw = self.base_url.ok_or(ConfigError::MissingBaseUrl)?;

        // a trailing slash makes Url::join append instead of replacing the last segment
        let normalized = format!("{}/", raw.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|source| ConfigError::InvalidBaseUrl {
            url: raw.clone(),
            source,
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::OpaqueBaseUrl(raw));
        }

        Ok(ClientConfig {
            base_url,
            refresh_path: self.refresh_path.unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_string()),
            login_path: self.login_path.unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string()),
            guard_window: self.guard_window.unwrap_or(DEFAULT_GUARD_WINDOW),
            user_agent: self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            root_certificate: self.root_certificate,
            no_proxy: self.no_proxy,
        })
    }
}
