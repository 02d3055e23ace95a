//! Client configuration.
//!
//! Values come from a serde source (file, embedded JSON) or from the
//! `DOCSTORE_*` environment variables; [`ClientConfig::validate`] runs before
//! an executor is built from either.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub database: String,
    /// Seed node urls, tried in order until a topology is fetched.
    pub urls: Vec<String>,
    /// Per-attempt send timeout. Expiry counts as a node failure.
    pub request_timeout_ms: u64,
    /// Attempt ceiling per call. `None` allows one attempt per node.
    pub max_attempts: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database: String::new(),
            urls: Vec::new(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_attempts: None,
        }
    }
}

impl ClientConfig {
    pub fn new<I, U>(database: impl Into<String>, urls: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<String>,
    {
        Self {
            database: database.into(),
            urls: urls.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = whole_millis(timeout);
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reads `DOCSTORE_URLS` (comma separated), `DOCSTORE_DATABASE`,
    /// `DOCSTORE_REQUEST_TIMEOUT_MS` and `DOCSTORE_MAX_ATTEMPTS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(database) = lookup("DOCSTORE_DATABASE") {
            config.database = database;
        }
        if let Some(urls) = lookup("DOCSTORE_URLS") {
            config.urls = urls.split(',').map(|url| url.trim().to_string()).collect();
        }
        if let Some(timeout) = lookup("DOCSTORE_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_number("DOCSTORE_REQUEST_TIMEOUT_MS", &timeout)?;
        }
        if let Some(attempts) = lookup("DOCSTORE_MAX_ATTEMPTS") {
            config.max_attempts = Some(parse_number("DOCSTORE_MAX_ATTEMPTS", &attempts)?);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(Error::Config("database name must not be empty".to_string()));
        }
        if self.urls.is_empty() {
            return Err(Error::Config("at least one node url is required".to_string()));
        }
        if let Some(url) = self.urls.iter().find(|url| !is_http_url(url)) {
            return Err(Error::Config(format!("'{url}' is not an http(s) url")));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }
        if self.max_attempts == Some(0) {
            return Err(Error::Config("max attempts must be positive".to_string()));
        }
        Ok(())
    }
}

// Rounds up so a non-zero timeout never collapses to zero, saturating at u64::MAX.
fn whole_millis(timeout: Duration) -> u64 {
    let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    if timeout > Duration::from_millis(millis) {
        millis.saturating_add(1)
    } else {
        millis
    }
}

fn is_http_url(url: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} must be a number, got '{value}'")))
}
