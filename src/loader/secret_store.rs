//! Secret stores: sources that are fetchable by name.
//!
//! # Security Constraints
//! - Fetched values are never logged; only store names and keys are
//! - Errors carry status codes and I/O kinds, never response bodies
//! - Bearer tokens are redacted from `Debug` output

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Errors from a secret store backend.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("invalid secret key {0:?}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("secret store returned status {0}")]
    Status(u16),
}

/// A named backend that returns text documents or single values by key.
#[async_trait]
pub trait SecretStore: Send + Sync + fmt::Debug {
    /// Store name used in `secret://<name>/<key>` references.
    fn name(&self) -> &str;

    /// Fetch the entry stored under `key`, or `None` if there is none.
    async fn fetch(&self, key: &str) -> Result<Option<String>, SecretStoreError>;
}

/// Reject keys that could escape the store's namespace.
///
/// A first segment with `:` would read as a URL scheme, and `?`, `#` and
/// `%` would change what an HTTP store requests.
fn check_key(key: &str) -> Result<(), SecretStoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains(['\\', '\0', '?', '#', '%'])
        || key.split('/').next().is_some_and(|first| first.contains(':'))
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        Err(SecretStoreError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

fn trim_newline(mut value: String) -> String {
    if value.ends_with('\n') {
        value.pop();
        if value.ends_with('\r') {
            value.pop();
        }
    }
    value
}

/// One file per key below a root directory (e.g. `/run/secrets`).
#[derive(Debug, Clone)]
pub struct DirectorySecretStore {
    name: String,
    root: PathBuf,
}

impl DirectorySecretStore {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }
}

#[async_trait]
impl SecretStore for DirectorySecretStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, SecretStoreError> {
        check_key(key)?;
        match tokio::fs::read_to_string(self.root.join(key)).await {
            Ok(value) => Ok(Some(trim_newline(value))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Fetches `GET <base>/<key>`; a 404 means the key does not exist.
#[derive(Clone)]
pub struct HttpSecretStore {
    name: String,
    base: Url,
    client: reqwest::Client,
    token: Option<String>,
}

impl HttpSecretStore {
    pub fn new(name: impl Into<String>, mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            name: name.into(),
            base,
            client: reqwest::Client::new(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// True if `url` is on the base's origin, below its path, with no query
    /// or fragment.
    fn contains(&self, url: &Url) -> bool {
        url.origin() == self.base.origin()
            && url.path().starts_with(self.base.path())
            && url.query().is_none()
            && url.fragment().is_none()
    }
}

impl fmt::Debug for HttpSecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSecretStore")
            .field("name", &self.name)
            .field("base", &self.base.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, SecretStoreError> {
        check_key(key)?;
        let url = self
            .base
            .join(key)
            .ok()
            .filter(|url| self.contains(url))
            .ok_or_else(|| SecretStoreError::InvalidKey(key.to_string()))?;

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            tracing::warn!(store = %self.name, key = %key, status = %status, "Secret store request failed");
            return Err(SecretStoreError::Status(status.as_u16()));
        }
        Ok(Some(trim_newline(response.text().await?)))
    }
}

/// In-process store, for embedding and tests.
#[derive(Clone, Default)]
pub struct MemorySecretStore {
    name: String,
    entries: BTreeMap<String, String>,
}

impl MemorySecretStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for MemorySecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySecretStore")
            .field("name", &self.name)
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, SecretStoreError> {
        check_key(key)?;
        Ok(self.entries.get(key).cloned())
    }
}
