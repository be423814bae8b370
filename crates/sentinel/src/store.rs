//! Key-value store client — etcd v2 HTTP API.
//!
//! Only the two operations the registration protocol needs: set a key with
//! a TTL, and refresh the TTL of an existing directory.

use thiserror::Error;
use tracing::debug;

/// Port the store listens on when the endpoint doesn't name one.
const DEFAULT_STORE_PORT: u16 = 2379;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone)]
pub struct EtcdClient {
    http: reqwest::Client,
    base_url: String,
}

impl EtcdClient {
    /// Build a client for `endpoint`. Bare hosts are accepted: the scheme
    /// and default port are filled in when missing.
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: normalize_endpoint(endpoint),
        }
    }

    /// Create or overwrite `key` with `value`, expiring after `ttl_secs`.
    pub async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        debug!(key, ttl = ttl_secs, "store set");
        let response = self
            .http
            .put(self.key_url(key))
            .form(&[("value", value), ("ttl", ttl_secs.to_string().as_str())])
            .send()
            .await?;
        Self::ensure_success(response).await
    }

    /// Refresh the TTL of an existing directory at `path`.
    pub async fn refresh_dir(&self, path: &str, ttl_secs: u64) -> Result<(), StoreError> {
        debug!(path, ttl = ttl_secs, "store refresh dir");
        let response = self
            .http
            .put(self.key_url(path))
            .form(&[
                ("ttl", ttl_secs.to_string().as_str()),
                ("dir", "true"),
                ("prevExist", "true"),
            ])
            .send()
            .await?;
        Self::ensure_success(response).await
    }

    fn key_url(&self, key: &str) -> String {
        format!("{}/v2/keys{}", self.base_url, key)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<(), StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Accepts `10.0.0.1`, `10.0.0.1:4001`, or a full `http(s)://` URL and
/// returns a normalized base URL without a trailing slash.
fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    let (scheme, host) = match trimmed.split_once("://") {
        Some((scheme, host)) => (scheme, host),
        None => ("http", trimmed),
    };
    if host.contains(':') {
        format!("{}://{}", scheme, host)
    } else {
        format!("{}://{}:{}", scheme, host, DEFAULT_STORE_PORT)
    }
}
