use super::TileKey;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Tile download errors
#[derive(Debug, Clone)]
pub enum FetchError {
    NetworkTimeout,
    Connection(String),
    HttpError(u16),
    Body(String),
    EmptyBody,
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            FetchError::NetworkTimeout => write!(f, "Network timeout"),
            FetchError::Connection(msg) => write!(f, "Connection failed: {}", msg),
            FetchError::HttpError(code) => write!(f, "HTTP error: {}", code),
            FetchError::Body(msg) => write!(f, "Failed to read response: {}", msg),
            FetchError::EmptyBody => write!(f, "Empty tile body"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Source of live tile imagery
#[async_trait]
pub trait TileFetch: Send + Sync {
    async fn fetch(&self, key: TileKey) -> Result<Bytes, FetchError>;
}

/// Tile server client driven by a URL template
///
/// The template carries `{z}`, `{x}` and `{y}` placeholders, and optionally
/// `{s}` which rotates over the configured subdomains by `(x + y) % n`.
pub struct HttpTileFetcher {
    client: reqwest::Client,
    url_template: String,
    subdomains: Vec<String>,
}

impl HttpTileFetcher {
    pub fn new(url_template: &str, subdomains: &[String], timeout: Duration, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        HttpTileFetcher {
            client,
            url_template: url_template.to_string(),
            subdomains: subdomains.to_vec(),
        }
    }

    /// Expand the URL template for `key`
    pub fn tile_url(&self, key: TileKey) -> String {
        let mut url = self
            .url_template
            .replace("{z}", &key.zoom.to_string())
            .replace("{x}", &key.x.to_string())
            .replace("{y}", &key.y.to_string());

        if url.contains("{s}") {
            let sub = if self.subdomains.is_empty() {
                ""
            } else {
                let idx = ((key.x as u64 + key.y as u64) % self.subdomains.len() as u64) as usize;
                self.subdomains[idx].as_str()
            };
            url = url.replace("{s}", sub);
        }

        url
    }
}

#[async_trait]
impl TileFetch for HttpTileFetcher {
    /// Single GET, no retries
    async fn fetch(&self, key: TileKey) -> Result<Bytes, FetchError> {
        let url = self.tile_url(key);

        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_timeout() {
                    return Err(FetchError::NetworkTimeout);
                }
                return Err(FetchError::Connection(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpError(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;
        if body.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        Ok(body)
    }
}
