//! The local Ouinet client, as seen through its HTTP proxy.
//!
//! Two kinds of requests are made, both through the client's proxy port:
//!
//! | Request | Purpose |
//! |---------|---------|
//! | `GET <uri>` with `X-Ouinet-Sync: true` | synchronous injection of a URI |
//! | `POST http://localhost/api/upload` | seed raw content (answers `data_links`) |
//! | `POST http://localhost/api/insert/<db>` | reinsert a mapping (answers `key`) |
//!
//! The [`Agent`] trait is the seam between the actions and the network, so
//! the inject and seed logic can run against an in-memory agent.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::Deserialize;
use std::path::Path;

use crate::classify::UploadTarget;
use crate::config::PublishConfig;

/// Request header asking the client to inject synchronously.
pub const SYNC_HEADER: &str = "X-Ouinet-Sync";

/// Headers of an injection response, names lowercased.
#[derive(Debug, Clone, Default)]
pub struct InjectionResponse {
    pub headers: Vec<(String, Vec<u8>)>,
}

impl InjectionResponse {
    pub fn with_header(mut self, name: &str, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }
}

/// Successful answer to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadReceipt {
    /// Storage links of uploaded content.
    DataLinks(Vec<String>),
    /// Key under which insertion data was (re)inserted.
    Key(String),
}

impl UploadReceipt {
    /// Log detail: `BEP44=<key>` for insertions, the space-separated links otherwise.
    pub fn detail(&self, db: Option<&str>) -> String {
        match self {
            UploadReceipt::DataLinks(links) => links.join(" "),
            UploadReceipt::Key(key) => {
                format!("{}={}", db.unwrap_or_default().to_uppercase(), key)
            }
        }
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    /// Request `uri` synchronously so that it gets injected, returning the
    /// response headers once the body has been fully read.
    async fn inject(&self, uri: &str) -> Result<InjectionResponse>;

    /// Upload the content of the file at `path` to the endpoint described
    /// by `target`.
    async fn upload(&self, target: &UploadTarget, path: &Path) -> Result<UploadReceipt>;
}

/// [`Agent`] reached over HTTP through the client's proxy.
#[derive(Clone)]
pub struct HttpAgent {
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct InsertResponse {
    key: String,
}

#[derive(Deserialize)]
struct DataResponse {
    data_links: Vec<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

impl HttpAgent {
    pub fn new(config: &PublishConfig) -> Result<Self> {
        let proxy = reqwest::Proxy::http(config.proxy_url())
            .with_context(|| format!("Invalid client proxy: {}", config.client.proxy))?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Agent for HttpAgent {
    async fn inject(&self, uri: &str) -> Result<InjectionResponse> {
        let mut response = self
            .client
            .get(uri)
            .header(SYNC_HEADER, "true")
            .send()
            .await?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();

        // Consume body data.
        while response.chunk().await?.is_some() {}

        if !status.is_success() {
            bail!("HTTP {}", status);
        }
        Ok(InjectionResponse { headers })
    }

    async fn upload(&self, target: &UploadTarget, path: &Path) -> Result<UploadReceipt> {
        // Opened right before the request; the body owns the handle and
        // closes it once sent.
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let len = file
            .metadata()
            .await
            .with_context(|| format!("Failed to read metadata of {}", path.display()))?
            .len();

        let response = self
            .client
            .post(&target.endpoint)
            .header(CONTENT_TYPE, &target.content_type)
            .header(CONTENT_LENGTH, len)
            .body(reqwest::Body::from(file))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // Attempt to extract the API error string.
            let msg = serde_json::from_str::<ApiError>(&text)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(anyhow!(msg));
        }

        if target.db.is_some() {
            let msg: InsertResponse = serde_json::from_str(&text)
                .context("Malformed insertion response")?;
            Ok(UploadReceipt::Key(msg.key))
        } else {
            let msg: DataResponse =
                serde_json::from_str(&text).context("Malformed upload response")?;
            Ok(UploadReceipt::DataLinks(msg.data_links))
        }
    }
}
