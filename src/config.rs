//! Run configuration.
//!
//! A [`PublishConfig`] is built once per run (defaults, then an optional TOML
//! file, then command-line overrides) and handed by reference to every
//! action. Nothing in it changes while a run is in progress.
//!
//! # Example
//!
//! ```toml
//! [client]
//! proxy = "localhost:8080"
//! timeout_secs = 300
//!
//! [index]
//! name = "index.html"
//! overwrite = false
//!
//! [inject]
//! uri_prefix = "http://example.com/"
//!
//! [seed.content_types]
//! bep44 = "application/x-bittorrent"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::PublishError;
use crate::layout;

pub const CLIENT_PROXY_DEF: &str = "localhost:8080";
pub const INDEX_NAME_DEF: &str = "index.html";

pub const API_UPLOAD_EP: &str = "http://localhost/api/upload";
pub const API_INSERT_EP_PFX: &str = "http://localhost/api/insert/";

/// Content type used for generic uploads.
pub const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

/// Content types of the insertion data formats known out of the box.
const BUILTIN_CONTENT_TYPES: &[(&str, &str)] = &[("bep44", "application/x-bittorrent")];

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PublishConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub inject: InjectConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// `HOST:PORT` of the Ouinet client's HTTP proxy.
    #[serde(default = "default_proxy")]
    pub proxy: String,
    /// Per-request timeout. Synchronous injection blocks until the client
    /// has stored the content, so this is generous.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy: default_proxy(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_proxy() -> String {
    CLIENT_PROXY_DEF.to_string()
}
fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            overwrite: false,
        }
    }
}

fn default_index_name() -> String {
    INDEX_NAME_DEF.to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InjectConfig {
    /// Prepended to content paths to build the injected URIs. No default.
    #[serde(default)]
    pub uri_prefix: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SeedConfig {
    /// Extra or overriding content types for insertion data, by db id.
    #[serde(default)]
    pub content_types: BTreeMap<String, String>,
}

impl SeedConfig {
    /// Content type to upload insertion data for `db` with, if the db is known.
    pub fn content_type_for(&self, db: &str) -> Option<&str> {
        if let Some(ctype) = self.content_types.get(db) {
            return Some(ctype.as_str());
        }
        BUILTIN_CONTENT_TYPES
            .iter()
            .find(|(id, _)| *id == db)
            .map(|(_, ctype)| *ctype)
    }
}

/// Endpoints of the client's control API, reached through the proxy.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_upload_endpoint")]
    pub upload_endpoint: String,
    #[serde(default = "default_insert_endpoint_prefix")]
    pub insert_endpoint_prefix: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            upload_endpoint: default_upload_endpoint(),
            insert_endpoint_prefix: default_insert_endpoint_prefix(),
        }
    }
}

fn default_upload_endpoint() -> String {
    API_UPLOAD_EP.to_string()
}
fn default_insert_endpoint_prefix() -> String {
    API_INSERT_EP_PFX.to_string()
}

impl ApiConfig {
    pub fn insert_endpoint(&self, db: &str) -> String {
        format!("{}{}", self.insert_endpoint_prefix, db)
    }
}

impl PublishConfig {
    /// Proxy URL for the HTTP client (`http://HOST:PORT`).
    pub fn proxy_url(&self) -> String {
        format!("http://{}", self.client.proxy)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.client.timeout_secs)
    }

    /// Check values that would otherwise only fail halfway through a run.
    ///
    /// The URI prefix is not checked here: only injection needs it, and the
    /// injector validates it itself.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(PublishError::InvalidConfig(msg).into()) };

        match self.client.proxy.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => {
                return invalid(format!(
                    "client proxy must be HOST:PORT, got '{}'",
                    self.client.proxy
                ))
            }
        }

        if self.client.timeout_secs == 0 {
            return invalid("client.timeout_secs must be > 0".to_string());
        }

        let name = &self.index.name;
        if name.is_empty()
            || name.contains('/')
            || name.contains(std::path::MAIN_SEPARATOR)
            || name == "."
            || name == ".."
            || layout::is_data_dir_name(name)
        {
            return invalid(format!("index name must be a plain file name, got '{}'", name));
        }

        for db in self.seed.content_types.keys() {
            if !layout::is_valid_db_id(db) {
                return invalid(format!(
                    "seed.content_types key must be lowercase alphanumeric, got '{}'",
                    db
                ));
            }
        }

        Ok(())
    }
}

/// Load configuration from a TOML file; missing keys take their defaults.
pub fn load_config(path: &Path) -> Result<PublishConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: PublishConfig =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config.validate()?;
    Ok(config)
}
