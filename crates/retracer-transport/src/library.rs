//! Library fragment content providers.
//!
//! A library provider answers "what is the content behind this 256-bit code
//! fragment hash". The resolver chains several of these with a pacing delay
//! between attempts; each individual provider only reports hit, miss, or
//! failure.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use retracer_types::env_utils::env_bool;
use retracer_types::{Cell, Hash256};

/// Content provider for externally-referenced code fragments.
#[async_trait::async_trait]
pub trait LibraryProvider: Send + Sync {
    /// Fetch the fragment content; `None` means the provider does not know
    /// this hash (a miss, not a failure).
    async fn library(&self, hash: &Hash256) -> Result<Option<Cell>>;

    /// Stable provider name for logs and error text.
    fn name(&self) -> &str;
}

/// Blocking HTTP client for a library content endpoint.
#[derive(Clone)]
pub struct LibraryClient {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl LibraryClient {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: None,
            agent: ureq::AgentBuilder::new()
                .timeout(std::time::Duration::from_millis(15_000))
                .build(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn fetch(&self, hash: &Hash256) -> Result<Option<Cell>> {
        let url = format!("{}/libraries", self.endpoint.trim_end_matches('/'));
        let mut request = self.agent.get(&url).query("hash", &hash.to_hex());
        if let Some(key) = &self.api_key {
            request = request.set("X-Api-Key", key);
        }

        let debug = env_bool("RETRACER_DEBUG_PROVIDER");
        let value: serde_json::Value = match request.call() {
            Ok(response) => {
                if debug {
                    eprintln!(
                        "[provider] GET {} hash={} status={}",
                        url,
                        hash,
                        response.status()
                    );
                }
                response
                    .into_json()
                    .with_context(|| format!("invalid JSON from {}", url))?
            }
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                bail!("library provider {} returned {}: {}", self.name, code, body)
            }
            Err(e) => return Err(anyhow!("request to {} failed: {}", url, e)),
        };

        let response: LibrariesResponse =
            serde_json::from_value(value).context("unexpected libraries shape")?;
        let Some(entry) = response
            .libraries
            .into_iter()
            .find(|e| Hash256::from_hex(&e.hash).map(|h| h == *hash).unwrap_or(false))
        else {
            return Ok(None);
        };
        let cell = Cell::from_base64(&entry.boc).context("invalid library payload")?;
        Ok(Some(cell))
    }
}

#[derive(Debug, Deserialize)]
struct LibrariesResponse {
    #[serde(default)]
    libraries: Vec<RawLibrary>,
}

#[derive(Debug, Deserialize)]
struct RawLibrary {
    hash: String,
    boc: String,
}

#[async_trait::async_trait]
impl LibraryProvider for LibraryClient {
    async fn library(&self, hash: &Hash256) -> Result<Option<Cell>> {
        let client = self.clone();
        let hash = *hash;
        tokio::task::spawn_blocking(move || client.fetch(&hash))
            .await
            .map_err(|e| anyhow!("library task failed: {}", e))?
    }

    fn name(&self) -> &str {
        &self.name
    }
}
