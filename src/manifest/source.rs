//! Manifest suppliers

use super::Manifest;
use crate::config::NetworkConfig;
use crate::error::Error;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Supplier of a manifest document
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn load(&self) -> Result<Manifest, Error>;

    /// Human readable origin, for logs and status output
    fn describe(&self) -> String;
}

/// Fetches the manifest over HTTP
pub struct HttpManifestSource {
    client: reqwest::Client,
    url: String,
}

impl HttpManifestSource {
    pub fn new(url: impl Into<String>, network: &NetworkConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(network.user_agent.clone())
            .connect_timeout(Duration::from_secs(network.connect_timeout_secs))
            .timeout(Duration::from_secs(network.timeout_secs))
            .build()
            .map_err(|e| Error::ManifestUnavailable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn load(&self) -> Result<Manifest, Error> {
        tracing::debug!("Fetching manifest from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::ManifestUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ManifestUnavailable(format!(
                "{} returned status {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ManifestUnavailable(format!("failed to read body: {}", e)))?;

        let manifest = Manifest::from_json(&body)?;
        tracing::info!("Loaded manifest with {} entries", manifest.len());
        Ok(manifest)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reads the manifest from a local file
pub struct FileManifestSource {
    path: PathBuf,
}

impl FileManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ManifestSource for FileManifestSource {
    async fn load(&self) -> Result<Manifest, Error> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::ManifestUnavailable(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        Manifest::from_json(&content)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
