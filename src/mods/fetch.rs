//! Fetching mod artifacts into the staging area

use crate::config::NetworkConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Retrieves the bytes behind a URL into a local file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Write the resource at `url` to `dest`, returning the byte count.
    /// On error `dest` may hold a partial file; callers only ever point it
    /// into a staging directory.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// HTTP fetcher with bounded timeouts
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(network.user_agent.clone())
            .connect_timeout(Duration::from_secs(network.connect_timeout_secs))
            .timeout(Duration::from_secs(network.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to start download")?;

        if !response.status().is_success() {
            bail!("server returned status {}", response.status());
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .context("Failed to create staging file")?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading download stream")?;
            file.write_all(&chunk)
                .await
                .context("Failed to write staging file")?;
            downloaded += chunk.len() as u64;
        }

        file.flush().await.context("Failed to flush staging file")?;
        tracing::debug!("Fetched {} bytes from {}", downloaded, url);
        Ok(downloaded)
    }
}
