//! RMLMapper release downloader
//!
//! Fetches the latest published RMLMapper release from GitHub and streams its jar
//! to the configured engine path. The converter only calls this after the engine
//! reported that its binary is missing.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Latest-release endpoint of the RMLMapper repository
const RMLMAPPER_LATEST_URL: &str = "https://api.github.com/repos/rmlio/rmlmapper-java/releases/latest";

/// GitHub rejects API requests without a user agent
const DOWNLOADER_USER_AGENT: &str = "RMLMapper downloader";

/// Marker identifying the runnable package among release assets
const JAR_MARKER: &str = ".jar";

/// Errors that can occur while acquiring the engine binary
#[derive(Debug, Error)]
pub enum DependencyError {
    /// The latest release has no usable asset
    #[error("No jar was found for release {0}")]
    NotFound(String),

    /// Release query or download failed in transport
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The release document could not be parsed
    #[error("Failed to parse release response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Writing the downloaded jar failed
    #[error("Failed to write engine binary: {0}")]
    Io(#[from] std::io::Error),
}

/// Release document returned by the GitHub API
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Version tag, e.g. `v7.3.3`
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A single downloadable file attached to a release
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub browser_download_url: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Release {
    /// First asset whose download URL contains `marker`
    pub fn find_asset(&self, marker: &str) -> Option<&ReleaseAsset> {
        self.assets
            .iter()
            .find(|asset| asset.browser_download_url.contains(marker))
    }
}

/// Something that can make the engine binary available locally
#[async_trait]
pub trait DependencyProvider: Send + Sync {
    /// Installs the engine binary and returns the installed version
    async fn ensure_available(&self) -> Result<String, DependencyError>;
}

/// Downloads the RMLMapper jar from its GitHub releases
#[derive(Debug, Clone)]
pub struct DependencyManager {
    client: Client,
    release_url: String,
    target_path: PathBuf,
    /// Shared by clones so one process installs at most one jar at a time
    install_lock: Arc<Mutex<()>>,
}

impl DependencyManager {
    /// Creates a manager that installs the jar at `target_path`
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::new(),
            release_url: RMLMAPPER_LATEST_URL.to_string(),
            target_path: target_path.into(),
            install_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create a new DependencyManager with a custom HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Overrides the release endpoint (for testing or mirrors)
    pub fn with_release_url(mut self, url: impl Into<String>) -> Self {
        self.release_url = url.into();
        self
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Fetches and parses the latest release document
    pub async fn latest_release(&self) -> Result<Release, DependencyError> {
        let response = self
            .client
            .get(&self.release_url)
            .header(USER_AGENT, DOWNLOADER_USER_AGENT)
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        let release: Release = serde_json::from_str(&text)?;
        Ok(release)
    }

    /// Streams `url` to the target path
    ///
    /// The body goes to a uniquely named temporary file in the target's
    /// directory and is persisted over the target once complete, so a failed
    /// download never leaves a truncated jar behind and concurrent installs
    /// never share a scratch file.
    async fn download(&self, url: &str) -> Result<u64, DependencyError> {
        let parent = match self.target_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent).await?;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, DOWNLOADER_USER_AGENT)
            .send()
            .await?
            .error_for_status()?;

        // Dropping `scratch` on any early return removes the partial file
        let scratch = tempfile::Builder::new()
            .prefix(".rmlmapper-")
            .suffix(".part")
            .tempfile_in(&parent)?;
        let mut file = tokio::fs::File::from_std(scratch.reopen()?);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        scratch
            .persist(&self.target_path)
            .map_err(|e| DependencyError::Io(e.error))?;
        Ok(written)
    }
}

#[async_trait]
impl DependencyProvider for DependencyManager {
    async fn ensure_available(&self) -> Result<String, DependencyError> {
        let _install = self.install_lock.lock().await;
        debug!(url = %self.release_url, "Looking up latest RMLMapper release");
        let release = self.latest_release().await?;

        let asset = release
            .find_asset(JAR_MARKER)
            .ok_or_else(|| DependencyError::NotFound(release.tag_name.clone()))?;

        info!(
            version = %release.tag_name,
            url = %asset.browser_download_url,
            path = %self.target_path.display(),
            "Downloading RMLMapper"
        );
        let bytes = self.download(&asset.browser_download_url).await?;
        info!(version = %release.tag_name, bytes, "RMLMapper installed");

        Ok(release.tag_name)
    }
}
