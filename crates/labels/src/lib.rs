//! Class label registry for the action recognition network
//!
//! Maps class indices to human-readable label names. The label file holds one
//! label per line, index = line number. On first run the file is bootstrapped
//! from a remote source; if neither a local nor a remote copy is available the
//! registry stays empty and predictions degrade to numeric class ids.

use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Ordered class-index-to-name table, immutable after load
#[derive(Debug, Default)]
pub struct LabelRegistry {
    labels: Vec<String>,
}

impl LabelRegistry {
    /// Build a registry from pre-parsed label lines (used by tests and tools)
    #[must_use]
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Load the label table, bootstrapping the local file from `url` if absent
    ///
    /// Never fails: any fetch or IO problem yields an empty registry so that
    /// startup is not blocked. Degradation is logged.
    pub async fn load(path: &Path, url: &str) -> Self {
        if !path.exists() {
            if let Err(e) = bootstrap_label_file(path, url).await {
                warn!(
                    "Failed to bootstrap label file {} from {}: {}",
                    path.display(),
                    url,
                    e
                );
            }
        }

        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let registry = Self::parse(&contents);
                info!(
                    "Loaded {} class labels from {}",
                    registry.len(),
                    path.display()
                );
                registry
            }
            Err(e) => {
                warn!(
                    "No label file at {} ({}); predictions will use numeric class ids",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    fn parse(contents: &str) -> Self {
        Self {
            labels: contents
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect(),
        }
    }

    /// Look up the label for a class index
    #[must_use]
    pub fn resolve(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Look up the label for a class index, falling back to `"Class {index}"`
    #[must_use]
    pub fn resolve_or_fallback(&self, index: usize) -> String {
        match self.resolve(index) {
            Some(label) => label.to_string(),
            None => format!("Class {index}"),
        }
    }

    /// Number of labels in the table
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the table is empty (bootstrap failed or file missing)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Download the label file from the remote source and cache it locally
async fn bootstrap_label_file(path: &Path, url: &str) -> Result<(), String> {
    info!("Label file missing, fetching from {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| format!("failed to create HTTP client: {e}"))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    if !response.status().is_success() {
        return Err(format!("request failed with status {}", response.status()));
    }

    let body = response
        .text()
        .await
        .map_err(|e| format!("failed to read response body: {e}"))?;

    tokio::fs::write(path, &body)
        .await
        .map_err(|e| format!("failed to write {}: {e}", path.display()))?;

    Ok(())
}
