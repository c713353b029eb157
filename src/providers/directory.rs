use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::lookup::{DirectoryProvider, SymbolEntry};
use crate::providers::util::with_retry;

/// Fetches a symbol listing from a JSON endpoint serving
/// `[{"code": "...", "name": "..."}]`.
pub struct HttpDirectoryProvider {
    base_url: String,
}

impl HttpDirectoryProvider {
    pub fn new(base_url: &str) -> Self {
        HttpDirectoryProvider {
            base_url: base_url.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    code: String,
    name: String,
}

#[async_trait]
impl DirectoryProvider for HttpDirectoryProvider {
    async fn load_directory(&self) -> Result<Vec<SymbolEntry>> {
        let url = format!("{}/listing", self.base_url);
        debug!("Requesting symbol listing from {}", url);

        let client = reqwest::Client::builder().user_agent("realfx/0.2").build()?;
        let response = with_retry(|| async { client.get(&url).send().await }, 3, 500)
            .await
            .with_context(|| format!("Failed to fetch symbol listing from {url}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for symbol listing",
                response.status()
            ));
        }

        let entries = response
            .json::<Vec<ListingEntry>>()
            .await
            .context("Failed to parse symbol listing")?;

        Ok(entries
            .into_iter()
            .map(|e| SymbolEntry {
                code: e.code,
                name: e.name,
            })
            .collect())
    }
}
