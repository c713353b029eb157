//! Symbol directory for resolving company names to ticker codes.
//!
//! The listing is loaded lazily through an injected provider on first use;
//! until then the directory sits in an explicit `NotLoaded` state. A failed
//! load leaves it `NotLoaded` so a later call can retry.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub code: String,
    pub name: String,
}

#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    async fn load_directory(&self) -> Result<Vec<SymbolEntry>>;
}

enum DirectoryState {
    NotLoaded,
    Loaded(Arc<Vec<SymbolEntry>>),
}

pub struct SymbolDirectory {
    state: Mutex<DirectoryState>,
}

impl SymbolDirectory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DirectoryState::NotLoaded),
        }
    }

    async fn entries(&self, provider: &dyn DirectoryProvider) -> Result<Arc<Vec<SymbolEntry>>> {
        let mut state = self.state.lock().await;
        if let DirectoryState::Loaded(entries) = &*state {
            return Ok(Arc::clone(entries));
        }
        info!("Loading symbol directory...");
        let entries = Arc::new(provider.load_directory().await?);
        debug!("Loaded {} directory entries", entries.len());
        *state = DirectoryState::Loaded(Arc::clone(&entries));
        Ok(entries)
    }

    /// Resolve a query to a single entry: exact code match, then exact name
    /// match, then first substring name match.
    pub async fn resolve(
        &self,
        provider: &dyn DirectoryProvider,
        query: &str,
    ) -> Result<Option<SymbolEntry>> {
        let entries = self.entries(provider).await?;
        if let Some(entry) = entries.iter().find(|e| e.code == query) {
            return Ok(Some(entry.clone()));
        }
        if let Some(entry) = entries.iter().find(|e| e.name == query) {
            return Ok(Some(entry.clone()));
        }
        Ok(entries.iter().find(|e| e.name.contains(query)).cloned())
    }

    /// Company name for a bare ticker code.
    pub async fn name_of(
        &self,
        provider: &dyn DirectoryProvider,
        code: &str,
    ) -> Result<Option<String>> {
        let entries = self.entries(provider).await?;
        Ok(entries
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.name.clone()))
    }

    /// Every entry matching the query by code or name substring.
    pub async fn search(
        &self,
        provider: &dyn DirectoryProvider,
        query: &str,
    ) -> Result<Vec<SymbolEntry>> {
        let entries = self.entries(provider).await?;
        Ok(entries
            .iter()
            .filter(|e| e.code == query || e.name.contains(query))
            .cloned()
            .collect())
    }
}

impl Default for SymbolDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockDirectoryProvider {
        entries: Vec<SymbolEntry>,
        loads: AtomicUsize,
        fail_first: bool,
    }

    impl MockDirectoryProvider {
        fn new(entries: Vec<SymbolEntry>) -> Self {
            Self {
                entries,
                loads: AtomicUsize::new(0),
                fail_first: false,
            }
        }

        fn failing_first(entries: Vec<SymbolEntry>) -> Self {
            Self {
                entries,
                loads: AtomicUsize::new(0),
                fail_first: true,
            }
        }
    }

    #[async_trait]
    impl DirectoryProvider for MockDirectoryProvider {
        async fn load_directory(&self) -> Result<Vec<SymbolEntry>> {
            let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && attempt == 0 {
                return Err(anyhow!("listing unavailable"));
            }
            Ok(self.entries.clone())
        }
    }

    fn entry(code: &str, name: &str) -> SymbolEntry {
        SymbolEntry {
            code: code.to_string(),
            name: name.to_string(),
        }
    }

    fn sample_entries() -> Vec<SymbolEntry> {
        vec![
            entry("005930", "Samsung Electronics"),
            entry("005935", "Samsung Electronics Pref"),
            entry("000660", "SK hynix"),
        ]
    }

    #[tokio::test]
    async fn test_directory_loads_once() {
        let provider = MockDirectoryProvider::new(sample_entries());
        let directory = SymbolDirectory::new();

        assert!(
            directory
                .resolve(&provider, "SK hynix")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            directory
                .name_of(&provider, "005930")
                .await
                .unwrap()
                .is_some()
        );
        assert_eq!(provider.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_stays_not_loaded_and_retries() {
        let provider = MockDirectoryProvider::failing_first(sample_entries());
        let directory = SymbolDirectory::new();

        assert!(directory.resolve(&provider, "SK hynix").await.is_err());
        // Second call retries the load instead of caching the failure.
        let resolved = directory.resolve(&provider, "SK hynix").await.unwrap();
        assert_eq!(resolved, Some(entry("000660", "SK hynix")));
        assert_eq!(provider.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resolve_prefers_exact_matches() {
        let provider = MockDirectoryProvider::new(sample_entries());
        let directory = SymbolDirectory::new();

        let by_code = directory.resolve(&provider, "005935").await.unwrap();
        assert_eq!(by_code.unwrap().name, "Samsung Electronics Pref");

        let by_name = directory
            .resolve(&provider, "Samsung Electronics")
            .await
            .unwrap();
        assert_eq!(by_name.unwrap().code, "005930");

        let by_substring = directory.resolve(&provider, "hynix").await.unwrap();
        assert_eq!(by_substring.unwrap().code, "000660");

        assert_eq!(directory.resolve(&provider, "Nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_search_returns_all_matches() {
        let provider = MockDirectoryProvider::new(sample_entries());
        let directory = SymbolDirectory::new();

        let matches = directory.search(&provider, "Samsung").await.unwrap();
        assert_eq!(matches.len(), 2);

        let none = directory.search(&provider, "Posco").await.unwrap();
        assert!(none.is_empty());
    }
}
