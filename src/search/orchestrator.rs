//! Fans a query out to the file-name, semantic and application sources and
//! assembles the answers into ordered sections.

use crate::apps::cache::{AppCache, AppRecord};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::search::embedding::EmbeddingService;
use crate::storage::records::{FileRecord, RecentRecord};
use crate::storage::store::Store;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

/// Maximum rows in the file-name and recent-files sections
pub const FILE_MATCH_LIMIT: usize = 50;

pub const APPS_TITLE: &str = "Applications";
pub const FILE_MATCHES_TITLE: &str = "File Name Matches";
pub const SEMANTIC_MATCHES_TITLE: &str = "Semantic Matches";
pub const RECENT_FILES_TITLE: &str = "Recent Files";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Apps,
    Files,
    Semantic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchItem {
    App {
        app: AppRecord,
    },
    File {
        file: FileRecord,
        /// `1 - distance` for semantic hits, absent for name matches
        #[serde(skip_serializing_if = "Option::is_none")]
        score: Option<f32>,
    },
}

/// One titled group of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSection {
    pub kind: SectionKind,
    pub title: String,
    pub items: Vec<SearchItem>,
}

impl SearchSection {
    fn new(kind: SectionKind, title: &str, items: Vec<SearchItem>) -> Self {
        Self {
            kind,
            title: title.to_string(),
            items,
        }
    }
}

pub struct SearchOrchestrator {
    store: Arc<Store>,
    embedder: Arc<dyn EmbeddingService>,
    apps: Arc<AppCache>,
    semantic_k: usize,
    source_timeout: Duration,
}

impl SearchOrchestrator {
    pub fn new(store: Arc<Store>, embedder: Arc<dyn EmbeddingService>, apps: Arc<AppCache>) -> Self {
        Self {
            store,
            embedder,
            apps,
            semantic_k: 10,
            source_timeout: Duration::from_secs(2),
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<Store>,
        embedder: Arc<dyn EmbeddingService>,
        apps: Arc<AppCache>,
    ) -> Self {
        Self::new(store, embedder, apps)
            .with_semantic_k(config.semantic_k)
            .with_source_timeout(config.source_timeout)
    }

    pub fn with_semantic_k(mut self, k: usize) -> Self {
        self.semantic_k = k;
        self
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub fn apps(&self) -> &Arc<AppCache> {
        &self.apps
    }

    /// Run every source for `query` and return the non-empty sections in
    /// display order. A source that fails or times out is left out.
    pub async fn search(&self, query: &str) -> Vec<SearchSection> {
        let query = query.trim();
        if query.is_empty() {
            return self.recent_sections().await;
        }

        let (apps, files, semantic) = tokio::join!(
            self.bounded("apps", self.search_apps(query)),
            self.bounded("files", self.search_files(query)),
            self.bounded("semantic", self.search_semantic(query)),
        );

        let mut sections = Vec::with_capacity(3);
        if let Some(apps) = apps.filter(|a| !a.is_empty()) {
            let items = apps.into_iter().map(|app| SearchItem::App { app }).collect();
            sections.push(SearchSection::new(SectionKind::Apps, APPS_TITLE, items));
        }
        if let Some(files) = files.filter(|f| !f.is_empty()) {
            let items = files
                .into_iter()
                .map(|file| SearchItem::File { file, score: None })
                .collect();
            sections.push(SearchSection::new(SectionKind::Files, FILE_MATCHES_TITLE, items));
        }
        if let Some(semantic) = semantic.filter(|s| !s.is_empty()) {
            let items = semantic
                .into_iter()
                .map(|(file, score)| SearchItem::File {
                    file,
                    score: Some(score),
                })
                .collect();
            sections.push(SearchSection::new(
                SectionKind::Semantic,
                SEMANTIC_MATCHES_TITLE,
                items,
            ));
        }
        sections
    }

    /// Remember that the user opened `path`
    pub async fn record_open(&self, path: &str) -> Result<RecentRecord> {
        let store = Arc::clone(&self.store);
        let path = path.to_string();
        tokio::task::spawn_blocking(move || store.record_open(&path))
            .await
            .map_err(|e| Error::Persistence(format!("store task failed: {}", e)))?
    }

    async fn bounded<T, F>(&self, source: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.source_timeout, fut).await {
            Ok(Ok(items)) => Some(items),
            Ok(Err(e)) => {
                warn!("Search source {} failed: {}", source, e);
                None
            }
            Err(_) => {
                warn!(
                    "Search source {} timed out after {:?}",
                    source, self.source_timeout
                );
                None
            }
        }
    }

    async fn search_apps(&self, query: &str) -> Result<Vec<AppRecord>> {
        Ok(self.apps.query(query).await)
    }

    async fn search_files(&self, query: &str) -> Result<Vec<FileRecord>> {
        let store = Arc::clone(&self.store);
        let query = query.to_string();
        tokio::task::spawn_blocking(move || store.search_files(&query, FILE_MATCH_LIMIT))
            .await
            .map_err(|e| Error::Persistence(format!("store task failed: {}", e)))?
    }

    async fn search_semantic(&self, query: &str) -> Result<Vec<(FileRecord, f32)>> {
        let hits = self.embedder.search(query, self.semantic_k).await?;

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut resolved = Vec::with_capacity(hits.len());
            for hit in hits {
                match store.get_file(hit.file_id)? {
                    Some(file) => resolved.push((file, 1.0 - hit.distance)),
                    None => debug!("Dropping stale semantic hit {}", hit.file_id),
                }
            }
            Ok(resolved)
        })
        .await
        .map_err(|e| Error::Persistence(format!("store task failed: {}", e)))?
    }

    async fn recent_sections(&self) -> Vec<SearchSection> {
        let store = Arc::clone(&self.store);
        let recent = self
            .bounded("recent", async move {
                tokio::task::spawn_blocking(move || store.recent_files(FILE_MATCH_LIMIT))
                    .await
                    .map_err(|e| Error::Persistence(format!("store task failed: {}", e)))?
            })
            .await;

        match recent.filter(|files| !files.is_empty()) {
            Some(files) => {
                let items = files
                    .into_iter()
                    .map(|file| SearchItem::File { file, score: None })
                    .collect();
                vec![SearchSection::new(SectionKind::Files, RECENT_FILES_TITLE, items)]
            }
            None => Vec::new(),
        }
    }
}

/// Search-as-you-type driver: submitting a query aborts the one still running.
pub struct LiveSearch {
    orchestrator: Arc<SearchOrchestrator>,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl LiveSearch {
    pub fn new(orchestrator: Arc<SearchOrchestrator>) -> Self {
        Self {
            orchestrator,
            in_flight: Mutex::new(None),
        }
    }

    pub fn submit(&self, query: impl Into<String>) -> JoinHandle<Vec<SearchSection>> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let query = query.into();
        let handle = tokio::spawn(async move { orchestrator.search(&query).await });

        let previous = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
        handle
    }
}
