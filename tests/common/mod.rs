#![allow(dead_code)]

use async_trait::async_trait;
use kita::core::error::{EmbedError, Error, Result};
use kita::{AppPlatform, EmbeddingService, InstalledApp, SemanticHit, Store};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Open a fresh store inside a temp directory
pub fn temp_store() -> (TempDir, Arc<Store>) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(&temp_dir.path().join("db").join("kita.redb")).unwrap();
    (temp_dir, Arc::new(store))
}

/// In-memory stand-in for the embedding service
#[derive(Default)]
pub struct FakeEmbedder {
    pub embedded: Mutex<Vec<String>>,
    pub added: Mutex<Vec<(u64, Vec<f32>)>>,
    pub hits: Mutex<Vec<SemanticHit>>,
    pub search_calls: AtomicUsize,
    pub fail_search: AtomicBool,
    pub search_delay: Mutex<Option<Duration>>,
    /// Embedding fails for any text containing this marker
    pub reject_marker: Mutex<Option<String>>,
}

impl FakeEmbedder {
    pub fn embed_count(&self) -> usize {
        self.embedded.lock().unwrap().len()
    }

    pub fn set_hits(&self, hits: Vec<(u64, f32)>) {
        *self.hits.lock().unwrap() = hits
            .into_iter()
            .map(|(file_id, distance)| SemanticHit { file_id, distance })
            .collect();
    }
}

#[async_trait]
impl EmbeddingService for FakeEmbedder {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbedError> {
        self.embedded.lock().unwrap().push(text.to_string());
        if let Some(marker) = self.reject_marker.lock().unwrap().as_deref() {
            if text.contains(marker) {
                return Err(EmbedError::Status {
                    status: 500,
                    body: "model failure".to_string(),
                });
            }
        }
        Ok(vec![text.len() as f32, 1.0, 0.0])
    }

    async fn add_file(&self, file_id: u64, embedding: &[f32]) -> std::result::Result<(), EmbedError> {
        self.added.lock().unwrap().push((file_id, embedding.to_vec()));
        Ok(())
    }

    async fn search(&self, _query: &str, k: usize) -> std::result::Result<Vec<SemanticHit>, EmbedError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.search_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(EmbedError::Transport("connection refused".to_string()));
        }
        Ok(self.hits.lock().unwrap().iter().take(k).cloned().collect())
    }
}

/// Fixed set of applications
#[derive(Default)]
pub struct FakePlatform {
    pub installed: Vec<String>,
    pub running: Vec<String>,
    pub fail: AtomicBool,
    /// How long a bundle scan takes
    pub scan_delay: Option<Duration>,
    pub enumerations: AtomicUsize,
}

impl FakePlatform {
    pub fn new(installed: &[&str], running: &[&str]) -> Self {
        Self {
            installed: installed.iter().map(|s| s.to_string()).collect(),
            running: running.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_scan_delay(mut self, delay: Duration) -> Self {
        self.scan_delay = Some(delay);
        self
    }
}

#[async_trait]
impl AppPlatform for FakePlatform {
    async fn installed_apps(&self) -> Result<Vec<InstalledApp>> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.scan_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::OsQuery("listing failed".to_string()));
        }
        Ok(self
            .installed
            .iter()
            .map(|name| InstalledApp {
                name: name.clone(),
                path: PathBuf::from(format!("/Applications/{}.app", name)),
            })
            .collect())
    }

    async fn running_app_names(&self) -> Result<Vec<String>> {
        Ok(self.running.clone())
    }

    async fn activate(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn launch(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn icon(&self, _path: &Path) -> Option<String> {
        None
    }
}
