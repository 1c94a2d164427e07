//! Content indexing pipeline.
//!
//! Discovery produces a list of files. A fixed pool of workers extracts and
//! embeds them concurrently, and a single writer (the task driving
//! [`ContentIndexer::index`]) persists each result, publishes the vector to the
//! embedding service and advances the progress counter. Workers never touch the
//! store, so two writes for the same path cannot interleave.

use crate::core::error::{Error, ExtractError, Result};
use crate::indexing::discovery::{discover_roots, DiscoveredFile};
use crate::indexing::extract::ExtractorRegistry;
use crate::search::embedding::EmbeddingService;
use crate::storage::records::FileMeta;
use crate::storage::store::Store;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};

/// Default number of concurrent extraction pipelines
pub const DEFAULT_WORKERS: usize = 4;

const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Snapshot of an indexing run, published after every processed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexingProgress {
    pub total: usize,
    pub processed: usize,
    pub percentage: u8,
}

impl IndexingProgress {
    pub fn new(total: usize, processed: usize) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            ((processed as f64 / total as f64) * 100.0).round().min(100.0) as u8
        };
        Self {
            total,
            processed,
            percentage,
        }
    }
}

/// Result of one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub success: bool,
    /// Files whose metadata and embedding were written
    pub files_processed: usize,
    /// Unsupported or empty files
    pub skipped: usize,
    /// Files that failed extraction, embedding or persistence
    pub failed: usize,
}

/// Why a file produced no embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    Unsupported,
    Empty,
}

/// What a worker hands to the writer
enum Prepared {
    Ready { file: DiscoveredFile, vector: Vec<f32> },
    Skipped { file: DiscoveredFile, reason: SkipReason },
    Failed { file: DiscoveredFile, error: Error },
}

/// Indexes file contents into the store and the embedding service.
pub struct ContentIndexer {
    store: Arc<Store>,
    extractors: Arc<ExtractorRegistry>,
    embedder: Arc<dyn EmbeddingService>,
    workers: usize,
    progress: broadcast::Sender<IndexingProgress>,
}

impl ContentIndexer {
    pub fn new(
        store: Arc<Store>,
        extractors: Arc<ExtractorRegistry>,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Self {
        let (progress, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            store,
            extractors,
            embedder,
            workers: DEFAULT_WORKERS,
            progress,
        }
    }

    /// Set the number of concurrent workers (at least one)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Receive progress updates for runs started after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<IndexingProgress> {
        self.progress.subscribe()
    }

    /// Index every file under `roots`.
    ///
    /// Per-file failures are counted and logged; the run itself only fails when
    /// it cannot be carried out at all.
    pub async fn index(&self, roots: &[PathBuf]) -> Result<IndexSummary> {
        let owned_roots = roots.to_vec();
        let files = tokio::task::spawn_blocking(move || discover_roots(&owned_roots))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("discovery task failed: {}", e))))?;

        let total = files.len();
        info!("Indexing {} files from {} root(s)", total, roots.len());

        let mut summary = IndexSummary {
            success: true,
            ..Default::default()
        };
        if total == 0 {
            return Ok(summary);
        }

        let queue = Arc::new(Mutex::new(files.into_iter()));
        let (results_tx, mut results_rx) = mpsc::channel::<Prepared>(self.workers * 2);

        let mut handles = Vec::with_capacity(self.workers);
        for _ in 0..self.workers.min(total) {
            let queue = Arc::clone(&queue);
            let results_tx = results_tx.clone();
            let extractors = Arc::clone(&self.extractors);
            let embedder = Arc::clone(&self.embedder);

            handles.push(tokio::spawn(async move {
                loop {
                    let next = queue.lock().await.next();
                    let Some(file) = next else { break };
                    let prepared = prepare(file, &extractors, embedder.as_ref()).await;
                    if results_tx.send(prepared).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(results_tx);

        let mut processed = 0;
        while let Some(prepared) = results_rx.recv().await {
            match prepared {
                Prepared::Ready { file, vector } => match self.persist(&file, vector).await {
                    Ok(id) => {
                        debug!("Indexed {} as file {}", file.path.display(), id);
                        summary.files_processed += 1;
                    }
                    Err(e) => {
                        warn!("Failed to store {}: {}", file.path.display(), e);
                        summary.failed += 1;
                    }
                },
                Prepared::Skipped { file, reason } => {
                    debug!("Skipping {} ({:?})", file.path.display(), reason);
                    summary.skipped += 1;
                }
                Prepared::Failed { file, error } => {
                    warn!("Failed to index {}: {}", file.path.display(), error);
                    summary.failed += 1;
                }
            }

            processed += 1;
            self.publish(IndexingProgress::new(total, processed));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Indexing worker ended abnormally: {}", e);
            }
        }

        info!(
            "Indexing finished: {} indexed, {} skipped, {} failed",
            summary.files_processed, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    /// Index (or re-index) a single file
    pub async fn index_file(&self, path: &Path) -> Result<IndexSummary> {
        self.index(&[path.to_path_buf()]).await
    }

    /// Drop a path from the store. A path with no record of its own is
    /// treated as a directory and everything indexed under it is dropped.
    /// Returns whether anything was removed.
    pub async fn remove(&self, path: &Path) -> Result<bool> {
        let store = Arc::clone(&self.store);
        let key = path.to_string_lossy().into_owned();
        let (exact, nested) = run_blocking(move || match store.delete_by_path(&key)? {
            Some(id) => Ok((Some(id), Vec::new())),
            None => Ok((None, store.delete_under(&key)?)),
        })
        .await?;

        if let Some(id) = exact {
            info!("Removed {} (file {}) from the index", path.display(), id);
        }
        if !nested.is_empty() {
            info!("Removed {} file(s) under {} from the index", nested.len(), path.display());
        }
        Ok(exact.is_some() || !nested.is_empty())
    }

    /// Delete records whose files no longer exist. Returns how many were removed.
    pub async fn reconcile(&self) -> Result<usize> {
        let store = Arc::clone(&self.store);
        let removed = run_blocking(move || {
            let mut removed: usize = 0;
            for file in store.all_files()? {
                if !Path::new(&file.path).exists() && store.delete_file(file.id)? {
                    debug!("Pruned missing file {}", file.path);
                    removed += 1;
                }
            }
            Ok(removed)
        })
        .await?;

        if removed > 0 {
            info!("Reconciled index: removed {} missing file(s)", removed);
        }
        Ok(removed)
    }

    async fn persist(&self, file: &DiscoveredFile, vector: Vec<f32>) -> Result<u64> {
        let store = Arc::clone(&self.store);
        let meta = FileMeta::from_path(&file.path, file.size);
        let (id, vector) = run_blocking(move || {
            let record = store.upsert_file(&meta)?;
            store.replace_embedding(record.id, &vector)?;
            Ok((record.id, vector))
        })
        .await?;

        self.embedder.add_file(id, &vector).await?;
        Ok(id)
    }

    fn publish(&self, progress: IndexingProgress) {
        // No subscribers is fine
        let _ = self.progress.send(progress);
    }
}

async fn prepare(
    file: DiscoveredFile,
    extractors: &Arc<ExtractorRegistry>,
    embedder: &dyn EmbeddingService,
) -> Prepared {
    let registry = Arc::clone(extractors);
    let path = file.path.clone();
    let extracted = tokio::task::spawn_blocking(move || registry.extract(&path))
        .await
        .unwrap_or_else(|e| Err(ExtractError::Corrupt(format!("extractor panicked: {}", e))));

    let text = match extracted {
        Ok(Some(text)) => text,
        Ok(None) => {
            return Prepared::Skipped {
                file,
                reason: SkipReason::Unsupported,
            }
        }
        Err(e) => {
            return Prepared::Failed {
                file,
                error: e.into(),
            }
        }
    };

    if text.trim().is_empty() {
        return Prepared::Skipped {
            file,
            reason: SkipReason::Empty,
        };
    }

    match embedder.embed(&text).await {
        Ok(vector) => Prepared::Ready { file, vector },
        Err(e) => Prepared::Failed {
            file,
            error: e.into(),
        },
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Persistence(format!("store task failed: {}", e)))?
}


