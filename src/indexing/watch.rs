use crate::core::error::{Error, Result};
use crate::indexing::indexer::ContentIndexer;
use notify_debouncer_full::{
    new_debouncer,
    notify::{RecursiveMode, Watcher},
    DebounceEventResult, DebouncedEvent,
};
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default quiet period before a burst of events is handled
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Paths touched by one debounced batch
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub to_index: Vec<PathBuf>,
    pub to_remove: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_index.is_empty() && self.to_remove.is_empty()
    }
}

/// Split a batch into paths that still exist (re-index) and paths that are
/// gone (remove). Each path appears at most once.
pub fn collect_changes(events: &[DebouncedEvent]) -> ChangeSet {
    let mut seen = HashSet::new();
    let mut changes = ChangeSet::default();

    for event in events {
        for path in &event.paths {
            if !seen.insert(path.clone()) {
                continue;
            }
            if path.exists() {
                changes.to_index.push(path.clone());
            } else {
                changes.to_remove.push(path.clone());
            }
        }
    }

    changes
}

/// Keeps the index in step with the file system under a set of roots.
pub struct FileWatcher {
    indexer: Arc<ContentIndexer>,
    roots: Vec<PathBuf>,
    debounce: Duration,
}

impl FileWatcher {
    pub fn new(indexer: Arc<ContentIndexer>, roots: Vec<PathBuf>, debounce: Duration) -> Self {
        Self {
            indexer,
            roots,
            debounce,
        }
    }

    /// Watch until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(self.debounce, None, move |result: DebounceEventResult| {
            let _ = tx.send(result);
        })
        .map_err(|e| Error::Watch(format!("Failed to create file watcher: {}", e)))?;

        for root in &self.roots {
            debouncer
                .watcher()
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| {
                    Error::Watch(format!("Failed to watch {}: {}", root.display(), e))
                })?;
            info!("Watching {}", root.display());
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                message = rx.recv() => match message {
                    Some(Ok(events)) => {
                        self.apply(collect_changes(&events)).await;
                    }
                    Some(Err(errors)) => {
                        for e in errors {
                            warn!("Watcher error: {}", e);
                        }
                    }
                    None => break,
                },
            }
        }

        info!("Stopped watching");
        Ok(())
    }

    /// Push one batch of changes into the indexer. Failures are logged.
    pub async fn apply(&self, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        debug!(
            "Applying {} change(s), {} removal(s)",
            changes.to_index.len(),
            changes.to_remove.len()
        );

        for path in &changes.to_remove {
            if let Err(e) = self.indexer.remove(path).await {
                warn!("Failed to remove {} from the index: {}", path.display(), e);
            }
        }

        if !changes.to_index.is_empty() {
            if let Err(e) = self.indexer.index(&changes.to_index).await {
                warn!("Failed to re-index changed files: {}", e);
            }
        }
    }
}


