mod common;

use common::{temp_store, FakeEmbedder};
use kita::{ContentIndexer, ExtractorRegistry, IndexingProgress, Result};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn indexer(store: Arc<kita::Store>, embedder: Arc<FakeEmbedder>, workers: usize) -> ContentIndexer {
    ContentIndexer::new(store, Arc::new(ExtractorRegistry::with_defaults()), embedder)
        .with_workers(workers)
}

#[tokio::test]
async fn test_index_single_text_file() -> Result<()> {
    let (_db_dir, store) = temp_store();
    let embedder = Arc::new(FakeEmbedder::default());
    let indexer = indexer(Arc::clone(&store), Arc::clone(&embedder), 4);

    let notes_dir = TempDir::new().unwrap();
    fs::write(notes_dir.path().join("notes.txt"), "hello world")?;

    let summary = indexer.index(&[notes_dir.path().to_path_buf()]).await?;
    assert!(summary.success);
    assert_eq!(summary.files_processed, 1);

    let path = notes_dir.path().join("notes.txt");
    let record = store
        .get_file_by_path(&path.to_string_lossy())?
        .expect("notes.txt should be indexed");
    assert_eq!(record.name, "notes.txt");
    assert_eq!(record.extension, ".txt");
    assert_eq!(record.size, 11);

    let embedding = store
        .get_embedding(record.id)?
        .expect("notes.txt should have an embedding");
    assert_eq!(embedding.vector, vec![11.0, 1.0, 0.0]);
    assert_eq!(*embedder.embedded.lock().unwrap(), vec!["hello world".to_string()]);
    assert_eq!(
        *embedder.added.lock().unwrap(),
        vec![(record.id, vec![11.0, 1.0, 0.0])]
    );

    Ok(())
}

#[tokio::test]
async fn test_empty_file_is_skipped_but_counted_in_progress() -> Result<()> {
    let (_db_dir, store) = temp_store();
    let embedder = Arc::new(FakeEmbedder::default());
    let indexer = indexer(Arc::clone(&store), Arc::clone(&embedder), 2);
    let mut progress = indexer.subscribe();

    let notes_dir = TempDir::new().unwrap();
    fs::write(notes_dir.path().join("empty.txt"), "   \n")?;

    let summary = indexer.index(&[notes_dir.path().to_path_buf()]).await?;
    assert!(summary.success);
    assert_eq!(summary.files_processed, 0);
    assert_eq!(summary.skipped, 1);

    assert_eq!(embedder.embed_count(), 0);
    assert_eq!(store.file_count()?, 0);
    assert_eq!(progress.recv().await.unwrap(), IndexingProgress::new(1, 1));

    Ok(())
}

#[tokio::test]
async fn test_partial_failure_keeps_going() -> Result<()> {
    let (_db_dir, store) = temp_store();
    let embedder = Arc::new(FakeEmbedder::default());
    let indexer = indexer(Arc::clone(&store), Arc::clone(&embedder), 4);

    let notes_dir = TempDir::new().unwrap();
    fs::write(notes_dir.path().join("a.txt"), "first")?;
    fs::write(notes_dir.path().join("b.md"), "# second")?;
    fs::write(notes_dir.path().join("c.xyz"), "unsupported")?;

    let summary = indexer.index(&[notes_dir.path().to_path_buf()]).await?;
    assert!(summary.success);
    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(store.file_count()?, 2);

    Ok(())
}

#[tokio::test]
async fn test_embedding_failure_counts_as_failed() -> Result<()> {
    let (_db_dir, store) = temp_store();
    let embedder = Arc::new(FakeEmbedder::default());
    *embedder.reject_marker.lock().unwrap() = Some("poison".to_string());
    let indexer = indexer(Arc::clone(&store), Arc::clone(&embedder), 1);

    let notes_dir = TempDir::new().unwrap();
    fs::write(notes_dir.path().join("good.txt"), "fine text")?;
    fs::write(notes_dir.path().join("bad.txt"), "poison text")?;

    let summary = indexer.index(&[notes_dir.path().to_path_buf()]).await?;
    assert!(summary.success);
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.failed, 1);

    let bad = notes_dir.path().join("bad.txt");
    assert!(store.get_file_by_path(&bad.to_string_lossy())?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_reindexing_is_idempotent() -> Result<()> {
    let (_db_dir, store) = temp_store();
    let embedder = Arc::new(FakeEmbedder::default());
    let indexer = indexer(Arc::clone(&store), Arc::clone(&embedder), 4);

    let notes_dir = TempDir::new().unwrap();
    let path = notes_dir.path().join("notes.txt");
    fs::write(&path, "hello world")?;

    indexer.index_file(&path).await?;
    let first = store.get_file_by_path(&path.to_string_lossy())?.unwrap();

    fs::write(&path, "hello again, world")?;
    indexer.index_file(&path).await?;
    let second = store.get_file_by_path(&path.to_string_lossy())?.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.created_at, second.created_at);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(second.size, 18);
    assert_eq!(store.file_count()?, 1);
    assert_eq!(store.embedding_count()?, 1);

    let embedding = store.get_embedding(first.id)?.unwrap();
    assert_eq!(embedding.vector[0], 18.0);

    Ok(())
}

#[tokio::test]
async fn test_progress_is_monotonic() -> Result<()> {
    let (_db_dir, store) = temp_store();
    let embedder = Arc::new(FakeEmbedder::default());
    let indexer = indexer(store, embedder, 3);
    let mut progress = indexer.subscribe();

    let notes_dir = TempDir::new().unwrap();
    for i in 0..10 {
        fs::write(notes_dir.path().join(format!("note{}.txt", i)), format!("note {}", i))?;
    }

    let summary = indexer.index(&[notes_dir.path().to_path_buf()]).await?;
    assert_eq!(summary.files_processed, 10);

    let mut seen = Vec::new();
    while let Ok(update) = progress.try_recv() {
        assert_eq!(update.total, 10);
        seen.push(update.processed);
    }
    assert_eq!(seen, (1..=10).collect::<Vec<_>>());

    Ok(())
}

#[tokio::test]
async fn test_missing_root_and_empty_roots() -> Result<()> {
    let (_db_dir, store) = temp_store();
    let embedder = Arc::new(FakeEmbedder::default());
    let indexer = indexer(store, embedder, 2);

    let summary = indexer.index(&[]).await?;
    assert!(summary.success);
    assert_eq!(summary.files_processed, 0);

    let missing = TempDir::new().unwrap().path().join("gone");
    let summary = indexer.index(&[missing]).await?;
    assert!(summary.success);
    assert_eq!(summary.files_processed, 0);

    Ok(())
}

#[tokio::test]
async fn test_nested_directories_and_hidden_files() -> Result<()> {
    let (_db_dir, store) = temp_store();
    let embedder = Arc::new(FakeEmbedder::default());
    let indexer = indexer(Arc::clone(&store), embedder, 2);

    let root = TempDir::new().unwrap();
    let nested = root.path().join("a").join("b");
    fs::create_dir_all(&nested)?;
    fs::write(nested.join("deep.txt"), "deep")?;
    fs::write(root.path().join(".hidden.md"), "hidden note")?;

    let summary = indexer.index(&[root.path().to_path_buf()]).await?;
    assert_eq!(summary.files_processed, 2);
    assert_eq!(store.file_count()?, 2);

    Ok(())
}

#[tokio::test]
async fn test_reconcile_prunes_missing_files() -> Result<()> {
    let (_db_dir, store) = temp_store();
    let embedder = Arc::new(FakeEmbedder::default());
    let indexer = indexer(Arc::clone(&store), embedder, 2);

    let notes_dir = TempDir::new().unwrap();
    let kept = notes_dir.path().join("kept.txt");
    let deleted = notes_dir.path().join("deleted.txt");
    fs::write(&kept, "kept")?;
    fs::write(&deleted, "deleted")?;
    indexer.index(&[notes_dir.path().to_path_buf()]).await?;

    fs::remove_file(&deleted)?;
    assert_eq!(indexer.reconcile().await?, 1);
    assert_eq!(indexer.reconcile().await?, 0);

    assert!(store.get_file_by_path(&kept.to_string_lossy())?.is_some());
    assert!(store.get_file_by_path(&deleted.to_string_lossy())?.is_none());
    assert_eq!(store.embedding_count()?, 1);

    Ok(())
}

#[tokio::test]
async fn test_remove_path() -> Result<()> {
    let (_db_dir, store) = temp_store();
    let embedder = Arc::new(FakeEmbedder::default());
    let indexer = indexer(Arc::clone(&store), embedder, 1);

    let notes_dir = TempDir::new().unwrap();
    let path = notes_dir.path().join("notes.txt");
    fs::write(&path, "hello world")?;
    indexer.index_file(&path).await?;

    assert!(indexer.remove(&path).await?);
    assert!(!indexer.remove(&path).await?);
    assert_eq!(store.file_count()?, 0);
    assert_eq!(store.embedding_count()?, 0);

    Ok(())
}
