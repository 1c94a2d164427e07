use super::records::{advance_timestamp, Category, EmbeddingRecord, FileMeta, FileRecord, RecentRecord};
use crate::core::error::{Error, Result};
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, MAIN_SEPARATOR};

/// id -> FileRecord (JSON)
const FILES_TABLE: TableDefinition<u64, &str> = TableDefinition::new("files");
/// path -> id; the unique index that enforces one record per path
const FILE_PATHS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("file_paths");
/// file id -> EmbeddingRecord (JSON)
const EMBEDDINGS_TABLE: TableDefinition<u64, &str> = TableDefinition::new("embeddings");
/// path -> RecentRecord (JSON)
const RECENTS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("recents");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_FILE_ID_KEY: &str = "next_file_id";

/// Embedded store for file metadata, embeddings and recently opened paths.
///
/// Every public write runs in a single redb write transaction, so each call is
/// all-or-nothing and concurrent writers are serialized by the database.
/// Readers get consistent snapshots and never observe a half-written upsert.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open or create the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path).map_err(|e| {
            let msg = e.to_string();
            if msg.to_lowercase().contains("lock") {
                Error::Persistence(
                    "Database is locked. Another kita process may be running.".to_string(),
                )
            } else {
                Error::Persistence(format!("Failed to open database: {}", e))
            }
        })?;

        // Create all tables up front so read transactions never miss one
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(FILES_TABLE)?;
            write_txn.open_table(FILE_PATHS_TABLE)?;
            write_txn.open_table(EMBEDDINGS_TABLE)?;
            write_txn.open_table(RECENTS_TABLE)?;
            write_txn.open_table(META_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert a new record for `meta.path`, or update the existing one in place
    pub fn upsert_file(&self, meta: &FileMeta) -> Result<FileRecord> {
        let now = Utc::now();
        let category = Category::from_extension(&meta.extension);

        let write_txn = self.db.begin_write()?;
        let record = {
            let mut paths = write_txn.open_table(FILE_PATHS_TABLE)?;
            let mut files = write_txn.open_table(FILES_TABLE)?;

            let existing_id = paths.get(meta.path.as_str())?.map(|guard| guard.value());
            let existing = match existing_id {
                Some(id) => files.get(id)?.map(|guard| guard.value().to_string()),
                None => None,
            };

            let record = match (existing_id, existing) {
                (Some(_), Some(json)) => {
                    let mut record: FileRecord = serde_json::from_str(&json)?;
                    record.name = meta.name.clone();
                    record.extension = meta.extension.clone();
                    record.category = category;
                    record.size = meta.size;
                    record.updated_at = advance_timestamp(record.updated_at, now);
                    record
                }
                (id, _) => {
                    let id = match id {
                        Some(id) => id,
                        None => {
                            let mut meta_table = write_txn.open_table(META_TABLE)?;
                            let id = meta_table
                                .get(NEXT_FILE_ID_KEY)?
                                .map(|guard| guard.value())
                                .unwrap_or(1);
                            meta_table.insert(NEXT_FILE_ID_KEY, id + 1)?;
                            paths.insert(meta.path.as_str(), id)?;
                            id
                        }
                    };
                    FileRecord {
                        id,
                        path: meta.path.clone(),
                        name: meta.name.clone(),
                        extension: meta.extension.clone(),
                        category,
                        size: meta.size,
                        created_at: now,
                        updated_at: now,
                    }
                }
            };

            let json = serde_json::to_string(&record)?;
            files.insert(record.id, json.as_str())?;
            record
        };
        write_txn.commit()?;

        Ok(record)
    }

    /// Replace the embedding owned by `file_id`, keeping its original `created_at`
    pub fn replace_embedding(&self, file_id: u64, vector: &[f32]) -> Result<EmbeddingRecord> {
        let now = Utc::now();

        let write_txn = self.db.begin_write()?;
        let record = {
            let files = write_txn.open_table(FILES_TABLE)?;
            if files.get(file_id)?.is_none() {
                return Err(Error::Persistence(format!(
                    "Cannot store embedding: no file with id {}",
                    file_id
                )));
            }

            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
            let previous = embeddings
                .get(file_id)?
                .map(|guard| guard.value().to_string());

            let record = match previous {
                Some(json) => {
                    let previous: EmbeddingRecord = serde_json::from_str(&json)?;
                    EmbeddingRecord {
                        file_id,
                        vector: vector.to_vec(),
                        created_at: previous.created_at,
                        updated_at: advance_timestamp(previous.updated_at, now),
                    }
                }
                None => EmbeddingRecord {
                    file_id,
                    vector: vector.to_vec(),
                    created_at: now,
                    updated_at: now,
                },
            };

            let json = serde_json::to_string(&record)?;
            embeddings.insert(file_id, json.as_str())?;
            record
        };
        write_txn.commit()?;

        Ok(record)
    }

    /// Get a file record by id
    pub fn get_file(&self, id: u64) -> Result<Option<FileRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FILES_TABLE)?;

        let json = table.get(id)?.map(|guard| guard.value().to_string());
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Get a file record by its unique path
    pub fn get_file_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        let read_txn = self.db.begin_read()?;
        let paths = read_txn.open_table(FILE_PATHS_TABLE)?;
        let files = read_txn.open_table(FILES_TABLE)?;

        let id = paths.get(path)?.map(|guard| guard.value());
        let json = match id {
            Some(id) => files.get(id)?.map(|guard| guard.value().to_string()),
            None => None,
        };
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Get the embedding owned by a file
    pub fn get_embedding(&self, file_id: u64) -> Result<Option<EmbeddingRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EMBEDDINGS_TABLE)?;

        let json = table.get(file_id)?.map(|guard| guard.value().to_string());
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Case-insensitive substring match against name or path, in id order
    pub fn search_files(&self, query: &str, limit: usize) -> Result<Vec<FileRecord>> {
        let needle = query.to_lowercase();
        let mut matches = Vec::new();
        if limit == 0 {
            return Ok(matches);
        }

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FILES_TABLE)?;
        for item in table.iter()? {
            let (_id, value) = item?;
            let record: FileRecord = serde_json::from_str(value.value())?;
            if record.name.to_lowercase().contains(&needle)
                || record.path.to_lowercase().contains(&needle)
            {
                matches.push(record);
                if matches.len() >= limit {
                    break;
                }
            }
        }

        Ok(matches)
    }

    /// Most recently updated files first
    pub fn recent_files(&self, limit: usize) -> Result<Vec<FileRecord>> {
        let mut records = self.all_files()?;
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        records.truncate(limit);
        Ok(records)
    }

    /// Every file record, in id order
    pub fn all_files(&self) -> Result<Vec<FileRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FILES_TABLE)?;

        let mut records = Vec::new();
        for item in table.iter()? {
            let (_id, value) = item?;
            records.push(serde_json::from_str(value.value())?);
        }
        Ok(records)
    }

    /// Delete a file record and, with it, its embedding
    pub fn delete_file(&self, id: u64) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut files = write_txn.open_table(FILES_TABLE)?;
            let mut paths = write_txn.open_table(FILE_PATHS_TABLE)?;
            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;

            let json = files.remove(id)?.map(|guard| guard.value().to_string());
            match json {
                Some(json) => {
                    let record: FileRecord = serde_json::from_str(&json)?;
                    paths.remove(record.path.as_str())?;
                    embeddings.remove(id)?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;

        Ok(removed)
    }

    /// Delete the record for `path`, returning its id if one existed
    pub fn delete_by_path(&self, path: &str) -> Result<Option<u64>> {
        let id = {
            let read_txn = self.db.begin_read()?;
            let paths = read_txn.open_table(FILE_PATHS_TABLE)?;
            let id = paths.get(path)?.map(|guard| guard.value());
            id
        };

        match id {
            Some(id) => {
                self.delete_file(id)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Delete every record whose path lies under directory `dir`, returning
    /// the removed ids. Runs in one write transaction.
    pub fn delete_under(&self, dir: &str) -> Result<Vec<u64>> {
        let mut prefix = dir.trim_end_matches(MAIN_SEPARATOR).to_string();
        prefix.push(MAIN_SEPARATOR);

        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut files = write_txn.open_table(FILES_TABLE)?;
            let mut paths = write_txn.open_table(FILE_PATHS_TABLE)?;
            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;

            // Paths are ordered, so everything under the prefix is contiguous
            let mut matched = Vec::new();
            for item in paths.range(prefix.as_str()..)? {
                let (path, id) = item?;
                if !path.value().starts_with(&prefix) {
                    break;
                }
                matched.push((path.value().to_string(), id.value()));
            }

            for (path, id) in &matched {
                paths.remove(path.as_str())?;
                files.remove(*id)?;
                embeddings.remove(*id)?;
            }
            matched.into_iter().map(|(_, id)| id).collect::<Vec<_>>()
        };
        write_txn.commit()?;

        Ok(removed)
    }

    pub fn file_count(&self) -> Result<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FILES_TABLE)?;
        Ok(table.len()?)
    }

    pub fn embedding_count(&self) -> Result<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EMBEDDINGS_TABLE)?;
        Ok(table.len()?)
    }

    /// Remember that `path` was opened from the results list
    pub fn record_open(&self, path: &str) -> Result<RecentRecord> {
        let now = Utc::now();

        let write_txn = self.db.begin_write()?;
        let record = {
            let mut table = write_txn.open_table(RECENTS_TABLE)?;
            let previous = table.get(path)?.map(|guard| guard.value().to_string());
            let last_clicked = match previous {
                Some(json) => {
                    let previous: RecentRecord = serde_json::from_str(&json)?;
                    advance_timestamp(previous.last_clicked, now)
                }
                None => now,
            };

            let record = RecentRecord {
                path: path.to_string(),
                last_clicked,
            };
            let json = serde_json::to_string(&record)?;
            table.insert(path, json.as_str())?;
            record
        };
        write_txn.commit()?;

        Ok(record)
    }

    /// Recently opened paths, newest first
    pub fn recents(&self, limit: usize) -> Result<Vec<RecentRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECENTS_TABLE)?;

        let mut records: Vec<RecentRecord> = Vec::new();
        for item in table.iter()? {
            let (_path, value) = item?;
            records.push(serde_json::from_str(value.value())?);
        }
        records.sort_by(|a, b| b.last_clicked.cmp(&a.last_clicked));
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn open_store() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(&temp_dir.path().join("db").join("kita.redb")).unwrap();
        (store, temp_dir)
    }

    fn meta(path: &str, size: u64) -> FileMeta {
        FileMeta::from_path(&PathBuf::from(path), size)
    }

    #[test]
    fn test_upsert_inserts_then_updates_in_place() {
        let (store, _temp_dir) = open_store();

        let first = store.upsert_file(&meta("/notes/a.txt", 10)).unwrap();
        let second = store.upsert_file(&meta("/notes/a.txt", 20)).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.size, 20);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(store.file_count().unwrap(), 1);
    }

    #[test]
    fn test_ids_are_distinct_per_path() {
        let (store, _temp_dir) = open_store();

        let a = store.upsert_file(&meta("/notes/a.txt", 1)).unwrap();
        let b = store.upsert_file(&meta("/notes/b.txt", 1)).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.category, Category::Documents);
    }

    #[test]
    fn test_replace_embedding_keeps_single_row() {
        let (store, _temp_dir) = open_store();
        let file = store.upsert_file(&meta("/notes/a.txt", 1)).unwrap();

        let first = store.replace_embedding(file.id, &[0.1, 0.2]).unwrap();
        let second = store.replace_embedding(file.id, &[0.3, 0.4]).unwrap();

        assert_eq!(store.embedding_count().unwrap(), 1);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        let stored = store.get_embedding(file.id).unwrap().unwrap();
        assert_eq!(stored.vector, vec![0.3, 0.4]);
    }

    #[test]
    fn test_replace_embedding_requires_file() {
        let (store, _temp_dir) = open_store();
        let result = store.replace_embedding(42, &[1.0]);
        assert!(matches!(result, Err(Error::Persistence(_))));
    }

    #[test]
    fn test_search_files_matches_name_or_path_case_insensitively() {
        let (store, _temp_dir) = open_store();
        store.upsert_file(&meta("/work/Report.pdf", 1)).unwrap();
        store.upsert_file(&meta("/home/notes.txt", 1)).unwrap();

        let by_name = store.search_files("report", 50).unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "Report.pdf");

        let by_path = store.search_files("/home", 50).unwrap();
        assert_eq!(by_path.len(), 1);
        assert_eq!(by_path[0].name, "notes.txt");

        assert!(store.search_files("absent", 50).unwrap().is_empty());
    }

    #[test]
    fn test_search_files_respects_limit() {
        let (store, _temp_dir) = open_store();
        for i in 0..5 {
            store.upsert_file(&meta(&format!("/data/file{}.txt", i), 1)).unwrap();
        }
        let results = store.search_files("file", 3).unwrap();
        assert_eq!(results.len(), 3);
        // id order
        assert!(results.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_delete_cascades_to_embedding() {
        let (store, _temp_dir) = open_store();
        let file = store.upsert_file(&meta("/notes/a.txt", 1)).unwrap();
        store.replace_embedding(file.id, &[1.0]).unwrap();

        assert_eq!(store.delete_by_path("/notes/a.txt").unwrap(), Some(file.id));
        assert!(store.get_file(file.id).unwrap().is_none());
        assert!(store.get_embedding(file.id).unwrap().is_none());
        assert!(store.get_file_by_path("/notes/a.txt").unwrap().is_none());
        assert_eq!(store.delete_by_path("/notes/a.txt").unwrap(), None);
    }

    #[test]
    fn test_delete_under_removes_subtree_only() {
        let (store, _temp_dir) = open_store();
        let inner = store.upsert_file(&meta("/notes/sub/a.txt", 1)).unwrap();
        store.replace_embedding(inner.id, &[1.0, 2.0]).unwrap();
        store.upsert_file(&meta("/notes/sub/deep/b.txt", 1)).unwrap();
        let sibling = store.upsert_file(&meta("/notes/sub-other.txt", 1)).unwrap();
        let outside = store.upsert_file(&meta("/notes/c.txt", 1)).unwrap();

        let mut removed = store.delete_under("/notes/sub").unwrap();
        removed.sort();
        assert_eq!(removed.len(), 2);
        assert!(removed.contains(&inner.id));
        assert!(store.get_embedding(inner.id).unwrap().is_none());
        assert!(store.get_file_by_path("/notes/sub/deep/b.txt").unwrap().is_none());

        assert!(store.get_file(sibling.id).unwrap().is_some());
        assert!(store.get_file(outside.id).unwrap().is_some());
        assert!(store.delete_under("/notes/sub/").unwrap().is_empty());
    }

    #[test]
    fn test_reinsert_after_delete_gets_new_id() {
        let (store, _temp_dir) = open_store();
        let first = store.upsert_file(&meta("/notes/a.txt", 1)).unwrap();
        store.delete_file(first.id).unwrap();
        let second = store.upsert_file(&meta("/notes/a.txt", 1)).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_recent_files_newest_first() {
        let (store, _temp_dir) = open_store();
        store.upsert_file(&meta("/a.txt", 1)).unwrap();
        store.upsert_file(&meta("/b.txt", 1)).unwrap();
        store.upsert_file(&meta("/a.txt", 2)).unwrap();

        let recent = store.recent_files(10).unwrap();
        assert_eq!(recent[0].path, "/a.txt");
        assert_eq!(recent[1].path, "/b.txt");
    }

    #[test]
    fn test_recents_upsert_by_path() {
        let (store, _temp_dir) = open_store();
        store.record_open("/a.txt").unwrap();
        store.record_open("/b.txt").unwrap();
        store.record_open("/a.txt").unwrap();

        let recents = store.recents(10).unwrap();
        assert_eq!(recents.len(), 2);
        assert_eq!(recents[0].path, "/a.txt");
    }

    #[test]
    fn test_reopen_preserves_data() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kita.redb");
        {
            let store = Store::open(&path).unwrap();
            store.upsert_file(&meta("/a.txt", 1)).unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert!(store.get_file_by_path("/a.txt").unwrap().is_some());
        let next = store.upsert_file(&meta("/b.txt", 1)).unwrap();
        assert_eq!(next.id, 2);
    }
}
