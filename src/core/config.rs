use super::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default address of the embedding service
pub const DEFAULT_EMBEDDING_URL: &str = "http://127.0.0.1:8000";

const CONFIG_FILE: &str = "config.json";

/// Configuration for kita
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for kita data
    pub base_dir: PathBuf,
    /// Path to the metadata/embedding store
    pub database_path: PathBuf,
    /// Base URL of the embedding service
    pub embedding_url: String,
    /// Per-request timeout for the embedding service
    pub embedding_timeout: Duration,
    /// How long an application snapshot stays fresh
    pub app_cache_ttl: Duration,
    /// Directories scanned for installed application bundles
    pub application_dirs: Vec<PathBuf>,
    /// Concurrent extraction/embedding pipelines while indexing
    pub index_workers: usize,
    /// Number of neighbours requested from the semantic index
    pub semantic_k: usize,
    /// Upper bound on each search source
    pub source_timeout: Duration,
}

/// Optional overrides read from `config.json` in the base directory.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileOverrides {
    embedding_url: Option<String>,
    embedding_timeout_ms: Option<u64>,
    app_cache_ttl_ms: Option<u64>,
    application_dirs: Option<Vec<PathBuf>>,
    index_workers: Option<usize>,
    semantic_k: Option<usize>,
    source_timeout_ms: Option<u64>,
}

impl Config {
    /// Get the default configuration directory
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
            .map(|home| home.join(".kita"))
    }

    /// Create a new configuration with default settings
    pub fn new(base_dir: Option<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.unwrap_or_else(|| {
            Self::default_base_dir().unwrap_or_else(|_| PathBuf::from(".kita"))
        });

        Ok(Self {
            database_path: base_dir.join("database").join("kita.redb"),
            embedding_url: DEFAULT_EMBEDDING_URL.to_string(),
            embedding_timeout: Duration::from_secs(30),
            app_cache_ttl: Duration::from_secs(5),
            application_dirs: default_application_dirs(),
            index_workers: 4,
            semantic_k: 10,
            source_timeout: Duration::from_secs(2),
            base_dir,
        })
    }

    /// Create a configuration and apply `config.json` from the base directory if present
    pub fn load(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::new(base_dir)?;
        let path = config.base_dir.join(CONFIG_FILE);
        if path.exists() {
            config.apply_file(&path)?;
        }
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)?;
        let overrides: FileOverrides = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("Invalid {}: {}", path.display(), e)))?;

        if let Some(url) = overrides.embedding_url {
            self.embedding_url = url.trim_end_matches('/').to_string();
        }
        if let Some(ms) = overrides.embedding_timeout_ms {
            self.embedding_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.app_cache_ttl_ms {
            self.app_cache_ttl = Duration::from_millis(ms);
        }
        if let Some(app_dirs) = overrides.application_dirs {
            self.application_dirs = app_dirs;
        }
        if let Some(workers) = overrides.index_workers {
            if workers == 0 {
                return Err(Error::Config("index_workers must be at least 1".to_string()));
            }
            self.index_workers = workers;
        }
        if let Some(k) = overrides.semantic_k {
            self.semantic_k = k;
        }
        if let Some(ms) = overrides.source_timeout_ms {
            self.source_timeout = Duration::from_millis(ms);
        }
        Ok(())
    }

    /// Initialize the configuration directories
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Check if the configuration is already initialized
    pub fn is_initialized(&self) -> bool {
        self.base_dir.exists()
            && self
                .database_path
                .parent()
                .map(|p| p.exists())
                .unwrap_or(false)
    }
}

fn default_application_dirs() -> Vec<PathBuf> {
    let mut app_dirs = vec![
        PathBuf::from("/Applications"),
        PathBuf::from("/System/Applications"),
    ];
    if let Some(home) = dirs::home_dir() {
        app_dirs.push(home.join("Applications"));
    }
    app_dirs
}


