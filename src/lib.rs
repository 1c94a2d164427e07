// Core functionality
pub mod core {
    pub mod config;
    pub mod error;
    pub mod logging;
}

// Data storage
pub mod storage {
    pub mod records;
    pub mod store;
}

// Indexing pipeline
pub mod indexing {
    pub mod discovery;
    pub mod extract;
    pub mod indexer;
    pub mod watch;
}

// Search
pub mod search {
    pub mod embedding;
    pub mod orchestrator;
}

// Application launcher
pub mod apps {
    pub mod cache;
    pub mod platform;
}

// User interfaces
pub mod ui {
    pub mod cli;
}

// Re-export commonly used types
pub use apps::cache::{AppCache, AppRecord};
pub use apps::platform::{AppPlatform, InstalledApp, SystemPlatform};
pub use core::config::Config;
pub use core::error::{EmbedError, Error, ExtractError, Result};
pub use indexing::discovery::{discover_files, discover_roots};
pub use indexing::extract::{Extractor, ExtractorRegistry};
pub use indexing::indexer::{ContentIndexer, IndexSummary, IndexingProgress};
pub use indexing::watch::FileWatcher;
pub use search::embedding::{EmbeddingService, HttpEmbeddingClient, SemanticHit};
pub use search::orchestrator::{LiveSearch, SearchItem, SearchOrchestrator, SearchSection, SectionKind};
pub use storage::records::{Category, EmbeddingRecord, FileRecord, RecentRecord};
pub use storage::store::Store;
pub use ui::cli::Cli;
