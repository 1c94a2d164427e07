use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Embedding service error: {0}")]
    Embedding(#[from] EmbedError),

    #[error("OS query error: {0}")]
    OsQuery(String),

    #[error("Watcher error: {0}")]
    Watch(String),
}

/// Failures while turning a file into text.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("corrupt or unreadable content: {0}")]
    Corrupt(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to the embedding service.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for EmbedError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            EmbedError::InvalidResponse(e.to_string())
        } else {
            EmbedError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Persistence(format!("serialization failed: {}", e))
    }
}

macro_rules! persistence_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(e: $ty) -> Self {
                    Error::Persistence(e.to_string())
                }
            }
        )*
    };
}

persistence_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

pub type Result<T> = std::result::Result<T, Error>;


