use thiserror::Error;

/// Failures of the document store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("a document with url {0} already exists")]
    DuplicateUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the key-value cache adapter.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("invalid cache key: {0:?}")]
    InvalidKey(String),
}

/// Failures of the job queue adapter.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed job record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("job execution failed: {0}")]
    Execution(String),
}

/// Reasons a rebuild did not produce a new snapshot. In every case the
/// previously served snapshot stays in place.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("document store returned no documents")]
    NoDocuments,

    #[error("corpus vocabulary is empty after tokenization")]
    EmptyVocabulary,

    #[error("document store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, IndexError>;
