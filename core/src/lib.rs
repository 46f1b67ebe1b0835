pub mod cache;
pub mod coherence;
pub mod config;
pub mod error;
pub mod index;
pub mod jobs;
pub mod manager;
pub mod scorer;
pub mod search;
pub mod stats;
pub mod store;
pub mod tokenizer;

/// Store-assigned document identifier.
pub type DocId = i64;

pub use coherence::Coherence;
pub use error::{CacheError, IndexError, QueueError, StoreError};
pub use index::{InvertedIndex, Posting};
pub use manager::{IndexManager, RebuildMode, Snapshot};
pub use search::{SearchHit, SearchResponse};
pub use stats::Statistics;
pub use store::{Document, DocumentStore, NewDocument, StoredDocument};
