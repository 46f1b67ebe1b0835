//! Shared key-value cache holding the last built statistics and index.
//!
//! The serving process and the indexer worker meet here: the worker writes a
//! rebuilt snapshot, and the server's coherence check compares the cached
//! document count against the store.
//!
//! Keys are read one at a time. A reader that may have overlapped a writer
//! compares the document count before and after its reads and discards what it
//! read on a mismatch. Two rebuilds that record the same count cannot be told
//! apart this way, so a mix of their keys can still be read.

use crate::error::CacheError;
use crate::index::InvertedIndex;
use crate::stats::Statistics;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const TOTAL_DOCUMENTS: &str = "total_documents";
pub const DOCUMENT_FREQUENCIES: &str = "document_frequencies";
pub const IDF_SCORES: &str = "idf_scores";
pub const INVERTED_INDEX: &str = "inverted_index";

/// Byte-level key-value store.
pub trait KvCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError>;
    fn exists(&self, key: &str) -> Result<bool, CacheError>;
}

/// One file per key in a directory. Writes go through a temporary file and a
/// rename, so a reader sees either the old value or the new one.
pub struct FsCache {
    root: PathBuf,
}

impl FsCache {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, CacheError> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self { root: root.as_ref().to_path_buf() })
    }

    fn path(&self, key: &str) -> Result<PathBuf, CacheError> {
        let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.bin")))
    }
}

impl KvCache for FsCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(self.path(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let path = self.path(key)?;
        let tmp = self.root.join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4()));
        {
            let mut f = File::create(&tmp)?;
            f.write_all(value)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.path(key)?.is_file())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self { Self::default() }
    pub fn remove(&self, key: &str) -> Option<Vec<u8>> { self.entries.write().remove(key) }
}

impl KvCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entries.read().get(key).cloned())
    }
    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }
    fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.read().contains_key(key))
    }
}

/// Read a non-empty value; every failure mode collapses into `None`.
fn read_present(cache: &dyn KvCache, key: &str) -> Option<Vec<u8>> {
    match cache.get(key) {
        Ok(Some(bytes)) if !bytes.is_empty() => Some(bytes),
        Ok(_) => {
            tracing::debug!(key, "cache miss");
            None
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "cache read failed");
            None
        }
    }
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Option<T> {
    match bincode::deserialize(bytes) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding undecodable cache entry");
            None
        }
    }
}

/// Document count recorded by the last completed rebuild.
pub fn cached_document_count(cache: &dyn KvCache) -> Option<u64> {
    let bytes = read_present(cache, TOTAL_DOCUMENTS)?;
    let parsed = std::str::from_utf8(&bytes).ok().and_then(|s| s.trim().parse().ok());
    if parsed.is_none() {
        tracing::warn!(key = TOTAL_DOCUMENTS, "discarding undecodable cache entry");
    }
    parsed
}

/// Cached statistics, only if all four snapshot keys are present and non-empty.
pub fn load_statistics(cache: &dyn KvCache) -> Option<Statistics> {
    let total = cached_document_count(cache)?;
    let df_bytes = read_present(cache, DOCUMENT_FREQUENCIES)?;
    let idf_bytes = read_present(cache, IDF_SCORES)?;
    read_present(cache, INVERTED_INDEX)?;
    let df: HashMap<String, u64> = decode(DOCUMENT_FREQUENCIES, &df_bytes)?;
    let idf: HashMap<String, f64> = decode(IDF_SCORES, &idf_bytes)?;
    let stats = Statistics::from_parts(total, df, idf);
    if let Some(s) = &stats {
        tracing::info!(num_docs = s.total_documents(), num_terms = s.num_terms(), "loaded statistics from cache");
    }
    stats
}

/// Cached index, if present and non-empty.
pub fn load_inverted_index(cache: &dyn KvCache) -> Option<InvertedIndex> {
    let bytes = read_present(cache, INVERTED_INDEX)?;
    let index: InvertedIndex = decode(INVERTED_INDEX, &bytes)?;
    if index.is_empty() {
        return None;
    }
    tracing::info!(num_terms = index.num_terms(), "loaded inverted index from cache");
    Some(index)
}

pub fn save_inverted_index(cache: &dyn KvCache, index: &InvertedIndex) -> Result<(), CacheError> {
    cache.set(INVERTED_INDEX, &bincode::serialize(index)?)
}

/// Writes the document count last: once it is visible, the rest of the
/// snapshot it describes already is.
pub fn save_statistics(cache: &dyn KvCache, stats: &Statistics) -> Result<(), CacheError> {
    cache.set(DOCUMENT_FREQUENCIES, &bincode::serialize(stats.document_frequencies())?)?;
    cache.set(IDF_SCORES, &bincode::serialize(stats.idf())?)?;
    cache.set(TOTAL_DOCUMENTS, stats.total_documents().to_string().as_bytes())
}
