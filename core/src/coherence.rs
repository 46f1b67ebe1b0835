use crate::cache::{cached_document_count, KvCache};
use crate::store::DocumentStore;
use serde::Serialize;

/// Verdict of comparing the cached document count against the store.
///
/// Only the count is compared. Editing a document in place leaves the count
/// unchanged, so such edits are not detected here and stay invisible to
/// search until an unconditional rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Coherence {
    /// Cache and store agree on the number of documents.
    Fresh { documents: u64 },
    /// Counts differ, or the cache has never recorded one.
    Stale { cached: Option<u64>, actual: u64 },
    /// The store count could not be read.
    Unknown { cached: Option<u64> },
}

impl Coherence {
    pub fn requires_rebuild(&self) -> bool { matches!(self, Coherence::Stale { .. }) }
}

pub fn check_coherence(cache: &dyn KvCache, store: &dyn DocumentStore) -> Coherence {
    let cached = cached_document_count(cache);
    let actual = match store.count() {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "could not count documents for coherence check");
            return Coherence::Unknown { cached };
        }
    };
    let verdict = match cached {
        Some(c) if c == actual => Coherence::Fresh { documents: actual },
        _ => Coherence::Stale { cached, actual },
    };
    tracing::info!(?verdict, "coherence check");
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, TOTAL_DOCUMENTS};
    use crate::store::{Document, MemoryStore};

    fn store_with(n: i64) -> MemoryStore {
        MemoryStore::from_documents((1..=n).map(|id| Document {
            id,
            title: format!("Doc {id}"),
            content: "body".into(),
        }))
    }

    #[test]
    fn missing_count_is_stale() {
        let verdict = check_coherence(&MemoryCache::new(), &store_with(2));
        assert_eq!(verdict, Coherence::Stale { cached: None, actual: 2 });
        assert!(verdict.requires_rebuild());
    }

    #[test]
    fn matching_count_is_fresh() {
        let cache = MemoryCache::new();
        cache.set(TOTAL_DOCUMENTS, b"3").unwrap();
        let verdict = check_coherence(&cache, &store_with(3));
        assert_eq!(verdict, Coherence::Fresh { documents: 3 });
        assert!(!verdict.requires_rebuild());
    }

    #[test]
    fn differing_count_is_stale() {
        let cache = MemoryCache::new();
        cache.set(TOTAL_DOCUMENTS, b"3").unwrap();
        assert_eq!(check_coherence(&cache, &store_with(4)), Coherence::Stale { cached: Some(3), actual: 4 });
    }
}
