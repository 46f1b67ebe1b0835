//! Owner of the snapshot served to queries.
//!
//! Readers take the current snapshot with a lock-free load. A rebuild works
//! on private data and publishes with a single pointer swap, so a query sees
//! either the old snapshot or the new one, never a mix. Rebuilds are
//! serialized; a failed rebuild leaves the published snapshot untouched.

use crate::cache::{self, KvCache};
use crate::coherence::{check_coherence, Coherence};
use crate::error::{IndexError, Result};
use crate::index::InvertedIndex;
use crate::search::{self, SearchResponse};
use crate::stats::Statistics;
use crate::store::{Document, DocumentStore};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Statistics and index from the same build, published as one unit.
#[derive(Debug, Default)]
pub struct Snapshot {
    generation: u64,
    statistics: Option<Statistics>,
    index: InvertedIndex,
}

impl Snapshot {
    /// What is served before the first successful rebuild.
    pub fn empty() -> Self { Self::default() }

    /// Number of snapshots published before this one.
    pub fn generation(&self) -> u64 { self.generation }
    pub fn statistics(&self) -> Option<&Statistics> { self.statistics.as_ref() }
    pub fn index(&self) -> &InvertedIndex { &self.index }
    pub fn total_documents(&self) -> u64 { self.statistics.as_ref().map_or(0, Statistics::total_documents) }
    pub fn is_empty(&self) -> bool { self.statistics.is_none() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildMode {
    /// Take statistics and index from the cache when they are there.
    ReuseCache,
    /// Rescan the store and overwrite the cache.
    Force,
}

/// Outcome of a coherence check and the rebuild it led to.
#[derive(Debug, Clone)]
pub struct Refresh {
    pub coherence: Coherence,
    pub mode: RebuildMode,
    pub snapshot: Arc<Snapshot>,
}

pub struct IndexManager {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn KvCache>,
    snapshot: ArcSwap<Snapshot>,
    rebuild_lock: Mutex<()>,
}

impl IndexManager {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<dyn KvCache>) -> Self {
        Self {
            store,
            cache,
            snapshot: ArcSwap::from_pointee(Snapshot::empty()),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> { &self.store }
    pub fn cache(&self) -> &Arc<dyn KvCache> { &self.cache }

    /// The snapshot queries should run against.
    pub fn current(&self) -> Arc<Snapshot> { self.snapshot.load_full() }

    pub fn check_coherence(&self) -> Coherence { check_coherence(self.cache.as_ref(), self.store.as_ref()) }

    /// Coherence check followed by the rebuild it calls for: forced when the
    /// cache is stale, cache-reusing otherwise. Run at startup and whenever
    /// the serving process should pick up a rebuild done by a worker.
    pub fn refresh(&self) -> Result<Refresh> {
        let coherence = self.check_coherence();
        let mode = if coherence.requires_rebuild() { RebuildMode::Force } else { RebuildMode::ReuseCache };
        let snapshot = self.rebuild(mode)?;
        Ok(Refresh { coherence, mode, snapshot })
    }

    /// Build statistics, then the index, then publish both.
    pub fn rebuild(&self, mode: RebuildMode) -> Result<Arc<Snapshot>> {
        let _guard = self.rebuild_lock.lock();
        match self.build(mode) {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.snapshot.store(Arc::clone(&snapshot));
                tracing::info!(
                    generation = snapshot.generation,
                    num_docs = snapshot.total_documents(),
                    num_terms = snapshot.index.num_terms(),
                    ?mode,
                    "published snapshot"
                );
                Ok(snapshot)
            }
            Err(e) => {
                tracing::warn!(error = %e, ?mode, "rebuild aborted, keeping previous snapshot");
                Err(e)
            }
        }
    }

    fn fetch_documents(&self) -> Result<Vec<Document>> {
        let docs = self.store.fetch_all()?;
        if docs.is_empty() {
            return Err(IndexError::NoDocuments);
        }
        Ok(docs)
    }

    fn build(&self, mode: RebuildMode) -> Result<Snapshot> {
        let cache = self.cache.as_ref();
        let reuse = mode == RebuildMode::ReuseCache;

        let mut documents: Option<Vec<Document>> = None;
        let count_before = if reuse { cache::cached_document_count(cache) } else { None };
        let cached_stats = if reuse { cache::load_statistics(cache) } else { None };
        let fresh_stats = cached_stats.is_none();
        let statistics = match cached_stats {
            Some(s) => s,
            None => {
                let docs = self.fetch_documents()?;
                let s = Statistics::compute(&docs)?;
                documents = Some(docs);
                s
            }
        };

        // A cached index is taken as-is, without checking it against the
        // current document contents.
        let cached_index = if reuse { cache::load_inverted_index(cache) } else { None };
        let fresh_index = cached_index.is_none();
        let index = match cached_index {
            Some(i) => i,
            None => {
                let docs = match documents.take() {
                    Some(d) => d,
                    None => self.fetch_documents()?,
                };
                InvertedIndex::build(&statistics, &docs)
            }
        };

        if (!fresh_stats || !fresh_index) && cache::cached_document_count(cache) != count_before {
            tracing::warn!("cache changed while it was being read, rebuilding from the store");
            return self.build(RebuildMode::Force);
        }

        if fresh_index {
            if let Err(e) = cache::save_inverted_index(cache, &index) {
                tracing::warn!(error = %e, "could not cache inverted index");
            }
        }
        if fresh_stats {
            if let Err(e) = cache::save_statistics(cache, &statistics) {
                tracing::warn!(error = %e, "could not cache statistics");
            }
        }

        let generation = self.snapshot.load().generation + 1;
        Ok(Snapshot { generation, statistics: Some(statistics), index })
    }

    /// Run a query against the current snapshot.
    pub fn search(&self, query: &str, limit: usize) -> SearchResponse {
        search::search(&self.current(), self.store.as_ref(), query, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::store::MemoryStore;

    fn manager(docs: Vec<Document>) -> IndexManager {
        IndexManager::new(Arc::new(MemoryStore::from_documents(docs)), Arc::new(MemoryCache::new()))
    }

    #[test]
    fn starts_empty() {
        let m = manager(vec![]);
        assert!(m.current().is_empty());
        assert_eq!(m.current().total_documents(), 0);
    }

    #[test]
    fn rebuild_on_empty_store_keeps_snapshot() {
        let m = manager(vec![]);
        assert!(matches!(m.rebuild(RebuildMode::Force), Err(IndexError::NoDocuments)));
        assert!(m.current().is_empty());
        assert_eq!(m.current().generation(), 0);
    }

    #[test]
    fn generations_increase() {
        let m = manager(vec![Document { id: 1, title: "Owls".into(), content: "night birds".into() }]);
        assert_eq!(m.rebuild(RebuildMode::Force).unwrap().generation(), 1);
        assert_eq!(m.rebuild(RebuildMode::ReuseCache).unwrap().generation(), 2);
    }
}
