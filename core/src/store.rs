use crate::error::StoreError;
use crate::DocId;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use walkdir::WalkDir;

/// The slice of a stored article the indexing core reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub content: String,
}

/// A full article record as the store keeps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocId,
    pub title: String,
    pub url: String,
    pub content: Option<String>,
    pub retrieved_at: String,
}

/// An article submitted for admission; the store assigns the id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub retrieved_at: Option<String>,
}

impl StoredDocument {
    /// Only articles with content take part in indexing.
    pub fn indexable(&self) -> Option<Document> {
        self.content.as_ref().map(|content| Document {
            id: self.id,
            title: self.title.clone(),
            content: content.clone(),
        })
    }
}

/// Authoritative document storage.
pub trait DocumentStore: Send + Sync {
    /// Every document that has content, ordered by id.
    fn fetch_all(&self) -> Result<Vec<Document>, StoreError>;
    /// Documents for the given ids; unknown ids are skipped.
    fn fetch_by_ids(&self, ids: &[DocId]) -> Result<Vec<StoredDocument>, StoreError>;
    /// Number of documents `fetch_all` would return.
    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.fetch_all()?.len() as u64)
    }
    fn insert(&self, doc: NewDocument) -> Result<StoredDocument, StoreError>;
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

const NEXT_ID_FILE: &str = "next_id";

/// One JSON file per document under a directory, named by zero-padded id.
///
/// New records are written to a temporary file and hard-linked into place, so
/// readers in other processes never see a half-written record and two writers
/// can never claim the same id. Ids come from a persisted high-water mark and
/// are never handed out twice, even after the newest record is deleted.
pub struct DirStore {
    root: PathBuf,
    insert_lock: Mutex<()>,
}

impl DirStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self { root: root.as_ref().to_path_buf(), insert_lock: Mutex::new(()) })
    }

    fn record_path(&self, id: DocId) -> PathBuf { self.root.join(format!("{id:012}.json")) }
    fn counter_path(&self) -> PathBuf { self.root.join(NEXT_ID_FILE) }

    /// Lowest id never yet assigned; 1 for a fresh store.
    fn next_id(&self) -> Result<DocId, StoreError> {
        match fs::read_to_string(self.counter_path()) {
            Ok(s) => Ok(s.trim().parse().unwrap_or(1)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(1),
            Err(e) => Err(e.into()),
        }
    }

    fn set_next_id(&self, id: DocId) -> Result<(), StoreError> {
        let tmp = self.root.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp, id.to_string())?;
        fs::rename(&tmp, self.counter_path())?;
        Ok(())
    }

    fn read_record(path: &Path) -> Result<StoredDocument, StoreError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn read_all(&self) -> Result<Vec<StoredDocument>, StoreError> {
        let mut records = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            let p = entry.path();
            if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("json") {
                records.push(Self::read_record(p)?);
            }
        }
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}

impl DocumentStore for DirStore {
    fn fetch_all(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.read_all()?.iter().filter_map(StoredDocument::indexable).collect())
    }

    fn fetch_by_ids(&self, ids: &[DocId]) -> Result<Vec<StoredDocument>, StoreError> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            match Self::read_record(&self.record_path(id)) {
                Ok(record) => out.push(record),
                Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    fn insert(&self, doc: NewDocument) -> Result<StoredDocument, StoreError> {
        let _guard = self.insert_lock.lock();
        let existing = self.read_all()?;
        if existing.iter().any(|r| r.url == doc.url) {
            return Err(StoreError::DuplicateUrl(doc.url));
        }
        let high_water = existing.last().map_or(1, |r| r.id + 1);
        let mut record = StoredDocument {
            id: self.next_id()?.max(high_water),
            title: doc.title,
            url: doc.url,
            content: doc.content,
            retrieved_at: doc.retrieved_at.unwrap_or_else(now_rfc3339),
        };

        let tmp = self.root.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        loop {
            {
                let mut f = File::create(&tmp)?;
                f.write_all(&serde_json::to_vec_pretty(&record)?)?;
                f.sync_all()?;
            }
            match fs::hard_link(&tmp, self.record_path(record.id)) {
                Ok(()) => break,
                // another process took this id first
                Err(e) if e.kind() == ErrorKind::AlreadyExists => record.id += 1,
                Err(e) => {
                    let _ = fs::remove_file(&tmp);
                    return Err(e.into());
                }
            }
        }
        fs::remove_file(&tmp)?;
        self.set_next_id(record.id + 1)?;
        tracing::debug!(doc_id = record.id, url = %record.url, "stored document");
        Ok(record)
    }
}

/// In-process store, used by tests and single-process setups.
pub struct MemoryStore {
    records: RwLock<BTreeMap<DocId, StoredDocument>>,
    next_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self { records: RwLock::new(BTreeMap::new()), next_id: AtomicI64::new(1) }
    }
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Seed the store with documents under their own ids.
    pub fn from_documents<I: IntoIterator<Item = Document>>(docs: I) -> Self {
        let records: BTreeMap<DocId, StoredDocument> = docs
            .into_iter()
            .map(|d| {
                let record = StoredDocument {
                    id: d.id,
                    title: d.title,
                    url: format!("memory://{}", d.id),
                    content: Some(d.content),
                    retrieved_at: now_rfc3339(),
                };
                (record.id, record)
            })
            .collect();
        let next_id = records.keys().next_back().map_or(1, |id| id + 1);
        Self { records: RwLock::new(records), next_id: AtomicI64::new(next_id) }
    }

    pub fn remove(&self, id: DocId) -> Option<StoredDocument> { self.records.write().remove(&id) }

    /// Replace a document's content in place, keeping the count unchanged.
    pub fn set_content(&self, id: DocId, content: &str) -> bool {
        match self.records.write().get_mut(&id) {
            Some(record) => {
                record.content = Some(content.to_string());
                true
            }
            None => false,
        }
    }
}

impl DocumentStore for MemoryStore {
    fn fetch_all(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.records.read().values().filter_map(StoredDocument::indexable).collect())
    }

    fn fetch_by_ids(&self, ids: &[DocId]) -> Result<Vec<StoredDocument>, StoreError> {
        let records = self.records.read();
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    fn insert(&self, doc: NewDocument) -> Result<StoredDocument, StoreError> {
        let mut records = self.records.write();
        if records.values().any(|r| r.url == doc.url) {
            return Err(StoreError::DuplicateUrl(doc.url));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = StoredDocument {
            id,
            title: doc.title,
            url: doc.url,
            content: doc.content,
            retrieved_at: doc.retrieved_at.unwrap_or_else(now_rfc3339),
        };
        records.insert(id, record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn article(title: &str, url: &str, content: Option<&str>) -> NewDocument {
        NewDocument {
            title: title.into(),
            url: url.into(),
            content: content.map(str::to_string),
            retrieved_at: None,
        }
    }

    #[test]
    fn dir_store_assigns_increasing_ids() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        let a = store.insert(article("A", "https://a", Some("alpha"))).unwrap();
        let b = store.insert(article("B", "https://b", Some("beta"))).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert!(!a.retrieved_at.is_empty());

        // a second handle on the same directory sees the same records
        let reopened = DirStore::open(dir.path()).unwrap();
        let all = reopened.fetch_all().unwrap();
        assert_eq!(all.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(reopened.count().unwrap(), 2);
    }

    #[test]
    fn dir_store_never_reuses_ids() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        store.insert(article("A", "https://a", Some("alpha"))).unwrap();
        let b = store.insert(article("B", "https://b", Some("beta"))).unwrap();
        fs::remove_file(dir.path().join(format!("{:012}.json", b.id))).unwrap();

        // a new handle must not fall back to max-existing + 1
        let reopened = DirStore::open(dir.path()).unwrap();
        let c = reopened.insert(article("C", "https://c", Some("gamma"))).unwrap();
        assert_eq!(c.id, 3);
        assert!(reopened.fetch_by_ids(&[2]).unwrap().is_empty());
    }

    #[test]
    fn dir_store_rejects_duplicate_urls() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        store.insert(article("A", "https://a", Some("alpha"))).unwrap();
        let err = store.insert(article("A again", "https://a", Some("alpha"))).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUrl(url) if url == "https://a"));
    }

    #[test]
    fn documents_without_content_are_not_indexable() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        store.insert(article("Empty", "https://e", None)).unwrap();
        store.insert(article("Full", "https://f", Some("text"))).unwrap();
        assert_eq!(store.fetch_all().unwrap().len(), 1);
        assert_eq!(store.count().unwrap(), 1);
        // but both can still be looked up by id
        assert_eq!(store.fetch_by_ids(&[1, 2, 99]).unwrap().len(), 2);
    }

    #[test]
    fn memory_store_never_reuses_ids() {
        let store = MemoryStore::from_documents([
            Document { id: 1, title: "One".into(), content: "first".into() },
            Document { id: 2, title: "Two".into(), content: "second".into() },
        ]);
        store.remove(2);
        let next = store.insert(article("Three", "https://three", Some("third"))).unwrap();
        assert_eq!(next.id, 3);
        assert!(store.fetch_by_ids(&[2]).unwrap().is_empty());
    }

    #[test]
    fn memory_store_matches_dir_store_semantics() {
        let store = MemoryStore::new();
        let a = store.insert(article("A", "https://a", Some("alpha"))).unwrap();
        assert_eq!(a.id, 1);
        assert!(store.insert(article("A", "https://a", None)).is_err());
        assert!(store.set_content(1, "gamma"));
        assert_eq!(store.fetch_all().unwrap()[0].content, "gamma");
        assert!(store.remove(1).is_some());
        assert_eq!(store.count().unwrap(), 0);
    }
}
