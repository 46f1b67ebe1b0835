//! Asynchronous rebuild jobs.
//!
//! Admitting a document enqueues a rebuild and returns without waiting. A
//! worker (normally the `indexer work` process) runs the rebuild against the
//! shared store and cache. The serving process is not notified; it picks the
//! result up at its next coherence check. Until then the new document is not
//! searchable.

use crate::error::QueueError;
use crate::manager::{IndexManager, RebuildMode};
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Work a queue can carry. Rebuilding is idempotent, so a job delivered more
/// than once is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    RebuildIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
}

pub trait JobQueue: Send + Sync {
    fn submit(&self, job: Job) -> Result<JobHandle, QueueError>;
}

/// Run one job against the worker-side manager.
pub fn execute(job: Job, manager: &IndexManager) -> Result<(), QueueError> {
    match job {
        Job::RebuildIndex => manager
            .rebuild(RebuildMode::Force)
            .map(|_| ())
            .map_err(|e| QueueError::Execution(e.to_string())),
    }
}

/// Fires a rebuild job after a document has been admitted to the store.
#[derive(Clone)]
pub struct ReindexTrigger {
    queue: Arc<dyn JobQueue>,
}

impl ReindexTrigger {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self { Self { queue } }

    /// Fire-and-forget: a failure to enqueue is logged, never returned to
    /// the caller that admitted the document.
    pub fn document_admitted(&self, doc_id: DocId) -> Option<JobHandle> {
        match self.queue.submit(Job::RebuildIndex) {
            Ok(handle) => {
                tracing::info!(doc_id, job_id = %handle.id, "queued index rebuild");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(doc_id, error = %e, "could not queue index rebuild");
                None
            }
        }
    }
}

/// Executes each job synchronously on submit, against its own manager.
/// Stands in for a real queue in tests and single-process setups.
pub struct InlineQueue {
    worker: Arc<IndexManager>,
}

impl InlineQueue {
    pub fn new(worker: Arc<IndexManager>) -> Self { Self { worker } }
}

impl JobQueue for InlineQueue {
    fn submit(&self, job: Job) -> Result<JobHandle, QueueError> {
        let handle = JobHandle { id: uuid::Uuid::new_v4().to_string() };
        execute(job, &self.worker)?;
        Ok(handle)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct QueuedJob {
    id: String,
    job: Job,
    enqueued_at: String,
}

/// A job taken off the spool, to be acked once handled.
#[derive(Debug)]
pub struct ClaimedJob {
    pub handle: JobHandle,
    pub job: Job,
    path: PathBuf,
}

/// Directory-backed queue shared between processes.
///
/// Pending jobs are `<id>.json`; a worker claims one by renaming it to
/// `<id>.claimed`, so at most one worker holds it. Acking deletes the file.
/// Claims left behind by a crashed worker are returned to pending by
/// [`SpoolQueue::recover`], which makes delivery at-least-once.
pub struct SpoolQueue {
    dir: PathBuf,
}

const PENDING: &str = "json";
const CLAIMED: &str = "claimed";

impl SpoolQueue {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, QueueError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self { dir: dir.as_ref().to_path_buf() })
    }

    fn files_with(&self, ext: &str) -> Result<Vec<PathBuf>, QueueError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| QueueError::Io(e.into()))?;
            let p = entry.path();
            if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some(ext) {
                files.push(p.to_path_buf());
            }
        }
        Ok(files)
    }

    pub fn pending(&self) -> Result<usize, QueueError> { Ok(self.files_with(PENDING)?.len()) }

    /// Claim every pending job.
    pub fn claim_pending(&self) -> Result<Vec<ClaimedJob>, QueueError> {
        let mut claimed = Vec::new();
        for path in self.files_with(PENDING)? {
            let target = path.with_extension(CLAIMED);
            match fs::rename(&path, &target) {
                Ok(()) => {}
                // claimed by another worker in the meantime
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
            let record: QueuedJob = serde_json::from_slice(&fs::read(&target)?)?;
            claimed.push(ClaimedJob { handle: JobHandle { id: record.id }, job: record.job, path: target });
        }
        Ok(claimed)
    }

    pub fn ack(&self, job: ClaimedJob) -> Result<(), QueueError> {
        fs::remove_file(&job.path)?;
        Ok(())
    }

    /// Return every claimed job to pending. Call before a worker starts.
    pub fn recover(&self) -> Result<usize, QueueError> {
        let claimed = self.files_with(CLAIMED)?;
        for path in &claimed {
            fs::rename(path, path.with_extension(PENDING))?;
        }
        Ok(claimed.len())
    }
}

impl JobQueue for SpoolQueue {
    fn submit(&self, job: Job) -> Result<JobHandle, QueueError> {
        let enqueued = time::OffsetDateTime::now_utc();
        // time-prefixed names keep the spool in submission order
        let id = format!("{}-{}", enqueued.unix_timestamp_nanos(), uuid::Uuid::new_v4().simple());
        let record = QueuedJob {
            id: id.clone(),
            job,
            enqueued_at: enqueued
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
        };
        let tmp = self.dir.join(format!(".{id}.tmp"));
        {
            let mut f = File::create(&tmp)?;
            f.write_all(&serde_json::to_vec(&record)?)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, self.dir.join(format!("{id}.{PENDING}")))?;
        Ok(JobHandle { id })
    }
}

/// One worker pass: claim everything pending, run a single rebuild for all
/// of it, then ack. Returns the number of jobs consumed.
///
/// Jobs are acked whether or not the rebuild succeeds; a failed rebuild is
/// reported to the caller and not retried. Only claims abandoned by a dead
/// worker go back to pending, through [`SpoolQueue::recover`].
pub fn drain(queue: &SpoolQueue, manager: &IndexManager) -> Result<usize, QueueError> {
    let claimed = queue.claim_pending()?;
    if claimed.is_empty() {
        return Ok(0);
    }
    // every job kind is a full rebuild, so one run covers the whole batch
    let job = claimed[0].job;
    tracing::info!(jobs = claimed.len(), ?job, "running queued jobs");
    if let Err(e) = execute(job, manager) {
        tracing::warn!(jobs = claimed.len(), error = %e, "rebuild failed, dropping jobs");
        for c in claimed {
            queue.ack(c)?;
        }
        return Err(e);
    }
    let n = claimed.len();
    for c in claimed {
        tracing::debug!(job_id = %c.handle.id, "acked job");
        queue.ack(c)?;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::store::{DirStore, Document, DocumentStore, MemoryStore, NewDocument};
    use tempfile::tempdir;

    struct BrokenQueue;

    impl JobQueue for BrokenQueue {
        fn submit(&self, _job: Job) -> Result<JobHandle, QueueError> {
            Err(QueueError::Io(std::io::Error::other("broker unreachable")))
        }
    }

    fn worker() -> IndexManager {
        let store = MemoryStore::from_documents([Document { id: 1, title: "Moths".into(), content: "dusk flyers".into() }]);
        IndexManager::new(Arc::new(store), Arc::new(MemoryCache::new()))
    }

    #[test]
    fn job_wire_format() {
        assert_eq!(serde_json::to_string(&Job::RebuildIndex).unwrap(), r#"{"type":"rebuild_index"}"#);
    }

    #[test]
    fn trigger_swallows_queue_failures() {
        let trigger = ReindexTrigger::new(Arc::new(BrokenQueue));
        assert!(trigger.document_admitted(4).is_none());
    }

    #[test]
    fn spool_claim_ack_cycle() {
        let dir = tempdir().unwrap();
        let queue = SpoolQueue::open(dir.path()).unwrap();
        let a = queue.submit(Job::RebuildIndex).unwrap();
        let b = queue.submit(Job::RebuildIndex).unwrap();
        assert_ne!(a, b);
        assert_eq!(queue.pending().unwrap(), 2);

        let claimed = queue.claim_pending().unwrap();
        assert_eq!(claimed.len(), 2);
        assert_eq!(queue.pending().unwrap(), 0);
        assert!(queue.claim_pending().unwrap().is_empty());

        let mut claimed = claimed.into_iter();
        queue.ack(claimed.next().unwrap()).unwrap();
        // the unacked claim comes back only through recovery
        assert_eq!(queue.recover().unwrap(), 1);
        assert_eq!(queue.pending().unwrap(), 1);
    }

    #[test]
    fn recover_returns_abandoned_claims() {
        let dir = tempdir().unwrap();
        let queue = SpoolQueue::open(dir.path()).unwrap();
        queue.submit(Job::RebuildIndex).unwrap();
        let claimed = queue.claim_pending().unwrap();
        drop(claimed); // worker died holding the claim
        assert_eq!(queue.pending().unwrap(), 0);
        assert_eq!(queue.recover().unwrap(), 1);
        assert_eq!(queue.pending().unwrap(), 1);
    }

    #[test]
    fn drain_runs_one_rebuild_for_many_jobs() {
        let dir = tempdir().unwrap();
        let queue = SpoolQueue::open(dir.path()).unwrap();
        for _ in 0..3 {
            queue.submit(Job::RebuildIndex).unwrap();
        }
        let w = worker();
        assert_eq!(drain(&queue, &w).unwrap(), 3);
        assert_eq!(w.current().generation(), 1);
        assert_eq!(queue.pending().unwrap(), 0);
        assert_eq!(drain(&queue, &w).unwrap(), 0);
    }

    #[test]
    fn failed_drain_drops_jobs() {
        let dir = tempdir().unwrap();
        let queue = SpoolQueue::open(dir.path()).unwrap();
        queue.submit(Job::RebuildIndex).unwrap();
        let empty = IndexManager::new(Arc::new(MemoryStore::new()), Arc::new(MemoryCache::new()));
        assert!(matches!(drain(&queue, &empty), Err(QueueError::Execution(_))));
        assert_eq!(queue.pending().unwrap(), 0);
        // nothing left to spin on
        assert_eq!(drain(&queue, &empty).unwrap(), 0);
        assert_eq!(queue.recover().unwrap(), 0);
    }

    #[test]
    fn contentless_admission_on_empty_store_does_not_loop() {
        let dir = tempdir().unwrap();
        let store = Arc::new(DirStore::open(dir.path().join("documents")).unwrap());
        let queue = Arc::new(SpoolQueue::open(dir.path().join("jobs")).unwrap());
        let worker = IndexManager::new(store.clone(), Arc::new(MemoryCache::new()));
        let stored = store
            .insert(NewDocument { title: "Stub".into(), url: "https://stub".into(), content: None, retrieved_at: None })
            .unwrap();
        ReindexTrigger::new(queue.clone()).document_admitted(stored.id).unwrap();

        assert!(drain(&queue, &worker).is_err());
        for _ in 0..3 {
            assert_eq!(drain(&queue, &worker).unwrap(), 0);
        }
        assert_eq!(queue.pending().unwrap(), 0);
    }
}
