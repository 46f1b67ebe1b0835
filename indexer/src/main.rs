use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use search_core::cache::FsCache;
use search_core::config::{DataPaths, DATA_DIR_ENV, DEFAULT_DATA_DIR};
use search_core::jobs::{drain, Job, JobQueue, SpoolQueue};
use search_core::store::DirStore;
use search_core::{DocumentStore, IndexManager, NewDocument, RebuildMode, StoreError};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Rebuild worker and maintenance tool for the TF-IDF search index", long_about = None)]
struct Cli {
    /// Data directory shared with the server
    #[arg(long, env = DATA_DIR_ENV, default_value = DEFAULT_DATA_DIR, global = true)]
    data_dir: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume queued rebuild jobs
    Work {
        /// Drain the queue once and exit
        #[arg(long, default_value_t = false)]
        once: bool,
        /// Delay between queue polls in milliseconds
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
    /// Rebuild statistics and index from the store, refreshing the cache
    Rebuild,
    /// Compare the cached document count with the store
    Check,
    /// Load articles from JSON/JSONL files into the store and queue a rebuild
    Import {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
    },
}

struct Backends {
    store: Arc<DirStore>,
    queue: SpoolQueue,
    manager: IndexManager,
}

fn open(data_dir: &str) -> Result<Backends> {
    let paths = DataPaths::new(data_dir);
    let store = Arc::new(DirStore::open(paths.store_dir())?);
    let cache = Arc::new(FsCache::open(paths.cache_dir())?);
    let queue = SpoolQueue::open(paths.queue_dir())?;
    let manager = IndexManager::new(store.clone(), cache);
    Ok(Backends { store, queue, manager })
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let backends = open(&cli.data_dir)?;

    match cli.command {
        Commands::Work { once, poll_ms } => work(&backends, once, Duration::from_millis(poll_ms)),
        Commands::Rebuild => {
            let snapshot = backends.manager.rebuild(RebuildMode::Force)?;
            tracing::info!(num_docs = snapshot.total_documents(), num_terms = snapshot.index().num_terms(), "rebuild complete");
            Ok(())
        }
        Commands::Check => {
            let verdict = backends.manager.check_coherence();
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(())
        }
        Commands::Import { input } => import(&backends, &input),
    }
}

fn work(backends: &Backends, once: bool, poll: Duration) -> Result<()> {
    let recovered = backends.queue.recover()?;
    if recovered > 0 {
        tracing::warn!(recovered, "re-queued jobs abandoned by a previous worker");
    }
    loop {
        match drain(&backends.queue, &backends.manager) {
            Ok(0) => {}
            Ok(jobs) => tracing::info!(jobs, "queue drained"),
            Err(e) if once => return Err(e.into()),
            Err(e) => tracing::error!(error = %e, "rebuild failed, jobs dropped"),
        }
        if once {
            return Ok(());
        }
        std::thread::sleep(poll);
    }
}

fn import(backends: &Backends, input: &str) -> Result<()> {
    let input_path = Path::new(input);
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        bail!("input path {input} does not exist");
    }

    let mut docs: Vec<NewDocument> = Vec::new();
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut docs)?;
        } else {
            read_json(&file, &mut docs)?;
        }
    }

    let (mut inserted, mut skipped) = (0usize, 0usize);
    for doc in docs {
        if doc.content.as_deref().map_or(true, str::is_empty) {
            skipped += 1;
            continue;
        }
        match backends.store.insert(doc) {
            Ok(_) => inserted += 1,
            Err(StoreError::DuplicateUrl(url)) => {
                tracing::debug!(%url, "already stored");
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    tracing::info!(inserted, skipped, total = backends.store.count()?, "import finished");

    if inserted > 0 {
        let handle = backends.queue.submit(Job::RebuildIndex)?;
        tracing::info!(job_id = %handle.id, "queued index rebuild");
    }
    Ok(())
}

fn read_jsonl(file: &Path, docs: &mut Vec<NewDocument>) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        docs.push(serde_json::from_str(&line)?);
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<NewDocument>) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                docs.push(serde_json::from_value(v)?);
            }
        }
        serde_json::Value::Object(_) => docs.push(serde_json::from_value(json)?),
        _ => {}
    }
    Ok(())
}
