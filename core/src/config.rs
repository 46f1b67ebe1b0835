use std::path::{Path, PathBuf};

/// Environment variable the binaries read the data root from.
pub const DATA_DIR_ENV: &str = "SEARCH_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// On-disk layout shared by the server and the indexer worker. Both processes
/// must be pointed at the same root for the cache-based handshake to work.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn store_dir(&self) -> PathBuf { self.root.join("documents") }
    pub fn cache_dir(&self) -> PathBuf { self.root.join("cache") }
    pub fn queue_dir(&self) -> PathBuf { self.root.join("jobs") }
}
