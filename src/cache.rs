use moka::sync::Cache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[derive(Clone, Debug)]
pub struct CachedFile {
    pub bytes: Arc<[u8]>,
    pub modified: Option<SystemTime>,
}

/// Bounded in-memory cache of file contents, weighed by size in bytes.
#[derive(Clone)]
pub struct FileCache {
    cache: Cache<PathBuf, CachedFile>,
}

impl FileCache {
    pub fn new(max_bytes: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .weigher(|_path: &PathBuf, file: &CachedFile| {
                u32::try_from(file.bytes.len()).unwrap_or(u32::MAX)
            })
            .max_capacity(max_bytes)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    /// Cached bytes for `path`, if they were read at the same `modified` time.
    pub fn get(&self, path: &Path, modified: Option<SystemTime>) -> Option<Arc<[u8]>> {
        let file = self.cache.get(path)?;
        if file.modified == modified {
            Some(file.bytes)
        } else {
            self.cache.invalidate(path);
            None
        }
    }

    pub fn insert(&self, path: PathBuf, file: CachedFile) {
        self.cache.insert(path, file);
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for FileCache {
    fn default() -> Self {
        // 64 MiB, five minutes
        Self::new(64 * 1024 * 1024, Duration::from_secs(300))
    }
}
