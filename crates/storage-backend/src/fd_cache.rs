use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::{BackendError, BackendResult};
use crate::retry::RetryPolicy;

struct Entry {
    file: Arc<File>,
    /// Monotonic tick at last access; the entry with the smallest tick is evicted.
    last_used: u64,
}

struct Inner {
    entries: HashMap<PathBuf, Entry>,
    capacity: usize,
    tick: u64,
}

/// Bounded LRU of open segment file descriptors, shared across writer threads.
///
/// The cache mutex is only ever held for bookkeeping (map lookup/insert,
/// eviction); the actual `open`/`close` syscalls and all reads/writes
/// happen outside the lock, matching the shared write_lock discipline
/// the segment layer uses for its own per-stream state.
pub struct FdCache {
    inner: Mutex<Inner>,
    retry: RetryPolicy,
}

impl FdCache {
    pub fn new(capacity: usize, retry: RetryPolicy) -> Self {
        assert!(capacity >= 1, "fd cache capacity must be at least 1");
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                capacity,
                tick: 0,
            }),
            retry,
        }
    }

    /// Returns the open file for `path`, opening (with retry) and
    /// inserting it on a miss. Eviction of the least-recently-used entry
    /// happens outside of any I/O, purely as a map operation.
    pub fn get(&self, path: &Path) -> BackendResult<Arc<File>> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.tick += 1;
            let tick = inner.tick;
            if let Some(entry) = inner.entries.get_mut(path) {
                entry.last_used = tick;
                return Ok(Arc::clone(&entry.file));
            }
        }

        // Miss: open outside the lock, then insert.
        let file = self.open_with_retry(path)?;
        let file = Arc::new(file);

        let mut inner = self.inner.lock().unwrap();
        // Another thread may have raced us to the open; prefer the one already cached.
        if let Some(entry) = inner.entries.get_mut(path) {
            entry.last_used = inner.tick;
            return Ok(Arc::clone(&entry.file));
        }
        if inner.entries.len() >= inner.capacity {
            if let Some(evict_path) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(p, _)| p.clone())
            {
                inner.entries.remove(&evict_path);
                debug!(path = %evict_path.display(), "evicting fd from cache");
            }
        }
        let tick = inner.tick;
        inner.entries.insert(
            path.to_path_buf(),
            Entry {
                file: Arc::clone(&file),
                last_used: tick,
            },
        );
        Ok(file)
    }

    /// Drops the cached entry for `path`, if any, without closing other entries.
    pub fn evict(&self, path: &Path) {
        self.inner.lock().unwrap().entries.remove(path);
    }

    fn open_with_retry(&self, path: &Path) -> BackendResult<File> {
        let mut last_attempt = 0;
        let result = self.retry.retry(|attempt| {
            last_attempt = attempt;
            // Not `.append(true)`: positional writes (pwrite) must honor the
            // caller-supplied offset, and O_APPEND forces writes to the
            // current end of file on Linux regardless of that offset.
            OpenOptions::new()
                .create(true)
                .write(true)
                .read(true)
                .open(path)
        });
        result.map_err(|source| {
            warn!(path = %path.display(), attempts = last_attempt, error = %source, "open exhausted retries");
            BackendError::OpenExhausted {
                path: path.to_path_buf(),
                attempts: last_attempt,
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1))
    }

    #[test]
    fn get_opens_and_reuses_same_fd() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seg.log");
        let cache = FdCache::new(4, policy());

        let f1 = cache.get(&path).unwrap();
        let f2 = cache.get(&path).unwrap();
        assert!(Arc::ptr_eq(&f1, &f2));
    }

    #[test]
    fn eviction_respects_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FdCache::new(2, policy());

        let p1 = dir.path().join("a.log");
        let p2 = dir.path().join("b.log");
        let p3 = dir.path().join("c.log");

        let _f1 = cache.get(&p1).unwrap();
        let _f2 = cache.get(&p2).unwrap();
        // Touch p1 again so p2 becomes the least-recently-used.
        let _f1_again = cache.get(&p1).unwrap();
        let _f3 = cache.get(&p3).unwrap();

        let inner = cache.inner.lock().unwrap();
        assert_eq!(inner.entries.len(), 2);
        assert!(!inner.entries.contains_key(&p2));
        assert!(inner.entries.contains_key(&p1));
        assert!(inner.entries.contains_key(&p3));
    }

    #[test]
    fn written_bytes_are_visible_through_cached_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seg.log");
        let cache = FdCache::new(4, policy());

        let file = cache.get(&path).unwrap();
        (&*file).write_all(b"hello").unwrap();
        drop(file);

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents, b"hello");
    }
}
