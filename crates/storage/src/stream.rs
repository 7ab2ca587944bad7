use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use auditlog_storage_backend::{FdCache, RetryPolicy};
use tracing::{info, warn};

use crate::error::{StorageError, StorageResult};
use crate::segment::segment_filename;

pub struct StreamConfig {
    pub base_path: PathBuf,
    pub base_filename: String,
    pub destination: Option<String>,
    pub max_segment_size: u64,
}

/// Per-destination append-only log: a monotonic segment index, the byte
/// offset into the active segment, and a rotation gate.
///
/// `rotation_lock` is held in shared mode by every concurrent writer that
/// has reserved an offset (so `pwrite`s can run in parallel) and in
/// exclusive mode only while rotating to a fresh segment or flushing.
pub struct Stream {
    config: StreamConfig,
    rotation_lock: RwLock<()>,
    segment_index: AtomicU64,
    current_offset: AtomicU64,
    active_path: Mutex<Arc<PathBuf>>,
    fd_cache: Arc<FdCache>,
    retry: RetryPolicy,
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl Stream {
    pub fn new(config: StreamConfig, fd_cache: Arc<FdCache>, retry: RetryPolicy) -> Self {
        let initial_path = config.base_path.join(segment_filename(
            &config.base_filename,
            config.destination.as_deref(),
            now_unix_secs(),
            0,
        ));
        Self {
            config,
            rotation_lock: RwLock::new(()),
            segment_index: AtomicU64::new(0),
            current_offset: AtomicU64::new(0),
            active_path: Mutex::new(Arc::new(initial_path)),
            fd_cache,
            retry,
        }
    }

    pub fn segment_index(&self) -> u64 {
        self.segment_index.load(Ordering::Acquire)
    }

    fn active_path(&self) -> Arc<PathBuf> {
        Arc::clone(&self.active_path.lock().unwrap())
    }

    #[cfg(test)]
    pub(crate) fn active_path_for_test(&self) -> Arc<PathBuf> {
        self.active_path()
    }

    /// Reserves `len` bytes in the active segment, rotating first if the
    /// reservation would cross `max_segment_size`. A reservation is never
    /// denied for being individually larger than the segment budget — once
    /// rotation has run, the write proceeds into the fresh segment even if
    /// it alone exceeds the configured size.
    ///
    /// A reservation that turns out to be over budget is simply abandoned
    /// (the segment is rotated away from and that dangling offset range is
    /// never written to) rather than unwound — cheaper than a compensating
    /// `fetch_sub`, and harmless since the old segment's file length is
    /// only ever extended by bytes actually written.
    fn reserve(&self, len: u64) -> (Arc<PathBuf>, u64) {
        loop {
            let guard = self.rotation_lock.read().unwrap();
            let current = self.current_offset.load(Ordering::Acquire);
            if current != 0 && current + len > self.config.max_segment_size {
                drop(guard);
                self.rotate_if_needed(current);
                continue;
            }
            let reserved = self.current_offset.fetch_add(len, Ordering::AcqRel);
            return (self.active_path(), reserved);
        }
    }

    fn rotate_if_needed(&self, observed_offset: u64) {
        let _guard = self.rotation_lock.write().unwrap();
        let current = self.current_offset.load(Ordering::Acquire);
        if current < observed_offset {
            // Another thread already rotated while we waited for the exclusive lock.
            return;
        }
        let new_index = self.segment_index.fetch_add(1, Ordering::AcqRel) + 1;
        let new_path = self.config.base_path.join(segment_filename(
            &self.config.base_filename,
            self.config.destination.as_deref(),
            now_unix_secs(),
            new_index,
        ));
        let old_path = {
            let mut active = self.active_path.lock().unwrap();
            let old = Arc::clone(&active);
            *active = Arc::new(new_path.clone());
            old
        };
        // Fsync the outgoing segment before dropping its cached handle: once
        // evicted, nothing else will ever open and flush this path again, so
        // this is the only chance to make its writes durable before a crash.
        if let Ok(file) = self.fd_cache.get(&old_path) {
            if let Err(e) = file.sync_all() {
                warn!(path = %old_path.display(), error = %e, "failed to fsync rotated-away segment");
            }
        }
        self.fd_cache.evict(&old_path);
        self.current_offset.store(0, Ordering::Release);
        info!(from = %old_path.display(), to = %new_path.display(), "rotated segment");
    }

    /// Appends `bytes` to this stream's active segment, returning the
    /// offset it was written at.
    pub fn append(&self, bytes: &[u8]) -> StorageResult<u64> {
        let (path, offset) = self.reserve(bytes.len() as u64);
        let file = self.fd_cache.get(&path)?;

        let mut written = 0usize;
        while written < bytes.len() {
            match file.write_at(&bytes[written..], offset + written as u64) {
                Ok(0) => {
                    return Err(StorageError::Invariant(format!(
                        "write_at returned 0 bytes written at offset {}",
                        offset + written as u64
                    )))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(StorageError::IoFatal { path: (*path).clone(), source: e }),
            }
        }
        Ok(offset)
    }

    /// Flushes the active segment to durable storage, under the exclusive
    /// rotation lock so no concurrent writer observes a half-rotated state.
    pub fn flush(&self) -> StorageResult<()> {
        let _guard = self.rotation_lock.write().unwrap();
        let path = self.active_path();
        let file = self.retry.retry(|_attempt| {
            OpenOptions::new().write(true).open(&*path)
        });
        match file {
            Ok(f) => f
                .sync_all()
                .map_err(|e| StorageError::IoFatal { path: (*path).clone(), source: e }),
            Err(source) => Err(StorageError::IoFatal { path: (*path).clone(), source }),
        }
    }
}
