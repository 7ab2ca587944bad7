use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use auditlog_storage_backend::{FdCache, RetryPolicy};

use crate::entry::Destination;
use crate::error::StorageResult;
use crate::stream::{Stream, StreamConfig};

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub base_path: PathBuf,
    pub base_filename: String,
    pub max_segment_size: u64,
    pub max_open_files: usize,
    pub max_attempts: u32,
    pub base_retry_delay: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            base_filename: "audit".to_string(),
            max_segment_size: 64 * 1024 * 1024,
            max_open_files: 64,
            max_attempts: 5,
            base_retry_delay: Duration::from_millis(10),
        }
    }
}

/// Owns one [`Stream`] per destination, created lazily on first write.
/// All streams share a single process-wide FD cache so `max_open_files`
/// bounds descriptors across destinations, not per destination.
pub struct Storage {
    config: StorageConfig,
    fd_cache: Arc<FdCache>,
    retry: RetryPolicy,
    streams: Mutex<HashMap<String, Arc<Stream>>>,
}

impl Storage {
    pub fn new(config: StorageConfig) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.base_path)?;
        let retry = RetryPolicy::new(config.max_attempts, config.base_retry_delay);
        let fd_cache = Arc::new(FdCache::new(config.max_open_files, retry));
        Ok(Self {
            config,
            fd_cache,
            retry,
            streams: Mutex::new(HashMap::new()),
        })
    }

    fn stream_for(&self, destination: &Destination) -> Arc<Stream> {
        let key = destination.as_str().to_string();
        let mut streams = self.streams.lock().unwrap();
        if let Some(stream) = streams.get(&key) {
            return Arc::clone(stream);
        }
        let dest_component = match destination {
            Destination::Default => None,
            Destination::Named(name) => Some(name.as_str()),
        };
        let stream = Arc::new(Stream::new(
            StreamConfig {
                base_path: self.config.base_path.clone(),
                base_filename: self.config.base_filename.clone(),
                destination: dest_component.map(str::to_string),
                max_segment_size: self.config.max_segment_size,
            },
            Arc::clone(&self.fd_cache),
            self.retry,
        ));
        streams.insert(key, Arc::clone(&stream));
        stream
    }

    pub fn write_default(&self, bytes: &[u8]) -> StorageResult<u64> {
        self.write_to(&Destination::Default, bytes)
    }

    pub fn write_to(&self, destination: &Destination, bytes: &[u8]) -> StorageResult<u64> {
        self.stream_for(destination).append(bytes)
    }

    /// Fsyncs every stream created so far.
    pub fn flush(&self) -> StorageResult<()> {
        let streams: Vec<_> = self.streams.lock().unwrap().values().cloned().collect();
        for stream in streams {
            stream.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{deserialize_batch, serialize_batch};
    use crate::entry::{Action, Batch, Entry};
    use crate::framing::{frame_plain, FramePayload, FrameReader};

    fn test_storage(dir: &std::path::Path, max_segment_size: u64) -> Storage {
        Storage::new(StorageConfig {
            base_path: dir.to_path_buf(),
            base_filename: "audit".into(),
            max_segment_size,
            max_open_files: 8,
            max_attempts: 2,
            base_retry_delay: Duration::from_millis(1),
        })
        .unwrap()
    }

    #[test]
    fn writes_to_distinct_destinations_create_distinct_streams() {
        let dir = tempfile::tempdir().unwrap();
        let storage = test_storage(dir.path(), 1024 * 1024);

        storage.write_default(b"a").unwrap();
        storage.write_to(&Destination::from("billing"), b"b").unwrap();
        storage.write_to(&Destination::from("billing"), b"c").unwrap();

        assert_eq!(storage.streams.lock().unwrap().len(), 2);
    }

    #[test]
    fn written_frames_decode_back_to_original_batch() {
        let dir = tempfile::tempdir().unwrap();
        let storage = test_storage(dir.path(), 1024 * 1024);

        let batch = Batch::new(vec![
            Entry::new(1, Action::Create, "k1", b"p1".to_vec()),
            Entry::new(2, Action::Update, "k2", b"p2".to_vec()),
        ]);
        let encoded = serialize_batch(&batch);
        let framed = frame_plain(&encoded);
        storage.write_default(&framed).unwrap();
        storage.flush().unwrap();

        let stream = storage.stream_for(&Destination::Default);
        let path = stream.active_path_for_test();
        let contents = std::fs::read(&*path).unwrap();

        let mut frames = FrameReader::new(&contents, false);
        let payload = match frames.next().unwrap().unwrap() {
            FramePayload::Plain(bytes) => bytes,
            FramePayload::Encrypted { .. } => panic!("expected a plain frame"),
        };
        let decoded = deserialize_batch(payload).unwrap();
        assert_eq!(decoded, batch);
    }
}
