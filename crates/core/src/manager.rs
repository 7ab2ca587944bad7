use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use auditlog_mpmc::{ProducerToken, Queue};
use auditlog_storage::{Entry, Storage, StorageConfig};
use tracing::info;

use crate::config::Config;
use crate::draft::EntryDraft;
use crate::error::{AppendError, ManagerError};
use crate::work_item::WorkItem;
use crate::writer_pool::{CryptoConfig, WriterMetrics, WriterPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Started,
    Draining,
    Stopped,
}

/// Owns the queue, storage, and writer pool, and exposes the engine's
/// public entry point. `append*` is only accepted while the accepting
/// gate is open, which `start` opens and `stop` closes before anything
/// else happens.
pub struct Manager {
    config: Config,
    queue: Queue<WorkItem>,
    storage: std::sync::Arc<Storage>,
    writer_pool: Mutex<Option<WriterPool>>,
    sequence: AtomicU64,
    accepting: AtomicBool,
    state: Mutex<State>,
    crypto_key: Option<[u8; 32]>,
}

impl Manager {
    pub fn new(config: Config) -> Result<Self, ManagerError> {
        Self::with_crypto_key(config, None)
    }

    /// `crypto_key` is required when `config.use_encryption` is set;
    /// key management itself is the embedder's responsibility.
    pub fn with_crypto_key(config: Config, crypto_key: Option<[u8; 32]>) -> Result<Self, ManagerError> {
        let queue = Queue::new(config.queue_capacity, config.max_explicit_producers);
        let storage = Storage::new(StorageConfig {
            base_path: config.base_path.clone(),
            base_filename: config.base_filename.clone(),
            max_segment_size: config.max_segment_size,
            max_open_files: config.max_open_files,
            max_attempts: config.max_attempts,
            base_retry_delay: config.base_retry_delay,
        })
        .map_err(|e| ManagerError::Storage(auditlog_storage::StorageError::IoFatal {
            path: config.base_path.clone(),
            source: e,
        }))?;

        Ok(Self {
            config,
            queue,
            storage: std::sync::Arc::new(storage),
            writer_pool: Mutex::new(None),
            sequence: AtomicU64::new(0),
            accepting: AtomicBool::new(false),
            state: Mutex::new(State::Created),
            crypto_key,
        })
    }

    /// Spawns the writer pool and opens the accepting gate.
    pub fn start(&self) -> Result<(), ManagerError> {
        let mut state = self.state.lock().unwrap();
        if *state != State::Created {
            return Err(ManagerError::AlreadyStarted);
        }
        let crypto = if self.config.use_encryption {
            let key = self.crypto_key.ok_or(ManagerError::MissingCryptoKey)?;
            Some(CryptoConfig { key })
        } else {
            None
        };
        let pool = WriterPool::start(&self.config, &self.queue, std::sync::Arc::clone(&self.storage), crypto);
        *self.writer_pool.lock().unwrap() = Some(pool);
        self.accepting.store(true, Ordering::Release);
        *state = State::Started;
        info!(writer_threads = self.config.num_writer_threads, "manager started");
        Ok(())
    }

    /// Mints a producer token bound to this manager's queue.
    pub fn producer_token(&self) -> Result<ProducerToken<WorkItem>, ManagerError> {
        self.queue
            .producer_token()
            .map_err(|e| ManagerError::Append(AppendError::from(e)))
    }

    pub fn append(&self, token: &ProducerToken<WorkItem>, draft: EntryDraft) -> Result<u64, ManagerError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(ManagerError::Append(AppendError::NotAccepting));
        }
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel);
        let entry = build_entry(sequence, &draft);
        let destination = draft.destination;
        token
            .enqueue_blocking(WorkItem::new(entry, destination), self.config.append_timeout)
            .map_err(|e| ManagerError::Append(AppendError::from(e)))?;
        Ok(sequence)
    }

    pub fn append_batch(
        &self,
        token: &ProducerToken<WorkItem>,
        drafts: Vec<EntryDraft>,
    ) -> Result<Vec<u64>, ManagerError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(ManagerError::Append(AppendError::NotAccepting));
        }
        let mut sequences = Vec::with_capacity(drafts.len());
        let items: Vec<WorkItem> = drafts
            .into_iter()
            .map(|draft| {
                let sequence = self.sequence.fetch_add(1, Ordering::AcqRel);
                sequences.push(sequence);
                let entry = build_entry(sequence, &draft);
                WorkItem::new(entry, draft.destination)
            })
            .collect();
        token
            .enqueue_batch_blocking(items, self.config.append_timeout)
            .map_err(|e| ManagerError::Append(AppendError::from(e)))?;
        Ok(sequences)
    }

    /// Closes the accepting gate, waits for the queue to drain, stops the
    /// writer pool, and flushes storage. Returns only once every
    /// previously-accepted entry is durably on disk.
    ///
    /// `accepting` and `queue.close()` are both set before anything else:
    /// a producer preempted between `append`'s gate check and its
    /// `enqueue_blocking` call would otherwise be able to enqueue after
    /// `flush`/`pool.stop()` have already run, landing an item in a queue
    /// nobody will ever drain again. Closing the queue makes that race
    /// lose to `QueueError::Closed` instead of silently succeeding.
    pub fn stop(&self) -> Result<(), ManagerError> {
        {
            let mut state = self.state.lock().unwrap();
            if *state != State::Started {
                return Err(ManagerError::NotStarted);
            }
            *state = State::Draining;
        }
        self.accepting.store(false, Ordering::Release);
        self.queue.close();
        self.queue.flush();

        if let Some(pool) = self.writer_pool.lock().unwrap().take() {
            pool.stop();
        }
        self.storage.flush()?;

        *self.state.lock().unwrap() = State::Stopped;
        info!("manager stopped");
        Ok(())
    }

    pub fn writer_metrics(&self) -> WriterMetrics {
        self.writer_pool
            .lock()
            .unwrap()
            .as_ref()
            .map(|p| p.aggregate_metrics())
            .unwrap_or_default()
    }

    pub fn queue_size(&self) -> usize {
        self.queue.size()
    }
}

fn build_entry(sequence: u64, draft: &EntryDraft) -> Entry {
    Entry::new(sequence, draft.action, draft.key.clone(), draft.payload.clone())
        .with_subject(draft.subject.clone())
        .with_controller(draft.controller.clone())
        .with_processor(draft.processor.clone())
        .with_previous_hash(draft.previous_hash.clone())
}
