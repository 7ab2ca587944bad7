//! Audit log engine: the manager, writer pool, and entry/batch plumbing
//! tying the `auditlog-mpmc` queue to `auditlog-storage`'s segmented
//! storage layer.
//!
//! ```no_run
//! use auditlog_core::{Action, Config, EntryDraft, Manager};
//!
//! let manager = Manager::new(Config::default().with_base_path("./audit-log"))?;
//! manager.start()?;
//!
//! let token = manager.producer_token()?;
//! manager.append(&token, EntryDraft::new(Action::Create, "user-42", b"{}".to_vec()))?;
//!
//! manager.stop()?;
//! # Ok::<(), auditlog_core::ManagerError>(())
//! ```

mod config;
mod draft;
mod error;
mod manager;
mod work_item;
mod writer_pool;

pub use auditlog_storage::{Action, Destination, Entry};
pub use config::{Config, ConfigError};
pub use draft::EntryDraft;
pub use error::{AppendError, ManagerError};
pub use manager::Manager;
pub use work_item::WorkItem;
pub use writer_pool::WriterMetrics;
