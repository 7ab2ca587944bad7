use std::time::{SystemTime, UNIX_EPOCH};

/// The action an audit entry records. Modeled as a small closed set rather
/// than a free-form string so the codec's action byte stays a single u8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    Create = 0,
    Read = 1,
    Update = 2,
    Delete = 3,
    Other = 255,
}

impl Action {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Action::Create,
            1 => Action::Read,
            2 => Action::Update,
            3 => Action::Delete,
            _ => Action::Other,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single immutable audit record.
///
/// `sequence` is assigned once, by the manager, from a process-wide
/// monotonic counter at construction time — never renumbered afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub timestamp_nanos: u64,
    pub sequence: u64,
    pub action: Action,
    pub key: String,
    pub subject: String,
    pub controller: String,
    pub processor: String,
    pub previous_hash: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Entry {
    /// Builds an entry stamped with the current wall-clock time. `sequence`
    /// must be supplied by the caller (the manager owns the counter).
    pub fn new(sequence: u64, action: Action, key: impl Into<String>, payload: Vec<u8>) -> Self {
        let timestamp_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        Self {
            timestamp_nanos,
            sequence,
            action,
            key: key.into(),
            subject: String::new(),
            controller: String::new(),
            processor: String::new(),
            previous_hash: Vec::new(),
            payload,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = controller.into();
        self
    }

    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = processor.into();
        self
    }

    pub fn with_previous_hash(mut self, hash: Vec<u8>) -> Self {
        self.previous_hash = hash;
        self
    }
}

/// A named logical destination, or the default stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    Default,
    Named(String),
}

impl Destination {
    pub fn as_str(&self) -> &str {
        match self {
            Destination::Default => "default",
            Destination::Named(name) => name,
        }
    }
}

impl From<&str> for Destination {
    fn from(s: &str) -> Self {
        Destination::Named(s.to_string())
    }
}

impl Default for Destination {
    fn default() -> Self {
        Destination::Default
    }
}

/// An ordered run of entries destined for a single stream. Ephemeral —
/// constructed by the writer pool between dequeue and `storage.write`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub entries: Vec<Entry>,
}

impl Batch {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
