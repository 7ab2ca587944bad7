use auditlog_storage::{Action, Destination};

/// Caller-supplied fields for one entry, before the manager assigns its
/// sequence number and timestamp. The manager is the only place that
/// turns a draft into a real `Entry` — that's what makes "sequence
/// numbers are globally unique and non-decreasing" a property of the
/// system rather than something every caller has to get right.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub action: Action,
    pub key: String,
    pub payload: Vec<u8>,
    pub subject: String,
    pub controller: String,
    pub processor: String,
    pub previous_hash: Vec<u8>,
    pub destination: Destination,
}

impl EntryDraft {
    pub fn new(action: Action, key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            action,
            key: key.into(),
            payload,
            subject: String::new(),
            controller: String::new(),
            processor: String::new(),
            previous_hash: Vec::new(),
            destination: Destination::Default,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<Destination>) -> Self {
        self.destination = destination.into();
        self
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
