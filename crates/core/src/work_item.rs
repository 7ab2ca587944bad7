use auditlog_storage::{Destination, Entry};

/// An entry paired with the destination it should be written to. This is
/// the unit of work the queue moves from producers to writers.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub entry: Entry,
    pub destination: Destination,
}

impl WorkItem {
    pub fn new(entry: Entry, destination: Destination) -> Self {
        Self { entry, destination }
    }
}
