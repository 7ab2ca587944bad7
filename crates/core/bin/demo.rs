//! End-to-end smoke-test binary for the audit log engine.
//!
//! Spins up a manager against a scratch directory, runs a handful of
//! producer threads pushing entries to a couple of destinations, then
//! stops cleanly and prints the aggregated writer metrics.
//!
//! ```bash
//! cargo run -p auditlog-core --bin demo -- --quick
//! ```

use std::env;
use std::sync::Arc;
use std::thread;

use auditlog_core::{Action, Config, EntryDraft, Manager};
use auditlog_storage::Destination;

fn main() {
    tracing_subscriber::fmt::init();

    let quick = env::args().any(|a| a == "--quick");
    let num_producers = if quick { 4 } else { 8 };
    let entries_per_producer = if quick { 200 } else { 2_000 };

    let dir = tempfile::tempdir().expect("create scratch directory");
    let config = Config::default()
        .with_base_path(dir.path())
        .with_num_writer_threads(4)
        .with_queue_capacity(8192);

    let manager = Arc::new(Manager::new(config).expect("construct manager"));
    manager.start().expect("start manager");

    let start = std::time::Instant::now();
    let handles: Vec<_> = (0..num_producers)
        .map(|p| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let token = manager.producer_token().expect("mint producer token");
                let destination = if p % 2 == 0 {
                    Destination::Default
                } else {
                    Destination::from("billing")
                };
                for i in 0..entries_per_producer {
                    let draft = EntryDraft::new(
                        Action::Create,
                        format!("producer-{p}-key-{i}"),
                        b"demo payload".to_vec(),
                    )
                    .with_destination(destination.clone());
                    manager.append(&token, draft).expect("append entry");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("producer thread panicked");
    }

    manager.stop().expect("stop manager");
    let elapsed = start.elapsed();
    let metrics = manager.writer_metrics();

    println!("wrote {} entries across {num_producers} producers in {elapsed:?}", num_producers * entries_per_producer);
    println!("{metrics:?}");
}
