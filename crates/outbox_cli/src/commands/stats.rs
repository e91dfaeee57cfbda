//! Stats command implementation.

use super::{open_store, print_json, CliResult, Format};
use outbox_store::{Collection, StoreStats};
use outbox_sync::{EventBus, QueueStats, QueueStore};
use serde::Serialize;
use std::path::Path;

/// Store and queue statistics.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    /// Store directory.
    pub path: String,
    /// Per-collection counts and sizes.
    pub store: StoreStats,
    /// Queue status counts.
    pub queue: QueueStats,
}

/// Gathers statistics for the store at `path`.
pub fn collect(path: &Path, max_retries: u32) -> CliResult<StatsReport> {
    let store = open_store(path)?;
    let stats = store.stats();
    let queue = QueueStore::new(store, EventBus::default(), max_retries).get_stats();
    Ok(StatsReport {
        path: path.display().to_string(),
        store: stats,
        queue,
    })
}

/// Runs the stats command.
pub fn run(path: &Path, max_retries: u32, format: Format) -> CliResult {
    let report = collect(path, max_retries)?;
    match format {
        Format::Json => print_json(&report)?,
        Format::Text => print_text(&report),
    }
    Ok(())
}

fn print_text(report: &StatsReport) {
    println!("Store: {}", report.path);
    println!();
    println!("Collections:");
    for count in &report.store.collections {
        println!("  {:<22} {:>8}", count.collection.name(), count.records);
    }
    println!();
    println!("  Data size: {} bytes", report.store.total_size);
    println!("  Log size:  {} bytes", report.store.log_bytes);
    println!();
    println!("Queue ({}):", Collection::OfflineQueue);
    println!("  Total:    {}", report.queue.total);
    println!("  Pending:  {}", report.queue.pending);
    println!("  Retrying: {}", report.queue.retrying);
    println!("  Failed:   {}", report.queue.failed);
}
