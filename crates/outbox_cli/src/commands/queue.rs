//! Queue inspection and maintenance commands.

use super::{open_queue, print_json, CliResult, Format};
use outbox_sync::{ItemStatus, QueueItem};
use std::path::Path;

/// Lists queued actions.
pub fn list(path: &Path, max_retries: u32, failed_only: bool, format: Format) -> CliResult {
    let items = load(path, max_retries, failed_only)?;

    match format {
        Format::Json => print_json(&items)?,
        Format::Text => {
            if items.is_empty() {
                println!("Queue is empty");
            }
            for item in &items {
                print_item(item, max_retries);
            }
        }
    }
    Ok(())
}

/// Loads queued actions, optionally only the parked ones.
pub fn load(path: &Path, max_retries: u32, failed_only: bool) -> CliResult<Vec<QueueItem>> {
    let queue = open_queue(path, max_retries)?;
    let mut items = queue.get_queue();
    if failed_only {
        items.retain(|item| item.status(max_retries) == ItemStatus::Failed);
    }
    Ok(items)
}

/// Removes one action. Returns false if it was not queued.
pub fn remove(path: &Path, id: &str) -> CliResult<bool> {
    Ok(open_queue(path, u32::MAX)?.remove_action(id)?)
}

/// Removes every action that exhausted its retries.
pub fn purge_failed(path: &Path, max_retries: u32) -> CliResult<usize> {
    Ok(open_queue(path, max_retries)?.clear_failed_actions()?)
}

/// Removes every action.
pub fn clear(path: &Path) -> CliResult<usize> {
    Ok(open_queue(path, u32::MAX)?.clear_queue()?)
}

fn print_item(item: &QueueItem, max_retries: u32) {
    let status = match item.status(max_retries) {
        ItemStatus::Pending => "pending",
        ItemStatus::Retrying => "retrying",
        ItemStatus::Failed => "failed",
    };
    println!(
        "{}  {:<6} {:<13} {}  retries={}/{} [{}]",
        item.id,
        item.action_type.as_str(),
        item.resource.name(),
        item.endpoint,
        item.retry_count,
        max_retries,
        status
    );
    if let Some(error) = &item.last_error {
        println!("    last error: {error}");
    }
}
