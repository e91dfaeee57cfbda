//! Compact command implementation.

use super::{open_store, CliResult};
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path) -> CliResult {
    let store = open_store(path)?;

    println!("Compacting store at {}", path.display());
    let report = store.compact()?;

    let saved = report.bytes_before.saturating_sub(report.bytes_after);
    println!("  Records kept: {}", report.records);
    println!("  Size before:  {} bytes", report.bytes_before);
    println!("  Size after:   {} bytes", report.bytes_after);
    println!(
        "  Space saved:  {} bytes ({:.1}%)",
        saved,
        if report.bytes_before > 0 {
            saved as f64 / report.bytes_before as f64 * 100.0
        } else {
            0.0
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{cached, queue, testing::seed};
    use tempfile::tempdir;

    #[test]
    fn compaction_keeps_live_records() {
        let dir = tempdir().unwrap();
        let ids = seed(dir.path(), 3);
        queue::remove(dir.path(), &ids[1]).unwrap();

        let log = dir.path().join("store.log");
        let before = std::fs::metadata(&log).unwrap().len();
        run(dir.path()).unwrap();
        let after = std::fs::metadata(&log).unwrap().len();
        assert!(after < before);

        let remaining: Vec<String> = queue::load(dir.path(), 3, false)
            .unwrap()
            .into_iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(remaining, vec![ids[0].clone(), ids[2].clone()]);
        assert_eq!(cached::load(dir.path(), "properties", None).unwrap().len(), 2);
    }
}
