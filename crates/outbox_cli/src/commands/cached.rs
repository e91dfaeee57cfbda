//! Cached resource lookup.

use super::{open_store, print_json, CliResult, Format};
use outbox_store::ResourceKind;
use serde_json::Value;
use std::path::Path;

/// Loads one cached entry, or every entry of the resource.
pub fn load(path: &Path, resource: &str, id: Option<&str>) -> CliResult<Vec<Value>> {
    let kind: ResourceKind = resource.parse()?;
    let store = open_store(path)?;

    match id {
        Some(id) => store
            .get_cached_api_response(kind, id)
            .map(|value| vec![value])
            .ok_or_else(|| format!("No cached {kind} entry with id {id}").into()),
        None => Ok(store.get_all_cached_for_resource(kind)),
    }
}

/// Runs the cached command.
pub fn run(path: &Path, resource: &str, id: Option<&str>, format: Format) -> CliResult {
    let entries = load(path, resource, id)?;

    match (format, id) {
        (Format::Json, Some(_)) => print_json(&entries[0])?,
        (Format::Json, None) => print_json(&entries)?,
        (Format::Text, _) => {
            if entries.is_empty() {
                println!("No cached {resource} entries");
            }
            for entry in &entries {
                println!("{entry}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::seed;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn lists_and_looks_up_entries() {
        let dir = tempdir().unwrap();
        seed(dir.path(), 0);

        assert_eq!(load(dir.path(), "properties", None).unwrap().len(), 2);
        assert_eq!(
            load(dir.path(), "property", Some("p1")).unwrap(),
            vec![json!({"id": "p1", "title": "Casa"})]
        );
        assert!(load(dir.path(), "properties", Some("missing")).is_err());
    }

    #[test]
    fn unknown_resources_are_rejected() {
        let dir = tempdir().unwrap();
        seed(dir.path(), 0);

        let err = load(dir.path(), "invoices", None).unwrap_err();
        assert!(err.to_string().contains("invoices"));
    }
}
