//! State loader: resolves the raw project-state blob a context
//! pack is built around, falling through three tiers until one succeeds.
//!
//! Order: the store's `state` table, then `.mempack/state.json`, then
//! `STATE.md`, then an empty object. Each tier's failure is recorded as a
//! warning rather than aborting the build -- only total exhaustion
//! produces the `empty` source.

use std::path::Path;

use crate::store::Store;

/// Outcome of a state-loader run.
pub struct LoadedState {
    /// The resolved state blob.
    pub raw: serde_json::Value,
    /// `db`, `.mempack/state.json`, `STATE.md`, or `empty`.
    pub source: String,
    /// RFC-3339 UTC timestamp of the winning source, or empty.
    pub updated_at: String,
    /// Warnings accumulated from tiers that were tried and failed.
    pub warnings: Vec<String>,
}

/// Load state for `repo_id`/`workspace`, falling through the three tiers.
pub fn load_state(store: &dyn Store, repo_id: &str, workspace: &str, repo_root: &Path) -> LoadedState {
    let mut warnings = Vec::new();

    match store.get_state_current(repo_id, workspace) {
        Ok(Some(row)) => {
            return LoadedState {
                raw: row.raw,
                source: "db".into(),
                updated_at: row.updated_at,
                warnings,
            };
        }
        Ok(None) => {}
        Err(e) => warnings.push(format!("state_db_error:db lookup failed: {e}")),
    }

    let json_path = repo_root.join(".mempack").join("state.json");
    match std::fs::read_to_string(&json_path) {
        Ok(content) => {
            let updated_at = mtime_rfc3339(&json_path).unwrap_or_default();
            let raw = match serde_json::from_str::<serde_json::Value>(&content) {
                Ok(value) => value,
                Err(e) => {
                    warnings.push(format!("state_repo_error:.mempack/state.json invalid JSON: {e}"));
                    serde_json::json!({ "raw": content })
                }
            };
            return LoadedState {
                raw,
                source: ".mempack/state.json".into(),
                updated_at,
                warnings,
            };
        }
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            warnings.push(format!("state_repo_error:.mempack/state.json unreadable: {e}"));
        }
        Err(_) => {}
    }

    let md_path = repo_root.join("STATE.md");
    match std::fs::read_to_string(&md_path) {
        Ok(content) => {
            let updated_at = mtime_rfc3339(&md_path).unwrap_or_default();
            return LoadedState {
                raw: serde_json::json!({ "raw_markdown": content }),
                source: "STATE.md".into(),
                updated_at,
                warnings,
            };
        }
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            warnings.push(format!("state_repo_error:STATE.md unreadable: {e}"));
        }
        Err(_) => {}
    }

    LoadedState {
        raw: serde_json::json!({}),
        source: "empty".into(),
        updated_at: String::new(),
        warnings,
    }
}

/// Resolve a file's mtime as an RFC-3339 UTC timestamp.
fn mtime_rfc3339(path: &Path) -> Option<String> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    let datetime: chrono::DateTime<chrono::Utc> = modified.into();
    Some(datetime.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqliteStore, StateRow};

    #[test]
    fn falls_back_to_state_json_when_db_has_no_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mempack_dir = dir.path().join(".mempack");
        std::fs::create_dir_all(&mempack_dir).expect("mkdir");
        std::fs::write(mempack_dir.join("state.json"), r#"{"phase":"review"}"#).expect("write");

        let store = SqliteStore::open_in_memory().expect("open store");
        let loaded = load_state(&store, "repo1", "default", dir.path());
        assert_eq!(loaded.source, ".mempack/state.json");
        assert_eq!(loaded.raw["phase"], "review");
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn falls_back_to_state_md_when_json_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("STATE.md"), "# status\nin progress").expect("write");

        let store = SqliteStore::open_in_memory().expect("open store");
        let loaded = load_state(&store, "repo1", "default", dir.path());
        assert_eq!(loaded.source, "STATE.md");
        assert_eq!(loaded.raw["raw_markdown"], "# status\nin progress");
    }

    #[test]
    fn falls_back_to_empty_when_nothing_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open_in_memory().expect("open store");
        let loaded = load_state(&store, "repo1", "default", dir.path());
        assert_eq!(loaded.source, "empty");
        assert_eq!(loaded.raw, serde_json::json!({}));
    }

    #[test]
    fn invalid_state_json_is_wrapped_and_warned() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mempack_dir = dir.path().join(".mempack");
        std::fs::create_dir_all(&mempack_dir).expect("mkdir");
        std::fs::write(mempack_dir.join("state.json"), "not json").expect("write");

        let store = SqliteStore::open_in_memory().expect("open store");
        let loaded = load_state(&store, "repo1", "default", dir.path());
        assert_eq!(loaded.source, ".mempack/state.json");
        assert_eq!(loaded.raw["raw"], "not json");
        assert_eq!(loaded.warnings.len(), 1);
    }

    #[test]
    fn db_row_wins_when_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open_in_memory().expect("open store");
        store
            .put_state(
                "repo1",
                "default",
                &StateRow {
                    raw: serde_json::json!({"phase": "ship"}),
                    updated_at: "2026-01-01T00:00:00Z".into(),
                },
            )
            .expect("put state");

        let loaded = load_state(&store, "repo1", "default", dir.path());
        assert_eq!(loaded.source, "db");
        assert_eq!(loaded.raw["phase"], "ship");
    }
}
