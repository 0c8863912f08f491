//! `renames list/add/remove`: edit the rename table in `.doclinks.toml`
//! without disturbing the rest of the file.

use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE, Config};
use crate::error;

// ── CLI commands ──────────────────────────────────────────────────────

/// List the rename table, sorted by old target.
///
/// # Errors
///
/// Returns errors from config loading.
pub fn cmd_list(root: &Path) -> Result<(), error::Error> {
    let config = Config::load(root)?;

    if config.renames.is_empty() {
        println!("No renames configured.");
        return Ok(());
    }

    for (from, to) in &config.renames {
        println!("{from} -> {to}");
    }
    return Ok(());
}

/// Add or replace a rename-table entry.
/// The edited config is validated before it is written, so an entry that
/// would make normalization unstable never reaches disk.
///
/// # Errors
///
/// Returns `Error::InvalidRename` for an unusable entry, or errors from
/// config reading and writing.
pub fn cmd_add(root: &Path, from: &str, to: &str) -> Result<(), error::Error> {
    let (config_path, mut doc) = read_config_doc(root)?;

    let renames = doc
        .entry("renames")
        .or_insert_with(|| return toml_edit::Item::Table(toml_edit::Table::new()))
        .as_table_like_mut()
        .ok_or_else(|| {
            return error::Error::ConfigInvalid {
                path: config_path.clone(),
                reason: "`renames` must be a table".to_owned(),
            };
        })?;
    renames.insert(from, toml_edit::value(to));

    let content = doc.to_string();
    Config::parse(&content, &config_path)?;
    std::fs::write(&config_path, content)?;

    println!("Added rename: {from} -> {to}");
    return Ok(());
}

/// Remove a rename-table entry.
///
/// # Errors
///
/// Returns `Error::UnknownRename` if no entry has that key.
pub fn cmd_remove(root: &Path, from: &str) -> Result<(), error::Error> {
    let (config_path, mut doc) = read_config_doc(root)?;

    let renames = doc
        .get_mut("renames")
        .and_then(toml_edit::Item::as_table_like_mut)
        .ok_or_else(|| {
            return error::Error::UnknownRename {
                from: from.to_owned(),
            };
        })?;

    if renames.remove(from).is_none() {
        return Err(error::Error::UnknownRename {
            from: from.to_string(),
        });
    }

    std::fs::write(&config_path, doc.to_string())?;
    println!("Removed rename: {from}");
    return Ok(());
}

// ── Config file editing ───────────────────────────────────────────────

/// Parse `.doclinks.toml` into a format-preserving document.
/// Returns an empty document if the file doesn't exist.
///
/// # Errors
///
/// Returns `Error::Io` on read failure or `Error::ParseFailed` on parse failure.
fn read_config_doc(root: &Path) -> Result<(PathBuf, toml_edit::DocumentMut), error::Error> {
    let config_path = root.join(CONFIG_FILE);
    let content = match std::fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(error::Error::Io(e)),
    };

    let doc: toml_edit::DocumentMut = content.parse().map_err(|e: toml_edit::TomlError| {
        return error::Error::ParseFailed {
            file: config_path.clone(),
            reason: e.to_string(),
        };
    })?;

    return Ok((config_path, doc));
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    reason = "tests"
)]
mod tests {
    use super::*;

    #[test]
    fn add_creates_table_and_keeps_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "# docs tree\nsite_root = \"docs\"\n").unwrap();

        cmd_add(dir.path(), "/docs/old", "../guides/new.md").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# docs tree\n"));
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.renames.get("/docs/old").map(String::as_str), Some("../guides/new.md"));
    }

    #[test]
    fn add_rejects_unstable_replacement_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_add(dir.path(), "/docs/old", "/docs/new.md").unwrap_err();
        assert!(matches!(err, error::Error::InvalidRename { .. }));
        assert!(!dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn remove_deletes_entry() {
        let dir = tempfile::tempdir().unwrap();
        cmd_add(dir.path(), "/docs/old", "../guides/new.md").unwrap();
        cmd_remove(dir.path(), "/docs/old").unwrap();
        assert!(Config::load(dir.path()).unwrap().renames.is_empty());
    }

    #[test]
    fn remove_unknown_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_remove(dir.path(), "/docs/missing").unwrap_err();
        assert!(matches!(err, error::Error::UnknownRename { .. }));
    }
}
