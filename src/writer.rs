//! Filesystem side effects: atomic document writes and case-fixing renames.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use sha2::{Digest as _, Sha256};
use tempfile::NamedTempFile;

use crate::error::Error;
use crate::types::{RenameOutcome, SuggestedRename};

/// Replace `path` with `content` in one step. The new content is written to
/// a temporary file in the same directory and moved over the original, so an
/// interrupted run leaves either the old or the new file, never a mix.
///
/// # Errors
///
/// Returns `Error::Io` if the temporary file cannot be created, written or persisted.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), Error> {
    let dir = path
        .parent()
        .filter(|p| return !p.as_os_str().is_empty())
        .unwrap_or_else(|| return Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;

    if let Ok(meta) = std::fs::metadata(path) {
        std::fs::set_permissions(tmp.path(), meta.permissions())?;
    }

    tmp.persist(path).map_err(|e| return Error::Io(e.error))?;
    return Ok(());
}

/// SHA-256 of a file's bytes, hex-encoded.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read.
pub fn fingerprint(path: &Path) -> Result<String, Error> {
    let bytes = std::fs::read(path)?;
    let hash = Sha256::digest(&bytes);
    return Ok(format!("{hash:x}"));
}

/// Decide what a suggested rename under `root` needs, without touching disk.
///
/// A source that is already gone, or a destination that already holds
/// identical content, is `AlreadyDone`; a move that can go ahead is
/// `Planned`. Existence is checked by exact directory entry name so that
/// case-only renames behave the same on case-insensitive filesystems.
///
/// # Errors
///
/// Returns `Error::RenameConflict` if the destination exists with different
/// content, or `Error::Io` if either side cannot be inspected.
pub fn check_rename(root: &Path, rename: &SuggestedRename) -> Result<RenameOutcome, Error> {
    let from = root.join(&rename.old_path);
    let to = root.join(&rename.new_path);

    if from == to || !exists_exact(&from)? {
        return Ok(RenameOutcome::AlreadyDone);
    }
    if exists_exact(&to)? {
        if fingerprint(&from)? == fingerprint(&to)? {
            return Ok(RenameOutcome::AlreadyDone);
        }
        return Err(Error::RenameConflict { from, to });
    }
    return Ok(RenameOutcome::Planned);
}

/// Perform one suggested rename under `root`, after [`check_rename`] agrees.
/// Case-only renames go through an intermediate name.
///
/// # Errors
///
/// Returns `Error::RenameConflict` if the destination exists with different
/// content, or `Error::Io` if the move fails.
pub fn apply_rename(root: &Path, rename: &SuggestedRename) -> Result<RenameOutcome, Error> {
    let outcome = check_rename(root, rename)?;
    if outcome != RenameOutcome::Planned {
        return Ok(outcome);
    }

    let from = root.join(&rename.old_path);
    let to = root.join(&rename.new_path);
    if is_case_only(&from, &to) {
        let staging = staging_path(&from);
        std::fs::rename(&from, &staging)?;
        if let Err(e) = std::fs::rename(&staging, &to) {
            roll_back(&staging, &from);
            return Err(Error::Io(e));
        }
    } else {
        std::fs::rename(&from, &to)?;
    }

    tracing::info!(from = %rename.old_path.display(), to = %rename.new_path.display(), "renamed file");
    return Ok(RenameOutcome::Renamed);
}

/// Move a staged file back to its original name after a failed rename.
/// A failure is logged with both names so the stranded file can be found.
/// Returns whether the file is back in place.
fn roll_back(staging: &Path, original: &Path) -> bool {
    let Err(e) = std::fs::rename(staging, original) else {
        return true;
    };
    tracing::warn!(
        staged = %staging.display(),
        original = %original.display(),
        error = %e,
        "could not move file back after a failed rename"
    );
    return false;
}

/// Whether a directory entry with exactly this file name exists.
///
/// # Errors
///
/// Returns `Error::Io` if the parent directory cannot be listed.
fn exists_exact(path: &Path) -> Result<bool, Error> {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Ok(false);
    };
    let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };

    let entries = match std::fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::Io(e)),
    };
    for entry in entries {
        if entry?.file_name() == name {
            return Ok(true);
        }
    }
    return Ok(false);
}

/// Whether two paths differ only by letter case.
fn is_case_only(from: &Path, to: &Path) -> bool {
    let a = from.to_string_lossy();
    let b = to.to_string_lossy();
    return a != b && a.to_lowercase() == b.to_lowercase();
}

/// Sibling name used while moving a file through a case-only rename.
fn staging_path(from: &Path) -> PathBuf {
    let name = from.file_name().map(|n| return n.to_string_lossy().into_owned()).unwrap_or_default();
    return from.with_file_name(format!(".{name}.doclinks-rename"));
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

    fn rename(old: &str, new: &str) -> SuggestedRename {
        return SuggestedRename {
            new_path: PathBuf::from(new),
            old_path: PathBuf::from(old),
        };
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "old").unwrap();
        write_atomic(&path, "new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn rename_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("FolderStructure.md"), "x").unwrap();
        let outcome = apply_rename(dir.path(), &rename("FolderStructure.md", "folder-structure.md")).unwrap();
        assert_eq!(outcome, RenameOutcome::Renamed);
        assert!(exists_exact(&dir.path().join("folder-structure.md")).unwrap());
        assert!(!exists_exact(&dir.path().join("FolderStructure.md")).unwrap());
    }

    #[test]
    fn case_only_rename_goes_through_staging() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "x").unwrap();
        let outcome = apply_rename(dir.path(), &rename("README.md", "readme.md")).unwrap();
        assert_eq!(outcome, RenameOutcome::Renamed);
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| return e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["readme.md".to_string()]);
    }

    #[test]
    fn second_rename_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("FOLDERS.md"), "x").unwrap();
        let request = rename("FOLDERS.md", "folders.md");
        assert_eq!(apply_rename(dir.path(), &request).unwrap(), RenameOutcome::Renamed);
        assert_eq!(apply_rename(dir.path(), &request).unwrap(), RenameOutcome::AlreadyDone);
    }

    #[test]
    fn identical_destination_is_already_done() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Guide.md"), "same").unwrap();
        std::fs::write(dir.path().join("guide-copy.md"), "same").unwrap();
        let outcome = apply_rename(dir.path(), &rename("Guide.md", "guide-copy.md")).unwrap();
        assert_eq!(outcome, RenameOutcome::AlreadyDone);
        assert!(exists_exact(&dir.path().join("Guide.md")).unwrap());
    }

    #[test]
    fn check_plans_without_moving() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("FOLDERS.md"), "x").unwrap();
        let request = rename("FOLDERS.md", "folders.md");
        assert_eq!(check_rename(dir.path(), &request).unwrap(), RenameOutcome::Planned);
        assert!(exists_exact(&dir.path().join("FOLDERS.md")).unwrap());
        assert_eq!(
            check_rename(dir.path(), &rename("Missing.md", "missing.md")).unwrap(),
            RenameOutcome::AlreadyDone
        );
    }

    #[test]
    fn roll_back_restores_or_reports() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("README.md");
        let staged = staging_path(&original);
        std::fs::write(&staged, "x").unwrap();

        assert!(roll_back(&staged, &original));
        assert!(exists_exact(&original).unwrap());
        assert!(!roll_back(&staged, &original), "a missing staged file cannot be restored");
    }

    #[test]
    fn differing_destination_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Guide.md"), "one").unwrap();
        std::fs::write(dir.path().join("guide-copy.md"), "two").unwrap();
        let err = apply_rename(dir.path(), &rename("Guide.md", "guide-copy.md")).unwrap_err();
        assert!(matches!(err, Error::RenameConflict { .. }));
    }
}
