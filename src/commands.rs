//! Core CLI commands for doclinks: fix and check.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::Config;
use crate::error;
use crate::normalizer::{self, NormalizeContext, Normalized};
use crate::report;
use crate::types::{Failure, Mode, RenameOutcome, RenameResult, RunSummary, SuggestedRename};
use crate::walker::{self, TreeIndex};
use crate::writer;

/// How a run's report is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// The same data as JSON.
    Json,
    /// Human-readable markdown report.
    Markdown,
}

/// A document read from disk, waiting to be normalized.
struct Source {
    /// Path relative to the tree root, as walked.
    path: PathBuf,
    /// Contents at the start of the run.
    text: String,
}

/// Normalize every document under `root`.
///
/// Links and files always end up agreeing. Every document is normalized
/// against the tree as it was when the walk started, and every rename
/// that normalization asks for is checked before anything is written. A
/// rename that cannot happen pins its file: links to it keep their
/// current case and the failure is recorded. In apply mode the renames are
/// then performed, any that fail are pinned the same way, and only after
/// that are the rewritten documents written, each in a single atomic
/// replace. A document that cannot be read or written is recorded as a
/// failure and the run carries on.
///
/// # Errors
///
/// Returns errors only for problems that stop the whole run: a missing or
/// non-directory root, or a malformed `.doclinks.toml`.
pub fn run(root: &Path, mode: Mode) -> Result<RunSummary, error::Error> {
    walker::ensure_root(root)?;
    let config = Config::load(root)?;
    let walker::Tree { documents, mut index } = walker::walk(root, &config)?;

    tracing::info!(root = %root.display(), mode = mode.label(), documents = documents.len(), "starting run");

    let mut failures = Vec::new();
    let sources = read_documents(root, &documents, &mut failures);

    let first_pass = normalize_all(&sources, &config, &index, mode);
    let requested: BTreeSet<SuggestedRename> = first_pass
        .iter()
        .flat_map(|n| return n.suggested_renames.iter().cloned())
        .collect();

    let mut pinned = false;
    let mut renames = plan_renames(root, &requested, &mut index, &mut failures, &mut pinned);
    if mode == Mode::Apply {
        perform_renames(root, &mut renames, &mut index, &mut failures, &mut pinned);
    }

    // Pinning only ever drops renames, so one more pass settles the text.
    let final_pass = if pinned {
        normalize_all(&sources, &config, &index, mode)
    } else {
        first_pass
    };

    let moved: BTreeMap<&Path, &Path> = renames
        .iter()
        .filter(|r| return r.outcome == RenameOutcome::Renamed)
        .map(|r| return (r.rename.old_path.as_path(), r.rename.new_path.as_path()))
        .collect();

    let mut files = Vec::with_capacity(final_pass.len());
    for normalized in final_pass {
        if normalized.should_write() {
            let current = moved.get(normalized.report.file_path.as_path()).copied();
            let disk_path = root.join(current.unwrap_or(&normalized.report.file_path));
            if let Err(e) = writer::write_atomic(&disk_path, &normalized.text) {
                record_failure(&mut failures, &normalized.report.file_path, &e);
                continue;
            }
        }
        files.push(normalized.report);
    }

    let summary = RunSummary {
        directories: report::summarize_directories(&files),
        failures,
        files,
        mode,
        renames,
        root: root.to_path_buf(),
    };
    tracing::info!(
        files = summary.files_total(),
        updated = summary.files_updated(),
        links = summary.links_changed(),
        "run finished"
    );
    return Ok(summary);
}

/// Read every document, recording the ones that cannot be read.
fn read_documents(root: &Path, documents: &[PathBuf], failures: &mut Vec<Failure>) -> Vec<Source> {
    let mut sources = Vec::with_capacity(documents.len());
    for document in documents {
        let text = match std::fs::read_to_string(root.join(document)) {
            Ok(text) => text,
            Err(e) => {
                record_failure(failures, document, &error::Error::Io(e));
                continue;
            },
        };
        sources.push(Source {
            path: document.clone(),
            text,
        });
    }
    return sources;
}

/// Normalize every source against one view of the tree.
fn normalize_all(sources: &[Source], config: &Config, index: &TreeIndex, mode: Mode) -> Vec<Normalized> {
    let ctx = NormalizeContext { config, index };
    return sources
        .iter()
        .map(|source| {
            let normalized = normalizer::normalize(&source.path, &source.text, &ctx, mode);
            tracing::debug!(
                file = %source.path.display(),
                links = normalized.report.links_found,
                changed = normalized.report.changed_count,
                "normalized"
            );
            return normalized;
        })
        .collect();
}

/// Check each requested rename against the filesystem, in sorted order.
/// The first request for a destination claims it. A rename that conflicts
/// is recorded as a failure and its file is pinned.
fn plan_renames(
    root: &Path,
    requested: &BTreeSet<SuggestedRename>,
    index: &mut TreeIndex,
    failures: &mut Vec<Failure>,
    pinned: &mut bool,
) -> Vec<RenameResult> {
    let mut planned = Vec::with_capacity(requested.len());
    let mut claimed: BTreeSet<&Path> = BTreeSet::new();

    for rename in requested {
        let checked = if claimed.insert(rename.new_path.as_path()) {
            writer::check_rename(root, rename)
        } else {
            Err(error::Error::RenameConflict {
                from: root.join(&rename.old_path),
                to: root.join(&rename.new_path),
            })
        };
        let outcome = match checked {
            Ok(outcome) => outcome,
            Err(e) => {
                record_failure(failures, &rename.old_path, &e);
                *pinned |= index.pin(&walker::to_slash_path(&rename.old_path));
                continue;
            },
        };
        planned.push(RenameResult {
            outcome,
            rename: rename.clone(),
        });
    }
    return planned;
}

/// Carry out the planned renames. One that fails is dropped from the list,
/// recorded, and its file pinned.
fn perform_renames(
    root: &Path,
    renames: &mut Vec<RenameResult>,
    index: &mut TreeIndex,
    failures: &mut Vec<Failure>,
    pinned: &mut bool,
) {
    renames.retain_mut(|result| {
        if result.outcome != RenameOutcome::Planned {
            return true;
        }
        let outcome = match writer::apply_rename(root, &result.rename) {
            Ok(outcome) => outcome,
            Err(e) => {
                record_failure(failures, &result.rename.old_path, &e);
                *pinned |= index.pin(&walker::to_slash_path(&result.rename.old_path));
                return false;
            },
        };
        result.outcome = outcome;
        return true;
    });
}

/// Log a recoverable failure and keep it for the report.
fn record_failure(failures: &mut Vec<Failure>, path: &Path, e: &error::Error) {
    tracing::warn!(path = %path.display(), error = %e, "skipping");
    failures.push(Failure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    });
}

/// Print a run report to stdout in the requested format.
///
/// # Errors
///
/// Returns `Error::Json` if JSON rendering fails.
fn print_report(summary: &RunSummary, format: OutputFormat) -> Result<(), error::Error> {
    match format {
        OutputFormat::Markdown => print!("{}", report::render_markdown(summary)),
        OutputFormat::Json => println!("{}", report::render_json(summary)?),
    }
    return Ok(());
}

/// Rewrite links under `root` (or only report what would change) and print the report.
/// Exits 0 whether or not anything changed; recoverable failures are listed
/// in the report.
///
/// # Errors
///
/// Returns fatal run errors or report rendering errors.
pub fn fix(root: &Path, dry_run: bool, format: OutputFormat) -> Result<ExitCode, error::Error> {
    let mode = if dry_run { Mode::DryRun } else { Mode::Apply };
    let summary = run(root, mode)?;
    print_report(&summary, format)?;

    let updated = summary.files_updated();
    let total = summary.files_total();
    if dry_run {
        eprintln!("{updated} of {total} files would be updated");
    } else {
        eprintln!("Updated {updated} of {total} files");
    }
    if !summary.failures.is_empty() {
        eprintln!("{} files could not be processed", summary.failures.len());
    }
    return Ok(ExitCode::SUCCESS);
}

/// Report documents whose links are not normalized, without writing.
/// Exit code: 0 when everything is normalized, 1 when any document or file
/// name would change or a document or rename cannot be handled.
///
/// # Errors
///
/// Returns fatal run errors or report rendering errors.
pub fn check(root: &Path, format: OutputFormat) -> Result<ExitCode, error::Error> {
    let summary = run(root, Mode::DryRun)?;
    let pending = summary.files_updated().saturating_add(summary.renames_pending());

    if format == OutputFormat::Json {
        print_report(&summary, format)?;
    } else {
        print_check_lines(&summary);
    }

    if pending > 0 {
        eprintln!();
        eprintln!("hint: run `doclinks fix` to apply");
    }
    if pending > 0 || !summary.failures.is_empty() {
        return Ok(ExitCode::from(1));
    }
    return Ok(ExitCode::SUCCESS);
}

/// One line per pending change, then a tally.
fn print_check_lines(summary: &RunSummary) {
    for file in summary.files.iter().filter(|f| return f.is_changed()) {
        println!("CHANGE  {} ({} links)", walker::to_slash_path(&file.file_path), file.changed_count);
    }
    for result in summary.renames.iter().filter(|r| return r.outcome == RenameOutcome::Planned) {
        println!(
            "RENAME  {} -> {}",
            walker::to_slash_path(&result.rename.old_path),
            walker::to_slash_path(&result.rename.new_path)
        );
    }
    for failure in &summary.failures {
        println!("FAILED  {} ({})", walker::to_slash_path(&failure.path), failure.reason);
    }

    let updated = summary.files_updated();
    let renames = summary.renames_pending();
    if updated > 0 || renames > 0 {
        println!();
        println!("{updated} files need updating, {renames} renames pending");
    } else {
        println!("All {} files normalized", summary.files_total());
    }
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

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("docs/core")).unwrap();
        std::fs::create_dir_all(root.join("docs/concepts")).unwrap();
        std::fs::write(
            root.join("docs/core/concept-identity.md"),
            "# Identity\n\nSee [Addressing](/docs/concepts/identity-addressing) and [Folders](../FOLDERS.md).\n",
        )
        .unwrap();
        std::fs::write(root.join("docs/concepts/identity-addressing.md"), "# Addressing\n").unwrap();
        std::fs::write(root.join("docs/FOLDERS.md"), "# Folders\n").unwrap();
        return dir;
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tree();
        let before = std::fs::read_to_string(dir.path().join("docs/core/concept-identity.md")).unwrap();
        let summary = run(dir.path(), Mode::DryRun).unwrap();

        assert_eq!(summary.files_updated(), 1);
        assert_eq!(summary.renames.len(), 1);
        assert_eq!(summary.renames[0].outcome, RenameOutcome::Planned);
        let after = std::fs::read_to_string(dir.path().join("docs/core/concept-identity.md")).unwrap();
        assert_eq!(before, after);
        assert!(dir.path().join("docs/FOLDERS.md").exists());
    }

    #[test]
    fn apply_rewrites_and_renames_then_settles() {
        let dir = tree();
        let summary = run(dir.path(), Mode::Apply).unwrap();
        assert!(summary.failures.is_empty());
        assert_eq!(summary.renames[0].outcome, RenameOutcome::Renamed);

        let text = std::fs::read_to_string(dir.path().join("docs/core/concept-identity.md")).unwrap();
        assert_eq!(
            text,
            "# Identity\n\nSee [Addressing](../concepts/identity-addressing.md) and [Folders](../folders.md).\n"
        );
        let names: Vec<String> = std::fs::read_dir(dir.path().join("docs"))
            .unwrap()
            .map(|e| return e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"folders.md".to_string()));
        assert!(!names.contains(&"FOLDERS.md".to_string()));

        let second = run(dir.path(), Mode::Apply).unwrap();
        assert_eq!(second.files_updated(), 0);
        assert!(second.renames.is_empty());
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn names_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| return e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        return names;
    }

    #[test]
    fn renamed_document_is_written_under_its_new_name() {
        let dir = tree();
        write(dir.path(), "docs/FOLDERS.md", "# Folders\n\nBack to [identity](/docs/core/concept-identity.md).\n");

        let summary = run(dir.path(), Mode::Apply).unwrap();
        assert!(summary.failures.is_empty());
        assert_eq!(names_in(&dir.path().join("docs")), vec!["concepts", "core", "folders.md"]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("docs/folders.md")).unwrap(),
            "# Folders\n\nBack to [identity](core/concept-identity.md).\n"
        );
    }

    #[test]
    fn excluded_files_keep_their_names_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, ".doclinks.toml", "exclude = [\"docs/archive/\"]\n");
        write(root, "docs/a.md", "[p](archive/OldPlan.md)\n");
        write(root, "docs/archive/OldPlan.md", "# Old plan\n");
        write(root, "docs/archive/index.md", "[p](OldPlan.md)\n");

        let summary = run(root, Mode::Apply).unwrap();
        assert!(summary.renames.is_empty(), "excluded files are never renamed");
        assert_eq!(names_in(&root.join("docs/archive")), vec!["OldPlan.md", "index.md"]);
        assert_eq!(std::fs::read_to_string(root.join("docs/a.md")).unwrap(), "[p](archive/OldPlan.md)\n");
    }

    #[test]
    fn conflicting_rename_keeps_the_link_on_the_original_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "docs/a.md", "[s](FolderStructure.md) and [t](/docs/b.md)\n");
        write(root, "docs/b.md", "");
        write(root, "docs/FolderStructure.md", "A\n");
        write(root, "docs/folder-structure.md", "B\n");

        for mode in [Mode::DryRun, Mode::Apply] {
            let summary = run(root, mode).unwrap();
            assert!(summary.renames.is_empty(), "{mode:?}");
            assert_eq!(summary.failures.len(), 1, "{mode:?}");
            assert_eq!(summary.failures[0].path, PathBuf::from("docs/FolderStructure.md"));
        }

        assert_eq!(std::fs::read_to_string(root.join("docs/a.md")).unwrap(), "[s](FolderStructure.md) and [t](b.md)\n");
        assert_eq!(std::fs::read_to_string(root.join("docs/FolderStructure.md")).unwrap(), "A\n");
        assert_eq!(std::fs::read_to_string(root.join("docs/folder-structure.md")).unwrap(), "B\n");
    }

    #[test]
    fn targets_in_hidden_directories_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let text = "See [c](.github/CONTRIBUTING.md) and [w](.github/workflows).\n";
        write(root, "README.md", text);
        write(root, ".github/CONTRIBUTING.md", "# Contributing\n");
        write(root, ".github/workflows/ci.yml", "on: push\n");

        let summary = run(root, Mode::Apply).unwrap();
        assert_eq!(summary.files_updated(), 0);
        assert!(summary.renames.is_empty());
        assert_eq!(std::fs::read_to_string(root.join("README.md")).unwrap(), text);
        assert_eq!(names_in(&root.join(".github")), vec!["CONTRIBUTING.md", "workflows"]);
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            run(&dir.path().join("missing"), Mode::DryRun).unwrap_err(),
            error::Error::RootNotFound { .. }
        ));
    }

    #[test]
    fn unreadable_document_does_not_stop_the_run() {
        let dir = tree();
        std::fs::write(dir.path().join("docs/binary.md"), [0xff_u8, 0xfe, 0x00]).unwrap();
        let summary = run(dir.path(), Mode::DryRun).unwrap();
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].path, PathBuf::from("docs/binary.md"));
        assert_eq!(summary.files_updated(), 1);
    }

    #[test]
    fn malformed_config_is_fatal() {
        let dir = tree();
        std::fs::write(dir.path().join(".doclinks.toml"), "renames = 3").unwrap();
        assert!(run(dir.path(), Mode::DryRun).is_err());
    }
}
