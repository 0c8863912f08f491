//! Run report rendering: markdown for people, JSON for tools.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Error;
use crate::types::{DirectorySummary, FileChangeReport, RenameOutcome, RunSummary};
use crate::walker;

/// JSON shape: the run plus the derived totals.
#[derive(Serialize)]
struct JsonReport<'a> {
    /// Documents processed.
    files_total: usize,
    /// Documents whose text changed.
    files_updated: usize,
    /// Link targets rewritten across the run.
    links_changed: usize,
    /// Everything else, inlined.
    #[serde(flatten)]
    run: &'a RunSummary,
}

/// Tally documents per directory, sorted by directory path.
pub fn summarize_directories(files: &[FileChangeReport]) -> Vec<DirectorySummary> {
    let mut by_dir: BTreeMap<PathBuf, (usize, usize)> = BTreeMap::new();
    for file in files {
        let dir = file.file_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let tally = by_dir.entry(dir).or_insert((0, 0));
        tally.0 = tally.0.saturating_add(1);
        if file.is_changed() {
            tally.1 = tally.1.saturating_add(1);
        }
    }

    return by_dir
        .into_iter()
        .map(|(dir_path, (files_total, files_updated))| {
            return DirectorySummary { dir_path, files_total, files_updated };
        })
        .collect();
}

/// Label for a directory in the report: `/`-joined, `.` for the root.
fn dir_label(dir: &Path) -> String {
    let label = walker::to_slash_path(dir);
    if label.is_empty() {
        return ".".to_string();
    }
    return label;
}

/// Render a run as a markdown report.
pub fn render_markdown(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Link Normalization Report\n");
    let _ = writeln!(out, "- Root: `{}`", summary.root.display());
    let _ = writeln!(out, "- Mode: {}", summary.mode.label());

    for dir in &summary.directories {
        render_directory(&mut out, summary, dir);
    }

    if !summary.renames.is_empty() {
        out.push_str("\n## Renames\n\n");
        for result in &summary.renames {
            let outcome = match result.outcome {
                RenameOutcome::AlreadyDone => "already done",
                RenameOutcome::Planned => "planned",
                RenameOutcome::Renamed => "renamed",
            };
            let _ = writeln!(
                out,
                "- `{}` -> `{}` ({outcome})",
                walker::to_slash_path(&result.rename.old_path),
                walker::to_slash_path(&result.rename.new_path),
            );
        }
    }

    if !summary.failures.is_empty() {
        out.push_str("\n## Failures\n\n");
        for failure in &summary.failures {
            let _ = writeln!(out, "- `{}`: {}", walker::to_slash_path(&failure.path), failure.reason);
        }
    }

    out.push_str("\n## Summary\n\n");
    let _ = writeln!(out, "- Files processed: {}", summary.files_total());
    let _ = writeln!(out, "- Files updated: {}", summary.files_updated());
    let _ = writeln!(out, "- Links changed: {}", summary.links_changed());
    return out;
}

/// One directory section: each document's changes, then the tally line.
fn render_directory(out: &mut String, summary: &RunSummary, dir: &DirectorySummary) {
    let _ = write!(out, "\n## Directory: `{}`\n\n", dir_label(&dir.dir_path));

    let files = summary
        .files
        .iter()
        .filter(|f| return f.file_path.parent().map(Path::to_path_buf).unwrap_or_default() == dir.dir_path);

    for file in files {
        let name = walker::to_slash_path(&file.file_path);
        if file.links_found == 0 {
            let _ = writeln!(out, "- `{name}`: No links found");
            continue;
        }
        if !file.is_changed() {
            let _ = writeln!(out, "- `{name}`: {} links, no changes", file.links_found);
            continue;
        }
        let _ = writeln!(out, "- `{name}`: {} of {} links updated", file.changed_count, file.links_found);
        for change in &file.changes {
            let _ = writeln!(
                out,
                "  - line {}, {}: `{}` -> `{}`",
                change.line,
                change.rule.label(),
                change.before,
                change.after,
            );
        }
    }

    let _ = write!(
        out,
        "\nDirectory Summary: {} of {} files updated\n",
        dir.files_updated, dir.files_total
    );
}

/// Render a run as pretty-printed JSON.
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
pub fn render_json(summary: &RunSummary) -> Result<String, Error> {
    let report = JsonReport {
        files_total: summary.files_total(),
        files_updated: summary.files_updated(),
        links_changed: summary.links_changed(),
        run: summary,
    };
    return Ok(serde_json::to_string_pretty(&report)?);
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
    use crate::types::{ChangeRecord, Mode, RenameResult, RuleKind, SuggestedRename};

    fn file(path: &str, links: usize, changes: Vec<ChangeRecord>) -> FileChangeReport {
        let mut report = FileChangeReport::new(PathBuf::from(path));
        report.links_found = links;
        report.changed_count = changes.len();
        report.changes = changes;
        return report;
    }

    fn sample() -> RunSummary {
        let files = vec![
            file("README.md", 0, vec![]),
            file(
                "docs/core/concept-identity.md",
                2,
                vec![ChangeRecord {
                    after: "../concepts/identity-addressing.md".to_string(),
                    before: "/docs/concepts/identity-addressing.md".to_string(),
                    context: "See [it](/docs/concepts/identity-addressing.md).".to_string(),
                    line: 3,
                    rule: RuleKind::AbsoluteToRelative,
                }],
            ),
            file("docs/core/other.md", 1, vec![]),
        ];
        return RunSummary {
            directories: summarize_directories(&files),
            failures: vec![],
            files,
            mode: Mode::DryRun,
            renames: vec![RenameResult {
                outcome: RenameOutcome::Planned,
                rename: SuggestedRename {
                    new_path: "docs/folders.md".into(),
                    old_path: "docs/FOLDERS.md".into(),
                },
            }],
            root: PathBuf::from("."),
        };
    }

    #[test]
    fn directories_are_tallied_in_order() {
        let dirs = sample().directories;
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs[0].dir_path, PathBuf::new());
        assert_eq!((dirs[0].files_updated, dirs[0].files_total), (0, 1));
        assert_eq!(dirs[1].dir_path, PathBuf::from("docs/core"));
        assert_eq!((dirs[1].files_updated, dirs[1].files_total), (1, 2));
    }

    #[test]
    fn markdown_report_lists_changes_and_summaries() {
        let md = render_markdown(&sample());
        assert!(md.contains("- Mode: dry run"));
        assert!(md.contains("## Directory: `.`"));
        assert!(md.contains("- `README.md`: No links found"));
        assert!(md.contains("## Directory: `docs/core`"));
        assert!(md.contains(
            "  - line 3, absolute to relative: `/docs/concepts/identity-addressing.md` -> `../concepts/identity-addressing.md`"
        ));
        assert!(md.contains("Directory Summary: 1 of 2 files updated"));
        assert!(md.contains("- `docs/FOLDERS.md` -> `docs/folders.md` (planned)"));
        assert!(md.contains("- Links changed: 1"));
        assert!(!md.contains("//"));
    }

    #[test]
    fn json_report_includes_totals() {
        let json = render_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["files_total"], 3);
        assert_eq!(value["files_updated"], 1);
        assert_eq!(value["mode"], "dry-run");
        assert_eq!(value["files"][1]["changes"][0]["rule"], "absolute-to-relative");
    }
}
