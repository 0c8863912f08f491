//! Core domain types for link occurrences, rewrite records, and run summaries.

use std::ops::Range;
use std::path::PathBuf;

use serde::Serialize;

/// Parsed from markdown link syntax by the scanner.
#[derive(Debug, Clone)]
pub struct LinkOccurrence {
    /// One-based line number of the link in the document.
    pub line: u32,
    /// Full text of the line containing the link, without the line terminator.
    pub line_context: String,
    /// Display text between the brackets.
    pub link_text: String,
    /// Exact substring matched, e.g. `[Guide](/docs/guide.md)`.
    pub raw_text: String,
    /// URL or path inside the parentheses.
    pub target: String,
    /// Byte range of `target` within the document.
    pub target_span: Range<usize>,
}

/// Whether a run writes its results or only reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Write rewritten files and perform suggested renames.
    Apply,
    /// Compute everything, write nothing.
    DryRun,
}

impl Mode {
    /// Label used in report headers.
    pub const fn label(self) -> &'static str {
        return match self {
            Mode::Apply => "apply",
            Mode::DryRun => "dry run",
        };
    }
}

/// The rewrite rules. Every target goes through them in this order:
/// absolute to relative, extension completion, case normalization, known rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    /// Root-relative target rewritten relative to the linking document.
    AbsoluteToRelative,
    /// PascalCase, camelCase or all-caps filename converted to kebab-case.
    CaseNormalization,
    /// Missing `.md` appended to a local document reference.
    ExtensionCompletion,
    /// Target replaced from the configured rename table.
    KnownRename,
}

impl RuleKind {
    /// Short human label used in rendered reports.
    pub const fn label(self) -> &'static str {
        return match self {
            RuleKind::AbsoluteToRelative => "absolute to relative",
            RuleKind::CaseNormalization => "kebab-case filename",
            RuleKind::ExtensionCompletion => "added .md extension",
            RuleKind::KnownRename => "known rename",
        };
    }
}

/// One applied rule instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    /// Target after the rule.
    pub after: String,
    /// Target before the rule.
    pub before: String,
    /// The line the link sits on, as it read before the run.
    pub context: String,
    /// One-based line number of the link.
    pub line: u32,
    /// Which rule produced the change.
    pub rule: RuleKind,
}

/// All changes made to one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileChangeReport {
    /// Number of links whose target changed (a link counts once, however many rules fired).
    pub changed_count: usize,
    /// Every rule application, in document order.
    pub changes: Vec<ChangeRecord>,
    /// Document path relative to the tree root.
    pub file_path: PathBuf,
    /// Number of links found in the document.
    pub links_found: usize,
}

impl FileChangeReport {
    /// Empty report for a document.
    pub fn new(file_path: PathBuf) -> Self {
        return Self {
            changed_count: 0,
            changes: Vec::new(),
            file_path,
            links_found: 0,
        };
    }

    /// Whether any link in the document was rewritten.
    pub const fn is_changed(&self) -> bool {
        return self.changed_count > 0;
    }
}

/// A filesystem rename requested by case normalization.
/// Paths are relative to the tree root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SuggestedRename {
    /// Kebab-case destination.
    pub new_path: PathBuf,
    /// Existing file whose name is not kebab-case.
    pub old_path: PathBuf,
}

/// Per-directory tally of updated documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectorySummary {
    /// Directory relative to the tree root; empty for the root itself.
    pub dir_path: PathBuf,
    /// Markdown documents in the directory.
    pub files_total: usize,
    /// Documents with at least one rewritten link.
    pub files_updated: usize,
}

/// Outcome of a rename request after the writer ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenameOutcome {
    /// Source already gone or destination already holds the same content.
    AlreadyDone,
    /// Checked and ready to run; a dry run stops here.
    Planned,
    /// The file was moved.
    Renamed,
}

/// A rename together with what happened to it.
#[derive(Debug, Clone, Serialize)]
pub struct RenameResult {
    /// What the writer did.
    pub outcome: RenameOutcome,
    /// The requested rename.
    pub rename: SuggestedRename,
}

/// A recoverable failure that did not stop the run.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    /// File the failure relates to, relative to the tree root.
    pub path: PathBuf,
    /// Rendered error message.
    pub reason: String,
}

/// Everything a run produced, consumed by the report renderer.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Per-directory tallies, sorted by directory.
    pub directories: Vec<DirectorySummary>,
    /// Recoverable failures.
    pub failures: Vec<Failure>,
    /// Per-file reports for every processed document, in walk order.
    pub files: Vec<FileChangeReport>,
    /// Whether files were written.
    pub mode: Mode,
    /// Requested renames and their outcomes.
    pub renames: Vec<RenameResult>,
    /// Tree root as given on the command line.
    pub root: PathBuf,
}

impl RunSummary {
    /// Number of documents processed.
    pub fn files_total(&self) -> usize {
        return self.files.len();
    }

    /// Number of documents with at least one rewritten link.
    pub fn files_updated(&self) -> usize {
        return self.files.iter().filter(|f| return f.is_changed()).count();
    }

    /// Renames that still have to be carried out.
    pub fn renames_pending(&self) -> usize {
        return self
            .renames
            .iter()
            .filter(|r| return r.outcome == RenameOutcome::Planned)
            .count();
    }

    /// Total rewritten links across all documents.
    pub fn links_changed(&self) -> usize {
        return self.files.iter().map(|f| return f.changed_count).sum();
    }
}
