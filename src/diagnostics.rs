//! Fatal errors rendered as markdown blocks for stderr.

use std::path::Path;

use crate::error::Error;

/// Bold on.
const BOLD: &str = "\x1b[1m";
/// Attributes off.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is one,
/// how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::RootNotFound { path } => render_root_not_found(path),
        Error::NotADirectory { path } => render_not_a_directory(path),
        Error::InvalidRename { from, to, reason } => render_invalid_rename(from, to, reason),
        Error::UnknownRename { from } => render_unknown_rename(from),
        Error::RenameConflict { from, to } => render_rename_conflict(from, to),
        _ => render_generic(e),
    };
}

/// Variants with no fix to suggest: a heading and the underlying message.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::ConfigInvalid { path, reason } => format!("\
# Error: Invalid Config

{reason}

## Fix

Edit `{}`.
", path.display()),

        Error::ParseFailed { file, reason } => format!("\
# Error: Parse Failed

Could not parse `{}`: {reason}
", file.display()),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),
        Error::TomlDe(e) => format!("\
# Error: Invalid TOML in `.doclinks.toml`

{e}
"),
        Error::Json(e) => format!("\
# Error: JSON Serialization

{e}
"),
        Error::Watch(e) => format!("\
# Error: Watch Failed

{e}
"),
        // Already handled in render_error, but need exhaustive match.
        _ => format!("\
# Error

{e}
"),
    };
}

/// The `--dir` root does not exist.
fn render_root_not_found(path: &Path) -> String {
    return format!("\
# Error: Root Not Found

`{}` does not exist.

## Fix

Pass the documentation root explicitly:

    doclinks --dir path/to/docs fix --dry-run
", path.display());
}

/// The `--dir` root is a file.
fn render_not_a_directory(path: &Path) -> String {
    return format!("\
# Error: Not A Directory

`{}` is a file. doclinks processes a whole tree; pass its root directory with `--dir`.
", path.display());
}

/// A rename value that would not survive a second run.
fn render_invalid_rename(from: &str, to: &str, reason: &str) -> String {
    return format!(
        "\
# Error: Invalid Rename

`{from}` -> `{to}`: {reason}.

Replacements are inserted verbatim and must already be normalized:
relative, ending in `.md`, with a kebab-case file name, and not
themselves listed as a rename.

## Fix

    doclinks renames remove \"{from}\"
"
    );
}

/// `renames remove` for a key that is not in the table.
fn render_unknown_rename(from: &str) -> String {
    return format!(
        "\
# Error: Unknown Rename

No rename is configured for `{from}`.

## Fix

List the configured renames:

    doclinks renames list
"
    );
}

/// A file rename whose destination holds different content.
fn render_rename_conflict(from: &Path, to: &Path) -> String {
    return format!(
        "\
# Error: Rename Conflict

Cannot rename `{}` to `{}`: the destination exists with different content.

## Fix

Merge the two files by hand, then run `doclinks fix` again.
",
        from.display(),
        to.display()
    );
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    reason = "tests"
)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn root_not_found_suggests_dir_flag() {
        let md = render_error(&Error::RootNotFound { path: PathBuf::from("docs") });
        assert!(md.starts_with("# Error: Root Not Found"));
        assert!(md.contains("--dir"));
    }

    #[test]
    fn invalid_rename_names_both_sides() {
        let md = render_error(&Error::InvalidRename {
            from: "/docs/old".to_string(),
            reason: "replacement is root-relative".to_string(),
            to: "/docs/new.md".to_string(),
        });
        assert!(md.contains("`/docs/old` -> `/docs/new.md`: replacement is root-relative."));
    }

    #[test]
    fn io_errors_fall_back_to_generic_block() {
        let md = render_error(&Error::Io(std::io::Error::other("disk gone")));
        assert!(md.starts_with("# Error: I/O"));
        assert!(md.contains("disk gone"));
    }
}
