//! The four target rewrite rules and the path arithmetic they share.
//!
//! Targets are handled as `/`-separated strings, never as `std::path`
//! values, so rewritten links look the same on every platform.

use std::collections::BTreeMap;

use crate::case;
use crate::types::SuggestedRename;
use crate::walker::TreeIndex;

/// Where a target sits, decided once before any rule runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClass {
    /// Has a scheme (`https:`, `mailto:`) or is protocol-relative (`//host`).
    External,
    /// Everything else: a path relative to the linking document.
    Relative,
    /// Starts with a single `/`.
    RootRelative,
    /// Empty, or only a `#fragment` / `?query`.
    SelfReference,
}

/// Output of rule 3: the new target and, when the linked file is a processed
/// document, the rename that keeps it in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRewrite {
    /// Rename for the on-disk file, if it is one of the processed documents.
    pub rename: Option<SuggestedRename>,
    /// Rewritten target.
    pub target: String,
}

/// Classify a raw link target.
pub fn classify(target: &str) -> TargetClass {
    if target.starts_with("//") || has_scheme(target) {
        return TargetClass::External;
    }
    if target.is_empty() || target.starts_with('#') || target.starts_with('?') {
        return TargetClass::SelfReference;
    }
    if target.starts_with('/') {
        return TargetClass::RootRelative;
    }
    return TargetClass::Relative;
}

/// Whether the target begins with a URI scheme such as `https:`.
fn has_scheme(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| return c.is_ascii_alphabetic());
    return starts_alpha && chars.all(|c| return c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
}

/// Split a target into its path and the `?query`/`#fragment` suffix.
pub fn split_suffix(target: &str) -> (&str, &str) {
    let cut = target.find(['?', '#']).unwrap_or(target.len());
    return target.split_at(cut);
}

/// Resolve `path` segment by segment on top of `base`.
/// Returns `None` when `..` would climb above the tree root.
pub fn resolve_segments(base: &[String], path: &str) -> Option<Vec<String>> {
    let mut out = base.to_vec();
    for seg in path.split('/') {
        match seg {
            "" | "." => {},
            ".." => {
                out.pop()?;
            },
            other => out.push(other.to_string()),
        }
    }
    return Some(out);
}

/// Whether a resolved path passes through a hidden entry such as `.github`.
/// The walk never indexes those, so rules 2 and 3 cannot tell what exists there.
fn is_hidden_path(resolved: &[String]) -> bool {
    return resolved.iter().any(|seg| return seg.starts_with('.'));
}

/// Shortest relative path from directory `from` to `to`.
/// Returns the number of `../` hops and the remaining path.
fn relative_segments(from: &[String], to: &[String]) -> (usize, String) {
    let common = from.iter().zip(to).take_while(|(a, b)| return a == b).count();
    let ups = from.len().saturating_sub(common);
    let rest = to.get(common..).unwrap_or(&[]).join("/");
    return (ups, rest);
}

/// Rule 1: rewrite a root-relative target relative to the document directory.
///
/// `site_root` is the directory, as segments under the tree root, that `/`
/// maps to. When the result stays in the document's own directory it gets a
/// `./` prefix only if `prefer_dot` says the document already writes links
/// that way. Targets climbing out of the tree are left alone.
pub fn absolute_to_relative(
    target: &str,
    doc_dir: &[String],
    site_root: &[String],
    prefer_dot: bool,
) -> Option<String> {
    if classify(target) != TargetClass::RootRelative {
        return None;
    }
    let (path, suffix) = split_suffix(target);
    let resolved = resolve_segments(site_root, path)?;
    let (ups, rest) = relative_segments(doc_dir, &resolved);

    let mut out = "../".repeat(ups);
    if ups == 0 && (prefer_dot || rest.is_empty()) {
        out.push_str("./");
    }
    out.push_str(&rest);
    if path.ends_with('/') && !out.ends_with('/') {
        out.push('/');
    }

    out.push_str(suffix);
    return Some(out);
}

/// Final path segment and its extension, if the segment has one.
/// A leading dot (`.gitignore`) is not an extension separator.
fn file_name_parts(path: &str) -> (&str, Option<&str>) {
    let name = path.rsplit('/').next().unwrap_or(path);
    return match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(i) => (name, name.get(i.saturating_add(1)..)),
    };
}

/// Whether a relative path names a document that lacks `.md`.
/// Directories (`dir/`, `.`, `..`) and known asset extensions never qualify.
pub fn lacks_md_extension(path: &str, asset_extensions: &[String]) -> bool {
    if path.is_empty() || path.ends_with('/') {
        return false;
    }
    let (name, ext) = file_name_parts(path);
    if name == "." || name == ".." {
        return false;
    }
    return ext.is_none_or(|ext| {
        let lower = ext.to_ascii_lowercase();
        return lower != "md" && !asset_extensions.contains(&lower);
    });
}

/// Rule 2: append `.md` to a local document reference.
/// Skipped when the target already exists under that exact name in the tree,
/// so real extensionless files like `LICENSE` keep working, and for targets
/// inside hidden directories.
pub fn complete_extension(
    target: &str,
    doc_dir: &[String],
    index: &TreeIndex,
    asset_extensions: &[String],
) -> Option<String> {
    if classify(target) != TargetClass::Relative {
        return None;
    }
    let (path, suffix) = split_suffix(target);
    if !lacks_md_extension(path, asset_extensions) {
        return None;
    }
    let resolved = resolve_segments(doc_dir, path)?;
    if is_hidden_path(&resolved) || index.contains(&resolved.join("/")) {
        return None;
    }
    return Some(format!("{path}.md{suffix}"));
}

/// Kebab-case replacement for a markdown file name, if it needs one.
pub fn kebab_file_name(path: &str) -> Option<String> {
    let (name, ext) = file_name_parts(path);
    let ext = ext?;
    if !ext.eq_ignore_ascii_case("md") {
        return None;
    }
    let stem = name.get(..name.len().saturating_sub(ext.len()).saturating_sub(1))?;
    if !case::needs_kebab(stem) && ext == "md" {
        return None;
    }
    return Some(format!("{}.md", case::to_kebab(stem)));
}

/// Rule 3: convert a PascalCase, camelCase or all-caps markdown filename to
/// kebab-case. Only the final segment changes; directories are left as they are.
///
/// A link and its file always move together. When the target is a processed
/// document the rewrite comes with a rename. When it names a file that exists
/// but may not be renamed (excluded, pinned, or under a hidden directory) the
/// link is left alone. Targets that name no file at all are rewritten.
pub fn normalize_case(target: &str, doc_dir: &[String], index: &TreeIndex) -> Option<CaseRewrite> {
    if classify(target) != TargetClass::Relative {
        return None;
    }
    let (path, suffix) = split_suffix(target);
    let new_name = kebab_file_name(path)?;
    let resolved = resolve_segments(doc_dir, path)?;
    if is_hidden_path(&resolved) {
        return None;
    }

    let old_disk = resolved.join("/");
    let rename = if index.is_renamable(&old_disk) {
        let mut new_disk = resolved.clone();
        new_disk.pop();
        new_disk.push(new_name.clone());
        Some(SuggestedRename {
            new_path: new_disk.join("/").into(),
            old_path: old_disk.into(),
        })
    } else if index.contains_file(&old_disk) {
        return None;
    } else {
        None
    };

    let new_path = match path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{new_name}"),
        None => new_name,
    };
    return Some(CaseRewrite {
        rename,
        target: format!("{new_path}{suffix}"),
    });
}

/// Rule 4: substitute a known historical target. The table is consulted with
/// the target as the earlier rules left it, then with the link's original target.
pub fn known_rename(current: &str, original: &str, renames: &BTreeMap<String, String>) -> Option<String> {
    let replacement = renames.get(current).or_else(|| return renames.get(original))?;
    if replacement == current {
        return None;
    }
    return Some(replacement.clone());
}

/// Why a rename-table value would be rewritten again on a later run, if it would.
pub fn unstable_replacement_reason(replacement: &str, asset_extensions: &[String]) -> Option<&'static str> {
    match classify(replacement) {
        TargetClass::RootRelative => return Some("replacement is root-relative"),
        TargetClass::Relative => {},
        TargetClass::External | TargetClass::SelfReference => return None,
    }
    let (path, _) = split_suffix(replacement);
    if lacks_md_extension(path, asset_extensions) {
        return Some("replacement lacks a .md extension");
    }
    if kebab_file_name(path).is_some() {
        return Some("replacement file name is not kebab-case");
    }
    return None;
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

    fn segs(path: &str) -> Vec<String> {
        return path.split('/').filter(|s| return !s.is_empty()).map(String::from).collect();
    }

    fn assets() -> Vec<String> {
        return vec!["png".to_string(), "svg".to_string()];
    }

    #[test]
    fn classifies_targets() {
        assert_eq!(classify("https://example.com/page"), TargetClass::External);
        assert_eq!(classify("mailto:a@b.c"), TargetClass::External);
        assert_eq!(classify("//cdn.example.com/x"), TargetClass::External);
        assert_eq!(classify("#section"), TargetClass::SelfReference);
        assert_eq!(classify(""), TargetClass::SelfReference);
        assert_eq!(classify("/docs/a.md"), TargetClass::RootRelative);
        assert_eq!(classify("../a.md"), TargetClass::Relative);
        assert_eq!(classify("a:b/c.md"), TargetClass::External);
        assert_eq!(classify("./dir:x/a.md"), TargetClass::Relative);
    }

    #[test]
    fn absolute_becomes_minimal_relative() {
        let out = absolute_to_relative("/docs/concepts/identity-addressing.md", &segs("docs/core"), &[], false);
        assert_eq!(out.as_deref(), Some("../concepts/identity-addressing.md"));
    }

    #[test]
    fn absolute_keeps_fragment_and_trailing_slash() {
        let dir = segs("docs/core");
        assert_eq!(
            absolute_to_relative("/docs/concepts/a.md#intro", &dir, &[], false).as_deref(),
            Some("../concepts/a.md#intro")
        );
        assert_eq!(absolute_to_relative("/docs/concepts/", &dir, &[], false).as_deref(), Some("../concepts/"));
    }

    #[test]
    fn same_directory_follows_document_style() {
        let dir = segs("docs/core");
        assert_eq!(absolute_to_relative("/docs/core/b.md", &dir, &[], false).as_deref(), Some("b.md"));
        assert_eq!(absolute_to_relative("/docs/core/b.md", &dir, &[], true).as_deref(), Some("./b.md"));
        assert_eq!(absolute_to_relative("/docs/core/", &dir, &[], false).as_deref(), Some("./"));
    }

    #[test]
    fn site_root_prefixes_root_relative_targets() {
        let out = absolute_to_relative("/concepts/a.md", &segs("docs/core"), &segs("docs"), false);
        assert_eq!(out.as_deref(), Some("../concepts/a.md"));
    }

    #[test]
    fn escaping_absolute_target_is_skipped() {
        assert_eq!(absolute_to_relative("/../outside.md", &segs("docs"), &[], false), None);
    }

    #[test]
    fn extension_completion_rules() {
        let index = TreeIndex::default();
        let dir = segs("docs/core");
        let assets = assets();
        assert_eq!(
            complete_extension("../tools/extract-todos.sh", &dir, &index, &assets).as_deref(),
            Some("../tools/extract-todos.sh.md")
        );
        assert_eq!(complete_extension("persistence", &dir, &index, &assets).as_deref(), Some("persistence.md"));
        assert_eq!(complete_extension("guide#setup", &dir, &index, &assets).as_deref(), Some("guide.md#setup"));
        assert_eq!(complete_extension("https://example.com/page", &dir, &index, &assets), None);
        assert_eq!(complete_extension("#top", &dir, &index, &assets), None);
        assert_eq!(complete_extension("diagram.PNG", &dir, &index, &assets), None);
        assert_eq!(complete_extension("guide.md", &dir, &index, &assets), None);
        assert_eq!(complete_extension("../concepts/", &dir, &index, &assets), None);
        assert_eq!(complete_extension("..", &dir, &index, &assets), None);
        assert_eq!(complete_extension("../../../x", &dir, &index, &assets), None);
    }

    #[test]
    fn extension_completion_respects_existing_files() {
        let index = TreeIndex::from_files(["LICENSE".to_string(), "docs/tools/run.sh".to_string()]);
        let dir = segs("docs/core");
        let assets = assets();
        assert_eq!(complete_extension("../../LICENSE", &dir, &index, &assets), None);
        assert_eq!(complete_extension("../tools/run.sh", &dir, &index, &assets), None);
        assert_eq!(complete_extension("../tools", &dir, &index, &assets), None);
    }

    #[test]
    fn case_normalization_rewrites_file_name_only() {
        let index = TreeIndex::default();
        let dir = segs("docs");
        let cases = [
            ("FOLDERS.md", Some("folders.md")),
            ("README.md", Some("readme.md")),
            ("Guides/FolderStructure.md#top", Some("Guides/folder-structure.md#top")),
            ("../KANBAN.MD", Some("../kanban.md")),
            ("already-kebab-case.md", None),
            ("Diagram.png", None),
        ];
        for (input, expected) in cases {
            let out = normalize_case(input, &dir, &index).map(|r| return r.target);
            assert_eq!(out.as_deref(), expected, "{input}");
        }
    }

    #[test]
    fn case_normalization_suggests_rename_for_documents() {
        let mut index = TreeIndex::default();
        index.insert_document("docs/FOLDERS.md".to_owned());
        let out = normalize_case("./FOLDERS.md", &segs("docs"), &index).unwrap();
        assert_eq!(out.target, "./folders.md");
        assert_eq!(
            out.rename,
            Some(SuggestedRename {
                new_path: "docs/folders.md".into(),
                old_path: "docs/FOLDERS.md".into(),
            })
        );
    }

    #[test]
    fn files_that_cannot_move_keep_their_links() {
        let index = TreeIndex::from_files(["docs/archive/OldPlan.md".to_owned()]);
        assert_eq!(normalize_case("archive/OldPlan.md", &segs("docs"), &index), None);
    }

    #[test]
    fn hidden_directories_are_left_alone() {
        let index = TreeIndex::default();
        let assets = assets();
        assert_eq!(normalize_case(".github/CONTRIBUTING.md", &[], &index), None);
        assert_eq!(normalize_case("../.github/CONTRIBUTING.md#setup", &segs("docs"), &index), None);
        assert_eq!(complete_extension(".github/workflows", &[], &index, &assets), None);
        assert_eq!(complete_extension(".env", &[], &index, &assets), None);
    }

    #[test]
    fn known_rename_checks_current_then_original() {
        let mut table = BTreeMap::new();
        table.insert("/docs/old-name".to_string(), "../guides/new-name.md".to_string());
        assert_eq!(
            known_rename("../old-name.md", "/docs/old-name", &table).as_deref(),
            Some("../guides/new-name.md")
        );
        assert_eq!(known_rename("../guides/new-name.md", "../guides/new-name.md", &table), None);
    }

    #[test]
    fn replacement_stability() {
        let assets = assets();
        assert_eq!(unstable_replacement_reason("../guides/new.md", &assets), None);
        assert_eq!(unstable_replacement_reason("https://example.com/x", &assets), None);
        assert!(unstable_replacement_reason("/docs/new.md", &assets).is_some());
        assert!(unstable_replacement_reason("../guides/new", &assets).is_some());
        assert!(unstable_replacement_reason("../guides/NewName.md", &assets).is_some());
    }
}
