//! Per-document link normalization: scan, apply the rules in order, rebuild.

use std::path::Path;

use crate::config::Config;
use crate::rules::{self, TargetClass};
use crate::scanner;
use crate::types::{ChangeRecord, FileChangeReport, LinkOccurrence, Mode, RuleKind, SuggestedRename};
use crate::walker::{self, TreeIndex};

/// Shared read-only inputs for normalizing any document in one tree.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Rename table, site root and asset extensions.
    pub config: &'a Config,
    /// Files and directories known to exist in the tree.
    pub index: &'a TreeIndex,
}

/// Result of normalizing one document.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Mode the document was normalized under.
    pub mode: Mode,
    /// What changed.
    pub report: FileChangeReport,
    /// File renames requested by case normalization, deduplicated and sorted.
    pub suggested_renames: Vec<SuggestedRename>,
    /// The rewritten document; identical to the input when nothing changed.
    pub text: String,
}

impl Normalized {
    /// Whether the caller should write `text` back to disk.
    pub fn should_write(&self) -> bool {
        return self.mode == Mode::Apply && self.report.is_changed();
    }
}

/// A link target after all rules ran.
struct Rewritten {
    /// One record per rule that fired, in rule order.
    changes: Vec<ChangeRecord>,
    /// File rename the case rule asked for, unless a known rename won.
    rename: Option<SuggestedRename>,
    /// Final target.
    target: String,
}

/// Normalize every link target in one markdown document.
///
/// `document_path` is relative to the tree root. The rewritten text is the
/// same whatever the mode; only [`Normalized::should_write`] differs. The
/// function never fails: anything it cannot make sense of is left as it is.
pub fn normalize(document_path: &Path, text: &str, ctx: &NormalizeContext<'_>, mode: Mode) -> Normalized {
    let mut report = FileChangeReport::new(document_path.to_path_buf());
    let links = scanner::extract_links(text);
    report.links_found = links.len();

    let doc_dir = document_path.parent().map(walker::path_segments).unwrap_or_default();
    let site_root = walker::path_segments(&ctx.config.site_root);
    let prefer_dot = uses_dot_relative_style(&links);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0_usize;
    let mut renames = Vec::new();

    for link in &links {
        let rewritten = rewrite_target(link, &doc_dir, &site_root, prefer_dot, ctx);
        if rewritten.target == link.target {
            continue;
        }

        out.push_str(text.get(cursor..link.target_span.start).unwrap_or(""));
        out.push_str(&rewritten.target);
        cursor = link.target_span.end;

        tracing::debug!(
            file = %document_path.display(),
            line = link.line,
            link = %link.raw_text,
            text = %link.link_text,
            before = %link.target,
            after = %rewritten.target,
            "rewrote link"
        );
        report.changed_count = report.changed_count.saturating_add(1);
        report.changes.extend(rewritten.changes);
        renames.extend(rewritten.rename);
    }
    out.push_str(text.get(cursor..).unwrap_or(""));

    renames.sort();
    renames.dedup();

    return Normalized {
        mode,
        report,
        suggested_renames: renames,
        text: out,
    };
}

/// Run the four rules over one target, each consuming the previous output.
fn rewrite_target(
    link: &LinkOccurrence,
    doc_dir: &[String],
    site_root: &[String],
    prefer_dot: bool,
    ctx: &NormalizeContext<'_>,
) -> Rewritten {
    let original = link.target.as_str();
    let mut target = original.to_string();
    let mut changes = Vec::new();
    let mut rename = None;

    let mut record = |rule: RuleKind, before: &str, after: &str| {
        changes.push(ChangeRecord {
            after: after.to_string(),
            before: before.to_string(),
            context: link.line_context.clone(),
            line: link.line,
            rule,
        });
    };

    if let Some(next) = rules::absolute_to_relative(&target, doc_dir, site_root, prefer_dot) {
        record(RuleKind::AbsoluteToRelative, &target, &next);
        target = next;
    }

    if let Some(next) = rules::complete_extension(&target, doc_dir, ctx.index, &ctx.config.asset_extensions) {
        record(RuleKind::ExtensionCompletion, &target, &next);
        target = next;
    }

    if let Some(recased) = rules::normalize_case(&target, doc_dir, ctx.index) {
        record(RuleKind::CaseNormalization, &target, &recased.target);
        target = recased.target;
        rename = recased.rename;
    }

    if let Some(next) = rules::known_rename(&target, original, &ctx.config.renames) {
        record(RuleKind::KnownRename, &target, &next);
        target = next;
        rename = None;
    }

    return Rewritten { changes, rename, target };
}

/// Whether the document already writes same-directory links as `./name`.
fn uses_dot_relative_style(links: &[LinkOccurrence]) -> bool {
    return links
        .iter()
        .any(|l| return rules::classify(&l.target) == TargetClass::Relative && l.target.starts_with("./"));
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    reason = "tests"
)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::*;

    fn run(path: &str, text: &str, config: &Config, index: &TreeIndex) -> Normalized {
        let ctx = NormalizeContext { config, index };
        return normalize(Path::new(path), text, &ctx, Mode::Apply);
    }

    fn run_default(path: &str, text: &str) -> Normalized {
        return run(path, text, &Config::default(), &TreeIndex::default());
    }

    #[test]
    fn absolute_link_becomes_relative() {
        let out = run_default(
            "docs/core/concept-identity.md",
            "See [Identity Addressing](/docs/concepts/identity-addressing.md).\n",
        );
        assert_eq!(out.text, "See [Identity Addressing](../concepts/identity-addressing.md).\n");
        assert_eq!(out.report.changed_count, 1);
        assert_eq!(out.report.changes[0].rule, RuleKind::AbsoluteToRelative);
    }

    #[test]
    fn rules_chain_in_order() {
        let out = run_default("docs/core/a.md", "[Folders](/docs/guides/FolderStructure)\n");
        assert_eq!(out.text, "[Folders](../guides/folder-structure.md)\n");
        let kinds: Vec<RuleKind> = out.report.changes.iter().map(|c| return c.rule).collect();
        assert_eq!(
            kinds,
            vec![RuleKind::AbsoluteToRelative, RuleKind::ExtensionCompletion, RuleKind::CaseNormalization]
        );
        assert_eq!(out.report.changed_count, 1);
    }

    #[test]
    fn extension_completion_and_external_links() {
        let text = "[todos](../tools/extract-todos.sh) and [site](https://example.com/page)";
        let out = run_default("docs/core/a.md", text);
        assert_eq!(out.text, "[todos](../tools/extract-todos.sh.md) and [site](https://example.com/page)");
    }

    #[test]
    fn case_normalization_examples() {
        let text = "[a](FOLDERS.md) [b](README.md) [c](already-kebab-case.md)";
        let out = run_default("docs/a.md", text);
        assert_eq!(out.text, "[a](folders.md) [b](readme.md) [c](already-kebab-case.md)");
        assert_eq!(out.report.changed_count, 2);
    }

    #[test]
    fn case_normalization_suggests_renames_once() {
        let mut index = TreeIndex::default();
        index.insert_document("docs/FOLDERS.md".to_owned());
        index.insert_document("docs/a.md".to_owned());
        let out = run("docs/a.md", "[a](FOLDERS.md) and [again](./FOLDERS.md#top)", &Config::default(), &index);
        assert_eq!(out.text, "[a](folders.md) and [again](./folders.md#top)");
        assert_eq!(
            out.suggested_renames,
            vec![SuggestedRename {
                new_path: "docs/folders.md".into(),
                old_path: "docs/FOLDERS.md".into(),
            }]
        );
    }

    #[test]
    fn links_to_files_that_stay_put_keep_their_case() {
        let mut index = TreeIndex::from_files(["docs/archive/OldPlan.md".to_owned()]);
        index.insert_document("docs/Guide.md".to_owned());
        index.pin("docs/Guide.md");
        let text = "[p](archive/OldPlan.md) [g](Guide.md) [n](NewPage.md)";
        let out = run("docs/a.md", text, &Config::default(), &index);
        assert_eq!(out.text, "[p](archive/OldPlan.md) [g](Guide.md) [n](new-page.md)");
        assert!(out.suggested_renames.is_empty());
    }

    #[test]
    fn rename_table_replaces_target_and_keeps_text() {
        let mut config = Config::default();
        config.renames = BTreeMap::from([("/docs/old-guide".to_string(), "../guides/new-guide.md".to_string())]);
        let out = run("docs/core/a.md", "[The *Old* Guide](/docs/old-guide \"title\")", &config, &TreeIndex::default());
        assert_eq!(out.text, "[The *Old* Guide](../guides/new-guide.md \"title\")");
        assert_eq!(out.report.changes.last().unwrap().rule, RuleKind::KnownRename);
    }

    #[test]
    fn code_is_never_touched() {
        let text = "Inline `[a](/docs/b)` stays.\n\n```\n[c](/docs/d)\n```\n";
        let out = run_default("docs/x.md", text);
        assert_eq!(out.text, text);
        assert!(out.report.changes.is_empty());
        assert_eq!(out.report.links_found, 0);
    }

    #[test]
    fn document_without_links_is_unchanged() {
        let text = "# Title\n\nNo links here, just (parens) and [brackets].\n";
        let out = run_default("docs/x.md", text);
        assert_eq!(out.text, text);
        assert!(!out.report.is_changed());
        assert!(!out.should_write());
    }

    #[test]
    fn same_directory_style_follows_document() {
        let bare = run_default("docs/core/a.md", "[b](/docs/core/b.md) [c](c.md)");
        assert_eq!(bare.text, "[b](b.md) [c](c.md)");

        let dotted = run_default("docs/core/a.md", "[b](/docs/core/b.md) [c](./c.md)");
        assert_eq!(dotted.text, "[b](./b.md) [c](./c.md)");
    }

    #[test]
    fn escaping_target_is_left_alone() {
        let text = "[out](/../elsewhere/x) [up](../../../x)";
        let out = run_default("docs/a.md", text);
        assert_eq!(out.text, text);
    }

    #[test]
    fn crlf_line_endings_survive() {
        let text = "[a](/docs/b.md)\r\n[c](d)\r\n";
        let out = run_default("docs/x/y.md", text);
        assert_eq!(out.text, "[a](../b.md)\r\n[c](d.md)\r\n");
    }

    #[test]
    fn dry_run_only_changes_write_decision() {
        let ctx_config = Config::default();
        let index = TreeIndex::default();
        let ctx = NormalizeContext { config: &ctx_config, index: &index };
        let text = "[a](/docs/B)";
        let apply = normalize(Path::new("docs/x.md"), text, &ctx, Mode::Apply);
        let dry = normalize(Path::new("docs/x.md"), text, &ctx, Mode::DryRun);
        assert_eq!(apply.text, dry.text);
        assert!(apply.should_write());
        assert!(!dry.should_write());
    }

    fn document_strategy() -> impl Strategy<Value = String> {
        let target = prop_oneof![
            Just("/docs/concepts/Identity".to_string()),
            Just("/docs/a/b/".to_string()),
            Just("/../x".to_string()),
            Just("../tools/extract-todos.sh".to_string()),
            Just("https://example.com/Page".to_string()),
            Just("#Anchor".to_string()),
            Just("FOLDERS.md".to_string()),
            Just("./README#intro".to_string()),
            Just("img/Diagram.PNG".to_string()),
            "[a-zA-Z./]{0,12}",
        ];
        let piece = prop_oneof![
            target.prop_map(|t| return format!("[link]({t})")),
            Just("`[code](/docs/c)`".to_string()),
            Just("\n```\n[f](/docs/f)\n```\n".to_string()),
            "[ a-z\n]{0,10}",
        ];
        return prop::collection::vec(piece, 0..8).prop_map(|parts| return parts.concat());
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(doc in document_strategy()) {
            let first = run_default("docs/core/page.md", &doc);
            let second = run_default("docs/core/page.md", &first.text);
            prop_assert_eq!(&second.text, &first.text);
            prop_assert!(second.report.changes.is_empty());
        }

        #[test]
        fn dry_run_matches_apply(doc in document_strategy()) {
            let config = Config::default();
            let index = TreeIndex::default();
            let ctx = NormalizeContext { config: &config, index: &index };
            let apply = normalize(Path::new("docs/page.md"), &doc, &ctx, Mode::Apply);
            let dry = normalize(Path::new("docs/page.md"), &doc, &ctx, Mode::DryRun);
            prop_assert_eq!(apply.text, dry.text);
        }
    }
}
