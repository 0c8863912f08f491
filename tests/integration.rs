//! End-to-end runs of the `doclinks` binary over temporary trees.
#![allow(
    clippy::indexing_slicing,
    clippy::missing_assert_message,
    clippy::missing_docs_in_private_items,
    clippy::tests_outside_test_module,
    clippy::unwrap_used,
    reason = "integration tests"
)]

use std::path::Path;
use std::process::{Command, Output};

fn doclinks(root: &Path, args: &[&str]) -> Output {
    return Command::new(env!("CARGO_BIN_EXE_doclinks"))
        .arg("--dir")
        .arg(root)
        .args(args)
        .output()
        .unwrap();
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn docs_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "docs/core/concept-identity.md",
        "# Identity\n\n\
         See [Identity Addressing](/docs/concepts/identity-addressing) for details.\n\
         Folder layout lives in [folders](../FOLDERS.md).\n\
         External: [upstream](https://example.com/Upstream).\n\n\
         ```sh\n\
         cat [not a link](/docs/raw)\n\
         ```\n",
    );
    write(root, "docs/concepts/identity-addressing.md", "# Addressing\n");
    write(root, "docs/FOLDERS.md", "# Folders\n\nBack to [identity](core/concept-identity).\n");
    write(root, "LICENSE", "MIT\n");
    write(root, "README.md", "See [license](LICENSE) and [docs](/docs/FOLDERS.md).\n");
    return dir;
}

#[test]
fn dry_run_reports_without_writing() {
    let dir = docs_tree();
    let before = std::fs::read_to_string(dir.path().join("docs/core/concept-identity.md")).unwrap();

    let out = doclinks(dir.path(), &["fix", "--dry-run"]);
    assert!(out.status.success(), "fix --dry-run failed: {}", String::from_utf8_lossy(&out.stderr));

    let report = String::from_utf8_lossy(&out.stdout);
    assert!(report.contains("- Mode: dry run"));
    assert!(report.contains("`/docs/concepts/identity-addressing` -> `../concepts/identity-addressing`"));
    assert!(report.contains("`docs/FOLDERS.md` -> `docs/folders.md` (planned)"));

    let after = std::fs::read_to_string(dir.path().join("docs/core/concept-identity.md")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn fix_then_check_is_clean() {
    let dir = docs_tree();
    let root = dir.path();

    let check = doclinks(root, &["check"]);
    assert_eq!(check.status.code(), Some(1), "check should flag pending changes");

    let fix = doclinks(root, &["fix"]);
    assert!(fix.status.success(), "fix failed: {}", String::from_utf8_lossy(&fix.stderr));

    let identity = std::fs::read_to_string(root.join("docs/core/concept-identity.md")).unwrap();
    assert!(identity.contains("[Identity Addressing](../concepts/identity-addressing.md)"));
    assert!(identity.contains("[folders](../folders.md)"));
    assert!(identity.contains("[upstream](https://example.com/Upstream)"));
    assert!(identity.contains("cat [not a link](/docs/raw)"));

    let readme = std::fs::read_to_string(root.join("README.md")).unwrap();
    assert_eq!(readme, "See [license](LICENSE) and [docs](docs/folders.md).\n");

    let folders = std::fs::read_to_string(root.join("docs/folders.md")).unwrap();
    assert!(folders.contains("[identity](core/concept-identity.md)"));

    let check = doclinks(root, &["check"]);
    assert!(
        check.status.success(),
        "check after fix failed: {}",
        String::from_utf8_lossy(&check.stdout)
    );
}

#[test]
fn json_report_is_parseable() {
    let dir = docs_tree();
    let out = doclinks(dir.path(), &["fix", "--dry-run", "--format", "json"]);
    assert!(out.status.success());

    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value["mode"], "dry-run");
    assert_eq!(value["files_total"], 4);
    assert_eq!(value["files_updated"], 3);
}

#[test]
fn rename_table_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "docs/guide.md", "Read the [old page](/docs/legacy/setup).\n");

    let add = doclinks(root, &["renames", "add", "/docs/legacy/setup", "install.md"]);
    assert!(add.status.success(), "renames add failed: {}", String::from_utf8_lossy(&add.stderr));

    let list = doclinks(root, &["renames", "list"]);
    assert!(String::from_utf8_lossy(&list.stdout).contains("/docs/legacy/setup -> install.md"));

    let fix = doclinks(root, &["fix"]);
    assert!(fix.status.success());
    let guide = std::fs::read_to_string(root.join("docs/guide.md")).unwrap();
    assert_eq!(guide, "Read the [old page](install.md).\n");

    let bad = doclinks(root, &["renames", "add", "/docs/x", "/docs/y.md"]);
    assert!(!bad.status.success());
    assert!(String::from_utf8_lossy(&bad.stderr).contains("Invalid Rename"));
}

#[test]
fn missing_root_fails_with_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let out = doclinks(&dir.path().join("nope"), &["fix"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Root Not Found"));
}

#[test]
fn excluded_documents_keep_their_names() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, ".doclinks.toml", "exclude = [\"docs/archive/\"]\n");
    write(root, "docs/index.md", "See [old](archive/OldPlan.md) and [new](NewPage.md).\n");
    write(root, "docs/NewPage.md", "# New\n");
    write(root, "docs/archive/OldPlan.md", "# Old\n");

    let fix = doclinks(root, &["fix"]);
    assert!(fix.status.success(), "fix failed: {}", String::from_utf8_lossy(&fix.stderr));

    let index = std::fs::read_to_string(root.join("docs/index.md")).unwrap();
    assert_eq!(index, "See [old](archive/OldPlan.md) and [new](new-page.md).\n");
    assert!(root.join("docs/archive/OldPlan.md").is_file());
    assert!(root.join("docs/new-page.md").is_file());

    let check = doclinks(root, &["check"]);
    assert_eq!(check.status.code(), Some(0), "{}", String::from_utf8_lossy(&check.stdout));
}
