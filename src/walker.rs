//! Deterministic traversal of a documentation tree.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::Error;

/// Every file and directory under the tree root, as `/`-joined paths
/// relative to the root. Rules consult it to decide whether a link target
/// names something that really exists, and whether that file may be renamed.
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    /// Ancestor directories of every indexed file.
    dirs: HashSet<String>,
    /// Files in the processed document set. Only these are ever renamed.
    documents: HashSet<String>,
    /// Every indexed file, documents included.
    files: HashSet<String>,
}

impl TreeIndex {
    /// Build an index from root-relative file paths; parent directories are derived.
    pub fn from_files<I>(files: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut index = Self::default();
        for file in files {
            index.insert_file(file);
        }
        return index;
    }

    /// Whether `path` is a file or directory in the tree.
    pub fn contains(&self, path: &str) -> bool {
        return self.files.contains(path) || self.dirs.contains(path);
    }

    /// Whether `path` is a file in the tree.
    pub fn contains_file(&self, path: &str) -> bool {
        return self.files.contains(path);
    }

    /// Record a file and all of its ancestor directories.
    pub fn insert_file(&mut self, file: String) {
        let mut dir = file.as_str();
        while let Some((parent, _)) = dir.rsplit_once('/') {
            if !self.dirs.insert(parent.to_owned()) {
                break;
            }
            dir = parent;
        }
        self.files.insert(file);
    }

    /// Record a file that belongs to the processed document set.
    pub fn insert_document(&mut self, file: String) {
        self.documents.insert(file.clone());
        self.insert_file(file);
    }

    /// Whether `path` is a processed document that may be renamed.
    pub fn is_renamable(&self, path: &str) -> bool {
        return self.documents.contains(path);
    }

    /// Keep a document under its current name. Links to it are no longer
    /// re-cased, so they keep pointing at the file.
    pub fn pin(&mut self, path: &str) -> bool {
        return self.documents.remove(path);
    }
}

/// Result of walking a tree: the markdown documents to process and the index.
#[derive(Debug)]
pub struct Tree {
    /// Markdown documents, root-relative, in deterministic walk order.
    pub documents: Vec<PathBuf>,
    /// Index of every file under the root.
    pub index: TreeIndex,
}

/// Fail early when the tree root is missing or not a directory.
///
/// # Errors
///
/// Returns `Error::RootNotFound` or `Error::NotADirectory`.
pub fn ensure_root(root: &Path) -> Result<(), Error> {
    let meta = match std::fs::metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::RootNotFound { path: root.to_path_buf() });
        },
        Err(e) => return Err(Error::Io(e)),
    };
    if !meta.is_dir() {
        return Err(Error::NotADirectory { path: root.to_path_buf() });
    }
    return Ok(());
}

/// Walk `root`, collecting every file into the index and every markdown
/// file the config selects into the document list. Hidden entries (names
/// starting with `.`) are skipped; rules never rewrite targets that lead
/// into them. Entries that cannot be read are logged and skipped.
///
/// # Errors
///
/// Returns `Error::RootNotFound` or `Error::NotADirectory` for a bad root.
pub fn walk(root: &Path, config: &Config) -> Result<Tree, Error> {
    ensure_root(root)?;

    let mut documents = Vec::new();
    let mut index = TreeIndex::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| return e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            },
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let key = to_slash_path(relative);

        if is_markdown(relative) && config.should_scan(&key) {
            documents.push(relative.to_path_buf());
            index.insert_document(key);
        } else {
            index.insert_file(key);
        }
    }

    tracing::debug!(documents = documents.len(), files = index.files.len(), root = %root.display(), "walked tree");
    return Ok(Tree { documents, index });
}

/// Whether a walk entry is hidden.
fn is_hidden(entry: &DirEntry) -> bool {
    return entry.file_name().to_str().is_some_and(|name| return name.starts_with('.'));
}

/// Whether a path has a markdown extension, in any case.
pub fn is_markdown(path: &Path) -> bool {
    return path
        .extension()
        .and_then(|ext| return ext.to_str())
        .is_some_and(|ext| return ext.eq_ignore_ascii_case("md"));
}

/// Join the normal components of a relative path with `/`.
pub fn to_slash_path(path: &Path) -> String {
    return path_segments(path).join("/");
}

/// Normal components of a relative path, as strings.
pub fn path_segments(path: &Path) -> Vec<String> {
    return path
        .components()
        .filter_map(|c| {
            return match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                Component::CurDir | Component::ParentDir | Component::Prefix(_) | Component::RootDir => None,
            };
        })
        .collect();
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
    fn index_tracks_files_and_ancestor_dirs() {
        let index = TreeIndex::from_files(["docs/core/a.md".to_string(), "LICENSE".to_string()]);
        assert!(index.contains_file("docs/core/a.md"));
        assert!(index.contains("docs/core"));
        assert!(index.contains("docs"));
        assert!(index.contains_file("LICENSE"));
        assert!(!index.contains_file("docs"));
        assert!(!index.contains("docs/core/b.md"));
    }

    #[test]
    fn only_documents_are_renamable() {
        let mut index = TreeIndex::from_files(["docs/archive/OldPlan.md".to_owned()]);
        index.insert_document("docs/Guide.md".to_owned());
        assert!(index.is_renamable("docs/Guide.md"));
        assert!(!index.is_renamable("docs/archive/OldPlan.md"));
        assert!(index.contains_file("docs/archive/OldPlan.md"));

        assert!(index.pin("docs/Guide.md"));
        assert!(!index.is_renamable("docs/Guide.md"));
        assert!(index.contains_file("docs/Guide.md"));
    }

    #[test]
    fn excluded_markdown_is_indexed_but_not_renamable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("docs/archive")).unwrap();
        std::fs::write(root.join("docs/archive/OldPlan.md"), "").unwrap();
        std::fs::write(root.join("docs/a.md"), "").unwrap();
        let config = Config::parse("exclude = [\"docs/archive/\"]\n", Path::new(".doclinks.toml")).unwrap();

        let tree = walk(root, &config).unwrap();
        assert_eq!(tree.documents, vec![PathBuf::from("docs/a.md")], "excluded documents are not processed");
        assert!(tree.index.contains_file("docs/archive/OldPlan.md"), "excluded files still exist for the rules");
        assert!(!tree.index.is_renamable("docs/archive/OldPlan.md"), "excluded files keep their names");
    }

    #[test]
    fn walk_is_sorted_filtered_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("docs/b")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("docs/b/Z.md"), "").unwrap();
        std::fs::write(root.join("docs/a.MD"), "").unwrap();
        std::fs::write(root.join("docs/notes.txt"), "").unwrap();
        std::fs::write(root.join(".git/HEAD.md"), "").unwrap();

        let tree = walk(root, &Config::default()).unwrap();
        assert_eq!(tree.documents, vec![PathBuf::from("docs/a.MD"), PathBuf::from("docs/b/Z.md")]);
        assert!(tree.index.contains_file("docs/notes.txt"));
        assert!(!tree.index.contains(".git"));
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = walk(&dir.path().join("nope"), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::RootNotFound { .. }));
    }

    #[test]
    fn file_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.md");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(walk(&file, &Config::default()).unwrap_err(), Error::NotADirectory { .. }));
    }
}
