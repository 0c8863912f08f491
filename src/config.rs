//! `.doclinks.toml`: which documents to process and how targets resolve.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::rules;

/// Name of the per-tree config file.
pub const CONFIG_FILE: &str = ".doclinks.toml";

/// Extensions that mark a link target as an asset rather than a document.
const DEFAULT_ASSET_EXTENSIONS: &[&str] = &[
    "bmp", "css", "csv", "gif", "html", "ico", "jpeg", "jpg", "js", "json", "mp4", "pdf", "png",
    "svg", "tar", "txt", "webm", "webp", "xml", "yaml", "yml", "zip",
];

/// Tree configuration loaded from `.doclinks.toml`.
/// Include/exclude patterns are path prefixes applied to markdown files.
#[derive(Debug, Clone)]
pub struct Config {
    /// Lowercase extensions (without the dot) that are never given `.md`.
    pub asset_extensions: Vec<String>,
    /// Path prefixes whose documents are skipped.
    exclude: Vec<String>,
    /// Path prefixes to process; empty means everything.
    include: Vec<String>,
    /// Known historical targets and their replacements.
    pub renames: BTreeMap<String, String>,
    /// Directory under the tree root that root-relative targets resolve against.
    pub site_root: PathBuf,
}

/// Raw TOML structure for `.doclinks.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct DoclinksTomlConfig {
    /// Replaces the default asset list when present.
    #[serde(default)]
    asset_extensions: Option<Vec<String>>,
    /// Path prefixes to skip.
    #[serde(default)]
    exclude: Vec<String>,
    /// Path prefixes to process.
    #[serde(default)]
    include: Vec<String>,
    /// `[renames]` table.
    #[serde(default)]
    renames: BTreeMap<String, String>,
    /// Root-relative base directory.
    #[serde(default)]
    site_root: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            asset_extensions: DEFAULT_ASSET_EXTENSIONS.iter().map(|e| return (*e).to_string()).collect(),
            exclude: Vec::new(),
            include: Vec::new(),
            renames: BTreeMap::new(),
            site_root: PathBuf::new(),
        };
    }
}

impl Config {
    /// Load config from `.doclinks.toml` in the given root directory.
    /// Returns the default if the file doesn't exist. A file that exists but
    /// is malformed is an error; it never silently falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// `Error::TomlDe` if the TOML is malformed, `Error::ConfigInvalid` for
    /// an unusable `site_root`, or `Error::InvalidRename` for a rename entry
    /// that would not be stable under normalization.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
        };
        return Self::parse(&content, &path);
    }

    /// Parse config content. `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`], minus I/O.
    pub fn parse(content: &str, path: &Path) -> Result<Self, Error> {
        let raw: DoclinksTomlConfig = toml::from_str(content)?;

        let site_root = PathBuf::from(raw.site_root.unwrap_or_default().trim_matches('/'));
        if site_root.components().any(|c| return !matches!(c, std::path::Component::Normal(_))) {
            return Err(Error::ConfigInvalid {
                path: path.to_path_buf(),
                reason: format!("site_root `{}` must be a plain relative directory", site_root.display()),
            });
        }

        let asset_extensions = raw.asset_extensions.map_or_else(
            || return Self::default().asset_extensions,
            |exts| {
                return exts
                    .iter()
                    .map(|e| return e.trim_start_matches('.').to_ascii_lowercase())
                    .collect();
            },
        );

        let config = Self {
            asset_extensions,
            exclude: raw.exclude,
            include: raw.include,
            renames: raw.renames,
            site_root,
        };
        config.validate_renames()?;
        return Ok(config);
    }

    /// Check whether a markdown file path should be processed.
    ///
    /// A path is included if no include patterns are set, or if it starts
    /// with at least one include pattern. An included path is then excluded
    /// if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }

    /// Reject rename entries whose replacement would be rewritten again on
    /// the next run, or that chain into another entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRename` for the first offending entry.
    pub fn validate_renames(&self) -> Result<(), Error> {
        for (from, to) in &self.renames {
            let reason = if from.is_empty() || to.is_empty() {
                Some("empty target")
            } else if self.renames.contains_key(to) {
                Some("replacement is itself a rename key")
            } else {
                rules::unstable_replacement_reason(to, &self.asset_extensions)
            };

            if let Some(reason) = reason {
                return Err(Error::InvalidRename {
                    from: from.clone(),
                    reason: reason.to_string(),
                    to: to.clone(),
                });
            }
        }
        return Ok(());
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

    fn parse(content: &str) -> Result<Config, Error> {
        return Config::parse(content, Path::new(CONFIG_FILE));
    }

    #[test]
    fn empty_config_scans_everything() {
        let config = parse("").unwrap();
        assert!(config.should_scan("docs/guide.md"));
        assert!(config.renames.is_empty());
        assert_eq!(config.site_root, PathBuf::new());
    }

    #[test]
    fn include_and_exclude_are_prefixes() {
        let config = parse("include = [\"docs/\"]\nexclude = [\"docs/archive/\"]").unwrap();
        assert!(config.should_scan("docs/guide.md"));
        assert!(!config.should_scan("docs/archive/old.md"));
        assert!(!config.should_scan("README.md"));
    }

    #[test]
    fn site_root_is_trimmed() {
        let config = parse("site_root = \"/docs/\"").unwrap();
        assert_eq!(config.site_root, PathBuf::from("docs"));
    }

    #[test]
    fn site_root_cannot_escape() {
        let err = parse("site_root = \"../elsewhere\"").unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { .. }));
    }

    #[test]
    fn asset_extensions_override_is_normalized() {
        let config = parse("asset_extensions = [\".PNG\", \"sh\"]").unwrap();
        assert_eq!(config.asset_extensions, vec!["png".to_string(), "sh".to_string()]);
    }

    #[test]
    fn renames_load_in_key_order() {
        let config = parse(
            "[renames]\n\"/docs/b\" = \"../guides/b.md\"\n\"/docs/a\" = \"../guides/a.md\"\n",
        )
        .unwrap();
        let keys: Vec<&String> = config.renames.keys().collect();
        assert_eq!(keys, vec!["/docs/a", "/docs/b"]);
    }

    #[test]
    fn rename_to_unnormalized_target_is_rejected() {
        for bad in ["/docs/new.md", "../guides/NewName.md", "../guides/new-name"] {
            let content = format!("[renames]\n\"/docs/old\" = \"{bad}\"\n");
            let err = parse(&content).unwrap_err();
            assert!(matches!(err, Error::InvalidRename { .. }), "{bad}");
        }
    }

    #[test]
    fn chained_renames_are_rejected() {
        let err = parse("[renames]\n\"a.md\" = \"b.md\"\n\"b.md\" = \"c.md\"\n").unwrap_err();
        assert!(matches!(err, Error::InvalidRename { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse("sites_root = \"docs\"").is_err());
    }
}
