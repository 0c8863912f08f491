//! Crate-level error types for doclinks diagnostics.
use std::path::PathBuf;

/// Errors carry enough context to produce a useful diagnostic on their own.
/// Content-level problems in markdown never become errors; only the
/// filesystem and configuration layers produce these.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `.doclinks.toml` parsed but holds a value the tool cannot use.
    #[error("invalid config in {}: {reason}", path.display())]
    ConfigInvalid {
        /// Config file path.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// A rename-table entry would make normalization non-idempotent.
    #[error("invalid rename `{from}` -> `{to}`: {reason}")]
    InvalidRename {
        /// Table key.
        from: String,
        /// Why the entry is rejected.
        reason: String,
        /// Table value.
        to: String,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON serialization of a report failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped serde_json error.
        #[from]
        serde_json::Error,
    ),

    /// The tree root exists but is not a directory.
    #[error("not a directory: {}", path.display())]
    NotADirectory {
        /// Path given as the tree root.
        path: PathBuf,
    },

    /// A file could not be parsed.
    #[error("parse failed: {}: {reason}", file.display())]
    ParseFailed {
        /// File that failed to parse.
        file: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A rename destination already exists with different content.
    #[error("rename conflict: {} -> {} (destination exists with different content)", from.display(), to.display())]
    RenameConflict {
        /// Source path.
        from: PathBuf,
        /// Destination path.
        to: PathBuf,
    },

    /// The tree root does not exist.
    #[error("root not found: {}", path.display())]
    RootNotFound {
        /// Path given as the tree root.
        path: PathBuf,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// No rename-table entry has the given key.
    #[error("unknown rename: `{from}`")]
    UnknownRename {
        /// Key that was not found.
        from: String,
    },

    /// The filesystem watcher could not be set up.
    #[error("watch: {0}")]
    Watch(
        /// The wrapped notify error.
        #[from]
        notify::Error,
    ),
}
