//! `doclinks watch`: check once, then re-check whenever a document or the
//! config changes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use notify::{EventKind, RecursiveMode, Watcher as _};

use crate::commands::{self, OutputFormat};
use crate::config::CONFIG_FILE;
use crate::error;
use crate::walker;

/// Quiet period after the last relevant event before re-checking. Editors
/// tend to save in several steps; one re-check covers the burst.
const QUIET_PERIOD: Duration = Duration::from_millis(100);

/// Exit code recorded when a re-check fails with a fatal error.
const FATAL_CHECK: u8 = 3;

/// Start a recursive watcher that forwards relevant changed paths on `tx`.
///
/// # Errors
///
/// Returns `Error::Watch` if the platform watcher cannot be created.
fn watch_tree(root: &Path, tx: Sender<PathBuf>) -> Result<notify::RecommendedWatcher, error::Error> {
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "watcher error");
                return;
            },
        };
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
            return;
        }
        for path in event.paths.into_iter().filter(|p| return is_relevant(p)) {
            let _ = tx.send(path);
        }
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    return Ok(watcher);
}

/// Markdown documents and the config file trigger a re-check; anything else
/// (editor swap files, build output) is ignored.
fn is_relevant(path: &Path) -> bool {
    let is_config = path.file_name().is_some_and(|name| return name == CONFIG_FILE);
    return is_config || walker::is_markdown(path);
}

/// Block until a change arrives, then collect everything that changes
/// until the tree has been quiet for `QUIET_PERIOD`. `None` once the
/// watcher is gone.
fn next_batch(rx: &Receiver<PathBuf>) -> Option<BTreeSet<PathBuf>> {
    let first = rx.recv().ok()?;
    let mut batch = BTreeSet::from([first]);
    while let Ok(path) = rx.recv_timeout(QUIET_PERIOD) {
        batch.insert(path);
    }
    return Some(batch);
}

/// Run `check` over `root`, then again after every batch of changes.
/// Returns the exit code of the last check once the watcher shuts down.
///
/// # Errors
///
/// Returns errors from root validation or watcher setup.
pub fn run(root: &Path, format: OutputFormat) -> Result<ExitCode, error::Error> {
    walker::ensure_root(root)?;

    let mut last_code = check_once(root, format);

    let (tx, rx) = crossbeam_channel::unbounded();
    let _watcher = watch_tree(root, tx)?;
    eprintln!("doclinks: watching {} (Ctrl+C to stop)", root.display());

    while let Some(batch) = next_batch(&rx) {
        for path in &batch {
            tracing::debug!(path = %path.display(), "changed");
        }
        eprintln!("doclinks: {} paths changed, checking again", batch.len());
        last_code = check_once(root, format);
    }

    return Ok(last_code);
}

/// One `check` pass. A fatal error is printed and does not end the watch.
fn check_once(root: &Path, format: OutputFormat) -> ExitCode {
    return commands::check(root, format).unwrap_or_else(|e| {
        crate::diagnostics::print_error(&e);
        return ExitCode::from(FATAL_CHECK);
    });
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
    fn only_markdown_and_config_are_relevant() {
        assert!(is_relevant(Path::new("docs/Guide.MD")));
        assert!(is_relevant(Path::new("./.doclinks.toml")));
        assert!(!is_relevant(Path::new("docs/.guide.md.swp")));
        assert!(!is_relevant(Path::new("target/debug/doclinks")));
    }

    #[test]
    fn bursts_collapse_into_one_batch() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(PathBuf::from("docs/b.md")).unwrap();
        tx.send(PathBuf::from("docs/a.md")).unwrap();
        tx.send(PathBuf::from("docs/b.md")).unwrap();

        let batch = next_batch(&rx).unwrap();
        assert_eq!(batch.into_iter().collect::<Vec<_>>(), vec![
            PathBuf::from("docs/a.md"),
            PathBuf::from("docs/b.md")
        ]);

        drop(tx);
        assert!(next_batch(&rx).is_none());
    }
}
