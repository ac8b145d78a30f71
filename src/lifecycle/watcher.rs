//! File watcher for `watch` mode.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watches a fixed set of files and reports when any of them changes.
pub struct SourceWatcher {
    files: BTreeSet<PathBuf>,
    change_tx: mpsc::UnboundedSender<PathBuf>,
}

impl SourceWatcher {
    /// Create a new watcher for `files`.
    ///
    /// Returns the watcher and a receiver yielding the changed path.
    pub fn new<I, P>(files: I) -> (Self, mpsc::UnboundedReceiver<PathBuf>)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        let files = files.into_iter().map(|p| absolute(p.as_ref())).collect();
        (Self { files, change_tx }, change_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// The returned handle must be kept alive for events to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx.clone();
        let files = self.files.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
                        return;
                    }
                    for path in event.paths.iter().map(|p| absolute(p)) {
                        if files.contains(&path) {
                            tracing::debug!(path = %path.display(), "Watched file changed");
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let directories: BTreeSet<PathBuf> = self
            .files
            .iter()
            .filter_map(|f| f.parent().map(Path::to_path_buf))
            .collect();
        for directory in &directories {
            watcher.watch(directory, RecursiveMode::NonRecursive)?;
        }

        tracing::info!(files = self.files.len(), directories = directories.len(), "Watcher started");
        Ok(watcher)
    }
}

/// Best-effort absolute form, so event paths and watched paths compare equal.
fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    // The file may be mid-replace; canonicalize the directory instead.
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|dir| dir.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}
