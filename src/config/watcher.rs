//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by renaming a temp file over the original keep triggering
//! reloads. A single save often produces several events, some of them
//! while the file is still truncated; every event rereads the file and
//! only a valid configuration that differs from the last one applied is
//! passed on.

use std::fs;
use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::ProxyConfig;

/// Result of rereading the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new configuration was sent; names the sections that changed.
    Applied(Vec<&'static str>),
    /// The file parsed to the configuration already in use.
    Unchanged,
    /// The file could not be read or did not validate.
    Rejected,
}

/// Top-level sections that differ between two configurations.
pub fn changed_sections(old: &ProxyConfig, new: &ProxyConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if old.listener != new.listener {
        changed.push("listener");
    }
    if old.upstream != new.upstream {
        changed.push("upstream");
    }
    if old.response != new.response {
        changed.push("response");
    }
    if old.security != new.security {
        changed.push("security");
    }
    if old.observability != new.observability {
        changed.push("observability");
    }
    changed
}

/// Rereads one file and forwards configurations that are new.
struct Reloader {
    path: PathBuf,
    current: ProxyConfig,
    updates: mpsc::UnboundedSender<ProxyConfig>,
}

impl Reloader {
    fn reload(&mut self) -> ReloadOutcome {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Config file unreadable, keeping current configuration");
                return ReloadOutcome::Rejected;
            }
        };
        let next = match parse_config(&content) {
            Ok(next) => next,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Invalid config, keeping current configuration");
                return ReloadOutcome::Rejected;
            }
        };

        let changed = changed_sections(&self.current, &next);
        if changed.is_empty() {
            return ReloadOutcome::Unchanged;
        }

        tracing::info!(path = %self.path.display(), sections = ?changed, "Config file changed");
        if self.updates.send(next.clone()).is_err() {
            tracing::debug!("Config receiver gone, update dropped");
        }
        self.current = next;
        ReloadOutcome::Applied(changed)
    }
}

/// Watches the configuration file and sends each new valid version.
pub struct ConfigWatcher {
    reloader: Reloader,
}

impl ConfigWatcher {
    /// `current` is the configuration already running; only changes from it
    /// are sent on the returned receiver.
    pub fn new(
        path: &Path,
        current: ProxyConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let reloader = Reloader {
            path: path.to_path_buf(),
            current,
            updates,
        };
        (Self { reloader }, rx)
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let mut reloader = self.reloader;
        reloader.path = fs::canonicalize(&reloader.path).map_err(notify::Error::io)?;
        let path = reloader.path.clone();
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| notify::Error::path_not_found().add_path(path.clone()))?;

        let target = path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_file = event.paths.iter().any(|p| p == &target);
                    if touches_file && (event.kind.is_modify() || event.kind.is_create()) {
                        reloader.reload();
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Watching config file");
        Ok(watcher)
    }
}
