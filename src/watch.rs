//! Watches a site's sources and rebuilds it when they change. Events are
//! batched: a rebuild starts once no new event has arrived for
//! [`DEBOUNCE_MS`], so saving several files at once costs one build.

use crate::build::build_site;
use crate::config::{Config, Overrides};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

const DEBOUNCE_MS: u64 = 300;

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
        || name.starts_with('#')
}

/// Batches rapid file events.
struct Debouncer {
    /// Events under this directory are the build's own writes.
    output_directory: PathBuf,
    pending: HashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new(output_directory: PathBuf) -> Self {
        Self {
            output_directory,
            pending: HashSet::new(),
            last_event: None,
        }
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) && !path.starts_with(&self.output_directory) {
                self.pending.insert(path);
                self.last_event = Some(Instant::now());
            }
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .map_or(false, |t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        self.pending.drain().collect()
    }

    fn timeout(&self) -> Duration {
        match self.pending.is_empty() {
            true => Duration::from_secs(60),
            false => Duration::from_millis(DEBOUNCE_MS),
        }
    }
}

fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// The sources a build reads: the project file, the theme, the content and
/// the static directory.
fn watched_paths(config: &Config) -> Vec<(PathBuf, RecursiveMode)> {
    vec![
        (config.project_file.clone(), RecursiveMode::NonRecursive),
        (config.theme_directory.clone(), RecursiveMode::Recursive),
        (config.project_root.join("content"), RecursiveMode::Recursive),
        (config.static_source_directory.clone(), RecursiveMode::Recursive),
    ]
    .into_iter()
    .filter(|(path, _)| path.exists())
    .collect()
}

// Event paths are reported relative to what is watched; resolving both
// sides keeps the output-directory check meaningful.
fn absolute(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or(path)
}

// Reloads the configuration so edits to the project or theme files apply.
fn rebuild(project_file: &Path, overrides: &Overrides, changed: &[PathBuf]) {
    info!(changed = changed.len(), "change detected, rebuilding");
    for path in changed {
        debug!(path = %path.display(), "changed");
    }

    let result = Config::from_project_file(project_file, overrides.clone())
        .map_err(|e| e.to_string())
        .and_then(|config| build_site(&config).map_err(|e| e.to_string()));
    if let Err(e) = result {
        error!(error = %e, "rebuild failed");
    }
}

/// Starts watching the sources of the site described by `config` on a
/// background thread, rebuilding with `overrides` after each batch of
/// changes. Watching stops when the process exits.
pub fn spawn(config: &Config, overrides: Overrides) -> Result<()> {
    let (tx, rx) = channel();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(tx)?;
    for (path, mode) in watched_paths(config) {
        let path = absolute(path);
        debug!(path = %path.display(), "watching");
        watcher
            .watch(&path, mode)
            .map_err(|err| Error::Watch { path, err })?;
    }

    let project_file = config.project_file.clone();
    let mut debouncer = Debouncer::new(absolute(config.output_directory.clone()));
    std::thread::spawn(move || {
        // The watcher stops delivering events once dropped.
        let _watcher = watcher;
        loop {
            match rx.recv_timeout(debouncer.timeout()) {
                Ok(Ok(event)) if is_relevant(&event) => debouncer.add(event),
                Ok(Err(e)) => error!(error = %e, "watch error"),
                Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                    rebuild(&project_file, &overrides, &debouncer.take());
                }
                Err(RecvTimeoutError::Disconnected) => break,
                _ => {}
            }
        }
    });
    Ok(())
}

/// The result of starting a watcher.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem starting the watcher.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the platform watcher can't be created.
    #[error(transparent)]
    Notify(#[from] notify::Error),

    /// Returned when a source path can't be watched.
    #[error("watching `{}`: {err}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        err: notify::Error,
    },
}
