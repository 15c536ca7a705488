//! Input file watching
//!
//! Watches the directories holding the two inputs (editors often replace a
//! file rather than write it in place) and forwards events touching either
//! input to the event loop.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use crate::events::AppEvent;

pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Start watching `files`; matching changes are sent as `SourcesChanged`
    pub fn new(files: &[&Path], tx: Sender<AppEvent>) -> Result<Self> {
        let targets: Vec<PathBuf> = files.iter().map(|p| absolute(p)).collect();
        let watched = targets.clone();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            let event = match result {
                Ok(event) => event,
                Err(err) => {
                    warn!("file watcher error: {}", err);
                    return;
                }
            };
            if !is_content_change(&event.kind) {
                return;
            }

            let changed: Vec<PathBuf> = event
                .paths
                .iter()
                .filter(|p| watched.iter().any(|w| w == *p))
                .cloned()
                .collect();
            if !changed.is_empty() {
                debug!("inputs changed on disk: {:?}", changed);
                forward(&tx, changed);
            }
        })
        .context("Failed to create file watcher")?;

        let dirs: BTreeSet<PathBuf> = targets
            .iter()
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .collect();
        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {}", dir.display()))?;
        }
        info!("watching {} director{} for input changes", dirs.len(), if dirs.len() == 1 { "y" } else { "ies" });

        Ok(Self { _watcher: watcher })
    }
}

/// Send changed paths to the event loop; false once the loop has gone away
fn forward(tx: &Sender<AppEvent>, changed: Vec<PathBuf>) -> bool {
    match tx.send(AppEvent::SourcesChanged(changed)) {
        Ok(()) => true,
        Err(err) => {
            debug!("event loop closed, dropping change for {:?}", err.0);
            false
        }
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}
