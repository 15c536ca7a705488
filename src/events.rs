//! Events feeding the viewer loop

use crossterm::event::{Event, KeyEvent, KeyEventKind};
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    /// Input files changed on disk
    SourcesChanged(Vec<PathBuf>),
    /// The rendered rows were replaced
    TreeChanged,
}

impl AppEvent {
    /// Translate a terminal event; key releases and repeats are dropped
    pub fn from_terminal(event: Event) -> Option<Self> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => Some(Self::Key(key)),
            Event::Resize(w, h) => Some(Self::Resize(w, h)),
            _ => None,
        }
    }
}

/// Collect everything that is ready: terminal input (waiting up to `timeout`
/// for the first event) followed by any pending watcher messages
pub fn collect(timeout: Duration, watcher: &Receiver<AppEvent>) -> anyhow::Result<Vec<AppEvent>> {
    let mut events = Vec::new();
    if crossterm::event::poll(timeout)? {
        loop {
            events.extend(AppEvent::from_terminal(crossterm::event::read()?));
            if !crossterm::event::poll(Duration::ZERO)? {
                break;
            }
        }
    }
    events.extend(watcher.try_iter());
    Ok(events)
}
