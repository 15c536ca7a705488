//! Hunk detection and navigation over rendered diff rows
//!
//! A hunk is a maximal run of consecutive change rows. The navigator rescans
//! the rows whenever it is told the rendered tree changed, keeps a cursor
//! over the resulting hunks and asks its host to highlight and scroll to the
//! current one.

use log::debug;

use crate::classify::MarkerMatcher;
use crate::diff::{Row, RowId};

/// Ordered, non-empty run of consecutive change rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    rows: Vec<RowId>,
}

impl Hunk {
    pub fn rows(&self) -> &[RowId] {
        &self.rows
    }

    pub fn first(&self) -> RowId {
        self.rows[0]
    }

    pub fn last(&self) -> RowId {
        self.rows[self.rows.len() - 1]
    }
}

/// Group consecutive change rows, top to bottom
pub fn extract_hunks(rows: &[Row], matcher: &MarkerMatcher) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut current: Vec<RowId> = Vec::new();

    for row in rows {
        if matcher.is_change_row(row) {
            current.push(row.id);
        } else if !current.is_empty() {
            hunks.push(Hunk {
                rows: std::mem::take(&mut current),
            });
        }
    }
    if !current.is_empty() {
        hunks.push(Hunk { rows: current });
    }

    hunks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollAlign {
    #[default]
    Center,
    Start,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRequest {
    pub align: ScrollAlign,
    pub behavior: ScrollBehavior,
}

impl Default for ScrollRequest {
    fn default() -> Self {
        Self {
            align: ScrollAlign::Center,
            behavior: ScrollBehavior::Smooth,
        }
    }
}

/// Surface the navigator reads rows from and applies effects to
pub trait Host {
    /// Currently mounted rows, if any
    fn rows(&self) -> Option<&[Row]>;

    fn set_highlight(&mut self, row: RowId, on: bool);

    fn scroll_into_view(&mut self, row: RowId, request: ScrollRequest);
}

pub struct HunkNavigator {
    matcher: MarkerMatcher,
    scroll: ScrollRequest,
    hunks: Vec<Hunk>,
    cursor: Option<usize>,
}

impl HunkNavigator {
    pub fn new(matcher: MarkerMatcher, scroll: ScrollRequest) -> Self {
        Self {
            matcher,
            scroll,
            hunks: Vec::new(),
            cursor: None,
        }
    }

    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current_hunk(&self) -> Option<&Hunk> {
        self.cursor.and_then(|i| self.hunks.get(i))
    }

    /// Rescan the host's rows and forget the current selection.
    ///
    /// Safe to call any number of times; an unchanged tree yields the same
    /// hunks. Several notifications that arrive together need only one call.
    pub fn on_tree_changed<H: Host>(&mut self, host: &mut H) {
        if let Some(hunk) = self.current_hunk() {
            for row in hunk.rows() {
                host.set_highlight(*row, false);
            }
        }

        self.hunks = host
            .rows()
            .map(|rows| extract_hunks(rows, &self.matcher))
            .unwrap_or_default();
        self.cursor = None;

        debug!("rescanned rows: {} hunks", self.hunks.len());
    }

    pub fn next<H: Host>(&mut self, host: &mut H) {
        if self.hunks.is_empty() {
            return;
        }
        let target = match self.cursor {
            None => 0,
            Some(i) => (i + 1).min(self.hunks.len() - 1),
        };
        self.move_to(target, host);
    }

    pub fn previous<H: Host>(&mut self, host: &mut H) {
        if self.hunks.is_empty() {
            return;
        }
        let target = match self.cursor {
            None => 0,
            Some(i) => i.saturating_sub(1),
        };
        self.move_to(target, host);
    }

    /// Human readable position, e.g. `hunk 2/5`
    pub fn status(&self) -> String {
        match (self.cursor, self.hunks.len()) {
            (_, 0) => "no changes".to_string(),
            (Some(i), n) => format!("hunk {}/{}", i + 1, n),
            (None, 1) => "1 hunk".to_string(),
            (None, n) => format!("{} hunks", n),
        }
    }

    fn move_to<H: Host>(&mut self, target: usize, host: &mut H) {
        if self.cursor == Some(target) {
            return;
        }

        if let Some(previous) = self.current_hunk() {
            for row in previous.rows() {
                host.set_highlight(*row, false);
            }
        }

        self.cursor = Some(target);
        let hunk = &self.hunks[target];
        for row in hunk.rows() {
            host.set_highlight(*row, true);
        }
        host.scroll_into_view(hunk.first(), self.scroll);

        debug!("moved to hunk {} of {} at row {}", target + 1, self.hunks.len(), hunk.first().0);
    }
}
