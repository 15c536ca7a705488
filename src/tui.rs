//! TUI layer using ratatui and crossterm
//!
//! Shows the rendered diff and wires keyboard input to hunk navigation.

use crate::classify::MarkerMatcher;
use crate::config::Config;
use crate::diff::{marker, DiffRenderer, DiffSources, Layout as DiffLayout, Node, RenderedDiff, Row, RowId, Side, Source};
use crate::events::{self, AppEvent};
use crate::keys::{self, Command, KeyTarget};
use crate::navigator::{Host, HunkNavigator, ScrollAlign, ScrollBehavior, ScrollRequest};
use crate::session::TerminalSession;
use crate::watch::SourceWatcher;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use log::{debug, info, warn};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::Stdout;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;
use tui_textarea::{CursorMove, TextArea};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const FRAME: Duration = Duration::from_millis(16);
const IDLE: Duration = Duration::from_millis(250);
const LINE_NUMBER_WIDTH: usize = 5;
const GUTTER_WIDTH: usize = 2;

/// Visible window over the rows
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    offset: usize,
    /// Where a smooth scroll is heading
    target: usize,
    height: usize,
}

impl Viewport {
    fn max_offset(&self, total: usize) -> usize {
        total.saturating_sub(self.height)
    }

    pub fn scroll_to(&mut self, row: usize, total: usize, request: ScrollRequest) {
        let desired = match request.align {
            ScrollAlign::Center => row.saturating_sub(self.height / 2),
            ScrollAlign::Start => row,
            ScrollAlign::Nearest => {
                if row < self.target {
                    row
                } else if row >= self.target + self.height {
                    row + 1 - self.height.max(1)
                } else {
                    self.target
                }
            }
        };
        self.target = desired.min(self.max_offset(total));
        if request.behavior == ScrollBehavior::Instant {
            self.offset = self.target;
        }
    }

    pub fn scroll_by(&mut self, delta: isize, total: usize) {
        let moved = self.target.saturating_add_signed(delta);
        self.target = moved.min(self.max_offset(total));
        self.offset = self.target;
    }

    /// Advance a smooth scroll one frame; returns whether it is still moving
    pub fn tick(&mut self) -> bool {
        if self.offset == self.target {
            return false;
        }
        let distance = self.offset.abs_diff(self.target);
        let step = (distance / 4).max(1);
        if self.offset < self.target {
            self.offset += step;
        } else {
            self.offset -= step;
        }
        self.offset != self.target
    }

    pub fn is_animating(&self) -> bool {
        self.offset != self.target
    }

    fn clamp(&mut self, total: usize) {
        let max = self.max_offset(total);
        self.offset = self.offset.min(max);
        self.target = self.target.min(max);
    }
}

/// Mounted rows plus the viewport showing them
#[derive(Debug, Default)]
pub struct Surface {
    diff: Option<RenderedDiff>,
    viewport: Viewport,
}

impl Surface {
    fn mount(&mut self, diff: RenderedDiff) {
        self.viewport.clamp(diff.len());
        self.diff = Some(diff);
    }

    fn total_rows(&self) -> usize {
        self.diff.as_ref().map_or(0, RenderedDiff::len)
    }
}

impl Host for Surface {
    fn rows(&self) -> Option<&[Row]> {
        self.diff.as_ref().map(|d| d.rows.as_slice())
    }

    fn set_highlight(&mut self, row: RowId, on: bool) {
        if let Some(row) = self.diff.as_mut().and_then(|d| d.row_mut(row)) {
            row.set_marker(marker::HIGHLIGHT, on);
        }
    }

    fn scroll_into_view(&mut self, row: RowId, request: ScrollRequest) {
        let total = self.total_rows();
        self.viewport.scroll_to(row.0, total, request);
    }
}

/// Path prompt used to swap one of the inputs
struct Prompt {
    side: Side,
    input: TextArea<'static>,
}

impl Prompt {
    fn new(side: Side, current: &Path) -> Self {
        let mut input = TextArea::new(vec![current.to_string_lossy().to_string()]);
        input.move_cursor(CursorMove::End);
        input.set_cursor_line_style(Style::default());
        input.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Open {} file (Enter: load, Esc: cancel) ", side.as_str())),
        );
        Self { side, input }
    }

    fn value(&self) -> String {
        self.input.lines().join("").trim().to_string()
    }
}

/// Application state
pub struct App {
    config: Config,
    sources: DiffSources,
    renderer: DiffRenderer,
    surface: Surface,
    navigator: HunkNavigator,

    events: Sender<AppEvent>,
    watcher: Option<SourceWatcher>,

    // UI state
    prompt: Option<Prompt>,
    tree_dirty: bool,
    rescans: usize,
    message: Option<String>,
    show_help: bool,
    quit: bool,
}

impl App {
    pub fn new(config: Config, sources: DiffSources, events: Sender<AppEvent>) -> Result<Self> {
        let matcher = MarkerMatcher::new(&config.classifier)?;
        let navigator = HunkNavigator::new(matcher, config.scroll_request());
        let renderer = DiffRenderer::from_config(&config);

        let mut app = Self {
            config,
            sources,
            renderer,
            surface: Surface::default(),
            navigator,
            events,
            watcher: None,
            prompt: None,
            tree_dirty: false,
            rescans: 0,
            message: None,
            show_help: false,
            quit: false,
        };
        app.watch_sources();
        app.rerender();
        app.flush_tree_changes();
        Ok(app)
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn is_animating(&self) -> bool {
        self.surface.viewport.is_animating()
    }

    pub fn tick(&mut self) -> bool {
        self.surface.viewport.tick()
    }

    /// Handle a batch of events in arrival order.
    ///
    /// Tree changes are coalesced: rows are rescanned once before the next
    /// key press that follows them and once at the end of the batch.
    pub fn process<I: IntoIterator<Item = AppEvent>>(&mut self, events: I) {
        for event in events {
            self.dispatch(event);
        }
        self.flush_tree_changes();
    }

    fn dispatch(&mut self, event: AppEvent) {
        match event {
            AppEvent::Key(key) => {
                self.flush_tree_changes();
                self.handle_key(key);
            }
            AppEvent::SourcesChanged(paths) => self.reload(&paths),
            AppEvent::TreeChanged => self.tree_dirty = true,
            AppEvent::Resize(width, height) => debug!("terminal resized to {}x{}", width, height),
        }
    }

    fn flush_tree_changes(&mut self) {
        if std::mem::take(&mut self.tree_dirty) {
            self.rescans += 1;
            debug!("rescan #{}", self.rescans);
            self.navigator.on_tree_changed(&mut self.surface);
        }
    }

    /// Re-render from the current sources; the rows are replaced wholesale
    fn rerender(&mut self) {
        let diff = self.sources.render(&self.renderer);
        debug!("rendered {} rows", diff.len());
        self.surface.mount(diff);
        self.dispatch(AppEvent::TreeChanged);
    }

    fn watch_sources(&mut self) {
        self.watcher = None;
        if !self.config.watch {
            return;
        }
        let paths = [self.sources.old.path.as_path(), self.sources.new.path.as_path()];
        match SourceWatcher::new(&paths, self.events.clone()) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(err) => {
                warn!("live reload disabled: {:#}", err);
                self.message = Some(format!("Live reload disabled: {}", err));
            }
        }
    }

    fn reload(&mut self, paths: &[PathBuf]) {
        let mut changed = false;
        for path in paths {
            for side in self.sources.sides_for(path) {
                match self.sources.get_mut(side).reload() {
                    Ok(true) => {
                        info!("reloaded {} input {}", side.as_str(), path.display());
                        changed = true;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!("keeping previous {} input: {:#}", side.as_str(), err);
                        self.message = Some(format!("{:#}", err));
                    }
                }
            }
        }
        if changed {
            self.rerender();
        }
    }

    fn key_target(&self) -> KeyTarget {
        if self.prompt.is_some() {
            KeyTarget::TextInput
        } else {
            KeyTarget::DiffView
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        // Clear message on any input
        self.message = None;

        if self.key_target().is_text_input() {
            self.handle_prompt_input(key);
            return;
        }
        if self.show_help {
            self.show_help = false;
            return;
        }
        if let Some(command) = keys::resolve(&key, self.key_target(), &self.config.keys) {
            self.run_command(command);
        }
    }

    fn run_command(&mut self, command: Command) {
        let total = self.surface.total_rows();
        let page = self.surface.viewport.height.max(1) as isize;
        match command {
            Command::NextHunk => {
                let before = self.navigator.cursor();
                self.navigator.next(&mut self.surface);
                self.report_hunk_move(before, "last");
            }
            Command::PreviousHunk => {
                let before = self.navigator.cursor();
                self.navigator.previous(&mut self.surface);
                self.report_hunk_move(before, "first");
            }
            Command::ScrollDown => self.surface.viewport.scroll_by(1, total),
            Command::ScrollUp => self.surface.viewport.scroll_by(-1, total),
            Command::PageDown => self.surface.viewport.scroll_by(page, total),
            Command::PageUp => self.surface.viewport.scroll_by(-page, total),
            Command::Top => self.surface.viewport.scroll_by(isize::MIN, total),
            Command::Bottom => self.surface.viewport.scroll_by(isize::MAX, total),
            Command::ToggleSplit => {
                self.renderer.layout = match self.renderer.layout {
                    DiffLayout::Split => DiffLayout::Unified,
                    DiffLayout::Unified => DiffLayout::Split,
                };
                self.rerender();
            }
            Command::ToggleDiffOnly => {
                self.renderer.show_diff_only = !self.renderer.show_diff_only;
                self.rerender();
            }
            Command::ToggleLineNumbers => {
                self.renderer.show_line_numbers = !self.renderer.show_line_numbers;
                self.rerender();
            }
            Command::OpenOld => self.open_prompt(Side::Old),
            Command::OpenNew => self.open_prompt(Side::New),
            Command::ToggleHelp => self.show_help = !self.show_help,
            Command::Quit => self.quit = true,
        }
    }

    fn report_hunk_move(&mut self, before: Option<usize>, edge: &str) {
        if self.navigator.hunks().is_empty() {
            self.message = Some("No changes to navigate".to_string());
        } else if before.is_some() && before == self.navigator.cursor() {
            self.message = Some(format!("Already at {} hunk", edge));
        }
    }

    fn open_prompt(&mut self, side: Side) {
        let current = self.sources.get(side).path.clone();
        self.prompt = Some(Prompt::new(side, &current));
    }

    fn handle_prompt_input(&mut self, key: KeyEvent) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Enter => {
                if let Some(prompt) = self.prompt.take() {
                    self.load_input(prompt.side, &prompt.value());
                }
            }
            _ => {
                prompt.input.input(key);
            }
        }
    }

    fn load_input(&mut self, side: Side, path: &str) {
        if path.is_empty() {
            return;
        }
        match Source::load(Path::new(path)) {
            Ok(source) => {
                info!("switched {} input to {}", side.as_str(), path);
                *self.sources.get_mut(side) = source;
                self.message = Some(format!("Loaded {} file {}", side.as_str(), path));
                self.watch_sources();
                self.rerender();
            }
            Err(err) => {
                warn!("failed to switch {} input: {:#}", side.as_str(), err);
                self.message = Some(format!("{:#}", err));
            }
        }
    }
}

/// Runs the TUI application
pub fn run(config: Config, sources: DiffSources) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut app = App::new(config, sources, tx)?;

    let mut session = TerminalSession::start()?;
    let result = run_app(session.terminal(), &mut app, &rx);
    drop(session);

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    rx: &Receiver<AppEvent>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = if app.is_animating() { FRAME } else { IDLE };
        let batch = events::collect(timeout, rx)?;
        app.process(batch);
        app.tick();

        if app.should_quit() {
            return Ok(());
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Diff content
            Constraint::Length(3), // Status/input
        ])
        .split(f.area());

    // Borders take two lines
    app.surface.viewport.height = (chunks[1].height as usize).saturating_sub(2);
    app.surface.viewport.clamp(app.surface.total_rows());

    render_header(f, app, chunks[0]);
    render_diff(f, app, chunks[1]);
    render_status(f, app, chunks[2]);

    if app.show_help {
        render_help(f, app);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let info = format!(
        " {} → {}  [{}]{}",
        app.sources.old.display_name(),
        app.sources.new.display_name(),
        app.navigator.status(),
        if app.watcher.is_some() { "  live" } else { "" }
    );

    let header = Paragraph::new(info)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title(" hunknav "));

    f.render_widget(header, area);
}

fn render_diff(f: &mut Frame, app: &App, area: Rect) {
    let width = (area.width as usize).saturating_sub(2);
    let viewport = &app.surface.viewport;

    let items: Vec<ListItem> = app
        .surface
        .rows()
        .unwrap_or_default()
        .iter()
        .skip(viewport.offset)
        .take(viewport.height)
        .map(|row| ListItem::new(render_row(row, width)))
        .collect();

    let block = Block::default().borders(Borders::ALL);
    if app.surface.diff.as_ref().map_or(true, RenderedDiff::is_empty) {
        let empty = Paragraph::new(" Both inputs are empty")
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let diff_list = List::new(items).block(block);
    f.render_widget(diff_list, area);
}

fn render_row(row: &Row, width: usize) -> Line<'static> {
    let highlighted = row.has_marker(marker::HIGHLIGHT);
    let mut spans = vec![Span::styled(
        if highlighted { "▌" } else { " " },
        Style::default().fg(Color::Yellow),
    )];
    let available = width.saturating_sub(1);

    if row.has_marker(marker::CODE_FOLD) {
        spans.push(Span::styled(
            fit(&row.root.text, available),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::DIM),
        ));
        return Line::from(spans);
    }

    let cells = &row.root.children;
    let fixed: usize = cells.iter().filter_map(fixed_width).sum();
    let content_cells = cells.iter().filter(|c| fixed_width(c).is_none()).count().max(1);
    let content_width = available.saturating_sub(fixed) / content_cells;

    for cell in cells {
        let base = cell_style(cell, highlighted);
        match fixed_width(cell) {
            Some(w) if cell.has_marker(marker::LINE_NUMBER) => {
                spans.push(Span::styled(format!("{:>1$} ", cell.text, w - 1), base));
            }
            Some(w) => spans.push(Span::styled(fit(&cell.text, w), base)),
            None if cell.children.is_empty() => {
                spans.push(Span::styled(fit(&cell.text, content_width), base));
            }
            None => {
                let mut remaining = content_width;
                for child in &cell.children {
                    let piece = truncate(&child.text, remaining);
                    remaining -= piece.width();
                    spans.push(Span::styled(piece, base.patch(word_style(child))));
                }
                spans.push(Span::styled(" ".repeat(remaining), base));
            }
        }
    }

    Line::from(spans)
}

fn fixed_width(cell: &Node) -> Option<usize> {
    if cell.has_marker(marker::LINE_NUMBER) {
        Some(LINE_NUMBER_WIDTH)
    } else if cell.has_marker(marker::GUTTER) {
        Some(GUTTER_WIDTH)
    } else {
        None
    }
}

fn cell_style(cell: &Node, highlighted: bool) -> Style {
    let mut style = if cell.has_marker(marker::EMPTY_LINE) {
        Style::default().bg(Color::Rgb(28, 28, 28))
    } else if cell.has_marker(marker::DIFF_ADDED) {
        Style::default().fg(Color::Green).bg(Color::Rgb(0, 40, 0))
    } else if cell.has_marker(marker::DIFF_REMOVED) {
        Style::default().fg(Color::Red).bg(Color::Rgb(50, 0, 0))
    } else {
        Style::default()
    };
    if cell.has_marker(marker::LINE_NUMBER) {
        style = style.add_modifier(Modifier::DIM);
    }
    if highlighted {
        style = style.add_modifier(Modifier::BOLD);
    }
    style
}

fn word_style(span: &Node) -> Style {
    if span.has_marker(marker::WORD_ADDED) {
        Style::default().bg(Color::Rgb(0, 90, 0))
    } else if span.has_marker(marker::WORD_REMOVED) {
        Style::default().bg(Color::Rgb(100, 0, 0))
    } else {
        Style::default()
    }
}

/// Truncate to `width` columns, expanding tabs and masking control characters
fn truncate(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let (piece, w) = if c == '\t' {
            ("    ".to_string(), 4)
        } else if c.is_control() {
            ('\u{fffd}'.to_string(), 1)
        } else {
            (c.to_string(), c.width().unwrap_or(0))
        };
        if used + w > width {
            break;
        }
        out.push_str(&piece);
        used += w;
    }
    out
}

/// Truncate or pad to exactly `width` columns
fn fit(text: &str, width: usize) -> String {
    let mut out = truncate(text, width);
    let used = out.width();
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    if let Some(prompt) = &app.prompt {
        f.render_widget(&prompt.input, area);
        return;
    }

    let keys = &app.config.keys;
    let content = match &app.message {
        Some(msg) => format!(" {}", msg),
        None => format!(
            " {}/{}: next/prev hunk | j/k: scroll | s: split | d: diff only | o/O: open | ?: help | q: quit",
            keys.next, keys.previous
        ),
    };

    let status = Paragraph::new(content)
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(status, area);
}

fn render_help(f: &mut Frame, app: &App) {
    let area = centered_rect(60, 70, f.area());
    let keys = &app.config.keys;

    let help_text = [
        String::new(),
        "  Hunks:".to_string(),
        format!("    {}         Next hunk", keys.next),
        format!("    {}         Previous hunk", keys.previous),
        String::new(),
        "  Scrolling:".to_string(),
        "    j / ↓     Scroll down".to_string(),
        "    k / ↑     Scroll up".to_string(),
        "    PgDn/PgUp Page down / up".to_string(),
        "    g / G     Top / bottom".to_string(),
        String::new(),
        "  View:".to_string(),
        "    s         Toggle split / unified".to_string(),
        "    d         Toggle diff only".to_string(),
        "    l         Toggle line numbers".to_string(),
        "    o / O     Open new / old file".to_string(),
        String::new(),
        "  Other:".to_string(),
        "    ?         Toggle this help".to_string(),
        "    q         Quit".to_string(),
        String::new(),
    ];

    let help = Paragraph::new(help_text.join("\n"))
        .style(Style::default())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, area);
    f.render_widget(help, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;
    use tempfile::{tempdir, TempDir};

    // Unified rows: [plain, changed, changed, plain, changed]
    const OLD: &str = "one\ntwo\nthree\n";
    const NEW: &str = "one\nTWO\nthree\nfour\n";

    struct Fixture {
        dir: TempDir,
        app: App,
        _rx: Receiver<AppEvent>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let old = dir.path().join("old.txt");
            let new = dir.path().join("new.txt");
            std::fs::write(&old, OLD).unwrap();
            std::fs::write(&new, NEW).unwrap();

            let config = Config {
                split_view: false,
                watch: false,
                smooth_scroll: false,
                ..Config::default()
            };
            let sources = DiffSources::load(&old, &new).unwrap();
            let (tx, rx) = mpsc::channel();
            let mut app = App::new(config, sources, tx).unwrap();
            app.surface.viewport.height = 3;
            Self { dir, app, _rx: rx }
        }

        fn press(&mut self, c: char) {
            self.app.process([key(c)]);
        }

        fn hunk_rows(&self) -> Vec<Vec<usize>> {
            self.app
                .navigator
                .hunks()
                .iter()
                .map(|h| h.rows().iter().map(|r| r.0).collect())
                .collect()
        }

        fn highlighted(&self) -> Vec<usize> {
            self.app
                .surface
                .rows()
                .unwrap()
                .iter()
                .filter(|r| r.has_marker(marker::HIGHLIGHT))
                .map(|r| r.id.0)
                .collect()
        }
    }

    fn key(c: char) -> AppEvent {
        AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    #[test]
    fn test_mount_extracts_hunks() {
        let fx = Fixture::new();
        assert_eq!(fx.hunk_rows(), vec![vec![1, 2], vec![4]]);
        assert_eq!(fx.app.navigator.cursor(), None);
        assert_eq!(fx.app.navigator.status(), "2 hunks");
    }

    #[test]
    fn test_next_highlights_and_saturates() {
        let mut fx = Fixture::new();
        fx.press('n');
        assert_eq!(fx.app.navigator.cursor(), Some(0));
        assert_eq!(fx.highlighted(), vec![1, 2]);

        fx.press('n');
        assert_eq!(fx.app.navigator.cursor(), Some(1));
        assert_eq!(fx.highlighted(), vec![4]);

        fx.press('n');
        assert_eq!(fx.app.navigator.cursor(), Some(1));
        assert_eq!(fx.app.message.as_deref(), Some("Already at last hunk"));

        fx.press('p');
        fx.press('p');
        assert_eq!(fx.app.navigator.cursor(), Some(0));
    }

    #[test]
    fn test_next_scrolls_hunk_into_view() {
        let mut fx = Fixture::new();
        fx.press('n');
        fx.press('n');
        // Row 4 centered in a 3-row viewport over 5 rows
        assert_eq!(fx.app.surface.viewport.offset, 2);
    }

    #[test]
    fn test_keys_in_prompt_do_not_navigate() {
        let mut fx = Fixture::new();
        fx.press('o');
        assert_eq!(fx.app.key_target(), KeyTarget::TextInput);

        fx.press('n');
        assert_eq!(fx.app.navigator.cursor(), None);
        let prompt = fx.app.prompt.as_ref().unwrap();
        assert!(prompt.value().ends_with("new.txtn"));

        fx.app.process([AppEvent::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE))]);
        assert!(fx.app.prompt.is_none());
        assert!(!fx.app.should_quit());
        fx.press('n');
        assert_eq!(fx.app.navigator.cursor(), Some(0));
    }

    #[test]
    fn test_prompt_switches_input_and_resets_cursor() {
        let mut fx = Fixture::new();
        fx.press('n');
        let other = fx.dir.path().join("other.txt");
        std::fs::write(&other, "one\ntwo\nthree\n").unwrap();

        fx.press('o');
        let prompt = fx.app.prompt.as_mut().unwrap();
        prompt.input = TextArea::new(vec![other.to_string_lossy().to_string()]);
        fx.app.process([AppEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))]);

        assert!(fx.app.prompt.is_none());
        assert_eq!(fx.app.sources.new.path, other);
        assert_eq!(fx.app.navigator.cursor(), None);
        assert!(fx.app.navigator.hunks().is_empty());
    }

    #[test]
    fn test_prompt_with_missing_file_keeps_input() {
        let mut fx = Fixture::new();
        fx.app.load_input(Side::Old, "/definitely/not/here.txt");
        assert!(fx.app.message.is_some());
        assert_eq!(fx.hunk_rows().len(), 2);
    }

    #[test]
    fn test_tree_change_resets_cursor() {
        let mut fx = Fixture::new();
        fx.press('n');
        fx.app.process([AppEvent::TreeChanged]);
        assert_eq!(fx.app.navigator.cursor(), None);
        assert!(fx.highlighted().is_empty());
        assert_eq!(fx.hunk_rows(), vec![vec![1, 2], vec![4]]);
    }

    #[test]
    fn test_layout_toggle_rerenders() {
        let mut fx = Fixture::new();
        fx.press('n');
        fx.press('s');
        assert_eq!(fx.app.renderer.layout, DiffLayout::Split);
        assert_eq!(fx.app.navigator.cursor(), None);
        // Split view pairs "two"/"TWO" on one row
        assert_eq!(fx.hunk_rows(), vec![vec![1], vec![3]]);
    }

    #[test]
    fn test_reload_picks_up_disk_changes() {
        let mut fx = Fixture::new();
        fx.press('n');
        let new = fx.dir.path().join("new.txt");
        std::fs::write(&new, OLD).unwrap();

        fx.app.process([AppEvent::SourcesChanged(vec![new])]);
        assert!(fx.app.navigator.hunks().is_empty());
        assert_eq!(fx.app.navigator.cursor(), None);
    }

    #[test]
    fn test_unrelated_path_does_not_rerender() {
        let mut fx = Fixture::new();
        fx.press('n');
        fx.app
            .process([AppEvent::SourcesChanged(vec![fx.dir.path().join("unrelated.txt")])]);
        assert_eq!(fx.app.navigator.cursor(), Some(0));
    }

    #[test]
    fn test_key_after_change_sees_new_rows() {
        let mut fx = Fixture::new();
        let new = fx.dir.path().join("new.txt");
        std::fs::write(&new, "zero\none\ntwo\nthree\n").unwrap();

        fx.app.process([
            AppEvent::TreeChanged,
            AppEvent::SourcesChanged(vec![new]),
            AppEvent::TreeChanged,
            key('n'),
        ]);
        assert_eq!(fx.hunk_rows(), vec![vec![0]]);
        assert_eq!(fx.app.navigator.cursor(), Some(0));
    }

    #[test]
    fn test_tree_changes_coalesce_into_one_rescan() {
        let mut fx = Fixture::new();
        assert_eq!(fx.app.rescans, 1);

        let new = fx.dir.path().join("new.txt");
        std::fs::write(&new, "zero\none\ntwo\nthree\n").unwrap();
        fx.app.process([
            AppEvent::TreeChanged,
            AppEvent::TreeChanged,
            AppEvent::SourcesChanged(vec![new]),
            AppEvent::TreeChanged,
        ]);
        assert_eq!(fx.app.rescans, 2);
        assert_eq!(fx.hunk_rows(), vec![vec![0]]);

        // A key splits the batch: one rescan before it, one at the end
        fx.app.process([
            AppEvent::TreeChanged,
            AppEvent::TreeChanged,
            key('j'),
            AppEvent::TreeChanged,
        ]);
        assert_eq!(fx.app.rescans, 4);

        fx.app.process([key('j')]);
        assert_eq!(fx.app.rescans, 4);
    }

    #[test]
    fn test_help_swallows_next_key() {
        let mut fx = Fixture::new();
        fx.press('?');
        assert!(fx.app.show_help);
        fx.press('n');
        assert!(!fx.app.show_help);
        assert_eq!(fx.app.navigator.cursor(), None);
        fx.press('q');
        assert!(fx.app.should_quit());
    }

    #[test]
    fn test_viewport_smooth_scroll_converges() {
        let mut viewport = Viewport {
            height: 10,
            ..Viewport::default()
        };
        viewport.scroll_to(80, 100, ScrollRequest::default());
        assert_eq!(viewport.target, 75);
        assert_eq!(viewport.offset, 0);

        let mut frames = 0;
        while viewport.tick() {
            frames += 1;
            assert!(frames < 100);
        }
        assert_eq!(viewport.offset, 75);
    }

    #[test]
    fn test_viewport_alignment() {
        let mut viewport = Viewport {
            height: 10,
            ..Viewport::default()
        };
        let instant = |align| ScrollRequest {
            align,
            behavior: ScrollBehavior::Instant,
        };
        viewport.scroll_to(30, 100, instant(ScrollAlign::Start));
        assert_eq!(viewport.offset, 30);
        viewport.scroll_to(35, 100, instant(ScrollAlign::Nearest));
        assert_eq!(viewport.offset, 30);
        viewport.scroll_to(45, 100, instant(ScrollAlign::Nearest));
        assert_eq!(viewport.offset, 36);
        viewport.scroll_to(98, 100, instant(ScrollAlign::Start));
        assert_eq!(viewport.offset, 90);
    }

    #[test]
    fn test_fit_pads_and_truncates() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdef", 3), "abc");
        assert_eq!(fit("\tx", 6), "    x ");
        assert_eq!(fit("日本", 3), "日 ");
    }

    #[test]
    fn test_control_characters_are_masked() {
        assert_eq!(truncate("a\x1b[31mred", 20), "a\u{fffd}[31mred");
        assert_eq!(fit("x\ry", 4), "x\u{fffd}y ");
        assert_eq!(fit("\x07\x07\x07", 2), "\u{fffd}\u{fffd}");
    }

    #[test]
    fn test_draws_without_panicking() {
        let mut fx = Fixture::new();
        fx.press('n');
        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        terminal.draw(|f| ui(f, &mut fx.app)).unwrap();
        assert_eq!(fx.app.surface.viewport.height, 4);

        fx.press('?');
        terminal.draw(|f| ui(f, &mut fx.app)).unwrap();
    }
}
