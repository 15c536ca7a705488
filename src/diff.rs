//! Diff rendering using the similar crate
//!
//! Turns two text blobs into an ordered list of rendered rows. Each row is a
//! small tree of nodes carrying string markers that describe what the node
//! shows (line number, gutter sign, content, added/removed, ...). Consumers
//! never look at the diff itself, only at the markers on the rendered rows.

use anyhow::{Context, Result};
use serde::Serialize;
use similar::{ChangeTag, DiffOp, DiffTag, TextDiff};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Marker vocabulary emitted by [`DiffRenderer`].
pub mod marker {
    pub const ROW: &str = "row";
    pub const LINE_NUMBER: &str = "line-number";
    pub const GUTTER: &str = "marker";
    pub const CONTENT: &str = "content";
    pub const DIFF_ADDED: &str = "diff-added";
    pub const DIFF_REMOVED: &str = "diff-removed";
    pub const WORD_ADDED: &str = "word-added";
    pub const WORD_REMOVED: &str = "word-removed";
    /// Modified in place; not emitted here but recognised for foreign renderers
    pub const DIFF_CHANGED: &str = "diff-changed";
    pub const EMPTY_LINE: &str = "empty-line";
    pub const CODE_FOLD: &str = "code-fold";
    /// Presentational marker toggled by the hunk navigator
    pub const HIGHLIGHT: &str = "hunk-highlight";
}

/// Which input a line (or a file) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Old,
    New,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Old => "old",
            Self::New => "new",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Old and new side by side, one row per line pair
    Split,
    /// Removed lines followed by added lines, one row per line
    Unified,
}

/// One element of a rendered row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    pub markers: Vec<String>,
    pub text: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(markers: &[&str]) -> Self {
        Self {
            markers: markers.iter().map(|m| m.to_string()).collect(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }

    /// Pre-order walk over this node and everything below it
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Concatenated text of the leaves under this node
    pub fn text_content(&self) -> String {
        if self.children.is_empty() {
            return self.text.clone();
        }
        self.children.iter().map(Node::text_content).collect()
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Identity of a row: its position in the rendered tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RowId(pub usize);

/// A single rendered line of the diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: RowId,
    pub old_line_no: Option<u32>,
    pub new_line_no: Option<u32>,
    pub root: Node,
}

impl Row {
    pub fn descendants(&self) -> Descendants<'_> {
        self.root.descendants()
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.root.has_marker(marker)
    }

    /// Add or remove a marker on the row element itself
    pub fn set_marker(&mut self, marker: &str, on: bool) {
        let present = self.root.has_marker(marker);
        if on && !present {
            self.root.markers.push(marker.to_string());
        } else if !on && present {
            self.root.markers.retain(|m| m != marker);
        }
    }

    /// Content cells of the row, left to right
    pub fn contents(&self) -> impl Iterator<Item = &Node> {
        self.root
            .children
            .iter()
            .filter(|c| c.has_marker(marker::CONTENT) && !c.has_marker(marker::EMPTY_LINE))
    }
}

/// Output of one render pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiff {
    pub layout: Layout,
    pub rows: Vec<Row>,
}

impl RenderedDiff {
    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id.0)
    }

    pub fn row_mut(&mut self, id: RowId) -> Option<&mut Row> {
        self.rows.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Renders two texts into rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffRenderer {
    pub layout: Layout,
    pub show_line_numbers: bool,
    /// Fold unchanged runs, keeping `context_lines` around each change
    pub show_diff_only: bool,
    pub context_lines: usize,
}

impl Default for DiffRenderer {
    fn default() -> Self {
        Self {
            layout: Layout::Split,
            show_line_numbers: true,
            show_diff_only: false,
            context_lines: 3,
        }
    }
}

impl DiffRenderer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            layout: if config.split_view {
                Layout::Split
            } else {
                Layout::Unified
            },
            show_line_numbers: config.show_line_numbers,
            show_diff_only: config.show_diff_only,
            context_lines: config.context_lines as usize,
        }
    }

    pub fn render(&self, old: &str, new: &str) -> RenderedDiff {
        let diff = TextDiff::from_lines(old, new);
        let old_lines: Vec<&str> = diff.old_slices().iter().map(|l| trim_newline(l)).collect();
        let new_lines: Vec<&str> = diff.new_slices().iter().map(|l| trim_newline(l)).collect();

        let mut builder = RowBuilder {
            renderer: self,
            old: &old_lines,
            new: &new_lines,
            rows: Vec::new(),
        };

        if self.show_diff_only {
            let mut old_seen = 0;
            let mut new_seen = 0;
            for group in diff.grouped_ops(self.context_lines) {
                let (Some(first), Some(last)) = (group.first(), group.last()) else {
                    continue;
                };
                let (_, old_range, _) = first.as_tag_tuple();
                if old_range.start > old_seen {
                    builder.push_fold(old_seen, new_seen, old_range.start - old_seen);
                }
                for op in &group {
                    builder.push_op(op);
                }
                let (_, old_range, new_range) = last.as_tag_tuple();
                old_seen = old_range.end;
                new_seen = new_range.end;
            }
            if old_seen < old_lines.len() {
                builder.push_fold(old_seen, new_seen, old_lines.len() - old_seen);
            }
        } else {
            for op in diff.ops() {
                builder.push_op(op);
            }
        }

        RenderedDiff {
            layout: self.layout,
            rows: builder.rows,
        }
    }
}

struct RowBuilder<'a> {
    renderer: &'a DiffRenderer,
    old: &'a [&'a str],
    new: &'a [&'a str],
    rows: Vec<Row>,
}

impl RowBuilder<'_> {
    fn push_op(&mut self, op: &DiffOp) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {
                for (o, n) in old_range.zip(new_range) {
                    self.push_line(Some(o), Some(n), None);
                }
            }
            DiffTag::Delete => {
                for o in old_range {
                    self.push_line(Some(o), None, None);
                }
            }
            DiffTag::Insert => {
                for n in new_range {
                    self.push_line(None, Some(n), None);
                }
            }
            DiffTag::Replace => match self.renderer.layout {
                Layout::Unified => {
                    for o in old_range {
                        self.push_line(Some(o), None, None);
                    }
                    for n in new_range {
                        self.push_line(None, Some(n), None);
                    }
                }
                Layout::Split => {
                    let pairs = old_range.len().max(new_range.len());
                    for i in 0..pairs {
                        let o = Some(old_range.start + i).filter(|o| *o < old_range.end);
                        let n = Some(new_range.start + i).filter(|n| *n < new_range.end);
                        let words = match (o, n) {
                            (Some(o), Some(n)) => Some(word_spans(self.old[o], self.new[n])),
                            _ => None,
                        };
                        self.push_line(o, n, words);
                    }
                }
            },
        }
    }

    /// Push one row. `old`/`new` are zero-based line indexes; a line present
    /// on only one side is a removal or an addition.
    fn push_line(&mut self, old: Option<usize>, new: Option<usize>, words: Option<(Vec<Node>, Vec<Node>)>) {
        let change = match (old, new) {
            (Some(_), None) => Some(marker::DIFF_REMOVED),
            (None, Some(_)) => Some(marker::DIFF_ADDED),
            _ if words.is_some() => Some(marker::DIFF_REMOVED),
            _ => None,
        };
        let old_no = old.map(|o| o as u32 + 1);
        let new_no = new.map(|n| n as u32 + 1);

        let children = match self.renderer.layout {
            Layout::Split => {
                let (old_words, new_words) = match words {
                    Some((l, r)) => (Some(l), Some(r)),
                    None => (None, None),
                };
                let paired = old.is_some() && new.is_some();
                let old_change = if paired && old_words.is_none() {
                    None
                } else {
                    Some(marker::DIFF_REMOVED)
                };
                let new_change = if paired && new_words.is_none() {
                    None
                } else {
                    Some(marker::DIFF_ADDED)
                };

                let mut cells = match old {
                    Some(o) => self.side_cells(old_no, old_change, "-", self.old[o], old_words),
                    None => self.empty_cells(),
                };
                cells.extend(match new {
                    Some(n) => self.side_cells(new_no, new_change, "+", self.new[n], new_words),
                    None => self.empty_cells(),
                });
                cells
            }
            Layout::Unified => {
                let mut cells = Vec::new();
                if self.renderer.show_line_numbers {
                    cells.push(line_number_cell(old_no, change));
                    cells.push(line_number_cell(new_no, change));
                }
                let (sign, text) = match (old, new) {
                    (None, Some(n)) => ("+", self.new[n]),
                    (Some(o), None) => ("-", self.old[o]),
                    (Some(o), Some(_)) => (" ", self.old[o]),
                    (None, None) => (" ", ""),
                };
                let sign = if change.is_some() { sign } else { " " };
                cells.push(gutter_cell(sign, change));
                cells.push(content_cell(text, change, None));
                cells
            }
        };

        self.push_row(old_no, new_no, Node::new(&[marker::ROW]).with_children(children));
    }

    fn side_cells(
        &self,
        line_no: Option<u32>,
        change: Option<&str>,
        sign: &str,
        text: &str,
        words: Option<Vec<Node>>,
    ) -> Vec<Node> {
        let mut cells = Vec::new();
        if self.renderer.show_line_numbers {
            cells.push(line_number_cell(line_no, change));
        }
        cells.push(gutter_cell(if change.is_some() { sign } else { " " }, change));
        cells.push(content_cell(text, change, words));
        cells
    }

    fn empty_cells(&self) -> Vec<Node> {
        let mut cells = Vec::new();
        if self.renderer.show_line_numbers {
            cells.push(Node::new(&[marker::LINE_NUMBER, marker::EMPTY_LINE]));
        }
        cells.push(Node::new(&[marker::GUTTER, marker::EMPTY_LINE]));
        cells.push(Node::new(&[marker::CONTENT, marker::EMPTY_LINE]));
        cells
    }

    fn push_fold(&mut self, old_start: usize, new_start: usize, hidden: usize) {
        let text = format!(
            "@@ -{},{} +{},{} @@ {} unchanged line{} hidden",
            old_start + 1,
            hidden,
            new_start + 1,
            hidden,
            hidden,
            if hidden == 1 { "" } else { "s" }
        );
        let root = Node::new(&[marker::ROW, marker::CODE_FOLD]).with_text(text);
        self.push_row(None, None, root);
    }

    fn push_row(&mut self, old_line_no: Option<u32>, new_line_no: Option<u32>, root: Node) {
        let id = RowId(self.rows.len());
        self.rows.push(Row {
            id,
            old_line_no,
            new_line_no,
            root,
        });
    }
}

fn line_number_cell(line_no: Option<u32>, change: Option<&str>) -> Node {
    Node::new(&with_change(marker::LINE_NUMBER, change))
        .with_text(line_no.map(|n| n.to_string()).unwrap_or_default())
}

fn gutter_cell(sign: &str, change: Option<&str>) -> Node {
    Node::new(&with_change(marker::GUTTER, change)).with_text(sign)
}

fn content_cell(text: &str, change: Option<&str>, words: Option<Vec<Node>>) -> Node {
    let node = Node::new(&with_change(marker::CONTENT, change));
    match words {
        Some(spans) => node.with_children(spans),
        None => node.with_text(text),
    }
}

fn with_change<'a>(base: &'a str, change: Option<&'a str>) -> Vec<&'a str> {
    let mut markers = vec![base];
    markers.extend(change);
    markers
}

/// Word-level spans for a replaced line pair: (old side, new side)
fn word_spans(old: &str, new: &str) -> (Vec<Node>, Vec<Node>) {
    let diff = TextDiff::from_words(old, new);
    let mut left = Vec::new();
    let mut right = Vec::new();
    for change in diff.iter_all_changes() {
        let text = change.value();
        match change.tag() {
            ChangeTag::Equal => {
                push_span(&mut left, text, None);
                push_span(&mut right, text, None);
            }
            ChangeTag::Delete => push_span(&mut left, text, Some(marker::WORD_REMOVED)),
            ChangeTag::Insert => push_span(&mut right, text, Some(marker::WORD_ADDED)),
        }
    }
    (left, right)
}

fn push_span(spans: &mut Vec<Node>, text: &str, word_marker: Option<&str>) {
    let markers: Vec<&str> = word_marker.into_iter().collect();
    if let Some(last) = spans.last_mut() {
        if last.markers.iter().map(String::as_str).eq(markers.iter().copied()) {
            last.text.push_str(text);
            return;
        }
    }
    spans.push(Node::new(&markers).with_text(text));
}

fn trim_newline(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

/// One input file of the diff
#[derive(Debug, Clone)]
pub struct Source {
    pub path: PathBuf,
    pub text: String,
}

impl Source {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            text,
        })
    }

    /// Re-read the file; returns whether the text changed
    pub fn reload(&mut self) -> Result<bool> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if text == self.text {
            return Ok(false);
        }
        self.text = text;
        Ok(true)
    }

    pub fn display_name(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

/// The old/new pair being compared
#[derive(Debug, Clone)]
pub struct DiffSources {
    pub old: Source,
    pub new: Source,
}

impl DiffSources {
    pub fn load(old: &Path, new: &Path) -> Result<Self> {
        Ok(Self {
            old: Source::load(old)?,
            new: Source::load(new)?,
        })
    }

    pub fn get(&self, side: Side) -> &Source {
        match side {
            Side::Old => &self.old,
            Side::New => &self.new,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut Source {
        match side {
            Side::Old => &mut self.old,
            Side::New => &mut self.new,
        }
    }

    /// Sides whose file path matches `path`
    pub fn sides_for(&self, path: &Path) -> Vec<Side> {
        [Side::Old, Side::New]
            .into_iter()
            .filter(|side| same_file(&self.get(*side).path, path))
            .collect()
    }

    pub fn render(&self, renderer: &DiffRenderer) -> RenderedDiff {
        renderer.render(&self.old.text, &self.new.text)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn unified() -> DiffRenderer {
        DiffRenderer {
            layout: Layout::Unified,
            ..DiffRenderer::default()
        }
    }

    fn is_marked(row: &Row, wanted: &str) -> bool {
        row.descendants().any(|n| n.has_marker(wanted))
    }

    #[test]
    fn test_unified_rows_follow_line_order() {
        let diff = unified().render("a\nb\nc\n", "a\nB\nc\nd\n");
        let signs: Vec<String> = diff
            .rows
            .iter()
            .map(|r| {
                r.root
                    .children
                    .iter()
                    .find(|c| c.has_marker(marker::GUTTER))
                    .map(|c| c.text.clone())
                    .unwrap_or_default()
            })
            .collect();
        assert_eq!(signs, vec![" ", "-", "+", " ", "+"]);
        assert_eq!(diff.rows[1].old_line_no, Some(2));
        assert_eq!(diff.rows[1].new_line_no, None);
        assert_eq!(diff.rows[4].new_line_no, Some(4));
        assert!(diff.rows.iter().enumerate().all(|(i, r)| r.id == RowId(i)));
    }

    #[test]
    fn test_split_replace_pairs_lines_with_word_markers() {
        let diff = DiffRenderer::default().render("let x = 1;\n", "let x = 2;\n");
        assert_eq!(diff.len(), 1);
        let row = &diff.rows[0];
        assert!(is_marked(row, marker::WORD_REMOVED));
        assert!(is_marked(row, marker::WORD_ADDED));
        assert_eq!(row.old_line_no, Some(1));
        assert_eq!(row.new_line_no, Some(1));

        let contents: Vec<String> = row.contents().map(Node::text_content).collect();
        assert_eq!(contents, vec!["let x = 1;", "let x = 2;"]);
    }

    #[test]
    fn test_split_uneven_replace_leaves_empty_side() {
        let diff = DiffRenderer::default().render("a\n", "b\nc\n");
        assert_eq!(diff.len(), 2);
        assert!(is_marked(&diff.rows[1], marker::EMPTY_LINE));
        assert!(is_marked(&diff.rows[1], marker::DIFF_ADDED));
        assert!(!is_marked(&diff.rows[1], marker::DIFF_REMOVED));
    }

    #[test]
    fn test_equal_rows_carry_no_change_markers() {
        let diff = DiffRenderer::default().render("same\n", "same\n");
        assert_eq!(diff.len(), 1);
        let row = &diff.rows[0];
        assert!(!is_marked(row, marker::DIFF_ADDED));
        assert!(!is_marked(row, marker::DIFF_REMOVED));
    }

    #[test]
    fn test_line_numbers_can_be_hidden() {
        let renderer = DiffRenderer {
            show_line_numbers: false,
            ..DiffRenderer::default()
        };
        let diff = renderer.render("a\n", "b\n");
        assert!(!is_marked(&diff.rows[0], marker::LINE_NUMBER));
    }

    #[test]
    fn test_diff_only_folds_unchanged_runs() {
        let old: String = (1..=20).map(|i| format!("line {}\n", i)).collect();
        let new = old.replace("line 10\n", "line ten\n");
        let renderer = DiffRenderer {
            layout: Layout::Unified,
            show_diff_only: true,
            context_lines: 2,
            ..DiffRenderer::default()
        };
        let diff = renderer.render(&old, &new);

        let folds: Vec<&Row> = diff
            .rows
            .iter()
            .filter(|r| r.has_marker(marker::CODE_FOLD))
            .collect();
        assert_eq!(folds.len(), 2);
        assert!(folds[0].root.text.contains("7 unchanged lines"));
        assert!(folds[1].root.text.contains("8 unchanged lines"));
        // 2 context + removed + added + 2 context, plus the folds
        assert_eq!(diff.len(), 8);
    }

    #[test]
    fn test_diff_only_identical_inputs_fold_everything() {
        let renderer = DiffRenderer {
            show_diff_only: true,
            ..DiffRenderer::default()
        };
        let diff = renderer.render("a\nb\n", "a\nb\n");
        assert_eq!(diff.len(), 1);
        assert!(diff.rows[0].has_marker(marker::CODE_FOLD));
    }

    #[test]
    fn test_empty_inputs_render_no_rows() {
        assert!(DiffRenderer::default().render("", "").is_empty());
    }

    #[test]
    fn test_set_marker_toggles_once() {
        let mut diff = unified().render("a\n", "b\n");
        let row = diff.row_mut(RowId(0)).unwrap();
        row.set_marker(marker::HIGHLIGHT, true);
        row.set_marker(marker::HIGHLIGHT, true);
        assert_eq!(row.root.markers.iter().filter(|m| *m == marker::HIGHLIGHT).count(), 1);
        row.set_marker(marker::HIGHLIGHT, false);
        assert!(!row.has_marker(marker::HIGHLIGHT));
    }

    #[test]
    fn test_source_reload_reports_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.txt");
        std::fs::write(&path, "one\n").unwrap();

        let mut source = Source::load(&path).unwrap();
        assert!(!source.reload().unwrap());
        std::fs::write(&path, "two\n").unwrap();
        assert!(source.reload().unwrap());
        assert_eq!(source.text, "two\n");
    }

    #[test]
    fn test_sources_match_paths_to_sides() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old.txt");
        let new = dir.path().join("new.txt");
        std::fs::write(&old, "a\n").unwrap();
        std::fs::write(&new, "b\n").unwrap();

        let sources = DiffSources::load(&old, &new).unwrap();
        assert_eq!(sources.sides_for(&new), vec![Side::New]);
        assert!(sources.sides_for(&dir.path().join("other.txt")).is_empty());
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(Source::load(&dir.path().join("missing.txt")).is_err());
    }
}
