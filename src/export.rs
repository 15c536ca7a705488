//! Export extracted hunks as text or JSON

use anyhow::Result;
use serde::Serialize;

use crate::diff::{Node, RenderedDiff, Row};
use crate::navigator::Hunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "patch" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct HunkRecord {
    index: usize,
    first_row: usize,
    last_row: usize,
    old_lines: Option<(u32, u32)>,
    new_lines: Option<(u32, u32)>,
    lines: Vec<LineRecord>,
}

#[derive(Debug, Serialize)]
struct LineRecord {
    kind: &'static str,
    old_line_no: Option<u32>,
    new_line_no: Option<u32>,
    text: String,
}

/// Export `hunks` (extracted from `diff`) in the given format
pub fn export(diff: &RenderedDiff, hunks: &[Hunk], format: ExportFormat) -> Result<String> {
    let records: Vec<HunkRecord> = hunks
        .iter()
        .enumerate()
        .map(|(i, hunk)| to_record(i + 1, diff, hunk))
        .collect();

    match format {
        ExportFormat::Text => Ok(export_text(&records)),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&records)? + "\n"),
    }
}

fn to_record(index: usize, diff: &RenderedDiff, hunk: &Hunk) -> HunkRecord {
    let rows: Vec<&Row> = hunk.rows().iter().filter_map(|id| diff.row(*id)).collect();

    HunkRecord {
        index,
        first_row: hunk.first().0,
        last_row: hunk.last().0,
        old_lines: span(rows.iter().filter_map(|r| r.old_line_no)),
        new_lines: span(rows.iter().filter_map(|r| r.new_line_no)),
        lines: rows
            .iter()
            .map(|row| LineRecord {
                kind: match (row.old_line_no, row.new_line_no) {
                    (Some(_), None) => "removed",
                    (None, Some(_)) => "added",
                    _ => "changed",
                },
                old_line_no: row.old_line_no,
                new_line_no: row.new_line_no,
                text: row.contents().map(Node::text_content).collect::<Vec<_>>().join(" | "),
            })
            .collect(),
    }
}

fn span(numbers: impl Iterator<Item = u32>) -> Option<(u32, u32)> {
    numbers.fold(None, |acc, n| match acc {
        None => Some((n, n)),
        Some((lo, hi)) => Some((lo.min(n), hi.max(n))),
    })
}

fn export_text(records: &[HunkRecord]) -> String {
    let mut output = String::new();

    if records.is_empty() {
        output.push_str("No hunks\n");
        return output;
    }

    for record in records {
        output.push_str(&format!(
            "@@ hunk {}: old {}, new {} @@\n",
            record.index,
            format_span(record.old_lines),
            format_span(record.new_lines)
        ));
        for line in &record.lines {
            let sign = match line.kind {
                "removed" => '-',
                "added" => '+',
                _ => '~',
            };
            output.push_str(&format!("{}{}\n", sign, line.text));
        }
    }

    output
}

fn format_span(span: Option<(u32, u32)>) -> String {
    match span {
        None => "none".to_string(),
        Some((lo, hi)) if lo == hi => lo.to_string(),
        Some((lo, hi)) => format!("{}-{}", lo, hi),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ClassifierConfig, MarkerMatcher};
    use crate::diff::{DiffRenderer, Layout};
    use crate::navigator::extract_hunks;

    fn unified(old: &str, new: &str) -> (RenderedDiff, Vec<Hunk>) {
        let renderer = DiffRenderer {
            layout: Layout::Unified,
            ..DiffRenderer::default()
        };
        let diff = renderer.render(old, new);
        let matcher = MarkerMatcher::new(&ClassifierConfig::default()).unwrap();
        let hunks = extract_hunks(&diff.rows, &matcher);
        (diff, hunks)
    }

    #[test]
    fn test_export_text() {
        let (diff, hunks) = unified("a\nb\nc\nd\n", "a\nB\nc\nd\ne\nf\n");
        let text = export(&diff, &hunks, ExportFormat::Text).unwrap();

        assert_eq!(
            text,
            "@@ hunk 1: old 2, new 2 @@\n-b\n+B\n@@ hunk 2: old none, new 5-6 @@\n+e\n+f\n"
        );
    }

    #[test]
    fn test_export_json() {
        let (diff, hunks) = unified("a\nb\n", "a\nc\n");
        let json = export(&diff, &hunks, ExportFormat::Json).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let first = &parsed[0];
        assert_eq!(first["index"], 1);
        assert_eq!(first["first_row"], 1);
        assert_eq!(first["last_row"], 2);
        assert_eq!(first["lines"][0]["kind"], "removed");
        assert_eq!(first["lines"][1]["text"], "c");
        assert_eq!(first["new_lines"][0], 2);
    }

    #[test]
    fn test_export_without_hunks() {
        let (diff, hunks) = unified("same\n", "same\n");
        assert_eq!(export(&diff, &hunks, ExportFormat::Text).unwrap(), "No hunks\n");
        assert_eq!(export(&diff, &hunks, ExportFormat::Json).unwrap(), "[]\n");
    }

    #[test]
    fn test_format_names() {
        assert_eq!(ExportFormat::from_str("JSON"), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_str("txt"), Some(ExportFormat::Text));
        assert_eq!(ExportFormat::from_str("yaml"), None);
    }
}
