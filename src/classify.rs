//! Change classification of rendered markers
//!
//! The renderer tags nodes with free-form marker strings. This module decides
//! which of those markers mean "this row is part of a change". The vocabulary
//! belongs to the renderer, so whenever the renderer's marker names change
//! this is the place to update.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::diff::{marker, Row};

/// Kinds of change a marker can announce
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Added,
    Removed,
    Changed,
    Inserted,
    Deleted,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Self::Added,
        Self::Removed,
        Self::Changed,
        Self::Inserted,
        Self::Deleted,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Changed => "changed",
            Self::Inserted => "inserted",
            Self::Deleted => "deleted",
        }
    }
}

/// How marker strings are compared against the vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Marker must be a known vocabulary entry
    #[default]
    Exact,
    /// A keyword must appear as a whole `-`/`_` delimited token
    Token,
    /// A keyword may appear anywhere in the marker
    Substring,
}

/// Classifier settings as read from the config file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub mode: MatchMode,
    /// Additional exact markers, e.g. `"ins" = "inserted"`
    pub extra_markers: BTreeMap<String, Classification>,
}

/// Decides whether markers (and therefore rows) denote a change
#[derive(Debug, Clone)]
pub struct MarkerMatcher {
    mode: MatchMode,
    vocabulary: BTreeMap<String, Classification>,
    token: Regex,
}

impl MarkerMatcher {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let mut vocabulary: BTreeMap<String, Classification> = [
            (marker::DIFF_ADDED, Classification::Added),
            (marker::DIFF_REMOVED, Classification::Removed),
            (marker::WORD_ADDED, Classification::Added),
            (marker::WORD_REMOVED, Classification::Removed),
            (marker::DIFF_CHANGED, Classification::Changed),
        ]
        .into_iter()
        .map(|(m, c)| (m.to_string(), c))
        .collect();
        vocabulary.extend(config.extra_markers.clone());

        let keywords: Vec<&str> = Classification::ALL.iter().map(|c| c.keyword()).collect();
        let token = Regex::new(&format!(r"(?i)(?:^|[-_])({})(?:$|[-_])", keywords.join("|")))
            .context("Failed to build classification pattern")?;

        Ok(Self {
            mode: config.mode,
            vocabulary,
            token,
        })
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn classify(&self, marker: &str) -> Option<Classification> {
        match self.mode {
            MatchMode::Exact => self.vocabulary.get(marker).copied(),
            MatchMode::Token => self
                .token
                .captures(marker)
                .and_then(|caps| caps.get(1))
                .and_then(|m| keyword_class(&m.as_str().to_lowercase())),
            MatchMode::Substring => {
                let lower = marker.to_lowercase();
                Classification::ALL
                    .into_iter()
                    .find(|c| lower.contains(c.keyword()))
            }
        }
    }

    /// A row is a change row if any node in it carries a classified marker
    pub fn is_change_row(&self, row: &Row) -> bool {
        row.descendants()
            .flat_map(|node| node.markers.iter())
            .any(|m| self.classify(m).is_some())
    }
}

fn keyword_class(keyword: &str) -> Option<Classification> {
    Classification::ALL.into_iter().find(|c| c.keyword() == keyword)
}
