//! Configuration module for hunknav
//!
//! Loads user configuration from ~/.hunknav/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classify::ClassifierConfig;
use crate::keys::KeyBindings;
use crate::navigator::{ScrollAlign, ScrollBehavior, ScrollRequest};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Show old and new side by side (default true)
    pub split_view: bool,
    pub show_line_numbers: bool,
    /// Fold unchanged lines away from changes
    pub show_diff_only: bool,
    /// Number of context lines kept around changes when folding (default 3)
    pub context_lines: u32,
    /// Animate scrolling to the selected hunk
    pub smooth_scroll: bool,
    pub scroll_align: ScrollAlign,
    /// Reload inputs when they change on disk
    pub watch: bool,
    pub keys: KeyBindings,
    pub classifier: ClassifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            split_view: true,
            show_line_numbers: true,
            show_diff_only: false,
            context_lines: 3,
            smooth_scroll: true,
            scroll_align: ScrollAlign::default(),
            watch: true,
            keys: KeyBindings::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.keys.validate()?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hunknav")
            .join("config.toml")
    }

    /// Merge CLI overrides into config
    pub fn with_overrides(
        mut self,
        split_view: Option<bool>,
        show_diff_only: Option<bool>,
        show_line_numbers: Option<bool>,
        watch: Option<bool>,
    ) -> Self {
        if let Some(split) = split_view {
            self.split_view = split;
        }
        if let Some(diff_only) = show_diff_only {
            self.show_diff_only = diff_only;
        }
        if let Some(numbers) = show_line_numbers {
            self.show_line_numbers = numbers;
        }
        if let Some(watch) = watch {
            self.watch = watch;
        }
        self
    }

    pub fn scroll_request(&self) -> ScrollRequest {
        ScrollRequest {
            align: self.scroll_align,
            behavior: if self.smooth_scroll {
                ScrollBehavior::Smooth
            } else {
                ScrollBehavior::Instant
            },
        }
    }

    /// Write a default config file to `path`
    pub fn create_default(path: &Path) -> Result<()> {
        let config = Config::default();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(&config).context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
