//! hunknav - two-file diff viewer with keyboard hunk navigation
//!
//! Renders old and new versions of a file side by side (or unified) and lets
//! the user jump between hunks, the runs of changed rows, with single keys.

mod classify;
mod config;
mod diff;
mod events;
mod export;
mod keys;
mod navigator;
mod session;
mod tui;
mod watch;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

use crate::classify::MarkerMatcher;
use crate::config::Config;
use crate::diff::{DiffRenderer, DiffSources, Layout};
use crate::export::{export, ExportFormat};
use crate::navigator::extract_hunks;

#[derive(Parser)]
#[command(name = "hunknav")]
#[command(about = "Two-file diff viewer with keyboard hunk navigation")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.hunknav/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// View the diff interactively
    View {
        /// Old version of the file
        old: PathBuf,

        /// New version of the file
        new: PathBuf,

        /// Show a unified diff instead of side by side
        #[arg(short, long)]
        unified: bool,

        /// Fold unchanged lines away from changes
        #[arg(short, long)]
        diff_only: bool,

        /// Hide line numbers
        #[arg(long)]
        no_line_numbers: bool,

        /// Do not reload inputs when they change on disk
        #[arg(long)]
        no_watch: bool,
    },

    /// Print the hunks between two files
    Hunks {
        old: PathBuf,

        new: PathBuf,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a default config file
    InitConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::View {
            old,
            new,
            unified,
            diff_only,
            no_line_numbers,
            no_watch,
        } => {
            let config = Config::load_from(&config_path)?.with_overrides(
                unified.then_some(false),
                diff_only.then_some(true),
                no_line_numbers.then_some(false),
                no_watch.then_some(false),
            );
            cmd_view(config, &old, &new)?;
        }
        Commands::Hunks {
            old,
            new,
            format,
            output,
        } => {
            let config = Config::load_from(&config_path)?;
            cmd_hunks(&config, &old, &new, &format, output)?;
        }
        Commands::InitConfig => {
            cmd_init_config(&config_path)?;
        }
    }

    Ok(())
}

/// Log to the file named by HUNKNAV_LOG; the terminal belongs to the viewer
fn init_logging() -> Result<()> {
    let Some(path) = std::env::var_os("HUNKNAV_LOG") else {
        return Ok(());
    };

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", PathBuf::from(&path).display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

fn cmd_view(config: Config, old: &Path, new: &Path) -> Result<()> {
    let sources = DiffSources::load(old, new)?;
    info!("viewing {} -> {}", old.display(), new.display());

    tui::run(config, sources)
}

fn cmd_hunks(
    config: &Config,
    old: &Path,
    new: &Path,
    format: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let export_format =
        ExportFormat::from_str(format).context("Invalid format. Use: text or json")?;

    let sources = DiffSources::load(old, new)?;
    let renderer = DiffRenderer {
        layout: Layout::Unified,
        ..DiffRenderer::from_config(config)
    };
    let diff = sources.render(&renderer);

    let matcher = MarkerMatcher::new(&config.classifier)?;
    let hunks = extract_hunks(&diff.rows, &matcher);
    info!("found {} hunks using {:?} marker matching", hunks.len(), matcher.mode());

    let content = export(&diff, &hunks, export_format)?;

    if let Some(path) = output {
        std::fs::write(&path, &content)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
        println!("Exported {} hunks to {}", hunks.len(), path.display());
    } else {
        print!("{}", content);
    }

    Ok(())
}

fn cmd_init_config(path: &Path) -> Result<()> {
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    Config::create_default(path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
