//! Command-line interface: argument parsing and command dispatch.

pub mod args;
pub mod commands;

use std::path::PathBuf;

pub use args::{Cli, Commands};

use crate::config::Settings;
use crate::error::IndexResult;

/// Text or JSON output, chosen by the global `--json` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json { OutputFormat::Json } else { OutputFormat::Text }
    }
}

/// Project root for a command: explicit path, then `--project`, then the
/// workspace root, then the current directory.
pub fn project_root(explicit: Option<PathBuf>, cli: &Cli, settings: &Settings) -> PathBuf {
    explicit
        .or_else(|| cli.project.clone())
        .or_else(|| settings.workspace_root.clone())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Dispatch a parsed command.
pub fn run(cli: Cli, mut settings: Settings) -> IndexResult<()> {
    let format = OutputFormat::from_json_flag(cli.json);

    match &cli.command {
        Commands::Init { force } => commands::init::run_init(*force),
        Commands::Config => commands::init::run_config(&settings, format),
        Commands::Index { path, force, threads } => {
            if let Some(threads) = threads {
                settings.indexing.parallel_threads = *threads;
            }
            let root = project_root(path.clone(), &cli, &settings);
            commands::index::run_index(settings, &root, *force, format)
        }
        Commands::Watch { path } => {
            let root = project_root(path.clone(), &cli, &settings);
            commands::index::run_watch(settings, &root)
        }
        Commands::Find { name } => {
            let root = project_root(None, &cli, &settings);
            commands::retrieve::run_find(settings, &root, name, format)
        }
        Commands::List { kind, limit } => {
            let root = project_root(None, &cli, &settings);
            commands::retrieve::run_list(settings, &root, *kind, *limit, format)
        }
        Commands::Callers { symbol, depth } => {
            let root = project_root(None, &cli, &settings);
            commands::retrieve::run_calls(settings, &root, symbol, *depth, commands::retrieve::Direction::Callers, format)
        }
        Commands::Callees { symbol, depth } => {
            let root = project_root(None, &cli, &settings);
            commands::retrieve::run_calls(settings, &root, symbol, *depth, commands::retrieve::Direction::Callees, format)
        }
        Commands::Stats => {
            let root = project_root(None, &cli, &settings);
            commands::retrieve::run_stats(settings, &root, format)
        }
        Commands::Includes { file } => {
            let root = project_root(None, &cli, &settings);
            commands::retrieve::run_includes(settings, &root, file.as_deref(), format)
        }
        Commands::Projects => commands::projects::run_projects(&settings, format),
        Commands::Clean { project_id, orphans, all } => {
            let root = project_root(None, &cli, &settings);
            commands::projects::run_clean(&settings, &root, project_id.as_deref(), *orphans, *all)
        }
    }
}
