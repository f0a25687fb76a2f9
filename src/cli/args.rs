//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::types::SymbolKind;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "symgraph",
    version,
    about = "Symbol table and call graph for C/C++ trees, no build required",
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Project root for query commands (defaults to the workspace root)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up .symgraph directory with default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Build the index for a project
    Index {
        /// Project root (defaults to the workspace root)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Rebuild even if an index exists
        #[arg(short, long)]
        force: bool,

        /// Number of parser threads (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,
    },

    /// Watch a project and update the index as files change
    Watch {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Find symbols by exact name
    Find { name: String },

    /// List symbols, optionally filtered by kind
    List {
        /// function, structure, variable, macro, typedef or enum
        #[arg(short, long)]
        kind: Option<SymbolKind>,

        /// Maximum number of results (0 for all)
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Show functions calling a symbol (id or function name)
    Callers {
        symbol: String,

        #[arg(short, long, default_value_t = crate::storage::DEFAULT_DEPTH)]
        depth: usize,
    },

    /// Show functions called by a symbol (id or function name)
    Callees {
        symbol: String,

        #[arg(short, long, default_value_t = crate::storage::DEFAULT_DEPTH)]
        depth: usize,
    },

    /// Show symbol counts for a project
    Stats,

    /// List raw include directives
    Includes {
        /// Only show includes of this project-relative file
        file: Option<String>,
    },

    /// List indexed projects
    Projects,

    /// Remove index data
    Clean {
        /// Project id to remove (defaults to the current project)
        project_id: Option<String>,

        /// Remove data without metadata and metadata without data
        #[arg(long, conflicts_with = "all")]
        orphans: bool,

        /// Remove every project
        #[arg(long)]
        all: bool,
    },

    /// Display active settings
    Config,
}
