use anyhow::Context;
use clap::Parser;

use symgraph::Settings;
use symgraph::cli::{self, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Settings::load().unwrap_or_else(|e| {
            if !matches!(cli.command, Commands::Init { .. }) {
                eprintln!("Configuration error: {e}");
                eprintln!("Using default configuration for now.");
            }
            Settings::default()
        }),
    };

    symgraph::logging::init_with_config(&settings.logging);

    cli::run(cli, settings)?;
    Ok(())
}
