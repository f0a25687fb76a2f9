//! Init and Config commands.

use crate::cli::OutputFormat;
use crate::config::Settings;
use crate::error::{IndexError, IndexResult};

/// Create `.symgraph/settings.toml` and a default ignore file in the
/// current directory.
pub fn run_init(force: bool) -> IndexResult<()> {
    let root = std::env::current_dir().map_err(|e| IndexError::Config(format!("current directory: {e}")))?;
    let path = Settings::init_config_file(&root, force).map_err(|e| IndexError::Config(e.to_string()))?;
    println!("Created configuration file at: {}", path.display());
    println!("Edit this file to customize your settings.");
    Ok(())
}

/// Print the effective configuration.
pub fn run_config(settings: &Settings, format: OutputFormat) -> IndexResult<()> {
    let rendered = match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(settings).map_err(|e| IndexError::Serialization(e.to_string()))?
        }
        OutputFormat::Text => toml::to_string_pretty(settings).map_err(|e| IndexError::Serialization(e.to_string()))?,
    };
    println!("{rendered}");
    Ok(())
}
