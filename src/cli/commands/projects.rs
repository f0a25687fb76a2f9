//! Projects and Clean commands.

use std::path::Path;

use super::index::print_json;
use crate::cli::OutputFormat;
use crate::config::Settings;
use crate::error::IndexResult;
use crate::indexing::ProjectIndexer;
use crate::storage::IndexManager;

pub fn run_projects(settings: &Settings, format: OutputFormat) -> IndexResult<()> {
    let manager = IndexManager::new(settings.resolved_index_path());
    let projects = manager.list()?;
    match format {
        OutputFormat::Json => print_json(&projects),
        OutputFormat::Text => {
            if projects.is_empty() {
                println!("No indexed projects");
            }
            for metadata in projects {
                println!(
                    "{:<24} {:>8} symbols {:>6} files  updated {}  {}",
                    metadata.project_id,
                    metadata.symbol_count,
                    metadata.file_count,
                    metadata.updated_at.format("%Y-%m-%d %H:%M:%S"),
                    metadata.project_path.display()
                );
            }
            Ok(())
        }
    }
}

pub fn run_clean(
    settings: &Settings,
    root: &Path,
    project_id: Option<&str>,
    orphans: bool,
    all: bool,
) -> IndexResult<()> {
    let manager = IndexManager::new(settings.resolved_index_path());

    if orphans {
        let removed = manager.cleanup_orphaned()?;
        println!("Removed {} orphaned entries", removed.len());
        for id in removed {
            println!("  {id}");
        }
        return Ok(());
    }

    if all {
        let count = manager.clear()?;
        println!("Removed {count} projects");
        return Ok(());
    }

    let project_id = match project_id {
        Some(id) => id.to_string(),
        None => ProjectIndexer::project_id_for(root)?.0,
    };
    if manager.delete(&project_id)? {
        println!("Removed index for '{project_id}'");
    } else {
        println!("No index for '{project_id}'");
    }
    Ok(())
}
