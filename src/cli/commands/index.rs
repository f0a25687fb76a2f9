//! Index and Watch commands.

use std::io::{BufRead, IsTerminal};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, bounded, select, tick};

use crate::cli::OutputFormat;
use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::indexing::{BuildOutcome, IncrementalIndexer, ProjectIndexer};

pub fn run_index(settings: Settings, root: &Path, force: bool, format: OutputFormat) -> IndexResult<()> {
    let indexer = ProjectIndexer::new(Arc::new(settings))?;
    let outcome = indexer.build(root, force);

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text => match &outcome {
            BuildOutcome::Success {
                project_id,
                total_files,
                total_symbols,
                total_call_edges,
                backends_used,
                build_time_ms,
            } => {
                let backends: Vec<String> = backends_used.iter().map(ToString::to_string).collect();
                println!("Indexed project '{project_id}' in {build_time_ms}ms");
                println!("  files:      {total_files}");
                println!("  symbols:    {total_symbols}");
                println!("  call edges: {total_call_edges}");
                println!("  backends:   {}", backends.join(", "));
            }
            BuildOutcome::Cached { metadata } => {
                println!(
                    "Index for '{}' is up to date ({} symbols, {} files). Use --force to rebuild.",
                    metadata.project_id, metadata.symbol_count, metadata.file_count
                );
            }
            BuildOutcome::Error { .. } => {}
        },
    }

    match outcome {
        BuildOutcome::Error { message } => Err(IndexError::General(message)),
        _ => Ok(()),
    }
}

/// Watch `root` until stdin says stop: a `q` line, or Ctrl+D on a terminal.
pub fn run_watch(settings: Settings, root: &Path) -> IndexResult<()> {
    let report_every = Duration::from_millis(settings.watch.debounce_ms.max(1000) * 5);
    let indexer = Arc::new(ProjectIndexer::new(Arc::new(settings))?);
    let incremental = IncrementalIndexer::new(indexer, root)?;

    if !incremental.start_monitoring() {
        return Err(IndexError::WatchStartFailure {
            reason: format!("could not watch {}", root.display()),
        });
    }
    println!(
        "Watching {} (type q and Enter, or Ctrl+D, to stop)",
        incremental.root().display()
    );

    watch_until(&incremental, &stdin_stop_signal(), report_every);
    Ok(())
}

/// Print progress every `report_every` until `stop` fires, then stop
/// monitoring so no batch is cut off midway.
fn watch_until(incremental: &IncrementalIndexer, stop: &Receiver<()>, report_every: Duration) {
    let ticker = tick(report_every);
    let mut last_reported = 0;
    loop {
        select! {
            recv(stop) -> _ => break,
            recv(ticker) -> _ => {
                let stats = incremental.statistics();
                let applied = stats.incremental_updates + stats.full_rebuilds;
                if applied != last_reported {
                    last_reported = applied;
                    println!(
                        "{} files, {} changes seen, {} incremental updates, {} full rebuilds",
                        stats.files_monitored, stats.changes_detected, stats.incremental_updates, stats.full_rebuilds
                    );
                }
            }
        }
    }
    incremental.stop_monitoring();
    println!("Stopped watching {}", incremental.root().display());
}

/// Fires once stdin asks to stop. End of input counts only for a terminal;
/// a closed pipe or `/dev/null` leaves the watch running.
fn stdin_stop_signal() -> Receiver<()> {
    let (tx, rx) = bounded(1);
    let interactive = std::io::stdin().is_terminal();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) if interactive => break,
                Ok(0) | Err(_) => loop {
                    // Holding `tx` keeps the receiver connected
                    std::thread::park();
                },
                Ok(_) if is_stop_command(&line) => break,
                Ok(_) => {}
            }
        }
        let _ = tx.send(());
    });
    rx
}

fn is_stop_command(line: &str) -> bool {
    matches!(line.trim(), "q" | "quit" | "exit")
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> IndexResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| IndexError::Serialization(e.to_string()))?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_stop_commands() {
        assert!(is_stop_command("q\n"));
        assert!(is_stop_command("  quit \r\n"));
        assert!(!is_stop_command("status\n"));
        assert!(!is_stop_command("\n"));
    }

    #[test]
    fn test_watch_until_stops_monitoring() {
        let workspace = TempDir::new().unwrap();
        let project = workspace.path().join("proj");
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join("a.c"), "int a(void) { return 0; }\n").unwrap();

        let mut settings = Settings::default();
        settings.index_path = workspace.path().join("index");
        settings.indexing.parallel_threads = 1;
        settings.watch.tick_ms = 20;
        let indexer = Arc::new(ProjectIndexer::new(Arc::new(settings)).unwrap());
        let incremental = IncrementalIndexer::new(indexer, &project).unwrap();
        assert!(incremental.start_monitoring());

        let (tx, rx) = bounded(1);
        tx.send(()).unwrap();
        watch_until(&incremental, &rx, Duration::from_millis(10));
        assert!(!incremental.is_monitoring());
    }
}
