//! Logging setup and event macros.
//!
//! Output goes to stderr with a compact timestamp. Levels come from the
//! `[logging]` section of the settings file:
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! watcher = "debug"
//! ```
//!
//! `RUST_LOG` overrides the configured filter when set:
//! ```bash
//! RUST_LOG=symgraph=debug symgraph watch
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Build the `EnvFilter` directive string for a config.
///
/// Module names without a crate prefix are scoped to this crate, so
/// `watcher = "debug"` becomes `symgraph::watcher=debug`.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.default.clone();
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    for (module, level) in modules {
        let target = if module.contains("::") || module == env!("CARGO_CRATE_NAME") {
            module.clone()
        } else {
            format!("{}::{module}", env!("CARGO_CRATE_NAME"))
        };
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Initialize logging. Only the first call takes effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        // Another subscriber may already be installed (tests, embedding apps)
        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
    });
}

/// Initialize logging with `LoggingConfig::default()` (warn and above).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Log an info-level event tagged with a component name.
///
/// ```ignore
/// log_event!("indexer", "built", "{} symbols", count);
/// log_event!("watcher", "stopped");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-level counterpart of [`log_event!`].
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_scopes_modules() {
        let mut config = LoggingConfig::default();
        config.modules.insert("watcher".to_string(), "debug".to_string());
        config.modules.insert("notify::inotify".to_string(), "error".to_string());

        let directives = filter_directives(&config);
        assert_eq!(
            directives,
            "warn,notify::inotify=error,symgraph::watcher=debug"
        );
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init_with_config(&LoggingConfig::default());
    }
}
