//! Configuration module for the symbol indexer.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SYMGRAPH_` and use double
//! underscores to separate nested levels:
//! - `SYMGRAPH_INDEXING__PARALLEL_THREADS=8` sets `indexing.parallel_threads`
//! - `SYMGRAPH_WATCH__DEBOUNCE_MS=500` sets `watch.debounce_ms`
//! - `SYMGRAPH_BACKENDS__CTAGS__ENABLED=true` sets `backends.ctags.enabled`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory holding per-workspace state.
pub const WORKSPACE_DIR: &str = ".symgraph";
/// Gitignore-syntax file with extra exclusions.
pub const IGNORE_FILE: &str = ".symgraphignore";
const ENV_PREFIX: &str = "SYMGRAPH_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding per-project index data
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Workspace root directory (where .symgraph is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub backends: BackendsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Number of parallel threads for parsing
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// File extensions (without dot) treated as C/C++ sources
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Glob patterns to ignore during indexing
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Files larger than this many bytes are skipped
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Quiet period before a changed file is processed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Maximum number of files applied per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Worker wake-up interval
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Capacity of the event channel between watcher and worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendsConfig {
    #[serde(default = "default_ctags")]
    pub ctags: BackendToggle,

    #[serde(default = "default_cscope")]
    pub cscope: BackendToggle,

    /// Language server, queried per file with `textDocument/documentSymbol`
    #[serde(default = "default_clangd")]
    pub clangd: BackendToggle,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct BackendToggle {
    #[serde(default)]
    pub enabled: bool,

    /// Executable name or path
    #[serde(default)]
    pub command: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".symgraph/index")
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_extensions() -> Vec<String> {
    ["c", "h", "cpp", "hpp", "cc", "cxx", "hh", "hxx"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_max_file_size() -> u64 {
    4 * 1024 * 1024
}
fn default_debounce_ms() -> u64 {
    2000
}
fn default_batch_size() -> usize {
    50
}
fn default_tick_ms() -> u64 {
    500
}
fn default_queue_capacity() -> usize {
    1024
}
fn default_ctags() -> BackendToggle {
    BackendToggle {
        enabled: false,
        command: "ctags".to_string(),
    }
}
fn default_cscope() -> BackendToggle {
    BackendToggle {
        enabled: false,
        command: "cscope".to_string(),
    }
}
fn default_clangd() -> BackendToggle {
    BackendToggle {
        enabled: false,
        command: "clangd".to_string(),
    }
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            workspace_root: None,
            indexing: IndexingConfig::default(),
            watch: WatchConfig::default(),
            backends: BackendsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            extensions: default_extensions(),
            ignore_patterns: vec![
                "build/**".to_string(),
                ".git/**".to_string(),
                ".symgraph/**".to_string(),
            ],
            max_file_size: default_max_file_size(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            batch_size: default_batch_size(),
            tick_ms: default_tick_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            ctags: default_ctags(),
            cscope: default_cscope(),
            clangd: default_clangd(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl IndexingConfig {
    /// Whether `path` has one of the configured source extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(WORKSPACE_DIR).join("settings.toml"));

        Self::figment(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nesting levels; single underscores
            // stay inside field names.
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Find `.symgraph/settings.toml` by searching from the current
    /// directory up to the filesystem root.
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(WORKSPACE_DIR).join("settings.toml"))
    }

    /// Get the workspace root directory (where .symgraph is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        current
            .ancestors()
            .find(|ancestor| ancestor.join(WORKSPACE_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Resolve the index directory against the workspace root when relative.
    pub fn resolved_index_path(&self) -> PathBuf {
        match (&self.workspace_root, self.index_path.is_relative()) {
            (Some(root), true) => root.join(&self.index_path),
            _ => self.index_path.clone(),
        }
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file (and ignore file) under `root`.
    pub fn init_config_file(root: &Path, force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(WORKSPACE_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let settings = Settings {
            workspace_root: Some(root.to_path_buf()),
            ..Settings::default()
        };
        settings.save(&config_path)?;

        let ignore_path = root.join(IGNORE_FILE);
        if force || !ignore_path.exists() {
            std::fs::write(&ignore_path, DEFAULT_IGNORE)?;
        }

        Ok(config_path)
    }
}

const DEFAULT_IGNORE: &str = r#"# symgraph ignore patterns (gitignore syntax)

# Build artifacts
build/
out/
cmake-build-*/
*.o
*.a
*.so

# Third-party trees
third_party/
vendor/

# symgraph's own directory
.symgraph/
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.index_path, PathBuf::from(".symgraph/index"));
        assert!(settings.indexing.parallel_threads > 0);
        assert_eq!(settings.watch.debounce_ms, 2000);
        assert_eq!(settings.watch.batch_size, 50);
        assert_eq!(settings.watch.tick_ms, 500);
        assert!(!settings.backends.ctags.enabled);
        assert_eq!(settings.backends.cscope.command, "cscope");
        assert!(!settings.backends.clangd.enabled);
        assert_eq!(settings.backends.clangd.command, "clangd");
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_accepts_configured_extensions() {
        let indexing = IndexingConfig::default();
        assert!(indexing.accepts(Path::new("src/main.c")));
        assert!(indexing.accepts(Path::new("include/a.HPP")));
        assert!(indexing.accepts(Path::new("lib/x.cxx")));
        assert!(!indexing.accepts(Path::new("README.md")));
        assert!(!indexing.accepts(Path::new("Makefile")));
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[indexing]
parallel_threads = 4
ignore_patterns = ["third_party/**"]

[watch]
debounce_ms = 250
batch_size = 10

[backends.ctags]
enabled = true
command = "/usr/local/bin/ctags"

[logging]
default = "info"

[logging.modules]
watcher = "debug"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.indexing.parallel_threads, 4);
        assert_eq!(settings.indexing.ignore_patterns, vec!["third_party/**"]);
        assert_eq!(settings.watch.debounce_ms, 250);
        assert_eq!(settings.watch.batch_size, 10);
        // Untouched fields keep defaults
        assert_eq!(settings.watch.tick_ms, 500);
        assert!(settings.backends.ctags.enabled);
        assert_eq!(settings.backends.ctags.command, "/usr/local/bin/ctags");
        assert!(!settings.backends.cscope.enabled);
        assert_eq!(settings.logging.default, "info");
        assert_eq!(settings.logging.modules["watcher"], "debug");
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.indexing.parallel_threads = 2;
        settings.watch.batch_size = 7;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.indexing.parallel_threads, 2);
        assert_eq!(loaded.watch.batch_size, 7);
    }

    #[test]
    fn test_init_config_file_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();

        let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
        assert!(path.exists());
        assert!(temp_dir.path().join(IGNORE_FILE).exists());

        assert!(Settings::init_config_file(temp_dir.path(), false).is_err());
        assert!(Settings::init_config_file(temp_dir.path(), true).is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "[watch]\nqueue_capacity = 5\ntick_ms = 100\n").unwrap();

        // Only this test touches queue_capacity, so parallel tests are unaffected
        unsafe {
            std::env::set_var("SYMGRAPH_WATCH__QUEUE_CAPACITY", "99");
        }

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.watch.queue_capacity, 99);
        assert_eq!(settings.watch.tick_ms, 100);

        unsafe {
            std::env::remove_var("SYMGRAPH_WATCH__QUEUE_CAPACITY");
        }
    }

    #[test]
    fn test_resolved_index_path() {
        let settings = Settings {
            workspace_root: Some(PathBuf::from("/work")),
            ..Settings::default()
        };
        assert_eq!(
            settings.resolved_index_path(),
            PathBuf::from("/work/.symgraph/index")
        );
    }
}
