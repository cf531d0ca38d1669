//! Configuration for jsontable
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/jsontable/config.toml)
//! 3. Built-in defaults (lowest priority)
//!
//! Per-instance options layer further: built-in defaults, then the
//! `[defaults]` section, then each `[tables.X]` / `[selects.X]` section.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod instance;
mod logging;
mod serialization;


// ─────────────────────────────────────────────────────────────────────────────
// Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use instance::{
    ActionSpec, AjaxOptions, ColumnSpec, FileAjax, FileInstance, FilePagination, FileSelect,
    FileTable, InstanceConfig, SelectOptions, TableOptions, WidgetKind,
};
pub use logging::{FileLogging, LogRotation, LoggingConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Poll timer interval when nothing else is configured
pub const DEFAULT_TICK_SECS: u64 = 60;

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Run the terminal UI (false prints renders to stdout)
    pub enable_tui: bool,

    /// Seconds between poll timer ticks
    pub tick_secs: u64,

    /// Directory for pagination history
    pub state_dir: PathBuf,

    pub logging: LoggingConfig,

    /// Resolved `[defaults]` section; base for every instance
    pub defaults: InstanceConfig,

    /// `[tables.X]` sections, fully resolved
    pub tables: BTreeMap<String, InstanceConfig>,

    /// `[selects.X]` sections, fully resolved
    pub selects: BTreeMap<String, InstanceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_tui: true,
            tick_secs: DEFAULT_TICK_SECS,
            state_dir: default_state_dir(),
            logging: LoggingConfig::default(),
            defaults: InstanceConfig::default(),
            tables: BTreeMap::new(),
            selects: BTreeMap::new(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("jsontable"))
        .unwrap_or_else(|| PathBuf::from("./.jsontable"))
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub tick_secs: Option<u64>,
    pub state_dir: Option<String>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,

    /// Optional [defaults] section
    pub defaults: Option<FileInstance>,

    /// [tables.X] sections
    #[serde(default)]
    pub tables: BTreeMap<String, FileInstance>,

    /// [selects.X] sections
    #[serde(default)]
    pub selects: BTreeMap<String, FileInstance>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Get the config file path: ~/.config/jsontable/config.toml
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("jsontable").join("config.toml"))
    }

    /// Create config file with defaults if it doesn't exist
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        if path.exists() {
            return;
        }

        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return;
            }
        }

        let _ = std::fs::write(&path, Self::default().to_toml());
    }

    /// Load file config if it exists
    ///
    /// A config file that exists but cannot be read or parsed ends the
    /// process with a message pointing at the file.
    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
                    eprintln!("║  CONFIG ERROR - Failed to parse configuration file          ║");
                    eprintln!("╚══════════════════════════════════════════════════════════════╝\n");
                    eprintln!("  File: {}\n", path.display());
                    eprintln!("  Error: {}\n", e);
                    eprintln!("  Tip: Check for:\n");
                    eprintln!("    - Missing quotes around string values");
                    eprintln!("    - Invalid boolean values (use true/false)");
                    eprintln!("    - Column lists written as tables instead of arrays");
                    eprintln!("    - Typos in section names\n");
                    eprintln!("  To reset, run `jsontable config --reset`.\n");
                    std::process::exit(1);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => {
                eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
                eprintln!("║  CONFIG ERROR - Cannot read configuration file              ║");
                eprintln!("╚══════════════════════════════════════════════════════════════╝\n");
                eprintln!("  File: {}\n", path.display());
                eprintln!("  Error: {}\n", e);
                std::process::exit(1);
            }
        }
    }

    /// Load configuration: env vars > file > defaults
    pub fn from_env() -> Self {
        Self::resolve(Self::load_file_config(), |key| std::env::var(key).ok())
    }

    /// Merge a parsed file with environment lookups
    pub(crate) fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        // TUI toggle: env only (runtime flag)
        let enable_tui = env("JSONTABLE_NO_TUI")
            .map(|v| v != "1" && v.to_lowercase() != "true")
            .unwrap_or(true);

        // Tick interval: env > file > default, never zero
        let tick_secs = env("JSONTABLE_TICK_SECS")
            .and_then(|v| v.parse().ok())
            .or(file.tick_secs)
            .unwrap_or(DEFAULT_TICK_SECS)
            .max(1);

        // State directory: env > file > default
        let state_dir = env("JSONTABLE_STATE_DIR")
            .or(file.state_dir)
            .map(PathBuf::from)
            .unwrap_or_else(default_state_dir);

        let logging = LoggingConfig::from_file(file.logging);

        let defaults = file
            .defaults
            .unwrap_or_default()
            .apply(InstanceConfig::default());

        let tables = file
            .tables
            .into_iter()
            .map(|(id, section)| (id, section.apply(defaults.clone())))
            .collect();

        let selects = file
            .selects
            .into_iter()
            .map(|(id, section)| {
                let mut config = section.apply(defaults.clone());
                config.kind = WidgetKind::Select;
                config.ajax.reload_delay_minutes = None;
                (id, config)
            })
            .collect();

        Self {
            enable_tui,
            tick_secs,
            state_dir,
            logging,
            defaults,
            tables,
            selects,
        }
    }

    /// Every configured instance in bind order: tables, then selects
    pub fn instances(&self) -> impl Iterator<Item = (&String, &InstanceConfig)> {
        self.tables.iter().chain(self.selects.iter())
    }

    /// History file location
    pub fn history_path(&self) -> PathBuf {
        self.state_dir.join("history.json")
    }
}
