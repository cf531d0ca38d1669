// CLI module - command-line argument parsing and handlers
//
// Provides subcommands for configuration management and one-shot rendering:
// - config --show: Display effective configuration
// - config --reset: Regenerate config file with defaults
// - config --edit: Open config file in $EDITOR
// - load <file>: Render a JSON document once to stdout

use crate::config::{Config, InstanceConfig, VERSION};
use crate::persistence::MemoryStore;
use crate::table::{CycleOutcome, InstanceId, LogSink, TableRefreshController};
use crate::transport::HttpTransport;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// jsontable - poll JSON endpoints and browse them as tables
#[derive(Parser)]
#[command(name = "jsontable")]
#[command(version = VERSION)]
#[command(about = "Paginated, sortable tables over JSON endpoints", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Open config file in $EDITOR
        #[arg(long)]
        edit: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Render a JSON file once, without fetching
    Load {
        /// JSON document: `{results, pagination, total_results}` or a bare array
        file: PathBuf,

        /// Use the options of this configured table or select
        #[arg(long)]
        id: Option<String>,
    },
}

/// Handle CLI commands. Returns true if a command was handled (exit after).
pub fn handle_cli() -> bool {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config {
            show,
            reset,
            edit,
            path,
        }) => {
            if path {
                handle_config_path();
            } else if show {
                handle_config_show();
            } else if reset {
                handle_config_reset();
            } else if edit {
                handle_config_edit();
            } else {
                // No flag provided, show help
                println!("Usage: jsontable config [--show|--reset|--edit|--path]");
                println!();
                println!("Options:");
                println!("  --show    Display effective configuration");
                println!("  --reset   Reset config file to defaults");
                println!("  --edit    Open config file in $EDITOR");
                println!("  --path    Show config file path");
            }
            true
        }
        Some(Commands::Load { file, id }) => {
            if let Err(e) = handle_load(&file, id) {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
            true
        }
        None => false, // No subcommand, run the poller
    }
}

fn handle_config_path() {
    match Config::config_path() {
        Some(path) => println!("{}", path.display()),
        None => {
            eprintln!("Error: Could not determine config path");
            std::process::exit(1);
        }
    }
}

fn handle_config_show() {
    let config = Config::from_env();

    println!("# Effective configuration (env > file > defaults)");
    println!("# enable_tui = {}", config.enable_tui);
    print!("{}", config.to_toml());

    // Show source info
    println!();
    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("# Source: {}", path.display());
        } else {
            println!("# Source: defaults (no config file)");
        }
    }
}

fn handle_config_reset() {
    let Some(path) = Config::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    // Confirm if file exists
    if path.exists() {
        eprint!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        );
        let _ = std::io::stderr().flush();

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err()
            || !input.trim().eq_ignore_ascii_case("y")
        {
            println!("Aborted.");
            return;
        }
    }

    if let Err(e) = Config::default().save() {
        eprintln!("Error writing config: {}", e);
        std::process::exit(1);
    }

    println!("Config reset to defaults: {}", path.display());
}

fn handle_config_edit() {
    let Some(path) = Config::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    if !path.exists() {
        Config::ensure_config_exists();
        println!("Created new config file: {}", path.display());
    }

    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| {
            if cfg!(windows) {
                "notepad".to_string()
            } else {
                "nano".to_string()
            }
        });

    println!("Opening {} with {}", path.display(), editor);

    match Command::new(&editor).arg(&path).status() {
        Ok(s) if s.success() => {}
        Ok(s) => {
            eprintln!("Editor exited with status: {}", s);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to launch editor '{}': {}", editor, e);
            eprintln!("Set $EDITOR environment variable to your preferred editor");
            std::process::exit(1);
        }
    }
}

/// Options for a one-shot load: the named instance, else `[defaults]`
fn load_options(config: &Config, id: Option<&str>) -> anyhow::Result<InstanceConfig> {
    match id {
        None => Ok(config.defaults.clone()),
        Some(id) => config
            .tables
            .get(id)
            .or_else(|| config.selects.get(id))
            .cloned()
            .with_context(|| format!("No [tables.{id}] or [selects.{id}] section configured")),
    }
}

fn handle_load(file: &Path, id: Option<String>) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Cannot read {}", file.display()))?;
    let data: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let config = Config::from_env();
    let options = load_options(&config, id.as_deref())?;
    let id = InstanceId::new(id.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data".to_string())
    }));

    let mut controller = TableRefreshController::new(
        Arc::new(HttpTransport::new()),
        Box::new(MemoryStore::new()),
        Box::new(LogSink::new()),
    );

    match controller.bind_with_data(id, options, data) {
        CycleOutcome::Rendered { .. } => Ok(()),
        CycleOutcome::Empty => {
            println!("No results.");
            Ok(())
        }
        other => anyhow::bail!("Could not render {}: {:?}", file.display(), other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_options_prefers_named_section() {
        let mut config = Config::default();
        let mut users = InstanceConfig::default();
        users.pagination.limit = 50;
        config.tables.insert("users".to_string(), users);

        assert_eq!(load_options(&config, Some("users")).unwrap().pagination.limit, 50);
        assert_eq!(load_options(&config, None).unwrap(), config.defaults);
        assert!(load_options(&config, Some("missing")).is_err());
    }

    #[test]
    fn test_cli_parses_load() {
        let cli = Cli::parse_from(["jsontable", "load", "data.json", "--id", "users"]);
        match cli.command {
            Some(Commands::Load { file, id }) => {
                assert_eq!(file, PathBuf::from("data.json"));
                assert_eq!(id.as_deref(), Some("users"));
            }
            _ => panic!("expected load command"),
        }
    }
}
