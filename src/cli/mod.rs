//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Haven using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Haven - HUD HMIS CSV Export Tool
#[derive(Parser, Debug)]
#[command(name = "haven")]
#[command(version, about, long_about = None)]
#[command(author = "Haven Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "haven.toml", env = "HAVEN_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "HAVEN_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one export job end to end
    Export(commands::export::ExportArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show export job states and audit metadata
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),

    /// Purge stored artifacts past their retention window
    PurgeExpired(commands::purge::PurgeArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_export() {
        let cli = Cli::parse_from([
            "haven",
            "export",
            "--source",
            "./fixtures",
            "--start",
            "2023-10-01",
            "--end",
            "2024-09-30",
            "--requested-by",
            "steward",
        ]);
        assert_eq!(cli.config, "haven.toml");
        assert!(matches!(cli.command, Commands::Export(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["haven", "--config", "custom.toml", "validate-config"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["haven", "--log-level", "debug", "validate-config"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["haven", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["haven", "status"]);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["haven", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }

    #[test]
    fn test_cli_parse_purge_expired() {
        let cli = Cli::parse_from(["haven", "purge-expired"]);
        assert!(matches!(cli.command, Commands::PurgeExpired(_)));
    }
}
