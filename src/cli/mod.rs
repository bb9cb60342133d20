pub mod cleanup;
pub mod list;
pub mod serve;
pub mod stats;
pub mod types;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// A3S Activity - Inspect and maintain the activity log
#[derive(Debug, Parser)]
#[command(name = "a3s-activity", version, about)]
pub struct Cli {
    /// Config file (default: ~/.a3s/activity/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output rendering for read commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns for terminals
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// Comma-separated values with a header row
    Csv,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List log entries, newest first
    List(list::ListArgs),

    /// Delete entries older than the retention horizon
    Cleanup {
        /// Override the configured retention (months, clamped to 1-12)
        #[arg(long)]
        months: Option<u32>,
    },

    /// Show entry totals by owner, behaviour, and level
    Stats {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// List registered action types
    Types {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Start the read API and the cleanup timer
    Serve {
        /// Host address to bind to (default from config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default from config)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::try_parse_from([
            "a3s-activity",
            "list",
            "--owner",
            "shop,cms",
            "--type",
            "save",
            "--behaviour",
            "0",
            "--format",
            "csv",
            "--config",
            "/tmp/activity.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/activity.toml")));
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.owner.as_deref(), Some("shop,cms"));
                assert_eq!(args.action_type.as_deref(), Some("save"));
                assert_eq!(args.behaviour.as_deref(), Some("0"));
                assert_eq!(args.format, OutputFormat::Csv);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_cleanup_and_serve() {
        let cli = Cli::try_parse_from(["a3s-activity", "cleanup", "--months", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Cleanup { months: Some(3) }));

        let cli = Cli::try_parse_from(["a3s-activity", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["a3s-activity", "stats", "--format", "xml"]).is_err());
    }
}
