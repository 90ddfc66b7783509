//! Command-line interface for termdeck.
//!
//! `termdeck serve` runs the session core behind the IPC socket; the other
//! subcommands inspect or tidy the local multiplexer sessions and exit.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// termdeck - persistent terminal sessions for IDE windows
#[derive(Parser, Debug)]
#[command(name = "termdeck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file to use instead of ~/.config/termdeck/config.yaml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set debug log level (overrides config and RUST_LOG)
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevelArg>,
}

/// Log level argument for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevelArg {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevelArg {
    /// Convert to `log::LevelFilter`
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevelArg::Off => log::LevelFilter::Off,
            LogLevelArg::Error => log::LevelFilter::Error,
            LogLevelArg::Warn => log::LevelFilter::Warn,
            LogLevelArg::Info => log::LevelFilter::Info,
            LogLevelArg::Debug => log::LevelFilter::Debug,
            LogLevelArg::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Serve the IPC bridge (the default)
    Serve {
        /// Socket path (default: runtime dir or config `socket_path`)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// List multiplexer sessions owned by termdeck
    List,

    /// Kill multiplexer sessions with no persisted tab
    KillOrphans,
}

/// What `main` should run, with the global options resolved
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub command: Commands,
    pub config_path: Option<PathBuf>,
    /// Log level override from CLI
    pub log_level: Option<log::LevelFilter>,
}

impl From<Cli> for RuntimeOptions {
    fn from(cli: Cli) -> Self {
        Self {
            command: cli.command.unwrap_or(Commands::Serve { socket: None }),
            config_path: cli.config,
            log_level: cli.log_level.map(LogLevelArg::to_level_filter),
        }
    }
}

/// Parse the process arguments
pub fn process_cli() -> RuntimeOptions {
    Cli::parse().into()
}
