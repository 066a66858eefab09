use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// `dootask-ai` - streaming response relay for DooTask AI agents.
#[derive(Parser, Debug)]
#[command(name = "dootask-ai")]
#[command(version)]
#[command(about = "Webhook intake, inference fan-out and message accounting for DooTask bots.", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.dootask-ai/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log verbosity
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the gateway and the default-tool reconciler until interrupted
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config; 0 picks a free port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one default-tool reconciliation pass and exit
    Reconcile,

    /// Print the effective configuration (secrets masked)
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
