//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "barflow")]
#[command(author, version, about = "Event and vector driven backtesting engine")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", env = "BARFLOW_CONFIG")]
    pub config: PathBuf,

    /// Log level, overrides the configured one
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a backtest
    Backtest(BacktestArgs),
    /// List available strategies
    Strategies,
    /// Validate configuration
    ValidateConfig,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Mode {
    Vectorized,
    EventDriven,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Vectorized => "vectorized",
            Mode::EventDriven => "event_driven",
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args)]
pub struct BacktestArgs {
    /// Strategy to run, overrides the configured one
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Strategy parameters as JSON, e.g. '{"fast_period": 5}'
    #[arg(short, long)]
    pub params: Option<String>,

    /// CSV files to use as feeds instead of the configured ones
    #[arg(short, long, value_delimiter = ',')]
    pub data: Vec<PathBuf>,

    /// Timeframe of the --data files
    #[arg(short, long, default_value = "1d")]
    pub timeframe: String,

    /// Execution mode, overrides the configured one
    #[arg(short, long)]
    pub mode: Option<Mode>,

    /// Initial cash, overrides the configured one
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub output: OutputFormat,

    /// Save the JSON report to a file
    #[arg(long)]
    pub save: Option<PathBuf>,
}
