//! Backtesting engine CLI application.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tracing::warn;

use barflow_config::{load_config, AppConfig};
use barflow_monitor::{setup_logging, LogFormat};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::ValidateConfig = cli.command {
        return cli::commands::validate::run(&cli.config);
    }

    let (mut config, missing) = if cli.config.exists() {
        let config = load_config(&cli.config)
            .with_context(|| format!("Failed to load {}", cli.config.display()))?;
        (config, false)
    } else {
        (AppConfig::default(), true)
    };

    // Setup logging
    if let Some(level) = cli.log_level {
        config.logging.level = level.as_str().to_string();
    }
    if cli.json_logs {
        config.logging.format = LogFormat::Json;
    }
    let _guard = setup_logging(&config.logging)?;
    if missing {
        warn!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    // Execute command
    match cli.command {
        Commands::Backtest(args) => cli::commands::backtest::run(args, config),
        Commands::Strategies => cli::commands::strategies::run(),
        Commands::ValidateConfig => Ok(()),
    }
}
