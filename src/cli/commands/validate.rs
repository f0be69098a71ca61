//! Validate configuration command.

use anyhow::{Context, Result};
use std::path::Path;

use barflow_config::load_config;
use barflow_data::ProviderRegistry;
use barflow_strategies::StrategyRegistry;

pub fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let config = load_config(config_path).context("Configuration error")?;
    let engine = config.engine_config().context("Configuration error")?;

    StrategyRegistry::new()
        .create(&config.strategy.name, config.strategy.params.clone())
        .context("Strategy configuration error")?;

    let providers = ProviderRegistry::with_builtins();
    for feed in &config.feeds {
        if !providers.contains(&feed.provider) {
            anyhow::bail!("Feed '{}' uses unknown provider '{}'", feed.name, feed.provider);
        }
        if let Some(transform) = &feed.transform {
            transform
                .rule()
                .with_context(|| format!("Feed '{}' has an invalid transform", feed.name))?;
        }
    }

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!("Mode: {}", engine.mode);
    println!("Initial cash: {}", engine.broker.initial_cash);
    println!("Strategy: {}", config.strategy.name);
    for feed in &config.feeds {
        println!("Feed: {} ({}, {})", feed.name, feed.provider, feed.timeframe);
    }

    Ok(())
}
