//! Backtest command implementation.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

use barflow_config::AppConfig;
use barflow_data::{FeedSpec, ProviderRegistry};
use barflow_engine::Scheduler;
use barflow_strategies::StrategyRegistry;

use crate::cli::{BacktestArgs, OutputFormat};

pub fn run(args: BacktestArgs, mut config: AppConfig) -> Result<()> {
    if !args.data.is_empty() {
        config.feeds = args
            .data
            .iter()
            .map(|path| csv_spec(path, &args.timeframe))
            .collect::<Result<_>>()?;
    }
    if let Some(strategy) = args.strategy {
        if strategy != config.strategy.name {
            config.strategy.params = serde_json::Value::Null;
        }
        config.strategy.name = strategy;
    }
    if let Some(params) = &args.params {
        config.strategy.params =
            serde_json::from_str(params).context("Strategy parameters are not valid JSON")?;
    }
    if let Some(mode) = args.mode {
        config.engine.execution_mode = mode.as_str().to_string();
    }
    if let Some(capital) = args.capital {
        config.engine.initial_cash = capital;
    }
    if config.feeds.is_empty() {
        bail!("No feeds configured. Add [[feeds]] to the config file or pass --data <file.csv>");
    }

    let engine_config = config.engine_config().context("Invalid configuration")?;

    // Create strategy
    let registry = StrategyRegistry::new();
    let mut strategy = registry
        .create(&config.strategy.name, config.strategy.params.clone())
        .context("Failed to create strategy")?;

    // Open feeds
    let providers = ProviderRegistry::with_builtins();
    let mut scheduler = Scheduler::new(engine_config);
    for spec in &config.feeds {
        let feed = providers
            .create(spec)
            .with_context(|| format!("Failed to open feed '{}'", spec.name))?;
        scheduler.add_feed(feed)?;
    }

    info!(
        strategy = %config.strategy.name,
        feeds = config.feeds.len(),
        mode = %config.engine.execution_mode,
        "Starting backtest"
    );
    let report = scheduler.run(strategy.as_mut())?;

    // Output results
    match args.output {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => println!("{}", report.summary()),
    }

    // Save if requested
    if let Some(save_path) = &args.save {
        std::fs::write(save_path, report.to_json()?)
            .with_context(|| format!("Failed to write {}", save_path.display()))?;
        info!(path = %save_path.display(), "Results saved");
    }

    Ok(())
}

/// Feed spec for a CSV file, named after the file stem.
fn csv_spec(path: &Path, timeframe: &str) -> Result<FeedSpec> {
    if !path.is_file() {
        bail!("Data file '{}' does not exist", path.display());
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    Ok(FeedSpec::csv(name, path.to_string_lossy()).with_timeframe(timeframe))
}
