//! Strategy registry: strategies by name, built from JSON parameters.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use barflow_core::{ConfigError, EngineResult};
use barflow_engine::Strategy;

use crate::{
    BuyHoldConfig, BuyHoldStrategy, MACrossoverConfig, MACrossoverStrategy, MeanReversionConfig,
    MeanReversionStrategy, StrategyConfig,
};

/// Information about a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Registry key
    pub id: String,
    /// Display name
    pub name: String,
    pub description: String,
    /// Default parameters as JSON
    pub default_config: serde_json::Value,
}

type Factory = fn(serde_json::Value) -> Result<Box<dyn Strategy>, ConfigError>;

struct Entry {
    info: StrategyInfo,
    factory: Factory,
}

fn parse<C>(params: serde_json::Value) -> Result<C, ConfigError>
where
    C: DeserializeOwned + StrategyConfig,
{
    // null means "all defaults"
    let params = if params.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        params
    };
    let config: C =
        serde_json::from_value(params).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

fn defaults<C: Default + Serialize>() -> serde_json::Value {
    serde_json::to_value(C::default()).unwrap_or_default()
}

/// Explicit map from strategy id to factory, populated at process start.
pub struct StrategyRegistry {
    entries: BTreeMap<String, Entry>,
}

impl StrategyRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Create a registry with all built-in strategies.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(
            StrategyInfo {
                id: "ma_crossover".to_string(),
                name: "MA Crossover".to_string(),
                description: "Trades fast/slow moving average crossovers".to_string(),
                default_config: defaults::<MACrossoverConfig>(),
            },
            |params| Ok(Box::new(MACrossoverStrategy::new(parse(params)?))),
        );

        registry.register(
            StrategyInfo {
                id: "mean_reversion".to_string(),
                name: "Mean Reversion".to_string(),
                description: "Fades Bollinger Band touches with bracket orders".to_string(),
                default_config: defaults::<MeanReversionConfig>(),
            },
            |params| Ok(Box::new(MeanReversionStrategy::new(parse(params)?))),
        );

        registry.register(
            StrategyInfo {
                id: "buy_hold".to_string(),
                name: "Buy and Hold".to_string(),
                description: "Buys every feed once and holds to the end".to_string(),
                default_config: defaults::<BuyHoldConfig>(),
            },
            |params| Ok(Box::new(BuyHoldStrategy::new(parse(params)?))),
        );

        registry
    }

    /// Register a strategy. Replaces an existing one with the same id.
    pub fn register(&mut self, info: StrategyInfo, factory: Factory) {
        self.entries.insert(info.id.clone(), Entry { info, factory });
    }

    /// List all available strategies, sorted by id.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.entries.values().map(|e| &e.info).collect()
    }

    /// Get strategy info by id.
    pub fn get(&self, id: &str) -> Option<&StrategyInfo> {
        self.entries.get(id).map(|e| &e.info)
    }

    /// Check if a strategy exists.
    pub fn exists(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Create a strategy instance from JSON parameters. Missing parameters
    /// take their defaults.
    pub fn create(&self, id: &str, params: serde_json::Value) -> EngineResult<Box<dyn Strategy>> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| ConfigError::UnknownStrategy(id.to_string()))?;
        Ok((entry.factory)(params)?)
    }

    /// Create a strategy with default parameters.
    pub fn create_default(&self, id: &str) -> EngineResult<Box<dyn Strategy>> {
        self.create(id, serde_json::Value::Null)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barflow_core::EngineError;

    #[test]
    fn test_registry_list() {
        let registry = StrategyRegistry::new();
        let ids: Vec<&str> = registry.list().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["buy_hold", "ma_crossover", "mean_reversion"]);
    }

    #[test]
    fn test_registry_get() {
        let registry = StrategyRegistry::new();

        assert!(registry.get("ma_crossover").is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(
            registry.get("ma_crossover").unwrap().default_config["slow_period"],
            30
        );
    }

    #[test]
    fn test_create_default() {
        let registry = StrategyRegistry::new();
        let strategy = registry.create_default("ma_crossover").unwrap();
        assert_eq!(strategy.name(), "ma_crossover");
    }

    #[test]
    fn test_create_with_partial_config() {
        let registry = StrategyRegistry::new();
        let config = serde_json::json!({ "fast_period": 5, "slow_period": 10 });
        assert!(registry.create("ma_crossover", config).is_ok());

        let bad = serde_json::json!({ "fast_period": 10, "slow_period": 5 });
        assert!(matches!(
            registry.create("ma_crossover", bad),
            Err(EngineError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_create_unknown_strategy() {
        let registry = StrategyRegistry::new();
        assert!(matches!(
            registry.create_default("unknown"),
            Err(EngineError::Config(ConfigError::UnknownStrategy(_)))
        ));
    }
}
