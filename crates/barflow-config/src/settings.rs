//! Configuration structures.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use barflow_broker::{BrokerConfig, CommissionInfo, FillPolicy, MarketFill, SlippageConfig};
use barflow_core::{ConfigError, FeedId, Validity};
use barflow_data::FeedSpec;
use barflow_engine::{EngineConfig, ExecutionMode, SizingMethod};
use barflow_monitor::LoggingConfig;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    /// Default commission scheme
    #[serde(default)]
    pub commission: CommissionSettings,
    /// Per-feed overrides, keyed by feed name
    #[serde(default)]
    pub instrument_commission: BTreeMap<String, CommissionSettings>,
    #[serde(default)]
    pub slippage: SlippageSettings,
    #[serde(default)]
    pub orders: OrderSettings,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub feeds: Vec<FeedSpec>,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "barflow".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// "vectorized" or "event_driven"
    pub execution_mode: String,
    pub initial_cash: Decimal,
    pub idle_backoff_ms: u64,
    pub sizing: SizingMethod,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            execution_mode: "vectorized".to_string(),
            initial_cash: dec!(100000),
            idle_backoff_ms: 10,
            sizing: SizingMethod::default(),
        }
    }
}

impl EngineSettings {
    pub fn mode(&self) -> Result<ExecutionMode, ConfigError> {
        match self.execution_mode.as_str() {
            "vectorized" => Ok(ExecutionMode::Vectorized),
            "event_driven" | "event-driven" => Ok(ExecutionMode::EventDriven),
            other => Err(ConfigError::UnknownScheme(format!("execution mode '{other}'"))),
        }
    }
}

/// Commission scheme settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionSettings {
    /// "free", "percent", "fixed" or "futures"
    pub scheme: String,
    pub rate: Decimal,
    /// Required by "futures"
    pub margin: Option<Decimal>,
    pub multiplier: Decimal,
}

impl Default for CommissionSettings {
    fn default() -> Self {
        Self {
            scheme: "free".to_string(),
            rate: Decimal::ZERO,
            margin: None,
            multiplier: Decimal::ONE,
        }
    }
}

impl CommissionSettings {
    pub fn to_info(&self) -> Result<CommissionInfo, ConfigError> {
        if self.rate < Decimal::ZERO {
            return Err(ConfigError::Invalid("Commission rate cannot be negative".into()));
        }
        match self.scheme.as_str() {
            "free" => Ok(CommissionInfo::free()),
            "percent" => Ok(CommissionInfo::percent(self.rate)),
            "fixed" => Ok(CommissionInfo::fixed(self.rate)),
            "futures" => {
                let margin = self.margin.ok_or_else(|| {
                    ConfigError::Invalid("Futures commission needs a margin".into())
                })?;
                if margin <= Decimal::ZERO || self.multiplier <= Decimal::ZERO {
                    return Err(ConfigError::Invalid(
                        "Margin and multiplier must be positive".into(),
                    ));
                }
                Ok(CommissionInfo::futures(self.rate, margin, self.multiplier))
            }
            other => Err(ConfigError::UnknownScheme(format!("commission '{other}'"))),
        }
    }
}

/// Slippage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlippageSettings {
    /// "none", "percent" or "fixed"
    pub kind: String,
    pub amount: Decimal,
    pub apply_to_open: bool,
    pub cap_to_range: bool,
    pub respect_limit: bool,
}

impl Default for SlippageSettings {
    fn default() -> Self {
        Self {
            kind: "none".to_string(),
            amount: Decimal::ZERO,
            apply_to_open: true,
            cap_to_range: true,
            respect_limit: true,
        }
    }
}

impl SlippageSettings {
    pub fn to_config(&self) -> Result<SlippageConfig, ConfigError> {
        if self.amount < Decimal::ZERO {
            return Err(ConfigError::Invalid("Slippage cannot be negative".into()));
        }
        let base = match self.kind.as_str() {
            "none" => SlippageConfig::default(),
            "percent" => SlippageConfig::percent(self.amount),
            "fixed" => SlippageConfig::fixed(self.amount),
            other => return Err(ConfigError::UnknownScheme(format!("slippage '{other}'"))),
        };
        Ok(SlippageConfig {
            apply_to_open: self.apply_to_open,
            cap_to_range: self.cap_to_range,
            respect_limit: self.respect_limit,
            ..base
        })
    }
}

/// Order handling settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSettings {
    pub default_validity: Validity,
    pub market_fill: MarketFill,
    pub fill_policy: FillPolicy,
}

/// Strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Registry id
    pub name: String,
    /// Strategy parameters; missing keys take their defaults
    pub params: serde_json::Value,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            name: "ma_crossover".to_string(),
            params: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

impl AppConfig {
    /// Check the feed list and map everything into an [`EngineConfig`].
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        if self.engine.initial_cash <= Decimal::ZERO {
            return Err(ConfigError::Invalid("Initial cash must be positive".into()));
        }

        let mut names = HashSet::new();
        for feed in &self.feeds {
            if !names.insert(feed.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate feed name '{}'",
                    feed.name
                )));
            }
        }

        let mut broker = BrokerConfig::default()
            .with_cash(self.engine.initial_cash)
            .with_commission(self.commission.to_info()?)
            .with_slippage(self.slippage.to_config()?)
            .with_market_fill(self.orders.market_fill)
            .with_fill_policy(self.orders.fill_policy)
            .with_default_validity(self.orders.default_validity);

        // feeds are registered in list order, so the position is the id
        for (name, settings) in &self.instrument_commission {
            let index = self
                .feeds
                .iter()
                .position(|f| &f.name == name)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!("Commission override for unknown feed '{name}'"))
                })?;
            broker = broker.with_instrument_commission(FeedId(index), settings.to_info()?);
        }

        Ok(EngineConfig {
            mode: self.engine.mode()?,
            broker,
            sizing: self.engine.sizing.clone(),
            idle_backoff_ms: self.engine.idle_backoff_ms,
        })
    }
}
