//! Provider registry: feed factories by provider id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use barflow_core::{Bar, ConfigError, EngineResult, Feed, Timeframe};

use crate::resample::{BoundaryRule, TimeframeTransformer, TransformMode, TransformedFeed};
use crate::{CsvFeed, MemoryFeed};

fn default_provider() -> String {
    "csv".to_string()
}

fn default_timeframe() -> String {
    "1d".to_string()
}

/// Timeframe transformation applied on top of a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    #[serde(default)]
    pub mode: TransformMode,
    /// Target timeframe (time boundary), e.g. "5m"
    #[serde(default)]
    pub timeframe: Option<String>,
    /// Raw bars per synthetic bar (count boundary)
    #[serde(default)]
    pub count: Option<usize>,
}

impl TransformSpec {
    pub fn rule(&self) -> Result<BoundaryRule, ConfigError> {
        match (&self.timeframe, self.count) {
            (Some(tf), None) => Ok(BoundaryRule::Time(parse_timeframe(tf)?)),
            (None, Some(n)) => Ok(BoundaryRule::Count(n)),
            _ => Err(ConfigError::Invalid(
                "a transform needs exactly one of 'timeframe' or 'count'".to_string(),
            )),
        }
    }
}

/// Description of one feed, as found in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSpec {
    pub name: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    /// Inline bars for the "memory" provider
    #[serde(default)]
    pub bars: Vec<Bar>,
    #[serde(default)]
    pub transform: Option<TransformSpec>,
}

impl FeedSpec {
    pub fn csv(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: default_provider(),
            path: Some(path.into()),
            timeframe: default_timeframe(),
            bars: Vec::new(),
            transform: None,
        }
    }

    pub fn memory(name: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            name: name.into(),
            provider: "memory".to_string(),
            path: None,
            timeframe: default_timeframe(),
            bars,
            transform: None,
        }
    }

    pub fn with_timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.timeframe = timeframe.into();
        self
    }

    pub fn with_transform(mut self, transform: TransformSpec) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn parsed_timeframe(&self) -> Result<Timeframe, ConfigError> {
        parse_timeframe(&self.timeframe)
    }
}

fn parse_timeframe(s: &str) -> Result<Timeframe, ConfigError> {
    Timeframe::from_str(s).map_err(ConfigError::Invalid)
}

/// Builds a feed from its spec.
pub type FeedFactory = Box<dyn Fn(&FeedSpec) -> EngineResult<Box<dyn Feed>> + Send + Sync>;

/// Explicit map from provider id to feed factory, populated at process start.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, FeedFactory>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in "csv" and "memory" providers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("csv", |spec| {
            let path = spec.path.as_deref().ok_or_else(|| {
                ConfigError::Invalid(format!("feed '{}' needs a path", spec.name))
            })?;
            let feed = CsvFeed::open(path, spec.name.clone(), spec.parsed_timeframe()?)?;
            Ok(Box::new(feed) as Box<dyn Feed>)
        });
        registry.register("memory", |spec| {
            let feed = MemoryFeed::new(spec.name.clone(), spec.parsed_timeframe()?, spec.bars.clone());
            Ok(Box::new(feed) as Box<dyn Feed>)
        });
        registry
    }

    /// Register a provider. Replaces an existing one with the same id.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&FeedSpec) -> EngineResult<Box<dyn Feed>> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// List registered provider ids, sorted.
    pub fn providers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Build the feed described by `spec`, applying its transform if any.
    pub fn create(&self, spec: &FeedSpec) -> EngineResult<Box<dyn Feed>> {
        let factory = self
            .factories
            .get(&spec.provider)
            .ok_or_else(|| ConfigError::UnknownProvider(spec.provider.clone()))?;
        let feed = factory(spec)?;

        let Some(transform) = &spec.transform else {
            return Ok(feed);
        };
        let transformer = TimeframeTransformer::new(transform.rule()?, transform.mode)?;
        Ok(Box::new(TransformedFeed::new(feed, transformer)))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barflow_core::{EngineError, FeedPoll};

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar::new(i as i64 * 60_000, 1.0, 2.0, 0.5, 1.5, 1.0))
            .collect()
    }

    #[test]
    fn test_builtins() {
        let registry = ProviderRegistry::with_builtins();
        assert_eq!(registry.providers(), vec!["csv", "memory"]);
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::with_builtins();
        let mut spec = FeedSpec::memory("x", bars(1));
        spec.provider = "exchange".to_string();
        assert!(matches!(
            registry.create(&spec),
            Err(EngineError::Config(ConfigError::UnknownProvider(_)))
        ));
    }

    #[test]
    fn test_memory_with_resample() {
        let registry = ProviderRegistry::with_builtins();
        let spec = FeedSpec::memory("m", bars(10))
            .with_timeframe("1m")
            .with_transform(TransformSpec {
                mode: TransformMode::Resample,
                timeframe: Some("5m".to_string()),
                count: None,
            });
        let mut feed = registry.create(&spec).unwrap();
        assert_eq!(feed.timeframe(), Timeframe::minutes(5));
        assert!(matches!(feed.poll(), Ok(FeedPoll::Bar(_))));
        assert!(matches!(feed.poll(), Ok(FeedPoll::Bar(_))));
        assert_eq!(feed.poll(), Ok(FeedPoll::Exhausted));
    }

    #[test]
    fn test_transform_needs_one_rule() {
        let spec = TransformSpec {
            mode: TransformMode::Replay,
            timeframe: Some("5m".to_string()),
            count: Some(5),
        };
        assert!(matches!(spec.rule(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_user_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register("flat", |spec| {
            Ok(Box::new(MemoryFeed::new(spec.name.clone(), Timeframe::days(1), Vec::new()))
                as Box<dyn Feed>)
        });
        let mut spec = FeedSpec::memory("f", Vec::new());
        spec.provider = "flat".to_string();
        let mut feed = registry.create(&spec).unwrap();
        assert_eq!(feed.poll(), Ok(FeedPoll::Exhausted));
    }
}
