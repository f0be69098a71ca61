//! Error types for the backtesting engine.

use thiserror::Error;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Strategy error: {0}")]
    Strategy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Data errors: bad offsets and malformed bars.
///
/// Local to one buffer or feed. A feed that produces one stops, the rest of the
/// run continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Offset {ago} out of range (length {len})")]
    OutOfRange { ago: isize, len: usize },

    #[error("Line has no current bar")]
    NotStarted,

    #[error("Malformed bar at {timestamp}: {reason}")]
    MalformedBar { timestamp: i64, reason: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No data available: {0}")]
    NoDataAvailable(String),

    #[error("Feed disconnected: {0}")]
    Disconnected(String),

    #[error("Unknown line {0}")]
    UnknownLine(usize),

    #[error("Line {0} is already bound")]
    AlreadyBound(usize),
}

/// Setup errors. Always fatal before the first bar is processed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No feeds configured")]
    NoFeeds,

    #[error("Feed '{feed}' is live and cannot run in vectorized mode")]
    ModeFeedMismatch { feed: String },

    #[error("Feed '{feed}' replays bars in place and requires event-driven mode")]
    ReplayRequiresEventDriven { feed: String },

    #[error("Unknown scheme: {0}")]
    UnknownScheme(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Graph construction errors. Fatal at construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Cyclic dependency between nodes: {}", nodes.join(" -> "))]
    Cycle { nodes: Vec<String> },

    #[error("Node '{node}' derived minperiod {minperiod}, minimum is 1")]
    MinperiodUnderflow { node: String, minperiod: usize },

    #[error("Graph is frozen, '{0}' is not allowed after build")]
    Frozen(&'static str),

    #[error("Unknown line {0}")]
    UnknownLine(usize),

    #[error("Unknown node {0}")]
    UnknownNode(usize),

    #[error("Node '{node}' aliases output {output} onto missing input {input}")]
    InvalidAlias {
        node: String,
        output: usize,
        input: usize,
    },

    #[error("Graph is not built yet")]
    NotBuilt,
}

/// Errors raised by a compute node while producing values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Node '{node}': {source}")]
    Data {
        node: String,
        #[source]
        source: DataError,
    },

    #[error("Node '{0}' does not support bulk computation")]
    BulkUnsupported(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl NodeError {
    /// Attach a node name to a data error.
    pub fn data(node: &str, source: DataError) -> Self {
        NodeError::Data {
            node: node.to_string(),
            source,
        }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
