//! Logging for barflow runs.

mod logging;

pub use logging::{setup_logging, LogFormat, LoggingConfig, LoggingError};
