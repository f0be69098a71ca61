//! OHLCV (Open, High, Low, Close, Volume) bar type.

use chrono::{DateTime, Utc};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// One OHLCV sample for one instrument.
/// Uses f64 so bars can be written straight into series buffers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Trading volume
    pub volume: f64,
    /// Open interest (futures), zero when not applicable
    #[serde(default)]
    pub open_interest: f64,
}

impl Bar {
    /// Create a new bar.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            open_interest: 0.0,
        }
    }

    /// Set the open interest.
    pub fn with_open_interest(mut self, open_interest: f64) -> Self {
        self.open_interest = open_interest;
        self
    }

    /// Calculate the bar's range (high - low).
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Get the timestamp as a DateTime.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Check the bar is usable: finite prices, `low <= open, close <= high`,
    /// non-negative volume.
    pub fn validate(&self) -> Result<(), DataError> {
        let malformed = |reason: &str| DataError::MalformedBar {
            timestamp: self.timestamp,
            reason: reason.to_string(),
        };

        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(malformed("non-finite price"));
        }
        if self.low > self.high {
            return Err(malformed("low above high"));
        }
        if self.open < self.low || self.open > self.high {
            return Err(malformed("open outside range"));
        }
        if self.close < self.low || self.close > self.high {
            return Err(malformed("close outside range"));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(malformed("invalid volume"));
        }
        Ok(())
    }

    /// Open price as a Decimal.
    pub fn open_dec(&self) -> Decimal {
        to_decimal(self.open)
    }

    /// High price as a Decimal.
    pub fn high_dec(&self) -> Decimal {
        to_decimal(self.high)
    }

    /// Low price as a Decimal.
    pub fn low_dec(&self) -> Decimal {
        to_decimal(self.low)
    }

    /// Close price as a Decimal.
    pub fn close_dec(&self) -> Decimal {
        to_decimal(self.close)
    }

    /// Volume as a Decimal.
    pub fn volume_dec(&self) -> Decimal {
        to_decimal(self.volume)
    }
}

impl Default for Bar {
    fn default() -> Self {
        Self::new(0, 0.0, 0.0, 0.0, 0.0, 0.0)
    }
}

/// Convert a series value into a Decimal for broker arithmetic.
/// Non-finite values map to zero.
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bar_range() {
        let bar = Bar::new(1000, 100.0, 110.0, 95.0, 105.0, 1000000.0);
        assert!((bar.range() - 15.0).abs() < 0.001);
    }

    #[test]
    fn test_bar_validate() {
        assert!(Bar::new(1, 10.0, 11.0, 9.0, 10.5, 100.0).validate().is_ok());

        let inverted = Bar::new(1, 10.0, 9.0, 11.0, 10.0, 100.0);
        assert!(matches!(
            inverted.validate(),
            Err(DataError::MalformedBar { timestamp: 1, .. })
        ));

        let nan = Bar::new(2, f64::NAN, 11.0, 9.0, 10.0, 100.0);
        assert!(nan.validate().is_err());

        let negative_volume = Bar::new(3, 10.0, 11.0, 9.0, 10.0, -1.0);
        assert!(negative_volume.validate().is_err());
    }

    #[test]
    fn test_decimal_prices() {
        let bar = Bar::new(1, 10.0, 12.5, 9.25, 12.0, 300.0);
        assert_eq!(bar.open_dec(), dec!(10));
        assert_eq!(bar.high_dec(), dec!(12.5));
        assert_eq!(bar.low_dec(), dec!(9.25));
        assert_eq!(bar.close_dec(), dec!(12));
        assert_eq!(to_decimal(f64::NAN), Decimal::ZERO);
    }
}
