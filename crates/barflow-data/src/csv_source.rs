//! CSV feed.

use chrono::{NaiveDate, NaiveDateTime};
use csv::{DeserializeRecordsIntoIter, ReaderBuilder};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

use barflow_core::{Bar, DataError, Feed, FeedPoll, Timeframe};

/// CSV record format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Date", alias = "date", alias = "timestamp", alias = "Timestamp")]
    date: String,
    #[serde(alias = "Open", alias = "open")]
    open: f64,
    #[serde(alias = "High", alias = "high")]
    high: f64,
    #[serde(alias = "Low", alias = "low")]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "Adj Close")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: f64,
    #[serde(
        alias = "OpenInterest",
        alias = "openinterest",
        alias = "open_interest",
        default
    )]
    open_interest: f64,
}

impl CsvRecord {
    fn into_bar(self) -> Result<Bar, DataError> {
        let timestamp = parse_timestamp(&self.date)?;
        Ok(Bar::new(
            timestamp,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )
        .with_open_interest(self.open_interest))
    }
}

/// Historical feed reading a CSV file row by row.
///
/// Rows must be in ascending time order. A row that fails to parse or
/// validate is reported once and ends the feed.
pub struct CsvFeed {
    name: String,
    timeframe: Timeframe,
    rows: DeserializeRecordsIntoIter<File, CsvRecord>,
    done: bool,
}

impl CsvFeed {
    /// Open a CSV file.
    pub fn open(
        path: impl AsRef<Path>,
        name: impl Into<String>,
        timeframe: Timeframe,
    ) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::NoDataAvailable(path.display().to_string()));
        }
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| DataError::ParseError(e.to_string()))?;

        let name = name.into();
        tracing::debug!(feed = %name, path = %path.display(), "Opened CSV feed");

        Ok(Self {
            name,
            timeframe,
            rows: reader.into_deserialize(),
            done: false,
        })
    }
}

impl Feed for CsvFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    fn poll(&mut self) -> Result<FeedPoll, DataError> {
        if self.done {
            return Ok(FeedPoll::Exhausted);
        }
        let Some(row) = self.rows.next() else {
            self.done = true;
            return Ok(FeedPoll::Exhausted);
        };

        let bar = row
            .map_err(|e| DataError::ParseError(e.to_string()))
            .and_then(CsvRecord::into_bar)
            .and_then(|bar| bar.validate().map(|_| bar));
        match bar {
            Ok(bar) => Ok(FeedPoll::Bar(bar)),
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }
}

/// Load all bars from a CSV file, sorted by timestamp.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path.as_ref())
        .map_err(|e| DataError::ParseError(e.to_string()))?;

    let mut bars = Vec::new();

    for result in reader.deserialize() {
        let record: CsvRecord = result.map_err(|e| DataError::ParseError(e.to_string()))?;
        bars.push(record.into_bar()?);
    }

    // Sort by timestamp
    bars.sort_by_key(|b| b.timestamp);

    Ok(bars)
}

/// Parse various timestamp formats into Unix milliseconds (UTC).
pub fn parse_timestamp(date_str: &str) -> Result<i64, DataError> {
    // Try various formats
    let datetime_formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];
    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];

    for format in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date_str, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }
    for format in date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(date_str, format) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return Ok(dt.and_utc().timestamp_millis());
            }
        }
    }

    // Try parsing as Unix timestamp
    if let Ok(ts) = date_str.parse::<i64>() {
        // Assume milliseconds if > 10 digits
        if ts > 10_000_000_000 {
            return Ok(ts);
        } else {
            return Ok(ts * 1000);
        }
    }

    Err(DataError::ParseError(format!(
        "Could not parse date: {}",
        date_str
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_timestamp() {
        // Test various formats
        assert_eq!(parse_timestamp("1970-01-02").unwrap(), 86_400_000);
        assert!(parse_timestamp("2024-01-15 10:30:00").is_ok());
        assert!(parse_timestamp("2024-01-15T10:30:00").is_ok());
        assert_eq!(parse_timestamp("1705312800000").unwrap(), 1_705_312_800_000); // Unix ms
        assert_eq!(parse_timestamp("1705312800").unwrap(), 1_705_312_800_000); // Unix sec
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_csv_feed_reads_rows() {
        let file = write_csv(
            "Date,Open,High,Low,Close,Volume\n\
             2024-01-02,10,11,9,10.5,1000\n\
             2024-01-03,10.5,12,10,11.5,1200\n",
        );
        let mut feed = CsvFeed::open(file.path(), "test", Timeframe::days(1)).unwrap();

        let FeedPoll::Bar(first) = feed.poll().unwrap() else {
            panic!("expected a bar");
        };
        assert_eq!(first.close, 10.5);
        assert_eq!(first.volume, 1000.0);
        assert!(matches!(feed.poll(), Ok(FeedPoll::Bar(_))));
        assert_eq!(feed.poll(), Ok(FeedPoll::Exhausted));
    }

    #[test]
    fn test_csv_feed_stops_on_malformed_row() {
        let file = write_csv(
            "date,open,high,low,close,volume\n\
             2024-01-02,10,11,9,10.5,1000\n\
             2024-01-03,10,9,11,10,1000\n\
             2024-01-04,10,11,9,10.5,1000\n",
        );
        let mut feed = CsvFeed::open(file.path(), "bad", Timeframe::days(1)).unwrap();
        assert!(matches!(feed.poll(), Ok(FeedPoll::Bar(_))));
        assert!(matches!(feed.poll(), Err(DataError::MalformedBar { .. })));
        assert_eq!(feed.poll(), Ok(FeedPoll::Exhausted));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            CsvFeed::open("/nonexistent/bars.csv", "x", Timeframe::days(1)),
            Err(DataError::NoDataAvailable(_))
        ));
    }

    #[test]
    fn test_load_csv_sorts() {
        let file = write_csv(
            "timestamp,open,high,low,close\n\
             2000,2,2,2,2\n\
             1000,1,1,1,1\n",
        );
        let bars = load_csv(file.path()).unwrap();
        assert_eq!(bars[0].timestamp, 1_000_000);
        assert_eq!(bars[1].timestamp, 2_000_000);
    }
}
