//! Named groups of lines advanced together.

use crate::error::DataError;
use crate::series::store::LineStore;
use crate::types::{Bar, LineId};

/// A named, ordered set of lines owned by one producer (a feed or a node).
#[derive(Debug, Clone)]
pub struct SeriesGroup {
    name: String,
    lines: Vec<(String, LineId)>,
    minperiod: usize,
}

impl SeriesGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: Vec::new(),
            minperiod: 1,
        }
    }

    /// Allocate one line per role in `store`.
    pub fn allocate(store: &mut LineStore, name: impl Into<String>, roles: &[&str]) -> Self {
        let mut group = Self::new(name);
        for role in roles {
            let line = store.create(format!("{}.{}", group.name, role));
            group.push(*role, line);
        }
        group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push(&mut self, role: impl Into<String>, line: LineId) {
        self.lines.push((role.into(), line));
    }

    /// Look up a line by role.
    pub fn line(&self, role: &str) -> Option<LineId> {
        self.lines
            .iter()
            .find(|(r, _)| r == role)
            .map(|(_, line)| *line)
    }

    pub fn lines(&self) -> impl Iterator<Item = LineId> + '_ {
        self.lines.iter().map(|(_, line)| *line)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> + '_ {
        self.lines.iter().map(|(role, _)| role.as_str())
    }

    pub fn width(&self) -> usize {
        self.lines.len()
    }

    pub fn minperiod(&self) -> usize {
        self.minperiod
    }

    pub fn set_minperiod(&mut self, minperiod: usize) {
        self.minperiod = minperiod;
    }

    /// Bars seen by the group (length of its first line).
    pub fn len(&self, store: &LineStore) -> usize {
        self.lines
            .first()
            .map_or(0, |(_, line)| store.line_len(*line))
    }

    pub fn is_empty(&self, store: &LineStore) -> bool {
        self.len(store) == 0
    }

    pub fn forward(&self, store: &mut LineStore, n: usize) -> Result<(), DataError> {
        for line in self.lines() {
            store.forward(line, n)?;
        }
        Ok(())
    }

    pub fn rewind(&self, store: &mut LineStore, n: usize) -> Result<(), DataError> {
        for line in self.lines() {
            store.rewind(line, n)?;
        }
        Ok(())
    }

    pub fn home(&self, store: &mut LineStore) -> Result<(), DataError> {
        for line in self.lines() {
            store.home(line)?;
        }
        Ok(())
    }

    /// Append one value per line, in role order.
    pub fn append_row(&self, store: &mut LineStore, row: &[f64]) -> Result<(), DataError> {
        for (line, value) in self.lines().zip(row.iter().copied()) {
            store.append(line, value)?;
        }
        Ok(())
    }

    /// Every owned line has the same length.
    pub fn is_aligned(&self, store: &LineStore) -> bool {
        let mut lens = self
            .lines()
            .filter(|line| !store.is_alias(*line))
            .map(|line| store.line_len(line));
        match lens.next() {
            Some(first) => lens.all(|len| len == first),
            None => true,
        }
    }
}

/// Typed handle to the lines of a price feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BarLines {
    pub datetime: LineId,
    pub open: LineId,
    pub high: LineId,
    pub low: LineId,
    pub close: LineId,
    pub volume: LineId,
    pub open_interest: LineId,
}

impl BarLines {
    pub const ROLES: [&'static str; 7] = [
        "datetime",
        "open",
        "high",
        "low",
        "close",
        "volume",
        "openinterest",
    ];

    /// Allocate the seven lines of a feed.
    pub fn allocate(store: &mut LineStore, feed: &str) -> (Self, SeriesGroup) {
        let group = SeriesGroup::allocate(store, feed, &Self::ROLES);
        let ids: Vec<LineId> = group.lines().collect();
        let lines = Self {
            datetime: ids[0],
            open: ids[1],
            high: ids[2],
            low: ids[3],
            close: ids[4],
            volume: ids[5],
            open_interest: ids[6],
        };
        (lines, group)
    }

    pub fn as_array(&self) -> [LineId; 7] {
        [
            self.datetime,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.open_interest,
        ]
    }

    fn row(bar: &Bar) -> [f64; 7] {
        [
            bar.timestamp as f64,
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
            bar.open_interest,
        ]
    }

    /// Open a new slot holding `bar`.
    pub fn append_bar(&self, store: &mut LineStore, bar: &Bar) -> Result<(), DataError> {
        for (line, value) in self.as_array().into_iter().zip(Self::row(bar)) {
            store.append(line, value)?;
        }
        Ok(())
    }

    /// Overwrite the current slot with `bar` (replay updates).
    pub fn overwrite_bar(&self, store: &mut LineStore, bar: &Bar) -> Result<(), DataError> {
        for (line, value) in self.as_array().into_iter().zip(Self::row(bar)) {
            store.set(line, 0, value)?;
        }
        Ok(())
    }

    /// Preload a full history into every line.
    pub fn materialize(&self, store: &mut LineStore, bars: &[Bar]) -> Result<(), DataError> {
        let mut columns: [Vec<f64>; 7] = Default::default();
        for bar in bars {
            for (column, value) in columns.iter_mut().zip(Self::row(bar)) {
                column.push(value);
            }
        }
        for (line, column) in self.as_array().into_iter().zip(columns) {
            store.materialize(line, column)?;
        }
        Ok(())
    }

    /// Reassemble the bar `ago` slots from the cursor.
    pub fn read_bar(&self, store: &LineStore, ago: isize) -> Result<Bar, DataError> {
        Ok(Bar {
            timestamp: store.read(self.datetime, ago)? as i64,
            open: store.read(self.open, ago)?,
            high: store.read(self.high, ago)?,
            low: store.read(self.low, ago)?,
            close: store.read(self.close, ago)?,
            volume: store.read(self.volume, ago)?,
            open_interest: store.read(self.open_interest, ago)?,
        })
    }
}
