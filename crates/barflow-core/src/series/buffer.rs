//! Relative-indexed time-series buffer.

use crate::error::DataError;

/// One numeric series with a cursor.
///
/// Reads are relative to the cursor: `0` is the current slot, `-1` the previous
/// one. Positive offsets look ahead and are only legal once the buffer holds a
/// preloaded history (`materialize`). Unset slots hold `NaN`.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesBuffer {
    data: Vec<f64>,
    cursor: Option<usize>,
    materialized: bool,
}

impl TimeSeriesBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots up to and including the cursor.
    #[inline]
    pub fn len(&self) -> usize {
        self.cursor.map_or(0, |c| c + 1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor.is_none()
    }

    /// Number of stored slots, including any beyond the cursor.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    /// Advance the cursor one slot and write `value` there.
    pub fn append(&mut self, value: f64) {
        let next = self.len();
        if next < self.data.len() {
            self.data[next] = value;
        } else {
            self.data.push(value);
        }
        self.cursor = Some(next);
    }

    fn position(&self, ago: isize) -> Result<usize, DataError> {
        let cursor = self.cursor.ok_or(DataError::NotStarted)?;
        let out_of_range = DataError::OutOfRange {
            ago,
            len: self.len(),
        };
        if ago > 0 && !self.materialized {
            return Err(out_of_range);
        }
        let pos = cursor as isize + ago;
        if pos < 0 || pos as usize >= self.data.len() {
            return Err(out_of_range);
        }
        Ok(pos as usize)
    }

    /// Read the value `ago` slots from the cursor.
    #[inline]
    pub fn read(&self, ago: isize) -> Result<f64, DataError> {
        self.position(ago).map(|pos| self.data[pos])
    }

    /// Overwrite the value `ago` slots from the cursor.
    pub fn set(&mut self, ago: isize, value: f64) -> Result<(), DataError> {
        let pos = self.position(ago)?;
        self.data[pos] = value;
        Ok(())
    }

    /// Move the cursor `n` slots back. Stored values are kept.
    pub fn rewind(&mut self, n: usize) {
        self.cursor = match self.cursor {
            Some(c) if c >= n => Some(c - n),
            _ => None,
        };
    }

    /// Move the cursor `n` slots ahead, creating `NaN` slots past the end.
    pub fn forward(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let target = self.len() + n - 1;
        if target >= self.data.len() {
            self.data.resize(target + 1, f64::NAN);
        }
        self.cursor = Some(target);
    }

    /// Put the cursor before the first slot.
    pub fn home(&mut self) {
        self.cursor = None;
    }

    /// Preload a full history. The cursor is not moved.
    pub fn materialize(&mut self, values: Vec<f64>) {
        self.data = values;
        self.materialized = true;
        if let Some(c) = self.cursor {
            if c >= self.data.len() {
                self.cursor = self.data.len().checked_sub(1);
            }
        }
    }

    /// Grow storage to at least `len` slots, filling with `NaN`.
    pub fn ensure_len(&mut self, len: usize) {
        if self.data.len() < len {
            self.data.resize(len, f64::NAN);
        }
    }

    /// Read by absolute index.
    #[inline]
    pub fn get_abs(&self, index: usize) -> Result<f64, DataError> {
        self.data
            .get(index)
            .copied()
            .ok_or(DataError::OutOfRange {
                ago: index as isize,
                len: self.data.len(),
            })
    }

    /// Write by absolute index.
    pub fn set_abs(&mut self, index: usize, value: f64) -> Result<(), DataError> {
        let len = self.data.len();
        let slot = self.data.get_mut(index).ok_or(DataError::OutOfRange {
            ago: index as isize,
            len,
        })?;
        *slot = value;
        Ok(())
    }

    /// All stored values.
    pub fn values(&self) -> &[f64] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read() {
        let mut buf = TimeSeriesBuffer::new();
        assert_eq!(buf.read(0), Err(DataError::NotStarted));

        buf.append(1.0);
        buf.append(2.0);
        buf.append(3.0);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.read(0), Ok(3.0));
        assert_eq!(buf.read(-2), Ok(1.0));
        assert!(matches!(buf.read(-3), Err(DataError::OutOfRange { ago: -3, len: 3 })));
    }

    #[test]
    fn test_future_read_requires_materialized() {
        let mut buf = TimeSeriesBuffer::new();
        buf.append(1.0);
        buf.append(2.0);
        buf.rewind(1);
        assert!(buf.read(1).is_err());

        let mut pre = TimeSeriesBuffer::new();
        pre.materialize(vec![1.0, 2.0, 3.0]);
        pre.forward(1);
        assert_eq!(pre.read(0), Ok(1.0));
        assert_eq!(pre.read(2), Ok(3.0));
        assert!(pre.read(3).is_err());
    }

    #[test]
    fn test_rewind_forward_home() {
        let mut buf = TimeSeriesBuffer::new();
        for v in [1.0, 2.0, 3.0] {
            buf.append(v);
        }
        buf.rewind(2);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.read(0), Ok(1.0));
        assert_eq!(buf.capacity(), 3);

        buf.forward(1);
        assert_eq!(buf.read(0), Ok(2.0));

        buf.forward(3);
        assert_eq!(buf.len(), 5);
        assert!(buf.read(0).unwrap().is_nan());
        assert_eq!(buf.read(-2), Ok(3.0));

        buf.home();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 5);
    }

    #[test]
    fn test_set_relative() {
        let mut buf = TimeSeriesBuffer::new();
        buf.forward(2);
        buf.set(0, 5.0).unwrap();
        buf.set(-1, 4.0).unwrap();
        assert_eq!(buf.values(), &[4.0, 5.0]);
        assert!(buf.set(1, 6.0).is_err());
    }

    #[test]
    fn test_bulk_and_incremental_agree() {
        let values = [1.5, 2.25, f64::NAN, 4.0];

        let mut stepped = TimeSeriesBuffer::new();
        for v in values {
            stepped.append(v);
        }

        let mut bulk = TimeSeriesBuffer::new();
        bulk.ensure_len(values.len());
        for (i, v) in values.iter().enumerate() {
            bulk.set_abs(i, *v).unwrap();
        }
        bulk.forward(values.len());

        for ago in 0..values.len() as isize {
            let a = stepped.read(-ago).unwrap();
            let b = bulk.read(-ago).unwrap();
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
