//! Arena of lines with alias resolution.

use crate::error::DataError;
use crate::series::buffer::TimeSeriesBuffer;
use crate::types::LineId;

#[derive(Debug, Clone)]
enum Slot {
    Owned(TimeSeriesBuffer),
    /// Write-through view of `target`, delayed by `offset` bars.
    Alias { target: LineId, offset: usize },
}

/// Owns every line of a run. Lines are addressed by [`LineId`].
#[derive(Debug, Clone, Default)]
pub struct LineStore {
    slots: Vec<Slot>,
    names: Vec<String>,
}

impl LineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new owned line.
    pub fn create(&mut self, name: impl Into<String>) -> LineId {
        let id = LineId(self.slots.len());
        self.slots.push(Slot::Owned(TimeSeriesBuffer::new()));
        self.names.push(name.into());
        id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn name(&self, line: LineId) -> &str {
        self.names.get(line.0).map(String::as_str).unwrap_or("?")
    }

    pub fn contains(&self, line: LineId) -> bool {
        line.0 < self.slots.len()
    }

    pub fn is_alias(&self, line: LineId) -> bool {
        matches!(self.slots.get(line.0), Some(Slot::Alias { .. }))
    }

    /// Follow aliases down to the owning line, summing offsets.
    pub fn resolve(&self, line: LineId) -> Result<(LineId, usize), DataError> {
        let mut current = line;
        let mut offset = 0;
        loop {
            match self.slots.get(current.0) {
                Some(Slot::Owned(_)) => return Ok((current, offset)),
                Some(Slot::Alias { target, offset: o }) => {
                    current = *target;
                    offset += o;
                }
                None => return Err(DataError::UnknownLine(current.0)),
            }
        }
    }

    /// Turn `line` into an alias of `target` delayed by `offset` bars, so that
    /// `read(line, ago) == read(target, ago - offset)`. Writes through `line`
    /// land in the target's storage.
    pub fn bind(&mut self, line: LineId, target: LineId, offset: usize) -> Result<(), DataError> {
        if !self.contains(line) {
            return Err(DataError::UnknownLine(line.0));
        }
        if self.is_alias(line) {
            return Err(DataError::AlreadyBound(line.0));
        }
        let (root, root_offset) = self.resolve(target)?;
        if root == line {
            return Err(DataError::AlreadyBound(line.0));
        }
        self.slots[line.0] = Slot::Alias {
            target: root,
            offset: offset + root_offset,
        };
        Ok(())
    }

    fn owned(&self, line: LineId) -> Result<(&TimeSeriesBuffer, usize), DataError> {
        let (root, offset) = self.resolve(line)?;
        match &self.slots[root.0] {
            Slot::Owned(buf) => Ok((buf, offset)),
            Slot::Alias { .. } => Err(DataError::UnknownLine(root.0)),
        }
    }

    fn owned_mut(&mut self, line: LineId) -> Result<(&mut TimeSeriesBuffer, usize), DataError> {
        let (root, offset) = self.resolve(line)?;
        match &mut self.slots[root.0] {
            Slot::Owned(buf) => Ok((buf, offset)),
            Slot::Alias { .. } => Err(DataError::UnknownLine(root.0)),
        }
    }

    /// Direct access to an owned buffer (aliases resolve to their root).
    pub fn buffer(&self, line: LineId) -> Result<&TimeSeriesBuffer, DataError> {
        self.owned(line).map(|(buf, _)| buf)
    }

    pub fn buffer_mut(&mut self, line: LineId) -> Result<&mut TimeSeriesBuffer, DataError> {
        self.owned_mut(line).map(|(buf, _)| buf)
    }

    #[inline]
    pub fn read(&self, line: LineId, ago: isize) -> Result<f64, DataError> {
        let (buf, offset) = self.owned(line)?;
        buf.read(ago - offset as isize)
    }

    pub fn set(&mut self, line: LineId, ago: isize, value: f64) -> Result<(), DataError> {
        let (buf, offset) = self.owned_mut(line)?;
        buf.set(ago - offset as isize, value)
    }

    pub fn append(&mut self, line: LineId, value: f64) -> Result<(), DataError> {
        if self.is_alias(line) {
            return Ok(());
        }
        self.buffer_mut(line)?.append(value);
        Ok(())
    }

    /// Bars seen by the line. Aliases report their root's length.
    pub fn line_len(&self, line: LineId) -> usize {
        self.buffer(line).map_or(0, TimeSeriesBuffer::len)
    }

    /// Absolute read, shifted by the alias offset.
    pub fn get_abs(&self, line: LineId, index: usize) -> Result<f64, DataError> {
        let (buf, offset) = self.owned(line)?;
        match index.checked_sub(offset) {
            Some(i) => buf.get_abs(i),
            None => Err(DataError::OutOfRange {
                ago: index as isize - offset as isize,
                len: buf.capacity(),
            }),
        }
    }

    pub fn set_abs(&mut self, line: LineId, index: usize, value: f64) -> Result<(), DataError> {
        let (buf, offset) = self.owned_mut(line)?;
        let i = index.checked_sub(offset).ok_or(DataError::OutOfRange {
            ago: index as isize - offset as isize,
            len: buf.capacity(),
        })?;
        buf.set_abs(i, value)
    }

    /// Cursor movement is a no-op on aliases; their root moves with its owner.
    pub fn forward(&mut self, line: LineId, n: usize) -> Result<(), DataError> {
        if self.is_alias(line) {
            return Ok(());
        }
        self.buffer_mut(line)?.forward(n);
        Ok(())
    }

    pub fn rewind(&mut self, line: LineId, n: usize) -> Result<(), DataError> {
        if self.is_alias(line) {
            return Ok(());
        }
        self.buffer_mut(line)?.rewind(n);
        Ok(())
    }

    pub fn home(&mut self, line: LineId) -> Result<(), DataError> {
        if self.is_alias(line) {
            return Ok(());
        }
        self.buffer_mut(line)?.home();
        Ok(())
    }

    pub fn ensure_len(&mut self, line: LineId, len: usize) -> Result<(), DataError> {
        if self.is_alias(line) {
            return Ok(());
        }
        self.buffer_mut(line)?.ensure_len(len);
        Ok(())
    }

    pub fn materialize(&mut self, line: LineId, values: Vec<f64>) -> Result<(), DataError> {
        self.buffer_mut(line)?.materialize(values);
        Ok(())
    }

    /// Home every owned line.
    pub fn home_all(&mut self) {
        for slot in &mut self.slots {
            if let Slot::Owned(buf) = slot {
                buf.home();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(store: &mut LineStore, name: &str, values: &[f64]) -> LineId {
        let line = store.create(name);
        for v in values {
            store.append(line, *v).unwrap();
        }
        line
    }

    #[test]
    fn test_alias_reads_with_offset() {
        let mut store = LineStore::new();
        let close = filled(&mut store, "close", &[1.0, 2.0, 3.0, 4.0]);
        let delayed = store.create("delayed");
        store.bind(delayed, close, 1).unwrap();

        assert_eq!(store.read(delayed, 0), Ok(3.0));
        assert_eq!(store.read(delayed, -1), Ok(2.0));
        assert_eq!(store.line_len(delayed), 4);
        assert_eq!(store.get_abs(delayed, 3), Ok(3.0));
    }

    #[test]
    fn test_alias_writes_through() {
        let mut store = LineStore::new();
        let src = filled(&mut store, "src", &[1.0, 2.0]);
        let view = store.create("view");
        store.bind(view, src, 0).unwrap();

        store.set(view, 0, 9.0).unwrap();
        assert_eq!(store.read(src, 0), Ok(9.0));

        // cursor moves belong to the owner
        store.forward(view, 1).unwrap();
        assert_eq!(store.line_len(src), 2);
    }

    #[test]
    fn test_alias_chain_collapses() {
        let mut store = LineStore::new();
        let root = filled(&mut store, "root", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let a = store.create("a");
        let b = store.create("b");
        store.bind(a, root, 1).unwrap();
        store.bind(b, a, 2).unwrap();

        assert_eq!(store.resolve(b), Ok((root, 3)));
        assert_eq!(store.read(b, 0), Ok(2.0));
        assert_eq!(store.bind(a, root, 0), Err(DataError::AlreadyBound(a.0)));
    }

    #[test]
    fn test_unknown_line() {
        let store = LineStore::new();
        assert_eq!(store.read(LineId(3), 0), Err(DataError::UnknownLine(3)));
    }
}
