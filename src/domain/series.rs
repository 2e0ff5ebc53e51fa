//! Append-only numeric buffer with cursor-relative addressing.
//!
//! Offset 0 is the sample under the cursor, negative offsets look back in
//! history and positive offsets look ahead (only meaningful for buffers that
//! were filled in advance, such as a preloaded feed during batch replay).
//! Reads outside the written range return NaN, the "not yet available"
//! sentinel, instead of failing.

/// Sentinel for a sample that has not been produced.
pub const NAN: f64 = f64::NAN;

#[derive(Debug, Clone, Default)]
pub struct Series {
    data: Vec<f64>,
    cursor: usize,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Absolute index of the current sample.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Add one sample at the next index and move the cursor onto it.
    pub fn append(&mut self, value: f64) {
        self.data.push(value);
        self.cursor = self.data.len() - 1;
    }

    /// Open a new bar holding the sentinel.
    pub fn forward(&mut self) {
        self.append(NAN);
    }

    /// Grow to `len` samples, padding with the sentinel. The cursor moves to
    /// the last sample.
    pub fn extend_to(&mut self, len: usize) {
        if self.data.len() < len {
            self.data.resize(len, NAN);
        }
        if !self.data.is_empty() {
            self.cursor = self.data.len() - 1;
        }
    }

    fn resolve(&self, offset: isize) -> Option<usize> {
        let idx = self.cursor as isize + offset;
        if idx < 0 || idx as usize >= self.data.len() {
            None
        } else {
            Some(idx as usize)
        }
    }

    /// Sample at `cursor + offset`, or NaN when out of range.
    pub fn get(&self, offset: isize) -> f64 {
        self.resolve(offset).map_or(NAN, |i| self.data[i])
    }

    /// Overwrite the sample at `cursor + offset`. Writes outside the buffer
    /// are dropped.
    pub fn set(&mut self, offset: isize, value: f64) {
        debug_assert!(
            self.resolve(offset).is_some(),
            "write at offset {offset} outside series of len {}",
            self.data.len()
        );
        if let Some(i) = self.resolve(offset) {
            self.data[i] = value;
        }
    }

    /// Sample at an absolute index, or NaN when out of range.
    pub fn at(&self, index: usize) -> f64 {
        self.data.get(index).copied().unwrap_or(NAN)
    }

    /// Contiguous absolute range, clamped to the written samples.
    pub fn get_range(&self, start: usize, end: usize) -> &[f64] {
        let end = end.min(self.data.len());
        let start = start.min(end);
        &self.data[start..end]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Move the cursor to an absolute index (clamped to the last sample).
    pub fn seek(&mut self, index: usize) {
        self.cursor = index.min(self.data.len().saturating_sub(1));
    }

    pub fn seek_end(&mut self) {
        self.cursor = self.data.len().saturating_sub(1);
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.data.clear();
        self.cursor = 0;
    }
}
