//! Per-arbitration-id columnar time-series store
//!
//! Payload bytes are kept as one column per byte offset next to a timestamp column,
//! built incrementally as frames are appended. Bytes missing from a short payload
//! are stored as zero so every column stays as long as the timestamp column.

use byteorder::{ByteOrder as _, LittleEndian};

use crate::types::Frame;

/// Columnar view of one arbitration id's traffic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesStore {
    timestamps: Vec<f64>,
    columns: Vec<Vec<u8>>,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one frame, widening the store if its declared length is larger
    pub fn push(&mut self, frame: &Frame) {
        let rows = self.timestamps.len();
        while self.columns.len() < frame.dlc {
            // Earlier frames had no byte here: back-fill with zero padding
            self.columns.push(vec![0; rows]);
        }

        for (index, column) in self.columns.iter_mut().enumerate() {
            let value = if index < frame.dlc { frame.byte_at(index) } else { 0 };
            column.push(value);
        }
        self.timestamps.push(frame.timestamp);
    }

    /// Number of rows (frames)
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Number of byte columns (the largest declared length seen)
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Values of byte `index` across all frames; empty past the store width
    pub fn byte_series(&self, index: usize) -> &[u8] {
        self.columns.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Unsigned little-endian integers composed from `byte_len` bytes at `start_byte`
    ///
    /// Bytes past the store width read as zero.
    pub fn window_series(&self, start_byte: usize, byte_len: usize) -> Vec<u64> {
        let byte_len = byte_len.clamp(1, 8);
        let mut buf = [0u8; 8];
        (0..self.len())
            .map(|row| {
                for (offset, slot) in buf.iter_mut().enumerate().take(byte_len) {
                    *slot = self
                        .columns
                        .get(start_byte + offset)
                        .map_or(0, |column| column[row]);
                }
                LittleEndian::read_uint(&buf[..byte_len], byte_len)
            })
            .collect()
    }

    /// Evenly strided copy holding at most `limit` rows
    ///
    /// When the store has more than `limit` rows, rows whose index is a multiple of
    /// `len / limit` are kept, truncated to `limit`. Smaller stores are cloned as is.
    pub fn subsample(&self, limit: usize) -> TimeSeriesStore {
        let len = self.len();
        if limit == 0 || len <= limit {
            return self.clone();
        }

        let step = len / limit;
        let rows: Vec<usize> = (0..len).step_by(step).take(limit).collect();
        TimeSeriesStore {
            timestamps: rows.iter().map(|&row| self.timestamps[row]).collect(),
            columns: self
                .columns
                .iter()
                .map(|column| rows.iter().map(|&row| column[row]).collect())
                .collect(),
        }
    }
}
