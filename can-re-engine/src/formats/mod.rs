//! Capture file readers
//!
//! Each reader implements an iterator pattern over `Frame` objects. Frames come out
//! in file order; the engine relies on captures already being time-ordered.

use crate::types::{Frame, Result};
use std::path::Path;

pub mod csv;

pub use self::csv::CsvFrameReader;

/// Common trait for all capture file readers
///
/// A malformed record is yielded as an `Err` item rather than ending the iteration,
/// so callers can skip it and continue.
pub trait LogFileParser: Iterator<Item = Result<Frame>> + Sized {
    /// Open a capture file and return an iterator over its frames
    fn parse(path: &Path) -> Result<Self>;
}
