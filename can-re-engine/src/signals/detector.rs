//! Signal candidate detection
//!
//! Scans the byte columns of one arbitration id for single-byte and 2-4 byte windows
//! that look like independent signals. Two acceptance policies exist
//! ([`DetectionPolicy`]) and are kept apart on purpose: the quick scan judges values
//! by variance and monotonicity, the full-series scan by range and cardinality.
//!
//! Single bytes are scanned before windows, and a window is only kept when it
//! overlaps nothing accepted before it, so the first hypothesis for a bit range wins.

use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::aggregator::ArbitrationGroup;
use crate::config::{AnalysisConfig, DetectionPolicy};
use crate::signals::candidate::{BitRange, SignalCandidate};
use crate::signals::extract::extract_series;
use crate::timeseries::TimeSeriesStore;
use crate::types::{ByteOrder, SignalType, ValueType};

/// The quick scan never looks past this many single bytes
const QUICK_SCAN_BYTES: usize = 8;

/// In bounded mode, windows start within the first this-many bytes
const BOUNDED_WINDOW_STARTS: usize = 6;

const MIN_WINDOW_BYTES: usize = 2;
const MAX_WINDOW_BYTES: usize = 4;

const QUICK_BYTE_MIN_VARIANCE: f64 = 1.0;
const QUICK_WINDOW_MIN_VARIANCE: f64 = 10.0;

const FULL_BYTE_MIN_RANGE: u64 = 2;
const FULL_WINDOW_MIN_RANGE: u64 = 10;
const FULL_WINDOW_MIN_DISTINCT: usize = 5;

/// Summary statistics of one value sequence
#[derive(Debug, Clone, Copy, PartialEq)]
struct ValueSummary {
    count: usize,
    distinct: usize,
    min: u64,
    max: u64,
    variance: f64,
}

impl ValueSummary {
    fn of(values: &[u64]) -> Self {
        let count = values.len();
        let distinct = values.iter().collect::<BTreeSet<_>>().len();
        let min = values.iter().copied().min().unwrap_or(0);
        let max = values.iter().copied().max().unwrap_or(0);

        let variance = if count == 0 {
            0.0
        } else {
            let mean = values.iter().map(|&v| v as f64).sum::<f64>() / count as f64;
            values
                .iter()
                .map(|&v| (v as f64 - mean).powi(2))
                .sum::<f64>()
                / count as f64
        };

        Self {
            count,
            distinct,
            min,
            max,
            variance,
        }
    }

    fn range(&self) -> u64 {
        self.max - self.min
    }
}

fn is_non_decreasing(values: &[u64]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1])
}

fn is_non_increasing(values: &[u64]) -> bool {
    values.windows(2).all(|w| w[0] >= w[1])
}

fn is_strictly_increasing(values: &[u64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}

fn is_strictly_decreasing(values: &[u64]) -> bool {
    values.windows(2).all(|w| w[0] > w[1])
}

/// Coarse type from the number of distinct values
fn type_by_cardinality(distinct: usize) -> SignalType {
    match distinct {
        0..=2 => SignalType::Boolean,
        3..=10 => SignalType::Enum,
        _ => SignalType::Integer,
    }
}

fn quick_byte_unit(range: u64) -> &'static str {
    match range {
        0..=9 => "enum",
        10..=99 => "%",
        100..=199 => "temp",
        _ => "raw",
    }
}

fn quick_window_unit(range: u64) -> &'static str {
    match range {
        0..=99 => "enum",
        100..=999 => "%",
        1000..=9999 => "RPM",
        10000..=65534 => "speed",
        _ => "raw",
    }
}

/// Full-series type and unit, decided together from the value statistics
fn full_series_type_and_unit(summary: &ValueSummary) -> (SignalType, &'static str) {
    let range = summary.range();
    if summary.distinct <= 2 {
        (SignalType::Boolean, "bool")
    } else if summary.distinct <= 10 {
        (SignalType::Enum, "enum")
    } else if range > 10 {
        let unit = match range {
            0..=99 => "%",
            100..=999 => "RPM",
            1000..=9999 => "speed",
            _ => "raw",
        };
        (SignalType::Integer, unit)
    } else {
        (SignalType::Unknown, "raw")
    }
}

/// Display scaling for integer-like candidates, keyed by the observed raw range
fn auto_factor(signal_type: SignalType, range: u64) -> f64 {
    if !matches!(signal_type, SignalType::Integer | SignalType::Float) || range == 0 {
        return 1.0;
    }
    if range < 256 {
        100.0 / 255.0
    } else if range < 65536 {
        1000.0 / 65535.0
    } else {
        1.0
    }
}

fn byte_name(arbitration_id: u32, byte: usize) -> String {
    format!("ID_{:X}_Byte{}", arbitration_id, byte)
}

fn window_name(arbitration_id: u32, start: usize, len: usize) -> String {
    format!("ID_{:X}_Bytes{}-{}", arbitration_id, start, start + len - 1)
}

fn overlaps_any(accepted: &[SignalCandidate], range: &BitRange) -> bool {
    accepted.iter().any(|c| c.bit_range().overlaps(range))
}

fn byte_values(store: &TimeSeriesStore, index: usize) -> Vec<u64> {
    store.byte_series(index).iter().map(|&b| u64::from(b)).collect()
}

/// Detects signal candidates in one arbitration group
pub struct SignalDetector<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> SignalDetector<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Detect candidates for `group` and extract their value series
    ///
    /// The result is sorted by start bit and free of overlapping ranges. Groups with
    /// fewer than the configured minimum number of frames yield nothing.
    pub fn detect(&self, group: &ArbitrationGroup) -> Vec<SignalCandidate> {
        let min_frames = self.config.effective_min_frames();
        if group.len() < min_frames {
            log::debug!(
                "ID 0x{:X}: {} frames, need {} - skipping",
                group.arbitration_id(),
                group.len(),
                min_frames
            );
            return Vec::new();
        }

        let mut candidates = match self.config.policy {
            DetectionPolicy::QuickScan => self.quick_scan(group),
            DetectionPolicy::FullSeries => self.full_series(group),
        };
        candidates.sort_by_key(|c| c.start_bit);

        for candidate in &mut candidates {
            let (raw, physical) =
                extract_series(group.frames(), candidate, self.config.extraction_limit);
            candidate.raw_values = raw;
            candidate.physical_values = physical;
        }

        log::debug!(
            "ID 0x{:X}: detected {} signals",
            group.arbitration_id(),
            candidates.len()
        );
        candidates
    }

    fn quick_scan(&self, group: &ArbitrationGroup) -> Vec<SignalCandidate> {
        let id = group.arbitration_id();
        let store: Cow<'_, TimeSeriesStore> = match self.config.sample_limit {
            Some(limit) => Cow::Owned(group.store().subsample(limit)),
            None => Cow::Borrowed(group.store()),
        };
        let width = store.width();
        let mut accepted = Vec::new();

        for byte in 0..width.min(QUICK_SCAN_BYTES) {
            let values = byte_values(&store, byte);
            let summary = ValueSummary::of(&values);
            if summary.distinct < 2 || summary.variance <= QUICK_BYTE_MIN_VARIANCE {
                log::trace!("ID 0x{:X} byte {}: not variable enough", id, byte);
                continue;
            }

            let signal_type = type_by_cardinality(summary.distinct);
            accepted.push(new_candidate(
                byte_name(id, byte),
                id,
                BitRange::bytes(byte, 1),
                &summary,
                signal_type,
                quick_byte_unit(summary.range()),
            ));
        }

        let max_start = match self.config.sample_limit {
            Some(_) => width.min(BOUNDED_WINDOW_STARTS),
            None => width,
        };
        for start in 0..max_start {
            for len in MIN_WINDOW_BYTES..=MAX_WINDOW_BYTES {
                if start + len > width {
                    break;
                }
                let range = BitRange::bytes(start, len);
                if overlaps_any(&accepted, &range) {
                    continue;
                }

                let values = store.window_series(start, len);
                let summary = ValueSummary::of(&values);
                if summary.distinct < 2 {
                    continue;
                }
                let monotonic = is_non_decreasing(&values) || is_non_increasing(&values);
                if !monotonic || summary.variance <= QUICK_WINDOW_MIN_VARIANCE {
                    log::trace!("ID 0x{:X} bytes {}+{}: rejected", id, start, len);
                    continue;
                }

                let signal_type = type_by_cardinality(summary.distinct);
                accepted.push(new_candidate(
                    window_name(id, start, len),
                    id,
                    range,
                    &summary,
                    signal_type,
                    quick_window_unit(summary.range()),
                ));
            }
        }

        accepted
    }

    fn full_series(&self, group: &ArbitrationGroup) -> Vec<SignalCandidate> {
        let id = group.arbitration_id();
        let store = group.store();
        let width = store.width();
        let mut accepted = Vec::new();

        for byte in 0..width {
            let values = byte_values(store, byte);
            let summary = ValueSummary::of(&values);
            if summary.distinct < 2 || summary.range() < FULL_BYTE_MIN_RANGE {
                log::trace!("ID 0x{:X} byte {}: range too small", id, byte);
                continue;
            }

            let (signal_type, unit) = full_series_type_and_unit(&summary);
            accepted.push(new_candidate(
                byte_name(id, byte),
                id,
                BitRange::bytes(byte, 1),
                &summary,
                signal_type,
                unit,
            ));
        }

        for start in 0..width.saturating_sub(1) {
            for len in MIN_WINDOW_BYTES..=MAX_WINDOW_BYTES {
                if start + len > width {
                    break;
                }
                let range = BitRange::bytes(start, len);
                if overlaps_any(&accepted, &range) {
                    continue;
                }

                let values = store.window_series(start, len);
                let summary = ValueSummary::of(&values);
                if summary.distinct < FULL_WINDOW_MIN_DISTINCT
                    || summary.range() < FULL_WINDOW_MIN_RANGE
                {
                    continue;
                }
                let strictly_monotonic =
                    is_strictly_increasing(&values) || is_strictly_decreasing(&values);
                if !strictly_monotonic && summary.distinct < summary.count / 2 {
                    log::trace!("ID 0x{:X} bytes {}+{}: no pattern", id, start, len);
                    continue;
                }

                let (signal_type, unit) = full_series_type_and_unit(&summary);
                accepted.push(new_candidate(
                    window_name(id, start, len),
                    id,
                    range,
                    &summary,
                    signal_type,
                    unit,
                ));
            }
        }

        accepted
    }
}

fn new_candidate(
    name: String,
    arbitration_id: u32,
    range: BitRange,
    summary: &ValueSummary,
    signal_type: SignalType,
    unit: &str,
) -> SignalCandidate {
    SignalCandidate {
        name,
        arbitration_id,
        start_bit: range.start_bit,
        length: range.length,
        byte_order: ByteOrder::LittleEndian,
        value_type: ValueType::Unsigned,
        factor: 1.0,
        offset: 0.0,
        min_raw: summary.min as i64,
        max_raw: summary.max as i64,
        min_physical: 0.0,
        max_physical: 0.0,
        unit: unit.to_string(),
        signal_type,
        distinct_values: summary.distinct,
        value_table: None,
        raw_values: Vec::new(),
        physical_values: Vec::new(),
    }
    .with_scaling(auto_factor(signal_type, summary.range()), 0.0)
}
