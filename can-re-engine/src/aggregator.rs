//! Frame aggregation and arrival statistics
//!
//! Frames are grouped by arbitration id into [`ArbitrationGroup`]s held in an owned,
//! id-ordered map. Statistics are recomputed from a group on request rather than
//! maintained incrementally.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::j1979;
use crate::timeseries::TimeSeriesStore;
use crate::types::Frame;

/// Intervals within this fraction of the mean count as periodic
const CYCLIC_TOLERANCE: f64 = 0.2;

/// All frames observed for one arbitration id
#[derive(Debug, Clone)]
pub struct ArbitrationGroup {
    arbitration_id: u32,
    frames: Vec<Frame>,
    store: TimeSeriesStore,
}

impl ArbitrationGroup {
    pub fn new(arbitration_id: u32) -> Self {
        Self {
            arbitration_id,
            frames: Vec::new(),
            store: TimeSeriesStore::new(),
        }
    }

    /// Append a frame; the caller guarantees it carries this group's id
    pub fn push(&mut self, frame: Frame) {
        self.store.push(&frame);
        self.frames.push(frame);
    }

    pub fn arbitration_id(&self) -> u32 {
        self.arbitration_id
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Largest declared payload length seen for this id
    pub fn dlc(&self) -> usize {
        self.store.width()
    }

    /// Compute arrival statistics for the frames seen so far
    pub fn statistics(&self) -> MessageStatistics {
        let timestamps = self.store.timestamps();
        let count = timestamps.len();
        let first_seen = timestamps.first().copied().unwrap_or(0.0);
        let last_seen = timestamps.last().copied().unwrap_or(0.0);
        let time_span = last_seen - first_seen;

        let intervals: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
        let (min_interval, max_interval, avg_interval) = if intervals.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let min = intervals.iter().copied().fold(f64::INFINITY, f64::min);
            let max = intervals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (min, max, mean(&intervals))
        };

        let frequency = if time_span > 0.0 {
            count as f64 / time_span
        } else {
            0.0
        };

        let mut byte_histogram = BTreeMap::new();
        for frame in &self.frames {
            for &byte in frame.data.iter().take(frame.dlc) {
                *byte_histogram.entry(byte).or_insert(0u64) += 1;
            }
        }

        let j1979_parameter = j1979::parameter(self.arbitration_id);

        MessageStatistics {
            arbitration_id: self.arbitration_id,
            count,
            dlc: self.dlc(),
            first_seen,
            last_seen,
            time_span,
            frequency,
            min_interval,
            max_interval,
            avg_interval,
            jitter: jitter(&intervals),
            is_cyclic: is_cyclic(&intervals),
            estimated_cycle_time_ms: (avg_interval * 1000.0).round() as i64,
            byte_histogram,
            is_j1979_standard: j1979::is_j1979_id(self.arbitration_id),
            j1979_parameter: j1979_parameter.map(|p| p.name.to_string()),
            j1979_description: j1979_parameter.map(|p| p.description.to_string()),
        }
    }
}

/// Arrival statistics for one arbitration id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageStatistics {
    pub arbitration_id: u32,
    /// Number of frames
    pub count: usize,
    /// Largest declared payload length
    pub dlc: usize,
    /// Timestamp of the first frame (seconds)
    pub first_seen: f64,
    /// Timestamp of the last frame (seconds)
    pub last_seen: f64,
    /// `last_seen - first_seen`
    pub time_span: f64,
    /// Frames per second over the observed span (0 for a zero span)
    pub frequency: f64,
    pub min_interval: f64,
    pub max_interval: f64,
    pub avg_interval: f64,
    /// Population standard deviation of the inter-arrival intervals
    pub jitter: f64,
    /// True when every interval is within 20% of the mean (needs 3+ intervals)
    pub is_cyclic: bool,
    /// Mean interval rounded to whole milliseconds
    pub estimated_cycle_time_ms: i64,
    /// How often each byte value occurs across the payloads
    pub byte_histogram: BTreeMap<u8, u64>,
    /// Id belongs to the SAE J1979 diagnostic set
    #[serde(default)]
    pub is_j1979_standard: bool,
    /// J1979 parameter name, for ids in the parameter table
    #[serde(default)]
    pub j1979_parameter: Option<String>,
    #[serde(default)]
    pub j1979_description: Option<String>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn jitter(intervals: &[f64]) -> f64 {
    if intervals.len() < 2 {
        return 0.0;
    }
    let mean = mean(intervals);
    let sum_of_squares: f64 = intervals.iter().map(|x| (x - mean).powi(2)).sum();
    (sum_of_squares / intervals.len() as f64).sqrt()
}

fn is_cyclic(intervals: &[f64]) -> bool {
    if intervals.len() < 3 {
        return false;
    }
    let mean = mean(intervals);
    if mean <= 0.0 {
        return false;
    }
    let tolerance = mean * CYCLIC_TOLERANCE;
    intervals.iter().all(|i| (i - mean).abs() <= tolerance)
}

/// Groups an ordered frame sequence by arbitration id
#[derive(Debug, Clone, Default)]
pub struct FrameAggregator {
    groups: BTreeMap<u32, ArbitrationGroup>,
    total_frames: usize,
}

impl FrameAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one frame to its group, creating the group on first sight
    pub fn push(&mut self, frame: Frame) {
        let id = frame.arbitration_id;
        self.groups
            .entry(id)
            .or_insert_with(|| {
                log::trace!("New arbitration id: 0x{:X}", id);
                ArbitrationGroup::new(id)
            })
            .push(frame);
        self.total_frames += 1;
    }

    pub fn extend<I: IntoIterator<Item = Frame>>(&mut self, frames: I) {
        for frame in frames {
            self.push(frame);
        }
    }

    pub fn group(&self, arbitration_id: u32) -> Option<&ArbitrationGroup> {
        self.groups.get(&arbitration_id)
    }

    /// Groups in ascending arbitration id order
    pub fn groups(&self) -> impl Iterator<Item = &ArbitrationGroup> {
        self.groups.values()
    }

    /// Number of distinct arbitration ids
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// The `n` busiest ids, by frame count then ascending id
    pub fn most_frequent(&self, n: usize) -> Vec<&ArbitrationGroup> {
        let mut groups: Vec<&ArbitrationGroup> = self.groups.values().collect();
        groups.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then(a.arbitration_id.cmp(&b.arbitration_id))
        });
        groups.truncate(n);
        groups
    }

    /// Statistics for every group, ascending by id
    pub fn statistics(&self) -> Vec<MessageStatistics> {
        let groups: Vec<&ArbitrationGroup> = self.groups.values().collect();
        let stats: Vec<MessageStatistics> =
            groups.par_iter().map(|group| group.statistics()).collect();
        log::info!("Calculated statistics for {} message IDs", stats.len());
        for s in stats.iter().filter(|s| s.is_j1979_standard) {
            match &s.j1979_parameter {
                Some(name) => log::debug!("J1979 id 0x{:X}: {}", s.arbitration_id, name),
                None => log::debug!("J1979 id 0x{:X}", s.arbitration_id),
            }
        }
        stats
    }
}
