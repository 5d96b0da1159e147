//! Signal candidates and their identities

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::types::{ByteOrder, InferenceError, SignalType, ValueType};

/// A half-open bit range `[start_bit, start_bit + length)` inside a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitRange {
    pub start_bit: u16,
    pub length: u16,
}

impl BitRange {
    pub fn new(start_bit: u16, length: u16) -> Self {
        Self { start_bit, length }
    }

    /// Byte-aligned range covering `byte_len` bytes from `start_byte`
    pub fn bytes(start_byte: usize, byte_len: usize) -> Self {
        Self::new((start_byte * 8) as u16, (byte_len * 8) as u16)
    }

    /// First bit past the range
    pub fn end(&self) -> u32 {
        u32::from(self.start_bit) + u32::from(self.length)
    }

    /// True if the two ranges share at least one bit
    pub fn overlaps(&self, other: &BitRange) -> bool {
        u32::from(self.start_bit) < other.end() && u32::from(other.start_bit) < self.end()
    }

    /// True if the range lies inside a payload of `dlc` bytes
    pub fn fits_within(&self, dlc: usize) -> bool {
        self.end() as usize <= dlc * 8
    }
}

/// Identity of a detected signal
///
/// Accepted candidates of one arbitration id never overlap, so id plus bit range
/// is unique. Serialized as `0x1A0:16|8` so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId {
    pub arbitration_id: u32,
    pub start_bit: u16,
    pub length: u16,
}

impl SignalId {
    pub fn bit_range(&self) -> BitRange {
        BitRange::new(self.start_bit, self.length)
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}:{}|{}", self.arbitration_id, self.start_bit, self.length)
    }
}

impl FromStr for SignalId {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InferenceError::InvalidData(format!("Invalid signal id: {:?}", s));

        let (id, range) = s.split_once(':').ok_or_else(invalid)?;
        let (start, length) = range.split_once('|').ok_or_else(invalid)?;
        let id = id
            .strip_prefix("0x")
            .or_else(|| id.strip_prefix("0X"))
            .ok_or_else(invalid)?;

        Ok(SignalId {
            arbitration_id: u32::from_str_radix(id, 16).map_err(|_| invalid())?,
            start_bit: start.parse().map_err(|_| invalid())?,
            length: length.parse().map_err(|_| invalid())?,
        })
    }
}

impl Serialize for SignalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SignalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A hypothesized fixed-width bit field with an inferred encoding
///
/// Produced by the detector together with its extracted value series and not
/// modified afterwards; later stages annotate it through maps keyed by [`SignalId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalCandidate {
    pub name: String,
    pub arbitration_id: u32,
    /// Start bit, byte-major / bit-minor
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    pub factor: f64,
    pub offset: f64,
    /// Smallest raw value observed by the scan
    pub min_raw: i64,
    /// Largest raw value observed by the scan
    pub max_raw: i64,
    pub min_physical: f64,
    pub max_physical: f64,
    pub unit: String,
    pub signal_type: SignalType,
    /// Number of distinct raw values observed by the scan
    pub distinct_values: usize,
    /// Optional raw value -> label table
    #[serde(default)]
    pub value_table: Option<BTreeMap<i64, String>>,
    /// Extracted raw values (capped per signal)
    #[serde(default)]
    pub raw_values: Vec<i64>,
    /// `raw * factor + offset` for every extracted raw value
    #[serde(default)]
    pub physical_values: Vec<f64>,
}

impl SignalCandidate {
    pub fn id(&self) -> SignalId {
        SignalId {
            arbitration_id: self.arbitration_id,
            start_bit: self.start_bit,
            length: self.length,
        }
    }

    pub fn bit_range(&self) -> BitRange {
        BitRange::new(self.start_bit, self.length)
    }

    /// Convert a raw value to its physical value
    pub fn physical(&self, raw: f64) -> f64 {
        raw * self.factor + self.offset
    }

    /// True for two candidates of the same id whose bit ranges intersect
    pub fn overlaps(&self, other: &SignalCandidate) -> bool {
        self.arbitration_id == other.arbitration_id && self.bit_range().overlaps(&other.bit_range())
    }

    /// Set the scaling and refresh the physical range
    pub fn with_scaling(mut self, factor: f64, offset: f64) -> Self {
        self.factor = factor;
        self.offset = offset;
        let a = self.physical(self.min_raw as f64);
        let b = self.physical(self.max_raw as f64);
        self.min_physical = a.min(b);
        self.max_physical = a.max(b);
        self
    }

    /// Attach a value table (labels for enum-like raw values)
    pub fn with_value_table(mut self, table: BTreeMap<i64, String>) -> Self {
        self.value_table = Some(table);
        self
    }
}

impl fmt::Display for SignalCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}:{}) {} [{:.2}..{:.2}] {}",
            self.name,
            self.start_bit,
            self.length,
            self.signal_type,
            self.min_physical,
            self.max_physical,
            self.unit
        )
    }
}
