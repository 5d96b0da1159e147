//! Core types for the reverse-engineering engine
//!
//! This module defines the frame record the engine ingests, the error type shared by
//! every stage, and the small enums used to describe an inferred signal encoding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, InferenceError>;

/// Largest payload a frame can carry (CAN-FD)
pub const MAX_PAYLOAD_LEN: usize = 64;

/// Mask for the meaningful bits of an arbitration id (29-bit extended format)
pub const ARBITRATION_ID_MASK: u32 = 0x1FFF_FFFF;

/// A single observed CAN frame
///
/// Frames are immutable once ingested. The engine assumes they arrive ordered by
/// timestamp and never re-sorts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Capture timestamp in seconds
    pub timestamp: f64,
    /// Arbitration id (11-bit or 29-bit)
    pub arbitration_id: u32,
    /// Payload bytes as captured (0-64 bytes)
    pub data: Vec<u8>,
    /// Declared payload length in bytes
    pub dlc: usize,
    /// CAN channel number
    pub channel: u8,
    /// True if this is an extended (29-bit) id
    pub is_extended: bool,
    /// True if this is a CAN-FD frame
    pub is_fd: bool,
    /// True if this is a remote frame
    pub is_remote_frame: bool,
}

impl Frame {
    /// Create a frame whose declared length matches its payload
    pub fn new(timestamp: f64, arbitration_id: u32, data: Vec<u8>) -> Self {
        let arbitration_id = arbitration_id & ARBITRATION_ID_MASK;
        let dlc = data.len().min(MAX_PAYLOAD_LEN);
        Self {
            timestamp,
            arbitration_id,
            data,
            dlc,
            channel: 0,
            is_extended: arbitration_id > 0x7FF,
            is_fd: dlc > 8,
            is_remote_frame: false,
        }
    }

    /// Override the declared length (a payload shorter than this is zero padded)
    pub fn with_dlc(mut self, dlc: usize) -> Self {
        self.dlc = dlc.min(MAX_PAYLOAD_LEN);
        self.is_fd = self.dlc > 8;
        self
    }

    /// Set the channel the frame was captured on
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// Payload byte at `index`, or 0 when the payload is shorter than that
    pub fn byte_at(&self, index: usize) -> u8 {
        self.data.get(index).copied().unwrap_or(0)
    }
}

/// Errors that can occur while running the inference pipeline
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to parse log file: {0}")]
    LogParseError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Numerical domain error: {0}")]
    NumericalDomain(String),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Byte order of an inferred signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::LittleEndian => write!(f, "Intel"),
            ByteOrder::BigEndian => write!(f, "Motorola"),
        }
    }
}

/// Signedness of an inferred signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// Coarse shape of the values a signal takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Unknown,
    Boolean,
    Integer,
    Float,
    Enum,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalType::Unknown => "Unknown",
            SignalType::Boolean => "Boolean",
            SignalType::Integer => "Integer",
            SignalType::Float => "Float",
            SignalType::Enum => "Enum",
        };
        f.write_str(name)
    }
}

/// Semantic role assigned to a signal by a classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalClassification {
    Unknown,
    Sensor,
    Actuator,
    Status,
    Diagnostic,
    Control,
}

impl fmt::Display for SignalClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalClassification::Unknown => "Unknown",
            SignalClassification::Sensor => "Sensor",
            SignalClassification::Actuator => "Actuator",
            SignalClassification::Status => "Status",
            SignalClassification::Diagnostic => "Diagnostic",
            SignalClassification::Control => "Control",
        };
        f.write_str(name)
    }
}
