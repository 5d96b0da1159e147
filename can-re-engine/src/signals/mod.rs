//! Signal candidates, their detection and extraction, and DBC export
//!
//! This module contains the signal detector, the bit extraction used to populate
//! candidate value series, the detected signal database and the DBC writer.

pub mod candidate;
pub mod database;
pub mod dbc;
pub mod detector;
pub mod extract;

// Re-export key types for convenience
pub use candidate::{BitRange, SignalCandidate, SignalId};
pub use database::{DatabaseStats, DetectedMessage, SignalDatabase};
pub use dbc::{render_dbc, write_dbc};
pub use detector::SignalDetector;
pub use extract::{extract_raw, extract_series};
