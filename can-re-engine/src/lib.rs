//! CAN Reverse Engineering Library
//!
//! A reusable library for inferring the layout of undocumented CAN traffic from raw
//! captures. It turns a time-ordered frame sequence into a database of candidate
//! signals, relates them statistically and groups them.
//!
//! # Architecture
//!
//! The pipeline is a straight line; each stage consumes the complete output of the
//! previous one:
//! - Aggregates frames per arbitration id with timing and byte statistics, tagging
//!   SAE J1979 (OBD-II) diagnostic ids
//! - Detects candidate signals from per-byte and multi-byte value series
//! - Extracts raw and physical value series for each candidate
//! - Classifies candidates into coarse semantic roles
//! - Correlates candidates (Pearson, best lag, approximate p-value)
//! - Clusters candidates by correlation distance
//!
//! Results can be exported as a DBC file or serialized with serde.
//!
//! The library does NOT:
//! - Talk to CAN hardware
//! - Decode with existing DBC/ARXML definitions
//! - Render reports (see can-re-cli)
//!
//! # Example Usage
//!
//! ```no_run
//! use can_re_engine::{AnalysisConfig, Analyzer, CancelToken, DetectionPolicy};
//! use std::path::Path;
//!
//! let mut analyzer = Analyzer::new();
//! analyzer.load_csv(Path::new("capture.csv")).unwrap();
//!
//! let config = AnalysisConfig::new()
//!     .with_policy(DetectionPolicy::QuickScan)
//!     .with_sample_limit(1000)
//!     .with_max_messages(50);
//!
//! let report = analyzer.run(&config, &CancelToken::new()).unwrap();
//! for result in report.significant_correlations() {
//!     println!("{} ~ {}: {}", result.signal_a, result.signal_b, result.relationship);
//! }
//!
//! can_re_engine::write_dbc(Path::new("inferred.dbc"), &report.database, "RE").unwrap();
//! ```

// Public modules
pub mod aggregator;
pub mod analyzer;
pub mod cancel;
pub mod classify;
pub mod clustering;
pub mod config;
pub mod correlation;
pub mod formats;
pub mod j1979;
pub mod signals;
pub mod timeseries;
pub mod types;

// Re-export main types for convenience
pub use aggregator::{ArbitrationGroup, FrameAggregator, MessageStatistics};
pub use analyzer::{AnalysisReport, Analyzer};
pub use cancel::CancelToken;
pub use classify::{Classifier, HeuristicClassifier};
pub use clustering::{Cluster, ClusteringEngine, ClusteringOutcome, DendrogramEntry, Linkage};
pub use config::{AnalysisConfig, DetectionPolicy};
pub use correlation::{CorrelationEngine, CorrelationMatrix, CorrelationResult};
pub use formats::{CsvFrameReader, LogFileParser};
pub use j1979::{is_j1979_id, J1979Parameter};
pub use signals::{
    render_dbc, write_dbc, BitRange, DatabaseStats, DetectedMessage, SignalCandidate,
    SignalDatabase, SignalDetector, SignalId,
};
pub use timeseries::TimeSeriesStore;
pub use types::{
    ByteOrder, Frame, InferenceError, Result, SignalClassification, SignalType, ValueType,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty analyzer produces an empty report
        let analyzer = Analyzer::new();
        let report = analyzer
            .run(&AnalysisConfig::new(), &CancelToken::new())
            .unwrap();
        assert_eq!(report.total_frames, 0);
        assert!(report.database.is_empty());
        assert!(report.clusters.is_empty());
    }
}
