//! Analysis configuration types
//!
//! Everything the pipeline can be tuned with lives here. Every field has a serde
//! default so a partial TOML table deserializes into a usable configuration.

use crate::clustering::Linkage;
use crate::types::{InferenceError, Result};
use serde::{Deserialize, Serialize};

/// Named acceptance policy used by the signal detector
///
/// The two policies use different thresholds for what counts as a meaningful
/// signal. They are kept separate rather than blended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPolicy {
    /// Variance-based scan over the first 8 bytes, optionally sampled
    #[default]
    QuickScan,
    /// Range/cardinality-based scan over the full declared length
    FullSeries,
}

/// Configuration for a full analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Detector acceptance policy
    #[serde(default)]
    pub policy: DetectionPolicy,

    /// Quick scan only: analyse at most this many evenly strided frames per id
    #[serde(default)]
    pub sample_limit: Option<usize>,

    /// Groups with fewer frames than this produce no candidates (never below 2)
    #[serde(default = "default_min_frames")]
    pub min_frames: usize,

    /// Full series only: minimum number of frames per id
    #[serde(default = "default_full_series_min_samples")]
    pub full_series_min_samples: usize,

    /// Optional: only analyse these arbitration ids
    #[serde(default)]
    pub message_filter: Option<Vec<u32>>,

    /// Optional: only analyse the N most frequent arbitration ids
    #[serde(default)]
    pub max_messages: Option<usize>,

    /// Maximum number of frames extracted per signal
    #[serde(default = "default_extraction_limit")]
    pub extraction_limit: usize,

    /// Cross-message correlation is limited to this many signals
    #[serde(default = "default_cross_message_limit")]
    pub cross_message_limit: usize,

    /// Smallest merge accepted as a multi-member cluster
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Cut threshold as a fraction of the largest merge distance
    #[serde(default = "default_cluster_cut_ratio")]
    pub cluster_cut_ratio: f64,

    /// Cluster-to-cluster distance
    #[serde(default)]
    pub linkage: Linkage,

    /// Run the correlation stage
    #[serde(default = "default_true")]
    pub correlate: bool,

    /// Run the clustering stage (requires correlation)
    #[serde(default = "default_true")]
    pub cluster: bool,
}

fn default_true() -> bool {
    true
}

fn default_min_frames() -> usize {
    2
}

fn default_full_series_min_samples() -> usize {
    10
}

fn default_extraction_limit() -> usize {
    100
}

fn default_cross_message_limit() -> usize {
    20
}

fn default_min_cluster_size() -> usize {
    3
}

fn default_cluster_cut_ratio() -> f64 {
    0.3
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            policy: DetectionPolicy::default(),
            sample_limit: None,
            min_frames: default_min_frames(),
            full_series_min_samples: default_full_series_min_samples(),
            message_filter: None,
            max_messages: None,
            extraction_limit: default_extraction_limit(),
            cross_message_limit: default_cross_message_limit(),
            min_cluster_size: default_min_cluster_size(),
            cluster_cut_ratio: default_cluster_cut_ratio(),
            linkage: Linkage::default(),
            correlate: true,
            cluster: true,
        }
    }
}

impl AnalysisConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: select the detection policy
    pub fn with_policy(mut self, policy: DetectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builder method: enable the bounded quick-scan mode
    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = Some(limit);
        self
    }

    /// Builder method: set the minimum group size
    pub fn with_min_frames(mut self, min_frames: usize) -> Self {
        self.min_frames = min_frames;
        self
    }

    /// Builder method: set message filter
    pub fn with_message_filter(mut self, ids: Vec<u32>) -> Self {
        self.message_filter = Some(ids);
        self
    }

    /// Builder method: analyse only the N most frequent ids
    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = Some(max_messages);
        self
    }

    /// Builder method: set the per-signal extraction cap
    pub fn with_extraction_limit(mut self, limit: usize) -> Self {
        self.extraction_limit = limit;
        self
    }

    /// Builder method: set the minimum cluster size
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    /// Builder method: set the clustering linkage
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    /// Builder method: enable or disable the correlation and clustering stages
    pub fn with_correlation(mut self, correlate: bool, cluster: bool) -> Self {
        self.correlate = correlate;
        self.cluster = cluster;
        self
    }

    /// Effective minimum group size
    pub fn effective_min_frames(&self) -> usize {
        let floor = match self.policy {
            DetectionPolicy::QuickScan => self.min_frames,
            DetectionPolicy::FullSeries => self.min_frames.max(self.full_series_min_samples),
        };
        floor.max(2)
    }

    /// Check if a message id should be analysed
    pub fn should_process_message(&self, arbitration_id: u32) -> bool {
        match &self.message_filter {
            Some(ids) => ids.contains(&arbitration_id),
            None => true,
        }
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.cluster_cut_ratio) {
            return Err(InferenceError::InvalidConfig(format!(
                "cluster_cut_ratio must be within [0, 1], got {}",
                self.cluster_cut_ratio
            )));
        }
        if self.extraction_limit == 0 {
            return Err(InferenceError::InvalidConfig(
                "extraction_limit must be greater than zero".to_string(),
            ));
        }
        if self.min_cluster_size == 0 {
            return Err(InferenceError::InvalidConfig(
                "min_cluster_size must be greater than zero".to_string(),
            ));
        }
        if self.sample_limit == Some(0) {
            return Err(InferenceError::InvalidConfig(
                "sample_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_config_builder() {
        let config = AnalysisConfig::new()
            .with_policy(DetectionPolicy::FullSeries)
            .with_sample_limit(500)
            .with_message_filter(vec![0x100, 0x200])
            .with_max_messages(50)
            .with_min_cluster_size(2)
            .with_linkage(Linkage::Average);

        assert_eq!(config.policy, DetectionPolicy::FullSeries);
        assert_eq!(config.sample_limit, Some(500));
        assert_eq!(config.max_messages, Some(50));
        assert_eq!(config.min_cluster_size, 2);
        assert_eq!(config.linkage, Linkage::Average);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.policy, DetectionPolicy::QuickScan);
        assert_eq!(config.extraction_limit, 100);
        assert_eq!(config.cross_message_limit, 20);
        assert_eq!(config.min_cluster_size, 3);
        assert!((config.cluster_cut_ratio - 0.3).abs() < 1e-12);
        assert!(config.correlate && config.cluster);
    }

    #[test]
    fn test_effective_min_frames() {
        let quick = AnalysisConfig::new().with_min_frames(0);
        assert_eq!(quick.effective_min_frames(), 2);

        let full = AnalysisConfig::new().with_policy(DetectionPolicy::FullSeries);
        assert_eq!(full.effective_min_frames(), 10);
    }

    #[test]
    fn test_filter_logic() {
        let config = AnalysisConfig::new().with_message_filter(vec![0x123, 0x456]);
        assert!(config.should_process_message(0x123));
        assert!(!config.should_process_message(0x789));
        assert!(AnalysisConfig::new().should_process_message(0xFFFF));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AnalysisConfig::new();
        config.cluster_cut_ratio = 1.5;
        assert!(config.validate().is_err());

        let config = AnalysisConfig::new().with_extraction_limit(0);
        assert!(config.validate().is_err());

        let config = AnalysisConfig::new().with_sample_limit(0);
        assert!(config.validate().is_err());
    }
}
