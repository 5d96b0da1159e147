//! Main analyzer API
//!
//! This module provides the primary interface of the library. The Analyzer owns the
//! aggregated frames of a capture and runs the inference stages over them:
//! statistics, signal detection, classification, correlation and clustering.
//! Each stage consumes the complete output of the previous one.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::aggregator::{ArbitrationGroup, FrameAggregator, MessageStatistics};
use crate::cancel::CancelToken;
use crate::classify::{Classifier, HeuristicClassifier};
use crate::clustering::{Cluster, ClusteringEngine, DendrogramEntry};
use crate::config::AnalysisConfig;
use crate::correlation::{causal_relationships, CorrelationEngine, CorrelationMatrix, CorrelationResult};
use crate::formats::{CsvFrameReader, LogFileParser};
use crate::signals::{DetectedMessage, SignalCandidate, SignalDatabase, SignalDetector, SignalId};
use crate::types::{Frame, Result, SignalClassification};

/// Everything one analysis run produced
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub total_frames: usize,
    /// Arrival statistics, ascending by id
    pub statistics: Vec<MessageStatistics>,
    /// Detected message layouts
    pub database: SignalDatabase,
    /// Semantic role per signal
    pub classifications: BTreeMap<SignalId, SignalClassification>,
    /// Correlation results, strongest first
    pub correlations: Vec<CorrelationResult>,
    pub causal_relationships: Vec<CorrelationResult>,
    pub clusters: Vec<Cluster>,
    pub dendrogram: Vec<DendrogramEntry>,
    /// Cut threshold used for the clusters (absent when clustering did not run)
    pub cluster_threshold: Option<f64>,
}

impl AnalysisReport {
    pub fn significant_correlations(&self) -> impl Iterator<Item = &CorrelationResult> {
        self.correlations.iter().filter(|r| r.is_significant)
    }
}

/// The main analyzer struct - entry point for all analysis operations
#[derive(Debug, Default)]
pub struct Analyzer {
    aggregator: FrameAggregator,
    skipped_records: usize,
}

impl Analyzer {
    /// Create a new analyzer with no frames
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_frame(&mut self, frame: Frame) {
        self.aggregator.push(frame);
    }

    pub fn add_frames<I: IntoIterator<Item = Frame>>(&mut self, frames: I) {
        self.aggregator.extend(frames);
    }

    /// Load every frame of a CSV capture
    ///
    /// Malformed records are skipped with a warning. Returns the number of frames
    /// added.
    ///
    /// # Example
    /// ```no_run
    /// use can_re_engine::Analyzer;
    /// use std::path::Path;
    ///
    /// let mut analyzer = Analyzer::new();
    /// let frames = analyzer.load_csv(Path::new("capture.csv")).unwrap();
    /// println!("Loaded {} frames", frames);
    /// ```
    pub fn load_csv(&mut self, path: &Path) -> Result<usize> {
        let mut added = 0;
        for record in CsvFrameReader::parse(path)? {
            match record {
                Ok(frame) => {
                    self.aggregator.push(frame);
                    added += 1;
                }
                Err(e) => {
                    log::warn!("Skipping record in {:?}: {}", path, e);
                    self.skipped_records += 1;
                }
            }
        }
        log::info!("Loaded {} frames from {:?}", added, path);
        Ok(added)
    }

    pub fn aggregator(&self) -> &FrameAggregator {
        &self.aggregator
    }

    /// Records dropped while loading captures
    pub fn skipped_records(&self) -> usize {
        self.skipped_records
    }

    /// Arrival statistics for every arbitration id
    pub fn statistics(&self) -> Vec<MessageStatistics> {
        self.aggregator.statistics()
    }

    /// Groups selected for detection, ascending by id
    fn selected_groups(&self, config: &AnalysisConfig) -> Vec<&ArbitrationGroup> {
        let mut groups: Vec<&ArbitrationGroup> = match config.max_messages {
            Some(n) => self.aggregator.most_frequent(n),
            None => self.aggregator.groups().collect(),
        };
        groups.retain(|group| config.should_process_message(group.arbitration_id()));
        groups.sort_by_key(|group| group.arbitration_id());
        groups
    }

    /// Detect signals for every selected arbitration id
    ///
    /// Ids are processed in parallel. The cancel token is checked before each id;
    /// once it is set the run stops with `Cancelled`.
    pub fn detect(&self, config: &AnalysisConfig, cancel: &CancelToken) -> Result<SignalDatabase> {
        config.validate()?;
        cancel.check()?;

        let groups = self.selected_groups(config);
        log::info!("Detecting signals in {} message IDs", groups.len());

        let detector = SignalDetector::new(config);
        let messages: Vec<DetectedMessage> = groups
            .par_iter()
            .map(|group| -> Result<DetectedMessage> {
                cancel.check()?;
                let signals = detector.detect(group);
                let mut message = DetectedMessage::new(
                    group.arbitration_id(),
                    group.dlc(),
                    group.len(),
                    signals,
                );
                message.is_extended |= group.frames().iter().any(|f| f.is_extended);
                Ok(message)
            })
            .collect::<Result<_>>()?;

        let mut db = SignalDatabase::new();
        for message in messages.into_iter().filter(|m| !m.signals.is_empty()) {
            db.add_message(message)?;
        }

        let stats = db.stats();
        log::info!(
            "Detected {} signals in {} messages",
            stats.num_signals,
            stats.num_messages
        );
        Ok(db)
    }

    /// Run the whole pipeline
    ///
    /// # Example
    /// ```no_run
    /// use can_re_engine::{AnalysisConfig, Analyzer, CancelToken};
    /// use std::path::Path;
    ///
    /// let mut analyzer = Analyzer::new();
    /// analyzer.load_csv(Path::new("capture.csv")).unwrap();
    ///
    /// let report = analyzer
    ///     .run(&AnalysisConfig::new(), &CancelToken::new())
    ///     .unwrap();
    /// for cluster in &report.clusters {
    ///     println!("Cluster {}: {} signals", cluster.id, cluster.members.len());
    /// }
    /// ```
    pub fn run(&self, config: &AnalysisConfig, cancel: &CancelToken) -> Result<AnalysisReport> {
        let statistics = self.statistics();
        let database = self.detect(config, cancel)?;

        let signals: Vec<SignalCandidate> = database.signals().cloned().collect();
        let classifications = HeuristicClassifier::new().classify_all(&signals);

        let mut correlations = Vec::new();
        let mut causal = Vec::new();
        let mut clusters = Vec::new();
        let mut dendrogram = Vec::new();
        let mut cluster_threshold = None;

        if config.correlate {
            cancel.check()?;
            correlations = CorrelationEngine::new(config.cross_message_limit).analyze(&signals);
            causal = causal_relationships(&correlations, &signals);

            if config.cluster {
                cancel.check()?;
                let matrix = CorrelationMatrix::build(&signals);
                let outcome = ClusteringEngine::new(
                    config.min_cluster_size,
                    config.cluster_cut_ratio,
                    config.linkage,
                )
                .cluster(&signals, &matrix)?;
                clusters = outcome.clusters;
                dendrogram = outcome.dendrogram;
                cluster_threshold = Some(outcome.threshold);
            }
        }

        Ok(AnalysisReport {
            total_frames: self.aggregator.total_frames(),
            statistics,
            database,
            classifications,
            correlations,
            causal_relationships: causal,
            clusters,
            dendrogram,
            cluster_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InferenceError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn counter_frames(id: u32, count: usize) -> Vec<Frame> {
        (0..count)
            .map(|i| Frame::new(i as f64 * 0.01, id, vec![i as u8, 0x11]))
            .collect()
    }

    #[test]
    fn test_detect_selects_messages() {
        let mut analyzer = Analyzer::new();
        analyzer.add_frames(counter_frames(0x200, 30));
        analyzer.add_frames(counter_frames(0x100, 20));
        analyzer.add_frame(Frame::new(1.0, 0x300, vec![1]));

        let db = analyzer
            .detect(&AnalysisConfig::new(), &CancelToken::new())
            .unwrap();
        // 0x300 has a single frame and produces nothing
        assert_eq!(db.get_all_can_ids(), vec![0x100, 0x200]);

        let config = AnalysisConfig::new().with_max_messages(1);
        let db = analyzer.detect(&config, &CancelToken::new()).unwrap();
        assert_eq!(db.get_all_can_ids(), vec![0x200]);

        let config = AnalysisConfig::new().with_message_filter(vec![0x100]);
        let db = analyzer.detect(&config, &CancelToken::new()).unwrap();
        assert_eq!(db.get_all_can_ids(), vec![0x100]);
    }

    #[test]
    fn test_cancelled_run() {
        let mut analyzer = Analyzer::new();
        analyzer.add_frames(counter_frames(0x100, 20));
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = analyzer.run(&AnalysisConfig::new(), &cancel);
        assert!(matches!(result, Err(InferenceError::Cancelled)));
    }

    #[test]
    fn test_invalid_config() {
        let analyzer = Analyzer::new();
        let config = AnalysisConfig::new().with_extraction_limit(0);
        assert!(matches!(
            analyzer.detect(&config, &CancelToken::new()),
            Err(InferenceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_run_without_correlation() {
        let mut analyzer = Analyzer::new();
        analyzer.add_frames(counter_frames(0x100, 20));
        let config = AnalysisConfig::new().with_correlation(false, true);

        let report = analyzer.run(&config, &CancelToken::new()).unwrap();
        assert_eq!(report.total_frames, 20);
        assert_eq!(report.database.stats().num_signals, 1);
        assert_eq!(report.classifications.len(), 1);
        assert!(report.correlations.is_empty());
        assert!(report.clusters.is_empty());
        assert_eq!(report.cluster_threshold, None);
    }

    #[test]
    fn test_load_csv_skips_bad_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,id,data").unwrap();
        writeln!(file, "0.0,100,01 02").unwrap();
        writeln!(file, "0.1,100,zz").unwrap();
        writeln!(file, "0.2,100,03 04").unwrap();
        file.flush().unwrap();

        let mut analyzer = Analyzer::new();
        assert_eq!(analyzer.load_csv(file.path()).unwrap(), 2);
        assert_eq!(analyzer.skipped_records(), 1);
        assert_eq!(analyzer.aggregator().total_frames(), 2);
    }
}
