//! Correlation engine
//!
//! Relates detected signals through their physical value series. Signals of the same
//! arbitration id are compared pairwise (skipping overlapping ranges). Signals of
//! different ids are compared only when there are more eligible signals than the
//! cross-message limit, only among the first `limit` of them, and only significant
//! results are kept.

pub mod matrix;
pub mod significance;
pub mod stats;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::signals::candidate::{SignalCandidate, SignalId};

pub use matrix::CorrelationMatrix;
pub use significance::p_value;
pub use stats::{best_lag, cross_correlation, pearson, MIN_SAMPLES};

/// |r| above which a result can be significant and a lag implies a direction
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.7;

/// p-value below which a result can be significant
pub const P_VALUE_THRESHOLD: f64 = 0.05;

/// |r| above which a lagged result is reported as causal
pub const CAUSAL_THRESHOLD: f64 = 0.8;

/// Statistical relationship between two signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub signal_a: SignalId,
    pub signal_b: SignalId,
    /// Pearson coefficient in `[-1, 1]`
    pub correlation: f64,
    /// Sample offset with the strongest cross-correlation
    pub lag: i32,
    /// Approximate two-sided p-value in `[0, 1]`
    pub p_value: f64,
    pub is_significant: bool,
    pub relationship: String,
}

/// Computes correlation results over a signal set
#[derive(Debug, Clone)]
pub struct CorrelationEngine {
    cross_message_limit: usize,
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new(20)
    }
}

impl CorrelationEngine {
    pub fn new(cross_message_limit: usize) -> Self {
        Self {
            cross_message_limit,
        }
    }

    /// Correlate every eligible pair, strongest first
    ///
    /// Signals with fewer than ten physical values take no part.
    pub fn analyze(&self, signals: &[SignalCandidate]) -> Vec<CorrelationResult> {
        let eligible: Vec<&SignalCandidate> = signals
            .iter()
            .filter(|s| s.physical_values.len() >= MIN_SAMPLES)
            .collect();
        if eligible.len() < 2 {
            log::debug!("Fewer than two signals eligible for correlation");
            return Vec::new();
        }
        log::info!("Correlating {} signals", eligible.len());

        let mut intra_pairs = Vec::new();
        for i in 0..eligible.len() {
            for j in i + 1..eligible.len() {
                let (a, b) = (eligible[i], eligible[j]);
                if a.arbitration_id == b.arbitration_id && !a.overlaps(b) {
                    intra_pairs.push((a, b));
                }
            }
        }
        let mut results: Vec<CorrelationResult> = intra_pairs
            .par_iter()
            .filter_map(|(a, b)| self.correlate(a, b))
            .collect();
        log::debug!("Intra-message pass: {} results", results.len());

        if eligible.len() > self.cross_message_limit {
            let limited = &eligible[..self.cross_message_limit];
            let mut cross_pairs = Vec::new();
            for i in 0..limited.len() {
                for j in i + 1..limited.len() {
                    if limited[i].arbitration_id != limited[j].arbitration_id {
                        cross_pairs.push((limited[i], limited[j]));
                    }
                }
            }
            let cross: Vec<CorrelationResult> = cross_pairs
                .par_iter()
                .filter_map(|(a, b)| self.correlate(a, b))
                .filter(|result| result.is_significant)
                .collect();
            log::debug!("Cross-message pass: {} significant results", cross.len());
            results.extend(cross);
        }

        results.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));
        log::info!("Found {} correlations", results.len());
        results
    }

    /// Correlate one pair over their common prefix
    ///
    /// Returns `None` when fewer than ten aligned samples exist or the p-value
    /// cannot be computed.
    pub fn correlate(&self, a: &SignalCandidate, b: &SignalCandidate) -> Option<CorrelationResult> {
        let n = a.physical_values.len().min(b.physical_values.len());
        if n < MIN_SAMPLES {
            return None;
        }
        let values_a = &a.physical_values[..n];
        let values_b = &b.physical_values[..n];

        let correlation = pearson(values_a, values_b);
        let lag = best_lag(values_a, values_b);
        let p_value = match p_value(correlation, n) {
            Ok(p) => p,
            Err(e) => {
                log::debug!("Skipping {} / {}: {}", a.id(), b.id(), e);
                return None;
            }
        };

        Some(CorrelationResult {
            signal_a: a.id(),
            signal_b: b.id(),
            correlation,
            lag,
            p_value,
            is_significant: correlation.abs() > SIGNIFICANCE_THRESHOLD
                && p_value < P_VALUE_THRESHOLD,
            relationship: relationship_label(correlation, lag),
        })
    }
}

/// Bucketed description of a coefficient, with lag and tentative direction
pub fn relationship_label(correlation: f64, lag: i32) -> String {
    let mut label = if correlation > 0.8 {
        "Strong positive"
    } else if correlation > 0.5 {
        "Moderate positive"
    } else if correlation > 0.3 {
        "Weak positive"
    } else if correlation < -0.8 {
        "Strong negative"
    } else if correlation < -0.5 {
        "Moderate negative"
    } else if correlation < -0.3 {
        "Weak negative"
    } else {
        "No correlation"
    }
    .to_string();

    if lag != 0 {
        label.push_str(&format!(", lag: {} samples", lag));
        if correlation.abs() > SIGNIFICANCE_THRESHOLD {
            label.push_str(if lag > 0 { " (A → B)" } else { " (B → A)" });
        }
    }
    label
}

/// Significant results with |lag| > 1 and |r| > 0.8, relabelled with the leading signal
pub fn causal_relationships(
    results: &[CorrelationResult],
    signals: &[SignalCandidate],
) -> Vec<CorrelationResult> {
    let names: HashMap<SignalId, &str> = signals
        .iter()
        .map(|signal| (signal.id(), signal.name.as_str()))
        .collect();
    let name_of = |id: &SignalId| {
        names
            .get(id)
            .map_or_else(|| id.to_string(), |name| name.to_string())
    };

    results
        .iter()
        .filter(|r| r.is_significant && r.lag.abs() > 1 && r.correlation.abs() > CAUSAL_THRESHOLD)
        .map(|r| {
            let (leader, follower) = if r.lag > 0 {
                (&r.signal_a, &r.signal_b)
            } else {
                (&r.signal_b, &r.signal_a)
            };
            let mut causal = r.clone();
            causal.relationship = format!(
                "Causation: {} → {} (lag: {})",
                name_of(leader),
                name_of(follower),
                r.lag.abs()
            );
            causal
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::candidate::tests::candidate;

    fn signal(id: u32, start_bit: u16, length: u16, values: Vec<f64>) -> SignalCandidate {
        let mut signal = candidate(id, start_bit, length);
        signal.raw_values = values.iter().map(|&v| v as i64).collect();
        signal.physical_values = values;
        signal
    }

    fn pattern(n: usize) -> Vec<f64> {
        (0..n).map(|i| ((i * 37) % 11) as f64).collect()
    }

    #[test]
    fn test_identical_series() {
        let a = signal(0x100, 0, 8, pattern(50));
        let b = signal(0x100, 8, 8, pattern(50));
        let result = CorrelationEngine::default().correlate(&a, &b).unwrap();

        assert!((result.correlation - 1.0).abs() < 1e-12);
        assert_eq!(result.lag, 0);
        assert_eq!(result.p_value, 0.0);
        assert!(result.is_significant);
        assert_eq!(result.relationship, "Strong positive");
    }

    #[test]
    fn test_too_few_samples() {
        let a = signal(0x100, 0, 8, pattern(9));
        let b = signal(0x100, 8, 8, pattern(50));
        assert!(CorrelationEngine::default().correlate(&a, &b).is_none());
        assert!(CorrelationEngine::default().analyze(&[a, b]).is_empty());
    }

    #[test]
    fn test_intra_message_pass_skips_overlap_and_sorts() {
        let base = pattern(40);
        let inverse: Vec<f64> = base.iter().map(|v| 20.0 - v).collect();
        let weak: Vec<f64> = (0..40).map(|i| ((i * 5) % 7) as f64).collect();

        let signals = vec![
            signal(0x100, 0, 8, base.clone()),
            signal(0x100, 4, 8, base.clone()), // overlaps the first
            signal(0x100, 16, 8, weak),
            signal(0x100, 24, 8, inverse),
            signal(0x200, 0, 8, base),
        ];
        let results = CorrelationEngine::default().analyze(&signals);

        // Five eligible signals: no cross-message pass, so 0x200 is never paired
        assert!(results
            .iter()
            .all(|r| r.signal_a.arbitration_id == 0x100 && r.signal_b.arbitration_id == 0x100));
        assert!(!results
            .iter()
            .any(|r| r.signal_a == signals[0].id() && r.signal_b == signals[1].id()));
        assert_eq!(results.len(), 5);
        for pair in results.windows(2) {
            assert!(pair[0].correlation.abs() >= pair[1].correlation.abs());
        }
        for r in &results {
            assert!((-1.0..=1.0).contains(&r.correlation));
            assert!((0.0..=1.0).contains(&r.p_value));
        }
    }

    #[test]
    fn test_cross_message_pass_keeps_significant_only() {
        let base = pattern(30);
        let mut signals = Vec::new();
        for id in 0..21u32 {
            let values = if id < 2 {
                base.clone()
            } else {
                // Distinct, mostly unrelated patterns
                (0..30).map(|i| ((i * (id as usize + 2)) % 13) as f64).collect()
            };
            signals.push(signal(0x100 + id, 0, 8, values));
        }

        let results = CorrelationEngine::new(20).analyze(&signals);
        assert!(results.iter().all(|r| r.is_significant));
        assert!(results
            .iter()
            .any(|r| r.signal_a == signals[0].id() && r.signal_b == signals[1].id()));
        // The 21st signal is beyond the limit
        assert!(results
            .iter()
            .all(|r| r.signal_a != signals[20].id() && r.signal_b != signals[20].id()));
    }

    #[test]
    fn test_relationship_labels() {
        assert_eq!(relationship_label(0.9, 0), "Strong positive");
        assert_eq!(relationship_label(0.6, 0), "Moderate positive");
        assert_eq!(relationship_label(0.4, 0), "Weak positive");
        assert_eq!(relationship_label(0.1, 0), "No correlation");
        assert_eq!(relationship_label(-0.45, 0), "Weak negative");
        assert_eq!(relationship_label(-0.9, 2), "Strong negative, lag: 2 samples (A → B)");
        assert_eq!(relationship_label(0.75, -1), "Moderate positive, lag: -1 samples (B → A)");
        assert_eq!(relationship_label(0.6, 3), "Moderate positive, lag: 3 samples");
    }

    #[test]
    fn test_causal_relationships() {
        let a = signal(0x100, 0, 8, pattern(40));
        let b = signal(0x200, 0, 8, pattern(40));
        let mut lagged = CorrelationResult {
            signal_a: a.id(),
            signal_b: b.id(),
            correlation: 0.95,
            lag: -3,
            p_value: 0.0,
            is_significant: true,
            relationship: String::new(),
        };
        let mut weak = lagged.clone();
        weak.correlation = 0.75;
        let mut short = lagged.clone();
        short.lag = 1;

        let causal = causal_relationships(&[lagged.clone(), weak, short], &[a.clone(), b.clone()]);
        assert_eq!(causal.len(), 1);
        assert_eq!(
            causal[0].relationship,
            format!("Causation: {} → {} (lag: 3)", b.name, a.name)
        );

        lagged.lag = 4;
        let causal = causal_relationships(&[lagged], &[]);
        assert_eq!(
            causal[0].relationship,
            format!("Causation: {} → {} (lag: 4)", a.id(), b.id())
        );
    }
}
