//! Full pairwise correlation matrix

use rayon::prelude::*;
use serde::Serialize;

use crate::correlation::stats::{pearson, MIN_SAMPLES};
use crate::signals::candidate::{SignalCandidate, SignalId};

/// Symmetric Pearson matrix over a signal set, in input order
///
/// The diagonal is 1.0. Pairs with fewer than ten aligned samples are 0.0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    ids: Vec<SignalId>,
    values: Vec<f64>,
}

impl CorrelationMatrix {
    pub fn build(signals: &[SignalCandidate]) -> Self {
        let n = signals.len();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (0..n)
                    .map(|j| {
                        if i == j {
                            1.0
                        } else {
                            aligned_pearson(&signals[i].physical_values, &signals[j].physical_values)
                        }
                    })
                    .collect()
            })
            .collect();

        let mut values = rows.concat();
        // Compute each pair once and mirror it so the matrix is exactly symmetric
        for i in 0..n {
            for j in 0..i {
                values[i * n + j] = values[j * n + i];
            }
        }

        Self {
            ids: signals.iter().map(SignalCandidate::id).collect(),
            values,
        }
    }

    /// Number of signals
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[SignalId] {
        &self.ids
    }

    pub fn index_of(&self, id: &SignalId) -> Option<usize> {
        self.ids.iter().position(|candidate| candidate == id)
    }

    /// Correlation between rows `i` and `j`
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.len() + j]
    }

    /// Correlation between two signals by identity
    pub fn correlation(&self, a: &SignalId, b: &SignalId) -> Option<f64> {
        Some(self.get(self.index_of(a)?, self.index_of(b)?))
    }

    /// Other signals whose |r| with `id` is at least `threshold`, strongest first
    pub fn strongly_correlated(&self, id: &SignalId, threshold: f64) -> Vec<(SignalId, f64)> {
        let Some(row) = self.index_of(id) else {
            return Vec::new();
        };

        let mut related: Vec<(SignalId, f64)> = (0..self.len())
            .filter(|&col| col != row)
            .map(|col| (self.ids[col], self.get(row, col)))
            .filter(|(_, r)| r.abs() >= threshold)
            .collect();
        related.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        related
    }
}

/// Pearson over the common prefix of two series; 0 below the sample minimum
fn aligned_pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < MIN_SAMPLES {
        return 0.0;
    }
    pearson(&a[..n], &b[..n])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::candidate::tests::candidate;

    fn signal(start_bit: u16, values: Vec<f64>) -> SignalCandidate {
        let mut signal = candidate(0x100, start_bit, 8);
        signal.physical_values = values;
        signal
    }

    #[test]
    fn test_matrix_shape_and_diagonal() {
        let ramp: Vec<f64> = (0..20).map(f64::from).collect();
        let inverse: Vec<f64> = ramp.iter().map(|v| 100.0 - v).collect();
        let short = vec![1.0, 2.0, 3.0];
        let signals = vec![signal(0, ramp), signal(8, inverse), signal(16, short)];

        let matrix = CorrelationMatrix::build(&signals);
        assert_eq!(matrix.len(), 3);
        for i in 0..3 {
            assert_eq!(matrix.get(i, i), 1.0);
            for j in 0..3 {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
            }
        }
        assert!((matrix.get(0, 1) + 1.0).abs() < 1e-12);
        assert_eq!(matrix.get(0, 2), 0.0);
    }

    #[test]
    fn test_strongly_correlated() {
        let ramp: Vec<f64> = (0..20).map(f64::from).collect();
        let double: Vec<f64> = ramp.iter().map(|v| v * 2.0).collect();
        let noise: Vec<f64> = (0..20).map(|i| f64::from((i * 7) % 5)).collect();
        let signals = vec![signal(0, ramp), signal(8, double), signal(16, noise)];
        let matrix = CorrelationMatrix::build(&signals);

        let related = matrix.strongly_correlated(&signals[0].id(), 0.9);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].0, signals[1].id());

        let missing = candidate(0x999, 0, 8).id();
        assert!(matrix.strongly_correlated(&missing, 0.0).is_empty());
        assert_eq!(matrix.correlation(&signals[0].id(), &missing), None);
    }
}
