//! Hierarchical clustering of correlated signals
//!
//! Signals are agglomerated on the distance `1 - |r|` until a single cluster remains,
//! recording every merge as a dendrogram entry. The final clusters come from a cut
//! at a fraction of the largest merge distance: walking merges from the largest
//! distance down, a merge becomes a cluster when it lies above the threshold, is
//! large enough and shares no member with a cluster taken earlier. Every signal left
//! over becomes a singleton, so the result always partitions the input.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::correlation::CorrelationMatrix;
use crate::signals::candidate::{SignalCandidate, SignalId};
use crate::types::{InferenceError, Result, SignalType};

/// Cluster-to-cluster distance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    /// Minimum distance between any two members
    #[default]
    Single,
    /// Maximum distance between any two members
    Complete,
    /// Mean distance over all member pairs
    Average,
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Linkage::Single => "single",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
        };
        f.write_str(name)
    }
}

/// One merge of the agglomeration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DendrogramEntry {
    /// Merge number, from 0
    pub step: usize,
    /// Members of the merged cluster
    pub members: Vec<SignalId>,
    /// Linkage distance at which the merge happened
    pub distance: f64,
    /// Number of clusters before the merge
    pub level: usize,
}

/// A final cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub id: usize,
    pub members: Vec<SignalId>,
    /// Most common coarse type among the members
    pub dominant_type: SignalType,
}

/// Result of clustering a signal set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteringOutcome {
    pub clusters: Vec<Cluster>,
    pub dendrogram: Vec<DendrogramEntry>,
    /// Cut threshold applied to merge distances
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Merge {
    members: Vec<usize>,
    distance: f64,
    level: usize,
}

/// Groups signals from their correlation matrix
#[derive(Debug, Clone)]
pub struct ClusteringEngine {
    min_cluster_size: usize,
    cut_ratio: f64,
    linkage: Linkage,
}

impl Default for ClusteringEngine {
    fn default() -> Self {
        Self::new(3, 0.3, Linkage::Single)
    }
}

impl ClusteringEngine {
    pub fn new(min_cluster_size: usize, cut_ratio: f64, linkage: Linkage) -> Self {
        Self {
            min_cluster_size,
            cut_ratio,
            linkage,
        }
    }

    /// Cluster `signals`; `matrix` must be built over the same signals in the same order
    pub fn cluster(
        &self,
        signals: &[SignalCandidate],
        matrix: &CorrelationMatrix,
    ) -> Result<ClusteringOutcome> {
        let ids: Vec<SignalId> = signals.iter().map(SignalCandidate::id).collect();
        if matrix.ids() != ids.as_slice() {
            return Err(InferenceError::InvalidData(format!(
                "Correlation matrix covers {} signals, expected the {} being clustered",
                matrix.len(),
                ids.len()
            )));
        }

        let distances = distance_matrix(matrix);
        let merges = agglomerate(&distances, self.linkage);
        let (groups, threshold) = self.cut(&merges, ids.len());

        let dendrogram = merges
            .iter()
            .enumerate()
            .map(|(step, merge)| DendrogramEntry {
                step,
                members: merge.members.iter().map(|&i| ids[i]).collect(),
                distance: merge.distance,
                level: merge.level,
            })
            .collect();

        let clusters: Vec<Cluster> = groups
            .into_iter()
            .enumerate()
            .map(|(id, members)| Cluster {
                id,
                dominant_type: dominant_type(members.iter().map(|&i| signals[i].signal_type)),
                members: members.iter().map(|&i| ids[i]).collect(),
            })
            .collect();

        for cluster in &clusters {
            log::debug!(
                "Cluster {}: {} signals, dominant type: {}",
                cluster.id,
                cluster.members.len(),
                cluster.dominant_type
            );
        }
        log::info!(
            "Clustering complete: {} clusters from {} signals",
            clusters.len(),
            signals.len()
        );

        Ok(ClusteringOutcome {
            clusters,
            dendrogram,
            threshold,
        })
    }

    /// Partition `n` indices from the recorded merges
    fn cut(&self, merges: &[Merge], n: usize) -> (Vec<Vec<usize>>, f64) {
        if merges.is_empty() {
            return ((0..n).map(|i| vec![i]).collect(), 0.0);
        }

        let max_distance = merges
            .iter()
            .map(|m| m.distance)
            .fold(f64::NEG_INFINITY, f64::max);
        let threshold = max_distance * self.cut_ratio;

        let mut order: Vec<&Merge> = merges.iter().collect();
        order.sort_by(|a, b| b.distance.total_cmp(&a.distance));

        let mut assigned = vec![false; n];
        let mut groups = Vec::new();
        for merge in order {
            if merge.distance <= threshold || merge.members.len() < self.min_cluster_size {
                continue;
            }
            if merge.members.iter().any(|&i| assigned[i]) {
                continue;
            }
            for &i in &merge.members {
                assigned[i] = true;
            }
            groups.push(merge.members.clone());
        }

        for (i, taken) in assigned.iter().enumerate() {
            if !taken {
                groups.push(vec![i]);
            }
        }
        (groups, threshold)
    }
}

/// `1 - |r|` with a zero diagonal
pub fn distance_matrix(matrix: &CorrelationMatrix) -> Vec<Vec<f64>> {
    let n = matrix.len();
    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| if i == j { 0.0 } else { 1.0 - matrix.get(i, j).abs() })
                .collect()
        })
        .collect()
}

fn linkage_distance(a: &[usize], b: &[usize], distances: &[Vec<f64>], linkage: Linkage) -> f64 {
    let pairs = a.iter().flat_map(|&i| b.iter().map(move |&j| distances[i][j]));
    match linkage {
        Linkage::Single => pairs.fold(f64::MAX, f64::min),
        Linkage::Complete => pairs.fold(f64::MIN, f64::max),
        Linkage::Average => {
            let count = a.len() * b.len();
            if count == 0 {
                0.0
            } else {
                pairs.sum::<f64>() / count as f64
            }
        }
    }
}

/// Merge the closest pair of clusters until one remains
///
/// The merged cluster takes the place of the first of the pair and the second is
/// removed. Ties keep the first pair found.
fn agglomerate(distances: &[Vec<f64>], linkage: Linkage) -> Vec<Merge> {
    let mut clusters: Vec<Vec<usize>> = (0..distances.len()).map(|i| vec![i]).collect();
    let mut merges = Vec::new();

    while clusters.len() > 1 {
        let mut min_distance = f64::MAX;
        let mut closest = None;
        for i in 0..clusters.len() {
            for j in i + 1..clusters.len() {
                let distance = linkage_distance(&clusters[i], &clusters[j], distances, linkage);
                if distance < min_distance {
                    min_distance = distance;
                    closest = Some((i, j));
                }
            }
        }
        let Some((a, b)) = closest else {
            break;
        };

        let level = clusters.len();
        let absorbed = clusters.remove(b);
        clusters[a].extend(absorbed);
        merges.push(Merge {
            members: clusters[a].clone(),
            distance: min_distance,
            level,
        });
    }

    merges
}

/// Most common type; ties go to the type that sorts first
fn dominant_type<I: IntoIterator<Item = SignalType>>(types: I) -> SignalType {
    let mut counts: BTreeMap<SignalType, usize> = BTreeMap::new();
    for signal_type in types {
        *counts.entry(signal_type).or_default() += 1;
    }
    let mut dominant = SignalType::Unknown;
    let mut best = 0;
    for (signal_type, count) in counts {
        if count > best {
            best = count;
            dominant = signal_type;
        }
    }
    dominant
}

/// Partition into exactly `k` clusters by replaying all but the last `k - 1` merges
///
/// `k = 0` yields nothing; `k` at or above the signal count yields singletons.
/// Groups are ordered by their first member's position in `signals`.
pub fn cut_by_count(
    dendrogram: &[DendrogramEntry],
    signals: &[SignalId],
    k: usize,
) -> Vec<Vec<SignalId>> {
    if k == 0 {
        return Vec::new();
    }

    let index: HashMap<SignalId, usize> =
        signals.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut parent: Vec<usize> = (0..signals.len()).collect();

    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut entries: Vec<&DendrogramEntry> = dendrogram.iter().collect();
    entries.sort_by_key(|entry| entry.step);
    let replay = signals.len().saturating_sub(k);

    for entry in entries.into_iter().take(replay) {
        let members: Vec<usize> = entry
            .members
            .iter()
            .filter_map(|id| index.get(id).copied())
            .collect();
        if let Some((&first, rest)) = members.split_first() {
            for &other in rest {
                let (ra, rb) = (root(&mut parent, first), root(&mut parent, other));
                if ra != rb {
                    parent[rb] = ra;
                }
            }
        }
    }

    let mut groups: Vec<Vec<SignalId>> = Vec::new();
    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    for (i, id) in signals.iter().enumerate() {
        let r = root(&mut parent, i);
        let slot = *slot_of_root.entry(r).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(*id);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::candidate::tests::candidate;
    use std::collections::BTreeSet;

    /// Distances between points on a line
    fn line_distances(points: &[f64]) -> Vec<Vec<f64>> {
        points
            .iter()
            .map(|a| points.iter().map(|b| (a - b).abs()).collect())
            .collect()
    }

    fn merge_distances(merges: &[Merge]) -> Vec<f64> {
        merges.iter().map(|m| m.distance).collect()
    }

    const POINTS: [f64; 5] = [0.0, 1.0, 5.0, 6.5, 20.0];

    #[test]
    fn test_single_linkage_merges() {
        let merges = agglomerate(&line_distances(&POINTS), Linkage::Single);
        assert_eq!(merge_distances(&merges), vec![1.0, 1.5, 4.0, 13.5]);
        assert_eq!(merges[0].members, vec![0, 1]);
        assert_eq!(merges[1].members, vec![2, 3]);
        assert_eq!(merges[2].members, vec![0, 1, 2, 3]);
        let levels: Vec<usize> = merges.iter().map(|m| m.level).collect();
        assert_eq!(levels, vec![5, 4, 3, 2]);
    }

    #[test]
    fn test_complete_and_average_linkage() {
        let distances = line_distances(&POINTS);
        let complete = agglomerate(&distances, Linkage::Complete);
        assert_eq!(merge_distances(&complete), vec![1.0, 1.5, 6.5, 20.0]);

        let average = agglomerate(&distances, Linkage::Average);
        assert_eq!(merge_distances(&average), vec![1.0, 1.5, 5.25, 16.875]);
    }

    #[test]
    fn test_cut_takes_far_merges_first() {
        let merges = agglomerate(&line_distances(&POINTS), Linkage::Single);

        // The last merge holds everyone and clears the threshold
        let engine = ClusteringEngine::new(3, 0.3, Linkage::Single);
        let (groups, threshold) = engine.cut(&merges, POINTS.len());
        assert!((threshold - 13.5 * 0.3).abs() < 1e-12);
        assert_eq!(groups, vec![vec![0, 1, 2, 3, 4]]);

        // Nothing is large enough: all singletons
        let engine = ClusteringEngine::new(6, 0.3, Linkage::Single);
        let (groups, _) = engine.cut(&merges, POINTS.len());
        assert_eq!(groups.len(), 5);
    }

    #[test]
    fn test_cut_without_merges() {
        let engine = ClusteringEngine::default();
        let (groups, threshold) = engine.cut(&[], 3);
        assert_eq!(groups, vec![vec![0], vec![1], vec![2]]);
        assert_eq!(threshold, 0.0);
    }

    fn signal(start_bit: u16, values: Vec<f64>, signal_type: SignalType) -> SignalCandidate {
        let mut signal = candidate(0x100, start_bit, 8);
        signal.physical_values = values;
        signal.signal_type = signal_type;
        signal
    }

    #[test]
    fn test_cluster_partitions_signals() {
        let ramp: Vec<f64> = (0..30).map(f64::from).collect();
        let signals = vec![
            signal(0, ramp.clone(), SignalType::Integer),
            signal(8, ramp.iter().map(|v| v * 3.0).collect(), SignalType::Integer),
            signal(16, (0..30).map(|i| f64::from(i % 4)).collect(), SignalType::Enum),
            signal(24, vec![1.0; 30], SignalType::Boolean),
        ];
        let matrix = CorrelationMatrix::build(&signals);
        let outcome = ClusteringEngine::default().cluster(&signals, &matrix).unwrap();

        assert_eq!(outcome.dendrogram.len(), signals.len() - 1);
        let mut seen = BTreeSet::new();
        for cluster in &outcome.clusters {
            for member in &cluster.members {
                assert!(seen.insert(*member), "{} assigned twice", member);
            }
        }
        let expected: BTreeSet<SignalId> = signals.iter().map(SignalCandidate::id).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_pair_below_min_size_stays_apart() {
        let ramp: Vec<f64> = (0..30).map(f64::from).collect();
        let noise: Vec<f64> = (0..30).map(|i| f64::from((i * 7) % 5)).collect();
        let signals = vec![
            signal(0, ramp, SignalType::Integer),
            signal(8, noise, SignalType::Integer),
        ];
        let matrix = CorrelationMatrix::build(&signals);

        let outcome = ClusteringEngine::default().cluster(&signals, &matrix).unwrap();
        assert_eq!(outcome.clusters.len(), 2);

        let outcome = ClusteringEngine::new(2, 0.3, Linkage::Single)
            .cluster(&signals, &matrix)
            .unwrap();
        assert_eq!(outcome.clusters.len(), 1);
        assert_eq!(outcome.clusters[0].members.len(), 2);
        assert_eq!(outcome.clusters[0].dominant_type, SignalType::Integer);
    }

    #[test]
    fn test_single_signal() {
        let signals = vec![signal(0, vec![1.0; 20], SignalType::Boolean)];
        let matrix = CorrelationMatrix::build(&signals);
        let outcome = ClusteringEngine::default().cluster(&signals, &matrix).unwrap();
        assert!(outcome.dendrogram.is_empty());
        assert_eq!(outcome.clusters.len(), 1);
        assert_eq!(outcome.clusters[0].dominant_type, SignalType::Boolean);
    }

    #[test]
    fn test_mismatched_matrix() {
        let signals = vec![signal(0, vec![1.0; 20], SignalType::Boolean)];
        let matrix = CorrelationMatrix::build(&[]);
        assert!(ClusteringEngine::default().cluster(&signals, &matrix).is_err());
    }

    #[test]
    fn test_dominant_type_ties() {
        assert_eq!(dominant_type(vec![]), SignalType::Unknown);
        assert_eq!(
            dominant_type(vec![SignalType::Enum, SignalType::Boolean]),
            SignalType::Boolean
        );
        assert_eq!(
            dominant_type(vec![SignalType::Enum, SignalType::Enum, SignalType::Boolean]),
            SignalType::Enum
        );
    }

    #[test]
    fn test_cut_by_count() {
        let ids: Vec<SignalId> = (0..5u16).map(|i| candidate(0x1, i * 8, 8).id()).collect();
        let dendrogram: Vec<DendrogramEntry> = agglomerate(&line_distances(&POINTS), Linkage::Single)
            .into_iter()
            .enumerate()
            .map(|(step, merge)| DendrogramEntry {
                step,
                members: merge.members.iter().map(|&i| ids[i]).collect(),
                distance: merge.distance,
                level: merge.level,
            })
            .collect();

        let two = cut_by_count(&dendrogram, &ids, 2);
        assert_eq!(two, vec![ids[..4].to_vec(), vec![ids[4]]]);

        let three = cut_by_count(&dendrogram, &ids, 3);
        assert_eq!(
            three,
            vec![vec![ids[0], ids[1]], vec![ids[2], ids[3]], vec![ids[4]]]
        );

        assert_eq!(cut_by_count(&dendrogram, &ids, 9).len(), 5);
        assert!(cut_by_count(&dendrogram, &ids, 0).is_empty());
    }
}
