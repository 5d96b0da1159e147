//! Semantic classification of detected signals
//!
//! Classification is a pure annotation step: results are returned as a map keyed by
//! signal identity and never feed back into detection or clustering.

use std::collections::BTreeMap;

use crate::signals::candidate::{SignalCandidate, SignalId};
use crate::types::{SignalClassification, SignalType};

/// Fewer raw values than this cannot be classified
const MIN_VALUES: usize = 10;

const NAME_RULES: &[(&[&str], SignalClassification)] = &[
    (
        &[
            "temp", "rpm", "speed", "velocity", "voltage", "current", "ampere", "pressure",
            "force", "torque", "position", "angle", "distance",
        ],
        SignalClassification::Sensor,
    ),
    (&["status", "state", "mode"], SignalClassification::Status),
    (&["error", "fault", "warning"], SignalClassification::Diagnostic),
    (&["command", "control", "setpoint"], SignalClassification::Control),
    (&["actuator", "motor", "valve"], SignalClassification::Actuator),
];

/// Assigns a coarse semantic role to a signal
pub trait Classifier {
    fn classify(&self, signal: &SignalCandidate) -> SignalClassification;

    /// Classify every signal, keyed by identity
    fn classify_all<'a, I>(&self, signals: I) -> BTreeMap<SignalId, SignalClassification>
    where
        I: IntoIterator<Item = &'a SignalCandidate>,
    {
        signals
            .into_iter()
            .map(|signal| (signal.id(), self.classify(signal)))
            .collect()
    }
}

/// Name substrings first, then the coarse type, then the spread of the values
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Classifier for HeuristicClassifier {
    fn classify(&self, signal: &SignalCandidate) -> SignalClassification {
        if signal.raw_values.len() < MIN_VALUES || signal.physical_values.is_empty() {
            return SignalClassification::Unknown;
        }

        let name = signal.name.to_lowercase();
        for (needles, class) in NAME_RULES {
            if needles.iter().any(|needle| name.contains(needle)) {
                return *class;
            }
        }

        if matches!(signal.signal_type, SignalType::Boolean | SignalType::Enum) {
            return SignalClassification::Status;
        }

        let values = &signal.physical_values;
        if values.len() >= MIN_VALUES {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            let std_dev = variance.sqrt();

            if std_dev < 0.01 * mean {
                return SignalClassification::Status;
            }
            if std_dev > 0.1 * mean {
                return SignalClassification::Sensor;
            }
        }

        SignalClassification::Unknown
    }
}
