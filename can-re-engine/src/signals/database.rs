//! Detected signal database
//!
//! Collects the signal candidates detected for each arbitration id into a single
//! queryable database. Adding a message checks the layout invariants downstream
//! consumers rely on: every signal lies inside the declared payload and no two
//! signals of a message share a bit.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::signals::candidate::{SignalCandidate, SignalId};
use crate::types::{InferenceError, Result};

/// Detected layout of one arbitration id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedMessage {
    /// CAN message ID
    pub arbitration_id: u32,
    /// Generated message name (`ID_1A0`)
    pub name: String,
    /// Largest declared payload length, in bytes
    pub dlc: usize,
    /// Number of frames the layout was inferred from
    pub frame_count: usize,
    /// Extended (29-bit) frame format
    pub is_extended: bool,
    /// Signals ordered by start bit
    pub signals: Vec<SignalCandidate>,
}

impl DetectedMessage {
    pub fn new(
        arbitration_id: u32,
        dlc: usize,
        frame_count: usize,
        signals: Vec<SignalCandidate>,
    ) -> Self {
        Self {
            arbitration_id,
            name: format!("ID_{:X}", arbitration_id),
            dlc,
            frame_count,
            is_extended: arbitration_id > 0x7FF,
            signals,
        }
    }

    fn validate(&self) -> Result<()> {
        for (index, signal) in self.signals.iter().enumerate() {
            if signal.arbitration_id != self.arbitration_id {
                return Err(InferenceError::InvalidData(format!(
                    "Signal '{}' belongs to 0x{:X}, not 0x{:X}",
                    signal.name, signal.arbitration_id, self.arbitration_id
                )));
            }
            if !signal.bit_range().fits_within(self.dlc) {
                return Err(InferenceError::InvalidData(format!(
                    "Signal '{}' ends at bit {} but {} has only {} bytes",
                    signal.name,
                    signal.bit_range().end(),
                    self.name,
                    self.dlc
                )));
            }
            if let Some(other) = self.signals[index + 1..]
                .iter()
                .find(|other| other.overlaps(signal))
            {
                return Err(InferenceError::InvalidData(format!(
                    "Signals '{}' and '{}' overlap in {}",
                    signal.name, other.name, self.name
                )));
            }
        }
        Ok(())
    }
}

/// All detected messages, keyed by arbitration id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalDatabase {
    /// Messages in ascending id order
    messages: BTreeMap<u32, DetectedMessage>,

    /// Signal name lookup
    /// Key: Signal name, Value: (CAN ID, signal index) tuples
    #[serde(skip)]
    signal_lookup: HashMap<String, Vec<(u32, usize)>>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a detected message
    ///
    /// Fails with `InvalidData` if the id is already present, a signal exceeds the
    /// payload, or two signals overlap.
    pub fn add_message(&mut self, message: DetectedMessage) -> Result<()> {
        let can_id = message.arbitration_id;
        if self.messages.contains_key(&can_id) {
            return Err(InferenceError::InvalidData(format!(
                "Message 0x{:X} is already in the database",
                can_id
            )));
        }
        message.validate()?;

        for (sig_idx, signal) in message.signals.iter().enumerate() {
            self.signal_lookup
                .entry(signal.name.clone())
                .or_default()
                .push((can_id, sig_idx));
        }
        self.messages.insert(can_id, message);
        Ok(())
    }

    pub fn get_message(&self, can_id: u32) -> Option<&DetectedMessage> {
        self.messages.get(&can_id)
    }

    /// Messages in ascending id order
    pub fn messages(&self) -> impl Iterator<Item = &DetectedMessage> {
        self.messages.values()
    }

    /// Find all signals with a given name
    pub fn find_signal(&self, signal_name: &str) -> Vec<(u32, &SignalCandidate)> {
        self.signal_lookup
            .get(signal_name)
            .map(|locations| {
                locations
                    .iter()
                    .filter_map(|(can_id, sig_idx)| {
                        self.get_message(*can_id)
                            .and_then(|msg| msg.signals.get(*sig_idx))
                            .map(|sig| (*can_id, sig))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Look a signal up by identity
    pub fn get_signal(&self, id: &SignalId) -> Option<&SignalCandidate> {
        self.get_message(id.arbitration_id)?
            .signals
            .iter()
            .find(|signal| signal.id() == *id)
    }

    /// Every signal, by ascending message id then start bit
    pub fn signals(&self) -> impl Iterator<Item = &SignalCandidate> {
        self.messages.values().flat_map(|msg| msg.signals.iter())
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.values().map(|msg| msg.signals.len()).sum(),
        }
    }

    /// Get all CAN IDs in ascending order
    pub fn get_all_can_ids(&self) -> Vec<u32> {
        self.messages.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    /// Number of messages with a detected layout
    pub num_messages: usize,
    /// Total number of detected signals
    pub num_signals: usize,
}
