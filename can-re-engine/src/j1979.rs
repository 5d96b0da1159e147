//! SAE J1979 (OBD-II) standard identifiers
//!
//! Diagnostic ids follow a published layout, so they are tagged during
//! preprocessing instead of being treated as unknown traffic. An id counts as
//! standard when it is in the ECU request/response block `0x7E0..=0x7EF` or has an
//! entry in the parameter table.

use serde::Serialize;

/// ECU request and response ids
pub const J1979_ID_RANGE: std::ops::RangeInclusive<u32> = 0x7E0..=0x7EF;

/// A known J1979 parameter and its encoding
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct J1979Parameter {
    pub id: u32,
    pub name: &'static str,
    pub description: &'static str,
    pub unit: &'static str,
    pub factor: f64,
    pub offset: f64,
    /// First payload byte of the value
    pub byte_position: usize,
    /// Value length in bytes
    pub length: usize,
}

/// Mode 01 and mode 09 parameters, ascending by id
pub const STANDARD_PARAMETERS: &[J1979Parameter] = &[
    J1979Parameter {
        id: 0x201,
        name: "EngineRPM",
        description: "Engine RPM",
        unit: "RPM",
        factor: 0.25,
        offset: 0.0,
        byte_position: 0,
        length: 2,
    },
    J1979Parameter {
        id: 0x203,
        name: "VehicleSpeed",
        description: "Vehicle Speed",
        unit: "km/h",
        factor: 1.0,
        offset: 0.0,
        byte_position: 0,
        length: 1,
    },
    J1979Parameter {
        id: 0x205,
        name: "EngineCoolantTemp",
        description: "Engine Coolant Temperature",
        unit: "°C",
        factor: 1.0,
        offset: -40.0,
        byte_position: 0,
        length: 1,
    },
    J1979Parameter {
        id: 0x20B,
        name: "IntakeManifoldPressure",
        description: "Intake Manifold Pressure",
        unit: "kPa",
        factor: 1.0,
        offset: 0.0,
        byte_position: 0,
        length: 1,
    },
    J1979Parameter {
        id: 0x20C,
        name: "EngineLoad",
        description: "Engine Load",
        unit: "%",
        factor: 100.0 / 255.0,
        offset: 0.0,
        byte_position: 0,
        length: 1,
    },
    J1979Parameter {
        id: 0x210,
        name: "MAFAirFlowRate",
        description: "MAF Air Flow Rate",
        unit: "g/s",
        factor: 0.01,
        offset: 0.0,
        byte_position: 0,
        length: 2,
    },
    J1979Parameter {
        id: 0x901,
        name: "VIN",
        description: "Vehicle Identification Number",
        unit: "string",
        factor: 1.0,
        offset: 0.0,
        byte_position: 0,
        length: 17,
    },
    J1979Parameter {
        id: 0x902,
        name: "CalibrationID",
        description: "Calibration ID",
        unit: "string",
        factor: 1.0,
        offset: 0.0,
        byte_position: 0,
        length: 16,
    },
];

/// Look up the table entry for `id`
pub fn parameter(id: u32) -> Option<&'static J1979Parameter> {
    STANDARD_PARAMETERS
        .binary_search_by_key(&id, |p| p.id)
        .ok()
        .map(|index| &STANDARD_PARAMETERS[index])
}

/// True for ids in the diagnostic block or in the parameter table
pub fn is_j1979_id(id: u32) -> bool {
    J1979_ID_RANGE.contains(&id) || parameter(id).is_some()
}

impl J1979Parameter {
    /// Physical value of a raw reading
    pub fn physical(&self, raw: f64) -> f64 {
        raw * self.factor + self.offset
    }
}
