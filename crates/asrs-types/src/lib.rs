//! `asrs-types` – Shared Data Model
//!
//! Plain data exchanged between the twin's crates: body handles and kinds,
//! shuttle kinds with their driven axis, sensor categories, the decoded PLC
//! control block, the feedback frame, and [`TwinError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque handle to a body owned by the scene.
///
/// Handles are only meaningful for the scene that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub usize);

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Only `Mesh` bodies carry triangles and take part in overlap queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Mesh,
    Empty,
}

/// A world axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

/// The two shuttles of the rack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShuttleKind {
    /// Rail-bound primary shuttle, driven along X.
    Asrs,
    /// Secondary shuttle running perpendicular to the rail, driven along Y.
    Carrier,
}

impl ShuttleKind {
    /// The single axis this shuttle is driven along.
    pub fn drive_axis(self) -> Axis {
        match self {
            ShuttleKind::Asrs => Axis::X,
            ShuttleKind::Carrier => Axis::Y,
        }
    }

    /// Whether this shuttle's control block carries a pickup bit.
    pub fn has_pickup(self) -> bool {
        matches!(self, ShuttleKind::Asrs)
    }
}

impl std::fmt::Display for ShuttleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShuttleKind::Asrs => write!(f, "asrs"),
            ShuttleKind::Carrier => write!(f, "carrier"),
        }
    }
}

/// Display grouping of a virtual sensor, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorCategory {
    Alignment,
    Travel,
    General,
}

impl SensorCategory {
    /// Classify a sensor by substrings of its upper-cased name.
    ///
    /// Alignment markers win over travel markers, so `SENSOR_FRONT` is
    /// classified by its `FR` substring.
    pub fn classify(name: &str) -> Self {
        let upper = name.to_uppercase();
        if ["FR", "FL", "BR", "BL"].iter().any(|m| upper.contains(m)) {
            SensorCategory::Alignment
        } else if ["TRAVEL", "FRONT", "BACK"].iter().any(|m| upper.contains(m)) {
            SensorCategory::Travel
        } else {
            SensorCategory::General
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SensorCategory::Alignment => "ALIGNMENT",
            SensorCategory::Travel => "TRAVEL",
            SensorCategory::General => "GENERAL",
        }
    }
}

/// A decoded PLC motion command for one shuttle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlBlock {
    pub speed: f32,
    pub on: bool,
    pub reverse: bool,
    /// Always `false` for the carrier shuttle.
    pub pickup: bool,
}

/// The three bytes written back to the PLC every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedbackFrame {
    pub asrs_bits: u8,
    pub carrier_bits: u8,
    pub barcode: u8,
}

impl FeedbackFrame {
    /// Build a frame, keeping only the low byte of `barcode`.
    pub fn new(asrs_bits: u8, carrier_bits: u8, barcode: u32) -> Self {
        Self {
            asrs_bits,
            carrier_bits,
            barcode: (barcode & 0xFF) as u8,
        }
    }

    /// Wire order: ASRS mask, carrier mask, barcode.
    pub fn to_bytes(self) -> [u8; 3] {
        [self.asrs_bits, self.carrier_bits, self.barcode]
    }

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self {
            asrs_bits: bytes[0],
            carrier_bits: bytes[1],
            barcode: bytes[2],
        }
    }
}

/// Failure kinds of the twin. None of them is fatal: every one is contained
/// within the poll cycle that produced it.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TwinError {
    #[error("Scan Failure: body '{name}' not found in scene")]
    ScanFailure { name: String },

    #[error("Transport Failure during {operation}: {details}")]
    TransportFailure { operation: String, details: String },

    #[error("Decode Failure: {0}")]
    DecodeFailure(String),

    #[error("Unknown Body: {0}")]
    UnknownBody(BodyId),

    #[error("Invalid Hierarchy: parenting {child} under {parent} would create a cycle")]
    InvalidHierarchy { child: BodyId, parent: BodyId },
}

impl TwinError {
    /// Shorthand for a [`TwinError::TransportFailure`].
    pub fn transport(operation: impl Into<String>, details: impl ToString) -> Self {
        TwinError::TransportFailure {
            operation: operation.into(),
            details: details.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuttle_drive_axes() {
        assert_eq!(ShuttleKind::Asrs.drive_axis(), Axis::X);
        assert_eq!(ShuttleKind::Carrier.drive_axis(), Axis::Y);
        assert!(ShuttleKind::Asrs.has_pickup());
        assert!(!ShuttleKind::Carrier.has_pickup());
    }

    #[test]
    fn sensor_categories() {
        assert_eq!(SensorCategory::classify("SENSOR_FR"), SensorCategory::Alignment);
        assert_eq!(SensorCategory::classify("sensor_bl"), SensorCategory::Alignment);
        assert_eq!(SensorCategory::classify("SENSOR_TRAVEL_1"), SensorCategory::Travel);
        assert_eq!(SensorCategory::classify("SENSOR_BACK"), SensorCategory::Travel);
        assert_eq!(SensorCategory::classify("SENSOR_F"), SensorCategory::General);
        assert_eq!(SensorCategory::classify("SENSOR_END"), SensorCategory::General);
        // FRONT contains FR, and alignment is checked first.
        assert_eq!(SensorCategory::classify("SENSOR_FRONT"), SensorCategory::Alignment);
    }

    #[test]
    fn feedback_frame_truncates_barcode() {
        let frame = FeedbackFrame::new(0b1010_0001, 0b0101, 0x1_2C);
        assert_eq!(frame.barcode, 0x2C);
        assert_eq!(frame.to_bytes(), [0b1010_0001, 0b0101, 0x2C]);
        assert_eq!(FeedbackFrame::from_bytes(frame.to_bytes()), frame);
    }

    #[test]
    fn control_block_serialization_roundtrip() {
        let block = ControlBlock {
            speed: 2.5,
            on: true,
            reverse: false,
            pickup: true,
        };
        let json = serde_json::to_string(&block).unwrap();
        let back: ControlBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(block, back);
    }

    #[test]
    fn twin_error_display() {
        let err = TwinError::ScanFailure {
            name: "SENSOR_F".to_string(),
        };
        assert!(err.to_string().contains("SENSOR_F"));

        let err2 = TwinError::transport("connect", "connection refused");
        assert!(err2.to_string().contains("connect"));
        assert!(err2.to_string().contains("refused"));

        assert!(TwinError::UnknownBody(BodyId(7)).to_string().contains("#7"));
    }
}
