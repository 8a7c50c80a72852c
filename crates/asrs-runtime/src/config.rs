//! [`TwinConfig`] – names, intervals and data-block ids the loops run with.
//!
//! Every field has a serde default, so a partial `[twin]` table in the CLI
//! config file only overrides what it mentions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinConfig {
    /// Period of the system loop, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Period of the diagnostic monitor, in milliseconds.
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,

    /// Scene units moved per unit of PLC speed per cycle.
    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: f32,

    #[serde(default = "default_feedback_db")]
    pub feedback_db: u16,
    #[serde(default = "default_asrs_control_db")]
    pub asrs_control_db: u16,
    #[serde(default = "default_carrier_control_db")]
    pub carrier_control_db: u16,

    #[serde(default = "default_asrs_shuttle")]
    pub asrs_shuttle: String,
    #[serde(default = "default_carrier_shuttle")]
    pub carrier_shuttle: String,

    #[serde(default = "default_sensor_prefix")]
    pub sensor_prefix: String,
    #[serde(default = "default_pallet_prefix")]
    pub pallet_prefix: String,
    /// Tags are named `<prefix>...`; the value is the integer after the
    /// first `.` of the name.
    #[serde(default = "default_barcode_prefix")]
    pub barcode_prefix: String,

    #[serde(default = "default_pickup_sensor")]
    pub pickup_sensor: String,
    #[serde(default = "default_barcode_sensor")]
    pub barcode_sensor: String,
    #[serde(default = "default_rail_end_sensor")]
    pub rail_end_sensor: String,

    /// The four corner sensors that must agree for a pallet to be aligned.
    #[serde(default = "default_alignment_sensors")]
    pub alignment_sensors: [String; 4],

    /// ASRS feedback mask; entry `i` is bit `i`.
    #[serde(default = "default_asrs_sensors")]
    pub asrs_sensors: Vec<String>,

    /// Carrier feedback mask; entry `i` is bit `i`.
    #[serde(default = "default_carrier_sensors")]
    pub carrier_sensors: Vec<String>,
}

fn default_poll_interval_ms() -> u64 {
    100
}
fn default_monitor_interval_ms() -> u64 {
    1000
}
fn default_speed_multiplier() -> f32 {
    0.1
}
fn default_feedback_db() -> u16 {
    1
}
fn default_asrs_control_db() -> u16 {
    3
}
fn default_carrier_control_db() -> u16 {
    4
}
fn default_asrs_shuttle() -> String {
    "ASRS_Shuttle".to_string()
}
fn default_carrier_shuttle() -> String {
    "Carrier_Shuttle".to_string()
}
fn default_sensor_prefix() -> String {
    "SENSOR_".to_string()
}
fn default_pallet_prefix() -> String {
    "Pallet".to_string()
}
fn default_barcode_prefix() -> String {
    "BARCODE.0".to_string()
}
fn default_pickup_sensor() -> String {
    "SENSOR_F".to_string()
}
fn default_barcode_sensor() -> String {
    "SENSOR_BARCODE".to_string()
}
fn default_rail_end_sensor() -> String {
    "SENSOR_FRONT".to_string()
}
fn default_alignment_sensors() -> [String; 4] {
    ["SENSOR_FR", "SENSOR_FL", "SENSOR_BR", "SENSOR_BL"].map(String::from)
}
fn default_asrs_sensors() -> Vec<String> {
    [
        "SENSOR_F",
        "SENSOR_B",
        "SENSOR_FL",
        "SENSOR_BR",
        "SENSOR_FR",
        "SENSOR_BL",
        "SENSOR_FRONT",
        "SENSOR_END",
    ]
    .map(String::from)
    .to_vec()
}
fn default_carrier_sensors() -> Vec<String> {
    ["SENSOR_L1", "SENSOR_L2", "SENSOR_SHUTTLE1", "SENSOR_SHUTTLE2"]
        .map(String::from)
        .to_vec()
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            monitor_interval_ms: default_monitor_interval_ms(),
            speed_multiplier: default_speed_multiplier(),
            feedback_db: default_feedback_db(),
            asrs_control_db: default_asrs_control_db(),
            carrier_control_db: default_carrier_control_db(),
            asrs_shuttle: default_asrs_shuttle(),
            carrier_shuttle: default_carrier_shuttle(),
            sensor_prefix: default_sensor_prefix(),
            pallet_prefix: default_pallet_prefix(),
            barcode_prefix: default_barcode_prefix(),
            pickup_sensor: default_pickup_sensor(),
            barcode_sensor: default_barcode_sensor(),
            rail_end_sensor: default_rail_end_sensor(),
            alignment_sensors: default_alignment_sensors(),
            asrs_sensors: default_asrs_sensors(),
            carrier_sensors: default_carrier_sensors(),
        }
    }
}

impl TwinConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_rack_wiring() {
        let cfg = TwinConfig::default();
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.monitor_interval(), Duration::from_secs(1));
        assert_eq!((cfg.feedback_db, cfg.asrs_control_db, cfg.carrier_control_db), (1, 3, 4));
        assert_eq!(cfg.asrs_sensors.len(), 8);
        assert_eq!(cfg.asrs_sensors[6], "SENSOR_FRONT");
        assert_eq!(cfg.carrier_sensors[3], "SENSOR_SHUTTLE2");
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let cfg: TwinConfig =
            serde_json::from_str(r#"{"poll_interval_ms":250,"pallet_prefix":"Crate"}"#).unwrap();
        assert_eq!(cfg.poll_interval_ms, 250);
        assert_eq!(cfg.pallet_prefix, "Crate");
        assert_eq!(cfg.asrs_shuttle, "ASRS_Shuttle");
        assert!((cfg.speed_multiplier - 0.1).abs() < f32::EPSILON);
    }
}
