//! [`Scanner`] – virtual sensors built from overlap queries.
//!
//! A sensor is a small mesh parented to a shuttle.  It "sees" whatever mesh
//! body it overlaps, except its own shuttle and that shuttle's other
//! children.  Sensors are looked up by name on every query, so bodies may
//! be added or renamed between cycles.
//!
//! Missing sensors or shuttles are not errors for the caller: they read as
//! "nothing detected" and are logged at `debug` level.

use asrs_hal::Scene;
use asrs_middleware::codec;
use asrs_types::{BodyId, BodyKind, TwinError};
use tracing::{debug, warn};

use crate::config::TwinConfig;
use crate::overlap::overlaps;
use crate::state::TwinState;

pub struct Scanner<'a> {
    scene: &'a dyn Scene,
    config: &'a TwinConfig,
}

impl<'a> Scanner<'a> {
    pub fn new(scene: &'a dyn Scene, config: &'a TwinConfig) -> Self {
        Self { scene, config }
    }

    fn resolve(&self, name: &str) -> Result<BodyId, TwinError> {
        self.scene.find(name).ok_or_else(|| TwinError::ScanFailure {
            name: name.to_string(),
        })
    }

    /// Mesh bodies `sensor` may detect, in scene order.
    fn candidates(&self, sensor: BodyId, shuttle: Option<BodyId>) -> impl Iterator<Item = BodyId> + '_ {
        self.scene.bodies().into_iter().filter(move |&id| {
            id != sensor
                && self.scene.kind(id) == Some(BodyKind::Mesh)
                && shuttle.is_none_or(|s| id != s && self.scene.parent(id) != Some(s))
        })
    }

    /// First body the sensor overlaps, ignoring the ASRS shuttle and
    /// everything mounted on it.
    pub fn sense(&self, sensor: &str) -> Option<BodyId> {
        let sensor_id = match self.resolve(sensor) {
            Ok(id) => id,
            Err(e) => {
                debug!(error = %e, "sensor skipped");
                return None;
            }
        };
        let shuttle = self.scene.find(&self.config.asrs_shuttle);
        let hit = self
            .candidates(sensor_id, shuttle)
            .find(|&id| overlaps(self.scene, sensor_id, id));
        debug!(sensor, ?hit, "sense");
        hit
    }

    /// Whether the sensor overlaps anything outside `reference_shuttle`.
    pub fn sense_presence(&self, sensor: &str, reference_shuttle: &str) -> bool {
        let (sensor_id, shuttle_id) = match (self.resolve(sensor), self.resolve(reference_shuttle)) {
            (Ok(s), Ok(r)) => (s, r),
            (Err(e), _) | (_, Err(e)) => {
                debug!(error = %e, "presence check skipped");
                return false;
            }
        };
        self.candidates(sensor_id, Some(shuttle_id))
            .any(|id| overlaps(self.scene, sensor_id, id))
    }

    /// First pallet the sensor overlaps.
    pub fn pallet_under(&self, sensor: &str) -> Option<BodyId> {
        let sensor_id = self.resolve(sensor).ok()?;
        self.prefixed(&self.config.pallet_prefix)
            .find(|&id| overlaps(self.scene, sensor_id, id))
    }

    /// Barcode under the barcode sensor.
    ///
    /// The first overlapping tag is parsed; a good parse updates
    /// `state.last_barcode`.  Whatever happens, the (possibly updated) last
    /// barcode is returned.
    pub fn read_barcode(&self, state: &mut TwinState) -> u32 {
        let Ok(sensor_id) = self.resolve(&self.config.barcode_sensor) else {
            return state.last_barcode;
        };
        let tag = self
            .prefixed(&self.config.barcode_prefix)
            .find(|&id| overlaps(self.scene, sensor_id, id));
        if let Some(name) = tag.and_then(|id| self.scene.name(id)) {
            match parse_barcode(name) {
                Ok(value) => state.last_barcode = value,
                Err(e) => warn!(error = %e, "barcode tag ignored"),
            }
        }
        state.last_barcode
    }

    /// Names of the sensors mounted directly on `shuttle`, in scene order.
    pub fn sensors_of(&self, shuttle: &str) -> Vec<String> {
        let Some(shuttle_id) = self.scene.find(shuttle) else {
            return Vec::new();
        };
        self.scene
            .children(shuttle_id)
            .into_iter()
            .filter_map(|id| self.scene.name(id))
            .filter(|name| name.starts_with(&self.config.sensor_prefix))
            .map(str::to_string)
            .collect()
    }

    /// Presence of each named sensor relative to `shuttle`, packed into a
    /// feedback mask.
    pub fn sensor_mask(&self, sensors: &[String], shuttle: &str) -> u8 {
        let states: Vec<bool> = sensors
            .iter()
            .map(|s| self.sense_presence(s, shuttle))
            .collect();
        codec::pack_bits(&states)
    }

    fn prefixed<'p>(&'p self, prefix: &'p str) -> impl Iterator<Item = BodyId> + 'p {
        self.scene
            .bodies()
            .into_iter()
            .filter(move |&id| self.scene.name(id).is_some_and(|n| n.starts_with(prefix)))
    }
}

/// Integer after the first `.` of a tag name: `BARCODE.001` is 1.
pub fn parse_barcode(name: &str) -> Result<u32, TwinError> {
    let digits = name
        .split('.')
        .nth(1)
        .ok_or_else(|| TwinError::DecodeFailure(format!("tag '{name}' has no '.'")))?;
    digits
        .parse()
        .map_err(|e| TwinError::DecodeFailure(format!("tag '{name}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::rack;
    use asrs_hal::SimScene;
    use asrs_perception::{Transform3D, Vec3};

    #[test]
    fn sense_finds_pallet_over_the_shuttle() {
        let r = rack();
        let cfg = TwinConfig::default();
        let scanner = Scanner::new(&r.scene, &cfg);
        assert_eq!(scanner.sense("SENSOR_F"), Some(r.pallet));
        assert_eq!(scanner.sense("SENSOR_END"), None);
        assert_eq!(scanner.sense("SENSOR_MISSING"), None);
    }

    #[test]
    fn sense_ignores_bodies_on_the_shuttle() {
        let mut r = rack();
        // Carried pallets are children of the shuttle.
        r.scene.set_parent(r.pallet, Some(r.asrs)).unwrap();
        let cfg = TwinConfig::default();
        let scanner = Scanner::new(&r.scene, &cfg);
        assert_eq!(scanner.sense("SENSOR_F"), None);
        assert!(!scanner.sense_presence("SENSOR_F", "ASRS_Shuttle"));
    }

    #[test]
    fn presence_is_relative_to_the_reference_shuttle() {
        let r = rack();
        let cfg = TwinConfig::default();
        let scanner = Scanner::new(&r.scene, &cfg);
        assert!(scanner.sense_presence("SENSOR_L1", "Carrier_Shuttle"));
        assert!(!scanner.sense_presence("SENSOR_L2", "Carrier_Shuttle"));
        // Measured against the other shuttle the post is still in view.
        assert!(scanner.sense_presence("SENSOR_L1", "ASRS_Shuttle"));
        assert!(!scanner.sense_presence("SENSOR_L1", "No_Such_Shuttle"));
        assert!(!scanner.sense_presence("SENSOR_NOPE", "Carrier_Shuttle"));
    }

    #[test]
    fn pallet_under_only_reports_pallets() {
        let r = rack();
        let cfg = TwinConfig::default();
        let scanner = Scanner::new(&r.scene, &cfg);
        assert_eq!(scanner.pallet_under("SENSOR_F"), Some(r.pallet));
        // The barcode sensor overlaps a tag, not a pallet.
        assert_eq!(scanner.pallet_under("SENSOR_BARCODE"), None);
        assert_eq!(scanner.pallet_under("SENSOR_MISSING"), None);
    }

    #[test]
    fn barcode_is_read_and_remembered() {
        let mut r = rack();
        let cfg = TwinConfig::default();
        let mut state = TwinState::new();

        assert_eq!(Scanner::new(&r.scene, &cfg).read_barcode(&mut state), 1);

        // Drive away from every tag: the last value sticks.
        r.scene
            .set_local_transform(r.asrs, Transform3D::from_translation(Vec3::new(2.0, 0.0, 0.0)))
            .unwrap();
        assert_eq!(Scanner::new(&r.scene, &cfg).read_barcode(&mut state), 1);

        r.scene
            .set_local_transform(r.asrs, Transform3D::from_translation(Vec3::new(5.0, 0.0, 0.0)))
            .unwrap();
        assert_eq!(Scanner::new(&r.scene, &cfg).read_barcode(&mut state), 2);
        assert_eq!(state.last_barcode, 2);
    }

    #[test]
    fn bad_tag_keeps_last_barcode() {
        let mut scene = SimScene::new();
        let cube = Vec3::new(0.1, 0.1, 0.1);
        scene.add_box("SENSOR_BARCODE", cube, Vec3::zero());
        scene.add_box("BARCODE.0xx", cube, Vec3::zero());
        let cfg = TwinConfig::default();
        let mut state = TwinState {
            last_barcode: 7,
            attached: None,
        };
        assert_eq!(Scanner::new(&scene, &cfg).read_barcode(&mut state), 7);
    }

    #[test]
    fn missing_barcode_sensor_returns_last_value() {
        let scene = SimScene::new();
        let cfg = TwinConfig::default();
        let mut state = TwinState {
            last_barcode: 42,
            attached: None,
        };
        assert_eq!(Scanner::new(&scene, &cfg).read_barcode(&mut state), 42);
    }

    #[test]
    fn parse_barcode_takes_the_second_segment() {
        assert_eq!(parse_barcode("BARCODE.001").unwrap(), 1);
        assert_eq!(parse_barcode("BARCODE.0300.7").unwrap(), 300);
        assert!(matches!(parse_barcode("BARCODE"), Err(TwinError::DecodeFailure(_))));
        assert!(matches!(parse_barcode("BARCODE.-1"), Err(TwinError::DecodeFailure(_))));
    }

    #[test]
    fn sensors_of_lists_prefixed_children() {
        let r = rack();
        let cfg = TwinConfig::default();
        let scanner = Scanner::new(&r.scene, &cfg);
        let asrs = scanner.sensors_of("ASRS_Shuttle");
        assert_eq!(asrs.len(), 9);
        assert_eq!(asrs[0], "SENSOR_F");
        assert_eq!(scanner.sensors_of("Carrier_Shuttle").len(), 4);
        assert!(scanner.sensors_of("Nobody").is_empty());
    }

    #[test]
    fn masks_follow_configured_order() {
        let r = rack();
        let cfg = TwinConfig::default();
        let scanner = Scanner::new(&r.scene, &cfg);
        assert_eq!(scanner.sensor_mask(&cfg.asrs_sensors, &cfg.asrs_shuttle), 0b0011_1111);
        assert_eq!(scanner.sensor_mask(&cfg.carrier_sensors, &cfg.carrier_shuttle), 0b0001);
    }
}
