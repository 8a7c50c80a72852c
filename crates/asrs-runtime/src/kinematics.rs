//! Shuttle motion along a single drive axis.

use asrs_hal::Scene;
use asrs_perception::{Transform3D, Vec3};
use asrs_types::{Axis, BodyId, ControlBlock, ShuttleKind, TwinError};

/// Advance `location` by one cycle of travel along `axis`.
///
/// ```rust
/// use asrs_perception::Vec3;
/// use asrs_runtime::kinematics::integrate;
/// use asrs_types::Axis;
///
/// let next = integrate(Vec3::zero(), Axis::X, 2.0, true, 0.1);
/// assert!((next.x + 0.2).abs() < 1e-6);
/// ```
pub fn integrate(location: Vec3, axis: Axis, speed: f32, reverse: bool, multiplier: f32) -> Vec3 {
    let step = (if reverse { -speed } else { speed }) * multiplier;
    let delta = match axis {
        Axis::X => Vec3::new(step, 0.0, 0.0),
        Axis::Y => Vec3::new(0.0, step, 0.0),
        Axis::Z => Vec3::new(0.0, 0.0, step),
    };
    location.add(delta)
}

/// Move `shuttle` one cycle according to `block`.  Nothing moves while
/// `on` is clear.
///
/// # Errors
///
/// [`TwinError::UnknownBody`] for a stale shuttle handle.
pub fn drive(
    scene: &mut dyn Scene,
    shuttle: BodyId,
    kind: ShuttleKind,
    block: &ControlBlock,
    multiplier: f32,
) -> Result<(), TwinError> {
    if !block.on {
        return Ok(());
    }
    let local = scene
        .local_transform(shuttle)
        .ok_or(TwinError::UnknownBody(shuttle))?;
    let moved = integrate(
        local.translation,
        kind.drive_axis(),
        block.speed,
        block.reverse,
        multiplier,
    );
    scene.set_local_transform(shuttle, Transform3D::new(moved, local.rotation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use asrs_hal::SimScene;

    #[test]
    fn integrate_moves_only_the_driven_axis() {
        let start = Vec3::new(1.0, 2.0, 3.0);
        let x = integrate(start, Axis::X, 1.5, false, 0.1);
        assert!((x.x - 1.15).abs() < 1e-6);
        assert_eq!((x.y, x.z), (2.0, 3.0));

        let y = integrate(start, Axis::Y, 1.5, true, 0.1);
        assert!((y.y - 1.85).abs() < 1e-6);
        assert_eq!((y.x, y.z), (1.0, 3.0));
    }

    #[test]
    fn negative_speed_in_reverse_moves_forward() {
        let next = integrate(Vec3::zero(), Axis::X, -1.0, true, 0.5);
        assert!((next.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn drive_respects_on_flag_and_axis() {
        let mut scene = SimScene::new();
        let asrs = scene.add_box("ASRS_Shuttle", Vec3::new(1.0, 0.5, 0.1), Vec3::zero());
        let carrier = scene.add_box("Carrier_Shuttle", Vec3::new(0.5, 1.0, 0.1), Vec3::zero());
        let mut block = ControlBlock {
            speed: 2.0,
            on: false,
            reverse: false,
            pickup: false,
        };

        drive(&mut scene, asrs, ShuttleKind::Asrs, &block, 0.1).unwrap();
        assert_eq!(scene.location(asrs).unwrap(), Vec3::zero());

        block.on = true;
        drive(&mut scene, asrs, ShuttleKind::Asrs, &block, 0.1).unwrap();
        drive(&mut scene, carrier, ShuttleKind::Carrier, &block, 0.1).unwrap();
        assert!((scene.location(asrs).unwrap().x - 0.2).abs() < 1e-6);
        assert!((scene.location(carrier).unwrap().y - 0.2).abs() < 1e-6);
        assert_eq!(scene.location(carrier).unwrap().x, 0.0);

        assert!(matches!(
            drive(&mut scene, BodyId(42), ShuttleKind::Asrs, &block, 0.1),
            Err(TwinError::UnknownBody(_))
        ));
    }
}
