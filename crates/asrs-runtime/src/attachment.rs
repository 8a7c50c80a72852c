//! Pallet pickup and drop.
//!
//! Picking up reparents the pallet under the ASRS shuttle; dropping
//! unparents it.  Both keep the pallet's world pose, so it never jumps.
//! The transition is chosen from the PLC pickup bit on every cycle
//! (level-triggered): a set bit keeps asking for a pickup, a clear bit keeps
//! asking for a drop, and each request is a no-op once satisfied.

use asrs_hal::Scene;
use asrs_types::{BodyId, TwinError};
use tracing::info;

use crate::config::TwinConfig;
use crate::scanner::Scanner;
use crate::state::TwinState;

/// Where a pallet currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    Free,
    /// Riding on the given shuttle.
    Attached(BodyId),
}

/// What [`apply`] did this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    PickedUp(BodyId),
    Dropped(BodyId),
    Unchanged,
}

pub fn attachment_state(scene: &dyn Scene, pallet: BodyId) -> AttachmentState {
    match scene.parent(pallet) {
        Some(shuttle) => AttachmentState::Attached(shuttle),
        None => AttachmentState::Free,
    }
}

/// Attach the pallet under the pickup sensor to the ASRS shuttle.
///
/// # Errors
///
/// [`TwinError::ScanFailure`] when the ASRS shuttle is missing, or the
/// scene's error when reparenting fails.
pub fn pickup(
    scene: &mut dyn Scene,
    config: &TwinConfig,
    state: &mut TwinState,
) -> Result<Transition, TwinError> {
    if state.attached.is_some() {
        return Ok(Transition::Unchanged);
    }
    let shuttle = scene
        .find(&config.asrs_shuttle)
        .ok_or_else(|| TwinError::ScanFailure {
            name: config.asrs_shuttle.clone(),
        })?;
    let Some(pallet) = Scanner::new(&*scene, config).pallet_under(&config.pickup_sensor) else {
        return Ok(Transition::Unchanged);
    };

    let world = scene
        .world_transform(pallet)
        .ok_or(TwinError::UnknownBody(pallet))?;
    scene.set_parent(pallet, Some(shuttle))?;
    scene.set_world_transform(pallet, world)?;
    state.attached = Some(pallet);
    info!(%pallet, %shuttle, "pallet picked up");
    Ok(Transition::PickedUp(pallet))
}

/// Release the attached pallet where it stands.
///
/// A remembered pallet that something else already unparented is simply
/// forgotten.
///
/// # Errors
///
/// [`TwinError::UnknownBody`] when the remembered pallet no longer exists.
pub fn drop(scene: &mut dyn Scene, state: &mut TwinState) -> Result<Transition, TwinError> {
    let Some(pallet) = state.attached else {
        return Ok(Transition::Unchanged);
    };
    if scene.parent(pallet).is_none() {
        state.attached = None;
        return Ok(Transition::Unchanged);
    }

    let world = scene
        .world_transform(pallet)
        .ok_or(TwinError::UnknownBody(pallet))?;
    scene.set_parent(pallet, None)?;
    scene.set_world_transform(pallet, world)?;
    state.attached = None;
    info!(%pallet, "pallet dropped");
    Ok(Transition::Dropped(pallet))
}

/// Run the transition the pickup bit asks for.
pub fn apply(
    scene: &mut dyn Scene,
    config: &TwinConfig,
    state: &mut TwinState,
    pickup_bit: bool,
) -> Result<Transition, TwinError> {
    if pickup_bit {
        pickup(scene, config, state)
    } else {
        drop(scene, state)
    }
}
