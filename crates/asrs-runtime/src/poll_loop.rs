//! [`PollLoop`] – the system loop bridging the PLC and the scene.
//!
//! One cycle:
//!
//! 1. Open a [`PlcSession`]; if no link comes up, stop here.
//! 2. ASRS shuttle: read its control block, run the pickup / drop
//!    transition, drive it along X.
//! 3. Carrier shuttle: read its control block, drive it along Y.
//! 4. Scan both sensor sets and the barcode.
//! 5. Write the three feedback bytes.
//!
//! A shuttle missing from the scene skips its step.  Any other failure ends
//! the cycle early and is logged; the loop keeps its schedule whatever
//! happens, and the session is released on every path.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use asrs_hal::Scene;
use asrs_middleware::{PlcEndpoint, PlcSession, PlcTransport};
use asrs_types::{FeedbackFrame, ShuttleKind, TwinError};
use tracing::{debug, info, warn};

use crate::attachment;
use crate::config::TwinConfig;
use crate::kinematics;
use crate::scanner::Scanner;
use crate::scheduler::{SchedulerError, TimerHost};
use crate::state::TwinState;

/// Scheduler key of the system loop.
pub const SYSTEM_LOOP: &str = "system";

/// How a cycle ended when nothing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Connect returned without a live link; nothing was read or written.
    NotConnected,
    /// Feedback was written.
    Completed(FeedbackFrame),
}

pub struct PollLoop<T: PlcTransport> {
    transport: T,
    endpoint: PlcEndpoint,
    config: TwinConfig,
    state: TwinState,
}

impl<T: PlcTransport> PollLoop<T> {
    pub fn new(transport: T, endpoint: PlcEndpoint, config: TwinConfig) -> Self {
        Self {
            transport,
            endpoint,
            config,
            state: TwinState::new(),
        }
    }

    pub fn state(&self) -> &TwinState {
        &self.state
    }

    pub fn config(&self) -> &TwinConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Run one cycle against `scene`.
    ///
    /// # Errors
    ///
    /// The first [`TwinError`] hit; everything after it in the cycle is
    /// skipped.
    pub fn run_cycle(&mut self, scene: &mut dyn Scene) -> Result<CycleOutcome, TwinError> {
        let cfg = &self.config;
        let mut session = PlcSession::open(&mut self.transport, &self.endpoint)?;
        if !session.is_established() {
            debug!(endpoint = %self.endpoint, "plc not reachable, cycle skipped");
            return Ok(CycleOutcome::NotConnected);
        }

        if let Some(asrs) = scene.find(&cfg.asrs_shuttle) {
            let block = session.read_control(cfg.asrs_control_db, ShuttleKind::Asrs)?;
            attachment::apply(scene, cfg, &mut self.state, block.pickup)?;
            kinematics::drive(scene, asrs, ShuttleKind::Asrs, &block, cfg.speed_multiplier)?;
        }

        if let Some(carrier) = scene.find(&cfg.carrier_shuttle) {
            let block = session.read_control(cfg.carrier_control_db, ShuttleKind::Carrier)?;
            kinematics::drive(scene, carrier, ShuttleKind::Carrier, &block, cfg.speed_multiplier)?;
        }

        let scanner = Scanner::new(&*scene, cfg);
        let asrs_bits = scanner.sensor_mask(&cfg.asrs_sensors, &cfg.asrs_shuttle);
        let carrier_bits = scanner.sensor_mask(&cfg.carrier_sensors, &cfg.carrier_shuttle);
        let barcode = scanner.read_barcode(&mut self.state);

        let frame = FeedbackFrame::new(asrs_bits, carrier_bits, barcode);
        session.write_feedback(cfg.feedback_db, &frame)?;
        debug!(?frame, "feedback written");
        Ok(CycleOutcome::Completed(frame))
    }

    /// Scheduler entry point: run a cycle, contain any failure, and ask to
    /// be called again after the poll interval.
    pub fn tick(&mut self, scene: &mut dyn Scene) -> Option<Duration> {
        if let Err(e) = self.run_cycle(scene) {
            warn!(error = %e, "system cycle failed");
        }
        Some(self.config.poll_interval())
    }
}

/// (Re)start the system loop on `host`; the first cycle runs immediately.
///
/// A cycle that finds the loop or scene already borrowed is skipped.
///
/// # Errors
///
/// Only if registration fails after the old loop was removed.
pub fn start_system<S, T>(
    host: &mut TimerHost,
    poll: Rc<RefCell<PollLoop<T>>>,
    scene: Rc<RefCell<S>>,
) -> Result<(), SchedulerError>
where
    S: Scene + 'static,
    T: PlcTransport + 'static,
{
    stop_system(host);
    let (fallback, dbs) = {
        let current = poll.borrow();
        let cfg = current.config();
        (
            cfg.poll_interval(),
            (cfg.asrs_control_db, cfg.carrier_control_db, cfg.feedback_db),
        )
    };
    host.register(SYSTEM_LOOP, Duration::ZERO, move || {
        match (poll.try_borrow_mut(), scene.try_borrow_mut()) {
            (Ok(mut poll), Ok(mut scene)) => poll.tick(&mut *scene),
            _ => {
                warn!("system loop busy, cycle skipped");
                Some(fallback)
            }
        }
    })?;
    info!(
        "system loop active: DB{} -> ASRS, DB{} -> carrier, feedback -> DB{}",
        dbs.0, dbs.1, dbs.2
    );
    Ok(())
}

/// Stop the system loop.  Returns whether it was running.
pub fn stop_system(host: &mut TimerHost) -> bool {
    let stopped = host.unregister(SYSTEM_LOOP).is_ok();
    if stopped {
        info!("system loop stopped");
    }
    stopped
}
