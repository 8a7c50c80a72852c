//! `asrs-runtime` – The Twin's Loops
//!
//! Everything that runs on a timer: the system loop that mirrors the PLC's
//! commands into the scene and reports virtual sensor states back, and the
//! diagnostic monitor that only watches.
//!
//! # Modules
//!
//! - [`overlap`] – BVH overlap between two scene bodies.
//! - [`scanner`] – [`Scanner`][scanner::Scanner]: virtual sensors, pallet and
//!   barcode detection, feedback masks.
//! - [`alignment`] – four-corner pallet alignment.
//! - [`attachment`] – level-triggered pallet pickup and drop.
//! - [`kinematics`] – single-axis shuttle motion.
//! - [`poll_loop`] – [`PollLoop`][poll_loop::PollLoop]: one PLC round trip
//!   per tick, failures contained to the cycle.
//! - [`monitor`] – [`SensorMonitor`][monitor::SensorMonitor]: the
//!   diagnostic report loop.
//! - [`scheduler`] – [`TimerHost`][scheduler::TimerHost]: cooperative timers
//!   both loops run on.
//! - [`config`] – [`TwinConfig`][config::TwinConfig]: names, intervals and
//!   data-block ids.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console /
//!   JSON logging with optional OTLP export.
//!
//! The scene is shared between the two loops as `Rc<RefCell<_>>`; the
//! [`TimerHost`][scheduler::TimerHost] never runs two callbacks at once.

pub mod alignment;
pub mod attachment;
pub mod config;
pub mod kinematics;
pub mod monitor;
pub mod overlap;
pub mod poll_loop;
pub mod scanner;
pub mod scheduler;
pub mod state;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use attachment::{AttachmentState, Transition};
pub use config::TwinConfig;
pub use monitor::{MonitorReport, SensorMonitor, SensorReading, start_monitor, stop_monitor};
pub use poll_loop::{CycleOutcome, PollLoop, start_system, stop_system};
pub use scanner::Scanner;
pub use scheduler::{SchedulerError, TimerHost};
pub use state::TwinState;
pub use telemetry::{TracerProviderGuard, init_tracing};
