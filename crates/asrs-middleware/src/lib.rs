//! `asrs-middleware` – The PLC Link
//!
//! Moves bytes between the twin and the programmable logic controller that
//! drives the real shuttles.  Nothing here knows about scenes or sensors;
//! it only knows data blocks, offsets and the S7 wire format.
//!
//! # Modules
//!
//! - [`codec`] – Byte layout of the control and feedback data blocks.
//! - [`transport`] – The [`PlcTransport`] trait and connection settings.
//! - [`session`] – Scoped connect / disconnect around one poll cycle.
//! - [`s7`] – Blocking S7comm client over ISO-on-TCP.
//! - [`sim_plc`] – In-memory PLC with fault injection.

pub mod codec;
pub mod s7;
pub mod session;
pub mod sim_plc;
pub mod transport;

pub use s7::S7Client;
pub use session::PlcSession;
pub use sim_plc::SimPlc;
pub use transport::{PlcEndpoint, PlcTransport};
