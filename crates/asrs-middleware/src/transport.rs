//! The PLC transport seam.
//!
//! The twin never speaks a fieldbus directly; it talks to a
//! [`PlcTransport`].  [`S7Client`][crate::s7::S7Client] speaks to a real
//! controller over ISO-on-TCP, [`SimPlc`][crate::sim_plc::SimPlc] keeps the
//! data blocks in memory for tests and headless runs.

use asrs_types::TwinError;
use serde::{Deserialize, Serialize};

/// Where and how to reach the PLC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlcEndpoint {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub rack: u16,
    #[serde(default = "default_slot")]
    pub slot: u16,
    /// Upper bound on the TCP connect, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Upper bound on each read / write round trip, in milliseconds.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
}

fn default_port() -> u16 {
    102
}
fn default_slot() -> u16 {
    1
}
fn default_connect_timeout_ms() -> u64 {
    1000
}
fn default_io_timeout_ms() -> u64 {
    500
}

impl Default for PlcEndpoint {
    fn default() -> Self {
        Self {
            host: "192.168.0.1".to_string(),
            port: default_port(),
            rack: 0,
            slot: default_slot(),
            connect_timeout_ms: default_connect_timeout_ms(),
            io_timeout_ms: default_io_timeout_ms(),
        }
    }
}

impl std::fmt::Display for PlcEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} (rack {}, slot {})", self.host, self.port, self.rack, self.slot)
    }
}

/// Byte-addressed access to a PLC's data blocks.
///
/// # Contract
///
/// * `connect` may succeed without establishing a link; callers check
///   [`is_connected`][Self::is_connected] afterwards.
/// * `disconnect` is idempotent and never fails.
/// * Every read / write fault is a [`TwinError::TransportFailure`].
pub trait PlcTransport {
    fn connect(&mut self, endpoint: &PlcEndpoint) -> Result<(), TwinError>;

    fn is_connected(&self) -> bool;

    /// Read `len` bytes of data block `db` starting at byte `offset`.
    fn db_read(&mut self, db: u16, offset: u32, len: usize) -> Result<Vec<u8>, TwinError>;

    /// Write `data` into data block `db` starting at byte `offset`.
    fn db_write(&mut self, db: u16, offset: u32, data: &[u8]) -> Result<(), TwinError>;

    fn disconnect(&mut self);
}

impl<T: PlcTransport + ?Sized> PlcTransport for Box<T> {
    fn connect(&mut self, endpoint: &PlcEndpoint) -> Result<(), TwinError> {
        (**self).connect(endpoint)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn db_read(&mut self, db: u16, offset: u32, len: usize) -> Result<Vec<u8>, TwinError> {
        (**self).db_read(db, offset, len)
    }

    fn db_write(&mut self, db: u16, offset: u32, data: &[u8]) -> Result<(), TwinError> {
        (**self).db_write(db, offset, data)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }
}
