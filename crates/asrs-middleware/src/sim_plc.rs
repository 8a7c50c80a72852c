//! [`SimPlc`] – an in-memory PLC for tests and headless runs.
//!
//! Data blocks are plain byte vectors that grow on demand and read back as
//! zero where nothing was written.  Faults can be injected at each stage of
//! a cycle so the poll loop's containment can be exercised without a
//! controller on the bench.
//!
//! # Example
//!
//! ```rust
//! use asrs_middleware::sim_plc::SimPlc;
//! use asrs_middleware::transport::{PlcEndpoint, PlcTransport};
//! use asrs_types::{ControlBlock, ShuttleKind};
//!
//! let block = ControlBlock { speed: 1.0, on: true, reverse: false, pickup: false };
//! let mut plc = SimPlc::new().with_control(3, &block, ShuttleKind::Asrs);
//!
//! plc.connect(&PlcEndpoint::default()).unwrap();
//! assert_eq!(plc.db_read(3, 4, 1).unwrap(), vec![0x01]);
//! ```

use std::collections::HashMap;

use asrs_types::{ControlBlock, ShuttleKind, TwinError};
use tracing::{debug, warn};

use crate::codec;
use crate::transport::{PlcEndpoint, PlcTransport};

/// Smallest size a data block is allocated with.
const MIN_BLOCK_LEN: usize = 16;

/// How the next connect attempts behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectFault {
    #[default]
    None,
    /// `connect` returns `Ok` but no link comes up.
    Refuse,
    /// `connect` returns an error before any link exists.
    Error,
    /// The link comes up, then `connect` errors (e.g. PDU negotiation).
    HalfOpen,
}

#[derive(Debug, Default)]
pub struct SimPlc {
    blocks: HashMap<u16, Vec<u8>>,
    connected: bool,
    connect_fault: ConnectFault,
    fail_reads: bool,
    fail_write_offset: Option<u32>,
    writes: Vec<(u16, u32, Vec<u8>)>,
    connects: usize,
    disconnects: usize,
}

impl SimPlc {
    pub fn new() -> Self {
        Self::default()
    }

    // ── builders ────────────────────────────────────────────────────────────

    pub fn with_control(mut self, db: u16, block: &ControlBlock, kind: ShuttleKind) -> Self {
        self.set_control(db, block, kind);
        self
    }

    pub fn refuse_connection(mut self) -> Self {
        self.connect_fault = ConnectFault::Refuse;
        self
    }

    pub fn fail_connect(mut self) -> Self {
        self.connect_fault = ConnectFault::Error;
        self
    }

    pub fn fail_connect_half_open(mut self) -> Self {
        self.connect_fault = ConnectFault::HalfOpen;
        self
    }

    pub fn fail_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Reject any write that starts at byte `offset`.
    pub fn fail_write_at(mut self, offset: u32) -> Self {
        self.fail_write_offset = Some(offset);
        self
    }

    // ── runtime knobs ───────────────────────────────────────────────────────

    /// Overwrite the control block held in `db`.
    pub fn set_control(&mut self, db: u16, block: &ControlBlock, kind: ShuttleKind) {
        let bytes = codec::encode_control(block, kind);
        self.block_mut(db, bytes.len()).copy_from_slice(&bytes);
    }

    pub fn set_connect_fault(&mut self, fault: ConnectFault) {
        self.connect_fault = fault;
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn set_fail_write_at(&mut self, offset: Option<u32>) {
        self.fail_write_offset = offset;
    }

    // ── inspection ──────────────────────────────────────────────────────────

    /// Contents of data block `db`; empty when it was never touched.
    pub fn db(&self, db: u16) -> &[u8] {
        self.blocks.get(&db).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every successful write, oldest first, as `(db, offset, bytes)`.
    pub fn writes(&self) -> &[(u16, u32, Vec<u8>)] {
        &self.writes
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    pub fn connects(&self) -> usize {
        self.connects
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects
    }

    fn block_mut(&mut self, db: u16, end: usize) -> &mut [u8] {
        let block = self.blocks.entry(db).or_default();
        if block.len() < end {
            block.resize(end.max(MIN_BLOCK_LEN), 0);
        }
        &mut block[..end]
    }

    fn ensure_connected(&self, operation: &str) -> Result<(), TwinError> {
        if self.connected {
            Ok(())
        } else {
            Err(TwinError::transport(operation, "not connected"))
        }
    }
}

impl PlcTransport for SimPlc {
    fn connect(&mut self, endpoint: &PlcEndpoint) -> Result<(), TwinError> {
        self.connects += 1;
        match self.connect_fault {
            ConnectFault::None => {
                self.connected = true;
                debug!(%endpoint, "sim plc connected");
                Ok(())
            }
            ConnectFault::Refuse => {
                warn!(%endpoint, "sim plc refused connection");
                Ok(())
            }
            ConnectFault::Error => Err(TwinError::transport("connect", "connection refused")),
            ConnectFault::HalfOpen => {
                self.connected = true;
                Err(TwinError::transport("connect", "pdu negotiation failed"))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn db_read(&mut self, db: u16, offset: u32, len: usize) -> Result<Vec<u8>, TwinError> {
        self.ensure_connected("db_read")?;
        if self.fail_reads {
            return Err(TwinError::transport("db_read", format!("DB{db} read rejected")));
        }
        let start = offset as usize;
        let block = self.block_mut(db, start + len);
        Ok(block[start..].to_vec())
    }

    fn db_write(&mut self, db: u16, offset: u32, data: &[u8]) -> Result<(), TwinError> {
        self.ensure_connected("db_write")?;
        if self.fail_write_offset == Some(offset) {
            return Err(TwinError::transport(
                "db_write",
                format!("DB{db}.DBB{offset} write rejected"),
            ));
        }
        let start = offset as usize;
        self.block_mut(db, start + data.len())[start..].copy_from_slice(data);
        self.writes.push((db, offset, data.to_vec()));
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.disconnects += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> SimPlc {
        let mut plc = SimPlc::new();
        plc.connect(&PlcEndpoint::default()).unwrap();
        plc
    }

    #[test]
    fn untouched_blocks_read_as_zero() {
        let mut plc = connected();
        assert_eq!(plc.db_read(9, 2, 4).unwrap(), vec![0; 4]);
        assert_eq!(plc.db(9).len(), MIN_BLOCK_LEN);
    }

    #[test]
    fn writes_land_in_memory_and_log() {
        let mut plc = connected();
        plc.db_write(1, 2, &[0x2A]).unwrap();
        assert_eq!(plc.db(1)[2], 0x2A);
        assert_eq!(plc.writes(), &[(1, 2, vec![0x2A])]);
        plc.clear_writes();
        assert!(plc.writes().is_empty());
    }

    #[test]
    fn io_requires_a_link() {
        let mut plc = SimPlc::new();
        assert!(plc.db_read(1, 0, 1).is_err());
        assert!(plc.db_write(1, 0, &[1]).is_err());
    }

    #[test]
    fn connect_faults() {
        let ep = PlcEndpoint::default();

        let mut refused = SimPlc::new().refuse_connection();
        assert!(refused.connect(&ep).is_ok());
        assert!(!refused.is_connected());

        let mut failing = SimPlc::new().fail_connect();
        assert!(failing.connect(&ep).is_err());
        assert!(!failing.is_connected());

        let mut half = SimPlc::new().fail_connect_half_open();
        assert!(half.connect(&ep).is_err());
        assert!(half.is_connected());
        assert_eq!(half.connects(), 1);
    }

    #[test]
    fn read_and_write_faults() {
        let mut plc = connected();
        plc.set_fail_reads(true);
        assert!(matches!(
            plc.db_read(3, 0, 6),
            Err(TwinError::TransportFailure { .. })
        ));

        plc.set_fail_write_at(Some(2));
        assert!(plc.db_write(1, 0, &[1]).is_ok());
        assert!(plc.db_write(1, 2, &[1]).is_err());
        assert_eq!(plc.writes().len(), 1);
    }

    #[test]
    fn disconnect_counts_once() {
        let mut plc = connected();
        plc.disconnect();
        plc.disconnect();
        assert_eq!(plc.disconnects(), 1);
    }

    #[test]
    fn set_control_round_trips_through_codec() {
        let block = ControlBlock {
            speed: -0.5,
            on: true,
            reverse: true,
            pickup: true,
        };
        let mut plc = connected();
        plc.set_control(4, &block, ShuttleKind::Carrier);
        let raw = plc.db_read(4, 0, codec::CONTROL_BLOCK_LEN).unwrap();
        let decoded = codec::decode_control(&raw, ShuttleKind::Carrier).unwrap();
        assert_eq!(decoded.speed, -0.5);
        assert!(!decoded.pickup);
    }
}
