//! [`PlcSession`] – one connection, one poll cycle.
//!
//! A session connects when opened and disconnects when dropped, whatever
//! path the cycle leaves by.  Nothing survives between cycles, so a fault
//! in one cycle never leaves a half-open link for the next.

use asrs_types::{ControlBlock, FeedbackFrame, ShuttleKind, TwinError};
use tracing::debug;

use crate::codec::{self, CONTROL_BLOCK_LEN};
use crate::transport::{PlcEndpoint, PlcTransport};

/// Scoped use of a [`PlcTransport`].
pub struct PlcSession<'a, T: PlcTransport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: PlcTransport + ?Sized> PlcSession<'a, T> {
    /// Connect `transport` to `endpoint`.
    ///
    /// The link is released even when connecting fails half way.
    ///
    /// # Errors
    ///
    /// Whatever [`PlcTransport::connect`] reports.
    pub fn open(transport: &'a mut T, endpoint: &PlcEndpoint) -> Result<Self, TwinError> {
        let session = Self { transport };
        session.transport.connect(endpoint)?;
        debug!(%endpoint, connected = session.transport.is_connected(), "plc session opened");
        Ok(session)
    }

    /// Whether the connect attempt produced a live link.
    pub fn is_established(&self) -> bool {
        self.transport.is_connected()
    }

    /// Read and decode one control block.
    ///
    /// # Errors
    ///
    /// [`TwinError::TransportFailure`] on a read fault,
    /// [`TwinError::DecodeFailure`] on a short reply.
    pub fn read_control(&mut self, db: u16, kind: ShuttleKind) -> Result<ControlBlock, TwinError> {
        let data = self.transport.db_read(db, 0, CONTROL_BLOCK_LEN)?;
        codec::decode_control(&data, kind)
    }

    /// Write a feedback frame as three single-byte writes.  Stops at the
    /// first failing write; the bytes after it are not sent.
    ///
    /// # Errors
    ///
    /// [`TwinError::TransportFailure`] from the first failing write.
    pub fn write_feedback(&mut self, db: u16, frame: &FeedbackFrame) -> Result<(), TwinError> {
        for (offset, byte) in codec::feedback_writes(frame) {
            self.transport.db_write(db, offset, &[byte])?;
        }
        Ok(())
    }
}

impl<T: PlcTransport + ?Sized> Drop for PlcSession<'_, T> {
    fn drop(&mut self) {
        if self.transport.is_connected() {
            self.transport.disconnect();
            debug!("plc session released");
        }
    }
}
