//! Byte layout of the PLC data blocks.
//!
//! | Block | Offset | Width | Meaning |
//! |---|---|---|---|
//! | ASRS control (3) | 0 | 4 B big-endian `f32` | speed |
//! | | 4 | bit 0 / 1 / 2 | on / reverse / pickup |
//! | Carrier control (4) | 0 | 4 B big-endian `f32` | speed |
//! | | 4 | bit 0 / 1 | on / reverse |
//! | Feedback (1) | 0 | 1 B | ASRS sensor mask |
//! | | 1 | 1 B | carrier sensor mask |
//! | | 2 | 1 B | barcode (low byte) |
//!
//! Bits are numbered from the least significant bit of the byte, as the PLC
//! addresses them (`DBX4.0` is mask `0x01`).

use asrs_types::{ControlBlock, FeedbackFrame, ShuttleKind, TwinError};
use tracing::warn;

pub const FEEDBACK_DB: u16 = 1;
pub const ASRS_CONTROL_DB: u16 = 3;
pub const CARRIER_CONTROL_DB: u16 = 4;

/// Bytes read from a control block each cycle.
pub const CONTROL_BLOCK_LEN: usize = 6;
pub const SPEED_OFFSET: usize = 0;
pub const FLAGS_OFFSET: usize = 4;
pub const ON_BIT: u8 = 0;
pub const REVERSE_BIT: u8 = 1;
pub const PICKUP_BIT: u8 = 2;

pub const ASRS_BITS_OFFSET: u32 = 0;
pub const CARRIER_BITS_OFFSET: u32 = 1;
pub const BARCODE_OFFSET: u32 = 2;

// ────────────────────────────────────────────────────────────────────────────
// Primitive accessors
// ────────────────────────────────────────────────────────────────────────────

/// Read a big-endian IEEE-754 `REAL` at `offset`.
pub fn get_real(data: &[u8], offset: usize) -> Result<f32, TwinError> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or_else(|| short_buffer(data.len(), offset + 4))?;
    Ok(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read bit `bit` (0 = LSB) of byte `byte`.
pub fn get_bool(data: &[u8], byte: usize, bit: u8) -> Result<bool, TwinError> {
    let b = data
        .get(byte)
        .ok_or_else(|| short_buffer(data.len(), byte + 1))?;
    Ok(*b & (1u8 << (bit & 7)) != 0)
}

pub fn set_real(data: &mut [u8], offset: usize, value: f32) -> Result<(), TwinError> {
    let len = data.len();
    let slot = data
        .get_mut(offset..offset + 4)
        .ok_or_else(|| short_buffer(len, offset + 4))?;
    slot.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

pub fn set_bool(data: &mut [u8], byte: usize, bit: u8, value: bool) -> Result<(), TwinError> {
    let len = data.len();
    let b = data
        .get_mut(byte)
        .ok_or_else(|| short_buffer(len, byte + 1))?;
    let mask = 1u8 << (bit & 7);
    if value {
        *b |= mask;
    } else {
        *b &= !mask;
    }
    Ok(())
}

fn short_buffer(have: usize, need: usize) -> TwinError {
    TwinError::DecodeFailure(format!("buffer holds {have} bytes, need {need}"))
}

// ────────────────────────────────────────────────────────────────────────────
// Control blocks
// ────────────────────────────────────────────────────────────────────────────

/// Decode a control block read from the PLC.
///
/// The pickup bit is only honoured for [`ShuttleKind::Asrs`]; for the
/// carrier it is always `false` whatever the wire says.
pub fn decode_control(data: &[u8], kind: ShuttleKind) -> Result<ControlBlock, TwinError> {
    Ok(ControlBlock {
        speed: get_real(data, SPEED_OFFSET)?,
        on: get_bool(data, FLAGS_OFFSET, ON_BIT)?,
        reverse: get_bool(data, FLAGS_OFFSET, REVERSE_BIT)?,
        pickup: kind.has_pickup() && get_bool(data, FLAGS_OFFSET, PICKUP_BIT)?,
    })
}

/// Encode a control block the way the PLC lays it out.  The twin never
/// writes control blocks; this is for simulated PLCs and tests.
pub fn encode_control(block: &ControlBlock, kind: ShuttleKind) -> [u8; CONTROL_BLOCK_LEN] {
    let mut out = [0u8; CONTROL_BLOCK_LEN];
    out[SPEED_OFFSET..SPEED_OFFSET + 4].copy_from_slice(&block.speed.to_be_bytes());
    let mut flags = 0u8;
    if block.on {
        flags |= 1u8 << ON_BIT;
    }
    if block.reverse {
        flags |= 1u8 << REVERSE_BIT;
    }
    if kind.has_pickup() && block.pickup {
        flags |= 1u8 << PICKUP_BIT;
    }
    out[FLAGS_OFFSET] = flags;
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Feedback
// ────────────────────────────────────────────────────────────────────────────

/// Pack up to eight sensor states into a mask; entry `i` becomes bit `i`.
/// Entries past the eighth are dropped with a warning.
pub fn pack_bits(states: &[bool]) -> u8 {
    if states.len() > 8 {
        warn!(sensors = states.len(), "only eight sensor states fit a mask, the rest are dropped");
    }
    states
        .iter()
        .take(8)
        .enumerate()
        .filter(|(_, on)| **on)
        .fold(0u8, |mask, (i, _)| mask | (1u8 << i))
}

/// Inverse of [`pack_bits`] for the first `count` bits.
pub fn unpack_bits(mask: u8, count: usize) -> Vec<bool> {
    (0..count.min(8)).map(|i| mask & (1u8 << i) != 0).collect()
}

/// The three single-byte writes of a feedback frame, as `(offset, byte)`,
/// in the order they go on the wire.
pub fn feedback_writes(frame: &FeedbackFrame) -> [(u32, u8); 3] {
    [
        (ASRS_BITS_OFFSET, frame.asrs_bits),
        (CARRIER_BITS_OFFSET, frame.carrier_bits),
        (BARCODE_OFFSET, frame.barcode),
    ]
}
