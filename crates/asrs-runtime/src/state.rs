//! [`TwinState`] – what the system loop remembers between cycles.

use asrs_types::BodyId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TwinState {
    /// Last barcode successfully parsed.  Starts at 0 and is never reset.
    pub last_barcode: u32,
    /// The pallet currently held by the ASRS shuttle.
    pub attached: Option<BodyId>,
}

impl TwinState {
    pub fn new() -> Self {
        Self::default()
    }
}
