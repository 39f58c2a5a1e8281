use thiserror::Error;

use crate::constants::Word;

/// Faults raised by guest code.
///
/// The guest has no handler mechanism; every exception ends the run.
#[derive(Error, Debug)]
pub enum Exception {
    /// Opcode 0b1101 has no defined behavior.
    #[error("reserved instruction")]
    ReservedInstruction,

    /// RTI needs supervisor mode, and this machine never leaves user mode.
    #[error("privileged instruction")]
    PrivilegedInstruction,

    #[error("unknown trap vector {vector:#04x}")]
    UnknownTrap { vector: Word },
}
