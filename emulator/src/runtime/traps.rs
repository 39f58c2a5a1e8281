use parse_display::Display;

use crate::console::Console;
use crate::constants::Word;

use super::{exception::Exception, registers::Reg, ExecutionError, Machine, StepOutcome};

/// Trap service routines. The low byte of a TRAP instruction selects one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "lowercase")]
pub enum TrapVector {
    /// Read a single key, no echo
    Getc = 0x20,
    /// Write the low byte of r0
    Out = 0x21,
    /// Write the zero-terminated string at r0, one character per word
    Puts = 0x22,
    /// Prompt for a key and echo it
    In = 0x23,
    /// Write the zero-terminated byte-packed string at r0
    Putsp = 0x24,
    /// Stop the machine
    Halt = 0x25,
}

impl TrapVector {
    pub(crate) fn decode(vector: Word) -> Result<Self, Exception> {
        match vector {
            0x20 => Ok(TrapVector::Getc),
            0x21 => Ok(TrapVector::Out),
            0x22 => Ok(TrapVector::Puts),
            0x23 => Ok(TrapVector::In),
            0x24 => Ok(TrapVector::Putsp),
            0x25 => Ok(TrapVector::Halt),
            _ => Err(Exception::UnknownTrap { vector }),
        }
    }

    /// Run the service routine against the host console.
    ///
    /// R7 already holds the return address; none of the routines touch the
    /// condition codes.
    pub(crate) fn service<C: Console>(
        self,
        machine: &mut Machine<C>,
    ) -> Result<StepOutcome, ExecutionError> {
        match self {
            TrapVector::Getc => {
                let byte = machine.console.read_byte()?;
                machine.registers.set(Reg::R0, Word::from(byte));
            }

            TrapVector::Out => {
                let byte = machine.registers.get(Reg::R0) as u8;
                machine.console.write_byte(byte)?;
                machine.console.flush()?;
            }

            TrapVector::Puts => {
                let mut address = machine.registers.get(Reg::R0);
                loop {
                    let word = machine.memory.get(address);
                    if word == 0 {
                        break;
                    }
                    machine.console.write_byte(word as u8)?;
                    address = address.wrapping_add(1);
                }
                machine.console.flush()?;
            }

            TrapVector::In => {
                for &byte in b"Enter a char: " {
                    machine.console.write_byte(byte)?;
                }
                machine.console.flush()?;
                let byte = machine.console.read_byte()?;
                machine.console.write_byte(byte)?;
                machine.console.flush()?;
                machine.registers.set(Reg::R0, Word::from(byte));
            }

            TrapVector::Putsp => {
                let mut address = machine.registers.get(Reg::R0);
                loop {
                    let word = machine.memory.get(address);
                    if word == 0 {
                        break;
                    }
                    let low = word as u8;
                    let high = (word >> 8) as u8;
                    if low != 0 {
                        machine.console.write_byte(low)?;
                    }
                    if high != 0 {
                        machine.console.write_byte(high)?;
                    }
                    address = address.wrapping_add(1);
                }
                machine.console.flush()?;
            }

            TrapVector::Halt => {
                for &byte in b"HALT\n" {
                    machine.console.write_byte(byte)?;
                }
                machine.console.flush()?;
                return Ok(StepOutcome::Halt);
            }
        }

        Ok(StepOutcome::Continue)
    }
}
