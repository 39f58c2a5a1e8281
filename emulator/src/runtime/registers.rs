use bitflags::bitflags;
use parse_display::Display;

use crate::constants::{Address, Word};

bitflags! {
    /// Condition codes.
    ///
    /// Exactly one bit is set once an instruction has written a register
    /// result; BR masks them with its nzp field.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct CondFlags: Word {
        const POS = 0b001;
        const ZRO = 0b010;
        const NEG = 0b100;
    }
}

impl Default for CondFlags {
    fn default() -> Self {
        // On startup only the zero flag is set
        CondFlags::ZRO
    }
}

impl std::fmt::Debug for CondFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#05b}", self.bits())
    }
}

/// A general purpose register, named by a 3-bit instruction field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "lowercase")]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

impl Reg {
    /// Decode a 3-bit register field.
    pub(crate) fn from_bits(bits: Word) -> Self {
        use Reg::*;
        match bits & 0b111 {
            0 => R0,
            1 => R1,
            2 => R2,
            3 => R3,
            4 => R4,
            5 => R5,
            6 => R6,
            _ => R7,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    gpr: [Word; 8],

    /// Address of the next instruction to fetch
    pub pc: Address,

    /// Condition codes of the last written result
    pub cond: CondFlags,
}

impl Registers {
    #[must_use]
    pub fn get(&self, reg: Reg) -> Word {
        self.gpr[reg as usize]
    }

    pub fn set(&mut self, reg: Reg, value: Word) {
        self.gpr[reg as usize] = value;
    }

    /// Point the condition codes at the sign of the value just written to
    /// `reg`.
    pub fn update_flags(&mut self, reg: Reg) {
        let value = self.gpr[reg as usize];
        self.cond = if value == 0 {
            CondFlags::ZRO
        } else if value >> 15 == 1 {
            CondFlags::NEG
        } else {
            CondFlags::POS
        };
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, value) in self.gpr.iter().enumerate() {
            write!(f, "r{i} = {value:04x} | ")?;
        }
        write!(f, "pc = {:04x} | cond = {:?}", self.pc, self.cond)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_track_sign_of_written_value() {
        let mut registers = Registers::default();

        registers.set(Reg::R3, 0x1234);
        registers.update_flags(Reg::R3);
        assert_eq!(registers.cond, CondFlags::POS);

        registers.set(Reg::R3, 0);
        registers.update_flags(Reg::R3);
        assert_eq!(registers.cond, CondFlags::ZRO);

        registers.set(Reg::R3, 0x8000);
        registers.update_flags(Reg::R3);
        assert_eq!(registers.cond, CondFlags::NEG);
    }

    #[test]
    fn exactly_one_flag_after_every_update() {
        let mut registers = Registers::default();
        for value in [0u16, 1, 2, 0x7FFF, 0x8000, 0xABCD, 0xFFFF] {
            registers.set(Reg::R0, value);
            registers.update_flags(Reg::R0);
            assert_eq!(registers.cond.bits().count_ones(), 1, "value {value:#06x}");
        }
    }

    #[test]
    fn register_field_decoding_masks_to_three_bits() {
        assert_eq!(Reg::from_bits(0b000), Reg::R0);
        assert_eq!(Reg::from_bits(0b111), Reg::R7);
        // Callers pass unshifted words; only the low three bits matter
        assert_eq!(Reg::from_bits(0b1010), Reg::R2);
    }

    #[test]
    fn registers_display_names() {
        assert_eq!(Reg::R0.to_string(), "r0");
        assert_eq!(Reg::R7.to_string(), "r7");
    }
}
