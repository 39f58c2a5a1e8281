use std::fmt;

use tracing::debug;

use crate::console::Console;
use crate::constants::Word;

use super::{
    exception::Exception,
    registers::{CondFlags, Reg},
    traps::TrapVector,
    ExecutionError, Machine, StepOutcome,
};

/// Widen the low `bits` of `value` to a full word, replicating the sign bit.
pub(crate) fn sign_extend(value: Word, bits: u32) -> Word {
    if (value >> (bits - 1)) & 1 == 1 {
        value | (0xFFFF << bits)
    } else {
        value
    }
}

/// Second source of ADD and AND: a register, or a sign-extended imm5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operand {
    Reg(Reg),
    Imm(Word),
}

impl Operand {
    fn decode(word: Word) -> Self {
        if word & (1 << 5) != 0 {
            Operand::Imm(sign_extend(word & 0x1F, 5))
        } else {
            Operand::Reg(Reg::from_bits(word))
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Imm(value) => write!(f, "#{}", *value as i16),
        }
    }
}

/// A PC-relative or base-relative offset, already sign-extended.
struct Imm(Word);

impl fmt::Display for Imm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 as i16)
    }
}

/// A decoded instruction word.
///
/// Offsets are stored sign-extended; register fields are already narrowed
/// to their 3 bits. RES and RTI never decode, they raise an [`Exception`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Add the PC-relative offset to PC if the nzp mask meets the flags
    Br { nzp: CondFlags, offset: Word },

    /// DR ← SR1 + operand, wrapping
    Add { dr: Reg, sr1: Reg, src: Operand },

    /// DR ← mem[PC + offset]
    Ld { dr: Reg, offset: Word },

    /// mem[PC + offset] ← SR
    St { sr: Reg, offset: Word },

    /// R7 ← PC, then PC ← PC + offset
    Jsr { offset: Word },

    /// R7 ← PC, then PC ← BaseR
    Jsrr { base: Reg },

    /// DR ← SR1 & operand
    And { dr: Reg, sr1: Reg, src: Operand },

    /// DR ← mem[BaseR + offset]
    Ldr { dr: Reg, base: Reg, offset: Word },

    /// mem[BaseR + offset] ← SR
    Str { sr: Reg, base: Reg, offset: Word },

    /// DR ← !SR
    Not { dr: Reg, sr: Reg },

    /// DR ← mem[mem[PC + offset]]
    Ldi { dr: Reg, offset: Word },

    /// mem[mem[PC + offset]] ← SR
    Sti { sr: Reg, offset: Word },

    /// PC ← BaseR; `jmp r7` is RET
    Jmp { base: Reg },

    /// DR ← PC + offset
    Lea { dr: Reg, offset: Word },

    /// R7 ← PC, then run the service routine
    Trap { vector: TrapVector },
}

fn dr(word: Word) -> Reg {
    Reg::from_bits(word >> 9)
}

fn sr1(word: Word) -> Reg {
    Reg::from_bits(word >> 6)
}

fn pc_offset9(word: Word) -> Word {
    sign_extend(word & 0x1FF, 9)
}

impl Instruction {
    /// Split an instruction word on its top 4 bits and extract the operand
    /// fields.
    pub(crate) fn decode(word: Word) -> Result<Self, Exception> {
        let instruction = match word >> 12 {
            0b0000 => Instruction::Br {
                nzp: CondFlags::from_bits_truncate((word >> 9) & 0b111),
                offset: pc_offset9(word),
            },
            0b0001 => Instruction::Add {
                dr: dr(word),
                sr1: sr1(word),
                src: Operand::decode(word),
            },
            0b0010 => Instruction::Ld {
                dr: dr(word),
                offset: pc_offset9(word),
            },
            0b0011 => Instruction::St {
                sr: dr(word),
                offset: pc_offset9(word),
            },
            0b0100 => {
                if word & (1 << 11) != 0 {
                    Instruction::Jsr {
                        offset: sign_extend(word & 0x7FF, 11),
                    }
                } else {
                    Instruction::Jsrr { base: sr1(word) }
                }
            }
            0b0101 => Instruction::And {
                dr: dr(word),
                sr1: sr1(word),
                src: Operand::decode(word),
            },
            0b0110 => Instruction::Ldr {
                dr: dr(word),
                base: sr1(word),
                offset: sign_extend(word & 0x3F, 6),
            },
            0b0111 => Instruction::Str {
                sr: dr(word),
                base: sr1(word),
                offset: sign_extend(word & 0x3F, 6),
            },
            0b1000 => return Err(Exception::PrivilegedInstruction),
            0b1001 => Instruction::Not {
                dr: dr(word),
                sr: sr1(word),
            },
            0b1010 => Instruction::Ldi {
                dr: dr(word),
                offset: pc_offset9(word),
            },
            0b1011 => Instruction::Sti {
                sr: dr(word),
                offset: pc_offset9(word),
            },
            0b1100 => Instruction::Jmp { base: sr1(word) },
            0b1101 => return Err(Exception::ReservedInstruction),
            0b1110 => Instruction::Lea {
                dr: dr(word),
                offset: pc_offset9(word),
            },
            _ => Instruction::Trap {
                vector: TrapVector::decode(word & 0xFF)?,
            },
        };
        Ok(instruction)
    }

    /// Execute the instruction.
    ///
    /// PC has already been advanced past the instruction word, so the
    /// PC-relative offsets add directly.
    pub(crate) fn execute<C: Console>(
        &self,
        machine: &mut Machine<C>,
    ) -> Result<StepOutcome, ExecutionError> {
        use Instruction::*;

        match *self {
            Br { nzp, offset } => {
                if machine.registers.cond.intersects(nzp) {
                    machine.registers.pc = machine.registers.pc.wrapping_add(offset);
                    debug!("branch taken to {:#06x}", machine.registers.pc);
                }
            }

            Add { dr, sr1, src } => {
                let a = machine.registers.get(sr1);
                let b = machine.operand(src);
                let res = a.wrapping_add(b);
                debug!("{:#06x} + {:#06x} = {:#06x}", a, b, res);
                machine.registers.set(dr, res);
                machine.registers.update_flags(dr);
            }

            Ld { dr, offset } => {
                let address = machine.registers.pc.wrapping_add(offset);
                let value = machine.read(address)?;
                machine.registers.set(dr, value);
                machine.registers.update_flags(dr);
            }

            St { sr, offset } => {
                let address = machine.registers.pc.wrapping_add(offset);
                let value = machine.registers.get(sr);
                machine.write(address, value);
            }

            Jsr { offset } => {
                let pc = machine.registers.pc;
                machine.registers.set(Reg::R7, pc);
                machine.registers.pc = pc.wrapping_add(offset);
            }

            Jsrr { base } => {
                // Read the target first: BaseR may be r7 itself
                let target = machine.registers.get(base);
                let pc = machine.registers.pc;
                machine.registers.set(Reg::R7, pc);
                machine.registers.pc = target;
            }

            And { dr, sr1, src } => {
                let a = machine.registers.get(sr1);
                let b = machine.operand(src);
                let res = a & b;
                debug!("{:#06x} & {:#06x} = {:#06x}", a, b, res);
                machine.registers.set(dr, res);
                machine.registers.update_flags(dr);
            }

            Ldr { dr, base, offset } => {
                let address = machine.registers.get(base).wrapping_add(offset);
                let value = machine.read(address)?;
                machine.registers.set(dr, value);
                machine.registers.update_flags(dr);
            }

            Str { sr, base, offset } => {
                let address = machine.registers.get(base).wrapping_add(offset);
                let value = machine.registers.get(sr);
                machine.write(address, value);
            }

            Not { dr, sr } => {
                let res = !machine.registers.get(sr);
                machine.registers.set(dr, res);
                machine.registers.update_flags(dr);
            }

            Ldi { dr, offset } => {
                let pointer = machine.registers.pc.wrapping_add(offset);
                let address = machine.read(pointer)?;
                let value = machine.read(address)?;
                machine.registers.set(dr, value);
                machine.registers.update_flags(dr);
            }

            Sti { sr, offset } => {
                let pointer = machine.registers.pc.wrapping_add(offset);
                let address = machine.read(pointer)?;
                let value = machine.registers.get(sr);
                machine.write(address, value);
            }

            Jmp { base } => {
                machine.registers.pc = machine.registers.get(base);
            }

            Lea { dr, offset } => {
                let value = machine.registers.pc.wrapping_add(offset);
                machine.registers.set(dr, value);
                if machine.lea_sets_cond {
                    machine.registers.update_flags(dr);
                }
            }

            Trap { vector } => {
                let pc = machine.registers.pc;
                machine.registers.set(Reg::R7, pc);
                return vector.service(machine);
            }
        }

        Ok(StepOutcome::Continue)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match *self {
            Br { nzp, offset } => {
                write!(f, "br")?;
                if nzp.contains(CondFlags::NEG) {
                    write!(f, "n")?;
                }
                if nzp.contains(CondFlags::ZRO) {
                    write!(f, "z")?;
                }
                if nzp.contains(CondFlags::POS) {
                    write!(f, "p")?;
                }
                write!(f, " {}", Imm(offset))
            }
            Add { dr, sr1, src } => write!(f, "add {dr}, {sr1}, {src}"),
            Ld { dr, offset } => write!(f, "ld {dr}, {}", Imm(offset)),
            St { sr, offset } => write!(f, "st {sr}, {}", Imm(offset)),
            Jsr { offset } => write!(f, "jsr {}", Imm(offset)),
            Jsrr { base } => write!(f, "jsrr {base}"),
            And { dr, sr1, src } => write!(f, "and {dr}, {sr1}, {src}"),
            Ldr { dr, base, offset } => write!(f, "ldr {dr}, {base}, {}", Imm(offset)),
            Str { sr, base, offset } => write!(f, "str {sr}, {base}, {}", Imm(offset)),
            Not { dr, sr } => write!(f, "not {dr}, {sr}"),
            Ldi { dr, offset } => write!(f, "ldi {dr}, {}", Imm(offset)),
            Sti { sr, offset } => write!(f, "sti {sr}, {}", Imm(offset)),
            Jmp { base: Reg::R7 } => write!(f, "ret"),
            Jmp { base } => write!(f, "jmp {base}"),
            Lea { dr, offset } => write!(f, "lea {dr}, {}", Imm(offset)),
            Trap { vector } => write!(f, "trap {vector}"),
        }
    }
}
