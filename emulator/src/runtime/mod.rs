use std::fmt::Debug;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::console::{Console, ConsoleError};
use crate::constants::{Address, Word, KBDR, KBSR, KB_READY, PC_START};
use crate::image::{Image, ImageError};

mod exception;
mod instructions;
mod memory;
mod registers;
mod traps;

pub use self::exception::Exception;
pub(crate) use self::instructions::Instruction;
use self::instructions::Operand;
pub use self::memory::Memory;
pub use self::registers::{CondFlags, Reg, Registers};
pub use self::traps::TrapVector;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("CPU exception: {0}")]
    Exception(#[from] Exception),

    #[error("console error: {0}")]
    Console(#[from] ConsoleError),
}

type Result<T> = std::result::Result<T, ExecutionError>;

/// What an executed instruction asks the dispatch loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Halt,
}

/// A complete LC-3 machine: register file, memory, and the host console.
pub struct Machine<C> {
    pub registers: Registers,
    pub memory: Memory,
    pub cycles: usize,
    console: C,
    lea_sets_cond: bool,
}

impl<C> Debug for Machine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Machine {{ registers: {:?}, memory: [...] }}",
            self.registers
        )
    }
}

impl<C: Console> Machine<C> {
    /// Power up with zeroed memory and PC at the reset vector.
    pub fn new(console: C) -> Self {
        let mut registers = Registers::default();
        registers.pc = PC_START;
        Machine {
            registers,
            memory: Memory::default(),
            cycles: 0,
            console,
            lea_sets_cond: true,
        }
    }

    /// LC-3 rev 1 updates the condition codes on LEA, rev 2 leaves them
    /// alone. Defaults to the rev 1 behavior.
    pub fn set_lea_sets_cond(&mut self, enabled: bool) {
        self.lea_sets_cond = enabled;
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    /// Copy an image's words into memory, leaving everything else as is.
    pub fn load_image(&mut self, image: &Image) {
        image.load_into(&mut self.memory);
    }

    /// Read, parse and load an image file.
    #[tracing::instrument(skip(self))]
    pub fn load_image_file(&mut self, path: &Path) -> std::result::Result<(), ImageError> {
        let image = Image::open(path)?;
        info!(
            origin = format_args!("{:#06x}", image.origin),
            words = image.words.len(),
            "image loaded"
        );
        self.load_image(&image);
        Ok(())
    }

    /// Read a word, going through the memory-mapped keyboard registers.
    ///
    /// A read of KBSR polls the console: when a key is waiting it is
    /// latched into KBDR and the ready bit is raised, otherwise the status
    /// word is cleared. Instruction fetch comes through here too.
    pub(crate) fn read(&mut self, address: Address) -> std::result::Result<Word, ConsoleError> {
        if address == KBSR {
            if self.console.poll()? {
                let byte = self.console.read_byte()?;
                self.memory.set(KBSR, KB_READY);
                self.memory.set(KBDR, Word::from(byte));
            } else {
                self.memory.set(KBSR, 0);
            }
        }
        Ok(self.memory.get(address))
    }

    /// Write a word. Stores have no host side effects, even to KBSR/KBDR.
    pub(crate) fn write(&mut self, address: Address, value: Word) {
        self.memory.set(address, value);
    }

    pub(crate) fn operand(&self, operand: Operand) -> Word {
        match operand {
            Operand::Reg(reg) => self.registers.get(reg),
            Operand::Imm(value) => value,
        }
    }

    fn fetch(&mut self) -> std::result::Result<Word, ConsoleError> {
        let word = self.read(self.registers.pc)?;
        self.registers.pc = self.registers.pc.wrapping_add(1);
        Ok(word)
    }

    /// Fetch, decode and execute a single instruction.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn step(&mut self) -> Result<StepOutcome> {
        let word = self.fetch()?;
        let instruction = Instruction::decode(word)?;
        debug!("executing \"{}\"", instruction);
        let outcome = instruction.execute(self)?;
        self.cycles += 1;
        Ok(outcome)
    }

    /// Run until the guest halts or faults.
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.step()? {
                StepOutcome::Continue => {}
                StepOutcome::Halt => {
                    info!(cycles = self.cycles, "machine halted");
                    return Ok(());
                }
            }
        }
    }
}
