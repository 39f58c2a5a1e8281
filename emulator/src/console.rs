use std::collections::VecDeque;
use std::io;

use thiserror::Error;

/// Errors raised by the host console.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("console i/o error: {0}")]
    Io(#[from] io::Error),

    /// The host asked for the run to stop (Ctrl+C under a raw terminal).
    #[error("interrupted")]
    Interrupted,

    /// The input stream ended while the guest was waiting for a key.
    #[error("input stream closed")]
    Closed,
}

/// Host side of the keyboard and the display.
///
/// The machine suspends only inside these calls: `read_byte` blocks until a
/// key arrives, `poll` answers the keyboard status register without
/// blocking.
pub trait Console {
    /// Is a key waiting right now?
    fn poll(&mut self) -> Result<bool, ConsoleError>;

    /// Read a single input byte, blocking until one arrives.
    fn read_byte(&mut self) -> Result<u8, ConsoleError>;

    /// Write a single output byte.
    fn write_byte(&mut self, byte: u8) -> Result<(), ConsoleError>;

    /// Push buffered output to the host.
    fn flush(&mut self) -> Result<(), ConsoleError>;
}

/// Console replaying a scripted input and capturing output.
///
/// Lets tests and embedders run guest programs without a terminal.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl ScriptedConsole {
    #[must_use]
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
        }
    }

    /// Everything the guest wrote so far.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        &self.output
    }
}

impl Console for ScriptedConsole {
    fn poll(&mut self) -> Result<bool, ConsoleError> {
        Ok(!self.input.is_empty())
    }

    fn read_byte(&mut self) -> Result<u8, ConsoleError> {
        self.input.pop_front().ok_or(ConsoleError::Closed)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), ConsoleError> {
        self.output.push(byte);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConsoleError> {
        Ok(())
    }
}
