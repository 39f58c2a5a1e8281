use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crossterm::terminal;
use lc3_emulator::console::{Console, ConsoleError};

/// ASCII ETX, what Ctrl+C produces once the terminal is in raw mode.
const ETX: u8 = 0x03;

/// Console backed by the real terminal.
///
/// A reader thread pumps stdin bytes into a channel so that the keyboard
/// status poll never blocks. When stdin is a tty the terminal is switched
/// to raw (non-canonical, no-echo) mode for the lifetime of the value and
/// restored on drop; with ISIG off, Ctrl+C arrives in-band as 0x03 and is
/// reported as an interrupt.
pub struct TerminalConsole {
    input: Receiver<u8>,
    pending: Option<u8>,
    stdout: io::Stdout,
    raw_mode: bool,
}

impl TerminalConsole {
    pub fn new() -> io::Result<Self> {
        let raw_mode = atty::is(atty::Stream::Stdin);
        if raw_mode {
            terminal::enable_raw_mode()?;
        }

        let (sender, input) = mpsc::channel();
        thread::spawn(move || {
            let mut stdin = io::stdin();
            let mut buf = [0u8; 64];
            loop {
                match stdin.read(&mut buf) {
                    // EOF or a broken stdin both end the pump; the closed
                    // channel tells the machine side
                    Ok(0) | Err(_) => return,
                    Ok(n) => {
                        for &byte in &buf[..n] {
                            if sender.send(byte).is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            input,
            pending: None,
            stdout: io::stdout(),
            raw_mode,
        })
    }

    fn accept(&self, byte: u8) -> Result<u8, ConsoleError> {
        if self.raw_mode && byte == ETX {
            Err(ConsoleError::Interrupted)
        } else {
            Ok(byte)
        }
    }
}

impl Console for TerminalConsole {
    fn poll(&mut self) -> Result<bool, ConsoleError> {
        if self.pending.is_some() {
            return Ok(true);
        }
        match self.input.try_recv() {
            Ok(byte) => {
                self.pending = Some(self.accept(byte)?);
                Ok(true)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(false),
        }
    }

    fn read_byte(&mut self) -> Result<u8, ConsoleError> {
        if let Some(byte) = self.pending.take() {
            return Ok(byte);
        }
        let byte = self.input.recv().map_err(|_| ConsoleError::Closed)?;
        self.accept(byte)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), ConsoleError> {
        // Raw mode turns off output post-processing; put the newline
        // translation back so guest output lines up
        if self.raw_mode && byte == b'\n' {
            self.stdout.write_all(b"\r\n")?;
        } else {
            self.stdout.write_all(&[byte])?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConsoleError> {
        self.stdout.flush()?;
        Ok(())
    }
}

impl Drop for TerminalConsole {
    fn drop(&mut self) {
        if self.raw_mode {
            let _ = terminal::disable_raw_mode();
        }
    }
}
