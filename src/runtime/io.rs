//! Input sources for the `DebugRead` system call.
//!
//! The output side needs no abstraction of its own: any [`std::io::Write`]
//! serves as the sink for `DebugWrite`.

use std::collections::VecDeque;
use std::io::{self, Read};

/// Byte sent by a terminal for Ctrl-C.
pub const INTERRUPT_BYTE: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Char(char),
    /// The user asked to stop. Aborts the run.
    Interrupt,
}

/// Single-character stream read by `DebugRead`.
pub trait InputSource {
    /// Block until the next character or an interrupt is available.
    fn read_char(&mut self) -> io::Result<InputEvent>;
}

/// Source that is always interrupted. For programs that never read.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl InputSource for NoInput {
    fn read_char(&mut self) -> io::Result<InputEvent> {
        Ok(InputEvent::Interrupt)
    }
}

/// Fixed text fed one character at a time, interrupted once exhausted.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    pending: VecDeque<char>,
}

impl ScriptedInput {
    pub fn new(text: &str) -> Self {
        Self {
            pending: text.chars().collect(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn read_char(&mut self) -> io::Result<InputEvent> {
        Ok(match self.pending.pop_front() {
            Some(c) if c as u32 == INTERRUPT_BYTE as u32 => InputEvent::Interrupt,
            Some(c) => InputEvent::Char(c),
            None => InputEvent::Interrupt,
        })
    }
}

/// UTF-8 characters decoded from a byte stream.
///
/// End of input and [`INTERRUPT_BYTE`] both count as an interrupt.
#[derive(Debug)]
pub struct ReaderInput<R> {
    reader: R,
}

pub type StdinInput = ReaderInput<io::Stdin>;

impl<R: Read> ReaderInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl ReaderInput<io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(io::stdin())
    }
}

impl<R: Read> InputSource for ReaderInput<R> {
    fn read_char(&mut self) -> io::Result<InputEvent> {
        let mut buf = [0u8; 4];

        if !read_or_eof(&mut self.reader, &mut buf[..1])? || buf[0] == INTERRUPT_BYTE {
            return Ok(InputEvent::Interrupt);
        }

        // Input ending inside a multi-byte sequence is still end of input.
        let width = utf8_width(buf[0]);
        if !read_or_eof(&mut self.reader, &mut buf[1..width])? {
            return Ok(InputEvent::Interrupt);
        }

        let c = std::str::from_utf8(&buf[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);

        Ok(InputEvent::Char(c))
    }
}

/// Fill `buf`, returning `false` if the stream ended first.
fn read_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}
