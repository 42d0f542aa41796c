use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Stdin};

use log::*;

use crate::memory::Byte;

/// Source of characters for the `IN` instruction
pub trait Input {
    /// Blocks until one character is available. `None` means no character was
    /// supplied.
    fn read_char(&mut self) -> Option<Byte>;
}

/// Input that never supplies a character
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoInput;

impl Input for NoInput {
    fn read_char(&mut self) -> Option<Byte> {
        None
    }
}

/// Pre-supplied characters, handed out front to back
impl Input for VecDeque<Byte> {
    fn read_char(&mut self) -> Option<Byte> {
        self.pop_front()
    }
}

impl<T: Input + ?Sized> Input for &mut T {
    fn read_char(&mut self) -> Option<Byte> {
        (**self).read_char()
    }
}

/// Reads one line per request and takes its first byte
#[derive(Debug)]
pub struct LineInput<R> {
    reader: R,
}

impl<R: BufRead> LineInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl LineInput<BufReader<Stdin>> {
    /// Line input on the process' standard input
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead> Input for LineInput<R> {
    fn read_char(&mut self) -> Option<Byte> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(_) => line.bytes().find(|&b| b != b'\n' && b != b'\r'),
            Err(err) => {
                warn!("Failed to read input: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_queued_input() -> Result<()> {
        let mut input: VecDeque<Byte> = b"hi".iter().copied().collect();
        assert_eq!(input.read_char(), Some(b'h'));
        assert_eq!(input.read_char(), Some(b'i'));
        assert_eq!(input.read_char(), None);

        Ok(())
    }

    #[test]
    fn test_line_input_takes_first_char() -> Result<()> {
        let mut input = LineInput::new(&b"xyz\n\nq\n"[..]);
        assert_eq!(input.read_char(), Some(b'x'));
        assert_eq!(input.read_char(), None); // empty line
        assert_eq!(input.read_char(), Some(b'q'));
        assert_eq!(input.read_char(), None); // end of input

        Ok(())
    }
}
