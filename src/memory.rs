use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use color_eyre::eyre::{Result, WrapErr};
use log::*;

use crate::assembler::{self, AssemblyError};

pub type Byte = u8; // 1 byte
pub type Word = u16; // 2 bytes

/// Number of addressable cells
pub const MEMORY_SIZE: usize = 256;

/// Emulates the unified code, data and stack memory of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memory {
    /// The actual data of the memory
    pub data: [Byte; MEMORY_SIZE],
}

impl Default for Memory {
    /// Initializes the memory
    fn default() -> Self {
        Memory {
            data: [0; MEMORY_SIZE],
        }
    }
}

impl Memory {
    /// Reads a byte from the memory
    pub fn read_byte(&self, position: Byte) -> Byte {
        self.data[position as usize]
    }

    /// Writes a byte to the memory
    pub fn write_byte(&mut self, position: Byte, value: Byte) {
        self.data[position as usize] = value;
    }

    /// Writes an array of bytes to the memory, dropping whatever does not fit.
    /// Returns the number of bytes written.
    pub fn write_array(&mut self, position: Byte, data: &[Byte]) -> usize {
        let start = position as usize;
        let len = data.len().min(MEMORY_SIZE - start);
        self.data[start..start + len].copy_from_slice(&data[..len]);
        len
    }

    /// Loads a program starting at address 0. Programs larger than the memory
    /// are truncated.
    pub fn load(&mut self, program: &[Byte]) -> usize {
        let loaded = self.write_array(0, program);
        if loaded < program.len() {
            warn!(
                "Program too large for memory ({} bytes). Truncated at byte {}.",
                program.len(),
                loaded
            );
        }
        info!("Loaded {} bytes into memory.", loaded);
        loaded
    }

    /// Assembles the source file at `path` into a fresh memory image
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read `{}`", path.display()))?;
        let memory = source
            .parse::<Memory>()
            .wrap_err_with(|| format!("Failed to assemble `{}`", path.display()))?;
        Ok(memory)
    }

    /// Renders the memory as a hex table, 16 cells per row
    pub fn dump(&self) -> String {
        let mut out = String::with_capacity(MEMORY_SIZE * 3 + 16 * 6);
        for (row, chunk) in self.data.chunks(16).enumerate() {
            let _ = write!(out, "{:02X}:", row * 16);
            for byte in chunk {
                let _ = write!(out, " {:02X}", byte);
            }
            out.push('\n');
        }
        out
    }
}

impl FromStr for Memory {
    type Err = AssemblyError;

    /// Assembles `source` and loads the result at address 0
    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let program = assembler::assemble(source)?;
        let mut memory = Memory::default();
        memory.load(&program);
        Ok(memory)
    }
}

/// Writes a block of instructions directly into the memory
#[macro_export]
macro_rules! write_instructions {
    ( $mem:ident : $pos:expr => $( $byte:expr ),+ ) => {
        $mem.write_array($pos, &[
            $(
                $byte as $crate::memory::Byte,
            )+
        ]);
    };
}

#[cfg(test)]
mod tests {
    use crate::instruction::Mnemonic;

    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_read_byte() -> Result<()> {
        let mut mem = Memory::default();
        mem.data[0x2] = 0x12;
        assert_eq!(mem.read_byte(0x2), 0x12);

        Ok(())
    }

    #[test]
    fn test_write_byte() -> Result<()> {
        let mut mem = Memory::default();
        mem.write_byte(0x44, 12);
        assert_eq!(mem.data[0x44], 12);

        Ok(())
    }

    #[test]
    fn test_write_array_truncates_at_end() -> Result<()> {
        let mut mem = Memory::default();
        let written = mem.write_array(0xFE, &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(written, 2);
        assert_eq!(mem.data[0xFE], 0x12);
        assert_eq!(mem.data[0xFF], 0x34);

        Ok(())
    }

    #[test]
    fn test_load_oversized_program() -> Result<()> {
        let mut mem = Memory::default();
        let program: Vec<Byte> = (0..300).map(|i| (i % 256) as Byte).collect();
        assert_eq!(mem.load(&program), MEMORY_SIZE);
        assert_eq!(mem.data[0xFF], 0xFF);

        Ok(())
    }

    #[test]
    fn test_write_instructions() -> Result<()> {
        let mut mem = Memory::default();
        mem.write_array(
            0x10,
            &[
                Mnemonic::LOAD as Byte,
                42,
                Mnemonic::STORE.encode(3),
                Mnemonic::HALT as Byte,
            ],
        );

        let mut mem2 = Memory::default();
        use crate::instruction::Mnemonic::*;
        write_instructions!(mem2 : 0x10 => LOAD, 42, STORE.encode(3), HALT);

        assert_eq!(mem, mem2);

        Ok(())
    }

    #[test]
    fn test_from_str() -> Result<()> {
        let mem: Memory = "LOAD 0x05\nHALT".parse()?;
        assert_eq!(&mem.data[..3], &[0x00, 0x05, 0xF0]);

        Ok(())
    }

    #[test]
    fn test_dump() -> Result<()> {
        let mut mem = Memory::default();
        mem.data[0x11] = 0xAB;
        let dump = mem.dump();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 16);
        assert!(lines[1].starts_with("10: 00 AB"));

        Ok(())
    }
}
