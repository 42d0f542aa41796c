//! A virtual 8-bit computer and the assembler that feeds it.
//!
//! ```text
//! source ──Assembler──▶ bytes ──load_program──▶ Processor ──▶ memory, registers, display
//! ```

pub mod assembler;
pub mod config;
pub mod display;
pub mod instruction;
pub mod io;
pub mod memory;
pub mod processor;

pub use assembler::{assemble, Assembler, AssemblyError};
pub use config::Config;
pub use processor::{Fault, Processor};
