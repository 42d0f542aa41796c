use std::time::Duration;

use crate::memory::Byte;

/// Instructions [`Processor::run`](crate::Processor::run) executes before it
/// gives up on a program that never halts
pub const DEFAULT_INSTRUCTION_LIMIT: usize = 248_000;

/// Address of the cell holding the interrupt handler's address
pub const DEFAULT_INTERRUPT_VECTOR: Byte = 0xFE;

/// Machine settings chosen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Upper bound of instructions per `run` call
    pub instruction_limit: usize,
    /// Pause between two instructions during `run`
    pub delay: Option<Duration>,
    pub interrupt_vector: Byte,
    pub interrupt_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instruction_limit: DEFAULT_INSTRUCTION_LIMIT,
            delay: None,
            interrupt_vector: DEFAULT_INTERRUPT_VECTOR,
            interrupt_enabled: true,
        }
    }
}

impl Config {
    pub fn with_instruction_limit(mut self, limit: usize) -> Self {
        self.instruction_limit = limit;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_interrupt_vector(mut self, vector: Byte) -> Self {
        self.interrupt_vector = vector;
        self
    }

    pub fn with_interrupts(mut self, enabled: bool) -> Self {
        self.interrupt_enabled = enabled;
        self
    }
}
