use std::fmt;
use std::io::{self, Sink, Write};
use std::thread;

use color_eyre::eyre::{Result, WrapErr};
use log::*;

use crate::config::Config;
use crate::display::{Display, DisplayMode};
use crate::instruction::{Condition, Instruction, Mnemonic};
use crate::io::{Input, NoInput};
use crate::memory::{Byte, Memory, Word};

/// Stack pointer of an empty stack
pub const STACK_TOP: Byte = 0xFF;

/// Register file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Registers {
    /// Accumulator
    pub a: Byte,
    /// General purpose register
    pub b: Byte,
    /// Stack pointer, grows downwards
    pub sp: Byte,
    /// Program counter
    pub pc: Byte,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            a: 0,
            b: 0,
            sp: STACK_TOP,
            pc: 0,
        }
    }
}

/// Status flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags {
    /// Zero: A is zero
    pub z: bool,
    /// Carry: the bit shifted out by the last shift
    pub c: bool,
    /// Negative: bit 7 of A is set
    pub n: bool,
}

/// Conditions that halt the machine instead of executing further
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// The program counter ran past the last memory cell
    MemoryOutOfRange,
    /// Push with a full stack
    StackOverflow,
    /// Pop with an empty stack
    StackUnderflow,
    /// Byte that encodes no instruction
    IllegalInstruction(Byte),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::MemoryOutOfRange => f.write_str("program counter out of memory range"),
            Fault::StackOverflow => f.write_str("stack overflow"),
            Fault::StackUnderflow => f.write_str("stack underflow"),
            Fault::IllegalInstruction(byte) => write!(f, "illegal instruction 0x{:02X}", byte),
        }
    }
}

/// Emulates the CPU together with the memory and display it owns
#[derive(Debug)]
pub struct Processor<I = NoInput, O = Sink> {
    pub registers: Registers,
    pub flags: Flags,
    pub memory: Memory,
    display: Display,
    /// Termination flag. Set by HALT or by a fault
    halted: bool,
    fault: Option<Fault>,
    /// PC was incremented past 0xFF
    pc_overflow: bool,
    interrupt_vector: Byte,
    interrupt_enabled: bool,
    config: Config,
    input: I,
    output: O,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Processor {
    /// Initializes a machine without input and with discarded output
    pub fn new(config: Config) -> Self {
        Self::with_io(config, NoInput, io::sink())
    }
}

impl<I: Input, O: Write> Processor<I, O> {
    /// Initializes a machine reading `IN` from `input` and writing `OUT` to
    /// `output`
    pub fn with_io(config: Config, input: I, output: O) -> Self {
        Self {
            registers: Registers::default(),
            flags: Flags::default(),
            memory: Memory::default(),
            display: Display::default(),
            halted: false,
            fault: None,
            pc_overflow: false,
            interrupt_vector: config.interrupt_vector,
            interrupt_enabled: config.interrupt_enabled,
            config,
            input,
            output,
        }
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    /// The fault that halted the machine, if any
    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn interrupt_vector(&self) -> Byte {
        self.interrupt_vector
    }

    pub fn set_interrupt_vector(&mut self, vector: Byte) {
        self.interrupt_vector = vector;
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupt_enabled
    }

    pub fn set_interrupts_enabled(&mut self, enabled: bool) {
        self.interrupt_enabled = enabled;
    }

    /// Reinitializes registers, flags, memory and display. Input, output and
    /// configuration are kept.
    pub fn reset(&mut self) {
        self.registers = Registers::default();
        self.flags = Flags::default();
        self.memory = Memory::default();
        self.display = Display::default();
        self.halted = false;
        self.fault = None;
        self.pc_overflow = false;
        self.interrupt_vector = self.config.interrupt_vector;
        self.interrupt_enabled = self.config.interrupt_enabled;

        debug!("Reset");
    }

    /// Copies `program` into memory starting at address 0. Returns the number
    /// of bytes that fit.
    pub fn load_program(&mut self, program: &[Byte]) -> usize {
        self.memory.load(program)
    }

    /// Reads the byte at PC and advances PC. Once PC has run past the end of
    /// memory this halts the machine and yields HALT instead. A halted machine
    /// yields HALT without touching PC.
    pub fn fetch(&mut self) -> Byte {
        if self.halted {
            return Mnemonic::HALT.into();
        }

        if self.pc_overflow {
            self.raise(Fault::MemoryOutOfRange);
            return Mnemonic::HALT.into();
        }

        let pc = self.registers.pc;
        let byte = self.memory.read_byte(pc);
        self.advance_pc();

        debug!("Fetched instruction: {:02X} at PC: {}", byte, pc);

        byte
    }

    /// Executes a single instruction byte. Does nothing once the machine is
    /// halted; only [`reset`](Self::reset) makes it run again.
    pub fn execute(&mut self, byte: Byte) -> Result<()> {
        if self.halted {
            trace!("Halted, ignoring {:02X}", byte);
            return Ok(());
        }

        let instruction = match Instruction::decode(byte) {
            Some(instruction) => instruction,
            None => {
                self.raise(Fault::IllegalInstruction(byte));
                self.update_flags();
                return Ok(());
            }
        };

        match instruction {
            Instruction::Load => {
                if let Some(value) = self.read_operand() {
                    self.advance_pc();
                    self.registers.a = value;
                }

                debug!("LOAD: A = {:02X}", self.registers.a);
            }
            Instruction::Store { address } => {
                self.memory.write_byte(address, self.registers.a);

                debug!("STORE: memory[{:X}] = {:02X}", address, self.registers.a);
            }
            Instruction::Add { address } => {
                let value = self.memory.read_byte(address);
                self.registers.a = self.registers.a.wrapping_add(value);

                debug!("ADD {:02X}: A = {:02X}", value, self.registers.a);
            }
            Instruction::Sub { address } => {
                let value = self.memory.read_byte(address);
                self.registers.a = self.registers.a.wrapping_sub(value);

                debug!("SUB {:02X}: A = {:02X}", value, self.registers.a);
            }
            Instruction::And { address } => {
                self.registers.a &= self.memory.read_byte(address);

                debug!("AND: A = {:02X}", self.registers.a);
            }
            Instruction::Or { address } => {
                self.registers.a |= self.memory.read_byte(address);

                debug!("OR: A = {:02X}", self.registers.a);
            }
            Instruction::Xor { address } => {
                self.registers.a ^= self.memory.read_byte(address);

                debug!("XOR: A = {:02X}", self.registers.a);
            }
            Instruction::Not => {
                self.registers.a = !self.registers.a;

                debug!("NOT: A = {:02X}", self.registers.a);
            }
            Instruction::Shl => {
                self.flags.c = self.registers.a & 0x80 != 0;
                self.registers.a <<= 1;

                debug!("SHL: A = {:02X}, C = {}", self.registers.a, self.flags.c);
            }
            Instruction::Shr => {
                self.flags.c = self.registers.a & 0x01 != 0;
                self.registers.a >>= 1;

                debug!("SHR: A = {:02X}, C = {}", self.registers.a, self.flags.c);
            }
            Instruction::Jump(condition) => {
                let taken = match condition {
                    Condition::Always => true,
                    Condition::Zero => self.flags.z,
                    Condition::NotZero => !self.flags.z,
                };

                if taken {
                    if let Some(offset) = self.read_operand() {
                        // the offset is relative to the offset byte itself
                        let target = self.registers.pc.wrapping_add(offset);
                        self.jump_to(target);

                        debug!("{}: PC = {:02X}", instruction, target);
                    }
                } else {
                    self.advance_pc();

                    debug!("{}: not taken", instruction);
                }
            }
            Instruction::Call { page } => {
                if let Some(low) = self.read_operand() {
                    // only the low 8 bits of the 12-bit target address memory
                    let target = ((Word::from(page) << 8 | Word::from(low)) & 0xFF) as Byte;
                    let ret = self.registers.pc.wrapping_add(1);
                    if self.push(ret) {
                        self.jump_to(target);

                        debug!("CALL: pushed {:02X}, PC = {:02X}", ret, target);
                    }
                }
            }
            Instruction::Ret => {
                if let Some(target) = self.pop() {
                    self.jump_to(target);

                    debug!("RET: PC = {:02X}", target);
                }
            }
            Instruction::Halt => {
                self.halted = true; // set termination flag

                debug!("HALT");
            }
            Instruction::In => {
                self.registers.a = self.input.read_char().unwrap_or(0);

                debug!("IN: A = {:02X}", self.registers.a);
            }
            Instruction::Out => {
                let character = char::from(self.registers.a);
                write!(self.output, "{}", character)
                    .and_then(|_| self.output.flush())
                    .wrap_err("Failed to write to the output")?;

                debug!("OUT: {:?}", character);
            }
            Instruction::Disp => {
                self.display.put_char(self.registers.a);

                debug!("DISP: {:02X}, cursor at {:?}", self.registers.a, self.display.cursor());
            }
            Instruction::Curs => {
                self.display.set_cursor(self.registers.a);

                debug!("CURS: cursor at {:?}", self.display.cursor());
            }
            Instruction::Clr => {
                self.display.clear();

                debug!("CLR");
            }
            Instruction::Gmode => {
                let mode = if self.registers.a != 0 {
                    DisplayMode::Graphics
                } else {
                    DisplayMode::Text
                };
                self.display.set_mode(mode);

                debug!("GMODE: {:?}", mode);
            }
            Instruction::Gpix => {
                // y only reaches 0-7 since A has 8 bits
                let x = (self.registers.a & 0x1F) as usize;
                let y = ((self.registers.a >> 5) & 0x1F) as usize;
                self.display.set_pixel(x, y);

                debug!("GPIX: ({}, {})", x, y);
            }
            Instruction::Scroll => {
                self.display.scroll(self.registers.a);

                debug!("SCROLL: offset {}", self.display.scroll_offset());
            }
        }

        self.update_flags();

        Ok(())
    }

    /// Runs one fetch-execute step. Returns `false` without doing anything
    /// if the machine is halted.
    pub fn step(&mut self) -> Result<bool> {
        if self.halted {
            return Ok(false);
        }

        let byte = self.fetch();
        self.execute(byte)?;

        Ok(true)
    }

    /// Runs until the machine halts or the configured instruction limit is
    /// reached. Returns the number of executed instructions.
    pub fn run(&mut self) -> Result<usize> {
        let mut count = 0;

        while !self.halted {
            if count >= self.config.instruction_limit {
                warn!("Execution limit of {} instructions reached.", count);
                return Ok(count);
            }

            self.step()?;
            count += 1;

            if let Some(delay) = self.config.delay {
                thread::sleep(delay);
            }
        }

        info!("Program halted after executing {} instructions.", count);

        Ok(count)
    }

    /// Pushes PC and jumps to the address stored at the interrupt vector.
    /// Returns `false` if the machine is halted, interrupts are disabled, PC
    /// has run past the end of memory, or the stack is full. The last two
    /// halt the machine.
    pub fn interrupt(&mut self) -> bool {
        if self.halted || !self.interrupt_enabled {
            return false;
        }

        if self.pc_overflow {
            self.raise(Fault::MemoryOutOfRange);
            return false;
        }

        // read before pushing: the default vector is the first stack cell
        let target = self.memory.read_byte(self.interrupt_vector);
        if !self.push(self.registers.pc) {
            return false;
        }

        self.jump_to(target);

        debug!("Interrupt: PC = {:02X}", target);

        true
    }

    /// Pushes `value` onto the stack. A full stack halts the machine and
    /// leaves memory untouched.
    pub fn push(&mut self, value: Byte) -> bool {
        if self.registers.sp == 0 {
            self.raise(Fault::StackOverflow);
            return false;
        }

        self.registers.sp -= 1;
        self.memory.write_byte(self.registers.sp, value);

        trace!("Pushed {:02X} to stack at SP: {:02X}", value, self.registers.sp);

        true
    }

    /// Pops the top of the stack. An empty stack halts the machine.
    pub fn pop(&mut self) -> Option<Byte> {
        if self.registers.sp == STACK_TOP {
            self.raise(Fault::StackUnderflow);
            return None;
        }

        let value = self.memory.read_byte(self.registers.sp);
        self.registers.sp += 1;

        trace!("Popped {:02X} from stack at SP: {:02X}", value, self.registers.sp - 1);

        Some(value)
    }

    fn raise(&mut self, fault: Fault) {
        warn!("{}. Halting.", fault);

        self.halted = true;
        self.fault = Some(fault);
    }

    fn update_flags(&mut self) {
        self.flags.z = self.registers.a == 0;
        self.flags.n = self.registers.a & 0x80 != 0;
    }

    fn advance_pc(&mut self) {
        if self.pc_overflow {
            return;
        }

        match self.registers.pc.checked_add(1) {
            Some(pc) => self.registers.pc = pc,
            None => {
                self.registers.pc = 0;
                self.pc_overflow = true;
            }
        }
    }

    fn jump_to(&mut self, target: Byte) {
        self.registers.pc = target;
        self.pc_overflow = false;
    }

    /// Reads the operand byte at PC without advancing
    fn read_operand(&mut self) -> Option<Byte> {
        if self.pc_overflow {
            self.raise(Fault::MemoryOutOfRange);
            return None;
        }

        Some(self.memory.read_byte(self.registers.pc))
    }
}
