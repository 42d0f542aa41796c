use std::convert::TryFrom;
use std::fmt;

use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;

use crate::memory::Byte;

/// How an instruction's operand is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand
    Implied,
    /// 8-bit value in the byte after the opcode
    Immediate,
    /// Memory address 0-15 in the low nibble
    Direct,
    /// Signed offset in the byte after the opcode
    Relative,
    /// 12-bit target: high nibble in the low nibble, low byte after the opcode
    Absolute,
}

impl OperandKind {
    /// Number of bytes an instruction with this operand kind occupies
    pub fn size(self) -> usize {
        match self {
            OperandKind::Implied | OperandKind::Direct => 1,
            OperandKind::Immediate | OperandKind::Relative | OperandKind::Absolute => 2,
        }
    }
}

macro_rules! instructions {
    ( $( $( #[doc = $doc:expr] )+ $name:ident = $repr:literal => $kind:ident , )+ ) => {
        /// The instruction set. The discriminant is the first byte of the
        /// encoded instruction with an empty operand nibble.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(TryFromPrimitive, IntoPrimitive)]
        pub enum Mnemonic {
            $(
                $( #[doc = $doc] )+
                $name = $repr,
            )+
        }

        impl Mnemonic {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name) , )+
                }
            }

            pub fn operand_kind(&self) -> OperandKind {
                match self {
                    $( Self::$name => OperandKind::$kind , )+
                }
            }
        }

        impl ::std::fmt::Display for Mnemonic {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $( Self::$name => f.write_str(stringify!($name)) , )+
                }
            }
        }
    }
}

instructions! {
    /// Load an immediate value into A
    /// @param value The value to load
    LOAD = 0x00 => Immediate,
    /// Store A at a direct address
    STORE = 0x10 => Direct,
    /// Add the value at a direct address to A
    ADD = 0x20 => Direct,
    /// Subtract the value at a direct address from A
    SUB = 0x30 => Direct,
    /// Bitwise and A with the value at a direct address
    AND = 0x40 => Direct,
    /// Bitwise or A with the value at a direct address
    OR = 0x50 => Direct,
    /// Bitwise xor A with the value at a direct address
    XOR = 0x60 => Direct,
    /// Invert every bit of A
    NOT = 0x70 => Implied,
    /// Shift A left, bit 7 goes to the carry flag
    SHL = 0x80 => Implied,
    /// Shift A right, bit 0 goes to the carry flag
    SHR = 0x90 => Implied,
    /// Jump by a signed offset
    /// @param target The label or address to jump to
    JMP = 0xA0 => Relative,
    /// Jump by a signed offset if the zero flag is set
    JZ = 0xB0 => Relative,
    /// Jump by a signed offset if the zero flag is clear
    JNZ = 0xC0 => Relative,
    /// Push the return address and jump to an absolute address
    CALL = 0xD0 => Absolute,
    /// Pop the return address
    RET = 0xE0 => Implied,
    /// Stop the execution of the program
    HALT = 0xF0 => Implied,
    /// Read one character into A
    IN = 0xF1 => Implied,
    /// Write A as a character to the output
    OUT = 0xF2 => Implied,
    /// Put A on the text display at the cursor
    DISP = 0xF3 => Implied,
    /// Move the cursor: column in the low nibble, row in bits 4-5
    CURS = 0xF4 => Implied,
    /// Clear the active display
    CLR = 0xF5 => Implied,
    /// Select graphics mode if A is non-zero, text mode otherwise
    GMODE = 0xF6 => Implied,
    /// Set a pixel: x in bits 0-4, y in bits 5-7
    GPIX = 0xF7 => Implied,
    /// Scroll the text display by A rows
    SCROLL = 0xF8 => Implied,
}

impl Mnemonic {
    /// Looks up a mnemonic by its (case-sensitive) name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|mnemonic| mnemonic.name() == name)
    }

    /// Resolves the mnemonic of an instruction byte
    pub fn decode(byte: Byte) -> Option<Self> {
        let key = if byte & 0xF0 == 0xF0 { byte } else { byte & 0xF0 };
        Self::try_from(key).ok()
    }

    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        self.operand_kind().size()
    }

    /// Builds the first byte of the instruction. Only direct and absolute
    /// instructions carry an operand nibble, which is masked to 4 bits.
    pub fn encode(self, nibble: Byte) -> Byte {
        match self.operand_kind() {
            OperandKind::Direct | OperandKind::Absolute => u8::from(self) | (nibble & 0x0F),
            _ => self.into(),
        }
    }
}

/// Branch condition of a relative jump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    Zero,
    NotZero,
}

/// A decoded instruction byte. Operand bytes that follow the opcode (immediates,
/// jump offsets, the low byte of a call target) are read at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Load,
    Store { address: Byte },
    Add { address: Byte },
    Sub { address: Byte },
    And { address: Byte },
    Or { address: Byte },
    Xor { address: Byte },
    Not,
    Shl,
    Shr,
    Jump(Condition),
    /// `page` is the high nibble of the 12-bit call target
    Call { page: Byte },
    Ret,
    Halt,
    In,
    Out,
    Disp,
    Curs,
    Clr,
    Gmode,
    Gpix,
    Scroll,
}

impl Instruction {
    /// Splits `byte` into opcode and operand nibbles. Returns `None` for the
    /// unassigned system bytes `0xF9..=0xFF`.
    pub fn decode(byte: Byte) -> Option<Self> {
        let operand = byte & 0x0F;
        let instruction = match Mnemonic::decode(byte)? {
            Mnemonic::LOAD => Instruction::Load,
            Mnemonic::STORE => Instruction::Store { address: operand },
            Mnemonic::ADD => Instruction::Add { address: operand },
            Mnemonic::SUB => Instruction::Sub { address: operand },
            Mnemonic::AND => Instruction::And { address: operand },
            Mnemonic::OR => Instruction::Or { address: operand },
            Mnemonic::XOR => Instruction::Xor { address: operand },
            Mnemonic::NOT => Instruction::Not,
            Mnemonic::SHL => Instruction::Shl,
            Mnemonic::SHR => Instruction::Shr,
            Mnemonic::JMP => Instruction::Jump(Condition::Always),
            Mnemonic::JZ => Instruction::Jump(Condition::Zero),
            Mnemonic::JNZ => Instruction::Jump(Condition::NotZero),
            Mnemonic::CALL => Instruction::Call { page: operand },
            Mnemonic::RET => Instruction::Ret,
            Mnemonic::HALT => Instruction::Halt,
            Mnemonic::IN => Instruction::In,
            Mnemonic::OUT => Instruction::Out,
            Mnemonic::DISP => Instruction::Disp,
            Mnemonic::CURS => Instruction::Curs,
            Mnemonic::CLR => Instruction::Clr,
            Mnemonic::GMODE => Instruction::Gmode,
            Mnemonic::GPIX => Instruction::Gpix,
            Mnemonic::SCROLL => Instruction::Scroll,
        };
        Some(instruction)
    }

    pub fn mnemonic(&self) -> Mnemonic {
        match self {
            Instruction::Load => Mnemonic::LOAD,
            Instruction::Store { .. } => Mnemonic::STORE,
            Instruction::Add { .. } => Mnemonic::ADD,
            Instruction::Sub { .. } => Mnemonic::SUB,
            Instruction::And { .. } => Mnemonic::AND,
            Instruction::Or { .. } => Mnemonic::OR,
            Instruction::Xor { .. } => Mnemonic::XOR,
            Instruction::Not => Mnemonic::NOT,
            Instruction::Shl => Mnemonic::SHL,
            Instruction::Shr => Mnemonic::SHR,
            Instruction::Jump(Condition::Always) => Mnemonic::JMP,
            Instruction::Jump(Condition::Zero) => Mnemonic::JZ,
            Instruction::Jump(Condition::NotZero) => Mnemonic::JNZ,
            Instruction::Call { .. } => Mnemonic::CALL,
            Instruction::Ret => Mnemonic::RET,
            Instruction::Halt => Mnemonic::HALT,
            Instruction::In => Mnemonic::IN,
            Instruction::Out => Mnemonic::OUT,
            Instruction::Disp => Mnemonic::DISP,
            Instruction::Curs => Mnemonic::CURS,
            Instruction::Clr => Mnemonic::CLR,
            Instruction::Gmode => Mnemonic::GMODE,
            Instruction::Gpix => Mnemonic::GPIX,
            Instruction::Scroll => Mnemonic::SCROLL,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Store { address }
            | Instruction::Add { address }
            | Instruction::Sub { address }
            | Instruction::And { address }
            | Instruction::Or { address }
            | Instruction::Xor { address } => write!(f, "{} {}", self.mnemonic(), address),
            Instruction::Call { page } => write!(f, "{} page {}", self.mnemonic(), page),
            _ => write!(f, "{}", self.mnemonic()),
        }
    }
}
