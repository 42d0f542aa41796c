use std::borrow::Cow;
use std::error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyErrorKind {
    UnknownMnemonic,
    UndefinedLabel,
    DuplicateLabel,
    InvalidLabel,
    InvalidNumber { radix: u32 },
    MissingOperand,
    UnexpectedOperand,
    OperandOutOfRange { max: u16 },
    MacroArity { expected: usize, found: usize },
    InvalidMacro,
    UnterminatedMacro,
    MacroRecursion,
    InvalidDirective,
}

impl fmt::Display for AssemblyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyErrorKind::UnknownMnemonic => f.write_str("unknown mnemonic"),
            AssemblyErrorKind::UndefinedLabel => f.write_str("undefined label"),
            AssemblyErrorKind::DuplicateLabel => f.write_str("label defined more than once"),
            AssemblyErrorKind::InvalidLabel => f.write_str("invalid label"),
            AssemblyErrorKind::InvalidNumber { radix } => {
                write!(f, "failed to parse number with radix `{}`", radix)
            }
            AssemblyErrorKind::MissingOperand => f.write_str("missing operand"),
            AssemblyErrorKind::UnexpectedOperand => f.write_str("unexpected operand"),
            AssemblyErrorKind::OperandOutOfRange { max } => {
                write!(f, "operand out of range, expected at most `0x{:x}`", max)
            }
            AssemblyErrorKind::MacroArity { expected, found } => write!(
                f,
                "macro expects {} argument(s) but was given {}",
                expected, found
            ),
            AssemblyErrorKind::InvalidMacro => f.write_str("invalid macro definition"),
            AssemblyErrorKind::UnterminatedMacro => f.write_str("macro is missing `%endmacro`"),
            AssemblyErrorKind::MacroRecursion => f.write_str("macro expansion nested too deeply"),
            AssemblyErrorKind::InvalidDirective => f.write_str("invalid directive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyError {
    kind: AssemblyErrorKind,
    context: Option<Cow<'static, str>>,
    line_nr: usize,
}

impl AssemblyError {
    pub(crate) fn new<C, S>(kind: AssemblyErrorKind, context: C, line_nr: usize) -> Self
    where
        C: Into<Option<S>>,
        S: Into<Cow<'static, str>>,
    {
        Self {
            kind,
            context: context.into().map(|inner| inner.into()),
            line_nr,
        }
    }

    pub fn kind(&self) -> AssemblyErrorKind {
        self.kind
    }

    /// 1-based source line the error was found on
    pub fn line_nr(&self) -> usize {
        self.line_nr
    }
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(
                f,
                "error [ln: {}]: {} - {}",
                self.line_nr, self.kind, context
            )
        } else {
            write!(f, "error [ln: {}]: {}", self.line_nr, self.kind)
        }
    }
}

impl error::Error for AssemblyError {}

pub type Result<T, E = AssemblyError> = std::result::Result<T, E>;
