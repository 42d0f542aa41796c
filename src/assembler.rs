//! Two-pass assembler.
//!
//! ```text
//! %macro SET addr value   ; macro with two parameters
//!     LOAD value
//!     STORE addr
//! %endmacro
//!
//!     SET 0, 1
//!     LOAD 3
//! loop:
//!     SUB 0
//!     JNZ loop
//!     HALT
//! ```
//!
//! Labels resolve to byte addresses: the first pass expands macros and sizes
//! every instruction, so a label always names the address of the byte that
//! follows it, no matter how many two-byte instructions precede it.

use std::collections::HashMap;

use log::*;

use crate::instruction::{Mnemonic, OperandKind};
use crate::memory::Byte;

pub mod error;
mod macros;

pub use error::{AssemblyError, AssemblyErrorKind, Result};
use macros::Macro;

/// Deepest allowed chain of macros calling macros
pub const MAX_MACRO_DEPTH: usize = 16;

macro_rules! parse_number {
    ( $ty:ty: $s:expr ) => {{
        let token: &str = $s;

        let (radix, offset) = match token.as_bytes() {
            [b'0', b'b', ..] => (2, 2),
            [b'0', b'o', ..] => (8, 2),
            [b'0', b'x', ..] => (16, 2),
            _ => (10, 0),
        };

        <$ty>::from_str_radix(&token[offset..], radix).map_err(|_| radix)
    }};
}

/// A comment-free, tokenized source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub tokens: Vec<String>,
    pub line_nr: usize,
}

impl Line {
    fn parse(text: &str, line_nr: usize) -> Option<Self> {
        let tokens: Vec<String> = strip_comment(text)
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(String::from)
            .collect();

        if tokens.is_empty() {
            None
        } else {
            Some(Self { tokens, line_nr })
        }
    }
}

/// An instruction with its address, waiting for its operand to be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
struct Statement {
    mnemonic: Mnemonic,
    operand: Option<String>,
    address: usize,
    line_nr: usize,
}

/// Assembles `source` into bytes ready for
/// [`Processor::load_program`](crate::Processor::load_program)
pub fn assemble(source: &str) -> Result<Vec<Byte>> {
    Assembler::new().assemble(source)
}

/// Label and macro tables of one compilation
#[derive(Debug, Default)]
pub struct Assembler {
    macros: HashMap<String, Macro>,
    labels: HashMap<String, usize>,
    statements: Vec<Statement>,
    /// Address of the next instruction
    address: usize,
    /// Number of macro expansions so far
    expansions: usize,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes `self` and assembles `source`.
    ///
    /// Operands must fit their encoding: a direct address above 15 (as in
    /// `SUB 0x1F`) is rejected rather than masked to its low nibble, so
    /// programs that relied on masking do not assemble.
    ///
    /// # Errors
    ///
    /// Fails on the first error. No bytes are returned in that case.
    pub fn assemble(mut self, source: &str) -> Result<Vec<Byte>> {
        let result = self.collect(source).and_then(|_| self.encode());

        match &result {
            Ok(bytes) => info!(
                "Assembled {} bytes ({} labels, {} macros)",
                bytes.len(),
                self.labels.len(),
                self.macros.len()
            ),
            Err(err) => error!("{}", err),
        }

        result
    }

    /// First pass: records macro definitions, expands macro calls, and
    /// assigns every label the address of the instruction that follows it.
    fn collect(&mut self, source: &str) -> Result<()> {
        let lines = self.collect_macros(source)?;

        for line in lines {
            self.push_line(line, 0)?;
        }

        Ok(())
    }

    /// Removes `%macro` blocks from `source`, storing them in the macro table,
    /// and returns the remaining lines. Macros may be called before the line
    /// that defines them.
    fn collect_macros(&mut self, source: &str) -> Result<Vec<Line>> {
        let mut lines = Vec::new();
        let mut iter = source
            .lines()
            .enumerate()
            .filter_map(|(i, text)| Line::parse(text, i + 1));

        while let Some(line) = iter.next() {
            if line.tokens[0] == "%macro" {
                let header = line;
                let mut body = Vec::new();
                let mut terminated = false;

                for line in &mut iter {
                    if line.tokens[0] == "%endmacro" {
                        terminated = true;
                        break;
                    }

                    if line.tokens[0] == "%macro" {
                        return Err(AssemblyError::new(
                            AssemblyErrorKind::InvalidMacro,
                            "macros cannot be defined inside a macro",
                            line.line_nr,
                        ));
                    }

                    body.push(line);
                }

                if !terminated {
                    return Err(AssemblyError::new(
                        AssemblyErrorKind::UnterminatedMacro,
                        "no `%endmacro` before end of input",
                        header.line_nr,
                    ));
                }

                self.define_macro(header, body)?;
            } else if line.tokens[0].starts_with('%') {
                return Err(AssemblyError::new(
                    AssemblyErrorKind::InvalidDirective,
                    format!("unknown directive `{}`", line.tokens[0]),
                    line.line_nr,
                ));
            } else {
                lines.push(line);
            }
        }

        Ok(lines)
    }

    fn define_macro(&mut self, header: Line, body: Vec<Line>) -> Result<()> {
        let line_nr = header.line_nr;
        let mut tokens = header.tokens.into_iter().skip(1);

        let name = tokens.next().ok_or_else(|| {
            AssemblyError::new(
                AssemblyErrorKind::InvalidMacro,
                "a macro needs a name",
                line_nr,
            )
        })?;

        if !is_identifier(&name) || Mnemonic::from_name(&name).is_some() {
            return Err(AssemblyError::new(
                AssemblyErrorKind::InvalidMacro,
                format!("`{}` cannot be used as a macro name", name),
                line_nr,
            ));
        }

        if self.macros.contains_key(&name) {
            return Err(AssemblyError::new(
                AssemblyErrorKind::InvalidMacro,
                format!("macro `{}` is already defined", name),
                line_nr,
            ));
        }

        let params: Vec<String> = tokens.collect();
        for (i, param) in params.iter().enumerate() {
            if params[..i].contains(param) {
                return Err(AssemblyError::new(
                    AssemblyErrorKind::InvalidMacro,
                    format!("parameter `{}` appears more than once", param),
                    line_nr,
                ));
            }
        }

        debug!("[{}] Found macro `{}` {:?}", line_nr, name, params);

        self.macros.insert(
            name.clone(),
            Macro {
                name,
                params,
                body,
            },
        );

        Ok(())
    }

    /// Handles one line of the first pass: a label, a macro call or an
    /// instruction. A label may share its line with what follows it.
    fn push_line(&mut self, mut line: Line, depth: usize) -> Result<()> {
        if let Some(label) = line.tokens[0].strip_suffix(':') {
            let label = label.to_string();
            self.define_label(label, line.line_nr)?;

            line.tokens.remove(0);
            if line.tokens.is_empty() {
                return Ok(());
            }
        }

        let name = line.tokens[0].as_str();

        if let Some(mac) = self.macros.get(name) {
            if depth >= MAX_MACRO_DEPTH {
                return Err(AssemblyError::new(
                    AssemblyErrorKind::MacroRecursion,
                    format!("while expanding `{}`", name),
                    line.line_nr,
                ));
            }

            let expanded = mac.expand(&line.tokens[1..], self.expansions, line.line_nr)?;
            self.expansions += 1;

            debug!(
                "[{}] Expanded macro `{}` into {} line(s)",
                line.line_nr,
                name,
                expanded.len()
            );

            for line in expanded {
                self.push_line(line, depth + 1)?;
            }

            return Ok(());
        }

        let mnemonic = Mnemonic::from_name(name).ok_or_else(|| {
            AssemblyError::new(
                AssemblyErrorKind::UnknownMnemonic,
                format!("no instruction or macro named `{}`", name),
                line.line_nr,
            )
        })?;

        let mut operands = line.tokens.into_iter().skip(1);
        let operand = operands.next();

        match (mnemonic.operand_kind(), &operand) {
            (OperandKind::Implied, Some(token)) => {
                return Err(AssemblyError::new(
                    AssemblyErrorKind::UnexpectedOperand,
                    format!("`{}` takes no operand, found `{}`", mnemonic, token),
                    line.line_nr,
                ))
            }
            (OperandKind::Implied, None) => {}
            (_, None) => {
                return Err(AssemblyError::new(
                    AssemblyErrorKind::MissingOperand,
                    format!("`{}` needs an operand", mnemonic),
                    line.line_nr,
                ))
            }
            (_, Some(_)) => {
                if let Some(extra) = operands.next() {
                    return Err(AssemblyError::new(
                        AssemblyErrorKind::UnexpectedOperand,
                        format!("`{}` takes one operand, found `{}`", mnemonic, extra),
                        line.line_nr,
                    ));
                }
            }
        }

        trace!("[{}] {:02X}: {} {:?}", line.line_nr, self.address, mnemonic, operand);

        self.statements.push(Statement {
            mnemonic,
            operand,
            address: self.address,
            line_nr: line.line_nr,
        });
        self.address += mnemonic.size();

        Ok(())
    }

    fn define_label(&mut self, label: String, line_nr: usize) -> Result<()> {
        if !is_label(&label) {
            return Err(AssemblyError::new(
                AssemblyErrorKind::InvalidLabel,
                format!("`{}` is not a valid label name", label),
                line_nr,
            ));
        }

        if self.labels.contains_key(&label) {
            return Err(AssemblyError::new(
                AssemblyErrorKind::DuplicateLabel,
                format!("`{}`", label),
                line_nr,
            ));
        }

        debug!("[{}] Label `{}` at 0x{:02x}", line_nr, label, self.address);

        self.labels.insert(label, self.address);

        Ok(())
    }

    /// Second pass: encodes every statement now that all labels are known
    fn encode(&self) -> Result<Vec<Byte>> {
        let mut bytes = Vec::with_capacity(self.address);

        for statement in &self.statements {
            let mnemonic = statement.mnemonic;

            match mnemonic.operand_kind() {
                OperandKind::Implied => bytes.push(mnemonic.encode(0)),
                OperandKind::Immediate => {
                    let value = self.resolve(statement, 0xFF)?;
                    bytes.push(mnemonic.into());
                    bytes.push(value as Byte);
                }
                OperandKind::Direct => {
                    let address = self.resolve(statement, 0x0F)?;
                    bytes.push(mnemonic.encode(address as Byte));
                }
                OperandKind::Relative => {
                    let target = self.resolve(statement, 0xFF)?;
                    // relative to the offset byte, where PC points during execution
                    let origin = (statement.address + 1) as Byte;
                    bytes.push(mnemonic.into());
                    bytes.push((target as Byte).wrapping_sub(origin));
                }
                OperandKind::Absolute => {
                    let target = self.resolve(statement, 0xFFF)?;
                    bytes.push(mnemonic.encode((target >> 8) as Byte));
                    bytes.push((target & 0xFF) as Byte);
                }
            }
        }

        Ok(bytes)
    }

    /// Resolves the operand of `statement` to a label address or a number no
    /// larger than `max`
    fn resolve(&self, statement: &Statement, max: u16) -> Result<u16> {
        let token = statement.operand.as_deref().unwrap_or_default();

        let value = match self.labels.get(token) {
            Some(&address) => address,
            None if is_identifier(token) => {
                return Err(AssemblyError::new(
                    AssemblyErrorKind::UndefinedLabel,
                    format!("`{}`", token),
                    statement.line_nr,
                ))
            }
            None => parse_number!(u16: token).map_err(|radix| {
                AssemblyError::new(
                    AssemblyErrorKind::InvalidNumber { radix },
                    format!("`{}`", token),
                    statement.line_nr,
                )
            })? as usize,
        };

        if value > max as usize {
            return Err(AssemblyError::new(
                AssemblyErrorKind::OperandOutOfRange { max },
                format!("`{}` of `{}` is 0x{:x}", token, statement.mnemonic, value),
                statement.line_nr,
            ));
        }

        Ok(value as u16)
    }
}

fn strip_comment(text: &str) -> &str {
    match text.find(';') {
        Some(i) => &text[..i],
        None => text,
    }
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        }
        _ => false,
    }
}

/// Identifier, optionally with the suffix macro expansion gives local labels
fn is_label(token: &str) -> bool {
    match token.find('@') {
        Some(i) => is_identifier(&token[..i]),
        None => is_identifier(token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::Processor;
    use color_eyre::eyre::Result;

    fn error_kind(source: &str) -> AssemblyErrorKind {
        assemble(source).unwrap_err().kind()
    }

    #[test]
    fn assemble_load_halt() -> Result<()> {
        assert_eq!(assemble("LOAD 0x05\nHALT")?, vec![0x00, 0x05, 0xF0]);

        Ok(())
    }

    #[test]
    fn assemble_every_operand_kind() -> Result<()> {
        let source = r#"
            LOAD 0b101      ; immediate
            STORE 0xF       ; direct
            NOT
            JMP 0x10
            CALL 0x123
            SCROLL
        "#;

        assert_eq!(
            assemble(source)?,
            vec![0x00, 0x05, 0x1F, 0x70, 0xA0, 0x0B, 0xD1, 0x23, 0xF8]
        );

        Ok(())
    }

    #[test]
    fn assemble_comments_commas_blank_lines() -> Result<()> {
        let source = "; header\n\n   ADD 3 ; add\n\tOR,0o7\n";
        assert_eq!(assemble(source)?, vec![0x23, 0x57]);

        Ok(())
    }

    #[test]
    fn labels_are_byte_addresses() -> Result<()> {
        let source = r#"
            start:
                LOAD 1
                JMP end
                NOT
            end: HALT
        "#;

        // end is at byte 5, the offset byte of JMP at byte 3
        assert_eq!(assemble(source)?, vec![0x00, 0x01, 0xA0, 0x02, 0x70, 0xF0]);

        Ok(())
    }

    #[test]
    fn backward_jump() -> Result<()> {
        let source = "LOAD 1\ntop: NOT\nJNZ top";
        assert_eq!(assemble(source)?, vec![0x00, 0x01, 0x70, 0xC0, 0xFE]);

        Ok(())
    }

    #[test]
    fn label_as_operand_value() -> Result<()> {
        let source = "LOAD data\nSTORE data\ndata: HALT";
        assert_eq!(assemble(source)?, vec![0x00, 0x03, 0x13, 0xF0]);

        Ok(())
    }

    #[test]
    fn call_subroutine() -> Result<()> {
        let source = "CALL sub\nHALT\nsub: RET";
        let program = assemble(source)?;
        assert_eq!(program, vec![0xD0, 0x03, 0xF0, 0xE0]);

        let mut cpu = Processor::default();
        cpu.load_program(&program);
        assert_eq!(cpu.run()?, 3);
        assert!(cpu.halted());
        assert_eq!(cpu.fault(), None);

        Ok(())
    }

    #[test]
    fn run_countdown() -> Result<()> {
        let source = r#"
                LOAD 1
                STORE 0     ; decrement
                LOAD 3
            loop:
                STORE 1     ; counter
                SUB 0
                JNZ loop
                HALT
        "#;

        let mut cpu = Processor::default();
        cpu.load_program(&assemble(source)?);
        let count = cpu.run()?;

        assert_eq!(count, 13);
        assert_eq!(cpu.registers.a, 0);
        assert!(cpu.flags.z);
        assert_eq!(cpu.memory.read_byte(1), 1);

        Ok(())
    }

    #[test]
    fn parameterless_macro_matches_inlining() -> Result<()> {
        let with_macro = r#"
            %macro QUAD
                SHL
                SHL
            %endmacro
                LOAD 1
                QUAD
            done:
                JZ done
        "#;
        let inlined = r#"
                LOAD 1
                SHL
                SHL
            done:
                JZ done
        "#;

        assert_eq!(assemble(with_macro)?, assemble(inlined)?);

        Ok(())
    }

    #[test]
    fn macro_with_params() -> Result<()> {
        let source = r#"
            %macro SET addr value
                LOAD value
                STORE addr
            %endmacro
            SET 3, 0x41
        "#;

        assert_eq!(assemble(source)?, vec![0x00, 0x41, 0x13]);

        Ok(())
    }

    #[test]
    fn macro_used_before_definition() -> Result<()> {
        let source = "PRINT\n%macro PRINT\nOUT\n%endmacro";
        assert_eq!(assemble(source)?, vec![0xF2]);

        Ok(())
    }

    #[test]
    fn macro_local_labels() -> Result<()> {
        let source = r#"
            %macro SPIN
            top: SUB 0
                JNZ top
            %endmacro
            SPIN
            SPIN
        "#;

        assert_eq!(
            assemble(source)?,
            vec![0x30, 0xC0, 0xFE, 0x30, 0xC0, 0xFE]
        );

        Ok(())
    }

    #[test]
    fn nested_macros() -> Result<()> {
        let source = r#"
            %macro PUT c
                LOAD c
                DISP
            %endmacro
            %macro HI
                PUT 0x48
                PUT 0x49
            %endmacro
            HI
            HALT
        "#;

        let mut cpu = Processor::default();
        cpu.load_program(&assemble(source)?);
        cpu.run()?;

        assert_eq!(&cpu.display().text()[0][..2], b"HI");

        Ok(())
    }

    #[test]
    fn recursive_macro_is_rejected() {
        let source = "%macro LOOP\nLOOP\n%endmacro\nLOOP";
        assert_eq!(error_kind(source), AssemblyErrorKind::MacroRecursion);
    }

    #[test]
    fn unknown_mnemonic() {
        let err = assemble("LOAD 1\n\nFLY 2").unwrap_err();
        assert_eq!(err.kind(), AssemblyErrorKind::UnknownMnemonic);
        assert_eq!(err.line_nr(), 3);

        // mnemonics are case-sensitive
        assert_eq!(error_kind("halt"), AssemblyErrorKind::UnknownMnemonic);
    }

    #[test]
    fn undefined_label() {
        assert_eq!(error_kind("JMP nowhere"), AssemblyErrorKind::UndefinedLabel);
    }

    #[test]
    fn duplicate_label() {
        assert_eq!(
            error_kind("a: NOT\na: NOT"),
            AssemblyErrorKind::DuplicateLabel
        );
    }

    #[test]
    fn invalid_label() {
        assert_eq!(error_kind("1abc: NOT"), AssemblyErrorKind::InvalidLabel);
    }

    #[test]
    fn macro_arity_mismatch() {
        let source = "%macro SET addr value\nLOAD value\nSTORE addr\n%endmacro\nSET 1";
        assert_eq!(
            error_kind(source),
            AssemblyErrorKind::MacroArity {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn operand_errors() {
        assert_eq!(error_kind("LOAD"), AssemblyErrorKind::MissingOperand);
        assert_eq!(error_kind("NOT 1"), AssemblyErrorKind::UnexpectedOperand);
        assert_eq!(error_kind("ADD 1 2"), AssemblyErrorKind::UnexpectedOperand);
        assert_eq!(
            error_kind("STORE 16"),
            AssemblyErrorKind::OperandOutOfRange { max: 0x0F }
        );
        assert_eq!(
            error_kind("LOAD 256"),
            AssemblyErrorKind::OperandOutOfRange { max: 0xFF }
        );
        assert_eq!(
            error_kind("LOAD 0xZZ"),
            AssemblyErrorKind::InvalidNumber { radix: 16 }
        );
    }

    #[test]
    fn macro_definition_errors() {
        assert_eq!(
            error_kind("%macro M\nNOT"),
            AssemblyErrorKind::UnterminatedMacro
        );
        assert_eq!(error_kind("%macro"), AssemblyErrorKind::UnterminatedMacro);
        assert_eq!(
            error_kind("%macro\n%endmacro"),
            AssemblyErrorKind::InvalidMacro
        );
        assert_eq!(
            error_kind("%macro LOAD\n%endmacro"),
            AssemblyErrorKind::InvalidMacro
        );
        assert_eq!(
            error_kind("%macro M a a\n%endmacro"),
            AssemblyErrorKind::InvalidMacro
        );
        assert_eq!(error_kind("%endmacro"), AssemblyErrorKind::InvalidDirective);
    }

    #[test]
    fn unterminated_macro_points_at_header() {
        let err = assemble("NOT
%macro M
NOT
HALT").unwrap_err();
        assert_eq!(err.kind(), AssemblyErrorKind::UnterminatedMacro);
        assert_eq!(err.line_nr(), 2);
        assert_eq!(
            err.to_string(),
            "error [ln: 2]: macro is missing `%endmacro` - no `%endmacro` before end of input"
        );
    }
}
