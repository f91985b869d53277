//! Assembler - Two-pass translation from source text to an object
//!
//! ## Source Surface
//!
//! ```text
//! %entry: main          ; entry-point directive
//!
//! main:                 ; label definition
//!     set r1 42         ; mnemonic + operands
//!     adi r1 r1 1       ; pseudo-instruction (expands before layout)
//!     bif r1 done 43    ; branch-if pseudo
//!     jmi main
//! done:
//!     hlt
//!
//! message:
//!     %d "hi\n" 0       ; data: strings raw, numbers as 32-bit words
//! ```
//!
//! Pass 1 lexes and parses the source into an item stream, expanding
//! pseudo-instructions inline so the symbol table sees their true
//! size. Pass 2 assigns addresses, substitutes label references
//! (truncated to the destination field width), encodes, and emits the
//! object.
//!
//! Data placement: `%d` blocks are emitted into the code section at
//! their source position, so a single address space starting at 0
//! covers both instructions and data; the object's data section is
//! left empty. `%section` is accepted (`code` or `data`) but is
//! declarative only.
//!
//! Pseudo-instruction expansions clobber the assembler temporaries
//! `at` (`adi`, `sbi`) and `ad` (`bif`); user code holding values in
//! those registers across a pseudo must save them first.

mod item;
mod lexer;
mod symbols;

pub use item::{Item, Operand};
pub use lexer::{Token, TokenKind};
pub use symbols::SymbolTable;

use std::fmt;

use thiserror::Error;

use crate::isa::{Opcode, Reg};
use crate::object::ObjectFile;
use crate::codec;

/// Classification of assembly failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    /// Tokenization or grammar failure
    Parse,
    /// Unknown mnemonic, or wrong operand count/type
    InvalidInstruction,
    /// Invalid register name in a register slot
    InvalidRegister,
    /// Malformed or out-of-range immediate
    InvalidImmediate,
    /// Reference to a label that is never defined
    UndefinedSymbol,
    /// Label defined twice
    DuplicateLabel,
    /// Unknown or malformed directive
    InvalidDirective,
}

impl fmt::Display for AsmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parse => "parse error",
            Self::InvalidInstruction => "invalid instruction",
            Self::InvalidRegister => "invalid register",
            Self::InvalidImmediate => "invalid immediate",
            Self::UndefinedSymbol => "undefined symbol",
            Self::DuplicateLabel => "duplicate label",
            Self::InvalidDirective => "invalid directive",
        })
    }
}

/// An assembly failure with its source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at line {line}, column {col}: {message}")]
pub struct AsmError {
    pub kind: AsmErrorKind,
    pub line: usize,
    pub col: usize,
    pub message: String,
}

impl AsmError {
    pub fn new(
        kind: AsmErrorKind,
        line: usize,
        col: usize,
        message: impl Into<String>,
    ) -> Self {
        Self { kind, line, col, message: message.into() }
    }
}

/// Two-pass assembler.
pub struct Assembler {
    items: Vec<Item>,
    entry: Option<EntryPoint>,
    section: String,
}

struct EntryPoint {
    label: String,
    line: usize,
    col: usize,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            entry: None,
            section: "code".to_string(),
        }
    }

    /// Assemble source text into an object.
    pub fn assemble(&mut self, source: &str) -> Result<ObjectFile, AsmError> {
        self.items.clear();
        self.entry = None;
        self.section = "code".to_string();

        let tokens = lexer::tokenize(source)?;
        self.parse(&tokens)?;

        let table = SymbolTable::build(&self.items)?;
        let code = self.emit(&table)?;

        let entry_offset = match &self.entry {
            Some(entry) => table.resolve(&entry.label).ok_or_else(|| {
                AsmError::new(
                    AsmErrorKind::UndefinedSymbol,
                    entry.line,
                    entry.col,
                    format!("undefined entry label '{}'", entry.label),
                )
            })?,
            None => 0,
        };

        Ok(ObjectFile { entry_offset, code, data: Vec::new() })
    }

    /// The item stream from the most recent `assemble` call.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// The section name in effect when parsing finished (`%section`
    /// is declarative; items are not relocated by it).
    pub fn current_section(&self) -> &str {
        &self.section
    }

    // =========================================================================
    // Pass 1: parsing
    // =========================================================================

    fn parse(&mut self, tokens: &[Token]) -> Result<(), AsmError> {
        let mut cursor = 0usize;

        while let Some(token) = tokens.get(cursor) {
            match &token.kind {
                TokenKind::Newline => {
                    cursor += 1;
                }
                TokenKind::Directive(name) => {
                    cursor = self.parse_directive(name, token, tokens, cursor + 1)?;
                }
                TokenKind::Ident(name) => {
                    if matches!(tokens.get(cursor + 1).map(|t| &t.kind), Some(TokenKind::Colon)) {
                        self.items.push(Item::Label {
                            name: name.clone(),
                            line: token.line,
                            col: token.col,
                        });
                        cursor += 2;
                    } else {
                        cursor = self.parse_instruction(name, token, tokens, cursor + 1)?;
                    }
                }
                _ => {
                    return Err(AsmError::new(
                        AsmErrorKind::Parse,
                        token.line,
                        token.col,
                        "expected label, directive or instruction",
                    ));
                }
            }
        }

        Ok(())
    }

    fn parse_directive(
        &mut self,
        name: &str,
        at: &Token,
        tokens: &[Token],
        mut cursor: usize,
    ) -> Result<usize, AsmError> {
        match name {
            "entry" => {
                // %entry: label
                if !matches!(tokens.get(cursor).map(|t| &t.kind), Some(TokenKind::Colon)) {
                    return Err(AsmError::new(
                        AsmErrorKind::InvalidDirective,
                        at.line,
                        at.col,
                        "expected ':' after %entry",
                    ));
                }
                cursor += 1;
                let Some(Token { kind: TokenKind::Ident(label), line, col }) = tokens.get(cursor)
                else {
                    return Err(AsmError::new(
                        AsmErrorKind::InvalidDirective,
                        at.line,
                        at.col,
                        "expected label name after %entry:",
                    ));
                };
                self.entry = Some(EntryPoint {
                    label: label.clone(),
                    line: *line,
                    col: *col,
                });
                Ok(cursor + 1)
            }
            "section" => {
                let Some(Token { kind: TokenKind::Ident(section), .. }) = tokens.get(cursor)
                else {
                    return Err(AsmError::new(
                        AsmErrorKind::InvalidDirective,
                        at.line,
                        at.col,
                        "expected section name after %section",
                    ));
                };
                if section != "code" && section != "data" {
                    return Err(AsmError::new(
                        AsmErrorKind::InvalidDirective,
                        at.line,
                        at.col,
                        format!("unknown section '{}' (expected 'code' or 'data')", section),
                    ));
                }
                self.section = section.clone();
                Ok(cursor + 1)
            }
            "d" => {
                let mut bytes = Vec::new();
                while let Some(token) = tokens.get(cursor) {
                    match &token.kind {
                        TokenKind::Newline => break,
                        TokenKind::Str(literal) => bytes.extend_from_slice(literal),
                        TokenKind::Number(value) => bytes.extend_from_slice(&value.to_le_bytes()),
                        _ => {
                            return Err(AsmError::new(
                                AsmErrorKind::Parse,
                                token.line,
                                token.col,
                                "expected string or number in %d directive",
                            ));
                        }
                    }
                    cursor += 1;
                }
                self.items.push(Item::Data(bytes));
                Ok(cursor)
            }
            other => Err(AsmError::new(
                AsmErrorKind::InvalidDirective,
                at.line,
                at.col,
                format!("unknown directive %{}", other),
            )),
        }
    }

    fn parse_instruction(
        &mut self,
        mnemonic: &str,
        at: &Token,
        tokens: &[Token],
        mut cursor: usize,
    ) -> Result<usize, AsmError> {
        let mut operands = Vec::new();
        while let Some(token) = tokens.get(cursor) {
            match &token.kind {
                TokenKind::Newline => break,
                TokenKind::Ident(name) => operands.push(match Reg::parse(name) {
                    Some(reg) => Operand::Reg(reg),
                    None => Operand::Sym(name.clone()),
                }),
                TokenKind::Number(value) => operands.push(Operand::Imm(*value)),
                _ => {
                    return Err(AsmError::new(
                        AsmErrorKind::Parse,
                        token.line,
                        token.col,
                        "expected register, number or label operand",
                    ));
                }
            }
            cursor += 1;
        }

        if item::is_pseudo(mnemonic) {
            if operands.len() != 3 {
                return Err(AsmError::new(
                    AsmErrorKind::InvalidInstruction,
                    at.line,
                    at.col,
                    format!(
                        "pseudo-instruction '{}' expects 3 operands, got {}",
                        mnemonic,
                        operands.len()
                    ),
                ));
            }
            let expansion = item::expand_pseudo(mnemonic, &operands)
                .expect("is_pseudo and expand_pseudo cover the same mnemonics");
            for (op, ops) in expansion {
                self.push_instruction(op, ops, at)?;
            }
        } else {
            let op = Opcode::parse(mnemonic).ok_or_else(|| {
                AsmError::new(
                    AsmErrorKind::InvalidInstruction,
                    at.line,
                    at.col,
                    format!("unknown instruction '{}'", mnemonic),
                )
            })?;
            self.push_instruction(op, operands, at)?;
        }

        Ok(cursor)
    }

    fn push_instruction(
        &mut self,
        op: Opcode,
        operands: Vec<Operand>,
        at: &Token,
    ) -> Result<(), AsmError> {
        item::validate_operands(op, &operands)
            .map_err(|(kind, message)| AsmError::new(kind, at.line, at.col, message))?;

        let symbolic = operands.iter().any(|o| matches!(o, Operand::Sym(_)));
        if symbolic {
            self.items.push(Item::Unresolved {
                op,
                operands,
                line: at.line,
                col: at.col,
            });
        } else {
            let inst = item::build_instruction(op, &operands).ok_or_else(|| {
                AsmError::new(
                    AsmErrorKind::InvalidInstruction,
                    at.line,
                    at.col,
                    format!("malformed operands for '{}'", op.mnemonic()),
                )
            })?;
            self.items.push(Item::Instr(inst));
        }
        Ok(())
    }

    // =========================================================================
    // Pass 2: resolution and encoding
    // =========================================================================

    fn emit(&self, table: &SymbolTable) -> Result<Vec<u8>, AsmError> {
        let mut code = Vec::new();

        for item in &self.items {
            match item {
                Item::Label { .. } => {}
                Item::Instr(inst) => code.extend_from_slice(&codec::encode_bytes(inst)),
                Item::Unresolved { op, operands, line, col } => {
                    let resolved = symbols::resolve_operands(operands, table, *line, *col)?;
                    let inst = item::build_instruction(*op, &resolved).ok_or_else(|| {
                        AsmError::new(
                            AsmErrorKind::InvalidInstruction,
                            *line,
                            *col,
                            format!("malformed operands for '{}'", op.mnemonic()),
                        )
                    })?;
                    code.extend_from_slice(&codec::encode_bytes(&inst));
                }
                Item::Data(bytes) => code.extend_from_slice(bytes),
            }
        }

        Ok(code)
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to assemble source in one call.
pub fn assemble(source: &str) -> Result<ObjectFile, AsmError> {
    Assembler::new().assemble(source)
}
