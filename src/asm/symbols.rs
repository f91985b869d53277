//! Symbol table construction and operand resolution.
//!
//! Addresses are assigned by walking the item stream in source order:
//! each label pins the running offset, each instruction advances it by
//! four bytes, each data block by its exact length. Resolution then
//! substitutes label addresses into immediate slots, truncated to the
//! slot's field width.

use std::collections::HashMap;

use super::item::{Item, Operand};
use super::{AsmError, AsmErrorKind};

/// Label name -> absolute offset in the assembled image.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, u32>,
}

impl SymbolTable {
    /// Walk the item stream and assign an address to every label.
    /// Duplicate labels are rejected.
    pub fn build(items: &[Item]) -> Result<Self, AsmError> {
        let mut symbols = HashMap::new();
        let mut address = 0u32;

        for item in items {
            if let Item::Label { name, line, col } = item {
                if symbols.contains_key(name) {
                    return Err(AsmError::new(
                        AsmErrorKind::DuplicateLabel,
                        *line,
                        *col,
                        format!("duplicate label '{}'", name),
                    ));
                }
                symbols.insert(name.clone(), address);
            }
            address += item.size();
        }

        Ok(Self { symbols })
    }

    /// Look up a label's address.
    pub fn resolve(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).copied()
    }

    /// Whether a label is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Number of defined labels.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True when no labels are defined.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Replace every label reference with its resolved address.
///
/// Truncation to the destination field width happens when the concrete
/// instruction is built; here addresses stay full-width.
pub fn resolve_operands(
    operands: &[Operand],
    table: &SymbolTable,
    line: usize,
    col: usize,
) -> Result<Vec<Operand>, AsmError> {
    operands
        .iter()
        .map(|operand| match operand {
            Operand::Sym(name) => table
                .resolve(name)
                .map(Operand::Imm)
                .ok_or_else(|| {
                    AsmError::new(
                        AsmErrorKind::UndefinedSymbol,
                        line,
                        col,
                        format!("undefined symbol '{}'", name),
                    )
                }),
            other => Ok(other.clone()),
        })
        .collect()
}
