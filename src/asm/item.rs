//! Assembly items, operands and pseudo-instruction expansion.
//!
//! Pass 1 of the assembler turns source lines into a stream of items.
//! Pseudo-instructions are expanded here, before address assignment,
//! so that labels after an expansion account for every emitted word.

use crate::isa::{Instruction, Opcode, Reg, Shape};

use super::AsmErrorKind;

/// One instruction operand as written in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A register name
    Reg(Reg),
    /// A numeric literal (32-bit two's-complement value)
    Imm(u32),
    /// An unresolved label reference
    Sym(String),
}

/// One element of the item stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// Label definition pinning the current offset
    Label { name: String, line: usize, col: usize },
    /// Fully resolved instruction
    Instr(Instruction),
    /// Instruction with at least one label reference in an immediate slot
    Unresolved {
        op: Opcode,
        operands: Vec<Operand>,
        line: usize,
        col: usize,
    },
    /// Raw data block emitted by `%d`
    Data(Vec<u8>),
}

impl Item {
    /// Bytes this item contributes to the image.
    pub fn size(&self) -> u32 {
        match self {
            Self::Label { .. } => 0,
            Self::Instr(_) | Self::Unresolved { .. } => Instruction::SIZE as u32,
            Self::Data(bytes) => bytes.len() as u32,
        }
    }
}

/// Check a 32-bit two's-complement value against an N-bit field.
///
/// Accepts `[-2^(N-1), 2^N - 1]`: the unsigned range plus negatives
/// that survive truncation to N bits.
pub fn immediate_in_range(value: u32, bits: u32) -> bool {
    let max_unsigned = (1u64 << bits) - 1;
    if value as u64 <= max_unsigned {
        return true;
    }
    let min_negative = u32::MAX - ((1u32 << (bits - 1)) - 1);
    value >= min_negative
}

/// Is this mnemonic a pseudo-instruction?
pub fn is_pseudo(mnemonic: &str) -> bool {
    matches!(mnemonic, "adi" | "sbi" | "bif")
}

/// Expand a pseudo-instruction into its fixed sequence of real
/// instructions. The caller has already checked the operand count (all
/// three pseudos take exactly three operands).
///
/// Expansions clobber the assembler temporaries: `adi`/`sbi` use `at`,
/// `bif` uses `ad`.
pub fn expand_pseudo(mnemonic: &str, operands: &[Operand]) -> Option<Vec<(Opcode, Vec<Operand>)>> {
    match mnemonic {
        // adi rA rB imm  ->  set at imm; add rA rB at
        "adi" => Some(vec![
            (
                Opcode::Set,
                vec![Operand::Reg(Reg::AT), operands[2].clone()],
            ),
            (
                Opcode::Add,
                vec![
                    operands[0].clone(),
                    operands[1].clone(),
                    Operand::Reg(Reg::AT),
                ],
            ),
        ]),
        // sbi rA rB imm  ->  set at imm; sub rA rB at
        "sbi" => Some(vec![
            (
                Opcode::Set,
                vec![Operand::Reg(Reg::AT), operands[2].clone()],
            ),
            (
                Opcode::Sub,
                vec![
                    operands[0].clone(),
                    operands[1].clone(),
                    Operand::Reg(Reg::AT),
                ],
            ),
        ]),
        // bif rX label v  ->  set ad label; bve ad rX v
        "bif" => Some(vec![
            (
                Opcode::Set,
                vec![Operand::Reg(Reg::AD), operands[1].clone()],
            ),
            (
                Opcode::Bve,
                vec![
                    Operand::Reg(Reg::AD),
                    operands[0].clone(),
                    operands[2].clone(),
                ],
            ),
        ]),
        _ => None,
    }
}

/// Validate operand count and types against the opcode's shape, and
/// range-check explicit immediates. Label references are accepted in
/// any immediate slot.
pub fn validate_operands(
    op: Opcode,
    operands: &[Operand],
) -> Result<(), (AsmErrorKind, String)> {
    let shape = op.shape();
    let expected = shape.operand_count();
    if operands.len() != expected {
        return Err((
            AsmErrorKind::InvalidInstruction,
            format!(
                "instruction '{}' expects {} operand{}, got {}",
                op.mnemonic(),
                expected,
                if expected == 1 { "" } else { "s" },
                operands.len()
            ),
        ));
    }

    // per-slot bit widths; None marks a register slot
    let slots: &[Option<u32>] = match shape {
        Shape::Nullary => &[],
        Shape::R1 => &[None],
        Shape::I24 => &[Some(24)],
        Shape::R1I16 => &[None, Some(16)],
        Shape::R2 => &[None, None],
        Shape::R2I8 => &[None, None, Some(8)],
        Shape::R1I8I8 => &[None, Some(8), Some(8)],
        Shape::R3 => &[None, None, None],
    };

    for (index, (slot, operand)) in slots.iter().zip(operands).enumerate() {
        match (slot, operand) {
            (None, Operand::Reg(_)) => {}
            (None, Operand::Sym(name)) => {
                return Err((
                    AsmErrorKind::InvalidRegister,
                    format!("unknown register '{}'", name),
                ));
            }
            (None, Operand::Imm(_)) => {
                return Err((
                    AsmErrorKind::InvalidInstruction,
                    format!(
                        "instruction '{}' operand {} must be a register",
                        op.mnemonic(),
                        index + 1
                    ),
                ));
            }
            (Some(_), Operand::Reg(_)) => {
                return Err((
                    AsmErrorKind::InvalidInstruction,
                    format!(
                        "instruction '{}' operand {} must be an immediate or label",
                        op.mnemonic(),
                        index + 1
                    ),
                ));
            }
            (Some(bits), Operand::Imm(value)) => {
                if !immediate_in_range(*value, *bits) {
                    return Err((
                        AsmErrorKind::InvalidImmediate,
                        format!(
                            "immediate {} exceeds {}-bit range (valid -{} to {})",
                            *value as i32,
                            bits,
                            1u64 << (bits - 1),
                            (1u64 << bits) - 1
                        ),
                    ));
                }
            }
            (Some(_), Operand::Sym(_)) => {} // resolved and truncated later
        }
    }

    Ok(())
}

/// Build a concrete instruction from fully resolved operands.
///
/// Returns `None` if any operand is still symbolic or mistyped; the
/// driver validates first, so `None` indicates an internal
/// inconsistency rather than a user error.
pub fn build_instruction(op: Opcode, operands: &[Operand]) -> Option<Instruction> {
    let reg = |index: usize| match operands.get(index)? {
        Operand::Reg(r) => Some(*r),
        _ => None,
    };
    let imm = |index: usize| match operands.get(index)? {
        Operand::Imm(v) => Some(*v),
        _ => None,
    };

    Some(match op.shape() {
        Shape::Nullary => Instruction::Nullary { op },
        Shape::R1 => Instruction::R1 { op, a: reg(0)? },
        Shape::I24 => Instruction::I24 { op, imm: imm(0)? & 0xFF_FFFF },
        Shape::R1I16 => Instruction::R1I16 {
            op,
            a: reg(0)?,
            imm: imm(1)? as u16,
        },
        Shape::R2 => Instruction::R2 { op, a: reg(0)?, b: reg(1)? },
        Shape::R2I8 => Instruction::R2I8 {
            op,
            a: reg(0)?,
            b: reg(1)?,
            imm: imm(2)? as u8,
        },
        Shape::R1I8I8 => Instruction::R1I8I8 {
            op,
            a: reg(0)?,
            v0: imm(1)? as u8,
            v1: imm(2)? as u8,
        },
        Shape::R3 => Instruction::R3 {
            op,
            a: reg(0)?,
            b: reg(1)?,
            c: reg(2)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_ranges() {
        // 8-bit: [-128, 255]
        assert!(immediate_in_range(0, 8));
        assert!(immediate_in_range(255, 8));
        assert!(immediate_in_range((-128i32) as u32, 8));
        assert!(!immediate_in_range(256, 8));
        assert!(!immediate_in_range((-129i32) as u32, 8));

        // 16-bit: [-32768, 65535]
        assert!(immediate_in_range(65535, 16));
        assert!(immediate_in_range((-32768i32) as u32, 16));
        assert!(!immediate_in_range(65536, 16));

        // 24-bit
        assert!(immediate_in_range(0xFF_FFFF, 24));
        assert!(!immediate_in_range(0x100_0000, 24));
        assert!(immediate_in_range((-0x80_0000i32) as u32, 24));
    }

    #[test]
    fn test_item_sizes() {
        assert_eq!(
            Item::Label { name: "x".into(), line: 1, col: 1 }.size(),
            0
        );
        assert_eq!(Item::Instr(Instruction::nop()).size(), 4);
        assert_eq!(Item::Data(vec![1, 2, 3]).size(), 3);
    }

    #[test]
    fn test_adi_expansion() {
        let ops = vec![
            Operand::Reg(Reg::gpr(0)),
            Operand::Reg(Reg::gpr(1)),
            Operand::Imm(42),
        ];
        let expansion = expand_pseudo("adi", &ops).unwrap();
        assert_eq!(expansion.len(), 2);
        assert_eq!(expansion[0].0, Opcode::Set);
        assert_eq!(
            expansion[0].1,
            vec![Operand::Reg(Reg::AT), Operand::Imm(42)]
        );
        assert_eq!(expansion[1].0, Opcode::Add);
        assert_eq!(expansion[1].1[2], Operand::Reg(Reg::AT));
    }

    #[test]
    fn test_bif_expansion() {
        let ops = vec![
            Operand::Reg(Reg::gpr(4)),
            Operand::Sym("done".into()),
            Operand::Imm(1),
        ];
        let expansion = expand_pseudo("bif", &ops).unwrap();
        assert_eq!(expansion[0].0, Opcode::Set);
        assert_eq!(
            expansion[0].1,
            vec![Operand::Reg(Reg::AD), Operand::Sym("done".into())]
        );
        assert_eq!(expansion[1].0, Opcode::Bve);
        assert_eq!(expansion[1].1[1], Operand::Reg(Reg::gpr(4)));
    }

    #[test]
    fn test_not_pseudo() {
        assert!(expand_pseudo("add", &[]).is_none());
        assert!(!is_pseudo("add"));
        assert!(is_pseudo("bif"));
    }

    #[test]
    fn test_validate_count() {
        let err = validate_operands(Opcode::Add, &[Operand::Reg(Reg::gpr(0))]).unwrap_err();
        assert_eq!(err.0, AsmErrorKind::InvalidInstruction);
        assert!(err.1.contains("expects 3 operands"));
    }

    #[test]
    fn test_validate_types() {
        // immediate in register slot
        let err = validate_operands(Opcode::Jmp, &[Operand::Imm(4)]).unwrap_err();
        assert_eq!(err.0, AsmErrorKind::InvalidInstruction);

        // unknown register name lands as a symbol in a register slot
        let err = validate_operands(
            Opcode::Mov,
            &[Operand::Sym("rx".into()), Operand::Reg(Reg::gpr(0))],
        )
        .unwrap_err();
        assert_eq!(err.0, AsmErrorKind::InvalidRegister);

        // register in immediate slot
        let err = validate_operands(
            Opcode::Set,
            &[Operand::Reg(Reg::gpr(0)), Operand::Reg(Reg::gpr(1))],
        )
        .unwrap_err();
        assert_eq!(err.0, AsmErrorKind::InvalidInstruction);
    }

    #[test]
    fn test_validate_immediate_range() {
        let err = validate_operands(
            Opcode::Set,
            &[Operand::Reg(Reg::gpr(0)), Operand::Imm(70000)],
        )
        .unwrap_err();
        assert_eq!(err.0, AsmErrorKind::InvalidImmediate);

        // labels pass through unchecked
        assert!(validate_operands(
            Opcode::Set,
            &[Operand::Reg(Reg::gpr(0)), Operand::Sym("later".into())],
        )
        .is_ok());
    }

    #[test]
    fn test_build_instruction() {
        let inst = build_instruction(
            Opcode::Set,
            &[Operand::Reg(Reg::gpr(1)), Operand::Imm(42)],
        )
        .unwrap();
        assert_eq!(inst, Instruction::set(Reg::gpr(1), 42));

        // symbolic operand cannot build
        assert!(build_instruction(
            Opcode::Set,
            &[Operand::Reg(Reg::gpr(1)), Operand::Sym("x".into())],
        )
        .is_none());
    }
}
