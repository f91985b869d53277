//! Codec - Bit-exact mapping between 32-bit words and instructions
//!
//! ## Layout
//!
//! ```text
//! bits 31-24  opcode
//! bits 23-16  register A / high immediate byte
//! bits 15-8   register B / middle byte
//! bits 7-0    register C / low byte
//! ```
//!
//! Words are stored little-endian in byte streams (byte 0 = bits 7-0).
//!
//! Decoding validates the whole word atomically: an unassigned opcode
//! or an out-of-range register byte rejects the word without exposing
//! partial state. `decode(encode(i)) == Ok(i)` for every constructible
//! instruction, and `encode(decode(w)) == w` for every word that
//! decodes.

use thiserror::Error;

use crate::isa::{Instruction, Opcode, Reg, Shape};
use crate::Word;

/// Reasons a 32-bit word fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The opcode byte is not assigned in the ISA
    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),
    /// A register field holds a byte above the last register id
    #[error("invalid register {0:#04x}")]
    InvalidRegister(u8),
    /// The byte stream is not a whole number of words
    #[error("malformed instruction stream")]
    MalformedInstruction,
}

/// Encode an instruction to its 32-bit word.
pub fn encode(inst: &Instruction) -> Word {
    let op = (inst.opcode().as_u8() as Word) << 24;
    match *inst {
        Instruction::Nullary { .. } => op,
        Instruction::R1 { a, .. } => op | ((a.as_u8() as Word) << 16),
        Instruction::I24 { imm, .. } => op | (imm & 0xFF_FFFF),
        Instruction::R1I16 { a, imm, .. } => op | ((a.as_u8() as Word) << 16) | imm as Word,
        Instruction::R2 { a, b, .. } => {
            op | ((a.as_u8() as Word) << 16) | ((b.as_u8() as Word) << 8)
        }
        Instruction::R2I8 { a, b, imm, .. } => {
            op | ((a.as_u8() as Word) << 16) | ((b.as_u8() as Word) << 8) | imm as Word
        }
        Instruction::R1I8I8 { a, v0, v1, .. } => {
            op | ((a.as_u8() as Word) << 16) | ((v0 as Word) << 8) | v1 as Word
        }
        Instruction::R3 { a, b, c, .. } => {
            op | ((a.as_u8() as Word) << 16) | ((b.as_u8() as Word) << 8) | c.as_u8() as Word
        }
    }
}

/// Decode a 32-bit word to an instruction.
pub fn decode(word: Word) -> Result<Instruction, DecodeError> {
    let op_byte = (word >> 24) as u8;
    let op = Opcode::from_u8(op_byte).ok_or(DecodeError::InvalidOpcode(op_byte))?;

    let b1 = (word >> 16) as u8;
    let b2 = (word >> 8) as u8;
    let b3 = word as u8;

    let reg = |byte: u8| Reg::from_u8(byte).ok_or(DecodeError::InvalidRegister(byte));

    Ok(match op.shape() {
        Shape::Nullary => Instruction::Nullary { op },
        Shape::R1 => Instruction::R1 { op, a: reg(b1)? },
        Shape::I24 => Instruction::I24 { op, imm: word & 0xFF_FFFF },
        Shape::R1I16 => Instruction::R1I16 {
            op,
            a: reg(b1)?,
            imm: (word & 0xFFFF) as u16,
        },
        Shape::R2 => Instruction::R2 { op, a: reg(b1)?, b: reg(b2)? },
        Shape::R2I8 => Instruction::R2I8 {
            op,
            a: reg(b1)?,
            b: reg(b2)?,
            imm: b3,
        },
        Shape::R1I8I8 => Instruction::R1I8I8 { op, a: reg(b1)?, v0: b2, v1: b3 },
        Shape::R3 => Instruction::R3 {
            op,
            a: reg(b1)?,
            b: reg(b2)?,
            c: reg(b3)?,
        },
    })
}

/// Encode to 4 little-endian bytes.
pub fn encode_bytes(inst: &Instruction) -> [u8; 4] {
    encode(inst).to_le_bytes()
}

/// Decode from 4 little-endian bytes.
pub fn decode_bytes(bytes: [u8; 4]) -> Result<Instruction, DecodeError> {
    decode(Word::from_le_bytes(bytes))
}

/// Encode an instruction sequence to a little-endian byte stream.
pub fn encode_sequence(instructions: &[Instruction]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(instructions.len() * Instruction::SIZE);
    for inst in instructions {
        bytes.extend_from_slice(&encode_bytes(inst));
    }
    bytes
}

/// Decode a byte stream to an instruction sequence.
///
/// The stream length must be a multiple of 4; the first undecodable
/// word fails the whole sequence.
pub fn decode_sequence(bytes: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    if bytes.len() % Instruction::SIZE != 0 {
        return Err(DecodeError::MalformedInstruction);
    }

    let mut result = Vec::with_capacity(bytes.len() / Instruction::SIZE);
    for chunk in bytes.chunks_exact(Instruction::SIZE) {
        let word_bytes: [u8; 4] = chunk.try_into().expect("chunks_exact yields 4-byte chunks");
        result.push(decode_bytes(word_bytes)?);
    }
    Ok(result)
}

/// Check that a byte stream decodes cleanly without keeping the result.
pub fn validate_sequence(bytes: &[u8]) -> Result<(), DecodeError> {
    decode_sequence(bytes).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_set_literal() {
        // set r5 $1234
        let inst = decode(0x0b051234).unwrap();
        assert_eq!(inst, Instruction::set(Reg::gpr(5), 0x1234));
        assert_eq!(encode(&inst), 0x0b051234);
    }

    #[test]
    fn test_roundtrip_every_shape() {
        let samples = [
            Instruction::nop(),
            Instruction::hlt(),
            Instruction::ret(),
            Instruction::jmp(Reg::gpr(17)),
            Instruction::cal(Reg::SP),
            Instruction::jmi(0x123456),
            Instruction::int(0xABCDEF),
            Instruction::set(Reg::gpr(1), 0xFFFF),
            Instruction::sup(Reg::AT, 0x8000),
            Instruction::mov(Reg::gpr(0), Reg::gpr(31)),
            Instruction::not(Reg::gpr(2), Reg::gpr(3)),
            Instruction::sxt(Reg::gpr(4), Reg::gpr(5)),
            Instruction::ldw(Reg::gpr(1), Reg::gpr(2), 0xFC),
            Instruction::stw(Reg::gpr(1), Reg::gpr(2), 4),
            Instruction::ldb(Reg::gpr(1), Reg::gpr(2), 255),
            Instruction::stb(Reg::gpr(1), Reg::gpr(2), 0),
            Instruction::bve(Reg::AD, Reg::gpr(4), 1),
            Instruction::bvn(Reg::AD, Reg::gpr(4), 0),
            Instruction::seq(Reg::gpr(1), Reg::gpr(2), 9),
            Instruction::sia(Reg::gpr(6), 3, 8),
            Instruction::add(Reg::gpr(3), Reg::gpr(1), Reg::gpr(2)),
            Instruction::div(Reg::gpr(3), Reg::gpr(1), Reg::gpr(2)),
            Instruction::snd(Reg::gpr(1), Reg::gpr(2), Reg::gpr(3)),
        ];
        for inst in samples {
            let word = encode(&inst);
            assert_eq!(decode(word), Ok(inst), "word {:#010x}", word);
        }
    }

    #[test]
    fn test_word_roundtrip_on_valid_decodes() {
        // spot-check the inverse direction across the word space
        for word in [0x00000000u32, 0x0b051234, 0x01030102, 0x20001000, 0xFF000000] {
            let inst = decode(word).unwrap();
            assert_eq!(encode(&inst), word);
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(decode(0x11000000), Err(DecodeError::InvalidOpcode(0x11)));
        assert_eq!(decode(0xFE000000), Err(DecodeError::InvalidOpcode(0xFE)));
    }

    #[test]
    fn test_invalid_register_rejected_atomically() {
        // add with C = 0x25: first invalid register reported
        assert_eq!(decode(0x01000025), Err(DecodeError::InvalidRegister(0x25)));
        // jmp with A = 0xFF
        assert_eq!(decode(0x21FF0000), Err(DecodeError::InvalidRegister(0xFF)));
        // boundary: 0x24 (sp) is the last valid id
        assert!(decode(0x21240000).is_ok());
        assert_eq!(decode(0x21250000), Err(DecodeError::InvalidRegister(0x25)));
    }

    #[test]
    fn test_immediate_bytes_not_register_checked() {
        // sia's v0/v1 are immediates, any byte value is fine
        assert!(decode(0x4000FFFF).is_ok());
        // set's imm16 likewise
        assert!(decode(0x0b00FFFF).is_ok());
    }

    #[test]
    fn test_encode_bytes_little_endian() {
        let inst = Instruction::set(Reg::gpr(5), 0x1234);
        assert_eq!(encode_bytes(&inst), [0x34, 0x12, 0x05, 0x0b]);
    }

    #[test]
    fn test_sequence_roundtrip() {
        let instructions = vec![
            Instruction::set(Reg::gpr(1), 42),
            Instruction::set(Reg::gpr(2), 17),
            Instruction::add(Reg::gpr(3), Reg::gpr(1), Reg::gpr(2)),
            Instruction::hlt(),
        ];
        let bytes = encode_sequence(&instructions);
        assert_eq!(bytes.len(), 16);
        assert_eq!(decode_sequence(&bytes).unwrap(), instructions);
    }

    #[test]
    fn test_sequence_length_check() {
        assert_eq!(
            decode_sequence(&[0x00, 0x00, 0x00]),
            Err(DecodeError::MalformedInstruction)
        );
        assert!(validate_sequence(&[]).is_ok());
    }
}
