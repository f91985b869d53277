//! Disassembler - Canonical text from objects or raw instruction bytes
//!
//! Walks a byte stream four bytes at a time and prints each word's
//! canonical assembly form. A word that fails to decode becomes a
//! diagnostic comment carrying the raw value instead of aborting the
//! listing. Options control the address column (hex or decimal), the
//! raw-bytes column and the base address for raw input; the annotated
//! format adds an object header and a hex dump of the data section.
//!
//! ```text
//! ; rgvm object file disassembly
//! ; entry point: 0x0
//! ; code size: 8 bytes (2 instructions)
//!
//! 0x0000: 00000000  nop
//! 0x0004: 000000ff  hlt
//! ```

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use thiserror::Error;

use crate::codec;
use crate::isa::Instruction;
use crate::object::ObjectFile;
use crate::{Addr, Word};

/// Disassembly failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DisasmError {
    #[error("input length {0} is not a multiple of 4")]
    InvalidSize(usize),
}

/// Address column radix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressFormat {
    #[default]
    Hex,
    Decimal,
}

/// Output configuration.
#[derive(Debug, Clone)]
pub struct DisasmOptions {
    /// Prefix each line with the instruction address
    pub show_addresses: bool,
    /// Show the raw little-endian bytes next to the assembly
    pub show_hex_bytes: bool,
    /// Radix of the address column
    pub address_format: AddressFormat,
    /// Base address for raw-byte input
    pub base_address: Addr,
}

impl Default for DisasmOptions {
    fn default() -> Self {
        Self {
            show_addresses: true,
            show_hex_bytes: true,
            address_format: AddressFormat::Hex,
            base_address: 0,
        }
    }
}

/// Output layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisasmFormat {
    /// Instruction lines only
    Basic,
    /// Header comments plus a trailing data-section dump
    Annotated,
}

/// Configurable disassembler.
#[derive(Debug, Clone, Default)]
pub struct Disassembler {
    options: DisasmOptions,
}

impl Disassembler {
    pub fn new(options: DisasmOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DisasmOptions {
        &self.options
    }

    /// Disassemble an object's code section; the annotated format
    /// also emits a header and a hex dump of the data section.
    pub fn disassemble_object(
        &self,
        obj: &ObjectFile,
        format: DisasmFormat,
    ) -> Result<String, DisasmError> {
        if obj.code.len() % Instruction::SIZE != 0 {
            return Err(DisasmError::InvalidSize(obj.code.len()));
        }

        let mut output = String::new();

        if format == DisasmFormat::Annotated {
            let words = obj.code.len() / Instruction::SIZE;
            output.push_str("; rgvm object file disassembly\n");
            let _ = writeln!(output, "; entry point: {:#x}", obj.entry_offset);
            let _ = writeln!(
                output,
                "; code size: {} bytes ({} instructions)",
                obj.code.len(),
                words
            );
            if !obj.data.is_empty() {
                let _ = writeln!(output, "; data size: {} bytes", obj.data.len());
            }
            output.push('\n');
        }

        self.write_listing(&mut output, &obj.code, 0);

        if format == DisasmFormat::Annotated && !obj.data.is_empty() {
            let _ = write!(output, "\n\n; data section ({} bytes)\n", obj.data.len());
            let data_base = obj.code.len() as Addr;
            for (index, chunk) in obj.data.chunks(16).enumerate() {
                if index > 0 {
                    output.push('\n');
                }
                let _ = write!(output, "{}: ", self.format_address(data_base + (index * 16) as Addr));
                for byte in chunk {
                    let _ = write!(output, "{:02x}", byte);
                }
            }
        }

        Ok(output)
    }

    /// Disassemble raw instruction bytes at the configured base
    /// address.
    pub fn disassemble_bytes(
        &self,
        bytes: &[u8],
        format: DisasmFormat,
    ) -> Result<String, DisasmError> {
        if bytes.len() % Instruction::SIZE != 0 {
            return Err(DisasmError::InvalidSize(bytes.len()));
        }

        let mut output = String::new();

        if format == DisasmFormat::Annotated {
            output.push_str("; raw bytes disassembly\n");
            let _ = writeln!(output, "; base address: {:#x}", self.options.base_address);
            let _ = writeln!(
                output,
                "; size: {} bytes ({} instructions)",
                bytes.len(),
                bytes.len() / Instruction::SIZE
            );
            output.push('\n');
        }

        self.write_listing(&mut output, bytes, self.options.base_address);
        Ok(output)
    }

    /// Format a single already-decoded instruction.
    pub fn disassemble_instruction(&self, inst: &Instruction, addr: Addr) -> String {
        self.format_line(addr, &codec::encode_bytes(inst), &inst.to_string())
    }

    fn write_listing(&self, output: &mut String, bytes: &[u8], base: Addr) {
        for (index, chunk) in bytes.chunks_exact(Instruction::SIZE).enumerate() {
            let addr = base + (index * Instruction::SIZE) as Addr;
            let word_bytes: [u8; 4] = chunk.try_into().expect("chunks_exact yields 4 bytes");

            let assembly = match codec::decode_bytes(word_bytes) {
                Ok(inst) => inst.to_string(),
                Err(_) => format!(
                    "; invalid instruction {:#010x}",
                    Word::from_le_bytes(word_bytes)
                ),
            };

            if index > 0 {
                output.push('\n');
            }
            output.push_str(&self.format_line(addr, &word_bytes, &assembly));
        }
    }

    fn format_line(&self, addr: Addr, word_bytes: &[u8; 4], assembly: &str) -> String {
        let mut line = String::new();

        if self.options.show_addresses {
            let _ = write!(line, "{}: ", self.format_address(addr));
        }
        if self.options.show_hex_bytes {
            for byte in word_bytes {
                let _ = write!(line, "{:02x}", byte);
            }
            line.push_str("  ");
        }
        line.push_str(assembly);
        line
    }

    fn format_address(&self, addr: Addr) -> String {
        match self.options.address_format {
            AddressFormat::Hex => format!("0x{:04x}", addr),
            AddressFormat::Decimal => format!("{:8}", addr),
        }
    }
}

/// Disassemble an object with default options.
pub fn object(obj: &ObjectFile) -> Result<String, DisasmError> {
    Disassembler::default().disassemble_object(obj, DisasmFormat::Annotated)
}

/// Disassemble raw bytes with default options.
pub fn bytes(data: &[u8]) -> Result<String, DisasmError> {
    Disassembler::default().disassemble_bytes(data, DisasmFormat::Annotated)
}

/// Disassemble a file: tries the object container first, then falls
/// back to raw instruction words.
pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<String> {
    let path = path.as_ref();
    let data =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    if let Ok(obj) = ObjectFile::from_binary(&data) {
        return Ok(object(&obj)?);
    }
    Ok(bytes(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    #[test]
    fn test_basic_listing() {
        let disasm = Disassembler::new(DisasmOptions {
            show_addresses: false,
            show_hex_bytes: false,
            ..Default::default()
        });
        let obj = assemble("nop\nset r5 $1234\nhlt").unwrap();
        let text = disasm.disassemble_object(&obj, DisasmFormat::Basic).unwrap();
        assert_eq!(text, "nop\nset r5 $1234\nhlt");
    }

    #[test]
    fn test_annotated_listing() {
        let obj = assemble("nop\nhlt").unwrap();
        let text = object(&obj).unwrap();
        assert!(text.contains("; rgvm object file disassembly"));
        assert!(text.contains("; entry point: 0x0"));
        assert!(text.contains("; code size: 8 bytes (2 instructions)"));
        assert!(text.contains("0x0000: 00000000  nop"));
        assert!(text.contains("0x0004: 000000ff  hlt"));
    }

    #[test]
    fn test_data_dump() {
        let obj = ObjectFile {
            entry_offset: 0,
            code: assemble("hlt").unwrap().code,
            data: (0u8..20).collect(),
        };
        let text = object(&obj).unwrap();
        assert!(text.contains("; data size: 20 bytes"));
        assert!(text.contains("; data section (20 bytes)"));
        // dump starts right after the 4-byte code section, 16 bytes per line
        assert!(text.contains("0x0004: 000102030405060708090a0b0c0d0e0f"));
        assert!(text.contains("0x0014: 10111213"));
    }

    #[test]
    fn test_invalid_word_becomes_comment() {
        // opcode 0x11 is unassigned
        let data = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11];
        let text = bytes(&data).unwrap();
        assert!(text.contains("nop"));
        assert!(text.contains("; invalid instruction 0x11000000"));
    }

    #[test]
    fn test_invalid_size() {
        assert_eq!(
            Disassembler::default().disassemble_bytes(&[0; 5], DisasmFormat::Basic),
            Err(DisasmError::InvalidSize(5))
        );
    }

    #[test]
    fn test_base_address() {
        let disasm = Disassembler::new(DisasmOptions {
            base_address: 0x100,
            ..Default::default()
        });
        let data = codec::encode_bytes(&Instruction::nop());
        let text = disasm.disassemble_bytes(&data, DisasmFormat::Basic).unwrap();
        assert_eq!(text, "0x0100: 00000000  nop");
    }

    #[test]
    fn test_decimal_addresses() {
        let disasm = Disassembler::new(DisasmOptions {
            address_format: AddressFormat::Decimal,
            show_hex_bytes: false,
            ..Default::default()
        });
        let data = codec::encode_bytes(&Instruction::hlt());
        let text = disasm.disassemble_bytes(&data, DisasmFormat::Basic).unwrap();
        assert_eq!(text, "       0: hlt");
    }

    #[test]
    fn test_roundtrip_through_source() {
        let source = "set r1 $2a\nset r2 $11\nadd r3 r1 r2\nhlt";
        let obj = assemble(source).unwrap();
        let disasm = Disassembler::new(DisasmOptions {
            show_addresses: false,
            show_hex_bytes: false,
            ..Default::default()
        });
        let text = disasm.disassemble_object(&obj, DisasmFormat::Basic).unwrap();
        assert_eq!(text, source);

        // the canonical text reassembles to the same code
        let again = assemble(&text).unwrap();
        assert_eq!(again.code, obj.code);
    }

    #[test]
    fn test_pseudo_expansion_visible() {
        let obj = assemble("adi r0 r1 10\nsbi r2 r3 5\nhlt").unwrap();
        let text = object(&obj).unwrap();
        assert!(text.contains("set at $a"));
        assert!(text.contains("add r0 r1 at"));
        assert!(text.contains("set at $5"));
        assert!(text.contains("sub r2 r3 at"));
    }

    #[test]
    fn test_single_instruction() {
        let disasm = Disassembler::default();
        let line = disasm.disassemble_instruction(&Instruction::set(crate::isa::Reg::gpr(5), 0x1234), 8);
        assert_eq!(line, "0x0008: 3412050b  set r5 $1234");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            Disassembler::default()
                .disassemble_bytes(&[], DisasmFormat::Basic)
                .unwrap(),
            ""
        );
    }
}
