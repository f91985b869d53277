//! Error types for rgvm

use thiserror::Error;

use crate::asm::AsmError;
use crate::codec::DecodeError;
use crate::disasm::DisasmError;
use crate::object::ObjectError;
use crate::vm::MemoryError;

/// Crate-level error type aggregating every component's taxonomy.
///
/// The component errors stay usable on their own; this umbrella exists
/// for hosts that drive the whole pipeline (assemble, write, load,
/// run) through one `Result` type.
#[derive(Debug, Error)]
pub enum RgvmError {
    /// Instruction word failed to decode
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Assembly failed
    #[error("assembly error: {0}")]
    Assembly(#[from] AsmError),

    /// Object container failed to load
    #[error("object error: {0}")]
    Object(#[from] ObjectError),

    /// Out-of-bounds memory access outside the step loop
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// Disassembly failed
    #[error("disassembly error: {0}")]
    Disasm(#[from] DisasmError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RgvmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        fn pipeline() -> Result<()> {
            let obj = crate::asm::assemble("nop\nhlt")?;
            let _ = crate::object::ObjectFile::from_binary(&obj.to_binary())?;
            let _ = crate::codec::decode(0x00000000)?;
            Ok(())
        }
        assert!(pipeline().is_ok());
    }

    #[test]
    fn test_error_messages() {
        let err: RgvmError = crate::codec::decode(0x11000000).unwrap_err().into();
        assert!(err.to_string().contains("invalid opcode"));

        let err: RgvmError = crate::asm::assemble("frob").unwrap_err().into();
        assert!(err.to_string().contains("invalid instruction"));
    }
}
