//! # rgvm - Toolchain core for the RGVM register machine
//!
//! A fixed-width 32-bit RISC-style instruction set with three tightly
//! coupled components built on one instruction universe:
//!
//! - **Codec**: bit-exact mapping between 32-bit words and typed
//!   instructions ([`codec`])
//! - **Assembler**: two-pass translation from source text to a binary
//!   object ([`asm`])
//! - **Interpreter**: a single-stepped machine with precise trap
//!   semantics, observer hooks and device dispatch ([`vm`])
//!
//! plus the [`object`] container they exchange and a [`disasm`]
//! module reversing the codec to canonical text.
//!
//! ## Instruction Format
//!
//! ```text
//! [OPCODE:8][ A:8 ][ B:8 ][ C:8 ]     little-endian in memory
//! ```
//!
//! Registers: `r0`-`r31` plus `pc`, `lr`, `ad`, `at`, `sp`.
//!
//! ## Example
//!
//! ```
//! use rgvm::asm::assemble;
//! use rgvm::vm::{ExecState, Vm};
//! use rgvm::isa::Reg;
//!
//! let obj = assemble(
//!     "%entry: main
//!      main:
//!        set r1 42
//!        set r2 17
//!        add r3 r1 r2
//!        hlt",
//! )
//! .unwrap();
//!
//! let mut vm = Vm::new(64 * 1024);
//! vm.load_program(&obj).unwrap();
//! vm.run(0);
//!
//! assert_eq!(vm.state(), ExecState::Halted);
//! assert_eq!(vm.get_register(Reg::gpr(3)), 59);
//! ```

pub mod asm;
pub mod codec;
pub mod disasm;
pub mod error;
pub mod isa;
pub mod object;
pub mod vm;

pub use asm::{assemble, Assembler, AsmError, AsmErrorKind};
pub use codec::DecodeError;
pub use disasm::{DisasmError, DisasmFormat, DisasmOptions, Disassembler};
pub use error::{Result, RgvmError};
pub use isa::{Instruction, Opcode, Reg, Shape};
pub use object::{ObjectError, ObjectFile};
pub use vm::{
    ConsoleDevice, Device, DeviceRegistry, ExecState, Memory, Observer, TrapInfo, TrapKind, Vm,
};

/// Machine word: unsigned 32-bit, little-endian in memory and files.
pub type Word = u32;

/// Byte address into VM memory.
pub type Addr = u32;
