//! Execution state, trap records and host callbacks.
//!
//! Runtime errors never unwind: raising a trap flips the machine to
//! `Errored`, records the trap, and delivers it to the registered
//! handler on the same call stack. The host decides what happens next
//! (stop, log, load a fresh program).

use std::fmt;

use crate::{Addr, Word};

use super::registers::RegisterFile;

/// Coarse machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// Not running (initial state, or stopped by `hlt`)
    Halted,
    /// Executing instructions
    Running,
    /// Stopped by a trap
    Errored,
}

/// Classification of runtime traps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    InvalidMemoryAccess,
    DivisionByZero,
    InvalidRegister,
    InvalidInstruction,
    MisalignedInstruction,
    DeviceError,
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidMemoryAccess => "invalid memory access",
            Self::DivisionByZero => "division by zero",
            Self::InvalidRegister => "invalid register",
            Self::InvalidInstruction => "invalid instruction",
            Self::MisalignedInstruction => "misaligned instruction",
            Self::DeviceError => "device error",
        })
    }
}

/// A trap record delivered to the error handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapInfo {
    pub kind: TrapKind,
    /// pc of the faulting instruction
    pub pc: Addr,
    /// Raw instruction word (0 when the fault precedes the fetch)
    pub word: Word,
    pub message: String,
}

impl TrapInfo {
    pub fn new(kind: TrapKind, pc: Addr, word: Word, message: impl Into<String>) -> Self {
        Self { kind, pc, word, message: message.into() }
    }
}

impl fmt::Display for TrapInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at pc {:#010x}: {}", self.kind, self.pc, self.message)
    }
}

type InterruptHandler = Box<dyn FnMut(Word)>;
type ErrorHandler = Box<dyn FnMut(&TrapInfo)>;
type DeviceHandler = Box<dyn FnMut(Word, Word, Word) -> Word>;

/// Register file, machine state, statistics and host callbacks.
pub struct VmState {
    pub registers: RegisterFile,
    state: ExecState,
    instruction_count: u64,
    cycle_count: u64,
    last_trap: Option<TrapInfo>,
    on_interrupt: Option<InterruptHandler>,
    on_error: Option<ErrorHandler>,
    on_device_access: Option<DeviceHandler>,
}

impl VmState {
    pub fn new() -> Self {
        Self {
            registers: RegisterFile::new(),
            state: ExecState::Halted,
            instruction_count: 0,
            cycle_count: 0,
            last_trap: None,
            on_interrupt: None,
            on_error: None,
            on_device_access: None,
        }
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn set_state(&mut self, state: ExecState) {
        self.state = state;
    }

    pub fn is_running(&self) -> bool {
        self.state == ExecState::Running
    }

    /// Raise a trap: record it, move to `Errored`, deliver to the
    /// registered handler.
    pub fn trap(&mut self, info: TrapInfo) {
        self.state = ExecState::Errored;
        if let Some(handler) = self.on_error.as_mut() {
            handler(&info);
        }
        self.last_trap = Some(info);
    }

    /// The most recent trap, if any.
    pub fn last_trap(&self) -> Option<&TrapInfo> {
        self.last_trap.as_ref()
    }

    /// Deliver an interrupt code to the host. State is unchanged;
    /// stopping in response is the host's call.
    pub fn interrupt(&mut self, code: Word) {
        if let Some(handler) = self.on_interrupt.as_mut() {
            handler(code);
        }
    }

    /// Route a device access through the host. Without a handler every
    /// access yields 0.
    pub fn device_access(&mut self, device_id: Word, command: Word, argument: Word) -> Word {
        match self.on_device_access.as_mut() {
            Some(handler) => handler(device_id, command, argument),
            None => 0,
        }
    }

    pub fn set_on_interrupt(&mut self, handler: impl FnMut(Word) + 'static) {
        self.on_interrupt = Some(Box::new(handler));
    }

    pub fn set_on_error(&mut self, handler: impl FnMut(&TrapInfo) + 'static) {
        self.on_error = Some(Box::new(handler));
    }

    pub fn set_on_device_access(
        &mut self,
        handler: impl FnMut(Word, Word, Word) -> Word + 'static,
    ) {
        self.on_device_access = Some(Box::new(handler));
    }

    pub fn inc_instruction_count(&mut self) {
        self.instruction_count += 1;
        self.cycle_count += 1; // 1:1 for now
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn reset_stats(&mut self) {
        self.instruction_count = 0;
        self.cycle_count = 0;
        self.last_trap = None;
    }

    /// Execution summary for diagnostics.
    pub fn stats(&self) -> String {
        format!(
            "instructions: {}, cycles: {}",
            self.instruction_count, self.cycle_count
        )
    }
}

impl Default for VmState {
    fn default() -> Self {
        Self::new()
    }
}
