//! Interpreter - Single-stepped virtual machine for RGVM programs
//!
//! ## Machine Model
//!
//! ```text
//! Memory:    flat little-endian byte array, size fixed at construction
//! Registers: r0-r31, pc, lr, ad, at, sp (all 32-bit)
//! State:     Halted | Running | Errored
//! ```
//!
//! `load_program` copies the object's code to address 0 and its data
//! section immediately after, sets `pc` to the entry offset and `sp`
//! to the top of memory, then `step`/`run` drive the fetch-decode-
//! execute cycle synchronously. Traps (invalid fetch, undecodable
//! word, out-of-bounds access, division by zero) transition to
//! `Errored` and deliver a [`TrapInfo`] record to the registered
//! handler; there is no unwinding and no automatic recovery.
//!
//! Observers, device handlers and interrupt callbacks all run on the
//! `step` call stack. Cancellation is cooperative: the host stops
//! calling `step`, or bounds `run` with a step limit.

mod devices;
mod exec;
mod memory;
mod observer;
mod registers;
mod state;

pub use devices::{device_ids, ConsoleDevice, Device, DeviceRegistry, NullDevice};
pub use memory::{Memory, MemoryError};
pub use observer::{ExecContext, Observer, TraceObserver, TraceVerbosity};
pub use registers::RegisterFile;
pub use state::{ExecState, TrapInfo, TrapKind, VmState};

use crate::codec;
use crate::isa::Reg;
use crate::object::ObjectFile;
use crate::{Addr, Word};

/// Default memory size (1 MiB).
pub const DEFAULT_MEMORY_SIZE: usize = 1024 * 1024;

/// The virtual machine: memory, register file, observers and host
/// callbacks.
pub struct Vm {
    memory: Memory,
    state: VmState,
    observers: Vec<Box<dyn Observer>>,
}

impl Vm {
    /// Create a machine with the given memory size.
    pub fn new(memory_size: usize) -> Self {
        Self {
            memory: Memory::new(memory_size),
            state: VmState::new(),
            observers: Vec::new(),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    /// Install the interrupt handler invoked by `int`.
    pub fn on_interrupt(&mut self, handler: impl FnMut(Word) + 'static) {
        self.state.set_on_interrupt(handler);
    }

    /// Install the trap handler invoked when execution errors.
    pub fn on_error(&mut self, handler: impl FnMut(&TrapInfo) + 'static) {
        self.state.set_on_error(handler);
    }

    /// Install the device-access handler invoked by `snd`. A
    /// [`DeviceRegistry`] behind `Rc<RefCell<...>>` is the usual
    /// callee.
    pub fn on_device_access(&mut self, handler: impl FnMut(Word, Word, Word) -> Word + 'static) {
        self.state.set_on_device_access(handler);
    }

    // =========================================================================
    // Program loading
    // =========================================================================

    /// Load an object: code at address 0, data immediately after,
    /// `pc = entry`, `sp = memory size - 4`, everything else zeroed.
    /// The machine starts `Running` unless the code section is empty.
    pub fn load_program(&mut self, obj: &ObjectFile) -> Result<(), MemoryError> {
        self.memory.clear();
        self.memory.load_data(0, &obj.code)?;
        self.memory.load_data(obj.code.len() as Addr, &obj.data)?;

        self.state.registers.clear();
        self.state.registers.set_pc(obj.entry_offset);
        self.state.registers.set_sp((self.memory.size() - 4) as Word);

        self.state.set_state(if obj.code.is_empty() {
            ExecState::Halted
        } else {
            ExecState::Running
        });
        self.state.reset_stats();

        log::debug!(
            "loaded program: {} code bytes, {} data bytes, entry {:#x}",
            obj.code.len(),
            obj.data.len(),
            obj.entry_offset
        );
        Ok(())
    }

    /// Load a raw binary image at `start_addr` and begin executing
    /// there, without an object container.
    pub fn load_binary(&mut self, data: &[u8], start_addr: Addr) -> Result<(), MemoryError> {
        self.memory.clear();
        self.memory.load_data(start_addr, data)?;

        self.state.registers.clear();
        self.state.registers.set_pc(start_addr);
        self.state.registers.set_sp((self.memory.size() - 4) as Word);
        self.state.set_state(ExecState::Running);
        self.state.reset_stats();
        Ok(())
    }

    /// Reset to the initial state: registers and memory zeroed,
    /// `Halted`, statistics cleared. Observers and callbacks stay.
    pub fn reset(&mut self) {
        self.state.registers.clear();
        self.state.set_state(ExecState::Halted);
        self.state.reset_stats();
        self.memory.clear();
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute one instruction. Returns whether the machine is still
    /// running afterwards.
    pub fn step(&mut self) -> bool {
        if !self.state.is_running() {
            return false;
        }

        let pc = self.state.registers.pc();

        if pc % 4 != 0 {
            self.trap(TrapInfo::new(
                TrapKind::MisalignedInstruction,
                pc,
                0,
                "instruction fetch at unaligned address",
            ));
            return false;
        }

        if !self.memory.is_valid_range(pc, 4) {
            self.trap(TrapInfo::new(
                TrapKind::InvalidMemoryAccess,
                pc,
                0,
                format!("instruction fetch at {:#x} out of bounds", pc),
            ));
            return false;
        }

        let word = match self.memory.read_word(pc) {
            Ok(word) => word,
            Err(err) => {
                self.trap(TrapInfo::new(
                    TrapKind::InvalidMemoryAccess,
                    pc,
                    0,
                    err.to_string(),
                ));
                return false;
            }
        };

        let inst = match codec::decode(word) {
            Ok(inst) => inst,
            Err(err) => {
                self.trap(TrapInfo::new(
                    TrapKind::InvalidInstruction,
                    pc,
                    word,
                    format!("invalid instruction {:#010x}: {}", word, err),
                ));
                return false;
            }
        };

        {
            let ctx = ExecContext {
                pc,
                word,
                inst: &inst,
                regs: &self.state.registers,
                mem: &self.memory,
            };
            for observer in &mut self.observers {
                observer.pre_execute(&ctx);
            }
        }

        exec::execute(
            &inst,
            word,
            pc,
            &mut self.memory,
            &mut self.state,
            &mut self.observers,
        );

        // instructions that did not write pc advance to the next word
        if self.state.registers.pc() == pc && self.state.is_running() {
            self.state.registers.set_pc(pc + 4);
        }

        {
            let ctx = ExecContext {
                pc,
                word,
                inst: &inst,
                regs: &self.state.registers,
                mem: &self.memory,
            };
            for observer in &mut self.observers {
                observer.post_execute(&ctx);
            }
        }

        self.state.inc_instruction_count();

        match self.state.state() {
            ExecState::Halted => {
                for observer in &mut self.observers {
                    observer.on_halt();
                }
            }
            ExecState::Errored => {
                if let Some(trap) = self.state.last_trap() {
                    for observer in &mut self.observers {
                        observer.on_error(trap);
                    }
                }
            }
            ExecState::Running => {}
        }

        self.state.is_running()
    }

    /// Step until the machine stops or `limit` instructions have run.
    /// `limit = 0` means unbounded.
    pub fn run(&mut self, limit: u64) {
        let mut count = 0u64;
        while self.step() {
            count += 1;
            if limit > 0 && count >= limit {
                break;
            }
        }
    }

    fn trap(&mut self, info: TrapInfo) {
        self.state.trap(info);
        if let Some(trap) = self.state.last_trap() {
            for observer in &mut self.observers {
                observer.on_error(trap);
            }
        }
    }

    // =========================================================================
    // Host accessors
    // =========================================================================

    pub fn state(&self) -> ExecState {
        self.state.state()
    }

    pub fn last_trap(&self) -> Option<&TrapInfo> {
        self.state.last_trap()
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.state.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.state.registers
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn get_register(&self, reg: Reg) -> Word {
        self.state.registers.read(reg)
    }

    pub fn set_register(&mut self, reg: Reg, value: Word) {
        self.state.registers.write(reg, value);
    }

    pub fn pc(&self) -> Word {
        self.state.registers.pc()
    }

    pub fn set_pc(&mut self, value: Word) {
        self.state.registers.set_pc(value);
    }

    pub fn instruction_count(&self) -> u64 {
        self.state.instruction_count()
    }

    /// Execution summary for diagnostics.
    pub fn stats(&self) -> String {
        self.state.stats()
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}
