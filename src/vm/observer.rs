//! Observer hooks around the step loop.
//!
//! Observers are borrow-only: the execution context lends read views
//! of the registers and memory for the duration of one callback.
//! Everything runs on the `step` call stack; an observer must not try
//! to mutate execution state (it can set an external flag and let the
//! host stop the loop instead).

use crate::isa::{analyze_data_flow, Instruction};
use crate::{Addr, Word};

use super::memory::Memory;
use super::registers::RegisterFile;
use super::state::TrapInfo;

/// Read-only snapshot passed to `pre_execute`/`post_execute`.
pub struct ExecContext<'a> {
    /// pc of the instruction being executed
    pub pc: Addr,
    /// Raw instruction word
    pub word: Word,
    /// Decoded instruction
    pub inst: &'a Instruction,
    /// Register file view
    pub regs: &'a RegisterFile,
    /// Memory view
    pub mem: &'a Memory,
}

/// Callback surface invoked around every interpreter step.
///
/// All methods default to no-ops so observers implement only what
/// they need.
pub trait Observer {
    /// Called before an instruction executes.
    fn pre_execute(&mut self, _ctx: &ExecContext<'_>) {}

    /// Called after an instruction executes (pc already advanced).
    fn post_execute(&mut self, _ctx: &ExecContext<'_>) {}

    /// Called for each memory load performed by the instruction.
    fn on_memory_read(&mut self, _addr: Addr, _value: Word) {}

    /// Called for each memory store performed by the instruction.
    fn on_memory_write(&mut self, _addr: Addr, _value: Word) {}

    /// Called when a trap is raised.
    fn on_error(&mut self, _trap: &TrapInfo) {}

    /// Called when the machine halts via `hlt`.
    fn on_halt(&mut self) {}
}

/// Trace detail level for [`TraceObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceVerbosity {
    /// One line per instruction: pc, raw word, assembly text
    #[default]
    Basic,
    /// Additionally log operand values around execution
    Semantic,
}

/// Built-in observer that logs execution through the `log` facade at
/// trace level.
#[derive(Debug, Default)]
pub struct TraceObserver {
    verbosity: TraceVerbosity,
}

impl TraceObserver {
    pub fn new(verbosity: TraceVerbosity) -> Self {
        Self { verbosity }
    }
}

impl Observer for TraceObserver {
    fn pre_execute(&mut self, ctx: &ExecContext<'_>) {
        log::trace!("{:#010x}: {:#010x} {}", ctx.pc, ctx.word, ctx.inst);
        if self.verbosity == TraceVerbosity::Semantic {
            let flow = analyze_data_flow(ctx.inst);
            for reg in flow.reads {
                log::trace!("  read {} = {:#x}", reg, ctx.regs.read(reg));
            }
        }
    }

    fn post_execute(&mut self, ctx: &ExecContext<'_>) {
        if self.verbosity == TraceVerbosity::Semantic {
            let flow = analyze_data_flow(ctx.inst);
            for reg in flow.writes {
                log::trace!("  write {} = {:#x}", reg, ctx.regs.read(reg));
            }
        }
    }

    fn on_memory_read(&mut self, addr: Addr, value: Word) {
        if self.verbosity == TraceVerbosity::Semantic {
            log::trace!("  load [{:#x}] -> {:#x}", addr, value);
        }
    }

    fn on_memory_write(&mut self, addr: Addr, value: Word) {
        if self.verbosity == TraceVerbosity::Semantic {
            log::trace!("  store [{:#x}] <- {:#x}", addr, value);
        }
    }

    fn on_error(&mut self, trap: &TrapInfo) {
        log::trace!("  trap: {}", trap);
    }

    fn on_halt(&mut self) {
        log::trace!("  halted");
    }
}
