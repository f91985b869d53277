//! Per-instruction execution semantics.
//!
//! One exhaustive match over the instruction universe. Arithmetic is
//! modulo 2^32; shifts take a signed amount in [-32, 32]; load/store
//! offsets are signed bytes; division by zero traps. Control-flow
//! instructions write `pc` directly and the step loop in `mod.rs`
//! leaves it untouched; everything else lets the loop advance pc by 4.

use crate::isa::{Instruction, Opcode};
use crate::{Addr, Word};

use super::memory::Memory;
use super::observer::Observer;
use super::state::{ExecState, TrapInfo, TrapKind, VmState};

/// Execute one decoded instruction.
///
/// `pc` and `word` identify the instruction for trap records; `pc`
/// still points at the instruction itself (the loop advances it
/// afterwards).
pub(crate) fn execute(
    inst: &Instruction,
    word: Word,
    pc: Addr,
    mem: &mut Memory,
    state: &mut VmState,
    observers: &mut [Box<dyn Observer>],
) {
    match *inst {
        Instruction::Nullary { op } => match op {
            Opcode::Nop => {}
            Opcode::Ret => {
                let lr = state.registers.lr();
                state.registers.set_pc(lr);
                state.registers.set_lr(0);
            }
            Opcode::Hlt => state.set_state(ExecState::Halted),
            _ => bad_instruction(op, word, pc, state),
        },

        Instruction::R1 { op, a } => match op {
            Opcode::Jmp => {
                let target = state.registers.read(a);
                state.registers.set_pc(target);
            }
            Opcode::Cal => {
                state.registers.set_lr(pc.wrapping_add(4));
                let target = state.registers.read(a);
                state.registers.set_pc(target);
            }
            _ => bad_instruction(op, word, pc, state),
        },

        Instruction::I24 { op, imm } => match op {
            Opcode::Jmi => state.registers.set_pc(imm),
            Opcode::Int => state.interrupt(imm),
            _ => bad_instruction(op, word, pc, state),
        },

        Instruction::R1I16 { op, a, imm } => match op {
            Opcode::Set => state.registers.write(a, imm as Word),
            Opcode::Sup => {
                let current = state.registers.read(a);
                state
                    .registers
                    .write(a, (current & 0xFFFF) | ((imm as Word) << 16));
            }
            _ => bad_instruction(op, word, pc, state),
        },

        Instruction::R2 { op, a, b } => {
            let b_val = state.registers.read(b);
            match op {
                Opcode::Mov => state.registers.write(a, b_val),
                Opcode::Not => state.registers.write(a, !b_val),
                Opcode::Sxt => {
                    let extended = b_val as u16 as i16 as i32 as Word;
                    state.registers.write(a, extended);
                }
                _ => bad_instruction(op, word, pc, state),
            }
        }

        Instruction::R2I8 { op, a, b, imm } => match op {
            Opcode::Ldw => {
                let addr = effective_address(state.registers.read(b), imm);
                match mem.read_word(addr) {
                    Ok(value) => {
                        notify_read(observers, addr, value);
                        state.registers.write(a, value);
                    }
                    Err(_) => memory_trap(addr, word, pc, state),
                }
            }
            Opcode::Stw => {
                let addr = effective_address(state.registers.read(b), imm);
                let value = state.registers.read(a);
                match mem.write_word(addr, value) {
                    Ok(()) => notify_write(observers, addr, value),
                    Err(_) => memory_trap(addr, word, pc, state),
                }
            }
            Opcode::Ldb => {
                let addr = effective_address(state.registers.read(b), imm);
                match mem.read_byte(addr) {
                    Ok(byte) => {
                        let value = byte as Word;
                        notify_read(observers, addr, value);
                        state.registers.write(a, value);
                    }
                    Err(_) => memory_trap(addr, word, pc, state),
                }
            }
            Opcode::Stb => {
                let addr = effective_address(state.registers.read(b), imm);
                let byte = (state.registers.read(a) & 0xFF) as u8;
                match mem.write_byte(addr, byte) {
                    Ok(()) => notify_write(observers, addr, byte as Word),
                    Err(_) => memory_trap(addr, word, pc, state),
                }
            }
            Opcode::Bve => {
                if state.registers.read(b) == imm as Word {
                    let target = state.registers.read(a);
                    state.registers.set_pc(target);
                }
            }
            Opcode::Bvn => {
                if state.registers.read(b) != imm as Word {
                    let target = state.registers.read(a);
                    state.registers.set_pc(target);
                }
            }
            Opcode::Seq => {
                let value = (state.registers.read(b) == imm as Word) as Word;
                state.registers.write(a, value);
            }
            _ => bad_instruction(op, word, pc, state),
        },

        Instruction::R1I8I8 { op, a, v0, v1 } => match op {
            Opcode::Sia => {
                let current = state.registers.read(a);
                let shifted = (v0 as Word).checked_shl(v1 as u32).unwrap_or(0);
                state.registers.write(a, current.wrapping_add(shifted));
            }
            _ => bad_instruction(op, word, pc, state),
        },

        Instruction::R3 { op, a, b, c } => {
            let b_val = state.registers.read(b);
            let c_val = state.registers.read(c);
            match op {
                Opcode::Add => state.registers.write(a, b_val.wrapping_add(c_val)),
                Opcode::Sub => state.registers.write(a, b_val.wrapping_sub(c_val)),
                Opcode::Mul => state.registers.write(a, b_val.wrapping_mul(c_val)),
                Opcode::Div => {
                    if c_val == 0 {
                        division_trap(word, pc, state);
                    } else {
                        state.registers.write(a, b_val / c_val);
                    }
                }
                Opcode::Mod => {
                    if c_val == 0 {
                        division_trap(word, pc, state);
                    } else {
                        state.registers.write(a, b_val % c_val);
                    }
                }
                Opcode::And => state.registers.write(a, b_val & c_val),
                Opcode::Orr => state.registers.write(a, b_val | c_val),
                Opcode::Xor => state.registers.write(a, b_val ^ c_val),
                Opcode::Lsh => match shift_amount(c_val) {
                    Some(shift) => {
                        let result = if shift >= 0 {
                            ((b_val as u64) << shift) as Word
                        } else {
                            ((b_val as u64) >> -shift) as Word
                        };
                        state.registers.write(a, result);
                    }
                    None => shift_trap(c_val, word, pc, state),
                },
                Opcode::Ash => match shift_amount(c_val) {
                    Some(shift) => {
                        let signed = b_val as i32 as i64;
                        let result = if shift >= 0 {
                            (signed << shift) as Word
                        } else {
                            (signed >> -shift) as Word
                        };
                        state.registers.write(a, result);
                    }
                    None => shift_trap(c_val, word, pc, state),
                },
                Opcode::Tcu => {
                    let value = match b_val.cmp(&c_val) {
                        std::cmp::Ordering::Less => -1i32 as Word,
                        std::cmp::Ordering::Equal => 0,
                        std::cmp::Ordering::Greater => 1,
                    };
                    state.registers.write(a, value);
                }
                Opcode::Tcs => {
                    let value = match (b_val as i32).cmp(&(c_val as i32)) {
                        std::cmp::Ordering::Less => -1i32 as Word,
                        std::cmp::Ordering::Equal => 0,
                        std::cmp::Ordering::Greater => 1,
                    };
                    state.registers.write(a, value);
                }
                Opcode::Snd => {
                    let device_id = state.registers.read(a);
                    let command = b_val;
                    let argument = c_val;
                    let result = state.device_access(device_id, command, argument);
                    state.registers.write(c, result);
                }
                _ => bad_instruction(op, word, pc, state),
            }
        }
    }
}

/// Base register plus sign-extended 8-bit offset.
fn effective_address(base: Word, offset: u8) -> Addr {
    base.wrapping_add(offset as i8 as i32 as Word)
}

/// Shift amounts live in [-32, 32]; anything else is a trap.
fn shift_amount(value: Word) -> Option<i32> {
    let amount = value as i32;
    if (-32..=32).contains(&amount) {
        Some(amount)
    } else {
        None
    }
}

fn notify_read(observers: &mut [Box<dyn Observer>], addr: Addr, value: Word) {
    for observer in observers {
        observer.on_memory_read(addr, value);
    }
}

fn notify_write(observers: &mut [Box<dyn Observer>], addr: Addr, value: Word) {
    for observer in observers {
        observer.on_memory_write(addr, value);
    }
}

fn memory_trap(addr: Addr, word: Word, pc: Addr, state: &mut VmState) {
    state.trap(TrapInfo::new(
        TrapKind::InvalidMemoryAccess,
        pc,
        word,
        format!("memory access at {:#x} out of bounds", addr),
    ));
}

fn division_trap(word: Word, pc: Addr, state: &mut VmState) {
    state.trap(TrapInfo::new(
        TrapKind::DivisionByZero,
        pc,
        word,
        "division by zero",
    ));
}

fn shift_trap(amount: Word, word: Word, pc: Addr, state: &mut VmState) {
    state.trap(TrapInfo::new(
        TrapKind::InvalidInstruction,
        pc,
        word,
        format!("shift amount {} outside [-32, 32]", amount as i32),
    ));
}

fn bad_instruction(op: Opcode, word: Word, pc: Addr, state: &mut VmState) {
    state.trap(TrapInfo::new(
        TrapKind::InvalidInstruction,
        pc,
        word,
        format!("opcode '{}' has no semantics for this operand shape", op),
    ));
}
