//! Data-flow analysis over single instructions.
//!
//! Reports which registers an instruction reads and writes (including
//! the implicit `pc`/`lr` traffic of control flow) and whether it
//! touches memory. Used by the trace observer to show operand values
//! around execution; also useful to hosts building their own tooling.

use super::{Instruction, Opcode, Reg};

/// Register and memory effects of one instruction.
#[derive(Debug, Clone, Default)]
pub struct DataFlow {
    /// Registers read by the instruction
    pub reads: Vec<Reg>,
    /// Registers written by the instruction
    pub writes: Vec<Reg>,
    /// Instruction loads from memory
    pub reads_memory: bool,
    /// Instruction stores to memory
    pub writes_memory: bool,
}

/// Analyze the data flow of an instruction.
///
/// Conditional branches report `pc` as written even when they may fall
/// through; the analysis is an over-approximation of the write set.
pub fn analyze_data_flow(inst: &Instruction) -> DataFlow {
    let mut flow = DataFlow::default();

    match *inst {
        Instruction::Nullary { op } => match op {
            Opcode::Ret => {
                flow.reads.push(Reg::LR);
                flow.writes.push(Reg::PC);
                flow.writes.push(Reg::LR);
            }
            _ => {} // nop, hlt
        },
        Instruction::R1 { op, a } => match op {
            Opcode::Jmp => {
                flow.reads.push(a);
                flow.writes.push(Reg::PC);
            }
            Opcode::Cal => {
                flow.reads.push(a);
                flow.reads.push(Reg::PC);
                flow.writes.push(Reg::PC);
                flow.writes.push(Reg::LR);
            }
            _ => {}
        },
        Instruction::I24 { op, .. } => {
            if op == Opcode::Jmi {
                flow.writes.push(Reg::PC);
            }
            // int has no register-visible effect
        }
        Instruction::R1I16 { op, a, .. } => match op {
            Opcode::Set => flow.writes.push(a),
            Opcode::Sup => {
                flow.reads.push(a);
                flow.writes.push(a);
            }
            _ => {}
        },
        Instruction::R2 { op: _, a, b } => {
            // mov, not, sxt all read B into A
            flow.reads.push(b);
            flow.writes.push(a);
        }
        Instruction::R2I8 { op, a, b, .. } => match op {
            Opcode::Ldw | Opcode::Ldb => {
                flow.reads.push(b);
                flow.writes.push(a);
                flow.reads_memory = true;
            }
            Opcode::Stw | Opcode::Stb => {
                flow.reads.push(a);
                flow.reads.push(b);
                flow.writes_memory = true;
            }
            Opcode::Bve | Opcode::Bvn => {
                flow.reads.push(a);
                flow.reads.push(b);
                flow.writes.push(Reg::PC);
            }
            Opcode::Seq => {
                flow.reads.push(b);
                flow.writes.push(a);
            }
            _ => {}
        },
        Instruction::R1I8I8 { op: _, a, .. } => {
            // sia accumulates into A
            flow.reads.push(a);
            flow.writes.push(a);
        }
        Instruction::R3 { op, a, b, c } => match op {
            Opcode::Snd => {
                flow.reads.push(a);
                flow.reads.push(b);
                flow.reads.push(c);
                flow.writes.push(c);
            }
            _ => {
                flow.reads.push(b);
                flow.reads.push(c);
                flow.writes.push(a);
            }
        },
    }

    flow
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_flow() {
        let flow = analyze_data_flow(&Instruction::add(Reg::gpr(3), Reg::gpr(1), Reg::gpr(2)));
        assert_eq!(flow.reads, vec![Reg::gpr(1), Reg::gpr(2)]);
        assert_eq!(flow.writes, vec![Reg::gpr(3)]);
        assert!(!flow.reads_memory);
        assert!(!flow.writes_memory);
    }

    #[test]
    fn test_memory_flow() {
        let load = analyze_data_flow(&Instruction::ldw(Reg::gpr(1), Reg::gpr(2), 4));
        assert!(load.reads_memory);
        assert!(!load.writes_memory);
        assert_eq!(load.writes, vec![Reg::gpr(1)]);

        let store = analyze_data_flow(&Instruction::stw(Reg::gpr(1), Reg::gpr(2), 4));
        assert!(store.writes_memory);
        assert_eq!(store.reads, vec![Reg::gpr(1), Reg::gpr(2)]);
        assert!(store.writes.is_empty());
    }

    #[test]
    fn test_control_flow() {
        let ret = analyze_data_flow(&Instruction::ret());
        assert_eq!(ret.reads, vec![Reg::LR]);
        assert_eq!(ret.writes, vec![Reg::PC, Reg::LR]);

        let cal = analyze_data_flow(&Instruction::cal(Reg::gpr(9)));
        assert!(cal.writes.contains(&Reg::PC));
        assert!(cal.writes.contains(&Reg::LR));

        let bve = analyze_data_flow(&Instruction::bve(Reg::gpr(1), Reg::gpr(2), 0));
        assert!(bve.writes.contains(&Reg::PC));
    }

    #[test]
    fn test_device_flow() {
        let snd = analyze_data_flow(&Instruction::snd(Reg::gpr(1), Reg::gpr(2), Reg::gpr(3)));
        assert_eq!(snd.reads.len(), 3);
        assert_eq!(snd.writes, vec![Reg::gpr(3)]);
    }

    #[test]
    fn test_nop_flow() {
        let flow = analyze_data_flow(&Instruction::nop());
        assert!(flow.reads.is_empty());
        assert!(flow.writes.is_empty());
    }
}
