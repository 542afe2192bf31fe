//! Human-readable rendering of decoded instructions.

use std::fmt;

use crate::decoder::{
    Address, AluInstruction, BranchInstruction, BranchTarget, Condition, Instruction,
    InterruptInstruction, LoadInstruction, Operand, StackInstruction, StoreInstruction,
};
use crate::encoding::AluOp;
use crate::memory::{Word, INSTRUCTION_WORDS};

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DisassemblyRow {
    /// Address of the instruction.
    pub address: Word,
    /// Raw first word.
    pub word1: Word,
    /// Raw second word.
    pub word2: Word,
    /// Rendered mnemonic and operands.
    pub text: String,
}

/// Disassembles a flat instruction stream loaded at `origin`.
///
/// A trailing odd word is rendered as if its second word were zero.
#[must_use]
pub fn disassemble(origin: Word, words: &[Word]) -> Vec<DisassemblyRow> {
    words
        .chunks(2)
        .zip(0..)
        .map(|(pair, index): (&[Word], Word)| {
            let word1 = pair.first().copied().unwrap_or(0);
            let word2 = pair.get(1).copied().unwrap_or(0);
            DisassemblyRow {
                address: origin.wrapping_add(index * INSTRUCTION_WORDS),
                word1,
                word2,
                text: crate::decode(word1, word2).to_string(),
            }
        })
        .collect()
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(addr) => write!(f, "[{addr}]"),
            Self::Indexed { base, offset } => write!(f, "[{base} + {offset}]"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(reg) => write!(f, "{reg}"),
            Self::Literal(value) => write!(f, "{value}"),
        }
    }
}

impl fmt::Display for AluInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.op {
            AluOp::Nop => return f.write_str("alu.nop"),
            AluOp::SetLiteral => return write!(f, "set {}, {}", self.target, self.operand),
            AluOp::Copy => return write!(f, "copy {}, {}", self.target, self.source),
            AluOp::Add | AluOp::AddLiteral => "add",
            AluOp::Subtract | AluOp::SubtractLiteral => "sub",
            AluOp::Multiply | AluOp::MultiplyLiteral => "mul",
            AluOp::Divide | AluOp::DivideLiteral => "div",
        };
        write!(f, "{name} {}, {}, {}", self.target, self.source, self.operand)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Equal => "jeq",
            Self::NotEqual => "jne",
            Self::Less => "jlt",
            Self::LessEqual => "jle",
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nop => f.write_str("nop"),
            Self::Alu(alu) => write!(f, "{alu}"),
            Self::Load(LoadInstruction::Nop) => f.write_str("load.nop"),
            Self::Load(LoadInstruction::Load { target, address }) => {
                write!(f, "load {target}, {address}")
            }
            Self::Store(StoreInstruction { source, address }) => {
                write!(f, "store {address}, {source}")
            }
            Self::Branch(branch) => match branch {
                BranchInstruction::Nop => f.write_str("branch.nop"),
                BranchInstruction::Jump { target } => write!(f, "jmp {target}"),
                BranchInstruction::JumpRegister { base, offset } => {
                    write!(f, "jmp {base} + {offset}")
                }
                BranchInstruction::Compare {
                    condition,
                    lhs,
                    rhs,
                    target: BranchTarget::Literal(target),
                } => write!(f, "{condition} {lhs}, {rhs}, {target}"),
                BranchInstruction::Compare {
                    condition,
                    lhs,
                    rhs,
                    target: BranchTarget::Register(target),
                } => write!(f, "{condition} {lhs}, {rhs}, {target}"),
                BranchInstruction::Break => f.write_str("break"),
            },
            Self::Interrupt(InterruptInstruction::SetInterrupt { id, source }) => {
                write!(f, "setint {id}, {source}")
            }
            Self::Interrupt(InterruptInstruction::CallInterrupt { id }) => write!(f, "int {id}"),
            Self::Interrupt(InterruptInstruction::InterruptReturn) => f.write_str("iret"),
            Self::Stack(StackInstruction::Push) => f.write_str("push"),
            Self::Stack(StackInstruction::Pop) => f.write_str("pop"),
            Self::Stack(StackInstruction::PushAndStore { source }) => write!(f, "push {source}"),
            Self::Stack(StackInstruction::PopAndLoad { target }) => write!(f, "pop {target}"),
            Self::Invalid(code) => write!(f, ".invalid ; {code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::disassemble;
    use crate::asm;
    use crate::state::Register;
    use rstest::rstest;

    #[rstest]
    #[case(asm::set_literal(Register::R0, 5), "set r0, 5")]
    #[case(asm::add(Register::R0, Register::R0, Register::R1), "add r0, r0, r1")]
    #[case(asm::add_literal(Register::R3, Register::R3, -1), "add r3, r3, -1")]
    #[case(asm::load_literal(Register::R5, 3600), "load r5, [3600]")]
    #[case(asm::store_indexed(Register::R3, Register::R5, 3589), "store [r3 + 3589], r5")]
    #[case(asm::jump_equal(Register::R2, Register::R3, 40), "jeq r2, r3, 40")]
    #[case(asm::jump_less_register(Register::R1, Register::R0, Register::R9), "jlt r1, r0, r9")]
    #[case(asm::push_and_store(Register::R4), "push r4")]
    #[case(asm::interrupt_return(), "iret")]
    #[case(asm::breakpoint(), "break")]
    #[case([0x0900_0000, 0], ".invalid ; unknown unit code")]
    fn mnemonics_render_operands(#[case] pair: [i32; 2], #[case] expected: &str) {
        assert_eq!(crate::decode(pair[0], pair[1]).to_string(), expected);
    }

    #[test]
    fn stream_rows_advance_by_instruction_width() {
        let words = asm::assemble(&[asm::set_literal(Register::R1, 2), asm::breakpoint()]);
        let rows = disassemble(100, &words);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].address, 102);
        assert_eq!(rows[1].text, "break");
    }
}
