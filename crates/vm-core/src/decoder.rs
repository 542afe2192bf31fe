//! Decoding of raw instruction pairs into a closed instruction type.

use crate::encoding::{
    AluOp, BranchOp, InterruptOp, LoadOp, StackOp, StoreOp, UnitCode, WordFields,
};
use crate::memory::Word;
use crate::state::{Register, RegisterFile};
use crate::FaultCode;

/// Memory operand of a load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// Absolute address held in word 2.
    Literal(Word),
    /// `reg[base] + offset`.
    Indexed {
        /// Base register.
        base: Register,
        /// Literal offset from word 2.
        offset: Word,
    },
}

impl Address {
    /// Resolves the effective address against the register file.
    #[must_use]
    pub const fn resolve(self, regs: &RegisterFile) -> Word {
        match self {
            Self::Literal(addr) => addr,
            Self::Indexed { base, offset } => regs.get(base).wrapping_add(offset),
        }
    }
}

/// Second ALU operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Register named by word 2.
    Register(Register),
    /// Literal held in word 2.
    Literal(Word),
}

impl Operand {
    /// Returns the operand value.
    #[must_use]
    pub const fn value(self, regs: &RegisterFile) -> Word {
        match self {
            Self::Register(reg) => regs.get(reg),
            Self::Literal(value) => value,
        }
    }
}

/// Decoded ALU instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AluInstruction {
    /// Operation.
    pub op: AluOp,
    /// Destination register (byte `a`).
    pub target: Register,
    /// First source register (byte `b`).
    pub source: Register,
    /// Second operand from word 2.
    pub operand: Operand,
}

/// Decoded load instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadInstruction {
    /// Completes immediately.
    Nop,
    /// Reads one word into `target`.
    Load {
        /// Destination register.
        target: Register,
        /// Source address.
        address: Address,
    },
}

/// Decoded store instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreInstruction {
    /// Register whose value is written.
    pub source: Register,
    /// Destination address.
    pub address: Address,
}

/// Comparison applied by conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// `lhs == rhs`.
    Equal,
    /// `lhs != rhs`.
    NotEqual,
    /// `lhs < rhs`.
    Less,
    /// `lhs <= rhs`.
    LessEqual,
}

impl Condition {
    /// Evaluates the comparison.
    #[must_use]
    pub const fn holds(self, lhs: Word, rhs: Word) -> bool {
        match self {
            Self::Equal => lhs == rhs,
            Self::NotEqual => lhs != rhs,
            Self::Less => lhs < rhs,
            Self::LessEqual => lhs <= rhs,
        }
    }
}

/// Destination of a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchTarget {
    /// Absolute address from word 2.
    Literal(Word),
    /// Address held in the register named by word 2.
    Register(Register),
}

/// Decoded branch instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchInstruction {
    /// Fall through.
    Nop,
    /// Unconditional jump to a literal address.
    Jump {
        /// Target address.
        target: Word,
    },
    /// Unconditional jump to `reg[base] + offset`.
    JumpRegister {
        /// Base register.
        base: Register,
        /// Literal offset.
        offset: Word,
    },
    /// Conditional jump comparing two registers.
    Compare {
        /// Comparison.
        condition: Condition,
        /// Left operand (byte `a`).
        lhs: Register,
        /// Right operand (byte `b`).
        rhs: Register,
        /// Where to go when the comparison holds.
        target: BranchTarget,
    },
    /// Breakpoint.
    Break,
}

/// Decoded interrupt instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptInstruction {
    /// Installs `reg[source]` as the handler for vector `id`.
    SetInterrupt {
        /// Vector slot.
        id: Word,
        /// Register holding the handler address.
        source: Register,
    },
    /// Raises interrupt `id` through the interrupt controller.
    CallInterrupt {
        /// Interrupt id.
        id: Word,
    },
    /// Leaves the active handler.
    InterruptReturn,
}

/// Decoded stack instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackInstruction {
    /// Decrement SP.
    Push,
    /// Increment SP.
    Pop,
    /// Store a register at the stack top, then decrement SP.
    PushAndStore {
        /// Register to save.
        source: Register,
    },
    /// Increment SP, then load the stack top into a register.
    PopAndLoad {
        /// Register to restore.
        target: Register,
    },
}

/// Fully decoded instruction. Undecodable pairs become [`Instruction::Invalid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Unit code 0.
    Nop,
    /// Arithmetic unit.
    Alu(AluInstruction),
    /// Load unit.
    Load(LoadInstruction),
    /// Store unit.
    Store(StoreInstruction),
    /// Branch unit.
    Branch(BranchInstruction),
    /// Interrupt instructions.
    Interrupt(InterruptInstruction),
    /// Stack engine.
    Stack(StackInstruction),
    /// Encoding that cannot be executed, with the reason.
    Invalid(FaultCode),
}

impl Instruction {
    /// Returns the fault an invalid encoding raises when dispatched.
    #[must_use]
    pub const fn fault_code(self) -> Option<FaultCode> {
        match self {
            Self::Invalid(code) => Some(code),
            _ => None,
        }
    }
}

fn reg(byte: u8) -> Result<Register, FaultCode> {
    Register::from_u8(byte).ok_or(FaultCode::RegisterOutOfRange)
}

fn reg_word(word: Word) -> Result<Register, FaultCode> {
    Register::from_word(word).ok_or(FaultCode::RegisterOutOfRange)
}

/// Decodes an instruction pair. Never fails; bad encodings decode to `Invalid`.
#[must_use]
pub fn decode(word1: Word, word2: Word) -> Instruction {
    decode_checked(word1, word2).unwrap_or_else(Instruction::Invalid)
}

fn decode_checked(word1: Word, word2: Word) -> Result<Instruction, FaultCode> {
    let fields = WordFields::split(word1);
    let unit = UnitCode::from_u8(fields.unit).ok_or(FaultCode::UnknownUnit)?;
    match unit {
        UnitCode::Nop => Ok(Instruction::Nop),
        UnitCode::Alu => decode_alu(fields, word2).map(Instruction::Alu),
        UnitCode::Load => decode_load(fields, word2).map(Instruction::Load),
        UnitCode::Store => decode_store(fields, word2).map(Instruction::Store),
        UnitCode::Branch => decode_branch(fields, word2).map(Instruction::Branch),
        UnitCode::Fetch => Err(FaultCode::ReservedUnit),
        UnitCode::Interrupt => decode_interrupt(fields, word2).map(Instruction::Interrupt),
        UnitCode::Stack => decode_stack(fields, word2).map(Instruction::Stack),
    }
}

fn decode_alu(fields: WordFields, word2: Word) -> Result<AluInstruction, FaultCode> {
    let op = AluOp::from_u8(fields.op).ok_or(FaultCode::UnknownOperation)?;
    let operand = match op {
        AluOp::Add | AluOp::Subtract | AluOp::Multiply | AluOp::Divide => {
            Operand::Register(reg_word(word2)?)
        }
        AluOp::Nop
        | AluOp::SetLiteral
        | AluOp::AddLiteral
        | AluOp::SubtractLiteral
        | AluOp::MultiplyLiteral
        | AluOp::DivideLiteral
        | AluOp::Copy => Operand::Literal(word2),
    };
    Ok(AluInstruction {
        op,
        target: reg(fields.a)?,
        source: reg(fields.b)?,
        operand,
    })
}

fn decode_load(fields: WordFields, word2: Word) -> Result<LoadInstruction, FaultCode> {
    let op = LoadOp::from_u8(fields.op).ok_or(FaultCode::UnknownOperation)?;
    let address = match op {
        LoadOp::Nop => return Ok(LoadInstruction::Nop),
        LoadOp::FromRegisterLocation => Address::Indexed {
            base: reg(fields.b)?,
            offset: word2,
        },
        LoadOp::FromLiteralLocation => Address::Literal(word2),
    };
    Ok(LoadInstruction::Load {
        target: reg(fields.a)?,
        address,
    })
}

fn decode_store(fields: WordFields, word2: Word) -> Result<StoreInstruction, FaultCode> {
    let op = StoreOp::from_u8(fields.op).ok_or(FaultCode::UnknownOperation)?;
    let address = match op {
        StoreOp::ToRegisterLocation => Address::Indexed {
            base: reg(fields.a)?,
            offset: word2,
        },
        StoreOp::ToLiteralLocation => Address::Literal(word2),
    };
    Ok(StoreInstruction {
        source: reg(fields.b)?,
        address,
    })
}

fn decode_branch(fields: WordFields, word2: Word) -> Result<BranchInstruction, FaultCode> {
    let op = BranchOp::from_u8(fields.op).ok_or(FaultCode::UnknownOperation)?;
    let compare = |condition, target| -> Result<BranchInstruction, FaultCode> {
        Ok(BranchInstruction::Compare {
            condition,
            lhs: reg(fields.a)?,
            rhs: reg(fields.b)?,
            target,
        })
    };
    match op {
        BranchOp::Nop => Ok(BranchInstruction::Nop),
        BranchOp::Jump => Ok(BranchInstruction::Jump { target: word2 }),
        BranchOp::JumpRegister => Ok(BranchInstruction::JumpRegister {
            base: reg(fields.b)?,
            offset: word2,
        }),
        BranchOp::Break => Ok(BranchInstruction::Break),
        BranchOp::JumpEqual => compare(Condition::Equal, BranchTarget::Literal(word2)),
        BranchOp::JumpNotEqual => compare(Condition::NotEqual, BranchTarget::Literal(word2)),
        BranchOp::JumpLess => compare(Condition::Less, BranchTarget::Literal(word2)),
        BranchOp::JumpLessEqual => compare(Condition::LessEqual, BranchTarget::Literal(word2)),
        BranchOp::JumpEqualRegister => compare(
            Condition::Equal,
            BranchTarget::Register(reg_word(word2)?),
        ),
        BranchOp::JumpNotEqualRegister => compare(
            Condition::NotEqual,
            BranchTarget::Register(reg_word(word2)?),
        ),
        BranchOp::JumpLessRegister => {
            compare(Condition::Less, BranchTarget::Register(reg_word(word2)?))
        }
        BranchOp::JumpLessEqualRegister => compare(
            Condition::LessEqual,
            BranchTarget::Register(reg_word(word2)?),
        ),
    }
}

fn decode_interrupt(fields: WordFields, word2: Word) -> Result<InterruptInstruction, FaultCode> {
    match InterruptOp::from_u8(fields.op).ok_or(FaultCode::UnknownOperation)? {
        InterruptOp::SetInterrupt => Ok(InterruptInstruction::SetInterrupt {
            id: word2,
            source: reg(fields.b)?,
        }),
        InterruptOp::CallInterrupt => Ok(InterruptInstruction::CallInterrupt { id: word2 }),
        InterruptOp::InterruptReturn => Ok(InterruptInstruction::InterruptReturn),
    }
}

fn decode_stack(fields: WordFields, word2: Word) -> Result<StackInstruction, FaultCode> {
    match StackOp::from_u8(fields.op).ok_or(FaultCode::UnknownOperation)? {
        StackOp::Push => Ok(StackInstruction::Push),
        StackOp::Pop => Ok(StackInstruction::Pop),
        StackOp::PushAndStore => Ok(StackInstruction::PushAndStore {
            source: reg_word(word2)?,
        }),
        StackOp::PopAndLoad => Ok(StackInstruction::PopAndLoad {
            target: reg_word(word2)?,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode_word1;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn add_decodes_register_operand_from_word2() {
        let word1 = encode_word1(UnitCode::Alu, AluOp::Add.as_u8(), 0, 0);
        assert_eq!(
            decode(word1, 1),
            Instruction::Alu(AluInstruction {
                op: AluOp::Add,
                target: Register::R0,
                source: Register::R0,
                operand: Operand::Register(Register::R1),
            })
        );
    }

    #[test]
    fn register_branch_reads_target_register_from_word2() {
        let word1 = encode_word1(UnitCode::Branch, BranchOp::JumpLessRegister.as_u8(), 2, 3);
        assert_eq!(
            decode(word1, 7),
            Instruction::Branch(BranchInstruction::Compare {
                condition: Condition::Less,
                lhs: Register::R2,
                rhs: Register::R3,
                target: BranchTarget::Register(Register::R7),
            })
        );
    }

    #[rstest]
    #[case(encode_word1(UnitCode::Alu, AluOp::Add.as_u8(), 16, 0), 0, FaultCode::RegisterOutOfRange)]
    #[case(encode_word1(UnitCode::Alu, AluOp::Add.as_u8(), 0, 0), 16, FaultCode::RegisterOutOfRange)]
    #[case(encode_word1(UnitCode::Alu, 0x40, 0, 0), 0, FaultCode::UnknownOperation)]
    #[case(encode_word1(UnitCode::Fetch, 0, 0, 0), 0, FaultCode::ReservedUnit)]
    #[case(0x0900_0000, 0, FaultCode::UnknownUnit)]
    #[case(encode_word1(UnitCode::Stack, StackOp::PopAndLoad.as_u8(), 0, 0), -1, FaultCode::RegisterOutOfRange)]
    fn malformed_pairs_decode_to_invalid(
        #[case] word1: Word,
        #[case] word2: Word,
        #[case] expected: FaultCode,
    ) {
        assert_eq!(decode(word1, word2), Instruction::Invalid(expected));
    }

    #[test]
    fn indexed_address_wraps_instead_of_overflowing() {
        let mut regs = RegisterFile::new(0);
        regs.set(Register::R1, Word::MAX);
        let address = Address::Indexed {
            base: Register::R1,
            offset: 1,
        };
        assert_eq!(address.resolve(&regs), Word::MIN);
    }

    proptest! {
        #[test]
        fn decode_is_total_and_deterministic(word1 in any::<i32>(), word2 in any::<i32>()) {
            let first = decode(word1, word2);
            prop_assert_eq!(first, decode(word1, word2));
            if WordFields::split(word1).unit > 7 {
                prop_assert_eq!(first, Instruction::Invalid(FaultCode::UnknownUnit));
            }
        }
    }
}
