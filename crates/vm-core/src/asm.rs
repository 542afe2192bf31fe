//! Builders for encoded instruction pairs.
//!
//! These produce the same words an external assembler would emit and are
//! used for the BIOS image, the CLI and tests.

use crate::encoding::{
    encode_word1, AluOp, BranchOp, InterruptOp, LoadOp, StackOp, StoreOp, UnitCode,
};
use crate::memory::Word;
use crate::state::Register;

/// One encoded instruction: `[word1, word2]`.
pub type Encoded = [Word; 2];

const fn alu(op: AluOp, target: Register, source: Register, word2: Word) -> Encoded {
    [
        encode_word1(UnitCode::Alu, op.as_u8(), target as u8, source as u8),
        word2,
    ]
}

const fn branch(op: BranchOp, a: Register, b: Register, word2: Word) -> Encoded {
    [
        encode_word1(UnitCode::Branch, op.as_u8(), a as u8, b as u8),
        word2,
    ]
}

/// Register index carried in word 2 by the register forms.
#[allow(clippy::cast_lossless)]
const fn operand(register: Register) -> Word {
    register as Word
}

const fn stack(op: StackOp, word2: Word) -> Encoded {
    [encode_word1(UnitCode::Stack, op.as_u8(), 0, 0), word2]
}

/// Flattens encoded pairs into a binary instruction stream.
#[must_use]
pub fn assemble(program: &[Encoded]) -> Vec<Word> {
    program.iter().flatten().copied().collect()
}

/// Unit-code zero no-op.
#[must_use]
pub const fn nop() -> Encoded {
    [0, 0]
}

/// `target = value`.
#[must_use]
pub const fn set_literal(target: Register, value: Word) -> Encoded {
    alu(AluOp::SetLiteral, target, Register::R0, value)
}

/// `target = source`.
#[must_use]
pub const fn copy(target: Register, source: Register) -> Encoded {
    alu(AluOp::Copy, target, source, 0)
}

/// `target = source + other`.
#[must_use]
pub const fn add(target: Register, source: Register, other: Register) -> Encoded {
    alu(AluOp::Add, target, source, operand(other))
}

/// `target = source + value`.
#[must_use]
pub const fn add_literal(target: Register, source: Register, value: Word) -> Encoded {
    alu(AluOp::AddLiteral, target, source, value)
}

/// `target = source - other`.
#[must_use]
pub const fn subtract(target: Register, source: Register, other: Register) -> Encoded {
    alu(AluOp::Subtract, target, source, operand(other))
}

/// `target = source - value`.
#[must_use]
pub const fn subtract_literal(target: Register, source: Register, value: Word) -> Encoded {
    alu(AluOp::SubtractLiteral, target, source, value)
}

/// `target = source * other`.
#[must_use]
pub const fn multiply(target: Register, source: Register, other: Register) -> Encoded {
    alu(AluOp::Multiply, target, source, operand(other))
}

/// `target = source * value`.
#[must_use]
pub const fn multiply_literal(target: Register, source: Register, value: Word) -> Encoded {
    alu(AluOp::MultiplyLiteral, target, source, value)
}

/// `target = source / other`.
#[must_use]
pub const fn divide(target: Register, source: Register, other: Register) -> Encoded {
    alu(AluOp::Divide, target, source, operand(other))
}

/// `target = source / value`.
#[must_use]
pub const fn divide_literal(target: Register, source: Register, value: Word) -> Encoded {
    alu(AluOp::DivideLiteral, target, source, value)
}

/// `target = [address]`.
#[must_use]
pub const fn load_literal(target: Register, address: Word) -> Encoded {
    [
        encode_word1(
            UnitCode::Load,
            LoadOp::FromLiteralLocation.as_u8(),
            target as u8,
            0,
        ),
        address,
    ]
}

/// `target = [base + offset]`.
#[must_use]
pub const fn load_indexed(target: Register, base: Register, offset: Word) -> Encoded {
    [
        encode_word1(
            UnitCode::Load,
            LoadOp::FromRegisterLocation.as_u8(),
            target as u8,
            base as u8,
        ),
        offset,
    ]
}

/// `[address] = source`.
#[must_use]
pub const fn store_literal(source: Register, address: Word) -> Encoded {
    [
        encode_word1(
            UnitCode::Store,
            StoreOp::ToLiteralLocation.as_u8(),
            0,
            source as u8,
        ),
        address,
    ]
}

/// `[base + offset] = source`.
#[must_use]
pub const fn store_indexed(base: Register, source: Register, offset: Word) -> Encoded {
    [
        encode_word1(
            UnitCode::Store,
            StoreOp::ToRegisterLocation.as_u8(),
            base as u8,
            source as u8,
        ),
        offset,
    ]
}

/// Unconditional jump to `target`.
#[must_use]
pub const fn jump(target: Word) -> Encoded {
    branch(BranchOp::Jump, Register::R0, Register::R0, target)
}

/// Unconditional jump to `base + offset`.
#[must_use]
pub const fn jump_register(base: Register, offset: Word) -> Encoded {
    branch(BranchOp::JumpRegister, Register::R0, base, offset)
}

/// Jump to `target` when `lhs == rhs`.
#[must_use]
pub const fn jump_equal(lhs: Register, rhs: Register, target: Word) -> Encoded {
    branch(BranchOp::JumpEqual, lhs, rhs, target)
}

/// Jump to `target` when `lhs != rhs`.
#[must_use]
pub const fn jump_not_equal(lhs: Register, rhs: Register, target: Word) -> Encoded {
    branch(BranchOp::JumpNotEqual, lhs, rhs, target)
}

/// Jump to `target` when `lhs < rhs`.
#[must_use]
pub const fn jump_less(lhs: Register, rhs: Register, target: Word) -> Encoded {
    branch(BranchOp::JumpLess, lhs, rhs, target)
}

/// Jump to `target` when `lhs <= rhs`.
#[must_use]
pub const fn jump_less_equal(lhs: Register, rhs: Register, target: Word) -> Encoded {
    branch(BranchOp::JumpLessEqual, lhs, rhs, target)
}

/// Jump to the address in `target` when `lhs == rhs`.
#[must_use]
pub const fn jump_equal_register(lhs: Register, rhs: Register, target: Register) -> Encoded {
    branch(BranchOp::JumpEqualRegister, lhs, rhs, operand(target))
}

/// Jump to the address in `target` when `lhs != rhs`.
#[must_use]
pub const fn jump_not_equal_register(lhs: Register, rhs: Register, target: Register) -> Encoded {
    branch(BranchOp::JumpNotEqualRegister, lhs, rhs, operand(target))
}

/// Jump to the address in `target` when `lhs < rhs`.
#[must_use]
pub const fn jump_less_register(lhs: Register, rhs: Register, target: Register) -> Encoded {
    branch(BranchOp::JumpLessRegister, lhs, rhs, operand(target))
}

/// Jump to the address in `target` when `lhs <= rhs`.
#[must_use]
pub const fn jump_less_equal_register(lhs: Register, rhs: Register, target: Register) -> Encoded {
    branch(BranchOp::JumpLessEqualRegister, lhs, rhs, operand(target))
}

/// Breakpoint.
#[must_use]
pub const fn breakpoint() -> Encoded {
    branch(BranchOp::Break, Register::R0, Register::R0, 0)
}

/// Installs `source` as the handler for vector `id`.
#[must_use]
pub const fn set_interrupt(id: Word, source: Register) -> Encoded {
    [
        encode_word1(
            UnitCode::Interrupt,
            InterruptOp::SetInterrupt.as_u8(),
            0,
            source as u8,
        ),
        id,
    ]
}

/// Raises interrupt `id`.
#[must_use]
pub const fn call_interrupt(id: Word) -> Encoded {
    [
        encode_word1(UnitCode::Interrupt, InterruptOp::CallInterrupt.as_u8(), 0, 0),
        id,
    ]
}

/// Returns from an interrupt handler.
#[must_use]
pub const fn interrupt_return() -> Encoded {
    [
        encode_word1(UnitCode::Interrupt, InterruptOp::InterruptReturn.as_u8(), 0, 0),
        0,
    ]
}

/// Decrements SP.
#[must_use]
pub const fn push() -> Encoded {
    stack(StackOp::Push, 0)
}

/// Increments SP.
#[must_use]
pub const fn pop() -> Encoded {
    stack(StackOp::Pop, 0)
}

/// Saves `source` on the stack.
#[must_use]
pub const fn push_and_store(source: Register) -> Encoded {
    stack(StackOp::PushAndStore, operand(source))
}

/// Restores `target` from the stack.
#[must_use]
pub const fn pop_and_load(target: Register) -> Encoded {
    stack(StackOp::PopAndLoad, operand(target))
}
