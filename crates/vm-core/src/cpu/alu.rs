use crate::cpu::fetch::InstructionEntry;
use crate::cpu::stage::{PipelineStage, StageControl};
use crate::decoder::AluInstruction;
use crate::encoding::AluOp;
use crate::memory::Word;
use crate::state::RegisterFile;
use crate::stats::{Counter, Counters};
use crate::{Fault, FaultCode};

/// Single-tick integer arithmetic.
#[derive(Debug, Clone, Default)]
pub struct ArithmeticUnit {
    pending: Option<(InstructionEntry, AluInstruction)>,
}

impl ArithmeticUnit {
    /// Hands an instruction to the unit.
    pub const fn accept(&mut self, entry: InstructionEntry, instruction: AluInstruction) {
        self.pending = Some((entry, instruction));
    }

    /// Returns true while an instruction is held.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Executes the held instruction during the Execution stage.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] for division by zero or `MIN / -1`.
    pub fn tick(
        &mut self,
        stages: &mut StageControl,
        regs: &mut RegisterFile,
        stats: &mut Counters,
    ) -> Result<(), Fault> {
        if !stages.is(PipelineStage::Execution) {
            return Ok(());
        }
        let Some((entry, instruction)) = self.pending.take() else {
            return Ok(());
        };
        if let Some(value) = evaluate(instruction, regs).map_err(|code| entry.fault(code))? {
            regs.set(instruction.target, value);
        }
        stats.record(Counter::InstructionsExecuted);
        stages.request(PipelineStage::BranchPredict);
        Ok(())
    }
}

/// Computes the value written to the target register, or `None` for `Nop`.
///
/// Addition, subtraction and multiplication wrap.
///
/// # Errors
///
/// Returns [`FaultCode::DivideByZero`] or [`FaultCode::DivideOverflow`].
pub fn evaluate(instruction: AluInstruction, regs: &RegisterFile) -> Result<Option<Word>, FaultCode> {
    let lhs = regs.get(instruction.source);
    let rhs = instruction.operand.value(regs);
    let value = match instruction.op {
        AluOp::Nop => return Ok(None),
        AluOp::SetLiteral => rhs,
        AluOp::Copy => lhs,
        AluOp::Add | AluOp::AddLiteral => lhs.wrapping_add(rhs),
        AluOp::Subtract | AluOp::SubtractLiteral => lhs.wrapping_sub(rhs),
        AluOp::Multiply | AluOp::MultiplyLiteral => lhs.wrapping_mul(rhs),
        AluOp::Divide | AluOp::DivideLiteral => {
            if rhs == 0 {
                return Err(FaultCode::DivideByZero);
            }
            lhs.checked_div(rhs).ok_or(FaultCode::DivideOverflow)?
        }
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Operand;
    use crate::state::Register;
    use rstest::rstest;

    fn instr(op: AluOp, operand: Operand) -> AluInstruction {
        AluInstruction {
            op,
            target: Register::R0,
            source: Register::R1,
            operand,
        }
    }

    fn regs() -> RegisterFile {
        let mut regs = RegisterFile::new(0);
        regs.set(Register::R1, 20);
        regs.set(Register::R2, 3);
        regs
    }

    #[rstest]
    #[case(AluOp::SetLiteral, Operand::Literal(-5), Some(-5))]
    #[case(AluOp::Copy, Operand::Literal(99), Some(20))]
    #[case(AluOp::Add, Operand::Register(Register::R2), Some(23))]
    #[case(AluOp::AddLiteral, Operand::Literal(1), Some(21))]
    #[case(AluOp::Subtract, Operand::Register(Register::R2), Some(17))]
    #[case(AluOp::SubtractLiteral, Operand::Literal(25), Some(-5))]
    #[case(AluOp::Multiply, Operand::Register(Register::R2), Some(60))]
    #[case(AluOp::MultiplyLiteral, Operand::Literal(-2), Some(-40))]
    #[case(AluOp::Divide, Operand::Register(Register::R2), Some(6))]
    #[case(AluOp::DivideLiteral, Operand::Literal(-7), Some(-2))]
    #[case(AluOp::Nop, Operand::Literal(0), None)]
    fn operations_compute_expected_values(
        #[case] op: AluOp,
        #[case] operand: Operand,
        #[case] expected: Option<Word>,
    ) {
        assert_eq!(evaluate(instr(op, operand), &regs()), Ok(expected));
    }

    #[test]
    fn division_traps_are_faults() {
        assert_eq!(
            evaluate(instr(AluOp::DivideLiteral, Operand::Literal(0)), &regs()),
            Err(FaultCode::DivideByZero)
        );
        let mut regs = regs();
        regs.set(Register::R1, Word::MIN);
        assert_eq!(
            evaluate(instr(AluOp::DivideLiteral, Operand::Literal(-1)), &regs),
            Err(FaultCode::DivideOverflow)
        );
    }

    #[test]
    fn unit_only_acts_in_execution_stage() {
        let mut unit = ArithmeticUnit::default();
        let mut stages = StageControl::default();
        let mut regs = regs();
        let mut stats = Counters::new();
        let entry = InstructionEntry {
            address: 10,
            word1: 0,
            word2: 0,
        };
        unit.accept(entry, instr(AluOp::SetLiteral, Operand::Literal(8)));

        unit.tick(&mut stages, &mut regs, &mut stats).expect("idle tick");
        assert!(unit.is_busy());

        stages.request(PipelineStage::Execution);
        stages.advance();
        unit.tick(&mut stages, &mut regs, &mut stats).expect("execute");
        assert_eq!(regs.get(Register::R0), 8);
        assert_eq!(stages.next(), PipelineStage::BranchPredict);
        assert_eq!(stats.instructions_executed, 1);
    }
}
