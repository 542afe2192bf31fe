use crate::cpu::fetch::InstructionEntry;
use crate::cpu::stage::{PipelineStage, StageControl};
use crate::decoder::{BranchInstruction, BranchTarget};
use crate::memory::Word;
use crate::state::RegisterFile;
use crate::stats::{Counter, Counters};

/// Resolves the next instruction pointer during `BranchPredict`.
#[derive(Debug, Clone, Default)]
pub struct BranchUnit {
    pending: Option<(InstructionEntry, BranchInstruction)>,
}

impl BranchUnit {
    /// Hands an instruction to the unit.
    pub const fn accept(&mut self, entry: InstructionEntry, instruction: BranchInstruction) {
        self.pending = Some((entry, instruction));
    }

    /// Updates IP and returns to dispatch.
    ///
    /// Without a held branch the IP simply moves past the instruction that
    /// just executed. Returns the address of a `Break` when one executes.
    pub fn tick(
        &mut self,
        stages: &mut StageControl,
        regs: &mut RegisterFile,
        stats: &mut Counters,
    ) -> Option<Word> {
        if !stages.is(PipelineStage::BranchPredict) {
            return None;
        }
        stages.request(PipelineStage::InstructionDispatch);

        let Some((entry, instruction)) = self.pending.take() else {
            regs.advance_ip();
            return None;
        };
        stats.record(Counter::InstructionsExecuted);
        match instruction {
            BranchInstruction::Nop => regs.advance_ip(),
            BranchInstruction::Jump { target } => regs.set_ip(target),
            BranchInstruction::JumpRegister { base, offset } => {
                regs.set_ip(regs.get(base).wrapping_add(offset));
            }
            BranchInstruction::Compare {
                condition,
                lhs,
                rhs,
                target,
            } => {
                if condition.holds(regs.get(lhs), regs.get(rhs)) {
                    let target = match target {
                        BranchTarget::Literal(address) => address,
                        BranchTarget::Register(reg) => regs.get(reg),
                    };
                    regs.set_ip(target);
                } else {
                    regs.advance_ip();
                }
            }
            BranchInstruction::Break => {
                regs.advance_ip();
                tracing::info!(address = entry.address, "breakpoint");
                return Some(entry.address);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Condition;
    use crate::state::Register;
    use rstest::rstest;

    fn run(instruction: Option<BranchInstruction>, regs: &mut RegisterFile) -> Option<Word> {
        let mut unit = BranchUnit::default();
        if let Some(instruction) = instruction {
            unit.accept(
                InstructionEntry {
                    address: regs.ip(),
                    word1: 0,
                    word2: 0,
                },
                instruction,
            );
        }
        let mut stages = StageControl::default();
        stages.request(PipelineStage::BranchPredict);
        stages.advance();
        let event = unit.tick(&mut stages, regs, &mut Counters::new());
        assert_eq!(stages.next(), PipelineStage::InstructionDispatch);
        event
    }

    fn regs() -> RegisterFile {
        let mut regs = RegisterFile::new(100);
        regs.set(Register::R1, 5);
        regs.set(Register::R2, 9);
        regs.set(Register::R3, 400);
        regs
    }

    #[rstest]
    #[case(None, 102)]
    #[case(Some(BranchInstruction::Nop), 102)]
    #[case(Some(BranchInstruction::Jump { target: 300 }), 300)]
    #[case(Some(BranchInstruction::JumpRegister { base: Register::R3, offset: 4 }), 404)]
    #[case(Some(BranchInstruction::Compare { condition: Condition::Less, lhs: Register::R1, rhs: Register::R2, target: BranchTarget::Literal(200) }), 200)]
    #[case(Some(BranchInstruction::Compare { condition: Condition::Equal, lhs: Register::R1, rhs: Register::R2, target: BranchTarget::Literal(200) }), 102)]
    #[case(Some(BranchInstruction::Compare { condition: Condition::NotEqual, lhs: Register::R1, rhs: Register::R2, target: BranchTarget::Register(Register::R3) }), 400)]
    #[case(Some(BranchInstruction::Compare { condition: Condition::LessEqual, lhs: Register::R2, rhs: Register::R1, target: BranchTarget::Register(Register::R3) }), 102)]
    fn branch_outcomes_set_ip(#[case] instruction: Option<BranchInstruction>, #[case] ip: Word) {
        let mut regs = regs();
        assert_eq!(run(instruction, &mut regs), None);
        assert_eq!(regs.ip(), ip);
    }

    #[test]
    fn break_falls_through_and_reports_its_address() {
        let mut regs = regs();
        assert_eq!(run(Some(BranchInstruction::Break), &mut regs), Some(100));
        assert_eq!(regs.ip(), 102);
    }
}
