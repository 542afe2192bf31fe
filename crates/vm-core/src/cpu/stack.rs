use crate::cpu::fetch::InstructionEntry;
use crate::cpu::stage::{PipelineStage, StageControl};
use crate::decoder::{Address, LoadInstruction, StackInstruction, StoreInstruction};
use crate::memory::RAM_START;
use crate::state::RegisterFile;
use crate::stats::{Counter, Counters};

/// Memory access the stack engine hands to the load or store unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delegation {
    /// Forward to the store unit.
    Store(InstructionEntry, StoreInstruction),
    /// Forward to the load unit.
    Load(InstructionEntry, LoadInstruction),
}

/// Stack-pointer arithmetic plus push/pop memory traffic.
#[derive(Debug, Clone, Default)]
pub struct StackEngine {
    pending: Option<(InstructionEntry, StackInstruction)>,
}

impl StackEngine {
    /// Hands an instruction to the engine.
    pub const fn accept(&mut self, entry: InstructionEntry, instruction: StackInstruction) {
        self.pending = Some((entry, instruction));
    }

    /// Adjusts SP and, for the memory forms, returns the access to delegate.
    ///
    /// Delegated accesses keep the Execution stage; the receiving unit
    /// completes the instruction on a later tick.
    pub fn tick(
        &mut self,
        stages: &mut StageControl,
        regs: &mut RegisterFile,
        stats: &mut Counters,
    ) -> Option<Delegation> {
        if !stages.is(PipelineStage::Execution) {
            return None;
        }
        let (entry, instruction) = self.pending.take()?;
        let top = |regs: &RegisterFile| Address::Literal(RAM_START.wrapping_add(regs.sp()));
        match instruction {
            StackInstruction::Push => {
                regs.set_sp(regs.sp().wrapping_sub(1));
            }
            StackInstruction::Pop => {
                regs.set_sp(regs.sp().wrapping_add(1));
            }
            StackInstruction::PushAndStore { source } => {
                let store = StoreInstruction {
                    source,
                    address: top(regs),
                };
                regs.set_sp(regs.sp().wrapping_sub(1));
                return Some(Delegation::Store(entry, store));
            }
            StackInstruction::PopAndLoad { target } => {
                regs.set_sp(regs.sp().wrapping_add(1));
                let load = LoadInstruction::Load {
                    target,
                    address: top(regs),
                };
                return Some(Delegation::Load(entry, load));
            }
        }
        stats.record(Counter::InstructionsExecuted);
        stages.request(PipelineStage::BranchPredict);
        None
    }
}
