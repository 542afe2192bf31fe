use crate::bus::{message, Interconnect, TerminalId};
use crate::cpu::fetch::InstructionEntry;
use crate::cpu::stage::{PipelineStage, StageControl};
use crate::decoder::StoreInstruction;
use crate::state::RegisterFile;
use crate::stats::{Counter, Counters};

/// Writes one register to the bus. Completes once the write is accepted for sending.
#[derive(Debug, Clone, Default)]
pub struct StoreUnit {
    pending: Option<(InstructionEntry, StoreInstruction)>,
}

impl StoreUnit {
    /// Hands an instruction to the unit.
    pub const fn accept(&mut self, entry: InstructionEntry, instruction: StoreInstruction) {
        self.pending = Some((entry, instruction));
    }

    /// Returns true while a store is waiting for the bus.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Instruction currently held by the unit.
    #[must_use]
    pub fn held(&self) -> Option<InstructionEntry> {
        self.pending.map(|(entry, _)| entry)
    }

    /// Attempts to send the write.
    pub fn tick(
        &mut self,
        bus: &mut Interconnect,
        terminal: TerminalId,
        stages: &mut StageControl,
        regs: &RegisterFile,
        stats: &mut Counters,
    ) {
        if !stages.is(PipelineStage::Execution) {
            return;
        }
        let Some((entry, instruction)) = self.pending else {
            return;
        };
        let address = instruction.address.resolve(regs);
        let value = regs.get(instruction.source);
        if bus.send(terminal, &message::write(address, value)) {
            tracing::trace!(at = entry.address, address, value, "store issued");
            self.pending = None;
            stats.record(Counter::InstructionsExecuted);
            stages.request(PipelineStage::BranchPredict);
        } else {
            stats.record(Counter::StoreWaits);
        }
    }
}
