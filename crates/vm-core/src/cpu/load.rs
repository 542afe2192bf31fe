use crate::bus::{message, Interconnect, TerminalId};
use crate::cpu::fetch::InstructionEntry;
use crate::cpu::stage::{PipelineStage, StageControl};
use crate::decoder::LoadInstruction;
use crate::memory::Word;
use crate::state::RegisterFile;
use crate::stats::{Counter, Counters};

#[derive(Debug, Clone, Copy)]
struct PendingLoad {
    entry: InstructionEntry,
    instruction: LoadInstruction,
    requested: Option<Word>,
}

/// Reads one word over the bus into a register.
#[derive(Debug, Clone, Default)]
pub struct LoadUnit {
    pending: Option<PendingLoad>,
}

impl LoadUnit {
    /// Hands an instruction to the unit.
    pub const fn accept(&mut self, entry: InstructionEntry, instruction: LoadInstruction) {
        self.pending = Some(PendingLoad {
            entry,
            instruction,
            requested: None,
        });
    }

    /// Returns true while a load is in flight.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Address of the outstanding bus read, if one has been sent.
    #[must_use]
    pub fn outstanding_address(&self) -> Option<Word> {
        self.pending.and_then(|pending| pending.requested)
    }

    /// Instruction currently held by the unit.
    #[must_use]
    pub fn held(&self) -> Option<InstructionEntry> {
        self.pending.map(|pending| pending.entry)
    }

    /// Sends the read, then waits for the matching response.
    pub fn tick(
        &mut self,
        bus: &mut Interconnect,
        terminal: TerminalId,
        stages: &mut StageControl,
        regs: &mut RegisterFile,
        stats: &mut Counters,
    ) {
        if !stages.is(PipelineStage::Execution) {
            return;
        }
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let (target, address) = match pending.instruction {
            LoadInstruction::Nop => {
                self.complete(stages, stats);
                return;
            }
            LoadInstruction::Load { target, address } => (target, address),
        };

        let Some(requested) = pending.requested else {
            let address = address.resolve(regs);
            if bus.send(terminal, &message::read(address, 1)) {
                pending.requested = Some(address);
            } else {
                stats.record(Counter::LoadWaits);
            }
            return;
        };

        let value = bus
            .message(terminal)
            .filter(|msg| message::is_response_for(msg, requested))
            .map(|msg| message::payload(msg).first().copied().unwrap_or(0));
        match value {
            Some(value) => {
                bus.clear(terminal);
                regs.set(target, value);
                self.complete(stages, stats);
            }
            None => stats.record(Counter::LoadWaits),
        }
    }

    fn complete(&mut self, stages: &mut StageControl, stats: &mut Counters) {
        if let Some(pending) = self.pending.take() {
            tracing::trace!(address = pending.entry.address, "load retired");
        }
        stats.record(Counter::InstructionsExecuted);
        stages.request(PipelineStage::BranchPredict);
    }
}
