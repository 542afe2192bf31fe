use crate::cpu::fetch::{FetchUnit, InstructionEntry};
use crate::cpu::stage::{PipelineStage, StageControl};
use crate::decoder::Instruction;
use crate::memory::Word;
use crate::stats::{Counter, Counters};

/// Picks the instruction at IP out of the fetch unit during `InstructionDispatch`.
#[derive(Debug, Clone, Default)]
pub struct DispatchUnit {
    last: Option<InstructionEntry>,
}

impl DispatchUnit {
    /// Most recently dispatched instruction.
    #[must_use]
    pub const fn last_dispatched(&self) -> Option<InstructionEntry> {
        self.last
    }

    /// Looks up and decodes the instruction at `ip`.
    ///
    /// Returns `None` outside `InstructionDispatch` or when the instruction has
    /// not been fetched yet; the latter counts as a miss.
    pub fn tick(
        &mut self,
        stages: &StageControl,
        fetch: &FetchUnit,
        ip: Word,
        stats: &mut Counters,
    ) -> Option<(InstructionEntry, Instruction)> {
        if !stages.is(PipelineStage::InstructionDispatch) {
            return None;
        }
        let Some(entry) = fetch.lookup(ip) else {
            stats.record(Counter::ICacheMisses);
            stats.record(Counter::FetchWaits);
            return None;
        };
        stats.record(Counter::ICacheHits);
        let instruction = entry.decode();
        tracing::trace!(address = entry.address, %instruction, "dispatch");
        self.last = Some(entry);
        Some((entry, instruction))
    }
}
