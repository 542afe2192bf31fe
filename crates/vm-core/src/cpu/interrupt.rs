use crate::bus::{message, Interconnect, TerminalId};
use crate::cpu::fetch::InstructionEntry;
use crate::cpu::stage::{PipelineStage, StageControl};
use crate::memory::Word;
use crate::state::{Register, RegisterFile};
use crate::stats::{Counter, Counters};

/// Interrupt-controller request issued by software.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptRequest {
    /// Write `reg[source]` into vector slot `id`.
    Install {
        /// Vector slot.
        id: Word,
        /// Register holding the handler address.
        source: Register,
    },
    /// Raise interrupt `id`.
    Raise {
        /// Interrupt id.
        id: Word,
    },
}

/// Sends software interrupt requests to the interrupt controller.
#[derive(Debug, Clone, Default)]
pub struct InterruptUnit {
    pending: Option<(InstructionEntry, InterruptRequest)>,
}

impl InterruptUnit {
    /// Hands a request to the unit.
    pub const fn accept(&mut self, entry: InstructionEntry, request: InterruptRequest) {
        self.pending = Some((entry, request));
    }

    /// Attempts to send the held request.
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
        let Some((_, request)) = self.pending else {
            return;
        };
        let sent = match request {
            InterruptRequest::Install { id, source } => {
                bus.send(terminal, &message::write(id, regs.get(source)))
            }
            InterruptRequest::Raise { id } => bus.send(terminal, &message::interrupt(id)),
        };
        if sent {
            self.pending = None;
            stats.record(Counter::InstructionsExecuted);
            stages.request(PipelineStage::BranchPredict);
        } else {
            stats.record(Counter::InterruptWaits);
        }
    }
}
