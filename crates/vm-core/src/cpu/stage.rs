use std::fmt;

/// Pipeline stage governing which units may act during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PipelineStage {
    /// Branch unit resolves control flow.
    BranchPredict,
    /// Dispatch hands the instruction at IP to its unit.
    #[default]
    InstructionDispatch,
    /// One execution unit owns the register file.
    Execution,
    /// Tickable, never requested by any unit.
    Retirement,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BranchPredict => "branch-predict",
            Self::InstructionDispatch => "dispatch",
            Self::Execution => "execution",
            Self::Retirement => "retirement",
        })
    }
}

/// Current and requested pipeline stage of one core.
///
/// Units read [`StageControl::current`] and request a transition with
/// [`StageControl::request`]; the core applies it once every unit has ticked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageControl {
    current: PipelineStage,
    next: PipelineStage,
}

impl StageControl {
    /// Stage every unit observes this tick.
    #[must_use]
    pub const fn current(&self) -> PipelineStage {
        self.current
    }

    /// Stage that becomes current at the end of this tick.
    #[must_use]
    pub const fn next(&self) -> PipelineStage {
        self.next
    }

    /// Returns true when the current stage is `stage`.
    #[must_use]
    pub fn is(&self, stage: PipelineStage) -> bool {
        self.current == stage
    }

    /// Requests the stage for the next tick.
    pub const fn request(&mut self, stage: PipelineStage) {
        self.next = stage;
    }

    /// Returns true when the pending transition enters `stage` from elsewhere.
    #[must_use]
    pub fn entering(&self, stage: PipelineStage) -> bool {
        self.current != stage && self.next == stage
    }

    /// Applies the requested transition.
    pub const fn advance(&mut self) {
        self.current = self.next;
    }
}
