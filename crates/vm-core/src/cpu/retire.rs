use crate::cpu::stage::{PipelineStage, StageControl};

/// Retirement stage. No unit requests it; if it is ever entered it hands
/// control straight back to `BranchPredict`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetireUnit;

impl RetireUnit {
    /// Ticks the stage.
    pub fn tick(self, stages: &mut StageControl) {
        if stages.is(PipelineStage::Retirement) {
            stages.request(PipelineStage::BranchPredict);
        }
    }
}
