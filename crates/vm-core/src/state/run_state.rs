use crate::Fault;

/// Host-observable execution state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Ticking normally.
    #[default]
    Running,
    /// A fault is latched and no further progress is possible.
    FaultLatched(Fault),
}

impl RunState {
    /// Returns the currently latched fault, if any.
    #[must_use]
    pub const fn latched_fault(self) -> Option<Fault> {
        match self {
            Self::FaultLatched(fault) => Some(fault),
            Self::Running => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RunState;
    use crate::{Fault, FaultCode};

    #[test]
    fn run_state_default_is_running() {
        assert_eq!(RunState::default(), RunState::Running);
    }

    #[test]
    fn latched_fault_accessor_reports_only_fault_latched_variant() {
        let fault = Fault::new(FaultCode::DivideByZero, 10, 0, 0);
        assert_eq!(RunState::Running.latched_fault(), None);
        assert_eq!(RunState::FaultLatched(fault).latched_fault(), Some(fault));
    }
}
