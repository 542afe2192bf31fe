//! Architectural CPU state model primitives.

/// Register file types and storage model.
pub mod registers;
/// Host-facing run state.
pub mod run_state;

pub use registers::{Register, RegisterFile, GENERAL_REGISTER_COUNT, INITIAL_STACK_POINTER};
pub use run_state::RunState;
