//! Bus messages and the terminal interconnect.

/// Message kinds and builders.
pub mod message;
/// Linked terminal pairs and their arena.
pub mod terminal;

pub use message::MessageKind;
pub use terminal::{Interconnect, TerminalId, DEFAULT_BUFFER_WORDS};
