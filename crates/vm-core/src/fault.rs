use thiserror::Error;

use crate::memory::Word;

/// Fault classes used for diagnostics aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Dispatch rejected an instruction encoding.
    Decode,
    /// An execution unit hit an arithmetic trap.
    Arithmetic,
    /// Control flow violated the interrupt model.
    Control,
}

/// Programming-model fault taxonomy. Every variant terminates the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum FaultCode {
    /// Top byte of word 1 names no execution unit.
    #[error("unknown unit code")]
    UnknownUnit = 0x01,
    /// Operation byte is not defined for the selected unit.
    #[error("unknown operation code")]
    UnknownOperation = 0x02,
    /// A register operand is not in `0..16`.
    #[error("register index out of range")]
    RegisterOutOfRange = 0x03,
    /// The unit code is reserved and cannot be dispatched.
    #[error("reserved unit code dispatched")]
    ReservedUnit = 0x04,
    /// Integer division with a zero divisor.
    #[error("integer division by zero")]
    DivideByZero = 0x05,
    /// Integer division overflowed (`MIN / -1`).
    #[error("integer division overflow")]
    DivideOverflow = 0x06,
    /// `InterruptReturn` executed while no interrupt was being serviced.
    #[error("interrupt return outside interrupt context")]
    ReturnOutsideInterrupt = 0x07,
}

impl FaultCode {
    /// Converts a fault code to its stable byte value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable byte value back into a fault code.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::UnknownUnit),
            0x02 => Some(Self::UnknownOperation),
            0x03 => Some(Self::RegisterOutOfRange),
            0x04 => Some(Self::ReservedUnit),
            0x05 => Some(Self::DivideByZero),
            0x06 => Some(Self::DivideOverflow),
            0x07 => Some(Self::ReturnOutsideInterrupt),
            _ => None,
        }
    }

    /// Returns the diagnostics class for this fault code.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::UnknownUnit
            | Self::UnknownOperation
            | Self::RegisterOutOfRange
            | Self::ReservedUnit => FaultClass::Decode,
            Self::DivideByZero | Self::DivideOverflow => FaultClass::Arithmetic,
            Self::ReturnOutsideInterrupt => FaultClass::Control,
        }
    }
}

/// A latched programming-model fault with the offending instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("{code} at address {address} [{word1:#010x} {word2:#010x}]")]
pub struct Fault {
    /// Fault cause.
    pub code: FaultCode,
    /// Address of the faulting instruction.
    pub address: Word,
    /// Raw first instruction word.
    pub word1: Word,
    /// Raw second instruction word.
    pub word2: Word,
}

impl Fault {
    /// Builds a fault for the instruction stored at `address`.
    #[must_use]
    pub const fn new(code: FaultCode, address: Word, word1: Word, word2: Word) -> Self {
        Self {
            code,
            address,
            word1,
            word2,
        }
    }
}
