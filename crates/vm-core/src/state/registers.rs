use std::fmt;

use crate::memory::{Word, BIOS_START, RAM_SIZE};

/// Number of general-purpose registers (`r0..r15`).
pub const GENERAL_REGISTER_COUNT: usize = 16;

/// Stack pointer value after reset. The stack grows down from the top of RAM.
pub const INITIAL_STACK_POINTER: Word = RAM_SIZE - 1;

/// General-purpose register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Register {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Register {
    /// Ordered list of all general-purpose registers.
    pub const ALL: [Self; GENERAL_REGISTER_COUNT] = [
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
        Self::R8,
        Self::R9,
        Self::R10,
        Self::R11,
        Self::R12,
        Self::R13,
        Self::R14,
        Self::R15,
    ];

    /// Returns the array index for this register (`0..=15`).
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decodes an operand byte into a register.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn from_u8(index: u8) -> Option<Self> {
        if (index as usize) < GENERAL_REGISTER_COUNT {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    /// Decodes a full word operand (word 2 register forms) into a register.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss
    )]
    pub const fn from_word(word: Word) -> Option<Self> {
        if word >= 0 && word < GENERAL_REGISTER_COUNT as Word {
            Some(Self::ALL[word as usize])
        } else {
            None
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.index())
    }
}

/// Register file owned by a single core.
///
/// Only the unit occupying the active pipeline stage mutates it, so it is
/// handed around by `&mut` rather than shared.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    gpr: [Word; GENERAL_REGISTER_COUNT],
    ip: Word,
    sp: Word,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new(BIOS_START)
    }
}

impl RegisterFile {
    /// Creates a zeroed register file that will start executing at `entry`.
    #[must_use]
    pub const fn new(entry: Word) -> Self {
        Self {
            gpr: [0; GENERAL_REGISTER_COUNT],
            ip: entry,
            sp: INITIAL_STACK_POINTER,
        }
    }

    /// Reads a general-purpose register.
    #[must_use]
    pub const fn get(&self, reg: Register) -> Word {
        self.gpr[reg.index()]
    }

    /// Writes a general-purpose register.
    pub const fn set(&mut self, reg: Register, value: Word) {
        self.gpr[reg.index()] = value;
    }

    /// All general-purpose registers in index order.
    #[must_use]
    pub const fn gprs(&self) -> &[Word; GENERAL_REGISTER_COUNT] {
        &self.gpr
    }

    /// Instruction pointer.
    #[must_use]
    pub const fn ip(&self) -> Word {
        self.ip
    }

    /// Sets the instruction pointer.
    pub const fn set_ip(&mut self, ip: Word) {
        self.ip = ip;
    }

    /// Advances the instruction pointer past one instruction.
    pub const fn advance_ip(&mut self) {
        self.ip = self.ip.wrapping_add(crate::memory::INSTRUCTION_WORDS);
    }

    /// Stack pointer, an offset from `RAM_START`.
    #[must_use]
    pub const fn sp(&self) -> Word {
        self.sp
    }

    /// Sets the stack pointer.
    pub const fn set_sp(&mut self, sp: Word) {
        self.sp = sp;
    }
}
