//! Instruction word layout and per-unit operation tables.
//!
//! Word 1 packs `unit << 24 | op << 16 | a << 8 | b`. Word 2 carries a
//! literal, an address, or (for some forms) a register index.

use crate::memory::Word;

/// Execution-unit selector held in the top byte of word 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum UnitCode {
    /// No operation; re-dispatches.
    Nop = 0,
    /// Arithmetic unit.
    Alu = 1,
    /// Load unit.
    Load = 2,
    /// Store unit.
    Store = 3,
    /// Branch unit.
    Branch = 4,
    /// Reserved for the fetch unit; never dispatchable.
    Fetch = 5,
    /// Interrupt instructions.
    Interrupt = 6,
    /// Stack engine.
    Stack = 7,
}

impl UnitCode {
    /// Decodes a unit byte.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Nop),
            1 => Some(Self::Alu),
            2 => Some(Self::Load),
            3 => Some(Self::Store),
            4 => Some(Self::Branch),
            5 => Some(Self::Fetch),
            6 => Some(Self::Interrupt),
            7 => Some(Self::Stack),
            _ => None,
        }
    }
}

macro_rules! op_table {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            /// Decodes an operation byte.
            #[must_use]
            pub const fn from_u8(code: u8) -> Option<Self> {
                match code {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Returns the operation byte.
            #[must_use]
            pub const fn as_u8(self) -> u8 {
                self as u8
            }
        }
    };
}

op_table! {
    /// Arithmetic unit operations.
    AluOp {
        /// No operation.
        Nop = 0,
        /// `target = w2`.
        SetLiteral = 1,
        /// `target = source + reg[w2]`.
        Add = 2,
        /// `target = source + w2`.
        AddLiteral = 3,
        /// `target = source - reg[w2]`.
        Subtract = 4,
        /// `target = source - w2`.
        SubtractLiteral = 5,
        /// `target = source * reg[w2]`.
        Multiply = 6,
        /// `target = source * w2`.
        MultiplyLiteral = 7,
        /// `target = source / reg[w2]`.
        Divide = 8,
        /// `target = source / w2`.
        DivideLiteral = 9,
        /// `target = source`.
        Copy = 10,
    }
}

op_table! {
    /// Load unit operations.
    LoadOp {
        /// Completes without touching the bus.
        Nop = 0,
        /// Address is `reg[b] + w2`.
        FromRegisterLocation = 1,
        /// Address is `w2`.
        FromLiteralLocation = 2,
    }
}

op_table! {
    /// Store unit operations.
    StoreOp {
        /// Address is `reg[a] + w2`.
        ToRegisterLocation = 0,
        /// Address is `w2`.
        ToLiteralLocation = 1,
    }
}

op_table! {
    /// Branch unit operations.
    BranchOp {
        /// Fall through.
        Nop = 0,
        /// `ip = w2`.
        Jump = 1,
        /// Jump to `w2` when `reg[a] != reg[b]`.
        JumpNotEqual = 2,
        /// Jump to `w2` when `reg[a] == reg[b]`.
        JumpEqual = 3,
        /// Jump to `w2` when `reg[a] <= reg[b]`.
        JumpLessEqual = 4,
        /// Jump to `w2` when `reg[a] < reg[b]`.
        JumpLess = 5,
        /// Breakpoint; falls through.
        Break = 6,
        /// `ip = reg[b] + w2`.
        JumpRegister = 7,
        /// Jump to `reg[w2]` when `reg[a] != reg[b]`.
        JumpNotEqualRegister = 8,
        /// Jump to `reg[w2]` when `reg[a] == reg[b]`.
        JumpEqualRegister = 9,
        /// Jump to `reg[w2]` when `reg[a] <= reg[b]`.
        JumpLessEqualRegister = 10,
        /// Jump to `reg[w2]` when `reg[a] < reg[b]`.
        JumpLessRegister = 11,
    }
}

op_table! {
    /// Interrupt instructions.
    InterruptOp {
        /// Writes `reg[b]` into vector slot `w2`.
        SetInterrupt = 0,
        /// Raises interrupt `w2`.
        CallInterrupt = 1,
        /// Returns from the active interrupt handler.
        InterruptReturn = 2,
    }
}

op_table! {
    /// Stack engine operations. The register operand lives in word 2.
    StackOp {
        /// Store `reg[w2]` at the stack top, then decrement SP.
        PushAndStore = 0,
        /// Increment SP, then load the stack top into `reg[w2]`.
        PopAndLoad = 1,
        /// Increment SP.
        Pop = 2,
        /// Decrement SP.
        Push = 3,
    }
}

/// Byte fields of instruction word 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WordFields {
    /// Unit byte.
    pub unit: u8,
    /// Operation byte.
    pub op: u8,
    /// First operand byte.
    pub a: u8,
    /// Second operand byte.
    pub b: u8,
}

impl WordFields {
    /// Splits word 1 into its byte fields.
    #[must_use]
    pub const fn split(word1: Word) -> Self {
        let [unit, op, a, b] = word1.to_be_bytes();
        Self { unit, op, a, b }
    }

    /// Packs byte fields back into word 1.
    #[must_use]
    pub const fn pack(self) -> Word {
        Word::from_be_bytes([self.unit, self.op, self.a, self.b])
    }
}

/// Packs word 1 for `unit` with an operation byte and two operand bytes.
#[must_use]
pub const fn encode_word1(unit: UnitCode, op: u8, a: u8, b: u8) -> Word {
    WordFields {
        unit: unit as u8,
        op,
        a,
        b,
    }
    .pack()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_follow_byte_positions() {
        let fields = WordFields::split(0x0102_0304);
        assert_eq!(fields.unit, 1);
        assert_eq!(fields.op, 2);
        assert_eq!(fields.a, 3);
        assert_eq!(fields.b, 4);
        assert_eq!(fields.pack(), 0x0102_0304);
    }

    #[test]
    fn encode_matches_shift_layout() {
        let word = encode_word1(UnitCode::Branch, BranchOp::JumpEqual.as_u8(), 3, 2);
        assert_eq!(word, (4 << 24) | (3 << 16) | (3 << 8) | 2);
    }

    #[test]
    fn op_tables_reject_undefined_bytes() {
        assert_eq!(AluOp::from_u8(10), Some(AluOp::Copy));
        assert_eq!(AluOp::from_u8(11), None);
        assert_eq!(BranchOp::from_u8(11), Some(BranchOp::JumpLessRegister));
        assert_eq!(BranchOp::from_u8(12), None);
        assert_eq!(StoreOp::from_u8(2), None);
        assert_eq!(UnitCode::from_u8(8), None);
    }
}
