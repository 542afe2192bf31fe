//! Bus message layout.
//!
//! Element 0 is the [`MessageKind`], element 1 an address or interrupt id,
//! and the remainder is payload.

use crate::memory::Word;

/// Discriminator stored in element 0 of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(i32)]
pub enum MessageKind {
    /// `[Read, address, length]`.
    Read = 0,
    /// `[Write, address, value]`.
    Write = 1,
    /// `[Response, address, values...]`.
    Response = 2,
    /// Device-specific command.
    Command = 3,
    /// `[Interrupt, id]`.
    Interrupt = 4,
}

impl MessageKind {
    /// Decodes element 0 of a message.
    #[must_use]
    pub const fn from_word(word: Word) -> Option<Self> {
        match word {
            0 => Some(Self::Read),
            1 => Some(Self::Write),
            2 => Some(Self::Response),
            3 => Some(Self::Command),
            4 => Some(Self::Interrupt),
            _ => None,
        }
    }
}

/// Builds a read request for `len` words at `address`.
#[must_use]
pub const fn read(address: Word, len: Word) -> [Word; 3] {
    [MessageKind::Read as Word, address, len]
}

/// Builds a single-word write.
#[must_use]
pub const fn write(address: Word, value: Word) -> [Word; 3] {
    [MessageKind::Write as Word, address, value]
}

/// Builds an interrupt notification for `id`.
#[must_use]
pub const fn interrupt(id: Word) -> [Word; 2] {
    [MessageKind::Interrupt as Word, id]
}

/// Builds a response carrying `values` read from `address`.
#[must_use]
pub fn response(address: Word, values: &[Word]) -> Vec<Word> {
    let mut message = Vec::with_capacity(values.len() + 2);
    message.push(MessageKind::Response as Word);
    message.push(address);
    message.extend_from_slice(values);
    message
}

/// Kind of a received message, if recognisable.
#[must_use]
pub fn kind(message: &[Word]) -> Option<MessageKind> {
    message.first().copied().and_then(MessageKind::from_word)
}

/// Address (or interrupt id) field of a message.
#[must_use]
pub fn address(message: &[Word]) -> Option<Word> {
    message.get(1).copied()
}

/// Payload words following the address field.
#[must_use]
pub fn payload(message: &[Word]) -> &[Word] {
    message.get(2..).unwrap_or(&[])
}

/// Returns true when `message` is a response for `address`.
#[must_use]
pub fn is_response_for(message: &[Word], address: Word) -> bool {
    kind(message) == Some(MessageKind::Response) && self::address(message) == Some(address)
}
