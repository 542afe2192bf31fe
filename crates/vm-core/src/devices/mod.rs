//! Bus-attached peripherals.

/// BIOS ROM and bootloader image.
pub mod bios;
/// Block storage and disk images.
pub mod block;
/// Text display.
pub mod display;
/// Host keyboard.
pub mod keyboard;
/// Main memory.
pub mod ram;

pub use bios::{bootloader, Bios};
pub use block::{BlockDevice, BlockImage, BlockStoreError, BlockTimings, BLOCK_WORDS};
pub use display::{Cell, Display, DISPLAY_COLUMNS, DISPLAY_ROWS};
pub use keyboard::Keyboard;
pub use ram::Ram;

use crate::bus::{Interconnect, TerminalId};
use crate::memory::Word;

/// A peripheral ticked once per machine tick behind one bus terminal.
pub trait Device {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// First address the device answers to.
    fn base(&self) -> Word;

    /// Services the device's terminal for one tick.
    fn tick(&mut self, bus: &mut Interconnect);
}

/// A response held back for an access latency, then sent as soon as the
/// terminal accepts it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DelayedResponse {
    pending: Option<(u32, Vec<Word>)>,
}

impl DelayedResponse {
    pub(crate) const fn new() -> Self {
        Self { pending: None }
    }

    pub(crate) const fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn start(&mut self, latency: u32, message: Vec<Word>) {
        self.pending = Some((latency, message));
    }

    /// Counts down, then tries to send. Returns true once the response has left.
    pub(crate) fn tick(&mut self, bus: &mut Interconnect, terminal: TerminalId) -> bool {
        let Some((remaining, message)) = self.pending.as_mut() else {
            return false;
        };
        if *remaining > 0 {
            *remaining -= 1;
            return false;
        }
        if bus.send(terminal, message) {
            self.pending = None;
            return true;
        }
        false
    }
}

/// Clamps a requested read length to what fits in one response on `terminal`.
pub(crate) fn response_len(bus: &Interconnect, terminal: TerminalId, requested: Word) -> usize {
    let room = bus.capacity(terminal).saturating_sub(2);
    usize::try_from(requested).unwrap_or(0).min(room)
}
