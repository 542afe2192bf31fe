//! Interrupt controller: vector table on the bus plus per-core interrupt lines.

use std::collections::VecDeque;

use crate::bus::{message, Interconnect, MessageKind, TerminalId};
use crate::memory::{Word, PIC_LAST_INTERRUPT, PIC_START, PIC_VECTOR_SLOTS};

/// Signal delivered to a core at the top of its tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreSignal {
    /// An interrupt was raised.
    Interrupt,
}

/// Per-core signal queues written by the controller and drained by cores.
#[derive(Debug, Clone, Default)]
pub struct InterruptLines {
    queues: Vec<VecDeque<CoreSignal>>,
}

impl InterruptLines {
    /// Creates lines for `cores` cores.
    #[must_use]
    pub fn new(cores: usize) -> Self {
        Self {
            queues: vec![VecDeque::new(); cores],
        }
    }

    /// Queues an interrupt signal for `core`. Unknown cores are ignored.
    pub fn raise(&mut self, core: usize) {
        if let Some(queue) = self.queues.get_mut(core) {
            queue.push_back(CoreSignal::Interrupt);
        }
    }

    /// Drains `core`'s queue, returning true if an interrupt was raised.
    pub fn take(&mut self, core: usize) -> bool {
        self.queues.get_mut(core).is_some_and(|queue| {
            let raised = queue.contains(&CoreSignal::Interrupt);
            queue.clear();
            raised
        })
    }

    /// Returns true when `core` has undelivered signals.
    #[must_use]
    pub fn is_raised(&self, core: usize) -> bool {
        self.queues.get(core).is_some_and(|queue| !queue.is_empty())
    }
}

/// Bus-addressable interrupt vector table.
#[derive(Debug, Clone)]
pub struct InterruptController {
    terminal: TerminalId,
    vectors: Box<[Word]>,
    outgoing: Option<Vec<Word>>,
    boot_core: usize,
}

impl InterruptController {
    /// Creates a controller answering on `terminal` and raising `boot_core`.
    #[must_use]
    pub fn new(terminal: TerminalId, boot_core: usize) -> Self {
        Self {
            terminal,
            vectors: vec![0; PIC_VECTOR_SLOTS].into_boxed_slice(),
            outgoing: None,
            boot_core,
        }
    }

    fn slot(address: Word) -> Option<usize> {
        usize::try_from(address.wrapping_sub(PIC_START))
            .ok()
            .filter(|slot| *slot < PIC_VECTOR_SLOTS)
    }

    /// Reads a vector-table slot; unmapped addresses read as zero.
    #[must_use]
    pub fn vector(&self, address: Word) -> Word {
        Self::slot(address).map_or(0, |slot| self.vectors[slot])
    }

    /// Writes a vector-table slot; unmapped addresses are ignored.
    pub fn set_vector(&mut self, address: Word, value: Word) {
        if let Some(slot) = Self::slot(address) {
            self.vectors[slot] = value;
        }
    }

    /// Id of the most recently raised interrupt.
    #[must_use]
    pub fn last_interrupt(&self) -> Word {
        self.vector(PIC_LAST_INTERRUPT)
    }

    /// Records `id` as the latest interrupt and signals the boot core.
    pub fn raise(&mut self, id: Word, lines: &mut InterruptLines) {
        tracing::debug!(id, core = self.boot_core, "interrupt raised");
        self.set_vector(PIC_LAST_INTERRUPT, id);
        lines.raise(self.boot_core);
    }

    /// Sends any buffered response, then services one inbound message.
    ///
    /// A Read arriving while a response is still buffered stays in the
    /// terminal until the buffer drains.
    pub fn tick(&mut self, bus: &mut Interconnect, lines: &mut InterruptLines) {
        if let Some(response) = &self.outgoing {
            if bus.send(self.terminal, response) {
                self.outgoing = None;
            }
        }

        let Some((kind, address, value)) = bus.message(self.terminal).map(|msg| {
            (
                message::kind(msg),
                message::address(msg).unwrap_or(0),
                message::payload(msg).first().copied().unwrap_or(0),
            )
        }) else {
            return;
        };

        match kind {
            Some(MessageKind::Read) => {
                if self.outgoing.is_some() {
                    return;
                }
                bus.clear(self.terminal);
                let response = message::response(address, &[self.vector(address)]);
                if !bus.send(self.terminal, &response) {
                    self.outgoing = Some(response);
                }
            }
            Some(MessageKind::Write) => {
                bus.clear(self.terminal);
                self.set_vector(address, value);
            }
            Some(MessageKind::Interrupt) => {
                bus.clear(self.terminal);
                self.raise(address, lines);
            }
            Some(MessageKind::Response | MessageKind::Command) | None => {
                bus.clear(self.terminal);
                tracing::warn!(?kind, address, "interrupt controller dropped message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DEFAULT_BUFFER_WORDS;

    fn rig() -> (Interconnect, InterruptController, TerminalId, InterruptLines) {
        let mut bus = Interconnect::new();
        let (pic, far) = bus.link(1, DEFAULT_BUFFER_WORDS);
        (bus, InterruptController::new(pic, 0), far, InterruptLines::new(1))
    }

    fn deliver(bus: &mut Interconnect, from: TerminalId, msg: &[Word]) {
        assert!(bus.send(from, msg));
        for _ in 0..msg.len() {
            bus.tick();
        }
    }

    #[test]
    fn interrupt_message_records_id_and_raises_core() {
        let (mut bus, mut pic, far, mut lines) = rig();
        deliver(&mut bus, far, &message::interrupt(33));
        pic.tick(&mut bus, &mut lines);
        assert_eq!(pic.last_interrupt(), 33);
        assert!(lines.take(0));
        assert!(!lines.take(0));
    }

    #[test]
    fn write_then_read_returns_stored_vector() {
        let (mut bus, mut pic, far, mut lines) = rig();
        deliver(&mut bus, far, &message::write(40, 7777));
        pic.tick(&mut bus, &mut lines);
        assert_eq!(pic.vector(40), 7777);

        deliver(&mut bus, far, &message::read(40, 1));
        pic.tick(&mut bus, &mut lines);
        for _ in 0..3 {
            bus.tick();
        }
        assert_eq!(bus.message(far), Some(&message::response(40, &[7777])[..]));
    }

    #[test]
    fn read_waits_while_previous_response_is_buffered() {
        let (mut bus, mut pic, far, mut lines) = rig();
        deliver(&mut bus, far, &message::read(1, 1));
        pic.tick(&mut bus, &mut lines);
        for _ in 0..3 {
            bus.tick();
        }
        // The far end still holds the first response, so the second is buffered.
        deliver(&mut bus, far, &message::read(2, 1));
        pic.tick(&mut bus, &mut lines);
        assert!(pic.outgoing.is_some());

        deliver(&mut bus, far, &message::read(3, 1));
        pic.tick(&mut bus, &mut lines);
        assert!(bus.has_message(pic.terminal));

        bus.clear(far);
        pic.tick(&mut bus, &mut lines);
        assert!(!bus.has_message(pic.terminal));
        assert!(bus.is_sending(pic.terminal));
    }

    #[test]
    fn out_of_table_addresses_are_ignored() {
        let (_, mut pic, _, _) = rig();
        pic.set_vector(-1, 5);
        let past_end = Word::try_from(PIC_VECTOR_SLOTS).expect("table size fits a word");
        pic.set_vector(past_end, 5);
        assert_eq!(pic.vector(past_end), 0);
    }
}
