use std::collections::VecDeque;

use crate::bus::{message, Interconnect, MessageKind, TerminalId};
use crate::devices::Device;
use crate::memory::{Word, KEYBOARD_INTERRUPT, KEYBOARD_REGISTER};

/// Host keyboard. Each key pressed raises the keyboard interrupt once;
/// reading the data register returns the most recent key.
#[derive(Debug, Clone)]
pub struct Keyboard {
    terminal: TerminalId,
    queued: VecDeque<Word>,
    current: Word,
    announcing: Option<Word>,
}

impl Keyboard {
    /// Creates an idle keyboard answering on `terminal`.
    #[must_use]
    pub const fn new(terminal: TerminalId) -> Self {
        Self {
            terminal,
            queued: VecDeque::new(),
            current: 0,
            announcing: None,
        }
    }

    /// Queues a key code from the host.
    pub fn press(&mut self, code: Word) {
        self.queued.push_back(code);
    }

    /// Most recently delivered key code.
    #[must_use]
    pub const fn current(&self) -> Word {
        self.current
    }

    /// Keys not yet announced to the machine.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.len() + usize::from(self.announcing.is_some())
    }
}

impl Device for Keyboard {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn base(&self) -> Word {
        KEYBOARD_REGISTER
    }

    fn tick(&mut self, bus: &mut Interconnect) {
        if self.announcing.is_none() {
            self.announcing = self.queued.pop_front();
        }

        if let Some(kind) = bus.message(self.terminal).map(message::kind) {
            if kind == Some(MessageKind::Read) {
                let response = message::response(KEYBOARD_REGISTER, &[self.current]);
                if bus.send(self.terminal, &response) {
                    bus.clear(self.terminal);
                }
                return;
            }
            bus.clear(self.terminal);
        }

        if let Some(code) = self.announcing {
            if bus.send(self.terminal, &message::interrupt(KEYBOARD_INTERRUPT)) {
                tracing::debug!(code, "key announced");
                self.current = code;
                self.announcing = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DEFAULT_BUFFER_WORDS;

    fn run(bus: &mut Interconnect, keyboard: &mut Keyboard, ticks: usize) {
        for _ in 0..ticks {
            keyboard.tick(bus);
            bus.tick();
        }
    }

    #[test]
    fn each_key_raises_one_interrupt() {
        let mut bus = Interconnect::new();
        let (far, near) = bus.link(1, DEFAULT_BUFFER_WORDS);
        let mut keyboard = Keyboard::new(near);
        keyboard.press('a' as Word);
        keyboard.press('b' as Word);

        run(&mut bus, &mut keyboard, 3);
        assert_eq!(bus.message(far), Some(&message::interrupt(KEYBOARD_INTERRUPT)[..]));
        assert_eq!(keyboard.current(), 'a' as Word);

        bus.clear(far);
        run(&mut bus, &mut keyboard, 3);
        assert_eq!(keyboard.current(), 'b' as Word);
        assert_eq!(keyboard.queued(), 0);
    }

    #[test]
    fn read_returns_latest_key() {
        let mut bus = Interconnect::new();
        let (far, near) = bus.link(1, DEFAULT_BUFFER_WORDS);
        let mut keyboard = Keyboard::new(near);
        keyboard.press(13);
        run(&mut bus, &mut keyboard, 3);
        bus.clear(far);

        assert!(bus.send(far, &message::read(KEYBOARD_REGISTER, 1)));
        run(&mut bus, &mut keyboard, 8);
        assert_eq!(bus.message(far), Some(&message::response(KEYBOARD_REGISTER, &[13])[..]));
    }
}
