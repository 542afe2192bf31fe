use crate::bus::{message, Interconnect, MessageKind, TerminalId};
use crate::devices::{response_len, DelayedResponse, Device};
use crate::memory::{PagedWords, Word};

/// Main memory behind a dedicated uncore link.
///
/// One request is serviced at a time; further packets wait in the
/// terminal while a read response or write is in progress.
#[derive(Debug, Clone)]
pub struct Ram {
    terminal: TerminalId,
    base: Word,
    words: PagedWords,
    latency: u32,
    storing: Option<u32>,
    response: DelayedResponse,
}

impl Ram {
    /// Creates `size` zeroed words at `base`.
    #[must_use]
    pub const fn new(terminal: TerminalId, base: Word, size: usize, latency: u32) -> Self {
        Self {
            terminal,
            base,
            words: PagedWords::new(size),
            latency,
            storing: None,
            response: DelayedResponse::new(),
        }
    }

    fn offset(&self, address: Word) -> Option<usize> {
        usize::try_from(address.wrapping_sub(self.base))
            .ok()
            .filter(|offset| *offset < self.words.len())
    }

    /// Reads one word directly, bypassing the bus.
    #[must_use]
    pub fn read_word(&self, address: Word) -> Word {
        self.offset(address).map_or(0, |offset| self.words.read(offset))
    }

    /// Copies `words` in at `address`, bypassing the bus.
    pub fn load(&mut self, address: Word, words: &[Word]) {
        if let Some(offset) = self.offset(address) {
            self.words.load(offset, words);
        }
    }

    /// Returns true while a request is being serviced.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.storing.is_some() || self.response.is_busy()
    }

    fn accept(&mut self, bus: &mut Interconnect) {
        let Some(request) = bus.message(self.terminal).map(<[Word]>::to_vec) else {
            return;
        };
        bus.clear(self.terminal);
        let address = message::address(&request).unwrap_or(0);
        match message::kind(&request) {
            Some(MessageKind::Read) => {
                let len = response_len(bus, self.terminal, request.get(2).copied().unwrap_or(1));
                let len = Word::try_from(len).unwrap_or(0);
                let values = (0..len)
                    .map(|i| self.read_word(address.wrapping_add(i)))
                    .collect::<Vec<_>>();
                self.response
                    .start(self.latency, message::response(address, &values));
            }
            Some(MessageKind::Write) => {
                let value = message::payload(&request).first().copied().unwrap_or(0);
                if let Some(offset) = self.offset(address) {
                    self.words.write(offset, value);
                }
                self.storing = Some(self.latency);
            }
            kind => tracing::warn!(?kind, address, "ram ignored message"),
        }
    }
}

impl Device for Ram {
    fn name(&self) -> &'static str {
        "ram"
    }

    fn base(&self) -> Word {
        self.base
    }

    fn tick(&mut self, bus: &mut Interconnect) {
        if !self.is_busy() {
            self.accept(bus);
        }
        if let Some(remaining) = self.storing {
            self.storing = remaining.checked_sub(1);
        }
        self.response.tick(bus, self.terminal);
    }
}
