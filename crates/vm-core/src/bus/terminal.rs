//! Point-to-point, flow-controlled bus links.
//!
//! Every terminal lives in an [`Interconnect`] arena and is addressed by a
//! [`TerminalId`]. Terminals are always created as a linked pair so the
//! peer relation is symmetric and both ends share one buffer capacity.

use crate::memory::Word;

/// Default per-terminal buffer capacity in words.
pub const DEFAULT_BUFFER_WORDS: usize = 10;

/// Handle to one end of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TerminalId(usize);

impl TerminalId {
    /// Arena index of this terminal.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Terminal {
    peer: usize,
    cycles_per_word: u32,
    since_last_word: u32,
    outbound: Vec<Word>,
    outbound_len: usize,
    outbound_head: usize,
    sending: bool,
    inbound: Vec<Word>,
    inbound_len: usize,
    has_packet: bool,
}

impl Terminal {
    fn new(peer: usize, cycles_per_word: u32, capacity: usize) -> Self {
        Self {
            peer,
            cycles_per_word,
            since_last_word: 0,
            outbound: vec![0; capacity],
            outbound_len: 0,
            outbound_head: 0,
            sending: false,
            inbound: vec![0; capacity],
            inbound_len: 0,
            has_packet: false,
        }
    }
}

/// Arena owning every bus terminal in a machine.
#[derive(Debug, Clone, Default)]
pub struct Interconnect {
    terminals: Vec<Terminal>,
}

impl Interconnect {
    /// Creates an empty interconnect.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            terminals: Vec::new(),
        }
    }

    /// Creates a linked pair of terminals.
    ///
    /// Each end clocks one word to its peer every `cycles_per_word` ticks and
    /// buffers at most `capacity` words per message.
    pub fn link(&mut self, cycles_per_word: u32, capacity: usize) -> (TerminalId, TerminalId) {
        let left = self.terminals.len();
        let right = left + 1;
        let cycles_per_word = cycles_per_word.max(1);
        self.terminals
            .push(Terminal::new(right, cycles_per_word, capacity));
        self.terminals
            .push(Terminal::new(left, cycles_per_word, capacity));
        (TerminalId(left), TerminalId(right))
    }

    /// Number of terminals in the arena.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.terminals.len()
    }

    /// Returns true when no links exist.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }

    /// Returns the far end of `id`'s link.
    #[must_use]
    pub fn peer(&self, id: TerminalId) -> TerminalId {
        TerminalId(self.terminals[id.0].peer)
    }

    /// Per-message capacity of `id`.
    #[must_use]
    pub fn capacity(&self, id: TerminalId) -> usize {
        self.terminals[id.0].outbound.len()
    }

    /// Starts transmitting `message` from `id`.
    ///
    /// Fails without side effects when `id` is mid-transmission, the peer's
    /// receive slot is still full, or the message is empty or too large.
    pub fn send(&mut self, id: TerminalId, message: &[Word]) -> bool {
        let terminal = &self.terminals[id.0];
        if terminal.sending
            || message.is_empty()
            || message.len() > terminal.outbound.len()
            || self.terminals[terminal.peer].has_packet
        {
            return false;
        }
        let terminal = &mut self.terminals[id.0];
        terminal.outbound[..message.len()].copy_from_slice(message);
        terminal.outbound_len = message.len();
        terminal.outbound_head = 0;
        terminal.sending = true;
        true
    }

    /// Returns true while `id` still has words to clock out.
    #[must_use]
    pub fn is_sending(&self, id: TerminalId) -> bool {
        self.terminals[id.0].sending
    }

    /// Returns true when a complete message is waiting at `id`.
    #[must_use]
    pub fn has_message(&self, id: TerminalId) -> bool {
        self.terminals[id.0].has_packet
    }

    /// Borrows the complete message waiting at `id`.
    #[must_use]
    pub fn message(&self, id: TerminalId) -> Option<&[Word]> {
        let terminal = &self.terminals[id.0];
        terminal
            .has_packet
            .then(|| &terminal.inbound[..terminal.inbound_len])
    }

    /// Copies the waiting message into `out`.
    ///
    /// Returns false, leaving `out` untouched, when nothing is pending or
    /// `out` is too small.
    pub fn read(&self, id: TerminalId, out: &mut [Word]) -> bool {
        match self.message(id) {
            Some(message) if message.len() <= out.len() => {
                out[..message.len()].copy_from_slice(message);
                true
            }
            _ => false,
        }
    }

    /// Releases the receive slot of `id` so the peer may send again.
    pub fn clear(&mut self, id: TerminalId) {
        self.terminals[id.0].has_packet = false;
    }

    /// Moves the message waiting at `from` out through `to`.
    ///
    /// The source slot is only cleared once the send succeeds.
    pub fn forward(&mut self, from: TerminalId, to: TerminalId) -> bool {
        let Some(message) = self.message(from).map(<[Word]>::to_vec) else {
            return false;
        };
        if !self.send(to, &message) {
            return false;
        }
        self.clear(from);
        true
    }

    /// Clocks every terminal once, in creation order.
    pub fn tick(&mut self) {
        for index in 0..self.terminals.len() {
            self.tick_terminal(index);
        }
    }

    fn tick_terminal(&mut self, index: usize) {
        let terminal = &mut self.terminals[index];
        terminal.since_last_word = terminal.since_last_word.saturating_add(1);
        if !terminal.sending || terminal.since_last_word < terminal.cycles_per_word {
            return;
        }
        terminal.since_last_word = 0;
        let head = terminal.outbound_head;
        let word = terminal.outbound[head];
        let len = terminal.outbound_len;
        let peer = terminal.peer;
        terminal.outbound_head += 1;
        let finished = terminal.outbound_head == len;
        if finished {
            terminal.sending = false;
        }

        let peer = &mut self.terminals[peer];
        peer.inbound[head] = word;
        if finished {
            peer.inbound_len = len;
            peer.has_packet = true;
        }
    }
}
