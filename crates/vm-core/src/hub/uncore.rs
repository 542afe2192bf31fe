use crate::bus::{message, Interconnect, MessageKind, TerminalId};
use crate::memory::{is_ram_address, Word, PCH_START};

/// Reads remembered for response routing; the oldest is forgotten beyond this.
pub const MAX_OUTSTANDING_READS: usize = 64;

/// A forwarded read whose response has not yet gone back to its core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRead {
    target: TerminalId,
    address: Word,
    core: TerminalId,
}

/// Routes core traffic to the interrupt controller, RAM or the PCH, and
/// returns each response to the core that issued the read.
#[derive(Debug, Clone)]
pub struct Uncore {
    cores: Vec<TerminalId>,
    pic: TerminalId,
    ram: TerminalId,
    io: TerminalId,
    pending: Vec<PendingRead>,
}

impl Uncore {
    /// Creates an uncore with no cores attached.
    #[must_use]
    pub const fn new(io: TerminalId, pic: TerminalId, ram: TerminalId) -> Self {
        Self {
            cores: Vec::new(),
            pic,
            ram,
            io,
            pending: Vec::new(),
        }
    }

    /// Attaches the uncore end of a core link.
    pub fn add_core(&mut self, terminal: TerminalId) {
        self.cores.push(terminal);
    }

    /// Terminals of attached cores, in attachment order.
    #[must_use]
    pub fn cores(&self) -> &[TerminalId] {
        &self.cores
    }

    /// Reads forwarded but not yet answered.
    #[must_use]
    pub const fn outstanding_reads(&self) -> usize {
        self.pending.len()
    }

    fn destination(&self, msg: &[Word]) -> Option<TerminalId> {
        match message::kind(msg)? {
            MessageKind::Interrupt => Some(self.pic),
            MessageKind::Read | MessageKind::Write => {
                let address = message::address(msg)?;
                Some(if address < PCH_START {
                    self.pic
                } else if is_ram_address(address) {
                    self.ram
                } else {
                    self.io
                })
            }
            MessageKind::Response | MessageKind::Command => None,
        }
    }

    /// Forwards at most one pending message per source terminal.
    pub fn tick(&mut self, bus: &mut Interconnect) {
        for &core in &self.cores {
            let Some(msg) = bus.message(core) else {
                continue;
            };
            let read = message::address(msg)
                .filter(|_| message::kind(msg) == Some(MessageKind::Read));
            match self.destination(msg) {
                Some(to) => {
                    if bus.forward(core, to) {
                        tracing::trace!(from = core.index(), to = to.index(), "uncore forward");
                        if let Some(address) = read {
                            if self.pending.len() == MAX_OUTSTANDING_READS {
                                let forgotten = self.pending.remove(0);
                                tracing::warn!(
                                    address = forgotten.address,
                                    "uncore forgot an unanswered read"
                                );
                            }
                            self.pending.push(PendingRead {
                                target: to,
                                address,
                                core,
                            });
                        }
                    }
                }
                None => {
                    tracing::warn!(kind = ?message::kind(msg), "uncore dropped core message");
                    bus.clear(core);
                }
            }
        }

        self.reply(bus, self.ram);
        if bus.message(self.io).and_then(message::kind) == Some(MessageKind::Interrupt) {
            bus.forward(self.io, self.pic);
        } else {
            self.reply(bus, self.io);
        }
        self.reply(bus, self.pic);
    }

    /// Forwards the message waiting at `from` to the core whose read it
    /// answers. Unmatched traffic goes to the boot core.
    fn reply(&mut self, bus: &mut Interconnect, from: TerminalId) {
        let Some(msg) = bus.message(from) else {
            return;
        };
        let address = message::address(msg);
        let matched = self
            .pending
            .iter()
            .position(|read| read.target == from && Some(read.address) == address);
        let Some(to) = matched
            .map(|index| self.pending[index].core)
            .or_else(|| self.cores.first().copied())
        else {
            return;
        };
        if bus.forward(from, to) {
            if let Some(index) = matched {
                self.pending.remove(index);
            }
        }
    }
}
