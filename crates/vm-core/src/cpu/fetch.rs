//! Instruction fetch: read-ahead queue, loop cache and interrupt-vector acquisition.

use std::collections::VecDeque;

use crate::asm;
use crate::bus::{message, Interconnect, TerminalId};
use crate::cpu::stage::{PipelineStage, StageControl};
use crate::decoder::{decode, Instruction};
use crate::memory::{Word, INSTRUCTION_WORDS, PIC_LAST_INTERRUPT, PIC_START};
use crate::stats::{Counter, Counters};
use crate::{Fault, FaultCode};

/// Target depth of the read-ahead queue.
pub const PREFETCH_DEPTH: usize = 5;
/// Capacity of the loop cache; the oldest entry is evicted first.
pub const LOOP_CACHE_CAPACITY: usize = 32;
/// Words requested per instruction block read (four instructions).
pub const FETCH_BLOCK_WORDS: Word = 8;

/// An instruction as fetched from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InstructionEntry {
    /// Address of word 1.
    pub address: Word,
    /// Raw word 1.
    pub word1: Word,
    /// Raw word 2.
    pub word2: Word,
}

impl InstructionEntry {
    /// Decodes the raw words.
    #[must_use]
    pub fn decode(&self) -> Instruction {
        decode(self.word1, self.word2)
    }

    /// Builds a fault attributed to this instruction.
    #[must_use]
    pub const fn fault(&self, code: FaultCode) -> Fault {
        Fault::new(code, self.address, self.word1, self.word2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VectorPhase {
    RequestId,
    WaitForId,
    RequestPointer { id: Word },
    WaitForPointer { id: Word },
}

/// Keeps instructions near the instruction pointer available to dispatch.
#[derive(Debug, Clone)]
pub struct FetchUnit {
    terminal: TerminalId,
    prefetch: VecDeque<InstructionEntry>,
    loop_cache: VecDeque<InstructionEntry>,
    outstanding: Option<Word>,
    vector: Option<VectorPhase>,
}

impl FetchUnit {
    /// Creates a fetch unit that reads through `terminal`.
    #[must_use]
    pub fn new(terminal: TerminalId) -> Self {
        Self {
            terminal,
            prefetch: VecDeque::with_capacity(PREFETCH_DEPTH + 4),
            loop_cache: VecDeque::with_capacity(LOOP_CACHE_CAPACITY + 1),
            outstanding: None,
            vector: None,
        }
    }

    /// Finds the instruction at `ip` in the read-ahead queue, then the loop cache.
    #[must_use]
    pub fn lookup(&self, ip: Word) -> Option<InstructionEntry> {
        self.prefetch
            .iter()
            .chain(self.loop_cache.iter())
            .find(|entry| entry.address == ip)
            .copied()
    }

    /// Entries waiting in the read-ahead queue, oldest first.
    #[must_use]
    pub const fn prefetch_queue(&self) -> &VecDeque<InstructionEntry> {
        &self.prefetch
    }

    /// Entries retained in the loop cache, oldest first.
    #[must_use]
    pub const fn loop_cache(&self) -> &VecDeque<InstructionEntry> {
        &self.loop_cache
    }

    /// Returns true while the vector-acquisition sub-protocol is running.
    #[must_use]
    pub const fn acquiring_vector(&self) -> bool {
        self.vector.is_some()
    }

    /// Discards every fetched instruction.
    pub fn flush(&mut self) {
        self.prefetch.clear();
        self.loop_cache.clear();
    }

    /// Starts interrupt-vector acquisition.
    ///
    /// An outstanding block read is kept so its late response is still
    /// drained from the terminal.
    pub fn begin_interrupt(&mut self) {
        self.flush();
        self.vector = Some(VectorPhase::RequestId);
    }

    /// Advances the fetch state machine by one tick.
    pub fn tick(
        &mut self,
        bus: &mut Interconnect,
        stages: &mut StageControl,
        ip: Word,
        stats: &mut Counters,
    ) {
        if let Some(phase) = self.vector {
            self.tick_vector(phase, bus, stages, ip, stats);
            return;
        }

        if !self.loop_cache.iter().any(|entry| entry.address == ip) {
            while let Some(front) = self.prefetch.front() {
                if front.address == ip {
                    break;
                }
                if let Some(entry) = self.prefetch.pop_front() {
                    self.loop_cache.push_back(entry);
                }
            }
        }
        while self.loop_cache.len() > LOOP_CACHE_CAPACITY {
            self.loop_cache.pop_front();
        }

        if let Some(address) = self.outstanding {
            self.receive_block(bus, address, stats);
            return;
        }

        let wanted = if self.lookup(ip).is_none() {
            Some(ip)
        } else if self.prefetch.len() < PREFETCH_DEPTH {
            self.prefetch
                .back()
                .or_else(|| self.loop_cache.back())
                .map(|entry| entry.address.wrapping_add(INSTRUCTION_WORDS))
        } else {
            None
        };

        if let Some(address) = wanted {
            if bus.send(self.terminal, &message::read(address, FETCH_BLOCK_WORDS)) {
                tracing::trace!(address, "instruction block requested");
                self.outstanding = Some(address);
                stats.record(Counter::FetchRequests);
            } else {
                stats.record(Counter::FetchWaits);
            }
        }
    }

    fn receive_block(&mut self, bus: &mut Interconnect, address: Word, stats: &mut Counters) {
        let Some(words) = bus
            .message(self.terminal)
            .filter(|msg| message::is_response_for(msg, address))
            .map(|msg| message::payload(msg).to_vec())
        else {
            stats.record(Counter::FetchWaits);
            return;
        };
        bus.clear(self.terminal);
        self.outstanding = None;

        let word_at = |index: usize| words.get(index).copied().unwrap_or(0);
        for (slot, offset) in (0..FETCH_BLOCK_WORDS).step_by(2).enumerate() {
            self.prefetch.push_back(InstructionEntry {
                address: address.wrapping_add(offset),
                word1: word_at(slot * 2),
                word2: word_at(slot * 2 + 1),
            });
        }
    }

    fn response_value(&self, bus: &Interconnect, address: Word) -> Option<Word> {
        bus.message(self.terminal)
            .filter(|msg| message::is_response_for(msg, address))
            .map(|msg| message::payload(msg).first().copied().unwrap_or(0))
    }

    fn tick_vector(
        &mut self,
        phase: VectorPhase,
        bus: &mut Interconnect,
        stages: &mut StageControl,
        ip: Word,
        stats: &mut Counters,
    ) {
        if let Some(stale) = self.outstanding {
            if self.response_value(bus, stale).is_some() {
                bus.clear(self.terminal);
                self.outstanding = None;
            }
        }

        let next = match phase {
            VectorPhase::RequestId => bus
                .send(self.terminal, &message::read(PIC_LAST_INTERRUPT, 1))
                .then_some(VectorPhase::WaitForId),
            VectorPhase::WaitForId => self
                .response_value(bus, PIC_LAST_INTERRUPT)
                .map(|id| VectorPhase::RequestPointer { id }),
            VectorPhase::RequestPointer { id } => bus
                .send(self.terminal, &message::read(PIC_START.wrapping_add(id), 1))
                .then_some(VectorPhase::WaitForPointer { id }),
            VectorPhase::WaitForPointer { id } => {
                if let Some(handler) = self.response_value(bus, PIC_START.wrapping_add(id)) {
                    bus.clear(self.terminal);
                    let [word1, word2] = asm::jump(handler);
                    self.prefetch.push_back(InstructionEntry {
                        address: ip,
                        word1,
                        word2,
                    });
                    stages.request(PipelineStage::InstructionDispatch);
                    stats.record(Counter::InterruptsServiced);
                    tracing::debug!(id, handler, return_to = ip, "interrupt vector acquired");
                    self.vector = None;
                    return;
                }
                None
            }
        };

        match next {
            Some(next) => {
                if phase == VectorPhase::WaitForId {
                    bus.clear(self.terminal);
                }
                tracing::debug!(?next, "vector acquisition advanced");
                self.vector = Some(next);
            }
            None => stats.record(Counter::InterruptWaits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DEFAULT_BUFFER_WORDS;

    struct Rig {
        bus: Interconnect,
        fetch: FetchUnit,
        far: TerminalId,
        stages: StageControl,
        stats: Counters,
    }

    impl Rig {
        fn new() -> Self {
            let mut bus = Interconnect::new();
            let (near, far) = bus.link(1, DEFAULT_BUFFER_WORDS);
            Self {
                bus,
                fetch: FetchUnit::new(near),
                far,
                stages: StageControl::default(),
                stats: Counters::new(),
            }
        }

        fn step(&mut self, ip: Word) {
            self.fetch
                .tick(&mut self.bus, &mut self.stages, ip, &mut self.stats);
            self.bus.tick();
        }

        fn take_request(&mut self) -> Option<Vec<Word>> {
            let request = self.bus.message(self.far).map(<[Word]>::to_vec);
            if request.is_some() {
                self.bus.clear(self.far);
            }
            request
        }

        fn answer(&mut self, address: Word, values: &[Word]) {
            assert!(self.bus.send(self.far, &message::response(address, values)));
            for _ in 0..values.len() + 2 {
                self.bus.tick();
            }
        }
    }

    fn settle(rig: &mut Rig, ip: Word) -> Vec<Word> {
        for _ in 0..8 {
            rig.step(ip);
            if let Some(request) = rig.take_request() {
                return request;
            }
        }
        panic!("no request issued");
    }

    #[test]
    fn miss_issues_block_read_at_ip_and_decodes_four_entries() {
        let mut rig = Rig::new();
        let request = settle(&mut rig, 100);
        assert_eq!(request, message::read(100, FETCH_BLOCK_WORDS).to_vec());

        rig.answer(100, &[1, 2, 3, 4, 5, 6, 7, 8]);
        rig.step(100);
        assert_eq!(
            rig.fetch.lookup(106),
            Some(InstructionEntry {
                address: 106,
                word1: 7,
                word2: 8
            })
        );
        assert_eq!(rig.fetch.prefetch_queue().len(), 4);
    }

    #[test]
    fn short_queue_prefetches_the_following_block() {
        let mut rig = Rig::new();
        settle(&mut rig, 100);
        rig.answer(100, &[0; 8]);
        rig.step(100);
        let request = settle(&mut rig, 100);
        assert_eq!(request, message::read(108, FETCH_BLOCK_WORDS).to_vec());
    }

    #[test]
    fn passed_entries_move_into_the_loop_cache() {
        let mut rig = Rig::new();
        settle(&mut rig, 100);
        rig.answer(100, &[0; 8]);
        rig.step(100);
        rig.step(104);
        assert_eq!(rig.fetch.loop_cache().len(), 2);
        assert_eq!(rig.fetch.prefetch_queue().front().map(|e| e.address), Some(104));

        // Jumping back into the loop cache leaves the queue untouched.
        rig.step(100);
        assert_eq!(rig.fetch.prefetch_queue().front().map(|e| e.address), Some(104));
        assert!(rig.fetch.lookup(100).is_some());
    }

    #[test]
    fn loop_cache_evicts_oldest_first() {
        let mut rig = Rig::new();
        for block in 0..10 {
            let base = 1000 + block * FETCH_BLOCK_WORDS;
            rig.fetch.prefetch.extend((0..4).map(|i| InstructionEntry {
                address: base + i * 2,
                word1: 0,
                word2: 0,
            }));
        }
        rig.step(1000 + 10 * FETCH_BLOCK_WORDS);
        assert_eq!(rig.fetch.loop_cache().len(), LOOP_CACHE_CAPACITY);
        assert_eq!(rig.fetch.loop_cache().front().map(|e| e.address), Some(1016));
    }

    #[test]
    fn vector_acquisition_synthesizes_jump_at_ip() {
        let mut rig = Rig::new();
        rig.fetch.begin_interrupt();
        let request = settle(&mut rig, 600);
        assert_eq!(request, message::read(PIC_LAST_INTERRUPT, 1).to_vec());
        rig.answer(PIC_LAST_INTERRUPT, &[33]);

        let request = settle(&mut rig, 600);
        assert_eq!(request, message::read(33, 1).to_vec());
        rig.answer(33, &[4000]);
        rig.step(600);

        assert!(!rig.fetch.acquiring_vector());
        assert_eq!(rig.stages.next(), PipelineStage::InstructionDispatch);
        let entry = rig.fetch.lookup(600).expect("synthesized jump");
        assert_eq!([entry.word1, entry.word2], asm::jump(4000));
        assert_eq!(rig.stats.interrupts_serviced, 1);
    }

    #[test]
    fn stale_block_response_is_dropped_during_acquisition() {
        let mut rig = Rig::new();
        settle(&mut rig, 100);
        rig.fetch.begin_interrupt();
        rig.answer(100, &[9; 8]);
        rig.step(100);
        assert!(!rig.bus.has_message(rig.fetch.terminal));
        assert!(rig.fetch.lookup(100).is_none());
    }
}
