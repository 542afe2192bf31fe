//! Saturating instrumentation counters.

use std::fmt;

/// One observable counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Counter {
    /// Instructions completed by an execution unit.
    InstructionsExecuted,
    /// Ticks a load spent waiting on the bus.
    LoadWaits,
    /// Ticks a store spent waiting on the bus.
    StoreWaits,
    /// Ticks dispatch or fetch spent waiting for instructions.
    FetchWaits,
    /// Ticks vector acquisition spent waiting on the bus.
    InterruptWaits,
    /// Dispatch found the instruction locally.
    ICacheHits,
    /// Dispatch did not find the instruction locally.
    ICacheMisses,
    /// Instruction block reads issued by the fetch unit.
    FetchRequests,
    /// Interrupts whose handler jump was synthesized.
    InterruptsServiced,
}

/// Machine-wide counters, owned by the top-level machine and lent to each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Counters {
    /// Instructions completed by an execution unit.
    pub instructions_executed: u64,
    /// Ticks a load spent waiting on the bus.
    pub load_waits: u64,
    /// Ticks a store spent waiting on the bus.
    pub store_waits: u64,
    /// Ticks dispatch or fetch spent waiting for instructions.
    pub fetch_waits: u64,
    /// Ticks vector acquisition spent waiting on the bus.
    pub interrupt_waits: u64,
    /// Dispatch lookups served from the prefetch queue or loop cache.
    pub icache_hits: u64,
    /// Dispatch lookups that stalled.
    pub icache_misses: u64,
    /// Instruction block reads issued.
    pub fetch_requests: u64,
    /// Interrupts entered.
    pub interrupts_serviced: u64,
}

impl Counters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn slot(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::InstructionsExecuted => &mut self.instructions_executed,
            Counter::LoadWaits => &mut self.load_waits,
            Counter::StoreWaits => &mut self.store_waits,
            Counter::FetchWaits => &mut self.fetch_waits,
            Counter::InterruptWaits => &mut self.interrupt_waits,
            Counter::ICacheHits => &mut self.icache_hits,
            Counter::ICacheMisses => &mut self.icache_misses,
            Counter::FetchRequests => &mut self.fetch_requests,
            Counter::InterruptsServiced => &mut self.interrupts_serviced,
        }
    }

    /// Increments `counter`, saturating at `u64::MAX`.
    pub const fn record(&mut self, counter: Counter) {
        let slot = self.slot(counter);
        *slot = slot.saturating_add(1);
    }

    /// Reads `counter`.
    #[must_use]
    pub const fn get(&self, counter: Counter) -> u64 {
        let mut copy = *self;
        *copy.slot(counter)
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "instructions executed: {}", self.instructions_executed)?;
        writeln!(f, "load waits:            {}", self.load_waits)?;
        writeln!(f, "store waits:           {}", self.store_waits)?;
        writeln!(f, "fetch waits:           {}", self.fetch_waits)?;
        writeln!(f, "interrupt waits:       {}", self.interrupt_waits)?;
        writeln!(f, "icache hits:           {}", self.icache_hits)?;
        writeln!(f, "icache misses:         {}", self.icache_misses)?;
        writeln!(f, "fetch requests:        {}", self.fetch_requests)?;
        write!(f, "interrupts serviced:   {}", self.interrupts_serviced)
    }
}

#[cfg(test)]
mod tests {
    use super::{Counter, Counters};

    #[test]
    fn record_increments_only_the_named_counter() {
        let mut counters = Counters::new();
        counters.record(Counter::LoadWaits);
        counters.record(Counter::LoadWaits);
        assert_eq!(counters.get(Counter::LoadWaits), 2);
        assert_eq!(counters.load_waits, 2);
        assert_eq!(counters.get(Counter::StoreWaits), 0);
    }

    #[test]
    fn counters_saturate() {
        let mut counters = Counters {
            icache_hits: u64::MAX,
            ..Counters::default()
        };
        counters.record(Counter::ICacheHits);
        assert_eq!(counters.icache_hits, u64::MAX);
    }
}
