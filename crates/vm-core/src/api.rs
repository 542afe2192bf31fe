//! Host-facing configuration, run control and snapshot types.

use crate::cpu::{InstructionEntry, PipelineStage};
use crate::memory::{Word, BIOS_START};
use crate::state::GENERAL_REGISTER_COUNT;

/// Default number of blocks on the attached block device.
pub const DEFAULT_BLOCK_CAPACITY: usize = 1 << 20;

/// Device latencies, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DeviceTimings {
    /// RAM read/write access time.
    pub ram_access: u32,
    /// BIOS read access time.
    pub bios_access: u32,
    /// Time from a block seek until the device interrupts.
    pub block_seek: u32,
    /// Time per block FIFO access.
    pub block_read: u32,
    /// Interval between repeated block-ready interrupts until acknowledged.
    pub block_interrupt_repeat: u32,
}

impl Default for DeviceTimings {
    fn default() -> Self {
        Self {
            ram_access: 200,
            bios_access: 2000,
            block_seek: 200_000,
            block_read: 1,
            block_interrupt_repeat: 1000,
        }
    }
}

impl DeviceTimings {
    /// Short latencies for tests and interactive runs.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            ram_access: 2,
            bios_access: 2,
            block_seek: 20,
            block_read: 1,
            block_interrupt_repeat: 400,
        }
    }
}

/// Machine construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MachineConfig {
    /// Number of CPU cores, at least one. Interrupts are delivered to core 0.
    pub cores: usize,
    /// Ticks per word on core, interrupt-controller, RAM and PCH links.
    pub core_link_cycles: u32,
    /// Ticks per word on PCH-to-device links.
    pub device_link_cycles: u32,
    /// Initial instruction pointer of every core.
    pub entry_point: Word,
    /// Blocks available on the block device.
    pub block_capacity: usize,
    /// Device latencies.
    pub timings: DeviceTimings,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            cores: 1,
            core_link_cycles: 1,
            device_link_cycles: 32,
            entry_point: BIOS_START,
            block_capacity: DEFAULT_BLOCK_CAPACITY,
            timings: DeviceTimings::default(),
        }
    }
}

impl MachineConfig {
    /// Default layout with every latency shortened.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            device_link_cycles: 1,
            timings: DeviceTimings::fast(),
            ..Self::default()
        }
    }
}

/// Result of one machine tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TickOutcome {
    /// Nothing observable happened.
    Running,
    /// A `Break` instruction executed.
    Breakpoint {
        /// Address of the `Break`.
        address: Word,
    },
}

/// Where [`crate::Machine::run`] stops early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunBoundary {
    /// Run for the full tick budget; breakpoints are observed but ignored.
    TickLimit,
    /// Stop after the tick in which a `Break` executes.
    Breakpoint,
}

/// Aggregated result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunOutcome {
    /// Ticks executed by this call.
    pub ticks: u64,
    /// Outcome of the final tick.
    pub last: TickOutcome,
}

/// Instruction occupying a core's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ActiveInstruction {
    /// Address of word 1.
    pub address: Word,
    /// Raw word 1.
    pub word1: Word,
    /// Raw word 2.
    pub word2: Word,
    /// Disassembly.
    pub mnemonic: String,
}

impl From<InstructionEntry> for ActiveInstruction {
    fn from(entry: InstructionEntry) -> Self {
        Self {
            address: entry.address,
            word1: entry.word1,
            word2: entry.word2,
            mnemonic: entry.decode().to_string(),
        }
    }
}

/// Debugger view of one core.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreSnapshot {
    /// Instruction pointer.
    pub ip: Word,
    /// Stack pointer.
    pub sp: Word,
    /// General registers `r0..r15`.
    pub registers: [Word; GENERAL_REGISTER_COUNT],
    /// Current pipeline stage.
    pub stage: PipelineStage,
    /// Whether an interrupt handler is running.
    pub in_interrupt: bool,
    /// Instruction in the pipeline, if any has been dispatched.
    pub active: Option<ActiveInstruction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm;
    use crate::state::Register;

    #[test]
    fn default_config_reproduces_reference_timings() {
        let config = MachineConfig::default();
        assert_eq!(config.cores, 1);
        assert_eq!(config.core_link_cycles, 1);
        assert_eq!(config.device_link_cycles, 32);
        assert_eq!(config.entry_point, BIOS_START);
        assert_eq!(config.timings.ram_access, 200);
        assert_eq!(config.timings.bios_access, 2000);
        assert_eq!(config.timings.block_seek, 200_000);
        assert_eq!(config.timings.block_interrupt_repeat, 1000);
    }

    #[test]
    fn fast_config_keeps_layout() {
        let fast = MachineConfig::fast();
        let slow = MachineConfig::default();
        assert_eq!(fast.entry_point, slow.entry_point);
        assert_eq!(fast.block_capacity, slow.block_capacity);
        assert!(fast.timings.block_seek < slow.timings.block_seek);
    }

    #[test]
    fn active_instruction_carries_mnemonic() {
        let [word1, word2] = asm::add_literal(Register::R1, Register::R2, 3);
        let active = ActiveInstruction::from(InstructionEntry {
            address: 10,
            word1,
            word2,
        });
        assert_eq!(active.mnemonic, "add r1, r2, 3");
    }
}
