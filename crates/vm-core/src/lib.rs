//! Cycle-stepped simulator for a pipelined multi-core CPU on a flow-controlled bus.

/// Word type, paged storage and the fixed address map.
pub mod memory;
pub use memory::{
    decode_memory_region, is_ram_address, MemoryRegion, PagedWords, RegionDescriptor, Word,
    BIOS_SIZE, BIOS_START, BLOCK_FIFO, BLOCK_INTERRUPT, BLOCK_INTERRUPT_ACK, BLOCK_SEEK,
    DISPLAY_BACKGROUND, DISPLAY_CELLS, DISPLAY_COMMAND, DISPLAY_FOREGROUND, DISPLAY_START,
    FIXED_MEMORY_REGIONS, INSTRUCTION_WORDS, KEYBOARD_INTERRUPT, KEYBOARD_REGISTER, PCH_START,
    PIC_LAST_INTERRUPT, PIC_START, PIC_VECTOR_SLOTS, RAM_SIZE, RAM_START,
};

/// Fault taxonomy raised by the pipeline.
pub mod fault;
pub use fault::{Fault, FaultClass, FaultCode};

/// Architectural register file and run state.
pub mod state;
pub use state::{Register, RegisterFile, RunState, GENERAL_REGISTER_COUNT};

/// Instruction word field layout and unit codes.
pub mod encoding;
pub use encoding::{encode_word1, UnitCode, WordFields};

/// Instruction decoding into typed per-unit operations.
pub mod decoder;
pub use decoder::{decode, Instruction};

/// Disassembly of instruction streams.
pub mod disasm;
pub use disasm::{disassemble, DisassemblyRow};

/// Instruction builders for hand-written programs.
pub mod asm;

/// Linked bus terminals and message framing.
pub mod bus;
pub use bus::{Interconnect, MessageKind, TerminalId, DEFAULT_BUFFER_WORDS};

/// Instrumentation counters.
pub mod stats;
pub use stats::{Counter, Counters};

/// Pipeline stages, execution units and the CPU package.
pub mod cpu;
pub use cpu::{Cpu, CpuCore, PipelineStage};

/// Programmable interrupt controller.
pub mod pic;
pub use pic::{InterruptController, InterruptLines};

/// Uncore and platform control hub routing.
pub mod hub;
pub use hub::{PlatformControlHub, RouteError, Uncore};

/// Memory-mapped peripherals.
pub mod devices;
pub use devices::{
    bootloader, Bios, BlockDevice, BlockImage, BlockStoreError, Device, Display, Keyboard, Ram,
    BLOCK_WORDS,
};

/// Host-facing configuration and observation types.
pub mod api;
pub use api::{
    ActiveInstruction, CoreSnapshot, DeviceTimings, MachineConfig, RunBoundary, RunOutcome,
    TickOutcome, DEFAULT_BLOCK_CAPACITY,
};

/// The assembled machine.
pub mod machine;
pub use machine::Machine;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
