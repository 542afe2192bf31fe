//! Fixed machine address map and region classification.

use super::Word;

/// Inclusive start address of the interrupt-controller vector table.
pub const PIC_START: Word = 0;
/// Number of slots in the interrupt vector table.
pub const PIC_VECTOR_SLOTS: usize = 257;
/// Vector-table slot holding the id of the most recently raised interrupt.
pub const PIC_LAST_INTERRUPT: Word = PIC_START + 256;

/// First address owned by the platform control hub. Everything below is routed to the PIC.
pub const PCH_START: Word = 512;
/// Inclusive start address of the BIOS ROM.
pub const BIOS_START: Word = PCH_START;
/// Number of words reserved for the BIOS ROM.
pub const BIOS_SIZE: Word = 1024;

/// Inclusive start address of the display character cells.
pub const DISPLAY_START: Word = BIOS_START + BIOS_SIZE;
/// Number of words reserved for display cells.
pub const DISPLAY_CELLS: Word = 2048;
/// Display command register.
pub const DISPLAY_COMMAND: Word = DISPLAY_START + DISPLAY_CELLS;
/// Display foreground colour register.
pub const DISPLAY_FOREGROUND: Word = DISPLAY_COMMAND + 1;
/// Display background colour register.
pub const DISPLAY_BACKGROUND: Word = DISPLAY_COMMAND + 2;

/// Keyboard data register.
pub const KEYBOARD_REGISTER: Word = DISPLAY_COMMAND + 4;

/// Inclusive start address of RAM.
pub const RAM_START: Word = KEYBOARD_REGISTER + 1;
/// Number of addressable RAM words.
pub const RAM_SIZE: Word = 128 * 1024 * 1024;

/// Block-storage seek register.
pub const BLOCK_SEEK: Word = RAM_START + RAM_SIZE;
/// Block-storage FIFO data register.
pub const BLOCK_FIFO: Word = BLOCK_SEEK + 1;
/// Block-storage interrupt-acknowledge register.
pub const BLOCK_INTERRUPT_ACK: Word = BLOCK_SEEK + 2;

/// Interrupt id raised by the keyboard.
pub const KEYBOARD_INTERRUPT: Word = 32;
/// Interrupt id raised by the block-storage device.
pub const BLOCK_INTERRUPT: Word = 33;

/// Canonical region descriptor for the machine address map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionDescriptor {
    /// Region classification.
    pub region: MemoryRegion,
    /// Inclusive start address.
    pub start: Word,
    /// Inclusive end address.
    pub end: Word,
}

/// Region classification for machine addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MemoryRegion {
    /// Interrupt controller (`0..PCH_START`).
    Pic,
    /// BIOS ROM.
    Bios,
    /// Display cells and control registers.
    Display,
    /// Keyboard data register.
    Keyboard,
    /// Main memory.
    Ram,
    /// Block-storage control registers.
    BlockStorage,
}

impl MemoryRegion {
    /// Returns the inclusive bounds for this region.
    #[must_use]
    pub const fn bounds(self) -> (Word, Word) {
        match self {
            Self::Pic => (PIC_START, PCH_START - 1),
            Self::Bios => (BIOS_START, DISPLAY_START - 1),
            Self::Display => (DISPLAY_START, KEYBOARD_REGISTER - 1),
            Self::Keyboard => (KEYBOARD_REGISTER, KEYBOARD_REGISTER),
            Self::Ram => (RAM_START, RAM_START + RAM_SIZE - 1),
            Self::BlockStorage => (BLOCK_SEEK, BLOCK_INTERRUPT_ACK),
        }
    }

    /// Returns whether `addr` lies in this region.
    #[must_use]
    pub const fn contains(self, addr: Word) -> bool {
        let (start, end) = self.bounds();
        addr >= start && addr <= end
    }

    /// Returns the descriptor for this region.
    #[must_use]
    pub const fn descriptor(self) -> RegionDescriptor {
        let (start, end) = self.bounds();
        RegionDescriptor {
            region: self,
            start,
            end,
        }
    }
}

/// Every mapped region in ascending address order.
pub const FIXED_MEMORY_REGIONS: [RegionDescriptor; 6] = [
    MemoryRegion::Pic.descriptor(),
    MemoryRegion::Bios.descriptor(),
    MemoryRegion::Display.descriptor(),
    MemoryRegion::Keyboard.descriptor(),
    MemoryRegion::Ram.descriptor(),
    MemoryRegion::BlockStorage.descriptor(),
];

const fn assert_fixed_region_layout() {
    assert!(FIXED_MEMORY_REGIONS[0].start == 0);
    let mut index = 1;
    while index < FIXED_MEMORY_REGIONS.len() {
        let prev = FIXED_MEMORY_REGIONS[index - 1];
        let next = FIXED_MEMORY_REGIONS[index];
        assert!(prev.start <= prev.end);
        assert!(prev.end + 1 == next.start);
        index += 1;
    }
}

const _: () = assert_fixed_region_layout();
const _: () = assert!(PIC_LAST_INTERRUPT < PCH_START);
const _: () = assert!(DISPLAY_BACKGROUND < KEYBOARD_REGISTER);

/// Decodes a machine address into its region, or `None` when unmapped.
#[must_use]
pub const fn decode_memory_region(addr: Word) -> Option<MemoryRegion> {
    let mut index = 0;
    while index < FIXED_MEMORY_REGIONS.len() {
        let descriptor = FIXED_MEMORY_REGIONS[index];
        if addr >= descriptor.start && addr <= descriptor.end {
            return Some(descriptor.region);
        }
        index += 1;
    }
    None
}

/// Returns whether `addr` falls in main memory.
#[must_use]
pub const fn is_ram_address(addr: Word) -> bool {
    MemoryRegion::Ram.contains(addr)
}
