//! Word-addressed storage primitives and the fixed address map.

pub mod map;

pub use map::{
    decode_memory_region, is_ram_address, MemoryRegion, RegionDescriptor, BIOS_SIZE, BIOS_START,
    BLOCK_FIFO, BLOCK_INTERRUPT, BLOCK_INTERRUPT_ACK, BLOCK_SEEK, DISPLAY_BACKGROUND,
    DISPLAY_CELLS, DISPLAY_COMMAND, DISPLAY_FOREGROUND, DISPLAY_START, FIXED_MEMORY_REGIONS,
    KEYBOARD_INTERRUPT, KEYBOARD_REGISTER, PCH_START, PIC_LAST_INTERRUPT, PIC_START,
    PIC_VECTOR_SLOTS, RAM_SIZE, RAM_START,
};

use std::collections::BTreeMap;

/// Machine word. Registers, addresses and bus payloads are all signed 32-bit.
pub type Word = i32;

/// Number of words occupied by one encoded instruction.
pub const INSTRUCTION_WORDS: Word = 2;

/// Words per lazily allocated page in [`PagedWords`].
pub const PAGE_WORDS: usize = 4096;

/// Sparse word store that only allocates pages once they are written.
///
/// Unwritten words read as zero. Offsets outside `0..len` read as zero and
/// ignore writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedWords {
    len: usize,
    pages: BTreeMap<usize, Box<[Word]>>,
}

impl PagedWords {
    /// Creates an all-zero store covering `len` words.
    #[must_use]
    pub const fn new(len: usize) -> Self {
        Self {
            len,
            pages: BTreeMap::new(),
        }
    }

    /// Number of addressable words.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true when the store covers no words.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads the word at `offset`.
    #[must_use]
    pub fn read(&self, offset: usize) -> Word {
        if offset >= self.len {
            return 0;
        }
        self.pages
            .get(&(offset / PAGE_WORDS))
            .map_or(0, |page| page[offset % PAGE_WORDS])
    }

    /// Writes `value` at `offset`. Returns false when out of range.
    pub fn write(&mut self, offset: usize, value: Word) -> bool {
        if offset >= self.len {
            return false;
        }
        let page = self
            .pages
            .entry(offset / PAGE_WORDS)
            .or_insert_with(|| vec![0; PAGE_WORDS].into_boxed_slice());
        page[offset % PAGE_WORDS] = value;
        true
    }

    /// Copies `words` into the store starting at `offset`, clipping at the end.
    pub fn load(&mut self, offset: usize, words: &[Word]) {
        for (index, word) in words.iter().enumerate() {
            if !self.write(offset + index, *word) {
                break;
            }
        }
    }

    /// Number of pages that have been allocated.
    #[must_use]
    pub fn resident_pages(&self) -> usize {
        self.pages.len()
    }
}
