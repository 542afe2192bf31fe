//! Block storage: an in-memory disk image plus the bus device that serves it.
//!
//! The device exposes three registers. Writing a block number to the seek
//! register writes the current block back to the image, loads the new one
//! and rewinds the FIFO. When the seek time elapses the device raises the
//! block interrupt, repeating it until software writes the acknowledge
//! register. Reads and writes of the FIFO register stream words of the
//! current block.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::bus::{message, Interconnect, MessageKind, TerminalId};
use crate::devices::{DelayedResponse, Device};
use crate::memory::{Word, BLOCK_FIFO, BLOCK_INTERRUPT, BLOCK_INTERRUPT_ACK, BLOCK_SEEK};

/// Words per block.
pub const BLOCK_WORDS: usize = 4096;

const BLOCK_BYTES: usize = BLOCK_WORDS * 4;
const BLOCK_EXTENSION: &str = "block";

/// Disk image I/O and packing failures.
#[derive(Debug, Error)]
pub enum BlockStoreError {
    /// Filesystem access failed.
    #[error("block image I/O on {}: {source}", path.display())]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A block file is not exactly one block long.
    #[error("block file {} holds {len} bytes, expected 16384", path.display())]
    BadBlockSize {
        /// Offending file.
        path: PathBuf,
        /// Its length in bytes.
        len: usize,
    },
    /// A block index is outside the image.
    #[error("block {index} is outside an image of {capacity} blocks")]
    OutOfRange {
        /// Requested block.
        index: usize,
        /// Image capacity.
        capacity: usize,
    },
}

/// Sparse disk image. Blocks never written read as zeros.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockImage {
    capacity: usize,
    blocks: BTreeMap<usize, Vec<Word>>,
}

impl BlockImage {
    /// Creates an empty image of `capacity` blocks.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            blocks: BTreeMap::new(),
        }
    }

    /// Packs a program for the bootloader: block 0 word 0 holds the block
    /// count, blocks `1..=count` hold the program.
    ///
    /// # Errors
    ///
    /// Returns [`BlockStoreError::OutOfRange`] if the program does not fit.
    pub fn from_program(capacity: usize, program: &[Word]) -> Result<Self, BlockStoreError> {
        let count = program.len() / BLOCK_WORDS + 1;
        if count >= capacity {
            return Err(BlockStoreError::OutOfRange {
                index: count,
                capacity,
            });
        }
        let mut image = Self::new(capacity);
        let header = Word::try_from(count).map_err(|_| BlockStoreError::OutOfRange {
            index: count,
            capacity,
        })?;
        image.write_block(0, &[header])?;
        for (index, chunk) in program.chunks(BLOCK_WORDS).enumerate() {
            image.write_block(index + 1, chunk)?;
        }
        Ok(image)
    }

    /// Number of addressable blocks.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block count recorded in block 0 by [`BlockImage::from_program`].
    #[must_use]
    pub fn program_block_count(&self) -> Word {
        self.blocks
            .get(&0)
            .and_then(|block| block.first().copied())
            .unwrap_or(0)
    }

    /// Indices of blocks that hold data.
    pub fn stored_blocks(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks.keys().copied()
    }

    /// Copy of block `index`, zero-filled where never written.
    #[must_use]
    pub fn read_block(&self, index: usize) -> Vec<Word> {
        self.blocks
            .get(&index)
            .cloned()
            .unwrap_or_else(|| vec![0; BLOCK_WORDS])
    }

    /// Replaces block `index` with `words`, zero-padded to a full block.
    ///
    /// # Errors
    ///
    /// Returns [`BlockStoreError::OutOfRange`] for an index past the capacity.
    pub fn write_block(&mut self, index: usize, words: &[Word]) -> Result<(), BlockStoreError> {
        if index >= self.capacity {
            return Err(BlockStoreError::OutOfRange {
                index,
                capacity: self.capacity,
            });
        }
        let mut block = vec![0; BLOCK_WORDS];
        let len = words.len().min(BLOCK_WORDS);
        block[..len].copy_from_slice(&words[..len]);
        if block.iter().all(|word| *word == 0) {
            self.blocks.remove(&index);
        } else {
            self.blocks.insert(index, block);
        }
        Ok(())
    }

    /// Loads every `N.block` file in `dir`. Other files are ignored.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, short or long block files, and block numbers
    /// past `capacity`.
    pub fn load_dir(dir: &Path, capacity: usize) -> Result<Self, BlockStoreError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| BlockStoreError::Io { path, source }
        };
        let mut image = Self::new(capacity);
        for entry in fs::read_dir(dir).map_err(io_err(dir))? {
            let path = entry.map_err(io_err(dir))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(BLOCK_EXTENSION) {
                continue;
            }
            let Some(index) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<usize>().ok())
            else {
                continue;
            };
            let bytes = fs::read(&path).map_err(io_err(&path))?;
            if bytes.len() != BLOCK_BYTES {
                return Err(BlockStoreError::BadBlockSize {
                    path,
                    len: bytes.len(),
                });
            }
            let words = bytes
                .chunks_exact(4)
                .map(|chunk| Word::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect::<Vec<_>>();
            image.write_block(index, &words)?;
        }
        tracing::debug!(dir = %dir.display(), blocks = image.blocks.len(), "block image loaded");
        Ok(image)
    }

    /// Writes every stored block to `dir` as `N.block`, creating the directory.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn save_dir(&self, dir: &Path) -> Result<(), BlockStoreError> {
        fs::create_dir_all(dir).map_err(|source| BlockStoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        for (index, block) in &self.blocks {
            let path = dir.join(format!("{index}.{BLOCK_EXTENSION}"));
            let bytes = block
                .iter()
                .flat_map(|word| word.to_le_bytes())
                .collect::<Vec<_>>();
            fs::write(&path, bytes).map_err(|source| BlockStoreError::Io { path, source })?;
        }
        Ok(())
    }
}

/// Timing parameters of a [`BlockDevice`], in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTimings {
    /// Seek duration.
    pub seek: u32,
    /// FIFO access duration.
    pub read: u32,
    /// Interval between repeated ready interrupts.
    pub interrupt_repeat: u32,
}

/// Bus device serving a [`BlockImage`].
#[derive(Debug, Clone)]
pub struct BlockDevice {
    terminal: TerminalId,
    image: BlockImage,
    timings: BlockTimings,
    current: usize,
    data: Vec<Word>,
    fifo: usize,
    seek_remaining: u32,
    read_remaining: u32,
    squawk: Option<u32>,
    response: DelayedResponse,
}

impl BlockDevice {
    /// Creates a device with block 0 loaded.
    #[must_use]
    pub fn new(terminal: TerminalId, image: BlockImage, timings: BlockTimings) -> Self {
        let data = image.read_block(0);
        Self {
            terminal,
            image,
            timings,
            current: 0,
            data,
            fifo: 0,
            seek_remaining: 0,
            read_remaining: 0,
            squawk: None,
            response: DelayedResponse::new(),
        }
    }

    /// Block currently loaded.
    #[must_use]
    pub const fn current_block(&self) -> usize {
        self.current
    }

    /// Returns true while the ready interrupt repeats unacknowledged.
    #[must_use]
    pub const fn is_interrupting(&self) -> bool {
        self.squawk.is_some()
    }

    /// Writes the loaded block back and returns the image.
    pub fn image(&mut self) -> &BlockImage {
        self.flush();
        &self.image
    }

    /// Writes the loaded block back to the image.
    pub fn flush(&mut self) {
        if let Err(error) = self.image.write_block(self.current, &self.data) {
            tracing::warn!(%error, "block write-back failed");
        }
    }

    fn seek(&mut self, value: Word) {
        let Some(block) = usize::try_from(value)
            .ok()
            .filter(|block| *block < self.image.capacity())
        else {
            tracing::warn!(block = value, capacity = self.image.capacity(), "seek out of range");
            return;
        };
        self.flush();
        self.current = block;
        self.data = self.image.read_block(block);
        self.fifo = 0;
        self.seek_remaining = self.timings.seek.max(1);
        tracing::debug!(block, "block seek");
    }

    const fn advance_fifo(&mut self) -> usize {
        let index = self.fifo;
        self.fifo = (self.fifo + 1) % BLOCK_WORDS;
        index
    }

    fn handle(&mut self, request: &[Word]) {
        let kind = message::kind(request);
        let address = message::address(request).unwrap_or(0);
        let value = message::payload(request).first().copied().unwrap_or(0);
        match (kind, address) {
            (Some(MessageKind::Write), BLOCK_SEEK) => self.seek(value),
            (Some(MessageKind::Write), BLOCK_INTERRUPT_ACK) => self.squawk = None,
            (Some(MessageKind::Read), BLOCK_FIFO) => {
                let index = self.advance_fifo();
                self.read_remaining = self.timings.read;
                self.response
                    .start(0, message::response(BLOCK_FIFO, &[self.data[index]]));
            }
            (Some(MessageKind::Write), BLOCK_FIFO) => {
                let index = self.advance_fifo();
                self.data[index] = value;
                self.read_remaining = self.timings.read;
            }
            (Some(MessageKind::Read), BLOCK_SEEK) => {
                let current = Word::try_from(self.current).unwrap_or(Word::MAX);
                self.response.start(0, message::response(BLOCK_SEEK, &[current]));
            }
            _ => tracing::warn!(?kind, address, "block device ignored message"),
        }
    }

    fn tick_squawk(&mut self, bus: &mut Interconnect) {
        let Some(remaining) = self.squawk else {
            return;
        };
        let repeat = self.timings.interrupt_repeat.max(1);
        if remaining == repeat {
            if bus.send(self.terminal, &message::interrupt(BLOCK_INTERRUPT)) {
                self.squawk = Some(remaining - 1);
            }
        } else {
            self.squawk = Some(if remaining <= 1 { repeat } else { remaining - 1 });
        }
    }
}

impl Device for BlockDevice {
    fn name(&self) -> &'static str {
        "block"
    }

    fn base(&self) -> Word {
        BLOCK_SEEK
    }

    fn tick(&mut self, bus: &mut Interconnect) {
        if self.seek_remaining > 0 {
            self.seek_remaining -= 1;
            if self.seek_remaining == 0 {
                self.squawk = Some(self.timings.interrupt_repeat.max(1));
            }
        }
        self.read_remaining = self.read_remaining.saturating_sub(1);
        if self.seek_remaining > 0 || self.read_remaining > 0 {
            return;
        }

        self.tick_squawk(bus);

        if !self.response.is_busy() {
            if let Some(request) = bus.message(self.terminal).map(<[Word]>::to_vec) {
                bus.clear(self.terminal);
                self.handle(&request);
            }
        }
        if self.read_remaining == 0 {
            self.response.tick(bus, self.terminal);
        }
    }
}
