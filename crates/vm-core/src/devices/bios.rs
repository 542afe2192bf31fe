use crate::asm;
use crate::bus::{message, Interconnect, MessageKind, TerminalId};
use crate::devices::{response_len, DelayedResponse, Device};
use crate::memory::{
    Word, BIOS_SIZE, BLOCK_FIFO, BLOCK_INTERRUPT, BLOCK_INTERRUPT_ACK, BLOCK_SEEK,
    INSTRUCTION_WORDS, KEYBOARD_INTERRUPT, KEYBOARD_REGISTER, RAM_START,
};
use crate::state::Register::{R0, R1, R15, R2, R3, R4, R5};

/// Words per disk block copied by the bootloader loop.
const BOOT_BLOCK_WORDS: Word = 4096;

/// Builds the bootloader for a ROM mapped at `base`.
///
/// Installs the keyboard handler (latest key into `r15`) and the block
/// handler (acknowledge), reads the block count from block 0, copies
/// blocks `1..=count` to `RAM_START` and jumps there.
#[must_use]
pub fn bootloader(base: Word) -> Vec<Word> {
    let at = |index: Word| base + index * INSTRUCTION_WORDS;
    asm::assemble(&[
        // 0: handlers
        asm::set_literal(R0, at(5)),
        asm::store_literal(R0, KEYBOARD_INTERRUPT),
        asm::set_literal(R0, at(7)),
        asm::store_literal(R0, BLOCK_INTERRUPT),
        asm::jump(at(9)),
        // 5: keyboard handler
        asm::load_literal(R15, KEYBOARD_REGISTER),
        asm::interrupt_return(),
        // 7: block handler
        asm::store_literal(R0, BLOCK_INTERRUPT_ACK),
        asm::interrupt_return(),
        // 9: r0 = block count
        asm::set_literal(R0, 0),
        asm::store_literal(R0, BLOCK_SEEK),
        asm::load_literal(R0, BLOCK_FIFO),
        asm::set_literal(R1, 1),
        asm::store_literal(R1, BLOCK_SEEK),
        asm::set_literal(R2, 0),
        asm::set_literal(R3, 0),
        asm::set_literal(R4, BOOT_BLOCK_WORDS),
        // 17: copy loop
        asm::load_literal(R5, BLOCK_FIFO),
        asm::store_indexed(R3, R5, RAM_START),
        asm::add_literal(R2, R2, 1),
        asm::add_literal(R3, R3, 1),
        asm::jump_less(R2, R4, at(17)),
        asm::set_literal(R2, 0),
        asm::add_literal(R1, R1, 1),
        asm::store_literal(R1, BLOCK_SEEK),
        asm::jump_less_equal(R1, R0, at(17)),
        asm::jump(RAM_START),
    ])
}

/// Read-only memory holding the bootloader.
#[derive(Debug, Clone)]
pub struct Bios {
    terminal: TerminalId,
    base: Word,
    image: Vec<Word>,
    latency: u32,
    response: DelayedResponse,
}

impl Bios {
    /// Creates a ROM at `base` holding [`bootloader`].
    #[must_use]
    pub fn new(terminal: TerminalId, base: Word, latency: u32) -> Self {
        Self::with_image(terminal, base, latency, bootloader(base))
    }

    /// Creates a ROM at `base` holding `image`, truncated to the BIOS window.
    #[must_use]
    pub fn with_image(terminal: TerminalId, base: Word, latency: u32, mut image: Vec<Word>) -> Self {
        image.truncate(usize::try_from(BIOS_SIZE).unwrap_or(0));
        Self {
            terminal,
            base,
            image,
            latency,
            response: DelayedResponse::new(),
        }
    }

    /// ROM contents.
    #[must_use]
    pub fn image(&self) -> &[Word] {
        &self.image
    }

    fn word(&self, address: Word) -> Word {
        usize::try_from(address.wrapping_sub(self.base))
            .ok()
            .and_then(|offset| self.image.get(offset).copied())
            .unwrap_or(0)
    }
}

impl Device for Bios {
    fn name(&self) -> &'static str {
        "bios"
    }

    fn base(&self) -> Word {
        self.base
    }

    fn tick(&mut self, bus: &mut Interconnect) {
        if let Some((kind, address, len)) = bus.message(self.terminal).map(|msg| {
            (
                message::kind(msg),
                message::address(msg).unwrap_or(0),
                message::payload(msg).first().copied().unwrap_or(1),
            )
        }) {
            match kind {
                Some(MessageKind::Read) if !self.response.is_busy() => {
                    bus.clear(self.terminal);
                    let count = Word::try_from(response_len(bus, self.terminal, len)).unwrap_or(0);
                    let values = (0..count)
                        .map(|i| self.word(address.wrapping_add(i)))
                        .collect::<Vec<_>>();
                    self.response
                        .start(self.latency, message::response(address, &values));
                }
                Some(MessageKind::Read) => {}
                _ => {
                    tracing::debug!(?kind, address, "bios ignored non-read");
                    bus.clear(self.terminal);
                }
            }
        }
        self.response.tick(bus, self.terminal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DEFAULT_BUFFER_WORDS;
    use crate::decoder::{decode, Instruction};
    use crate::memory::BIOS_START;

    #[test]
    fn bootloader_decodes_cleanly_and_fits() {
        let image = bootloader(BIOS_START);
        assert!(image.len() <= usize::try_from(BIOS_SIZE).expect("positive size"));
        for pair in image.chunks(2) {
            let instruction = decode(pair[0], pair[1]);
            assert!(
                !matches!(instruction, Instruction::Invalid(_)),
                "{instruction}"
            );
        }
    }

    #[test]
    fn bootloader_ends_by_jumping_to_ram() {
        let image = bootloader(BIOS_START);
        let tail = &image[image.len() - 2..];
        assert_eq!(tail, asm::jump(RAM_START));
    }

    #[test]
    fn reads_return_image_words_and_writes_are_ignored() {
        let mut bus = Interconnect::new();
        let (far, near) = bus.link(1, DEFAULT_BUFFER_WORDS);
        let mut bios = Bios::with_image(near, 512, 1, vec![10, 20, 30]);

        assert!(bus.send(far, &message::write(512, 99)));
        for _ in 0..5 {
            bios.tick(&mut bus);
            bus.tick();
        }
        assert_eq!(bios.image(), &[10, 20, 30]);

        assert!(bus.send(far, &message::read(513, 4)));
        for _ in 0..12 {
            bios.tick(&mut bus);
            bus.tick();
        }
        assert_eq!(bus.message(far), Some(&message::response(513, &[20, 30, 0, 0])[..]));
    }
}
