#![no_main]

use libfuzzer_sys::fuzz_target;
use vm_core::{
    decode, disassemble, BlockImage, Machine, MachineConfig, RunBoundary, Word, RAM_START,
};

fuzz_target!(|data: &[u8]| {
    let words = data
        .chunks_exact(4)
        .take(64)
        .map(|chunk| Word::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect::<Vec<_>>();
    if words.len() < 2 {
        return;
    }

    let _ = decode(words[0], words[1]);
    let _ = disassemble(RAM_START, &words);

    let config = MachineConfig {
        entry_point: RAM_START,
        ..MachineConfig::fast()
    };
    let mut machine = Machine::new(config, BlockImage::new(4));
    machine.load_ram(RAM_START, &words);
    if let Err(fault) = machine.run(2_000, RunBoundary::TickLimit) {
        assert_eq!(machine.tick(), Err(fault));
    }
});
