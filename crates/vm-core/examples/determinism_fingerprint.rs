//! Prints a hash of machine state after a fixed workload, for cross-host comparison.

use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use tempfile as _;
use thiserror as _;
use tracing as _;
use vm_core::asm;
use vm_core::{
    BlockImage, Machine, MachineConfig, Register, RunBoundary, Word, INSTRUCTION_WORDS, RAM_START,
};

const TICKS: u64 = 20_000;

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn hash_word(hash: &mut u64, word: Word) {
    hash_bytes(hash, &word.to_le_bytes());
}

fn workload() -> Vec<Word> {
    let at = |index: Word| RAM_START + index * INSTRUCTION_WORDS;
    asm::assemble(&[
        asm::set_literal(Register::R0, 0),
        asm::set_literal(Register::R1, 64),
        asm::set_literal(Register::R2, 1),
        // 3: r2 = r2 * 3 + r0, stored at 2000 + r0
        asm::multiply_literal(Register::R2, Register::R2, 3),
        asm::add(Register::R2, Register::R2, Register::R0),
        asm::store_indexed(Register::R0, Register::R2, RAM_START + 2_000),
        asm::push_and_store(Register::R2),
        asm::add_literal(Register::R0, Register::R0, 1),
        asm::jump_less(Register::R0, Register::R1, at(3)),
        asm::breakpoint(),
    ])
}

fn fingerprint() -> String {
    let config = MachineConfig {
        entry_point: RAM_START,
        ..MachineConfig::fast()
    };
    let mut machine = Machine::new(config, BlockImage::new(4));
    machine.load_ram(RAM_START, &workload());
    let outcome = machine.run(TICKS, RunBoundary::Breakpoint);

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    match outcome {
        Ok(outcome) => {
            hash_bytes(&mut hash, &[0x10]);
            hash_bytes(&mut hash, &outcome.ticks.to_le_bytes());
        }
        Err(fault) => {
            hash_bytes(&mut hash, &[0x11, fault.code.as_u8()]);
            hash_word(&mut hash, fault.address);
        }
    }

    let snapshot = machine.snapshot();
    hash_word(&mut hash, snapshot.ip);
    hash_word(&mut hash, snapshot.sp);
    for value in snapshot.registers {
        hash_word(&mut hash, value);
    }
    let counters = machine.counters();
    for value in [
        counters.instructions_executed,
        counters.load_waits,
        counters.store_waits,
        counters.fetch_waits,
        counters.icache_hits,
        counters.icache_misses,
        counters.fetch_requests,
    ] {
        hash_bytes(&mut hash, &value.to_le_bytes());
    }
    for offset in 0..64 {
        hash_word(&mut hash, machine.ram().read_word(RAM_START + 2_000 + offset));
    }

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
