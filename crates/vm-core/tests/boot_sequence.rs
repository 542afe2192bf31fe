//! Power-on boot: BIOS copies the program from the block device into RAM.

use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use tempfile as _;
use thiserror as _;
use tracing as _;
use vm_core::asm;
use vm_core::{
    BlockImage, Machine, MachineConfig, Register, RunBoundary, TickOutcome, BIOS_START,
    DEFAULT_BLOCK_CAPACITY, RAM_START,
};

const BOOT_TICKS: u64 = 3_000_000;

fn program() -> Vec<i32> {
    asm::assemble(&[
        asm::set_literal(Register::R0, 5),
        asm::add_literal(Register::R0, Register::R0, 7),
        asm::breakpoint(),
    ])
}

#[test]
fn bios_boots_packed_program_from_block_device() {
    let image = BlockImage::from_program(DEFAULT_BLOCK_CAPACITY, &program()).expect("fits");
    let mut machine = Machine::new(MachineConfig::fast(), image);
    assert_eq!(machine.snapshot().ip, BIOS_START);

    let outcome = machine
        .run(BOOT_TICKS, RunBoundary::Breakpoint)
        .expect("boot does not fault");
    assert_eq!(
        outcome.last,
        TickOutcome::Breakpoint {
            address: RAM_START + 4
        }
    );
    assert_eq!(machine.snapshot().registers[0], 12);
    assert_eq!(machine.ram().read_word(RAM_START), program()[0]);
    assert!(machine.counters().interrupts_serviced >= 2);
}

#[test]
fn empty_disk_never_reaches_a_breakpoint() {
    let mut machine = Machine::new(MachineConfig::fast(), BlockImage::new(8));
    let outcome = machine
        .run(200_000, RunBoundary::Breakpoint)
        .expect("spinning on zeroed memory does not fault");
    assert_eq!(outcome.last, TickOutcome::Running);
    assert_eq!(machine.ram().read_word(RAM_START), 0);
}
