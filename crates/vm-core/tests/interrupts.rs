//! Interrupt delivery from software, the host and the keyboard.

use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use tempfile as _;
use thiserror as _;
use tracing as _;
use vm_core::asm::{self, Encoded};
use vm_core::{
    BlockImage, Machine, MachineConfig, PipelineStage, Register, RunBoundary, TickOutcome, Word,
    INSTRUCTION_WORDS, KEYBOARD_INTERRUPT, KEYBOARD_REGISTER, PIC_LAST_INTERRUPT, RAM_START,
};

const HANDLER: Word = 10;

fn at(index: Word) -> Word {
    RAM_START + index * INSTRUCTION_WORDS
}

/// Lays out `main` at instruction 0 and `handler` at instruction [`HANDLER`].
fn machine(main: &[Encoded], handler: &[Encoded]) -> Machine {
    let mut program = main.to_vec();
    program.resize(usize::try_from(HANDLER).expect("small index"), asm::nop());
    program.extend_from_slice(handler);
    let config = MachineConfig {
        entry_point: RAM_START,
        ..MachineConfig::fast()
    };
    let mut machine = Machine::new(config, BlockImage::new(4));
    machine.load_ram(RAM_START, &asm::assemble(&program));
    machine
}

fn run_to_break(machine: &mut Machine) -> Word {
    match machine
        .run(100_000, RunBoundary::Breakpoint)
        .expect("program should not fault")
        .last
    {
        TickOutcome::Breakpoint { address } => address,
        TickOutcome::Running => panic!("no breakpoint reached"),
    }
}

#[test]
fn software_interrupt_runs_installed_handler_and_returns() {
    let mut machine = machine(
        &[
            asm::set_literal(Register::R7, 77),
            asm::set_literal(Register::R0, at(HANDLER)),
            asm::set_interrupt(40, Register::R0),
            asm::call_interrupt(40),
            asm::jump_not_equal(Register::R5, Register::R7, at(4)),
            asm::breakpoint(),
        ],
        &[
            asm::set_literal(Register::R5, 77),
            asm::interrupt_return(),
        ],
    );
    assert_eq!(run_to_break(&mut machine), at(5));

    let snapshot = machine.snapshot();
    assert_eq!(snapshot.registers[5], 77);
    assert!(!snapshot.in_interrupt);
    assert_eq!(machine.counters().interrupts_serviced, 1);
    assert_eq!(machine.cpu().pic().vector(40), at(HANDLER));
    assert_eq!(machine.cpu().pic().vector(PIC_LAST_INTERRUPT), 40);
}

#[test]
fn host_raised_interrupt_preempts_a_spin_loop() {
    let mut machine = machine(
        &[
            asm::set_literal(Register::R0, at(HANDLER)),
            asm::set_interrupt(41, Register::R0),
            asm::set_literal(Register::R7, 1),
            asm::jump_not_equal(Register::R5, Register::R7, at(3)),
            asm::breakpoint(),
        ],
        &[
            asm::set_literal(Register::R5, 1),
            asm::interrupt_return(),
        ],
    );
    let warmup = machine
        .run(2_000, RunBoundary::Breakpoint)
        .expect("spinning does not fault");
    assert_eq!(warmup.last, TickOutcome::Running);

    machine.raise_interrupt(41);
    assert_eq!(run_to_break(&mut machine), at(4));
    assert_eq!(machine.counters().interrupts_serviced, 1);
}

#[test]
fn key_press_reaches_the_keyboard_handler() {
    let mut machine = machine(
        &[
            asm::set_literal(Register::R0, at(HANDLER)),
            asm::set_interrupt(KEYBOARD_INTERRUPT, Register::R0),
            asm::set_literal(Register::R1, 0),
            asm::jump_equal(Register::R15, Register::R1, at(3)),
            asm::breakpoint(),
        ],
        &[
            asm::load_literal(Register::R15, KEYBOARD_REGISTER),
            asm::interrupt_return(),
        ],
    );
    machine
        .run(2_000, RunBoundary::Breakpoint)
        .expect("spinning does not fault");

    machine.press_key('x' as Word);
    assert_eq!(run_to_break(&mut machine), at(4));
    assert_eq!(machine.snapshot().registers[15], 'x' as Word);
}

#[test]
fn interrupt_waits_for_an_in_flight_load() {
    let scratch = RAM_START + 4_000;
    let mut machine = machine(
        &[
            asm::set_literal(Register::R0, at(HANDLER)),
            asm::set_interrupt(42, Register::R0),
            asm::load_literal(Register::R3, scratch),
            asm::breakpoint(),
        ],
        &[
            asm::set_literal(Register::R5, 1),
            asm::interrupt_return(),
        ],
    );
    machine.load_ram(scratch, &[55]);

    let mut in_load = false;
    for _ in 0..10_000 {
        machine.tick().expect("no fault");
        let snapshot = machine.snapshot();
        let loading = snapshot
            .active
            .as_ref()
            .is_some_and(|active| active.mnemonic.starts_with("load"));
        if loading && snapshot.stage == PipelineStage::Execution {
            in_load = true;
            break;
        }
    }
    assert!(in_load, "load never reached execution");

    machine.raise_interrupt(42);
    assert_eq!(run_to_break(&mut machine), at(3));
    let snapshot = machine.snapshot();
    assert_eq!(snapshot.registers[3], 55);
    assert_eq!(snapshot.registers[5], 1);
    assert_eq!(machine.counters().interrupts_serviced, 1);
}

#[test]
fn interrupt_waits_for_an_in_flight_store() {
    let scratch = RAM_START + 4_000;
    let mut machine = machine(
        &[
            asm::set_literal(Register::R0, at(HANDLER)),
            asm::set_interrupt(42, Register::R0),
            asm::set_literal(Register::R3, 66),
            asm::store_literal(Register::R3, scratch),
            asm::breakpoint(),
        ],
        &[
            asm::load_literal(Register::R6, scratch),
            asm::interrupt_return(),
        ],
    );

    let mut in_store = false;
    for _ in 0..10_000 {
        machine.tick().expect("no fault");
        let snapshot = machine.snapshot();
        let storing = snapshot
            .active
            .as_ref()
            .is_some_and(|active| active.mnemonic.starts_with("store"));
        if storing && snapshot.stage == PipelineStage::Execution {
            in_store = true;
            break;
        }
    }
    assert!(in_store, "store never reached execution");

    machine.raise_interrupt(42);
    assert_eq!(run_to_break(&mut machine), at(4));
    assert_eq!(machine.ram().read_word(scratch), 66);
    // The handler reads the location, so the store landed before it ran.
    assert_eq!(machine.snapshot().registers[6], 66);
    assert_eq!(machine.counters().interrupts_serviced, 1);
}

#[test]
fn return_with_no_interrupt_active_latches_a_fault() {
    let mut machine = machine(&[asm::interrupt_return()], &[]);
    let fault = machine
        .run(10_000, RunBoundary::TickLimit)
        .expect_err("iret outside a handler");
    assert_eq!(fault.address, RAM_START);
    assert!(machine.run_state().latched_fault().is_some());
}
