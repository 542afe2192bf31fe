//! The assembled machine: CPU package, memory, PCH and peripherals on one interconnect.

use crate::api::{
    ActiveInstruction, CoreSnapshot, MachineConfig, RunBoundary, RunOutcome, TickOutcome,
};
use crate::bus::{Interconnect, DEFAULT_BUFFER_WORDS};
use crate::cpu::{Cpu, CpuCore};
use crate::devices::{Bios, BlockDevice, BlockImage, BlockTimings, Device, Display, Keyboard, Ram};
use crate::hub::PlatformControlHub;
use crate::memory::{
    Word, BIOS_START, BLOCK_SEEK, DISPLAY_START, KEYBOARD_REGISTER, RAM_SIZE, RAM_START,
};
use crate::state::RunState;
use crate::stats::Counters;
use crate::Fault;

/// A complete simulated machine advanced one tick at a time.
#[derive(Debug, Clone)]
pub struct Machine {
    config: MachineConfig,
    bus: Interconnect,
    cpu: Cpu,
    ram: Ram,
    pch: PlatformControlHub,
    bios: Bios,
    display: Display,
    block: BlockDevice,
    keyboard: Keyboard,
    counters: Counters,
    run_state: RunState,
    ticks: u64,
}

impl Machine {
    /// Wires every component with the link speeds and latencies in `config`.
    #[must_use]
    pub fn new(config: MachineConfig, image: BlockImage) -> Self {
        let mut bus = Interconnect::new();
        let (cpu_io, pch_cpu) = bus.link(config.core_link_cycles, DEFAULT_BUFFER_WORDS);
        let (cpu_ram, ram_end) = bus.link(config.core_link_cycles, DEFAULT_BUFFER_WORDS);
        let cpu = Cpu::new(
            &mut bus,
            config.cores,
            config.core_link_cycles,
            config.entry_point,
            cpu_io,
            cpu_ram,
        );
        let ram_words = usize::try_from(RAM_SIZE).unwrap_or(0);
        let ram = Ram::new(ram_end, RAM_START, ram_words, config.timings.ram_access);

        let mut pch = PlatformControlHub::new(pch_cpu);
        let mut device_link = |base: Word| {
            let (hub_end, device_end) = bus.link(config.device_link_cycles, DEFAULT_BUFFER_WORDS);
            if let Err(error) = pch.attach(base, hub_end) {
                tracing::error!(%error, "device map rejected");
            }
            device_end
        };
        let bios = Bios::new(device_link(BIOS_START), BIOS_START, config.timings.bios_access);
        let display = Display::new(device_link(DISPLAY_START));
        let keyboard = Keyboard::new(device_link(KEYBOARD_REGISTER));
        let block = BlockDevice::new(
            device_link(BLOCK_SEEK),
            image,
            BlockTimings {
                seek: config.timings.block_seek,
                read: config.timings.block_read,
                interrupt_repeat: config.timings.block_interrupt_repeat,
            },
        );
        tracing::debug!(terminals = bus.len(), entry = config.entry_point, "machine wired");

        Self {
            config,
            bus,
            cpu,
            ram,
            pch,
            bios,
            display,
            block,
            keyboard,
            counters: Counters::new(),
            run_state: RunState::Running,
            ticks: 0,
        }
    }

    /// Configuration the machine was built with.
    #[must_use]
    pub const fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Advances every component by one tick, then clocks every terminal.
    ///
    /// # Errors
    ///
    /// Returns the fault raised this tick, or the fault latched by an
    /// earlier tick; a latched machine no longer changes state.
    pub fn tick(&mut self) -> Result<TickOutcome, Fault> {
        if let Some(fault) = self.run_state.latched_fault() {
            return Err(fault);
        }
        let breakpoint = match self.cpu.tick(&mut self.bus, &mut self.counters) {
            Ok(breakpoint) => breakpoint,
            Err(fault) => {
                tracing::error!(%fault, tick = self.ticks, "fault latched");
                self.run_state = RunState::FaultLatched(fault);
                return Err(fault);
            }
        };
        self.ram.tick(&mut self.bus);
        self.pch.tick(&mut self.bus);
        self.bios.tick(&mut self.bus);
        self.display.tick(&mut self.bus);
        self.block.tick(&mut self.bus);
        self.keyboard.tick(&mut self.bus);
        self.bus.tick();
        self.ticks += 1;

        Ok(breakpoint.map_or(TickOutcome::Running, |address| TickOutcome::Breakpoint {
            address,
        }))
    }

    /// Ticks up to `max_ticks` times, stopping early at `boundary`.
    ///
    /// # Errors
    ///
    /// Returns the first fault; ticks completed before it are not reported.
    pub fn run(&mut self, max_ticks: u64, boundary: RunBoundary) -> Result<RunOutcome, Fault> {
        let mut outcome = RunOutcome {
            ticks: 0,
            last: TickOutcome::Running,
        };
        while outcome.ticks < max_ticks {
            outcome.last = self.tick()?;
            outcome.ticks += 1;
            if boundary == RunBoundary::Breakpoint
                && matches!(outcome.last, TickOutcome::Breakpoint { .. })
            {
                break;
            }
        }
        Ok(outcome)
    }

    /// Ticks executed since construction.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Running or fault-latched.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Instrumentation counters.
    #[must_use]
    pub const fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Debugger view of core `index`.
    #[must_use]
    pub fn core_snapshot(&self, index: usize) -> Option<CoreSnapshot> {
        self.cpu.core(index).map(snapshot_of)
    }

    /// Debugger view of the boot core.
    #[must_use]
    pub fn snapshot(&self) -> CoreSnapshot {
        snapshot_of(self.cpu.boot_core())
    }

    /// The CPU package.
    #[must_use]
    pub const fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Main memory.
    #[must_use]
    pub const fn ram(&self) -> &Ram {
        &self.ram
    }

    /// Copies `words` into RAM at `address` without bus traffic.
    pub fn load_ram(&mut self, address: Word, words: &[Word]) {
        self.ram.load(address, words);
    }

    /// The text display.
    #[must_use]
    pub const fn display(&self) -> &Display {
        &self.display
    }

    /// Queues a key press.
    pub fn press_key(&mut self, code: Word) {
        self.keyboard.press(code);
    }

    /// Raises interrupt `id` at the interrupt controller.
    pub fn raise_interrupt(&mut self, id: Word) {
        self.cpu.raise_interrupt(id);
    }

    /// Current disk image, including unsaved writes to the loaded block.
    pub fn block_image(&mut self) -> &BlockImage {
        self.block.image()
    }

    /// Names of the bus devices behind the PCH, in address order.
    #[must_use]
    pub fn device_names(&self) -> [(&'static str, Word); 4] {
        [
            (self.bios.name(), self.bios.base()),
            (self.display.name(), self.display.base()),
            (self.keyboard.name(), self.keyboard.base()),
            (self.block.name(), self.block.base()),
        ]
    }
}

fn snapshot_of(core: &CpuCore) -> CoreSnapshot {
    let regs = core.registers();
    CoreSnapshot {
        ip: regs.ip(),
        sp: regs.sp(),
        registers: *regs.gprs(),
        stage: core.stage(),
        in_interrupt: core.in_interrupt(),
        active: core.active_instruction().map(ActiveInstruction::from),
    }
}
