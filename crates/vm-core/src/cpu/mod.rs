//! Pipelined CPU cores and the package that hosts them.

/// Arithmetic unit.
pub mod alu;
/// Branch resolution.
pub mod branch;
/// Instruction dispatch.
pub mod dispatch;
/// Instruction fetch and vector acquisition.
pub mod fetch;
/// Software interrupt requests.
pub mod interrupt;
/// Bus loads.
pub mod load;
/// Retirement stage.
pub mod retire;
/// Stack engine.
pub mod stack;
/// Pipeline stage bookkeeping.
pub mod stage;
/// Bus stores.
pub mod store;

pub use alu::ArithmeticUnit;
pub use branch::BranchUnit;
pub use dispatch::DispatchUnit;
pub use fetch::{FetchUnit, InstructionEntry, FETCH_BLOCK_WORDS, LOOP_CACHE_CAPACITY, PREFETCH_DEPTH};
pub use interrupt::{InterruptRequest, InterruptUnit};
pub use load::LoadUnit;
pub use retire::RetireUnit;
pub use stack::{Delegation, StackEngine};
pub use stage::{PipelineStage, StageControl};
pub use store::StoreUnit;

use crate::bus::{Interconnect, TerminalId, DEFAULT_BUFFER_WORDS};
use crate::decoder::{Instruction, InterruptInstruction};
use crate::hub::Uncore;
use crate::memory::Word;
use crate::pic::{InterruptController, InterruptLines};
use crate::state::RegisterFile;
use crate::stats::{Counter, Counters};
use crate::{Fault, FaultCode};

/// One pipelined core and its execution units.
#[derive(Debug, Clone)]
pub struct CpuCore {
    id: usize,
    terminal: TerminalId,
    regs: RegisterFile,
    stages: StageControl,
    fetch: FetchUnit,
    dispatch: DispatchUnit,
    alu: ArithmeticUnit,
    load: LoadUnit,
    store: StoreUnit,
    branch: BranchUnit,
    stack: StackEngine,
    interrupts: InterruptUnit,
    retire: RetireUnit,
    interrupt_pending: bool,
    in_interrupt: bool,
    saved_ip: Word,
}

impl CpuCore {
    /// Creates core `id` talking to the uncore through `terminal`, starting at `entry`.
    #[must_use]
    pub fn new(id: usize, terminal: TerminalId, entry: Word) -> Self {
        Self {
            id,
            terminal,
            regs: RegisterFile::new(entry),
            stages: StageControl::default(),
            fetch: FetchUnit::new(terminal),
            dispatch: DispatchUnit::default(),
            alu: ArithmeticUnit::default(),
            load: LoadUnit::default(),
            store: StoreUnit::default(),
            branch: BranchUnit::default(),
            stack: StackEngine::default(),
            interrupts: InterruptUnit::default(),
            retire: RetireUnit,
            interrupt_pending: false,
            in_interrupt: false,
            saved_ip: entry,
        }
    }

    /// Core index within the package.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Architectural registers.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Mutable registers, for host setup between ticks.
    pub const fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    /// Stage the core is in.
    #[must_use]
    pub const fn stage(&self) -> PipelineStage {
        self.stages.current()
    }

    /// Returns true while an interrupt handler is running.
    #[must_use]
    pub const fn in_interrupt(&self) -> bool {
        self.in_interrupt
    }

    /// Returns true when an interrupt has been signalled but not yet entered.
    #[must_use]
    pub const fn interrupt_pending(&self) -> bool {
        self.interrupt_pending
    }

    /// IP restored by `iret`.
    #[must_use]
    pub const fn saved_ip(&self) -> Word {
        self.saved_ip
    }

    /// Fetch unit, for inspection.
    #[must_use]
    pub const fn fetch_unit(&self) -> &FetchUnit {
        &self.fetch
    }

    /// Instruction currently occupying the pipeline: the one held by a
    /// bus unit, otherwise the last one dispatched.
    #[must_use]
    pub fn active_instruction(&self) -> Option<InstructionEntry> {
        self.load
            .held()
            .or_else(|| self.store.held())
            .or_else(|| self.dispatch.last_dispatched())
    }

    /// Advances the core by one tick.
    ///
    /// Returns the address of a `Break` that executed this tick.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when an instruction cannot be executed; the core
    /// must not be ticked again afterwards.
    pub fn tick(
        &mut self,
        bus: &mut Interconnect,
        lines: &mut InterruptLines,
        stats: &mut Counters,
    ) -> Result<Option<Word>, Fault> {
        if lines.take(self.id) {
            self.interrupt_pending = true;
        }

        let breakpoint = self.branch.tick(&mut self.stages, &mut self.regs, stats);
        self.fetch
            .tick(bus, &mut self.stages, self.regs.ip(), stats);
        if let Some((entry, instruction)) =
            self.dispatch
                .tick(&self.stages, &self.fetch, self.regs.ip(), stats)
        {
            self.route(entry, instruction, stats)?;
        }

        self.alu.tick(&mut self.stages, &mut self.regs, stats)?;
        self.load
            .tick(bus, self.terminal, &mut self.stages, &mut self.regs, stats);
        self.store
            .tick(bus, self.terminal, &mut self.stages, &self.regs, stats);
        self.retire.tick(&mut self.stages);
        match self.stack.tick(&mut self.stages, &mut self.regs, stats) {
            Some(Delegation::Store(entry, store)) => self.store.accept(entry, store),
            Some(Delegation::Load(entry, load)) => self.load.accept(entry, load),
            None => {}
        }
        self.interrupts
            .tick(bus, self.terminal, &mut self.stages, &self.regs, stats);

        if self.interrupt_pending
            && !self.in_interrupt
            && self.stages.entering(PipelineStage::InstructionDispatch)
        {
            self.saved_ip = self.regs.ip();
            self.in_interrupt = true;
            self.interrupt_pending = false;
            self.fetch.begin_interrupt();
            tracing::debug!(core = self.id, return_to = self.saved_ip, "entering interrupt");
        }

        self.stages.advance();
        Ok(breakpoint)
    }

    fn route(
        &mut self,
        entry: InstructionEntry,
        instruction: Instruction,
        stats: &mut Counters,
    ) -> Result<(), Fault> {
        let next = match instruction {
            Instruction::Nop => PipelineStage::InstructionDispatch,
            Instruction::Alu(alu) => {
                self.alu.accept(entry, alu);
                PipelineStage::Execution
            }
            Instruction::Load(load) => {
                self.load.accept(entry, load);
                PipelineStage::Execution
            }
            Instruction::Store(store) => {
                self.store.accept(entry, store);
                PipelineStage::Execution
            }
            Instruction::Stack(stack) => {
                self.stack.accept(entry, stack);
                PipelineStage::Execution
            }
            Instruction::Branch(branch) => {
                self.branch.accept(entry, branch);
                PipelineStage::BranchPredict
            }
            Instruction::Interrupt(InterruptInstruction::SetInterrupt { id, source }) => {
                self.interrupts
                    .accept(entry, InterruptRequest::Install { id, source });
                PipelineStage::Execution
            }
            Instruction::Interrupt(InterruptInstruction::CallInterrupt { id }) => {
                self.interrupts.accept(entry, InterruptRequest::Raise { id });
                PipelineStage::Execution
            }
            Instruction::Interrupt(InterruptInstruction::InterruptReturn) => {
                self.fetch.flush();
                if !self.in_interrupt {
                    return Err(entry.fault(FaultCode::ReturnOutsideInterrupt));
                }
                self.in_interrupt = false;
                self.regs.set_ip(self.saved_ip);
                stats.record(Counter::InstructionsExecuted);
                tracing::debug!(core = self.id, ip = self.saved_ip, "interrupt returned");
                PipelineStage::InstructionDispatch
            }
            Instruction::Invalid(code) => return Err(entry.fault(code)),
        };
        self.stages.request(next);
        Ok(())
    }
}

/// Cores, uncore and interrupt controller ticked as one package.
#[derive(Debug, Clone)]
pub struct Cpu {
    cores: Vec<CpuCore>,
    uncore: Uncore,
    pic: InterruptController,
    lines: InterruptLines,
}

impl Cpu {
    /// Wires `cores` cores to a fresh uncore.
    ///
    /// `io` and `ram` are the CPU-side ends of the PCH and RAM links; new
    /// core and interrupt-controller links are created in `bus` at
    /// `cycles_per_word`.
    #[must_use]
    pub fn new(
        bus: &mut Interconnect,
        cores: usize,
        cycles_per_word: u32,
        entry: Word,
        io: TerminalId,
        ram: TerminalId,
    ) -> Self {
        let cores = cores.max(1);
        let (pic_end, uncore_pic) = bus.link(cycles_per_word, DEFAULT_BUFFER_WORDS);
        let mut uncore = Uncore::new(io, uncore_pic, ram);
        let cores = (0..cores)
            .map(|id| {
                let (core_end, uncore_end) = bus.link(cycles_per_word, DEFAULT_BUFFER_WORDS);
                uncore.add_core(uncore_end);
                CpuCore::new(id, core_end, entry)
            })
            .collect::<Vec<_>>();
        Self {
            lines: InterruptLines::new(cores.len()),
            cores,
            uncore,
            pic: InterruptController::new(pic_end, 0),
        }
    }

    /// Ticks every core, then the uncore, then the interrupt controller.
    ///
    /// # Errors
    ///
    /// Propagates the first core [`Fault`].
    pub fn tick(
        &mut self,
        bus: &mut Interconnect,
        stats: &mut Counters,
    ) -> Result<Option<Word>, Fault> {
        let mut breakpoint = None;
        for core in &mut self.cores {
            if let Some(address) = core.tick(bus, &mut self.lines, stats)? {
                breakpoint.get_or_insert(address);
            }
        }
        self.uncore.tick(bus);
        self.pic.tick(bus, &mut self.lines);
        Ok(breakpoint)
    }

    /// Core 0, which receives interrupt signals.
    #[must_use]
    pub fn boot_core(&self) -> &CpuCore {
        &self.cores[0]
    }

    /// Core `index`, if it exists.
    #[must_use]
    pub fn core(&self, index: usize) -> Option<&CpuCore> {
        self.cores.get(index)
    }

    /// Mutable core `index`, if it exists.
    pub fn core_mut(&mut self, index: usize) -> Option<&mut CpuCore> {
        self.cores.get_mut(index)
    }

    /// Number of cores.
    #[must_use]
    pub const fn core_count(&self) -> usize {
        self.cores.len()
    }

    /// The interrupt controller.
    #[must_use]
    pub const fn pic(&self) -> &InterruptController {
        &self.pic
    }

    /// Raises interrupt `id` from the host, bypassing the bus.
    pub fn raise_interrupt(&mut self, id: Word) {
        self.pic.raise(id, &mut self.lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm;
    use crate::bus::{message, MessageKind};
    use crate::memory::{PIC_LAST_INTERRUPT, RAM_START};
    use crate::state::Register;

    /// A core whose uncore side is answered directly by the test.
    struct Rig {
        bus: Interconnect,
        core: CpuCore,
        far: TerminalId,
        lines: InterruptLines,
        stats: Counters,
        program: Vec<Word>,
        memory: Vec<(Word, Word)>,
    }

    impl Rig {
        fn new(program: &[asm::Encoded]) -> Self {
            let mut bus = Interconnect::new();
            let (near, far) = bus.link(1, DEFAULT_BUFFER_WORDS);
            Self {
                bus,
                core: CpuCore::new(0, near, RAM_START),
                far,
                lines: InterruptLines::new(1),
                stats: Counters::new(),
                program: asm::assemble(program),
                memory: Vec::new(),
            }
        }

        fn word_at(&self, address: Word) -> Word {
            if let Some((_, value)) = self.memory.iter().rev().find(|(at, _)| *at == address) {
                return *value;
            }
            usize::try_from(address - RAM_START)
                .ok()
                .and_then(|offset| self.program.get(offset).copied())
                .unwrap_or(0)
        }

        fn serve(&mut self) {
            let Some(request) = self.bus.message(self.far).map(<[Word]>::to_vec) else {
                return;
            };
            let response = match message::kind(&request) {
                Some(MessageKind::Read) => {
                    let (address, len) = (request[1], request[2]);
                    let values = (0..len).map(|i| self.word_at(address + i)).collect::<Vec<_>>();
                    Some(message::response(address, &values))
                }
                Some(MessageKind::Write) => {
                    self.memory.push((request[1], request[2]));
                    None
                }
                _ => None,
            };
            match response {
                Some(response) => {
                    if self.bus.send(self.far, &response) {
                        self.bus.clear(self.far);
                    }
                }
                None => self.bus.clear(self.far),
            }
        }

        fn step(&mut self) -> Result<Option<Word>, Fault> {
            let result = self.core.tick(&mut self.bus, &mut self.lines, &mut self.stats);
            self.serve();
            self.bus.tick();
            result
        }

        fn run_to_break(&mut self, limit: usize) -> Word {
            for _ in 0..limit {
                if let Some(address) = self.step().expect("no fault") {
                    return address;
                }
            }
            panic!("no breakpoint within {limit} ticks");
        }
    }

    #[test]
    fn straight_line_program_reaches_breakpoint() {
        let mut rig = Rig::new(&[
            asm::set_literal(Register::R0, 5),
            asm::add_literal(Register::R0, Register::R0, 7),
            asm::breakpoint(),
        ]);
        let address = rig.run_to_break(500);
        assert_eq!(address, RAM_START + 4);
        assert_eq!(rig.core.registers().get(Register::R0), 12);
        assert_eq!(rig.stats.instructions_executed, 3);
    }

    #[test]
    fn stores_reach_the_bus() {
        let mut rig = Rig::new(&[
            asm::set_literal(Register::R1, 99),
            asm::store_literal(Register::R1, RAM_START + 500),
            asm::breakpoint(),
        ]);
        rig.run_to_break(500);
        assert!(rig.memory.contains(&(RAM_START + 500, 99)));
    }

    #[test]
    fn invalid_instruction_faults_with_its_address() {
        let mut rig = Rig::new(&[asm::set_literal(Register::R0, 1), [0x7f00_0000, 0]]);
        let fault = (0..500)
            .find_map(|_| rig.step().err())
            .expect("fault expected");
        assert_eq!(fault.code, FaultCode::UnknownUnit);
        assert_eq!(fault.address, RAM_START + 2);
    }

    #[test]
    fn iret_outside_handler_faults() {
        let mut rig = Rig::new(&[asm::interrupt_return()]);
        let fault = (0..500)
            .find_map(|_| rig.step().err())
            .expect("fault expected");
        assert_eq!(fault.code, FaultCode::ReturnOutsideInterrupt);
    }

    #[test]
    fn pending_interrupt_enters_handler_at_dispatch_boundary() {
        let handler = RAM_START + 100;
        let mut rig = Rig::new(&[
            asm::set_literal(Register::R0, 1),
            asm::set_literal(Register::R1, 2),
            asm::breakpoint(),
        ]);
        rig.memory.push((PIC_LAST_INTERRUPT, 40));
        rig.memory.push((40, handler));
        rig.memory.push((handler, asm::set_literal(Register::R5, 77)[0]));
        rig.memory.push((handler + 1, 77));
        let [w1, w2] = asm::interrupt_return();
        rig.memory.push((handler + 2, w1));
        rig.memory.push((handler + 3, w2));

        rig.lines.raise(0);
        let address = rig.run_to_break(2_000);
        assert_eq!(address, RAM_START + 4);
        assert_eq!(rig.core.registers().get(Register::R5), 77);
        assert_eq!(rig.core.registers().get(Register::R1), 2);
        assert!(!rig.core.in_interrupt());
        assert_eq!(rig.stats.interrupts_serviced, 1);
    }
}
