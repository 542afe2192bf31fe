//! `pipevm`: pack programs onto disk images, boot them and inspect instruction streams.

mod logging;
mod program;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vm_core::{
    disassemble, BlockImage, Machine, MachineConfig, RunBoundary, TickOutcome, Word, RAM_START,
};

#[cfg(test)]
use tempfile as _;

/// Cycle-stepped pipelined machine simulator.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// Raise log verbosity (repeatable); `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Packs a program file onto a bootable disk image directory.
    Pack {
        /// Program file of little-endian i32 words.
        program: PathBuf,
        /// Destination image directory.
        #[arg(long)]
        disk: PathBuf,
        /// Image capacity in blocks.
        #[arg(long, default_value_t = vm_core::DEFAULT_BLOCK_CAPACITY)]
        capacity: usize,
    },
    /// Boots a disk image and runs the machine.
    Run {
        /// Image directory to boot from.
        #[arg(long)]
        disk: PathBuf,
        /// Use shortened device latencies.
        #[arg(long)]
        fast: bool,
        /// Tick budget.
        #[arg(long, default_value_t = 10_000_000)]
        max_ticks: u64,
        /// Stop at the first breakpoint.
        #[arg(long)]
        stop_on_break: bool,
        /// Start at this address instead of the BIOS.
        #[arg(long)]
        entry: Option<Word>,
        /// Write the image back after the run.
        #[arg(long)]
        save: bool,
    },
    /// Prints address, raw words and mnemonic for each instruction.
    Disasm {
        /// Program file of little-endian i32 words.
        program: PathBuf,
        /// Address of the first instruction.
        #[arg(long, default_value_t = RAM_START)]
        origin: Word,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match execute(cli.command) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command) -> Result<ExitCode> {
    match command {
        Command::Pack {
            program,
            disk,
            capacity,
        } => {
            let words = program::read_words(&program)?;
            let image = BlockImage::from_program(capacity, &words)
                .with_context(|| format!("packing `{}`", program.display()))?;
            image
                .save_dir(&disk)
                .with_context(|| format!("writing image to `{}`", disk.display()))?;
            println!(
                "packed {} words into {} blocks at {}",
                words.len(),
                image.program_block_count(),
                disk.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            disk,
            fast,
            max_ticks,
            stop_on_break,
            entry,
            save,
        } => {
            let mut config = if fast {
                MachineConfig::fast()
            } else {
                MachineConfig::default()
            };
            let image = BlockImage::load_dir(&disk, config.block_capacity)
                .with_context(|| format!("loading image from `{}`", disk.display()))?;
            if let Some(entry) = entry {
                config.entry_point = entry;
            }
            tracing::info!(
                disk = %disk.display(),
                blocks = image.program_block_count(),
                entry = config.entry_point,
                "booting"
            );
            let mut machine = Machine::new(config, image);

            let boundary = if stop_on_break {
                RunBoundary::Breakpoint
            } else {
                RunBoundary::TickLimit
            };
            let result = machine.run(max_ticks, boundary);
            report(&machine);

            if save {
                machine
                    .block_image()
                    .save_dir(&disk)
                    .with_context(|| format!("saving image to `{}`", disk.display()))?;
            }
            match result {
                Ok(outcome) => {
                    match outcome.last {
                        TickOutcome::Breakpoint { address } => {
                            println!("breakpoint at {address} after {} ticks", outcome.ticks);
                        }
                        TickOutcome::Running => println!("stopped after {} ticks", outcome.ticks),
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(fault) => {
                    println!("fault: {fault}");
                    Ok(ExitCode::from(2))
                }
            }
        }
        Command::Disasm { program, origin } => {
            let words = program::read_words(&program)?;
            for row in disassemble(origin, &words) {
                println!(
                    "{:>10}  {:08x} {:08x}  {}",
                    row.address, row.word1, row.word2, row.text
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn report(machine: &Machine) {
    let snapshot = machine.snapshot();
    println!("ip {}  sp {}  stage {}", snapshot.ip, snapshot.sp, snapshot.stage);
    if let Some(active) = &snapshot.active {
        println!("active {}: {}", active.address, active.mnemonic);
    }
    for (index, value) in snapshot.registers.iter().enumerate() {
        let sep = if index % 4 == 3 { "\n" } else { "  " };
        print!("r{index:<2} {value:>11}{sep}");
    }
    println!("{}", machine.counters());
    let text = machine.display().text();
    if !text.trim().is_empty() {
        println!("--- display ---\n{}", text.trim_end());
    }
}
