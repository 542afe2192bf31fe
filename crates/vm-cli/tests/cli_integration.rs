//! Integration tests for the pipevm binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow as _;
use clap as _;
use tracing as _;
use tracing_subscriber as _;
use vm_core::asm::{self, Encoded};
use vm_core::{Register, RAM_START};

fn pipevm(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pipevm"))
        .args(args)
        .output()
        .expect("failed to run pipevm")
}

fn write_program(dir: &Path, program: &[Encoded]) -> PathBuf {
    let path = dir.join("program.bin");
    let bytes = asm::assemble(program)
        .into_iter()
        .flat_map(i32::to_le_bytes)
        .collect::<Vec<_>>();
    fs::write(&path, bytes).expect("write program");
    path
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

#[test]
fn packed_program_boots_to_its_breakpoint() {
    let dir = tempfile::tempdir().expect("tempdir");
    let program = write_program(
        dir.path(),
        &[
            asm::set_literal(Register::R0, 5),
            asm::add_literal(Register::R0, Register::R0, 7),
            asm::breakpoint(),
        ],
    );
    let disk = dir.path().join("disk");

    let packed = pipevm(&["pack", path_str(&program), "--disk", path_str(&disk)]);
    assert!(packed.status.success());
    assert!(disk.join("0.block").exists());
    assert!(disk.join("1.block").exists());

    let run = pipevm(&[
        "run",
        "--disk",
        path_str(&disk),
        "--fast",
        "--stop-on-break",
        "--max-ticks",
        "3000000",
    ]);
    assert!(run.status.success());
    let stdout = String::from_utf8_lossy(&run.stdout);
    assert!(stdout.contains(&format!("breakpoint at {}", RAM_START + 4)), "{stdout}");
    assert!(stdout.contains("r0           12"), "{stdout}");
}

#[test]
fn fault_exits_with_failure_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    let program = write_program(dir.path(), &[asm::divide_literal(Register::R1, Register::R1, 0)]);
    let disk = dir.path().join("disk");
    assert!(pipevm(&["pack", path_str(&program), "--disk", path_str(&disk)])
        .status
        .success());

    let run = pipevm(&["run", "--disk", path_str(&disk), "--fast", "--max-ticks", "3000000"]);
    assert_eq!(run.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&run.stdout);
    assert!(stdout.contains("integer division by zero"), "{stdout}");
}

#[test]
fn disasm_lists_each_instruction() {
    let dir = tempfile::tempdir().expect("tempdir");
    let program = write_program(
        dir.path(),
        &[asm::set_literal(Register::R2, 9), asm::breakpoint()],
    );

    let output = pipevm(&["disasm", path_str(&program), "--origin", "0"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines = stdout.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].trim_start().starts_with('2'));
    assert!(lines[1].ends_with("break"));
}

#[test]
fn truncated_program_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let program = dir.path().join("bad.bin");
    fs::write(&program, [1, 2, 3]).expect("write");

    let output = pipevm(&["disasm", path_str(&program)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not a multiple of 4"), "{stderr}");
}

#[test]
fn missing_disk_reports_context() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("nope");
    let output = pipevm(&["run", "--disk", path_str(&missing)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("loading image"), "{stderr}");
}
