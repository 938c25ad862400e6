//! Verification tooling for the replay core
//!
//! Two checks live here. Single-instruction vectors in the `SingleStepTests`
//! JSON layout are run against the executor one at a time, and a JSON-lines
//! register stream from another emulator is compared step by step against a
//! replay or converted into the binary reference stream a replay consumes.

use std::io::{BufRead, Read, Seek, Write};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use snes_core::prelude::*;

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Cpu(#[from] CpuError),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error("{name}: {}", .mismatches.join("; "))]
    Mismatch { name: String, mismatches: Vec<String> },

    #[error("Reference line {line}: {message}")]
    Reference { line: usize, message: String },
}

//
// Single-instruction vectors
/////////////////////////////

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StepTest {
    pub name: String,
    pub initial: CpuState,
    #[serde(rename = "final")]
    pub final_state: CpuState,
    /// Bus activity per cycle; not modeled
    #[serde(default)]
    pub cycles: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CpuState {
    pub pc: u16,
    pub s: u16,
    pub p: u8,
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub dbr: u8,
    pub d: u16,
    pub pbr: u8,
    pub e: u8,
    pub ram: Vec<(u32, u8)>,
}

impl CpuState {
    pub fn registers(&self) -> Registers {
        let mut status = Flags::from_bits_retain(self.p as u16);
        status.set(Flags::EMULATION, self.e != 0);
        Registers {
            program_counter: ((self.pbr as u32) << 16) | self.pc as u32,
            register_a: self.a,
            register_x: self.x,
            register_y: self.y,
            stack_pointer: self.s,
            direct_page: self.d,
            data_bank: self.dbr,
            status,
        }
    }
}

pub fn load_tests(json: &str) -> Result<Vec<StepTest>, StepError> {
    Ok(serde_json::from_str(json)?)
}

/// Differences between the CPU and an expected state, empty when they agree
pub fn compare(cpu: &CPU, expected: &CpuState) -> Vec<String> {
    let want = expected.registers();
    let got = cpu.registers;
    let mut mismatches = Vec::new();

    let mut check = |name: &str, got: u32, want: u32, digits: usize| {
        if got != want {
            mismatches.push(format!(
                "{name}: got ${got:0digits$X}, want ${want:0digits$X}"
            ));
        }
    };
    check("PC", got.program_counter, want.program_counter, 6);
    check("A", got.register_a as u32, want.register_a as u32, 4);
    check("X", got.register_x as u32, want.register_x as u32, 4);
    check("Y", got.register_y as u32, want.register_y as u32, 4);
    check("S", got.stack_pointer as u32, want.stack_pointer as u32, 4);
    check("D", got.direct_page as u32, want.direct_page as u32, 4);
    check("DBR", got.data_bank as u32, want.data_bank as u32, 2);
    check("P", got.p() as u32, want.p() as u32, 3);

    for &(address, value) in &expected.ram {
        let actual = cpu.peek_byte(address);
        if actual != value {
            mismatches.push(format!(
                "RAM[${address:06X}]: got ${actual:02X}, want ${value:02X}"
            ));
        }
    }
    mismatches
}

/// Runs one vector: load the initial state, execute one step, compare
pub fn run_step_test(test: &StepTest) -> Result<(), StepError> {
    let mut cpu = cpu_with_state(test.initial.registers(), &test.initial.ram);
    cpu.step()?;
    let mismatches = compare(&cpu, &test.final_state);
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(StepError::Mismatch {
            name: test.name.clone(),
            mismatches,
        })
    }
}

/// Passed count and the failures of a batch
#[derive(Debug, Default)]
pub struct StepReport {
    pub passed: usize,
    pub failures: Vec<StepError>,
}

pub fn run_step_tests(tests: &[StepTest]) -> StepReport {
    let mut report = StepReport::default();
    for test in tests {
        match run_step_test(test) {
            Ok(()) => report.passed += 1,
            Err(err) => {
                debug!("{err}");
                report.failures.push(err);
            }
        }
    }
    info!(
        "{} of {} step vectors passed",
        report.passed,
        tests.len()
    );
    report
}

//
// JSON-lines reference streams
///////////////////////////////

/// Register file as another emulator dumps it, PC including the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct JsonRegisters {
    pub pc: u32,
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub s: u16,
    pub d: u16,
    pub db: u8,
    /// Status word with the emulation flag in bit 8
    pub p: u16,
    #[serde(default)]
    pub wram: u32,
}

impl From<JsonRegisters> for RegisterRecord {
    fn from(r: JsonRegisters) -> Self {
        let registers = Registers {
            program_counter: r.pc & 0xFF_FFFF,
            register_a: r.a,
            register_x: r.x,
            register_y: r.y,
            stack_pointer: r.s,
            direct_page: r.d,
            data_bank: r.db,
            status: Flags::from_bits_retain(r.p),
        };
        RegisterRecord::new(registers, r.wram)
    }
}

impl From<RegisterRecord> for JsonRegisters {
    fn from(record: RegisterRecord) -> Self {
        let r = record.registers;
        JsonRegisters {
            pc: r.program_counter,
            a: r.register_a,
            x: r.register_x,
            y: r.register_y,
            s: r.stack_pointer,
            d: r.direct_page,
            db: r.data_bank,
            p: r.p(),
            wram: record.wram_address,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct JsonStep {
    pub op: u64,
    pub before: JsonRegisters,
    pub after: JsonRegisters,
}

impl From<JsonStep> for ReferenceStep {
    fn from(step: JsonStep) -> Self {
        ReferenceStep {
            op: step.op,
            before: step.before.into(),
            after: step.after.into(),
        }
    }
}

/// Yields `(line number, step)` for every non-blank line
fn json_steps<I: BufRead>(input: I) -> impl Iterator<Item = Result<(usize, JsonStep), StepError>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
        .map(|(index, line)| {
            let line = line?;
            let step = serde_json::from_str(&line).map_err(|err| StepError::Reference {
                line: index + 1,
                message: err.to_string(),
            })?;
            Ok((index + 1, step))
        })
}

/// Rewrites a JSON-lines register stream as a binary reference stream
pub fn convert_reference<I: BufRead, W: Write>(input: I, sink: W) -> Result<(W, usize), StepError> {
    let mut writer = ReferenceWriter::new(sink);
    let mut count = 0;
    for entry in json_steps(input) {
        let (_, step) = entry?;
        writer.write_step(&step.into())?;
        count += 1;
    }
    Ok((writer.into_inner()?, count))
}

/// Steps `replay` alongside the JSON-lines stream until either runs out
///
/// Returns the number of steps compared. Records for ops the replay has
/// already passed are skipped.
pub fn verify_replay<R: Read + Seek, I: BufRead>(
    replay: &mut Replay<R>,
    input: I,
) -> Result<usize, StepError> {
    let mut compared = 0;
    for entry in json_steps(input) {
        let (line, step) = entry?;
        if step.op < replay.op_count() {
            continue;
        }
        while replay.op_count() < step.op {
            if !replay.next()? {
                return Ok(compared);
            }
        }

        let before = replay.record();
        if !replay.next()? {
            return Ok(compared);
        }
        let after = replay.record();
        let expected: ReferenceStep = step.into();

        let mut mismatches = Vec::new();
        if expected.before != before {
            mismatches.push(format!(
                "before: got {:?}, want {:?}",
                JsonRegisters::from(before),
                step.before
            ));
        }
        if expected.after != after {
            mismatches.push(format!(
                "after: got {:?}, want {:?}",
                JsonRegisters::from(after),
                step.after
            ));
        }
        if !mismatches.is_empty() {
            return Err(StepError::Reference {
                line,
                message: format!("op {}: {}", step.op, mismatches.join("; ")),
            });
        }
        compared += 1;
    }
    Ok(compared)
}
