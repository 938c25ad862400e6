//! JSON-lines register streams against the sample capture

use std::io::{Cursor, Read};

use snes_core::prelude::*;
use snes_step::{JsonRegisters, JsonStep, StepError, convert_reference, verify_replay};

fn sample() -> Replay<Cursor<Vec<u8>>> {
    let (rom, log) = frame_loop_trace(2).unwrap();
    replay_over(rom, log).unwrap()
}

/// One JSON line per step of a full replay
fn json_lines() -> Vec<String> {
    let mut replay = sample();
    let mut lines = Vec::new();
    loop {
        let op = replay.op_count();
        let before = replay.record();
        if !replay.next().unwrap() {
            return lines;
        }
        let step = JsonStep {
            op,
            before: before.into(),
            after: replay.record().into(),
        };
        lines.push(serde_json::to_string(&step).unwrap());
    }
}

#[test]
fn test_matching_stream_verifies() {
    let lines = json_lines();
    let mut replay = sample();
    let compared = verify_replay(&mut replay, Cursor::new(lines.join("\n"))).unwrap();
    assert_eq!(compared, lines.len());
}

#[test]
fn test_stream_may_start_late() {
    let lines = json_lines();
    let mut replay = sample();
    let tail = lines[45..].join("\n\n");
    let compared = verify_replay(&mut replay, Cursor::new(tail)).unwrap();
    assert_eq!(compared, lines.len() - 45);
    assert_eq!(replay.op_count(), lines.len() as u64);
}

#[test]
fn test_first_difference_is_reported_with_its_line() {
    let mut lines = json_lines();
    let mut step: JsonStep = serde_json::from_str(&lines[30]).unwrap();
    step.after.x ^= 0x0004;
    lines[30] = serde_json::to_string(&step).unwrap();

    let mut replay = sample();
    match verify_replay(&mut replay, Cursor::new(lines.join("\n"))) {
        Err(StepError::Reference { line, message }) => {
            assert_eq!(line, 31);
            assert!(message.starts_with("op 30: after"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_converted_stream_drives_replay_verification() {
    let lines = json_lines();
    let (bytes, count) = convert_reference(Cursor::new(lines.join("\n")), Vec::new()).unwrap();
    assert_eq!(count, lines.len());

    let mut replay = sample();
    let source: Box<dyn Read> = Box::new(Cursor::new(bytes));
    replay.set_reference(ReferenceReader::new(source));
    while replay.next().unwrap() {}
    assert_eq!(replay.op_count(), lines.len() as u64);
}

#[test]
fn test_json_registers_keep_the_emulation_bit() {
    let json = r#"{"pc": 8421376, "a": 1, "x": 2, "y": 3, "s": 511, "d": 0, "db": 128, "p": 304}"#;
    let registers: JsonRegisters = serde_json::from_str(json).unwrap();
    let record: RegisterRecord = registers.into();
    assert!(record.registers.is_emulation());
    assert_eq!(record.registers.program_counter, 0x80_8000);
    assert_eq!(record.wram_address, 0);
    assert_eq!(JsonRegisters::from(record), registers);
}
