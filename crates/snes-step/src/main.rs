/*
   Runs 65816 single-step opcode vectors from
   https://github.com/SingleStepTests/65816, or converts a JSON-lines
   register stream into the binary reference stream `snes-replay verify` reads.
*/
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::process;

use snes_step::{StepError, convert_reference, load_tests, run_step_tests};

fn print_usage_and_exit() -> ! {
    eprintln!("Usage: snes-step <directory_path> <hex_opcode> [--native | --emulation]");
    eprintln!("   or: snes-step --convert <reference.jsonl> <reference.bin>");
    process::exit(2);
}

fn run_opcode(dir: &Path, opcode: u8, suffix: &str) -> Result<bool, StepError> {
    let file_path = dir.join(format!("{opcode:02x}.{suffix}.json"));
    let contents = fs::read_to_string(&file_path)?;
    let tests = load_tests(&contents)?;
    println!("Running {} tests from {}", tests.len(), file_path.display());

    let report = run_step_tests(&tests);
    for failure in report.failures.iter().take(10) {
        println!("  FAIL {failure}");
    }
    println!("{} passed, {} failed", report.passed, report.failures.len());
    Ok(report.failures.is_empty())
}

fn convert(input: &str, output: &str) -> Result<(), StepError> {
    let source = BufReader::new(File::open(input)?);
    let sink = BufWriter::new(File::create(output)?);
    let (_, count) = convert_reference(source, sink)?;
    println!("Converted {count} steps into {output}");
    Ok(())
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();

    let result = match args.as_slice() {
        [flag, input, output] if flag == "--convert" => convert(input, output).map(|_| true),
        [dir, opcode, rest @ ..] if rest.len() <= 1 => {
            let suffix = match rest.first().map(String::as_str) {
                None | Some("--native") => "n",
                Some("--emulation") => "e",
                Some(other) => {
                    eprintln!("Unexpected argument: {other}");
                    print_usage_and_exit();
                }
            };
            let opcode = u8::from_str_radix(opcode, 16).unwrap_or_else(|_| {
                eprintln!("Invalid opcode '{opcode}'. Expected a hex value (e.g., 'a9').");
                print_usage_and_exit();
            });
            run_opcode(Path::new(dir), opcode, suffix)
        }
        _ => print_usage_and_exit(),
    };

    match result {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(2);
        }
    }
}
