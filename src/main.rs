use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;

use log::info;
use snes_core::prelude::*;

enum Command {
    Build,
    Seek { nmi: u32 },
    Report { first: u32, last: u32, out: PathBuf },
    Verify,
}

struct Options {
    command: Command,
    replay: ReplayOptions,
    verbose: bool,
}

fn parse_args() -> Options {
    let mut args = env::args().skip(1);
    let mut positional: Vec<String> = Vec::new();
    let mut trace_path: Option<String> = None;
    let mut rom_path: Option<String> = None;
    let mut cache_path: Option<String> = None;
    let mut reference_path: Option<String> = None;
    let mut nmi_per_skip: Option<u32> = None;
    let mut rom_header = RomHeader::Auto;
    let mut strict_dma = false;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-t" | "--trace" => trace_path = Some(args.next().unwrap_or_default()),
            "-r" | "--rom" => rom_path = Some(args.next().unwrap_or_default()),
            "-c" | "--cache" => cache_path = Some(args.next().unwrap_or_default()),
            "--reference" => reference_path = Some(args.next().unwrap_or_default()),
            "-n" | "--nmi-per-skip" => {
                let val = args.next().unwrap_or_default();
                nmi_per_skip = Some(parse_u32(&val, "nmi-per-skip"));
            }
            "--header" => {
                let val = args.next().unwrap_or_default();
                rom_header = match val.as_str() {
                    "auto" => RomHeader::Auto,
                    "none" => RomHeader::None,
                    "copier" => RomHeader::Copier,
                    _ => {
                        eprintln!("Invalid header mode: {val}");
                        print_usage_and_exit();
                    }
                };
            }
            "--strict-dma" => strict_dma = true,
            "-v" | "--verbose" => verbose = true,
            "-h" | "--help" => print_usage_and_exit(),
            _ if arg.starts_with('-') => {
                eprintln!("Unknown option: {arg}");
                print_usage_and_exit();
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("build") => Command::Build,
        Some("seek") => Command::Seek {
            nmi: parse_u32(&next_positional(&mut positional, "nmi"), "nmi"),
        },
        Some("report") => {
            let first = parse_u32(&next_positional(&mut positional, "first"), "first");
            let last = parse_u32(&next_positional(&mut positional, "last"), "last");
            if last < first {
                eprintln!("Report range is empty: {first}..={last}");
                print_usage_and_exit();
            }
            Command::Report {
                first,
                last,
                out: PathBuf::from(next_positional(&mut positional, "out")),
            }
        }
        Some("verify") => Command::Verify,
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_usage_and_exit();
        }
        None => {
            eprintln!("Missing command.");
            print_usage_and_exit();
        }
    };
    if let Some(extra) = positional.next() {
        eprintln!("Unexpected argument: {extra}");
        print_usage_and_exit();
    }

    let trace_path = trace_path.unwrap_or_else(|| {
        eprintln!("Missing --trace.");
        print_usage_and_exit();
    });
    let rom_path = rom_path.unwrap_or_else(|| {
        eprintln!("Missing --rom.");
        print_usage_and_exit();
    });
    if matches!(command, Command::Verify) && reference_path.is_none() {
        eprintln!("verify needs --reference.");
        print_usage_and_exit();
    }

    let mut replay = ReplayOptions::new(trace_path, rom_path);
    replay.rom_header = rom_header;
    replay.cache_path = cache_path.map(PathBuf::from);
    replay.reference_path = reference_path.map(PathBuf::from);
    replay.strict_dma = strict_dma;
    if let Some(nmi_per_skip) = nmi_per_skip {
        if nmi_per_skip == 0 {
            eprintln!("--nmi-per-skip must be at least 1.");
            print_usage_and_exit();
        }
        replay.nmi_per_skip = nmi_per_skip;
    }

    Options {
        command,
        replay,
        verbose,
    }
}

fn next_positional(args: &mut impl Iterator<Item = String>, name: &str) -> String {
    args.next().unwrap_or_else(|| {
        eprintln!("Missing <{name}>.");
        print_usage_and_exit();
    })
}

fn parse_u32(value: &str, name: &str) -> u32 {
    if value.starts_with("0x") || value.starts_with("0X") {
        u32::from_str_radix(&value[2..], 16).unwrap_or_else(|_| {
            eprintln!("Invalid hex {name}: {value}");
            print_usage_and_exit();
        })
    } else {
        value.parse::<u32>().unwrap_or_else(|_| {
            eprintln!("Invalid {name}: {value}");
            print_usage_and_exit();
        })
    }
}

fn print_usage_and_exit() -> ! {
    eprintln!("Usage: snes-replay build  --trace <path> --rom <path> [options]");
    eprintln!("   or: snes-replay seek <nmi> --trace <path> --rom <path> [options]");
    eprintln!("   or: snes-replay report <first> <last> <out> --trace <path> --rom <path> [options]");
    eprintln!("   or: snes-replay verify --trace <path> --rom <path> --reference <path> [options]");
    eprintln!("Options:");
    eprintln!("  -t, --trace <path>          Trace log to replay (required)");
    eprintln!("  -r, --rom <path>            ROM image the trace was captured from (required)");
    eprintln!("  -c, --cache <path>          Skip cache (default: <trace>.emulation_cache)");
    eprintln!("      --reference <path>      Reference register stream to verify against");
    eprintln!("  -n, --nmi-per-skip <count>  Snapshot interval for build (default: 10)");
    eprintln!("      --header <mode>         ROM header: auto, none or copier (default: auto)");
    eprintln!("      --strict-dma            Fail on DMA shapes that are not modeled");
    eprintln!("  -v, --verbose               Print extra diagnostics");
    eprintln!("Logging follows RUST_LOG (e.g. RUST_LOG=info).");
    process::exit(2);
}

fn print_registers<R: std::io::Read + std::io::Seek>(replay: &Replay<R>) {
    let r = replay.registers();
    println!(
        "NMI={} OP={} PC={:06X} A={:04X} X={:04X} Y={:04X} S={:04X} DP={:04X} DB={:02X} P={:03X} WRAM={:05X}",
        replay.nmi_count().saturating_sub(1),
        replay.op_count(),
        r.program_counter,
        r.register_a,
        r.register_x,
        r.register_y,
        r.stack_pointer,
        r.direct_page,
        r.data_bank,
        r.status.bits(),
        replay.record().wram_address
    );
}

fn build(replay: &mut Replay, opts: &Options) -> Result<(), ReplayError> {
    let cache_path = opts.replay.cache_path();
    let summary = build_cache_file(replay, &cache_path, opts.replay.nmi_per_skip)?;
    println!("NMIs:               {}", replay.nmi_count());
    println!("Ops:                {}", replay.op_count());
    println!("Executed addresses: {}", summary.executed().count());
    println!("Op variants:        {}", summary.variant_count());
    println!("Labels:             {}", summary.labels.len());
    println!("Memory references:  {}", summary.memory_references.len());
    println!("DMA transfers:      {}", summary.dma_transfers.len());
    if opts.verbose {
        for transfer in summary.sorted_dma_transfers() {
            println!("  {transfer:?}");
        }
    }
    println!("Cache:              {}", cache_path.display());
    Ok(())
}

fn run(opts: &Options) -> Result<(), ReplayError> {
    let mut replay = Replay::open(&opts.replay)?;
    match &opts.command {
        Command::Build => build(&mut replay, opts),
        Command::Seek { nmi } => {
            replay.seek(*nmi, &opts.replay.cache_path())?;
            print_registers(&replay);
            Ok(())
        }
        Command::Report { first, last, out } => {
            replay.seek(*first, &opts.replay.cache_path())?;
            let file = File::create(out).map_err(|source| ReplayError::Io {
                path: out.clone(),
                source,
            })?;
            let mut writer = BufWriter::new(file);
            write_report(&mut replay, *first, *last, &mut writer)?;
            info!("Report for NMIs {first}..={last} written to {}", out.display());
            if opts.verbose {
                print_registers(&replay);
            }
            Ok(())
        }
        Command::Verify => {
            while replay.next()? {}
            println!(
                "Verified {} ops over {} NMIs",
                replay.op_count(),
                replay.nmi_count()
            );
            Ok(())
        }
    }
}

fn main() {
    env_logger::init();
    let opts = parse_args();
    if let Err(err) = run(&opts) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}
