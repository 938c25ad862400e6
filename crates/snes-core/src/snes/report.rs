//! Call-flow text report over a range of NMIs
//!
//! Every control-flow change gets one line with the source and target PC,
//! indented by call depth, followed by the register file. Interrupts open a
//! new indentation level and a separator line.

use std::io::{Read, Seek, Write};

use super::cpu::Event;
use super::replay::{Replay, ReplayError};

const START_DEPTH: i32 = 4;
const SEPARATOR_WIDTH: usize = 130;
const REGISTER_COLUMN: usize = 76;
const MAX_DEPTH: i32 = 50;
const MAX_NESTING: usize = 10;

struct CallFlowWriter<'a, W: Write> {
    out: &'a mut W,
    depths: Vec<i32>,
}

impl<'a, W: Write> CallFlowWriter<'a, W> {
    fn new(out: &'a mut W) -> Self {
        CallFlowWriter {
            out,
            depths: vec![START_DEPTH],
        }
    }

    fn depth(&self) -> i32 {
        self.depths.last().copied().unwrap_or(START_DEPTH)
    }

    fn separator(&mut self, text: &str) -> std::io::Result<()> {
        let lead = (self.depth() * 2 - 1).max(0) as usize;
        let head = format!("{} {} ", "-".repeat(lead), text);
        let tail = SEPARATOR_WIDTH.saturating_sub(head.len());
        write!(self.out, "\n{}{}\n\n", head, "-".repeat(tail))
    }

    fn indent(&mut self) -> std::io::Result<usize> {
        let width = self.depth().max(0) as usize * 2;
        write!(self.out, "{}", " ".repeat(width))?;
        Ok(width)
    }

    /// Resets indentation once it has clearly drifted
    fn fix_depth(&mut self) -> std::io::Result<()> {
        let drifted = match self.depths.last() {
            None => true,
            Some(&depth) => depth > MAX_DEPTH || depth < 0 || self.depths.len() > MAX_NESTING,
        };
        if drifted {
            self.depths = vec![START_DEPTH];
            self.separator("RESETTING INDENTATION")?;
        }
        Ok(())
    }

    fn adjust_depth(&mut self, delta: i32) -> std::io::Result<()> {
        if let Some(depth) = self.depths.last_mut() {
            *depth += delta;
        }
        self.fix_depth()
    }

    fn interrupt(&mut self, label: &str) -> std::io::Result<()> {
        self.indent()?;
        writeln!(self.out, "  # {label}")?;
        self.depths.push(START_DEPTH);
        let kind = label.split_whitespace().next().unwrap_or(label);
        self.separator(kind)
    }

    fn return_from_interrupt(&mut self) -> std::io::Result<()> {
        write!(self.out, "\n --- RETURN FROM INTERRUPT --- \n\n")?;
        self.depths.pop();
        self.fix_depth()
    }

    fn jump_line<R: Read + Seek>(&mut self, from: u32, replay: &Replay<R>) -> std::io::Result<()> {
        let r = replay.registers();
        let mut spacing = self.indent()?;
        let text = format!("Jumped from {:06X} to {:06X}", from, r.program_counter);
        spacing += text.len();
        write!(self.out, "{text}")?;

        let mut pad = REGISTER_COLUMN as i64 - spacing as i64;
        while pad < 0 {
            pad += 8;
        }
        writeln!(
            self.out,
            "{}X={:04X} Y={:04X} A={:04X} DB={:02X} DP={:04X} S={:04X} P={:04X} PC={:06X} NMI={}",
            " ".repeat(pad as usize),
            r.register_x,
            r.register_y,
            r.register_a,
            r.data_bank,
            r.direct_page,
            r.stack_pointer,
            r.status.bits(),
            r.program_counter,
            replay.nmi_count().saturating_sub(1)
        )
    }
}

fn io_error(source: std::io::Error) -> ReplayError {
    ReplayError::Output(source)
}

/// Writes the call flow of NMIs `first..=last`
///
/// The replay must stand right after the step that handled NMI `first`, as
/// left by [`Replay::skip_until_nmi`].
pub fn write_report<R: Read + Seek, W: Write>(
    replay: &mut Replay<R>,
    first: u32,
    last: u32,
    out: &mut W,
) -> Result<(), ReplayError> {
    let mut report = CallFlowWriter::new(out);
    report.separator("START").map_err(io_error)?;
    report.interrupt(&format!("NMI {first}")).map_err(io_error)?;
    let entry_pc = replay.cpu.context.pc_before;
    report.jump_line(entry_pc, replay).map_err(io_error)?;

    loop {
        let pc = replay.registers().program_counter;
        if !replay.next()? {
            break;
        }
        let written = match replay.event() {
            Event::None => Ok(()),
            Event::Reset => continue,
            Event::Nmi => {
                let nmi = replay.nmi_count() - 1;
                if nmi > last {
                    break;
                }
                report
                    .interrupt(&format!("NMI {nmi}"))
                    .and_then(|_| report.jump_line(pc, replay))
            }
            Event::Irq => report.interrupt("IRQ"),
            Event::Rti => report
                .return_from_interrupt()
                .and_then(|_| report.jump_line(pc, replay)),
            Event::JsrOrJsl => report
                .adjust_depth(1)
                .and_then(|_| report.jump_line(pc, replay)),
            Event::RtsOrRtl => report
                .adjust_depth(-1)
                .and_then(|_| report.jump_line(pc, replay)),
            Event::JmpOrJml | Event::Branch => report.jump_line(pc, replay),
        };
        written.map_err(io_error)?;
    }
    report.out.flush().map_err(io_error)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::snes::test_utils::{frame_loop_trace, replay_over};

    #[test]
    fn test_separator_is_padded_to_width() {
        let mut out = Vec::new();
        let mut report = CallFlowWriter::new(&mut out);
        report.separator("NMI").unwrap();
        let text = String::from_utf8(out).unwrap();
        let line = text.trim_matches('\n');
        assert_eq!(line.len(), 130);
        assert!(line.starts_with("------- NMI ---"));
    }

    #[test]
    fn test_runaway_depth_is_reset() {
        let mut out = Vec::new();
        let mut report = CallFlowWriter::new(&mut out);
        report.adjust_depth(-5).unwrap();
        assert_eq!(report.depths, vec![START_DEPTH]);
        report.return_from_interrupt().unwrap();
        assert_eq!(report.depths, vec![START_DEPTH]);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("RESETTING INDENTATION").count(), 2);
    }

    #[test]
    fn test_report_over_sample_capture() {
        let (rom, log) = frame_loop_trace(4).unwrap();
        let mut replay = replay_over(rom, log).unwrap();
        replay.skip_until_nmi(1).unwrap();

        let mut out = Vec::new();
        write_report(&mut replay, 1, 2, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("  # NMI 1"));
        assert!(text.contains("  # NMI 2"));
        assert!(!text.contains("# NMI 3"));
        assert!(text.contains("Jumped from 008009 to 00A000"));
        assert!(text.contains("Jumped from 00A001 to 00800C"));
        assert_eq!(text.matches("RETURN FROM INTERRUPT").count(), 2);
        // stopped on the step that entered NMI 3
        assert_eq!(replay.nmi_count(), 4);
    }
}
