#[cfg(test)]
mod test {
    use std::io::{Cursor, Read};

    use crate::snes::cpu::Event;
    use crate::snes::replay::{Replay, ReplayError};
    use crate::snes::skip_cache::{SkipCache, SkipCacheWriter, build_pass};
    use crate::snes::summary::{MemoryReference, TraceSummary, WRITE_FLAG};
    use crate::snes::test_utils::*;
    use crate::snes::trace::{TraceError, TraceWriter};
    use crate::snes::trace::format::RegisterRecord;
    use crate::snes::trace::reference::{ReferenceReader, ReferenceStep, ReferenceWriter};

    type MemReplay = Replay<Cursor<Vec<u8>>>;

    fn sample(frames: u32) -> MemReplay {
        let (rom, log) = frame_loop_trace(frames).unwrap();
        replay_over(rom, log).unwrap()
    }

    fn run_to_end(replay: &mut MemReplay) {
        while replay.next().unwrap() {}
    }

    /// Everything that must match between two replays standing at the same point
    fn state(replay: &MemReplay) -> (RegisterRecord, u64, u32, Vec<u8>, Vec<u8>) {
        (
            replay.record(),
            replay.op_count(),
            replay.nmi_count(),
            replay.cpu.memory.wram().to_vec(),
            replay.cpu.memory.io_shadow(),
        )
    }

    fn build_cache(frames: u32, nmi_per_skip: u32) -> (Vec<u8>, TraceSummary, u32) {
        let mut replay = sample(frames);
        let mut writer =
            SkipCacheWriter::new(Cursor::new(Vec::new()), TEST_FINGERPRINT, nmi_per_skip).unwrap();
        let (summary, nmi_count) = build_pass(&mut replay, Some(&mut writer)).unwrap();
        let bytes = writer.finish(nmi_count, &summary).unwrap().into_inner();
        (bytes, summary, nmi_count)
    }

    #[test]
    fn test_counters_follow_the_capture() {
        let mut replay = sample(3);
        run_to_end(&mut replay);

        assert!(replay.is_finished());
        assert_eq!(replay.op_count(), 4 * FRAME_OPS);
        assert_eq!(replay.nmi_count(), 4);
        assert_eq!(replay.read_byte(0x7E_0300), joypad_value(3));
        // patterned byte at $0301 is 0x301 % 251 = 16, incremented once per frame
        assert_eq!(replay.read_byte(0x00_0301), 16 + 3);
        assert!(!replay.next().unwrap());
    }

    #[test]
    fn test_reset_loads_registers_and_memory() {
        let mut replay = sample(1);
        assert!(replay.next().unwrap());

        assert_eq!(replay.event(), Event::Reset);
        assert_eq!(replay.nmi_count(), 1);
        assert_eq!(replay.registers().program_counter, PROGRAM_ORIGIN);
        assert_eq!(replay.registers().stack_pointer, 0x1FFF);
        assert_eq!(replay.cpu.memory.wram(), patterned_wram().as_slice());
    }

    #[test]
    fn test_supplied_read_lands_before_the_instruction() {
        let mut replay = sample(2);
        replay.skip_until_nmi(1).unwrap();
        assert_eq!(replay.event(), Event::Nmi);
        assert_eq!(replay.registers().program_counter, NMI_HANDLER);
        assert_eq!(replay.op_count(), FRAME_OPS + 1);

        replay.next().unwrap();
        assert_eq!(replay.registers().register_a & 0xFF, joypad_value(1) as u16);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let mut a = sample(4);
        let mut b = sample(4);
        loop {
            let more_a = a.next().unwrap();
            let more_b = b.next().unwrap();
            assert_eq!(more_a, more_b);
            assert_eq!(state(&a), state(&b));
            if !more_a {
                break;
            }
        }
    }

    #[test]
    fn test_seek_through_cache_matches_linear_replay() {
        let (bytes, _, nmi_count) = build_cache(6, 2);
        assert_eq!(nmi_count, 7);

        for target in [0, 1, 2, 3, 5, 6] {
            let mut linear = sample(6);
            linear.skip_until_nmi(target).unwrap();

            let mut cached = sample(6);
            let mut cache = SkipCache::from_reader(Cursor::new(bytes.clone()), TEST_FINGERPRINT).unwrap();
            cached.skip_until_nmi_cached(target, &mut cache).unwrap();

            assert_eq!(state(&linear), state(&cached), "NMI {target}");
            for _ in 0..25 {
                assert_eq!(linear.next().unwrap(), cached.next().unwrap());
                assert_eq!(state(&linear), state(&cached), "NMI {target}");
            }
        }
    }

    #[test]
    fn test_cache_is_used_to_jump_back() {
        let (bytes, _, _) = build_cache(6, 2);
        let mut cache = SkipCache::from_reader(Cursor::new(bytes), TEST_FINGERPRINT).unwrap();

        let mut replay = sample(6);
        replay.skip_until_nmi(5).unwrap();
        replay.skip_until_nmi_cached(3, &mut cache).unwrap();

        let mut linear = sample(6);
        linear.skip_until_nmi(3).unwrap();
        assert_eq!(state(&replay), state(&linear));
    }

    #[test]
    fn test_seeking_backwards_without_cache_restarts() {
        let mut replay = sample(5);
        replay.skip_until_nmi(4).unwrap();
        replay.skip_until_nmi(2).unwrap();

        let mut linear = sample(5);
        linear.skip_until_nmi(2).unwrap();
        assert_eq!(state(&replay), state(&linear));
    }

    #[test]
    fn test_seek_past_the_end() {
        let mut replay = sample(2);
        assert!(matches!(
            replay.skip_until_nmi(9),
            Err(ReplayError::NmiOutOfRange { requested: 9, available: 3 })
        ));
    }

    #[test]
    fn test_snapshot_restores_bit_identical_state() {
        let mut replay = sample(4);
        replay.skip_until_nmi(2).unwrap();
        let snapshot = replay.snapshot().unwrap();
        let before = state(&replay);
        assert_eq!(snapshot.nmi, 2);
        assert_eq!(snapshot.current_op, 2 * FRAME_OPS + 1);

        for _ in 0..30 {
            replay.next().unwrap();
        }
        assert!(replay.snapshot().is_none());
        assert_ne!(state(&replay), before);

        replay.restore(&snapshot).unwrap();
        assert_eq!(state(&replay), before);
    }

    #[test]
    fn test_event_inside_interrupt_step_is_a_desync() {
        let rom = build_rom(&[0xEA, 0x80, 0xFD], &[0x40], &[]);
        let mut writer = TraceWriter::new(Vec::new(), &trace_header(&rom)).unwrap();
        writer.reset(0, &reset_record(PROGRAM_ORIGIN), &patterned_wram()).unwrap();
        writer.nmi(5).unwrap();
        let mut log = writer.finish(6).unwrap();
        log.truncate(log.len() - 5);
        // READ_BYTE with delta 0, due at the NMI's own op
        log.extend_from_slice(&[3, 0, 0, 0, 0, 0x18, 0x42, 0x00, 0x00, 0x01]);
        log.extend_from_slice(&[5, 1, 0, 0, 0]);

        let mut replay = replay_over(rom, log).unwrap();
        for _ in 0..6 {
            assert!(replay.next().unwrap());
        }
        assert!(matches!(
            replay.next(),
            Err(ReplayError::Trace(TraceError::Desync { event_op: 5, current_op: 6 }))
        ));
    }

    #[test]
    fn test_rom_must_match_the_trace() {
        let (_, log) = frame_loop_trace(1).unwrap();
        let other = build_rom(&[0xEA], &[0x40], &[]);
        assert!(matches!(
            replay_over(other, log),
            Err(ReplayError::RomMismatch { .. })
        ));
    }

    #[test]
    fn test_breakpoints_are_polled_not_enforced() {
        let mut replay = sample(3);
        replay.breakpoints.insert_range(NMI_HANDLER, NMI_HANDLER + 0x0F);
        let mut hits = Vec::new();
        while replay.next().unwrap() {
            if replay.breakpoint_hit() {
                hits.push((replay.nmi_count(), replay.registers().program_counter));
            }
        }
        // four handler instructions per frame: LDA, STA, INC, RTI
        assert_eq!(hits.len(), 3 * 4);
        assert_eq!(hits[0], (2, NMI_HANDLER));
        assert!(replay.is_finished());
    }

    fn reference_stream(frames: u32) -> Vec<ReferenceStep> {
        let mut replay = sample(frames);
        let mut steps = Vec::new();
        loop {
            let op = replay.op_count();
            let before = replay.record();
            if !replay.next().unwrap() {
                return steps;
            }
            steps.push(ReferenceStep {
                op,
                before,
                after: replay.record(),
            });
        }
    }

    fn reference_reader(steps: &[ReferenceStep]) -> ReferenceReader<Box<dyn Read>> {
        let mut writer = ReferenceWriter::new(Vec::new());
        for step in steps {
            writer.write_step(step).unwrap();
        }
        let source: Box<dyn Read> = Box::new(Cursor::new(writer.into_inner().unwrap()));
        ReferenceReader::new(source)
    }

    #[test]
    fn test_matching_reference_verifies_cleanly() {
        let steps = reference_stream(2);
        let mut replay = sample(2);
        replay.set_reference(reference_reader(&steps));
        run_to_end(&mut replay);
        assert_eq!(replay.op_count(), steps.len() as u64);
    }

    #[test]
    fn test_divergence_reports_both_register_sets() {
        let mut steps = reference_stream(2);
        steps[50].after.registers.register_a ^= 0x0001;
        let mut replay = sample(2);
        replay.set_reference(reference_reader(&steps));

        let err = loop {
            match replay.next() {
                Ok(true) => continue,
                Ok(false) => panic!("divergence went unnoticed"),
                Err(err) => break err,
            }
        };
        match err {
            ReplayError::Divergence { op, details } => {
                assert_eq!(op, 50);
                assert!(details.contains("expected after"));
                assert!(details.contains("actual after"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_pass_summary() {
        let (_, summary, _) = build_cache(3, 10);

        assert!(summary.labels.contains(PROGRAM_ORIGIN));
        assert!(summary.labels.contains(NMI_HANDLER));
        assert!(summary.labels.contains(SUBROUTINE));

        let jsr = summary.variants(PROGRAM_ORIGIN + 9);
        assert_eq!(jsr.len(), 1);
        assert_eq!(jsr[0].jump_target, Some(SUBROUTINE));
        assert_eq!(jsr[0].status, 0x30);

        // INX consumes all eight bits of X, so every distinct X is its own variant
        assert!(summary.variants(SUBROUTINE).len() > 1);
        assert!(summary.variants(SUBROUTINE).iter().all(|v| v.jump_target.is_none()));

        assert!(summary.memory_references.contains(&MemoryReference {
            address: 0x7E_0300,
            pc: (NMI_HANDLER + 3) | WRITE_FLAG,
        }));
        assert!(summary.memory_references.contains(&MemoryReference {
            address: 0x00_4218,
            pc: NMI_HANDLER,
        }));
        // stack traffic is not a memory reference
        assert!(!summary
            .memory_references
            .iter()
            .any(|r| (0x7E_1FF0..=0x7E_1FFF).contains(&r.address)));
    }
}
