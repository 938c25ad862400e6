//! Hand-written vectors in the `SingleStepTests` 65816 layout

use snes_step::{StepError, load_tests, run_step_test, run_step_tests};

const VECTORS: &str = r#"[
  {
    "name": "a9 lda immediate 16-bit",
    "initial": { "pc": 32768, "s": 511, "p": 0, "a": 0, "x": 0, "y": 0, "dbr": 0, "d": 0, "pbr": 0, "e": 0,
                 "ram": [[32768, 169], [32769, 52], [32770, 18]] },
    "final":   { "pc": 32771, "s": 511, "p": 0, "a": 4660, "x": 0, "y": 0, "dbr": 0, "d": 0, "pbr": 0, "e": 0,
                 "ram": [[32768, 169], [32769, 52], [32770, 18]] },
    "cycles": []
  },
  {
    "name": "85 sta direct page 8-bit",
    "initial": { "pc": 32768, "s": 511, "p": 32, "a": 171, "x": 0, "y": 0, "dbr": 0, "d": 256, "pbr": 0, "e": 0,
                 "ram": [[32768, 133], [32769, 16], [272, 0]] },
    "final":   { "pc": 32770, "s": 511, "p": 32, "a": 171, "x": 0, "y": 0, "dbr": 0, "d": 256, "pbr": 0, "e": 0,
                 "ram": [[32768, 133], [32769, 16], [272, 171]] }
  },
  {
    "name": "48 pha 16-bit",
    "initial": { "pc": 32768, "s": 511, "p": 0, "a": 48879, "x": 0, "y": 0, "dbr": 0, "d": 0, "pbr": 0, "e": 0,
                 "ram": [[32768, 72]] },
    "final":   { "pc": 32769, "s": 509, "p": 0, "a": 48879, "x": 0, "y": 0, "dbr": 0, "d": 0, "pbr": 0, "e": 0,
                 "ram": [[32768, 72], [511, 190], [510, 239]] }
  },
  {
    "name": "e8 inx wraps 8-bit",
    "initial": { "pc": 32768, "s": 511, "p": 16, "a": 0, "x": 255, "y": 0, "dbr": 0, "d": 0, "pbr": 0, "e": 0,
                 "ram": [[32768, 232]] },
    "final":   { "pc": 32769, "s": 511, "p": 18, "a": 0, "x": 0, "y": 0, "dbr": 0, "d": 0, "pbr": 0, "e": 0,
                 "ram": [[32768, 232]] }
  },
  {
    "name": "c2 rep clears width flags",
    "initial": { "pc": 32768, "s": 511, "p": 48, "a": 0, "x": 0, "y": 0, "dbr": 0, "d": 0, "pbr": 0, "e": 0,
                 "ram": [[32768, 194], [32769, 48]] },
    "final":   { "pc": 32770, "s": 511, "p": 0, "a": 0, "x": 0, "y": 0, "dbr": 0, "d": 0, "pbr": 0, "e": 0,
                 "ram": [[32768, 194], [32769, 48]] }
  }
]"#;

#[test]
fn test_vectors_pass() {
    let tests = load_tests(VECTORS).unwrap();
    assert_eq!(tests.len(), 5);
    let report = run_step_tests(&tests);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.passed, 5);
}

#[test]
fn test_mismatch_names_the_register() {
    let mut tests = load_tests(VECTORS).unwrap();
    let mut test = tests.remove(0);
    test.final_state.a = 0x1235;
    test.final_state.ram.push((0x7E_2000, 0x55));

    match run_step_test(&test) {
        Err(StepError::Mismatch { name, mismatches }) => {
            assert_eq!(name, "a9 lda immediate 16-bit");
            assert_eq!(
                mismatches,
                vec![
                    "A: got $1234, want $1235".to_string(),
                    "RAM[$7E2000]: got $00, want $55".to_string(),
                ]
            );
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_malformed_vectors_are_rejected() {
    assert!(matches!(load_tests("[{\"name\": 1}]"), Err(StepError::Json(_))));
}
