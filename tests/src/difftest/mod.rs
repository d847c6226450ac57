//! Compiled-versus-interpreted sweeps.

use ppujit_decode::encode::{self, x_form};
use ppujit_decode::InsnClass;
use ppujit_difftest::{ClassReport, DiffConfig, Harness, HarnessError, Outcome, Report};
use ppujit_guest::{CpuState, Status};

const CLASSES: [InsnClass; 14] = [
    InsnClass::Add,
    InsnClass::Subf,
    InsnClass::And,
    InsnClass::Or,
    InsnClass::Xor,
    InsnClass::Addi,
    InsnClass::Ori,
    InsnClass::Rlwinm,
    InsnClass::Cmp,
    InsnClass::Cmpli,
    InsnClass::Lwz,
    InsnClass::Stw,
    InsnClass::B,
    InsnClass::Bc,
];

fn harness(cases: u32) -> Harness {
    Harness::new(DiffConfig {
        cases_per_class: cases,
        ..DiffConfig::default()
    })
    .unwrap()
}

#[test]
fn core_classes_agree() {
    let report = harness(32).run_classes(&CLASSES);
    assert!(report.is_clean(), "{}", report.summary());
    assert_eq!(report.classes.len(), CLASSES.len());
    assert!(report.total_cases() > 0);
    for c in &report.classes {
        assert_eq!(c.cases + c.skipped, 32, "{}", c.class);
    }
}

#[test]
fn every_direct_lowering_agrees() {
    let mut h = harness(16);
    let report = h.run();
    assert!(report.is_clean(), "{}", report.summary());
    assert_eq!(report.classes.len(), Harness::classes().len());
    for c in &report.classes {
        assert!(c.error.is_none(), "{}: {:?}", c.class, c.error);
        assert_eq!(c.cases + c.skipped, 16, "{}", c.class);
    }
}

#[test]
fn same_seed_same_sweep() {
    let summarize = |r: &Report| -> Vec<(u32, u32, u32)> {
        r.classes
            .iter()
            .map(|c| (c.cases, c.skipped, c.mismatches))
            .collect()
    };
    let a = harness(8).run_classes(&CLASSES[..4]);
    let b = harness(8).run_classes(&CLASSES[..4]);
    assert_eq!(summarize(&a), summarize(&b));
    assert_eq!(a.seed, DiffConfig::default().seed);
}

#[test]
fn sweep_covers_direct_lowerings_only() {
    let classes = Harness::classes();
    assert!(classes.contains(&InsnClass::Add));
    assert!(classes.contains(&InsnClass::Lvx));
    assert!(!classes.contains(&InsnClass::Sc));
    assert!(!classes.contains(&InsnClass::Unknown));
}

#[test]
fn single_word_check() {
    let mut h = harness(1);
    let mut input = CpuState::new();
    input.gpr[1] = 5;
    input.gpr[2] = 7;
    let data = vec![0u8; ppujit_difftest::DATA_LEN];
    let out = h.check(encode::add(3, 1, 2), &input, &data).unwrap();
    assert!(matches!(out, Outcome::Match), "{out:?}");
}

#[test]
fn interpreter_refusals_are_skipped() {
    let mut h = harness(1);
    let input = CpuState::new();
    let data = vec![0u8; ppujit_difftest::DATA_LEN];
    let tw = x_form(31, 31, 0, 0, 4, false);
    let out = h.check(tw, &input, &data).unwrap();
    assert!(matches!(out, Outcome::Skipped(Status::Trap)));
    let out = h.check(encode::sc(), &input, &data).unwrap();
    assert!(matches!(out, Outcome::Skipped(Status::Syscall)));
}

#[test]
fn lowering_errors_are_reported() {
    let mut h = harness(1);
    let data = vec![0u8; ppujit_difftest::DATA_LEN];
    let word = encode::bcctr(0, 0, false);
    let err = h.check(word, &CpuState::new(), &data).unwrap_err();
    assert!(matches!(err, HarnessError::Lowering { word: w, .. } if w == word));
}

#[test]
fn failing_classes_are_flagged() {
    let mut bad = ClassReport::new(InsnClass::Divw);
    bad.cases = 4;
    bad.mismatches = 1;
    let mut broken = ClassReport::new(InsnClass::Vperm);
    broken.error = Some("no valid encoding found for vperm".into());
    let report = Report {
        seed: 1,
        classes: vec![ClassReport::new(InsnClass::Add), bad, broken],
    };
    assert!(!report.is_clean());
    assert_eq!(report.failing(), [InsnClass::Divw, InsnClass::Vperm]);
    assert_eq!(report.total_mismatches(), 1);
    assert_eq!(report.total_cases(), 4);
    let text = report.summary();
    assert!(text.contains("FAIL divw"));
    assert!(text.contains("error: no valid encoding"));
    assert!(report.class(InsnClass::Add).is_some_and(|c| !c.is_failing()));
}
