use ppujit_core::types::*;

#[test]
fn type_sizes() {
    assert_eq!(Type::I32.size_bits(), 32);
    assert_eq!(Type::I64.size_bytes(), 8);
    assert_eq!(Type::V128.size_bytes(), 16);
    assert!(Type::V128.is_vector());
    assert!(!Type::I64.is_vector());
    assert_eq!(Type::I32.mask(), 0xFFFF_FFFF);
}

#[test]
fn cond_invert_involution() {
    for raw in 0..32 {
        if let Some(c) = Cond::from_raw(raw) {
            assert_eq!(c.invert().invert(), c);
            assert_ne!(c.invert(), c);
            assert_eq!(c as u32, raw);
        }
    }
}

#[test]
fn cond_swap() {
    assert_eq!(Cond::Lt.swap(), Cond::Gt);
    assert_eq!(Cond::Geu.swap(), Cond::Leu);
    assert_eq!(Cond::Eq.swap(), Cond::Eq);
    assert!(Cond::Gt.is_signed());
    assert!(Cond::Gtu.is_unsigned());
    assert!(Cond::TstNe.is_tst());
}

#[test]
fn memop_sizes() {
    assert_eq!(MemOp::ub().size_bytes(), 1);
    assert_eq!(MemOp::sw().size_bytes(), 2);
    assert!(MemOp::sw().is_signed());
    assert_eq!(MemOp::ul().size_bytes(), 4);
    assert_eq!(MemOp::uq().size_bytes(), 8);
    assert_eq!(MemOp::uo().size_bytes(), 16);
    assert_eq!(MemOp::from_bytes(4).size_bytes(), 4);
}

#[test]
fn vece_lanes() {
    assert_eq!(Vece::B8.lanes(), 16);
    assert_eq!(Vece::H16.lanes(), 8);
    assert_eq!(Vece::W32.lanes(), 4);
    assert_eq!(Vece::D64.lanes(), 2);
    assert_eq!(Vece::from_raw(2), Vece::W32);
    assert_eq!(Vece::W32.lane_bits(), 32);
}
