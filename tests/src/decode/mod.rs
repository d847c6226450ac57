use ppujit_decode::class::InsnClass;
use ppujit_decode::encode::*;
use ppujit_decode::fields::{bo, spr};
use ppujit_decode::decode;
use proptest::prelude::*;

#[test]
fn every_template_decodes_to_its_class() {
    for &class in InsnClass::ALL {
        let insn = decode(class.template());
        assert_eq!(insn.class, class, "template {:#010x}", class.template());
    }
}

#[test]
fn index_round_trip() {
    for &class in InsnClass::ALL {
        assert_eq!(InsnClass::from_index(class.index()), class);
    }
    assert_eq!(InsnClass::from_index(InsnClass::COUNT), InsnClass::Unknown);
    assert_eq!(InsnClass::COUNT, InsnClass::ALL.len());
}

#[test]
fn unknown_words() {
    assert_eq!(decode(0).class, InsnClass::Unknown);
    assert_eq!(decode(0xFFFF_FFFF).class, InsnClass::Unknown);
    // sc without the mandatory bit.
    assert_eq!(decode(17 << 26).class, InsnClass::Unknown);
}

#[test]
fn common_encodings() {
    assert_eq!(decode(add(3, 1, 2)).class, InsnClass::Add);
    assert_eq!(decode(addi(1, 1, -16)).class, InsnClass::Addi);
    assert_eq!(decode(blr()).class, InsnClass::Bclr);
    assert_eq!(decode(bctrl()).class, InsnClass::Bcctr);
    assert_eq!(decode(sc()).class, InsnClass::Sc);
    assert_eq!(decode(nop()).class, InsnClass::Ori);
    assert_eq!(decode(mflr(0)).class, InsnClass::Mfspr);
    assert_eq!(decode(mtctr(9)).class, InsnClass::Mtspr);
    assert_eq!(decode(lwz(3, 1, 8)).class, InsnClass::Lwz);
    assert_eq!(decode(ld(3, 1, 8)).class, InsnClass::Ld);
    assert_eq!(decode(std(3, 1, -8)).class, InsnClass::Std);
    assert_eq!(decode(lvx(2, 0, 4)).class, InsnClass::Lvx);
    assert_eq!(decode(rlwinm(3, 4, 2, 0, 29)).class, InsnClass::Rlwinm);
}

#[test]
fn operand_fields() {
    let i = decode(add(3, 1, 2));
    assert_eq!((i.rt(), i.ra(), i.rb()), (3, 1, 2));
    assert!(!i.rc());
    assert!(!i.oe());

    let i = decode(addi(5, 6, -4));
    assert_eq!(i.simm(), -4);

    let i = decode(ori(7, 8, 0xBEEF));
    assert_eq!((i.ra(), i.rs()), (7, 8));
    assert_eq!(i.uimm(), 0xBEEF);

    let i = decode(std(3, 1, -8));
    assert_eq!(i.ds(), -8);

    let i = decode(rlwinm(3, 4, 2, 0, 29));
    assert_eq!((i.sh32(), i.mb32(), i.me32()), (2, 0, 29));

    let i = decode(cmpi(6, true, 4, -1));
    assert_eq!(i.crfd(), 6);
    assert!(i.cmp_l());
}

#[test]
fn form_encoders() {
    let i = decode(md_form(3, 4, 40, 33, 0, true));
    assert_eq!(i.class, InsnClass::Rldicl);
    assert_eq!((i.rs(), i.ra(), i.sh64(), i.mb64()), (3, 4, 40, 33));
    assert!(i.rc());

    let i = decode(a_form(63, 1, 2, 3, 4, 29, false));
    assert_eq!(i.class, InsnClass::Fmadd);
    assert_eq!((i.rt(), i.ra(), i.rb(), i.rc_reg()), (1, 2, 3, 4));

    let i = decode(va_form(5, 6, 7, 8, 43));
    assert_eq!(i.class, InsnClass::Vperm);
    assert_eq!((i.vd(), i.va(), i.vb(), i.vc()), (5, 6, 7, 8));

    let i = decode(vx_form(9, 10, 11, 0));
    assert_eq!(i.class, InsnClass::Vaddubm);
    assert_eq!((i.vd(), i.va(), i.vb()), (9, 10, 11));

    let i = decode(vc_form(1, 2, 3, true, 6));
    assert_eq!(i.class, InsnClass::Vcmpequb);
    assert!(i.vrc());

    assert_eq!(decode(bctr()).class, InsnClass::Bcctr);
    assert!(!decode(bctr()).lk());
    let i = decode(bf(2, 16));
    assert_eq!((i.class, i.bo(), i.bi(), i.bd()), (InsnClass::Bc, bo::NO_CTR, 2, 16));
}

#[test]
fn spr_field_is_unswapped() {
    for n in [spr::XER, spr::LR, spr::CTR, spr::VRSAVE, spr::SPRG0, spr::SPRG3] {
        assert_eq!(decode(mfspr(3, n)).spr(), n);
        assert_eq!(decode(mtspr(n, 3)).spr(), n);
    }
}

#[test]
fn branch_fields() {
    let i = decode(bc(bo::NO_CTR | bo::COND_TRUE, 2, 0x40, false, true));
    assert_eq!(i.bo(), bo::NO_CTR | bo::COND_TRUE);
    assert_eq!(i.bi(), 2);
    assert!(i.lk());
    assert!(!i.aa());
    assert_eq!(i.branch_target(0x1000), 0x1040);

    let i = decode(bdnz(-8));
    assert_eq!(i.bo() & bo::NO_CTR, 0);
    assert_eq!(i.branch_target(0x1000), 0x0FF8);
}

proptest! {
    #[test]
    fn b_target_round_trip(pc in 0u32..0x4000_0000, disp in -(1i32 << 23)..(1i32 << 23), lk in any::<bool>()) {
        let pc = pc & !3;
        let disp = disp * 4;
        prop_assume!(b_in_range(disp));
        let insn = decode(b(disp, false, lk));
        prop_assert_eq!(insn.class, InsnClass::B);
        prop_assert_eq!(insn.li(), disp);
        prop_assert_eq!(insn.branch_target(pc), pc.wrapping_add(disp as u32));
        prop_assert_eq!(insn.lk(), lk);
    }

    #[test]
    fn b_absolute_round_trip(disp in -(1i32 << 23)..(1i32 << 23)) {
        let disp = disp * 4;
        let insn = decode(b(disp, true, false));
        prop_assert!(insn.aa());
        prop_assert_eq!(insn.branch_target(0x1234_5678), disp as u32);
    }

    #[test]
    fn bc_target_round_trip(
        pc in 0u32..0x4000_0000,
        disp in -(1i32 << 13)..(1i32 << 13),
        bi in 0u32..32,
        aa in any::<bool>(),
    ) {
        let pc = pc & !3;
        let disp = disp * 4;
        prop_assume!(bc_in_range(disp));
        let insn = decode(bc(bo::NO_CTR, bi, disp, aa, false));
        prop_assert_eq!(insn.class, InsnClass::Bc);
        prop_assert_eq!(insn.bd(), disp);
        prop_assert_eq!(insn.bi(), bi);
        let expect = if aa { disp as u32 } else { pc.wrapping_add(disp as u32) };
        prop_assert_eq!(insn.branch_target(pc), expect);
    }
}
