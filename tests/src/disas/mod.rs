//! Assembly text for guest words.

use ppujit_decode::encode;
use ppujit_disas::{disas_word, print_insn_ppc64};

use crate::support::CODE;

#[test]
fn integer_forms() {
    let cases = [
        (encode::li(3, 5), "li r3, 5"),
        (encode::addi(4, 1, -16), "addi r4, r1, -16"),
        (encode::nop(), "nop"),
        (encode::ori(3, 4, 0xff), "ori r3, r4, 0xff"),
        (encode::add(3, 1, 2), "add r3, r1, r2"),
        (encode::mr(3, 4), "mr r3, r4"),
        (encode::cmpi(0, false, 3, 0), "cmpwi cr0, r3, 0"),
        (encode::cmpi(7, true, 5, -1), "cmpdi cr7, r5, -1"),
        (encode::lwz(3, 1, -8), "lwz r3, -8(r1)"),
        (encode::mflr(0), "mflr r0"),
        (encode::mtctr(9), "mtctr r9"),
        (encode::sc(), "sc"),
    ];
    for (word, want) in cases {
        assert_eq!(disas_word(CODE, word), want, "{word:#010x}");
    }
}

#[test]
fn branches_show_resolved_targets() {
    assert_eq!(disas_word(CODE, encode::blr()), "blr");
    assert_eq!(disas_word(CODE, encode::bctrl()), "bctrl");
    assert_eq!(disas_word(CODE, encode::b(0x40, false, false)), "b 0x10040");
    assert_eq!(disas_word(CODE + 0x10, encode::b(-8, false, true)), "bl 0x10008");
    assert_eq!(disas_word(CODE, encode::bt(2, 8)), "bc(cr0.eq) 0x10008");
    assert_eq!(disas_word(CODE, encode::bf(6, 12)), "bc(!cr1.eq) 0x1000c");
    assert_eq!(disas_word(CODE + 8, encode::bdnz(-4)), "bcdnz 0x10004");
}

#[test]
fn unknown_words_print_raw() {
    assert_eq!(disas_word(CODE, 0), ".long 0x00000000");
}

#[test]
fn byte_stream_entry_point() {
    let bytes = encode::blr().to_be_bytes();
    assert_eq!(print_insn_ppc64(CODE as u64, &bytes), ("blr".to_string(), 4));
    let mut long = encode::add(3, 1, 2).to_be_bytes().to_vec();
    long.extend_from_slice(&encode::blr().to_be_bytes());
    assert_eq!(print_insn_ppc64(CODE as u64, &long).0, "add r3, r1, r2");
    assert_eq!(print_insn_ppc64(CODE as u64, &bytes[..2]), (".byte ???".to_string(), 0));
}
