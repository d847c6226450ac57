use ppujit_core::dump::dump_to_string;
use ppujit_core::{Context, Cond, Runtime, Type};

unsafe fn nop_helper(_env: *mut u8, _rt: &dyn Runtime, _args: [u64; 4]) -> u64 {
    0
}

#[test]
fn constants_are_deduplicated_per_type() {
    let mut ctx = Context::new();
    let a = ctx.new_const(Type::I64, 5);
    let b = ctx.new_const(Type::I64, 5);
    let c = ctx.new_const(Type::I32, 5);
    assert_eq!(a, b);
    assert_ne!(a, c);
    // I32 constants are masked to 32 bits.
    let d = ctx.new_const(Type::I32, 0x1_0000_0005);
    assert_eq!(c, d);
}

#[test]
fn reset_keeps_globals_and_helpers() {
    let mut ctx = Context::new();
    let g = ctx.new_global(Type::I64, 0, "r0");
    let h = ctx.register_helper("nop", nop_helper);
    let t = ctx.new_temp(Type::I64);
    ctx.gen_add(Type::I64, t, g, g);
    ctx.gen_insn_start(0x100);
    assert_eq!(ctx.num_ops(), 2);

    ctx.reset();
    assert_eq!(ctx.nb_globals(), 1);
    assert_eq!(ctx.nb_temps(), 1);
    assert_eq!(ctx.num_ops(), 0);
    assert!(ctx.insn_pcs.is_empty());
    assert_eq!(ctx.helper(h).map(|h| h.name), Some("nop"));
}

#[test]
fn register_helper_is_idempotent() {
    let mut ctx = Context::new();
    let a = ctx.register_helper("x", nop_helper);
    let b = ctx.register_helper("y", nop_helper);
    let c = ctx.register_helper("x", nop_helper);
    assert_eq!(a, c);
    assert_ne!(a, b);
    assert_eq!(ctx.helpers().len(), 2);
}

#[test]
#[should_panic(expected = "globals must be registered before locals")]
fn globals_after_locals_panics() {
    let mut ctx = Context::new();
    ctx.new_temp(Type::I32);
    ctx.new_global(Type::I64, 0, "late");
}

#[test]
fn labels_track_refs_and_placement() {
    let mut ctx = Context::new();
    let l = ctx.new_label();
    let g = ctx.new_global(Type::I64, 0, "r0");
    let z = ctx.new_const(Type::I64, 0);
    ctx.gen_brcond(Type::I64, g, z, Cond::Eq, l);
    assert!(ctx.label(l).is_dangling());
    ctx.gen_set_label(l);
    assert!(!ctx.label(l).is_dangling());
    assert_eq!(ctx.label(l).refs, 1);
    assert_eq!(ctx.label(l).op_pos, 1);
}

#[test]
fn dump_names_ops_and_globals() {
    let mut ctx = Context::new();
    let r3 = ctx.new_global(Type::I64, 24, "r3");
    let r4 = ctx.new_global(Type::I64, 32, "r4");
    ctx.gen_insn_start(0x1_0000);
    ctx.gen_add(Type::I64, r3, r3, r4);
    ctx.gen_exit_tb(1);
    let text = dump_to_string(&ctx);
    assert!(text.contains("---- 0x00010000"), "{text}");
    assert!(text.contains("add_i64 r3, r3, r4"), "{text}");
    assert!(text.contains("exit_tb $0x1"), "{text}");
}
