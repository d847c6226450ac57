//! IR programs run through the threaded code generator.

use ppujit_backend::{translate, CodegenError, CompiledCode, ThreadedCodeGen};
use ppujit_core::{Cond, Context, GuestMemory, MemOp, Runtime, TempIdx, Type, EXIT_RETURN};

use crate::support::{ram_with, TestRuntime, DATA};

/// Four 64-bit registers.
type Env = [u64; 4];

fn with_env() -> (Context, [TempIdx; 4]) {
    let mut ir = Context::new();
    let regs = [
        ir.new_global(Type::I64, 0, "g0"),
        ir.new_global(Type::I64, 8, "g1"),
        ir.new_global(Type::I64, 16, "g2"),
        ir.new_global(Type::I64, 24, "g3"),
    ];
    (ir, regs)
}

fn build(ir: &mut Context, opt: bool) -> CompiledCode {
    translate(ir, &ThreadedCodeGen::new(), opt).unwrap()
}

fn run(code: &CompiledCode, env: &mut Env) -> (u32, TestRuntime) {
    let rt = TestRuntime::new(ram_with(&[]));
    let exit = unsafe { code.call(env.as_mut_ptr() as *mut u8, &rt) };
    (exit, rt)
}

#[test]
fn add_of_globals() {
    let (mut ir, [a, b, c, _]) = with_env();
    ir.gen_add(Type::I64, c, a, b);
    ir.gen_exit_tb(7);
    let code = build(&mut ir, true);
    assert!(!code.is_empty());
    let mut env = [5, 7, 0, 0];
    let (exit, _) = run(&code, &mut env);
    assert_eq!(exit, 7);
    assert_eq!(env, [5, 7, 12, 0]);
}

#[test]
fn word_ops_wrap_at_32_bits() {
    let (mut ir, [a, b, c, _]) = with_env();
    let t = ir.new_temp(Type::I32);
    ir.gen_extrl_i64_i32(t, a);
    let one = ir.new_const(Type::I32, 1);
    ir.gen_add(Type::I32, t, t, one);
    ir.gen_ext_u32_i64(c, t);
    ir.gen_mov(Type::I64, b, c);
    ir.gen_exit_tb(0);
    let code = build(&mut ir, false);
    let mut env = [0xFFFF_FFFF, 0, 0, 0];
    run(&code, &mut env);
    assert_eq!(env[2], 0);
    assert_eq!(env[1], 0);
}

#[test]
fn division_by_zero_yields_zero() {
    let (mut ir, [a, b, c, d]) = with_env();
    ir.gen_divu(Type::I64, c, a, b);
    ir.gen_divs(Type::I64, d, a, b);
    ir.gen_exit_tb(0);
    let code = build(&mut ir, false);
    let mut env = [100, 0, 9, 9];
    run(&code, &mut env);
    assert_eq!(env[2], 0);
    assert_eq!(env[3], 0);

    env = [i64::MIN as u64, u64::MAX, 0, 0];
    run(&code, &mut env);
    assert_eq!(env[3], 0, "signed overflow");
    assert_eq!(env[2], 0);
}

/// g1 = sum of 1..=g0, counting g0 down to zero.
fn sum_loop(ir: &mut Context, [n, acc, _, _]: [TempIdx; 4]) {
    let top = ir.new_label();
    let done = ir.new_label();
    let zero = ir.new_const(Type::I64, 0);
    let one = ir.new_const(Type::I64, 1);
    ir.gen_mov(Type::I64, acc, zero);
    ir.gen_set_label(top);
    ir.gen_brcond(Type::I64, n, zero, Cond::Eq, done);
    ir.gen_add(Type::I64, acc, acc, n);
    ir.gen_sub(Type::I64, n, n, one);
    ir.gen_br(top);
    ir.gen_set_label(done);
    ir.gen_exit_tb(EXIT_RETURN);
}

#[test]
fn backward_branch_loops() {
    let (mut ir, regs) = with_env();
    sum_loop(&mut ir, regs);
    let code = build(&mut ir, true);
    let mut env = [10, 99, 0, 0];
    let (exit, _) = run(&code, &mut env);
    assert_eq!(exit, EXIT_RETURN);
    assert_eq!(env[..2], [0, 55]);
}

#[test]
fn optimizer_preserves_results() {
    fn program(ir: &mut Context, [a, b, c, d]: [TempIdx; 4]) {
        let k = ir.new_const(Type::I64, 6);
        let t = ir.new_temp(Type::I64);
        ir.gen_mul(Type::I64, t, k, k);
        ir.gen_add(Type::I64, c, a, t);
        ir.gen_setcond(Type::I64, d, a, b, Cond::Ltu);
        ir.gen_xor(Type::I64, b, b, b);
        ir.gen_exit_tb(1);
    }
    let mut results = Vec::new();
    for opt in [false, true] {
        let (mut ir, regs) = with_env();
        program(&mut ir, regs);
        let code = build(&mut ir, opt);
        let mut env = [3, 4, 0, 0];
        let (exit, _) = run(&code, &mut env);
        results.push((exit, env));
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0], (1, [3, 0, 39, 1]));
}

#[test]
fn raw_loads_see_host_order() {
    let (mut ir, [addr, v, out, _]) = with_env();
    ir.gen_guest_st(Type::I64, v, addr, MemOp::ul());
    ir.gen_guest_ld(Type::I64, out, addr, MemOp::uw());
    ir.gen_exit_tb(0);
    let code = build(&mut ir, false);

    let rt = TestRuntime::new(ram_with(&[]));
    let mut env: Env = [DATA as u64, 0xAABB_CCDD, 0, 0];
    unsafe { code.call(env.as_mut_ptr() as *mut u8, &rt) };
    // Raw stores keep host (little-endian) order in RAM.
    assert_eq!(rt.mem.snapshot(DATA, 4), [0xDD, 0xCC, 0xBB, 0xAA]);
    assert_eq!(env[2], 0xCCDD);
    assert_eq!(rt.mem.read(DATA, 4), 0xDDCC_BBAA);
}

unsafe fn triple_plus(_env: *mut u8, _rt: &dyn Runtime, args: [u64; 4]) -> u64 {
    args[0] * 3 + args[1]
}

#[test]
fn helper_calls() {
    let (mut ir, [a, b, c, _]) = with_env();
    let h = ir.register_helper("triple_plus", triple_plus);
    ir.gen_call(c, h, &[a, b]);
    ir.gen_exit_tb(0);
    let code = build(&mut ir, true);
    let mut env = [4, 1, 0, 0];
    run(&code, &mut env);
    assert_eq!(env[2], 13);
}

#[test]
fn block_calls_go_through_runtime() {
    let (mut ir, [target, _, code_out, _]) = with_env();
    let t = ir.new_temp(Type::I32);
    ir.gen_extrl_i64_i32(t, target);
    let r = ir.new_temp(Type::I32);
    ir.gen_call_block(r, t);
    ir.gen_ext_u32_i64(code_out, r);
    ir.gen_exit_tb(0);
    let code = build(&mut ir, false);
    // The test runtime treats env as a CpuState, so give it one.
    let rt = TestRuntime::new(ram_with(&[]));
    let mut cpu = ppujit_guest::CpuState::new();
    cpu.gpr[0] = 0x4000;
    unsafe { code.call(cpu.as_env_ptr(), &rt) };
    assert_eq!(*rt.calls.borrow(), [0x4000]);
    assert_eq!(cpu.gpr[2], EXIT_RETURN as u64);
}

#[test]
fn rejects_empty_program() {
    let (mut ir, _) = with_env();
    ir.gen_insn_start(0x100);
    let err = translate(&mut ir, &ThreadedCodeGen::new(), false).unwrap_err();
    assert_eq!(err, CodegenError::Empty);
}

#[test]
fn rejects_dangling_label() {
    let (mut ir, [a, b, _, _]) = with_env();
    let l = ir.new_label();
    ir.gen_brcond(Type::I64, a, b, Cond::Eq, l);
    ir.gen_exit_tb(0);
    let err = translate(&mut ir, &ThreadedCodeGen::new(), false).unwrap_err();
    assert_eq!(err, CodegenError::UnresolvedLabel(l));
}

#[test]
fn rejects_falling_off_end() {
    let (mut ir, [a, b, c, _]) = with_env();
    ir.gen_add(Type::I64, c, a, b);
    let err = translate(&mut ir, &ThreadedCodeGen::new(), false).unwrap_err();
    assert_eq!(err, CodegenError::FallsOffEnd);
}

#[test]
fn rejects_unknown_helper() {
    let (mut ir, [a, _, c, _]) = with_env();
    ir.gen_call(c, 42, &[a]);
    ir.gen_exit_tb(0);
    let err = translate(&mut ir, &ThreadedCodeGen::new(), false).unwrap_err();
    assert_eq!(err, CodegenError::UnknownHelper(42));
}
