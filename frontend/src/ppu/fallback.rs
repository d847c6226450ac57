//! Interpreter fallback bridge.
//!
//! Instructions without a direct lowering become a call to
//! [`helper_interp`], which runs the reference interpreter on the
//! live register file. The helper's result is either 0 (continue) or
//! `EXIT_HALT`, which the emitted code turns into a unit exit.

use ppujit_core::{
    Cond, Context, Runtime, StopReason, TempIdx, Type, EXIT_HALT,
};
use ppujit_decode::class::InsnClass;
use ppujit_decode::Insn;
use ppujit_guest::{interp, CpuState, Status};
use tracing::trace;

use super::PpuDisasContext;

/// Helper ids registered in the translation context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Helpers {
    pub interp: u32,
    pub illegal: u32,
    pub unsupported: u32,
    pub observe_call: u32,
}

impl Helpers {
    pub fn register(ir: &mut Context) -> Self {
        Self {
            interp: ir.register_helper("interp", helper_interp),
            illegal: ir.register_helper("illegal", helper_illegal),
            unsupported: ir.register_helper("unsupported", helper_unsupported),
            observe_call: ir.register_helper("observe_call", helper_observe_call),
        }
    }
}

const HALT: u64 = EXIT_HALT as u64;

/// Interpret one instruction: `args = [class index, word]`.
///
/// # Safety
/// `env` must point at a live `CpuState` whose `pc` holds the address
/// of the instruction.
pub unsafe fn helper_interp(env: *mut u8, rt: &dyn Runtime, args: [u64; 4]) -> u64 {
    let class = InsnClass::from_index(args[0] as usize);
    let word = args[1] as u32;
    rt.note_fallback(class.index() as u32);

    let (status, pc) = {
        let cpu = &mut *(env as *mut CpuState);
        let status = interp::execute(cpu, rt.memory(), Insn::new(word, class));
        (status, cpu.pc)
    };
    trace!(pc = format_args!("{pc:#x}"), %class, ?status, "fallback");

    match status {
        Status::Continue | Status::Branch | Status::Call | Status::Return => 0,
        Status::Syscall => {
            {
                let cpu = &mut *(env as *mut CpuState);
                cpu.pc = pc.wrapping_add(4);
            }
            if rt.system_call(env) {
                0
            } else {
                HALT
            }
        }
        Status::Trap => {
            rt.stop(StopReason::Trap { pc: pc as u32 });
            HALT
        }
        Status::Illegal => {
            rt.stop(StopReason::Illegal {
                pc: pc as u32,
                word,
            });
            HALT
        }
    }
}

/// `args = [pc, word]`.
///
/// # Safety
/// Touches no memory; `unsafe` only to match the helper signature.
pub unsafe fn helper_illegal(_env: *mut u8, rt: &dyn Runtime, args: [u64; 4]) -> u64 {
    rt.stop(StopReason::Illegal {
        pc: args[0] as u32,
        word: args[1] as u32,
    });
    HALT
}

/// `args = [pc, word]`.
///
/// # Safety
/// Touches no memory; `unsafe` only to match the helper signature.
pub unsafe fn helper_unsupported(_env: *mut u8, rt: &dyn Runtime, args: [u64; 4]) -> u64 {
    rt.stop(StopReason::Unsupported {
        pc: args[0] as u32,
        word: args[1] as u32,
    });
    HALT
}

/// `args = [site, target]`.
///
/// # Safety
/// Touches no memory; `unsafe` only to match the helper signature.
pub unsafe fn helper_observe_call(_env: *mut u8, rt: &dyn Runtime, args: [u64; 4]) -> u64 {
    rt.observe_call_target(args[0] as u32, args[1] as u32);
    0
}

impl PpuDisasContext<'_> {
    /// Exit with `EXIT_HALT` when `r` says so.
    pub(super) fn gen_check_halt(&self, ir: &mut Context, r: TempIdx, ty: Type) {
        let halt = ir.new_const(ty, EXIT_HALT as u64);
        let ok = ir.new_label();
        ir.gen_brcond(ty, r, halt, Cond::Ne, ok);
        ir.gen_exit_tb(EXIT_HALT);
        ir.gen_set_label(ok);
    }

    /// Route `insn` through the interpreter.
    pub(super) fn gen_fallback(&mut self, ir: &mut Context, insn: Insn) {
        self.gen_set_pc(ir, self.pc());
        let class = ir.new_const(Type::I64, insn.class.index() as u64);
        let word = ir.new_const(Type::I64, insn.word as u64);
        let r = ir.new_temp(Type::I64);
        ir.gen_call(r, self.helpers.interp, &[class, word]);
        self.gen_check_halt(ir, r, Type::I64);
        self.fallbacks.push(insn.class);
    }

    /// Stop at run time with `helper`; no fall-through.
    fn gen_stop(&mut self, ir: &mut Context, helper: u32, insn: Insn) {
        self.gen_set_pc(ir, self.pc());
        let pc = ir.new_const(Type::I64, self.pc() as u64);
        let word = ir.new_const(Type::I64, insn.word as u64);
        let r = ir.new_temp(Type::I64);
        ir.gen_call(r, helper, &[pc, word]);
        ir.gen_exit_tb(EXIT_HALT);
        self.ends_flow = true;
    }

    /// Unrecognized word: reported now, halts when reached.
    pub(super) fn gen_unknown(&mut self, ir: &mut Context, insn: Insn) {
        self.diag.unknown_instruction(self.pc(), insn.word);
        self.gen_stop(ir, self.helpers.illegal, insn);
    }

    /// Recognized but not lowerable: reported now, halts when
    /// reached.
    pub(super) fn gen_unsupported(&mut self, ir: &mut Context, insn: Insn, msg: &str) {
        self.diag.compilation_error(self.pc(), msg);
        self.gen_stop(ir, self.helpers.unsupported, insn);
    }
}
