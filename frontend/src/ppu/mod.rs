//! PPU frontend: lowers one unit of 64-bit big-endian guest code to
//! IR.

pub mod analyse;
mod dispatch;
pub mod fallback;
mod mem;
pub mod state;
mod trans_branch;
mod trans_cmp;
mod trans_fp;
mod trans_int;
mod trans_mem;
mod trans_rot;
mod trans_vec;
pub mod unit;

use std::marker::PhantomData;

use ppujit_core::context::MAX_INSNS;
use ppujit_core::{Context, GuestMemory, TranslationBlock, EXIT_BLOCK_ENDED};
use ppujit_decode::class::InsnClass;
use ppujit_decode::Insn;
use tracing::debug;

use crate::{
    translator_loop, CallSiteProfile, CompileDiagnostics, DisasContextBase, DisasJumpType,
    TranslatorOps,
};
pub use analyse::{analyse_block, BlockInfo};
pub use dispatch::has_direct_lowering;
use fallback::Helpers;
use state::Regs;
use unit::UnitAssembler;

/// Knobs for one translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowerConfig {
    /// Upper bound on instructions per unit.
    pub max_insns: u32,
    /// Forward branches further than this many bytes leave the unit.
    pub local_branch_window: u32,
    /// Emit the run-time device-window check on scalar accesses.
    pub mmio_fork: bool,
}

impl Default for LowerConfig {
    fn default() -> Self {
        Self {
            max_insns: 512,
            local_branch_window: 1024,
            mmio_fork: true,
        }
    }
}

/// Result of lowering one unit.
#[derive(Debug, Clone)]
pub struct TranslatedBlock {
    pub tb: TranslationBlock,
    pub info: BlockInfo,
    /// Class of every instruction emitted as an interpreter call, in
    /// program order.
    pub fallbacks: Vec<InsnClass>,
    /// Nesting level after the terminal instruction (1 when
    /// balanced).
    pub nesting: u32,
}

// ---------------------------------------------------------------
// Disassembly context
// ---------------------------------------------------------------

pub struct PpuDisasContext<'a> {
    pub base: DisasContextBase,
    pub regs: Regs,
    pub(crate) helpers: Helpers,
    pub info: BlockInfo,
    pub unit: UnitAssembler,
    pub cfg: LowerConfig,
    pub mmio_base: u32,
    pub fallbacks: Vec<InsnClass>,
    diag: &'a dyn CompileDiagnostics,
    profile: Option<&'a dyn CallSiteProfile>,
    /// The instruction being lowered does not fall through.
    ends_flow: bool,
}

impl<'a> PpuDisasContext<'a> {
    pub fn new(
        info: BlockInfo,
        mmio_base: u32,
        cfg: LowerConfig,
        diag: &'a dyn CompileDiagnostics,
        profile: Option<&'a dyn CallSiteProfile>,
    ) -> Self {
        Self {
            base: DisasContextBase {
                pc_first: info.start,
                pc_next: info.start,
                is_jmp: DisasJumpType::Next,
                num_insns: 0,
                max_insns: info.icount(),
            },
            regs: Regs::unbound(),
            helpers: Helpers::default(),
            info,
            unit: UnitAssembler::new(),
            cfg,
            mmio_base,
            fallbacks: Vec::new(),
            diag,
            profile,
            ends_flow: false,
        }
    }

    /// Address of the instruction being lowered.
    pub(super) fn pc(&self) -> u32 {
        self.base.pc_next
    }

    fn is_local(&self, target: u32) -> bool {
        self.info
            .is_local(self.pc(), target, self.cfg.local_branch_window)
    }

    /// Local targets of every branch without link.
    fn local_targets(&self) -> Vec<u32> {
        let mut out = Vec::new();
        for (i, &word) in self.info.words.iter().enumerate() {
            let pc = self.info.start.wrapping_add(i as u32 * 4);
            let insn = ppujit_decode::decode(word);
            if matches!(insn.class, InsnClass::B | InsnClass::Bc) && !insn.lk() {
                let t = insn.branch_target(pc);
                if self.info.is_local(pc, t, self.cfg.local_branch_window) {
                    out.push(t);
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------
// TranslatorOps implementation
// ---------------------------------------------------------------

/// Marker type for the PPU translator.
pub struct PpuTranslator<'a>(PhantomData<&'a ()>);

impl<'a> TranslatorOps for PpuTranslator<'a> {
    type DisasContext = PpuDisasContext<'a>;

    fn init_disas_context(ctx: &mut PpuDisasContext<'a>, ir: &mut Context) {
        ctx.regs = Regs::bind(ir);
        ctx.helpers = Helpers::register(ir);
        let targets = ctx.local_targets();
        ctx.unit.declare_targets(ir, targets);
    }

    fn tb_start(_ctx: &mut PpuDisasContext<'a>, _ir: &mut Context) {}

    fn insn_start(ctx: &mut PpuDisasContext<'a>, ir: &mut Context) {
        let pc = ctx.base.pc_next;
        ctx.unit.begin_insn(ir, pc);
        ir.gen_insn_start(pc);
        ctx.base.num_insns += 1;
    }

    fn translate_insn(ctx: &mut PpuDisasContext<'a>, ir: &mut Context) {
        let idx = ctx.base.num_insns as usize - 1;
        let insn: Insn = analyse::insn_at(&ctx.info, idx);
        ctx.ends_flow = false;
        dispatch::lower_insn(ctx, ir, insn);

        if idx + 1 == ctx.info.words.len() {
            let pc = ctx.pc();
            if !ctx.unit.terminate(pc) {
                ctx.diag
                    .compilation_error(pc, "unbalanced branch nesting at end of unit");
            }
            if ctx.ends_flow {
                ctx.base.is_jmp = DisasJumpType::NoReturn;
            }
        }
        ctx.base.pc_next = ctx.base.pc_next.wrapping_add(4);
    }

    fn tb_stop(ctx: &mut PpuDisasContext<'a>, ir: &mut Context) {
        match ctx.base.is_jmp {
            DisasJumpType::NoReturn => {}
            DisasJumpType::Next | DisasJumpType::TooMany => {
                let next = ctx.base.pc_next;
                ctx.gen_set_pc(ir, next);
                ir.gen_exit_tb(EXIT_BLOCK_ENDED);
            }
        }
    }

    fn base<'b>(ctx: &'b PpuDisasContext<'a>) -> &'b DisasContextBase {
        &ctx.base
    }

    fn base_mut<'b>(ctx: &'b mut PpuDisasContext<'a>) -> &'b mut DisasContextBase {
        &mut ctx.base
    }
}

/// Lower the unit at `pc` into `ir` (which is reset first).
pub fn translate_block(
    ir: &mut Context,
    mem: &dyn GuestMemory,
    pc: u32,
    cfg: &LowerConfig,
    diag: &dyn CompileDiagnostics,
    profile: Option<&dyn CallSiteProfile>,
) -> TranslatedBlock {
    ir.reset();
    let max = cfg.max_insns.clamp(1, MAX_INSNS as u32);
    let info = analyse_block(mem, pc, max, cfg.local_branch_window);
    let mut ctx = PpuDisasContext::new(info, mem.mmio_base(), *cfg, diag, profile);
    translator_loop::<PpuTranslator<'_>>(&mut ctx, ir);

    let mut tb = TranslationBlock::new(pc);
    tb.size = ctx.info.size();
    tb.icount = ctx.info.icount();
    tb.fallbacks = ctx.fallbacks.len() as u32;
    debug!(
        pc = format_args!("{pc:#010x}"),
        insns = tb.icount,
        fallbacks = tb.fallbacks,
        ops = ir.num_ops(),
        "lowered unit"
    );
    TranslatedBlock {
        tb,
        nesting: ctx.unit.nesting(),
        fallbacks: ctx.fallbacks,
        info: ctx.info,
    }
}
