//! Closure-threaded code generator.
//!
//! Every IR op is lowered once, at generation time, to a boxed host
//! closure with its operands already resolved: temps become frame
//! slots, constants are captured by value and globals become direct
//! accesses into the register file. Labels are resolved to step
//! indices before any branch is built, so execution is a tight loop
//! over `steps[pc]`.

pub mod ops;

use ppujit_core::{
    Cond, Context, MemOp, Op, Opcode, Runtime, TempIdx, TempKind, Type, Vece,
};
use tracing::trace;

use crate::{CodegenBackend, CodegenError, CompiledCode};

/// What a step asks the dispatch loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Next,
    Jump(usize),
    Exit(u32),
}

/// Per-invocation state of a compiled unit.
pub struct Frame<'a> {
    env: *mut u8,
    rt: &'a dyn Runtime,
    slots: Vec<u128>,
}

pub(crate) type Step = Box<dyn Fn(&mut Frame<'_>) -> Flow + Send + Sync>;

fn boxed(f: impl Fn(&mut Frame<'_>) -> Flow + Send + Sync + 'static) -> Step {
    Box::new(f)
}

/// Where an operand lives.
#[derive(Debug, Clone, Copy)]
enum Operand {
    Slot(usize),
    Const(u128),
    Env { offset: usize, ty: Type },
}

impl Operand {
    #[inline]
    fn get(self, f: &Frame<'_>) -> u128 {
        match self {
            Operand::Slot(i) => f.slots[i],
            Operand::Const(v) => v,
            // SAFETY: `env` points at the register file the unit was
            // generated for and `offset` came from a registered global.
            Operand::Env { offset, ty } => unsafe {
                let p = f.env.add(offset);
                match ty {
                    Type::I32 => (p as *const u32).read_unaligned() as u128,
                    Type::I64 => (p as *const u64).read_unaligned() as u128,
                    Type::V128 => (p as *const u128).read_unaligned(),
                }
            },
        }
    }

    #[inline]
    fn set(self, f: &mut Frame<'_>, v: u128) {
        match self {
            Operand::Slot(i) => f.slots[i] = v,
            Operand::Const(_) => {}
            // SAFETY: see `get`.
            Operand::Env { offset, ty } => unsafe {
                let p = f.env.add(offset);
                match ty {
                    Type::I32 => (p as *mut u32).write_unaligned(v as u32),
                    Type::I64 => (p as *mut u64).write_unaligned(v as u64),
                    Type::V128 => (p as *mut u128).write_unaligned(v),
                }
            },
        }
    }
}

/// The closure-threaded backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadedCodeGen;

impl ThreadedCodeGen {
    pub fn new() -> Self {
        Self
    }
}

impl CodegenBackend for ThreadedCodeGen {
    fn name(&self) -> &'static str {
        "threaded"
    }

    fn generate(&self, ctx: &Context) -> Result<CompiledCode, CodegenError> {
        Lowering::new(ctx)?.run()
    }
}

struct Lowering<'c> {
    ctx: &'c Context,
    /// Temp index -> operand.
    operands: Vec<Operand>,
    nslots: usize,
    /// Label id -> step index.
    label_steps: Vec<usize>,
}

/// Ops that lower to no step at all.
fn is_marker(opc: Opcode) -> bool {
    matches!(opc, Opcode::SetLabel | Opcode::InsnStart | Opcode::Nop)
}

impl<'c> Lowering<'c> {
    fn new(ctx: &'c Context) -> Result<Self, CodegenError> {
        if ctx.ops().iter().all(|op| is_marker(op.opc)) {
            return Err(CodegenError::Empty);
        }
        if let Some(l) = ctx.labels().iter().find(|l| l.is_dangling()) {
            return Err(CodegenError::UnresolvedLabel(l.id));
        }
        match ctx.ops().iter().rev().find(|op| !is_marker(op.opc)) {
            Some(op) if matches!(op.opc, Opcode::ExitTb | Opcode::Br) => {}
            _ => return Err(CodegenError::FallsOffEnd),
        }

        let mut nslots = 0;
        let operands = ctx
            .temps()
            .iter()
            .map(|t| match t.kind {
                TempKind::Const => Operand::Const(t.val),
                TempKind::Global => Operand::Env {
                    offset: t.mem_offset as usize,
                    ty: t.ty,
                },
                TempKind::Ebb | TempKind::Tb => {
                    nslots += 1;
                    Operand::Slot(nslots - 1)
                }
            })
            .collect();

        // First pass: label -> index of the next real step.
        let mut label_steps = vec![usize::MAX; ctx.labels().len()];
        let mut step = 0;
        for op in ctx.ops() {
            match op.opc {
                Opcode::SetLabel => label_steps[op.carg(0) as usize] = step,
                opc if is_marker(opc) => {}
                _ => step += 1,
            }
        }

        Ok(Self {
            ctx,
            operands,
            nslots,
            label_steps,
        })
    }

    fn run(self) -> Result<CompiledCode, CodegenError> {
        let mut steps: Vec<Step> = Vec::with_capacity(self.ctx.num_ops());
        for op in self.ctx.ops() {
            if is_marker(op.opc) {
                continue;
            }
            steps.push(self.lower(op)?);
        }
        trace!(
            ops = self.ctx.num_ops(),
            steps = steps.len(),
            slots = self.nslots,
            "threaded codegen"
        );
        Ok(CompiledCode::new(steps.into_boxed_slice(), self.nslots))
    }

    fn opnd(&self, t: TempIdx) -> Operand {
        self.operands[t.0 as usize]
    }

    fn target(&self, label: u32) -> Result<usize, CodegenError> {
        match self.label_steps.get(label as usize) {
            Some(&s) if s != usize::MAX => Ok(s),
            _ => Err(CodegenError::UnresolvedLabel(label)),
        }
    }

    fn unsupported(op: &Op) -> CodegenError {
        CodegenError::Unsupported {
            op: op.opc.def().name,
            ty: op.op_type,
        }
    }

    fn cond(op: &Op, n: usize) -> Result<Cond, CodegenError> {
        let raw = op.carg(n);
        Cond::from_raw(raw).ok_or(CodegenError::BadCond(raw))
    }

    fn lower(&self, op: &Op) -> Result<Step, CodegenError> {
        let ty = op.op_type;
        let o = |n: usize| self.opnd(op.oargs()[n]);
        let i = |n: usize| self.opnd(op.iargs()[n]);
        let opc = op.opc;

        let step: Step = match opc {
            // -- Scalar --
            Opcode::Mov
            | Opcode::Not
            | Opcode::Neg
            | Opcode::Clz
            | Opcode::Bswap16
            | Opcode::Bswap32
            | Opcode::Bswap64
            | Opcode::Bswap128
            | Opcode::ExtI32I64
            | Opcode::ExtUI32I64
            | Opcode::ExtrlI64I32
            | Opcode::CvtF32F64
            | Opcode::CvtF64F32 => {
                if ops::eval_unary(opc, ty, 0).is_none() {
                    return Err(Self::unsupported(op));
                }
                let (d, a) = (o(0), i(0));
                boxed(move |f| {
                    let v = ops::eval_unary(opc, ty, a.get(f)).unwrap_or(0);
                    d.set(f, v);
                    Flow::Next
                })
            }
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::DivS
            | Opcode::DivU
            | Opcode::MulSH
            | Opcode::MulUH
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::AndC
            | Opcode::OrC
            | Opcode::Eqv
            | Opcode::Nand
            | Opcode::Nor
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::Sar
            | Opcode::RotL
            | Opcode::RotR => {
                if ops::eval_binary(opc, ty, 0, 0).is_none() {
                    return Err(Self::unsupported(op));
                }
                let (d, a, b) = (o(0), i(0), i(1));
                boxed(move |f| {
                    let v = ops::eval_binary(opc, ty, a.get(f), b.get(f)).unwrap_or(0);
                    d.set(f, v);
                    Flow::Next
                })
            }
            Opcode::Extract | Opcode::SExtract => {
                let (d, a) = (o(0), i(0));
                let (ofs, len) = (op.carg(0), op.carg(1));
                if ofs + len > ty.size_bits() || len == 0 {
                    return Err(Self::unsupported(op));
                }
                let signed = opc == Opcode::SExtract;
                boxed(move |f| {
                    d.set(f, ops::eval_extract(ty, a.get(f), ofs, len, signed));
                    Flow::Next
                })
            }
            Opcode::Deposit => {
                let (d, a, b) = (o(0), i(0), i(1));
                let (ofs, len) = (op.carg(0), op.carg(1));
                if ofs + len > ty.size_bits() || len == 0 {
                    return Err(Self::unsupported(op));
                }
                boxed(move |f| {
                    d.set(f, ops::eval_deposit(ty, a.get(f), b.get(f), ofs, len));
                    Flow::Next
                })
            }
            Opcode::SetCond => {
                let (d, a, b) = (o(0), i(0), i(1));
                let cond = Self::cond(op, 0)?;
                boxed(move |f| {
                    d.set(f, ops::eval_cond(cond, ty, a.get(f), b.get(f)) as u128);
                    Flow::Next
                })
            }
            Opcode::MovCond => {
                let (d, c1, c2, v1, v2) = (o(0), i(0), i(1), i(2), i(3));
                let cond = Self::cond(op, 0)?;
                boxed(move |f| {
                    let v = if ops::eval_cond(cond, ty, c1.get(f), c2.get(f)) {
                        v1.get(f)
                    } else {
                        v2.get(f)
                    };
                    d.set(f, v & ty.mask());
                    Flow::Next
                })
            }

            // -- Guest memory --
            Opcode::GuestLd => {
                let (d, a) = (o(0), i(0));
                let memop = MemOp::new(op.carg(0) as u16);
                let n = memop.size_bytes() as usize;
                if n > ty.size_bytes() as usize {
                    return Err(Self::unsupported(op));
                }
                boxed(move |f| {
                    let mut buf = [0u8; 16];
                    f.rt.memory().load_raw(a.get(f) as u32, &mut buf[..n]);
                    let mut v = u128::from_le_bytes(buf);
                    if memop.is_signed() && n < 16 {
                        let sh = 128 - n as u32 * 8;
                        v = (((v << sh) as i128) >> sh) as u128;
                    }
                    d.set(f, v & ty.mask());
                    Flow::Next
                })
            }
            Opcode::GuestSt => {
                let (v, a) = (i(0), i(1));
                let n = MemOp::new(op.carg(0) as u16).size_bytes() as usize;
                boxed(move |f| {
                    let bytes = v.get(f).to_le_bytes();
                    f.rt.memory().store_raw(a.get(f) as u32, &bytes[..n]);
                    Flow::Next
                })
            }
            Opcode::MmioLd => {
                let (d, a) = (o(0), i(0));
                let memop = MemOp::new(op.carg(0) as u16);
                let n = memop.size_bytes();
                if n > 8 {
                    return Err(Self::unsupported(op));
                }
                boxed(move |f| {
                    let mut v = f.rt.memory().mmio_read(a.get(f) as u32, n);
                    if memop.is_signed() && n < 8 {
                        let sh = 64 - n * 8;
                        v = (((v << sh) as i64) >> sh) as u64;
                    }
                    d.set(f, v as u128 & ty.mask());
                    Flow::Next
                })
            }
            Opcode::MmioSt => {
                let (v, a) = (i(0), i(1));
                let n = MemOp::new(op.carg(0) as u16).size_bytes();
                if n > 8 {
                    return Err(Self::unsupported(op));
                }
                boxed(move |f| {
                    let mask = if n == 8 { u64::MAX } else { (1 << (n * 8)) - 1 };
                    let val = v.get(f) as u64 & mask;
                    f.rt.memory().mmio_write(a.get(f) as u32, n, val);
                    Flow::Next
                })
            }

            // -- Control flow --
            Opcode::Br => {
                let to = self.target(op.carg(0))?;
                boxed(move |_| Flow::Jump(to))
            }
            Opcode::BrCond => {
                let (a, b) = (i(0), i(1));
                let cond = Self::cond(op, 0)?;
                let to = self.target(op.carg(1))?;
                boxed(move |f| {
                    if ops::eval_cond(cond, ty, a.get(f), b.get(f)) {
                        Flow::Jump(to)
                    } else {
                        Flow::Next
                    }
                })
            }
            Opcode::ExitTb => {
                let code = op.carg(0);
                boxed(move |_| Flow::Exit(code))
            }
            Opcode::CallBlock => {
                let (d, t) = (o(0), i(0));
                boxed(move |f| {
                    // SAFETY: `env` is the caller's live register file.
                    let code = unsafe { f.rt.call_block(f.env, t.get(f) as u32) };
                    d.set(f, code as u128);
                    Flow::Next
                })
            }
            Opcode::Call => {
                let id = op.carg(0);
                let helper = self
                    .ctx
                    .helper(id)
                    .ok_or(CodegenError::UnknownHelper(id))?
                    .func;
                let d = o(0);
                let args = [i(0), i(1), i(2), i(3)];
                boxed(move |f| {
                    let vals = args.map(|a| a.get(f) as u64);
                    // SAFETY: helpers receive the register file the
                    // unit was generated for.
                    let r = unsafe { helper(f.env, f.rt, vals) };
                    d.set(f, r as u128);
                    Flow::Next
                })
            }

            // -- Vector lanes --
            Opcode::DupVec => {
                let (d, s) = (o(0), i(0));
                let vece = Vece::from_raw(op.carg(0));
                boxed(move |f| {
                    d.set(f, ops::dup(vece, s.get(f) as u64));
                    Flow::Next
                })
            }
            Opcode::ExtractVec => {
                let (d, s) = (o(0), i(0));
                let vece = Vece::from_raw(op.carg(0));
                let lane = op.carg(1);
                if lane >= vece.lanes() {
                    return Err(Self::unsupported(op));
                }
                boxed(move |f| {
                    d.set(f, ops::lane(s.get(f), vece.lane_bits(), lane) as u128);
                    Flow::Next
                })
            }
            Opcode::CmpVec => {
                let (d, a, b) = (o(0), i(0), i(1));
                let vece = Vece::from_raw(op.carg(0));
                let cond = Self::cond(op, 1)?;
                boxed(move |f| {
                    d.set(f, ops::eval_cmp_vec(vece, cond, a.get(f), b.get(f)));
                    Flow::Next
                })
            }
            Opcode::BitselVec => {
                let (d, s, t, e) = (o(0), i(0), i(1), i(2));
                boxed(move |f| {
                    d.set(f, ops::eval_bitsel(s.get(f), t.get(f), e.get(f)));
                    Flow::Next
                })
            }
            _ if opc.is_vector() => {
                let vece = Vece::from_raw(op.carg(0));
                if ops::eval_vec_binary(opc, vece, 0, 0).is_none() {
                    return Err(Self::unsupported(op));
                }
                let (d, a, b) = (o(0), i(0), i(1));
                boxed(move |f| {
                    let v = ops::eval_vec_binary(opc, vece, a.get(f), b.get(f)).unwrap_or(0);
                    d.set(f, v);
                    Flow::Next
                })
            }
            _ => return Err(Self::unsupported(op)),
        };
        Ok(step)
    }
}

/// Run `steps` until one exits.
///
/// # Safety
/// `env` must point at a live register file matching the globals
/// the steps were generated against.
pub(crate) unsafe fn execute(
    steps: &[Step],
    nslots: usize,
    env: *mut u8,
    rt: &dyn Runtime,
) -> u32 {
    let mut frame = Frame {
        env,
        rt,
        slots: vec![0; nslots],
    };
    let mut pc = 0;
    while let Some(step) = steps.get(pc) {
        match step(&mut frame) {
            Flow::Next => pc += 1,
            Flow::Jump(to) => pc = to,
            Flow::Exit(code) => return code,
        }
    }
    ppujit_core::EXIT_BLOCK_ENDED
}
