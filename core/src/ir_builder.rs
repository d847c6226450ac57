use crate::context::Context;
use crate::op::Op;
use crate::opcode::Opcode;
use crate::temp::TempIdx;
use crate::types::{Cond, MemOp, Type, Vece};

// Constant args are encoded as TempIdx(raw_value as u32).
fn carg(val: u32) -> TempIdx {
    TempIdx(val)
}

/// Generates `gen_<name>(ty, d, a, b)` for plain binary opcodes.
macro_rules! binary_ops {
    ($($name:ident => $opc:ident),* $(,)?) => {
        $(
            pub fn $name(
                &mut self,
                ty: Type,
                d: TempIdx,
                a: TempIdx,
                b: TempIdx,
            ) -> TempIdx {
                self.emit_binary(Opcode::$opc, ty, d, a, b)
            }
        )*
    };
}

/// Generates `gen_<name>(vece, d, a, b)` for binary lane opcodes.
macro_rules! vec_binary_ops {
    ($($name:ident => $opc:ident),* $(,)?) => {
        $(
            pub fn $name(
                &mut self,
                vece: Vece,
                d: TempIdx,
                a: TempIdx,
                b: TempIdx,
            ) -> TempIdx {
                self.emit_vec_binary(Opcode::$opc, vece, d, a, b)
            }
        )*
    };
}

impl Context {
    // -- Internal helpers --

    fn emit(&mut self, opc: Opcode, ty: Type, args: &[TempIdx]) {
        let idx = self.next_op_idx();
        let op = Op::with_args(idx, opc, ty, args);
        self.emit_op(op);
    }

    fn emit_binary(
        &mut self,
        opc: Opcode,
        ty: Type,
        dst: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.emit(opc, ty, &[dst, a, b]);
        dst
    }

    fn emit_unary(
        &mut self,
        opc: Opcode,
        ty: Type,
        dst: TempIdx,
        src: TempIdx,
    ) -> TempIdx {
        self.emit(opc, ty, &[dst, src]);
        dst
    }

    fn emit_vec_binary(
        &mut self,
        opc: Opcode,
        vece: Vece,
        dst: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.emit(opc, Type::V128, &[dst, a, b, carg(vece as u32)]);
        dst
    }

    // -- Binary ALU (1 oarg, 2 iargs) --

    binary_ops! {
        gen_add => Add,
        gen_sub => Sub,
        gen_mul => Mul,
        gen_divs => DivS,
        gen_divu => DivU,
        gen_mulsh => MulSH,
        gen_muluh => MulUH,
        gen_and => And,
        gen_or => Or,
        gen_xor => Xor,
        gen_andc => AndC,
        gen_orc => OrC,
        gen_eqv => Eqv,
        gen_nand => Nand,
        gen_nor => Nor,
        gen_shl => Shl,
        gen_shr => Shr,
        gen_sar => Sar,
        gen_rotl => RotL,
        gen_rotr => RotR,
    }

    // -- Unary (1 oarg, 1 iarg) --

    pub fn gen_neg(&mut self, ty: Type, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Neg, ty, d, s)
    }

    pub fn gen_not(&mut self, ty: Type, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Not, ty, d, s)
    }

    pub fn gen_mov(&mut self, ty: Type, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Mov, ty, d, s)
    }

    /// Count leading zeros; a zero input yields the type width.
    pub fn gen_clz(&mut self, ty: Type, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Clz, ty, d, s)
    }

    // -- Byte swap --

    pub fn gen_bswap16(&mut self, ty: Type, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Bswap16, ty, d, s)
    }

    pub fn gen_bswap32(&mut self, ty: Type, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Bswap32, ty, d, s)
    }

    pub fn gen_bswap64(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Bswap64, Type::I64, d, s)
    }

    pub fn gen_bswap128(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Bswap128, Type::V128, d, s)
    }

    /// Swap a value of `bytes` width (1, 2, 4, 8 or 16) held in a
    /// temp of type `ty`. One-byte values are copied.
    pub fn gen_bswap_sized(
        &mut self,
        ty: Type,
        bytes: u32,
        d: TempIdx,
        s: TempIdx,
    ) -> TempIdx {
        match bytes {
            1 => self.gen_mov(ty, d, s),
            2 => self.gen_bswap16(ty, d, s),
            4 => self.gen_bswap32(ty, d, s),
            8 => self.gen_bswap64(d, s),
            _ => self.gen_bswap128(d, s),
        }
    }

    // -- Bit field --

    pub fn gen_extract(
        &mut self,
        ty: Type,
        d: TempIdx,
        src: TempIdx,
        ofs: u32,
        len: u32,
    ) -> TempIdx {
        self.emit(Opcode::Extract, ty, &[d, src, carg(ofs), carg(len)]);
        d
    }

    pub fn gen_sextract(
        &mut self,
        ty: Type,
        d: TempIdx,
        src: TempIdx,
        ofs: u32,
        len: u32,
    ) -> TempIdx {
        self.emit(Opcode::SExtract, ty, &[d, src, carg(ofs), carg(len)]);
        d
    }

    /// d = a with bits [ofs, ofs+len) replaced by the low bits of b.
    pub fn gen_deposit(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
        ofs: u32,
        len: u32,
    ) -> TempIdx {
        self.emit(Opcode::Deposit, ty, &[d, a, b, carg(ofs), carg(len)]);
        d
    }

    // -- Type conversion (1 oarg, 1 iarg) --

    /// Sign-extend i32 -> i64.
    pub fn gen_ext_i32_i64(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::ExtI32I64, Type::I64, d, s)
    }

    /// Zero-extend i32 -> i64.
    pub fn gen_ext_u32_i64(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::ExtUI32I64, Type::I64, d, s)
    }

    /// Truncate i64 -> i32 (low 32 bits).
    pub fn gen_extrl_i64_i32(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::ExtrlI64I32, Type::I32, d, s)
    }

    /// Widen single-precision bits to double-precision bits.
    pub fn gen_cvt_f32_f64(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::CvtF32F64, Type::I64, d, s)
    }

    /// Round double-precision bits to single-precision bits.
    pub fn gen_cvt_f64_f32(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::CvtF64F32, Type::I32, d, s)
    }

    // -- SetCond / MovCond --

    pub fn gen_setcond(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
        cond: Cond,
    ) -> TempIdx {
        self.emit(Opcode::SetCond, ty, &[d, a, b, carg(cond as u32)]);
        d
    }

    /// d = (c1 cond c2) ? v1 : v2
    #[allow(clippy::too_many_arguments)]
    pub fn gen_movcond(
        &mut self,
        ty: Type,
        d: TempIdx,
        c1: TempIdx,
        c2: TempIdx,
        v1: TempIdx,
        v2: TempIdx,
        cond: Cond,
    ) -> TempIdx {
        self.emit(
            Opcode::MovCond,
            ty,
            &[d, c1, c2, v1, v2, carg(cond as u32)],
        );
        d
    }

    // -- Guest memory access --

    /// Raw RAM load of `memop` size, host byte order, zero-extended
    /// into `ty`.
    pub fn gen_guest_ld(
        &mut self,
        ty: Type,
        dst: TempIdx,
        addr: TempIdx,
        memop: MemOp,
    ) -> TempIdx {
        self.emit(
            Opcode::GuestLd,
            ty,
            &[dst, addr, carg(memop.bits() as u32)],
        );
        dst
    }

    /// Raw RAM store of the low `memop` bytes of `val`.
    pub fn gen_guest_st(
        &mut self,
        ty: Type,
        val: TempIdx,
        addr: TempIdx,
        memop: MemOp,
    ) {
        self.emit(
            Opcode::GuestSt,
            ty,
            &[val, addr, carg(memop.bits() as u32)],
        );
    }

    /// Device-window load; the value arrives in guest order.
    pub fn gen_mmio_ld(
        &mut self,
        ty: Type,
        dst: TempIdx,
        addr: TempIdx,
        memop: MemOp,
    ) -> TempIdx {
        self.emit(
            Opcode::MmioLd,
            ty,
            &[dst, addr, carg(memop.bits() as u32)],
        );
        dst
    }

    pub fn gen_mmio_st(
        &mut self,
        ty: Type,
        val: TempIdx,
        addr: TempIdx,
        memop: MemOp,
    ) {
        self.emit(
            Opcode::MmioSt,
            ty,
            &[val, addr, carg(memop.bits() as u32)],
        );
    }

    // -- Control flow --

    /// Unconditional branch to label.
    /// Br: 0 oargs, 0 iargs, 1 carg (label_id)
    pub fn gen_br(&mut self, label_id: u32) {
        self.label_mut(label_id).add_ref();
        self.emit(Opcode::Br, Type::I32, &[carg(label_id)]);
    }

    /// Conditional branch.
    /// BrCond: 0 oargs, 2 iargs, 2 cargs (cond, label_id)
    pub fn gen_brcond(
        &mut self,
        ty: Type,
        a: TempIdx,
        b: TempIdx,
        cond: Cond,
        label_id: u32,
    ) {
        self.label_mut(label_id).add_ref();
        self.emit(
            Opcode::BrCond,
            ty,
            &[a, b, carg(cond as u32), carg(label_id)],
        );
    }

    /// Define label position.
    /// SetLabel: 0 oargs, 0 iargs, 1 carg (label_id)
    pub fn gen_set_label(&mut self, label_id: u32) {
        let pos = self.num_ops();
        self.label_mut(label_id).set_position(pos);
        self.emit(Opcode::SetLabel, Type::I32, &[carg(label_id)]);
    }

    /// ExitTb: 0 oargs, 0 iargs, 1 carg (exit code)
    pub fn gen_exit_tb(&mut self, val: u32) {
        self.emit(Opcode::ExitTb, Type::I32, &[carg(val)]);
    }

    /// Run the unit at `target` until it returns; `dst` receives its
    /// exit code.
    pub fn gen_call_block(&mut self, dst: TempIdx, target: TempIdx) -> TempIdx {
        self.emit(Opcode::CallBlock, Type::I32, &[dst, target]);
        dst
    }

    // -- Boundary --

    /// InsnStart: 0 oargs, 0 iargs, 1 carg (pc)
    pub fn gen_insn_start(&mut self, pc: u32) {
        self.insn_pcs.push(pc);
        self.emit(Opcode::InsnStart, Type::I32, &[carg(pc)]);
    }

    /// Call helper: dst = helper(env, rt, args[0..4])
    /// Call: 1 oarg, 4 iargs, 1 carg (helper id)
    pub fn gen_call(
        &mut self,
        dst: TempIdx,
        helper: u32,
        args: &[TempIdx],
    ) -> TempIdx {
        let mut full_args = [TempIdx(0); 6];
        full_args[0] = dst;
        let zero = self.new_const(Type::I64, 0);
        for (i, slot) in full_args[1..5].iter_mut().enumerate() {
            *slot = args.get(i).copied().unwrap_or(zero);
        }
        full_args[5] = carg(helper);
        self.emit(Opcode::Call, Type::I64, &full_args);
        dst
    }

    // -- Vector lanes --

    /// Broadcast the low lane bits of a scalar to every lane.
    pub fn gen_dup_vec(&mut self, vece: Vece, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit(Opcode::DupVec, Type::V128, &[d, s, carg(vece as u32)]);
        d
    }

    /// Read lane `lane` (lane 0 is the most significant) zero-extended.
    pub fn gen_extract_vec(
        &mut self,
        vece: Vece,
        d: TempIdx,
        s: TempIdx,
        lane: u32,
    ) -> TempIdx {
        self.emit(
            Opcode::ExtractVec,
            Type::V128,
            &[d, s, carg(vece as u32), carg(lane)],
        );
        d
    }

    vec_binary_ops! {
        gen_add_vec => AddVec,
        gen_sub_vec => SubVec,
        gen_ssadd_vec => SsaddVec,
        gen_usadd_vec => UsaddVec,
        gen_sssub_vec => SssubVec,
        gen_ussub_vec => UssubVec,
        gen_smin_vec => SminVec,
        gen_umin_vec => UminVec,
        gen_smax_vec => SmaxVec,
        gen_umax_vec => UmaxVec,
        gen_shlv_vec => ShlvVec,
        gen_shrv_vec => ShrvVec,
        gen_sarv_vec => SarvVec,
        gen_rotlv_vec => RotlvVec,
    }

    pub fn gen_cmp_vec(
        &mut self,
        vece: Vece,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
        cond: Cond,
    ) -> TempIdx {
        self.emit(
            Opcode::CmpVec,
            Type::V128,
            &[d, a, b, carg(vece as u32), carg(cond as u32)],
        );
        d
    }

    /// d = (t & sel) | (f & ~sel)
    pub fn gen_bitsel_vec(
        &mut self,
        d: TempIdx,
        sel: TempIdx,
        t: TempIdx,
        f: TempIdx,
    ) -> TempIdx {
        self.emit(Opcode::BitselVec, Type::V128, &[d, sel, t, f]);
        d
    }
}
