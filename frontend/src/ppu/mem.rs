//! Guest memory access lowering.
//!
//! Scalar accesses fork at run time: addresses at or above the device
//! window base go through `mmio_ld`/`mmio_st` (values already in guest
//! order), everything else is a raw RAM access followed by a byte
//! swap. Byte-reversed forms swap on the device side instead.
//! Vector accesses always take the RAM path.

use ppujit_core::{Cond, Context, MemOp, TempIdx, Type};

use super::PpuDisasContext;

impl PpuDisasContext<'_> {
    // -- Effective address ----------------------------------------

    /// `(ra|0) + disp`.
    pub(super) fn gen_ea_disp(&self, ir: &mut Context, ra: usize, disp: i64) -> TempIdx {
        let base = self.gpr_or_zero(ir, ra);
        let off = ir.new_const(Type::I64, disp as u64);
        let ea = ir.new_temp(Type::I64);
        ir.gen_add(Type::I64, ea, base, off)
    }

    /// `(ra|0) + rb`.
    pub(super) fn gen_ea_indexed(&self, ir: &mut Context, ra: usize, rb: usize) -> TempIdx {
        let base = self.gpr_or_zero(ir, ra);
        let ea = ir.new_temp(Type::I64);
        ir.gen_add(Type::I64, ea, base, self.gpr(rb))
    }

    /// Update forms address from `ra` itself, even `r0`.
    pub(super) fn gen_ea_update(
        &self,
        ir: &mut Context,
        ra: usize,
        index: Result<usize, i64>,
    ) -> TempIdx {
        let off = match index {
            Ok(rb) => self.gpr(rb),
            Err(disp) => ir.new_const(Type::I64, disp as u64),
        };
        let ea = ir.new_temp(Type::I64);
        ir.gen_add(Type::I64, ea, self.gpr(ra), off)
    }

    /// Branch to `mmio` when the low word of `addr` lies in the
    /// device window.
    fn gen_mmio_check(&self, ir: &mut Context, addr: TempIdx, mmio: u32) {
        let lo = ir.new_temp(Type::I32);
        ir.gen_extrl_i64_i32(lo, addr);
        let base = ir.new_const(Type::I32, self.mmio_base as u64);
        ir.gen_brcond(Type::I32, lo, base, Cond::Geu, mmio);
    }

    // -- Scalar load/store ----------------------------------------

    /// Load `bytes` (1, 2, 4 or 8) from `addr`, zero-extended, in
    /// guest order (or swapped when `reversed`).
    pub(super) fn gen_load(
        &self,
        ir: &mut Context,
        addr: TempIdx,
        bytes: u32,
        reversed: bool,
    ) -> TempIdx {
        let memop = MemOp::from_bytes(bytes);
        let val = ir.new_temp_tb(Type::I64);
        let ram_path = |ir: &mut Context| {
            let raw = ir.new_temp(Type::I64);
            ir.gen_guest_ld(Type::I64, raw, addr, memop);
            if reversed {
                ir.gen_mov(Type::I64, val, raw);
            } else {
                ir.gen_bswap_sized(Type::I64, bytes, val, raw);
            }
        };
        if !self.cfg.mmio_fork {
            ram_path(ir);
            return val;
        }

        let l_mmio = ir.new_label();
        let l_done = ir.new_label();
        self.gen_mmio_check(ir, addr, l_mmio);
        ram_path(ir);
        ir.gen_br(l_done);

        ir.gen_set_label(l_mmio);
        let dev = ir.new_temp(Type::I64);
        ir.gen_mmio_ld(Type::I64, dev, addr, memop);
        if reversed {
            ir.gen_bswap_sized(Type::I64, bytes, val, dev);
        } else {
            ir.gen_mov(Type::I64, val, dev);
        }
        ir.gen_set_label(l_done);
        val
    }

    /// Store the low `bytes` of `val` to `addr` in guest order (or
    /// swapped when `reversed`).
    pub(super) fn gen_store(
        &self,
        ir: &mut Context,
        val: TempIdx,
        addr: TempIdx,
        bytes: u32,
        reversed: bool,
    ) {
        let memop = MemOp::from_bytes(bytes);
        let ram_path = |ir: &mut Context| {
            if reversed {
                ir.gen_guest_st(Type::I64, val, addr, memop);
            } else {
                let sw = ir.new_temp(Type::I64);
                ir.gen_bswap_sized(Type::I64, bytes, sw, val);
                ir.gen_guest_st(Type::I64, sw, addr, memop);
            }
        };
        if !self.cfg.mmio_fork {
            ram_path(ir);
            return;
        }

        let l_mmio = ir.new_label();
        let l_done = ir.new_label();
        self.gen_mmio_check(ir, addr, l_mmio);
        ram_path(ir);
        ir.gen_br(l_done);

        ir.gen_set_label(l_mmio);
        if reversed {
            let sw = ir.new_temp(Type::I64);
            ir.gen_bswap_sized(Type::I64, bytes, sw, val);
            ir.gen_mmio_st(Type::I64, sw, addr, memop);
        } else {
            ir.gen_mmio_st(Type::I64, val, addr, memop);
        }
        ir.gen_set_label(l_done);
    }

    // -- Vector load/store ----------------------------------------

    fn gen_align16(&self, ir: &mut Context, addr: TempIdx) -> TempIdx {
        let m = ir.new_const(Type::I64, !15u64);
        let a = ir.new_temp(Type::I64);
        ir.gen_and(Type::I64, a, addr, m)
    }

    /// 16-byte load from `addr & !15`; lane 0 is the lowest address.
    pub(super) fn gen_load_vec(&self, ir: &mut Context, addr: TempIdx) -> TempIdx {
        let a = self.gen_align16(ir, addr);
        let raw = ir.new_temp(Type::V128);
        ir.gen_guest_ld(Type::V128, raw, a, MemOp::uo());
        let v = ir.new_temp(Type::V128);
        ir.gen_bswap128(v, raw)
    }

    pub(super) fn gen_store_vec(&self, ir: &mut Context, val: TempIdx, addr: TempIdx) {
        let a = self.gen_align16(ir, addr);
        let sw = ir.new_temp(Type::V128);
        ir.gen_bswap128(sw, val);
        ir.gen_guest_st(Type::V128, sw, a, MemOp::uo());
    }
}
