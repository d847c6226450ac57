//! IR dump: human-readable text output for IR ops.

use std::fmt::Write as FmtWrite;
use std::io::Write;

use crate::context::Context;
use crate::op::Op;
use crate::opcode::Opcode;
use crate::temp::{TempIdx, TempKind};
use crate::types::{Cond, MemOp, Type, Vece};

fn cond_name(c: u32) -> &'static str {
    Cond::from_raw(c).map_or("???", Cond::name)
}

/// Format a temp reference for display.
fn fmt_temp(ctx: &Context, idx: TempIdx, buf: &mut String) {
    let i = idx.0 as usize;
    if i >= ctx.nb_temps() as usize {
        let v = idx.0;
        let _ = write!(buf, "$0x{v:x}");
        return;
    }
    let t = ctx.temp(idx);
    let _ = match t.kind {
        TempKind::Const => {
            let v = t.val;
            write!(buf, "$0x{v:x}")
        }
        TempKind::Global => match t.name {
            Some(name) => write!(buf, "{name}"),
            None => write!(buf, "g{i}"),
        },
        TempKind::Ebb | TempKind::Tb => {
            let local = i as u32 - ctx.nb_globals();
            write!(buf, "tmp{local}")
        }
    };
}

/// Build the opcode name with a type suffix for polymorphic ops.
fn op_name(op: &Op) -> String {
    let def = op.opc.def();
    if op.opc.is_int_polymorphic() {
        let suffix = match op.op_type {
            Type::I32 => "_i32",
            Type::I64 => "_i64",
            Type::V128 => "_v128",
        };
        let base = def.name;
        format!("{base}{suffix}")
    } else if op.opc.is_vector() && !op.cargs().is_empty() {
        let vece = Vece::from_raw(op.carg(0));
        format!("{}_{}", def.name, vece.suffix())
    } else {
        def.name.to_string()
    }
}

fn memop_name(bits: u32) -> String {
    let m = MemOp::new(bits as u16);
    let sign = if m.is_signed() { "s" } else { "u" };
    format!("{sign}{}", m.size_bytes() * 8)
}

/// Dump all IR ops in `ctx` to the given writer.
pub fn dump_ops(ctx: &Context, w: &mut impl Write) -> std::io::Result<()> {
    dump_ops_with(ctx, w, |_, _| Ok(()))
}

/// Dump IR ops with an annotation callback for `InsnStart`.
///
/// `insn_anno` is called at each guest instruction boundary with
/// `(pc, writer)`; use it to print the instruction word or its
/// disassembly on the `---- 0x...` header line.
pub fn dump_ops_with(
    ctx: &Context,
    w: &mut impl Write,
    insn_anno: impl Fn(u32, &mut dyn Write) -> std::io::Result<()>,
) -> std::io::Result<()> {
    let mut buf = String::with_capacity(128);

    for op in ctx.ops() {
        buf.clear();
        match op.opc {
            Opcode::InsnStart => {
                let pc = op.carg(0);
                write!(w, " ---- 0x{pc:08x}")?;
                insn_anno(pc, w)?;
                writeln!(w)?;
                continue;
            }
            Opcode::SetLabel => {
                let label_id = op.carg(0);
                writeln!(w, " L{label_id}:")?;
                continue;
            }
            _ => {}
        }

        let name = op_name(op);
        write!(w, " {name}")?;

        let oargs = op.oargs();
        let iargs = op.iargs();
        for (i, &a) in oargs.iter().chain(iargs).enumerate() {
            if i > 0 {
                write!(w, ",")?;
            }
            buf.clear();
            fmt_temp(ctx, a, &mut buf);
            write!(w, " {buf}")?;
        }

        // Constant args: special handling per opcode
        let cargs = op.cargs();
        match op.opc {
            Opcode::BrCond => {
                let cond = cond_name(cargs[0].0);
                let label = cargs[1].0;
                write!(w, ", {cond}, L{label}")?;
            }
            Opcode::SetCond | Opcode::MovCond => {
                write!(w, ", {}", cond_name(cargs[0].0))?;
            }
            Opcode::CmpVec => {
                write!(w, ", {}", cond_name(cargs[1].0))?;
            }
            Opcode::Br => {
                write!(w, " L{}", cargs[0].0)?;
            }
            Opcode::ExitTb => {
                write!(w, " $0x{:x}", cargs[0].0)?;
            }
            Opcode::Call => {
                let id = cargs[0].0;
                match ctx.helper(id) {
                    Some(h) => write!(w, ", {}", h.name)?,
                    None => write!(w, ", helper#{id}")?,
                }
            }
            Opcode::GuestLd | Opcode::GuestSt | Opcode::MmioLd | Opcode::MmioSt => {
                write!(w, ", {}", memop_name(cargs[0].0))?;
            }
            Opcode::ExtractVec => {
                write!(w, ", lane {}", cargs[1].0)?;
            }
            _ if op.opc.is_vector() => {}
            _ => {
                let has_prev = !oargs.is_empty() || !iargs.is_empty();
                for (i, &c) in cargs.iter().enumerate() {
                    if has_prev || i > 0 {
                        write!(w, ",")?;
                    }
                    let v = c.0;
                    write!(w, " $0x{v:x}")?;
                }
            }
        }

        writeln!(w)?;
    }
    Ok(())
}

/// Dump into a `String`.
pub fn dump_to_string(ctx: &Context) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = dump_ops(ctx, &mut out);
    String::from_utf8_lossy(&out).into_owned()
}
