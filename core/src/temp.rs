use crate::types::Type;

/// Lifetime/scope of an IR temporary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TempKind {
    /// Live within a single extended basic block.
    Ebb,
    /// Live across the entire translation unit.
    Tb,
    /// Backed by a `CpuState` field at a fixed env offset.
    Global,
    /// Compile-time constant.
    Const,
}

/// Index into the Context's temp pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TempIdx(pub u32);

/// An IR temporary.
#[derive(Debug, Clone)]
pub struct Temp {
    pub idx: TempIdx,
    pub ty: Type,
    pub kind: TempKind,
    /// For `Const` temps, the immediate value (zero-extended).
    pub val: u128,
    /// For `Global` temps, the byte offset into the CPU state.
    pub mem_offset: i64,
    /// Debug name (e.g. "r3", "cr").
    pub name: Option<&'static str>,
}

impl Temp {
    pub fn new_ebb(idx: TempIdx, ty: Type) -> Self {
        Self {
            idx,
            ty,
            kind: TempKind::Ebb,
            val: 0,
            mem_offset: 0,
            name: None,
        }
    }

    pub fn new_tb(idx: TempIdx, ty: Type) -> Self {
        let mut t = Self::new_ebb(idx, ty);
        t.kind = TempKind::Tb;
        t
    }

    pub fn new_const(idx: TempIdx, ty: Type, val: u128) -> Self {
        Self {
            idx,
            ty,
            kind: TempKind::Const,
            val: val & ty.mask(),
            mem_offset: 0,
            name: None,
        }
    }

    pub fn new_global(
        idx: TempIdx,
        ty: Type,
        offset: i64,
        name: &'static str,
    ) -> Self {
        Self {
            idx,
            ty,
            kind: TempKind::Global,
            val: 0,
            mem_offset: offset,
            name: Some(name),
        }
    }

    pub fn is_const(&self) -> bool {
        self.kind == TempKind::Const
    }
}
