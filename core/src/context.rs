use std::collections::HashMap;

use crate::label::Label;
use crate::op::{Op, OpIdx};
use crate::runtime::HelperFn;
use crate::temp::{Temp, TempIdx};
use crate::types::{Type, TYPE_COUNT};

/// Maximum number of temps per translation context.
pub const MAX_TEMPS: usize = 1 << 16;
/// Maximum number of guest instructions per translation unit.
pub const MAX_INSNS: usize = 4096;

/// A registered out-of-line helper.
#[derive(Clone, Copy)]
pub struct Helper {
    pub name: &'static str,
    pub func: HelperFn,
}

impl std::fmt::Debug for Helper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Helper").field("name", &self.name).finish()
    }
}

/// Per-unit translation context.
///
/// Holds everything needed while lowering one translation unit:
/// temporaries, IR ops, labels and the helper table referenced by
/// `Call` ops. Globals (guest registers bound to env offsets) are
/// registered once and survive [`Context::reset`].
pub struct Context {
    temps: Vec<Temp>,
    ops: Vec<Op>,
    labels: Vec<Label>,

    /// Number of global temps (always at the front of `temps`).
    nb_globals: u32,

    // -- Constant deduplication --
    /// Per-type hash map from constant value to TempIdx,
    /// avoiding duplicate const temps.
    const_table: [HashMap<u128, TempIdx>; TYPE_COUNT],

    // -- Helper registry --
    helpers: Vec<Helper>,
    helper_ids: HashMap<&'static str, u32>,

    // -- Guest instruction tracking --
    /// Guest pc of each `InsnStart`, in emission order.
    pub insn_pcs: Vec<u32>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            temps: Vec::with_capacity(256),
            ops: Vec::with_capacity(512),
            labels: Vec::with_capacity(32),
            nb_globals: 0,
            const_table: Default::default(),
            helpers: Vec::new(),
            helper_ids: HashMap::new(),
            insn_pcs: Vec::with_capacity(64),
        }
    }

    /// Reset context for translating a new unit. Preserves globals
    /// and registered helpers.
    pub fn reset(&mut self) {
        self.temps.truncate(self.nb_globals as usize);
        self.ops.clear();
        self.labels.clear();
        for table in &mut self.const_table {
            table.clear();
        }
        self.insn_pcs.clear();
    }

    // -- Temp allocation --

    pub fn nb_globals(&self) -> u32 {
        self.nb_globals
    }

    pub fn nb_temps(&self) -> u32 {
        self.temps.len() as u32
    }

    /// Allocate a new EBB-scoped temporary.
    pub fn new_temp(&mut self, ty: Type) -> TempIdx {
        let idx = TempIdx(self.temps.len() as u32);
        self.temps.push(Temp::new_ebb(idx, ty));
        idx
    }

    /// Allocate a new unit-scoped temporary.
    pub fn new_temp_tb(&mut self, ty: Type) -> TempIdx {
        let idx = TempIdx(self.temps.len() as u32);
        self.temps.push(Temp::new_tb(idx, ty));
        idx
    }

    /// Get or create a constant temp (deduplicated per type).
    pub fn new_const(&mut self, ty: Type, val: u64) -> TempIdx {
        self.new_const_wide(ty, val as u128)
    }

    /// Constant of any width, including 128-bit vector constants.
    pub fn new_const_wide(&mut self, ty: Type, val: u128) -> TempIdx {
        let val = val & ty.mask();
        let type_idx = ty as usize;
        if let Some(&existing) = self.const_table[type_idx].get(&val) {
            return existing;
        }
        let idx = TempIdx(self.temps.len() as u32);
        self.temps.push(Temp::new_const(idx, ty, val));
        self.const_table[type_idx].insert(val, idx);
        idx
    }

    /// Register a global temp bound to `offset` in the register file
    /// (must be called before any non-global allocation).
    pub fn new_global(
        &mut self,
        ty: Type,
        offset: i64,
        name: &'static str,
    ) -> TempIdx {
        assert_eq!(
            self.temps.len() as u32,
            self.nb_globals,
            "globals must be registered before locals"
        );
        let idx = TempIdx(self.temps.len() as u32);
        self.temps.push(Temp::new_global(idx, ty, offset, name));
        self.nb_globals += 1;
        idx
    }

    pub fn temp(&self, idx: TempIdx) -> &Temp {
        &self.temps[idx.0 as usize]
    }

    pub fn temps(&self) -> &[Temp] {
        &self.temps
    }

    /// Iterate over global temps only.
    pub fn globals(&self) -> &[Temp] {
        &self.temps[..self.nb_globals as usize]
    }

    // -- Op emission --

    pub fn emit_op(&mut self, op: Op) -> OpIdx {
        let idx = op.idx;
        self.ops.push(op);
        idx
    }

    pub fn next_op_idx(&self) -> OpIdx {
        OpIdx(self.ops.len() as u32)
    }

    pub fn op(&self, idx: OpIdx) -> &Op {
        &self.ops[idx.0 as usize]
    }

    pub fn op_mut(&mut self, idx: OpIdx) -> &mut Op {
        &mut self.ops[idx.0 as usize]
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    // -- Labels --

    pub fn new_label(&mut self) -> u32 {
        let id = self.labels.len() as u32;
        self.labels.push(Label::new(id));
        id
    }

    pub fn label(&self, id: u32) -> &Label {
        &self.labels[id as usize]
    }

    pub fn label_mut(&mut self, id: u32) -> &mut Label {
        &mut self.labels[id as usize]
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    // -- Helpers --

    /// Register `func` under `name`, returning its id. Registering
    /// the same name twice returns the first id.
    pub fn register_helper(&mut self, name: &'static str, func: HelperFn) -> u32 {
        if let Some(&id) = self.helper_ids.get(name) {
            return id;
        }
        let id = self.helpers.len() as u32;
        self.helpers.push(Helper { name, func });
        self.helper_ids.insert(name, id);
        id
    }

    pub fn helper(&self, id: u32) -> Option<&Helper> {
        self.helpers.get(id as usize)
    }

    pub fn helpers(&self) -> &[Helper] {
        &self.helpers
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
