/// A branch target label within a translation unit.
///
/// Labels support forward references: a branch may name a label
/// before `set_label` places it. The code generator resolves every
/// label to an op position before it lowers any branch.
#[derive(Debug, Clone)]
pub struct Label {
    pub id: u32,
    /// Whether this label has been placed (set_label emitted).
    pub present: bool,
    /// Index of the `SetLabel` op once placed.
    pub op_pos: usize,
    /// Number of branches referencing this label.
    pub refs: u32,
}

impl Label {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            present: false,
            op_pos: 0,
            refs: 0,
        }
    }

    /// Record a branch referencing this label.
    pub fn add_ref(&mut self) {
        self.refs += 1;
    }

    /// Mark this label as placed at the given op index.
    pub fn set_position(&mut self, pos: usize) {
        self.present = true;
        self.op_pos = pos;
    }

    /// Whether a branch targets this label but it was never placed.
    pub fn is_dangling(&self) -> bool {
        self.refs > 0 && !self.present
    }
}
