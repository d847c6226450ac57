//! Translation-unit metadata shared by the translator and the
//! dispatcher.

/// Exit code: the unit ended with a subroutine return (`blr`).
pub const EXIT_RETURN: u32 = 0;
/// Exit code: the unit ended with a jump; the guest pc holds the
/// next address to dispatch.
pub const EXIT_BLOCK_ENDED: u32 = 1;
/// Exit code: stop execution (trap, illegal word, exit request).
pub const EXIT_HALT: u32 = 0xFFFF_FFFF;

/// Describes one compiled unit.
#[derive(Debug, Clone, Default)]
pub struct TranslationBlock {
    /// Guest address of the first instruction.
    pub pc: u32,
    /// Bytes of guest code covered, counted from `pc`.
    pub size: u32,
    /// Number of guest instructions lowered.
    pub icount: u32,
    /// Instructions routed through the interpreter fallback.
    pub fallbacks: u32,
    /// Revision of the code cache this unit was compiled against.
    pub revision: u64,
}

impl TranslationBlock {
    pub fn new(pc: u32) -> Self {
        Self {
            pc,
            ..Self::default()
        }
    }

    /// One past the last guest byte covered.
    pub fn end(&self) -> u32 {
        self.pc.wrapping_add(self.size)
    }

    /// Whether the guest range `[addr, addr + len)` overlaps this unit.
    pub fn overlaps(&self, addr: u32, len: u32) -> bool {
        let a = addr as u64;
        let b = a + len as u64;
        let lo = self.pc as u64;
        let hi = lo + self.size as u64;
        a < hi && lo < b
    }
}

/// Number of entries in the per-thread jump cache.
pub const TB_JMP_CACHE_SIZE: usize = 1 << 12; // 4096

/// Per-thread direct-mapped cache in front of the shared block map.
///
/// Indexed by `(pc >> 2) & (TB_JMP_CACHE_SIZE - 1)`; each slot keeps
/// the pc it was filled for so a collision reads as a miss.
pub struct JumpCache<T: Clone> {
    entries: Box<[Option<(u32, T)>]>,
}

impl<T: Clone> JumpCache<T> {
    pub fn new() -> Self {
        Self {
            entries: vec![None; TB_JMP_CACHE_SIZE].into_boxed_slice(),
        }
    }

    fn index(pc: u32) -> usize {
        (pc as usize >> 2) & (TB_JMP_CACHE_SIZE - 1)
    }

    pub fn lookup(&self, pc: u32) -> Option<&T> {
        match &self.entries[Self::index(pc)] {
            Some((tag, v)) if *tag == pc => Some(v),
            _ => None,
        }
    }

    pub fn insert(&mut self, pc: u32, val: T) {
        self.entries[Self::index(pc)] = Some((pc, val));
    }

    pub fn remove(&mut self, pc: u32) {
        let slot = &mut self.entries[Self::index(pc)];
        if matches!(slot, Some((tag, _)) if *tag == pc) {
            *slot = None;
        }
    }

    pub fn invalidate(&mut self) {
        self.entries.fill(None);
    }
}

impl<T: Clone> Default for JumpCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
