//! Reproducible random register files.

use ppujit_guest::cpu::{fpscr, vscr, xer};
use ppujit_guest::CpuState;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Values that tend to sit on arithmetic edges.
const EDGE_VALUES: [u64; 12] = [
    0,
    1,
    2,
    0x7F,
    0x80,
    0xFFFF,
    0x7FFF_FFFF,
    0x8000_0000,
    0xFFFF_FFFF,
    0x7FFF_FFFF_FFFF_FFFF,
    0x8000_0000_0000_0000,
    u64::MAX,
];

/// Doubles with interesting bit patterns (zeros, infinities, NaN,
/// denormal, one).
const FP_EDGE: [u64; 7] = [
    0,
    0x8000_0000_0000_0000,
    0x7FF0_0000_0000_0000,
    0xFFF0_0000_0000_0000,
    0x7FF8_0000_0000_0000,
    0x0000_0000_0000_0001,
    0x3FF0_0000_0000_0000,
];

/// Fixed-seed generator of `CpuState` snapshots.
pub struct StateGen {
    rng: ChaCha8Rng,
}

impl StateGen {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    fn gpr_value(&mut self) -> u64 {
        match self.rng.gen_range(0..8u32) {
            0 | 1 => EDGE_VALUES[self.rng.gen_range(0..EDGE_VALUES.len())],
            2 => self.rng.gen_range(0..0x100),
            3 => (self.rng.gen::<i16>() as i64) as u64,
            4 => self.rng.gen::<u32>() as u64,
            _ => self.rng.gen(),
        }
    }

    fn fpr_value(&mut self) -> u64 {
        if self.rng.gen_ratio(1, 6) {
            FP_EDGE[self.rng.gen_range(0..FP_EDGE.len())]
        } else {
            self.rng.gen::<f64>().to_bits() ^ ((self.rng.gen::<bool>() as u64) << 63)
        }
    }

    fn vr_value(&mut self) -> u128 {
        match self.rng.gen_range(0..6u32) {
            0 => 0,
            1 => u128::MAX,
            2 => {
                // Every byte on a lane-size edge.
                let b = [0x00u8, 0x7F, 0x80, 0xFF][self.rng.gen_range(0..4)];
                u128::from_ne_bytes([b; 16])
            }
            _ => self.rng.gen(),
        }
    }

    /// Next random state. `pc` is left for the caller to place.
    pub fn next_state(&mut self) -> CpuState {
        let mut s = CpuState::new();
        for i in 0..32 {
            s.gpr[i] = self.gpr_value();
            s.fpr[i] = self.fpr_value();
            s.vr[i] = self.vr_value();
        }
        s.lr = self.gpr_value();
        s.ctr = match self.rng.gen_range(0..4u32) {
            0 => 0,
            1 => 1,
            _ => self.gpr_value(),
        };
        s.xer = self.rng.gen::<u64>() & xer::MASK;
        s.cr = self.rng.gen();
        s.fpscr = self.rng.gen::<u32>() & fpscr::MASK;
        s.vscr = self.rng.gen::<u32>() & (vscr::SAT | vscr::NJ);
        s.vrsave = self.rng.gen();
        for g in &mut s.sprg {
            *g = self.rng.gen();
        }
        s
    }

    /// Random bytes for the scratch data window.
    pub fn fill(&mut self, buf: &mut [u8]) {
        self.rng.fill(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_states() {
        let mut a = StateGen::new(7);
        let mut b = StateGen::new(7);
        for _ in 0..16 {
            assert_eq!(a.next_state(), b.next_state());
        }
    }

    #[test]
    fn fpscr_is_randomized_within_defined_bits() {
        let mut g = StateGen::new(3);
        let values: Vec<u32> = (0..64).map(|_| g.next_state().fpscr).collect();
        assert!(values.iter().all(|v| v & !fpscr::MASK == 0));
        assert!(values.iter().any(|&v| v != values[0]));
        assert!(values.iter().any(|&v| v != 0));
    }

    #[test]
    fn xer_stays_in_mask() {
        let mut g = StateGen::new(1);
        for _ in 0..64 {
            assert_eq!(g.next_state().xer & !xer::MASK, 0);
        }
    }
}
