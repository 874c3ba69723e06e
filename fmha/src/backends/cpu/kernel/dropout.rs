use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::backends::cpu::error::CpuError;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Softmax dropout stream. Every `(batch, head, row)` draws one byte per key
/// from its own generator, so results do not depend on launch order.
#[derive(Debug, Clone)]
pub(super) struct Dropout {
    seed: u64,
    offset: u64,
    /// Bytes at or below this value keep their key.
    threshold: u8,
    pub rescale: f32,
}

impl Dropout {
    pub fn new(
        p_drop: f32,
        seed: u64,
        offset: u64,
    ) -> Result<Self, CpuError> {
        if !(p_drop > 0.0 && p_drop < 1.0) {
            return Err(CpuError::InvalidDropout(p_drop));
        }
        let keep = 1.0 - p_drop;
        Ok(Self {
            seed,
            offset,
            threshold: (keep * 255.0).floor() as u8,
            rescale: 1.0 / keep,
        })
    }

    fn generator(
        &self,
        batch: usize,
        head: usize,
        row: usize,
    ) -> StdRng {
        let position = ((batch as u64) << 42) ^ ((head as u64) << 24) ^ row as u64;
        let state = self.seed ^ self.offset.wrapping_add(position).wrapping_mul(GOLDEN_GAMMA);
        StdRng::seed_from_u64(state)
    }

    /// Random bytes of one query row, drawn for masked keys too.
    pub fn row_values(
        &self,
        batch: usize,
        head: usize,
        row: usize,
        seqlen_k: usize,
    ) -> Vec<u8> {
        let mut rng = self.generator(batch, head, row);
        (0..seqlen_k).map(|_| rng.random::<u8>()).collect()
    }

    pub fn keeps(
        &self,
        value: u8,
    ) -> bool {
        value <= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_probability() {
        assert_eq!(Dropout::new(0.0, 1, 0).unwrap_err(), CpuError::InvalidDropout(0.0));
        assert_eq!(Dropout::new(1.0, 1, 0).unwrap_err(), CpuError::InvalidDropout(1.0));
        assert!(Dropout::new(0.5, 1, 0).is_ok());
    }

    #[test]
    fn rows_are_reproducible() {
        let dropout = Dropout::new(0.25, 7, 3).unwrap();
        assert_eq!(dropout.row_values(1, 2, 3, 64), dropout.row_values(1, 2, 3, 64));
        assert_ne!(dropout.row_values(1, 2, 3, 64), dropout.row_values(1, 2, 4, 64));
    }

    #[test]
    fn threshold_follows_keep_probability() {
        let dropout = Dropout::new(0.5, 0, 0).unwrap();
        assert!(dropout.keeps(127));
        assert!(!dropout.keeps(128));
        assert_eq!(dropout.rescale, 2.0);
    }
}
