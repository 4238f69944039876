//! Border extension strategies (spec §3 "ExtensionStrategy", §8 boundary
//! behavior at the volume edge).
//!
//! When a brick's overlap region or a downsample filter reaches past the
//! volume's edge, the builder must synthesize a value rather than read out
//! of bounds. The strategy is per-dataset, recorded in metadata, and must be
//! applied identically by every producer.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtensionStrategy {
    /// Out-of-bounds samples read as zero.
    FillZeroes,
    /// Out-of-bounds samples read as the nearest in-bounds voxel.
    Clamp,
    /// Out-of-bounds samples wrap around the volume (modulo each axis).
    Repeat,
}

impl ExtensionStrategy {
    pub fn code(self) -> u8 {
        match self {
            ExtensionStrategy::FillZeroes => 0,
            ExtensionStrategy::Clamp => 1,
            ExtensionStrategy::Repeat => 2,
        }
    }

    pub fn from_code(c: u8) -> Option<Self> {
        match c {
            0 => Some(ExtensionStrategy::FillZeroes),
            1 => Some(ExtensionStrategy::Clamp),
            2 => Some(ExtensionStrategy::Repeat),
            _ => None,
        }
    }

    /// Map a possibly out-of-bounds sample coordinate on one axis to either
    /// an in-bounds source coordinate, or `None` meaning "use zero" (only
    /// possible under `FillZeroes`).
    pub fn resolve_axis(self, coord: i64, len: u32) -> Option<u32> {
        if len == 0 {
            return None;
        }
        if coord >= 0 && (coord as u64) < len as u64 {
            return Some(coord as u32);
        }
        match self {
            ExtensionStrategy::FillZeroes => None,
            ExtensionStrategy::Clamp => Some(coord.clamp(0, len as i64 - 1) as u32),
            ExtensionStrategy::Repeat => {
                let len = len as i64;
                Some((coord.rem_euclid(len)) as u32)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_bounds_is_identity() {
        for s in [
            ExtensionStrategy::FillZeroes,
            ExtensionStrategy::Clamp,
            ExtensionStrategy::Repeat,
        ] {
            assert_eq!(s.resolve_axis(5, 10), Some(5));
        }
    }

    #[test]
    fn fill_zeroes_returns_none_out_of_bounds() {
        assert_eq!(ExtensionStrategy::FillZeroes.resolve_axis(-1, 10), None);
        assert_eq!(ExtensionStrategy::FillZeroes.resolve_axis(10, 10), None);
    }

    #[test]
    fn clamp_saturates_at_edges() {
        assert_eq!(ExtensionStrategy::Clamp.resolve_axis(-5, 10), Some(0));
        assert_eq!(ExtensionStrategy::Clamp.resolve_axis(15, 10), Some(9));
    }

    #[test]
    fn repeat_wraps_modulo_len() {
        assert_eq!(ExtensionStrategy::Repeat.resolve_axis(-1, 10), Some(9));
        assert_eq!(ExtensionStrategy::Repeat.resolve_axis(10, 10), Some(0));
        assert_eq!(ExtensionStrategy::Repeat.resolve_axis(23, 10), Some(3));
    }

    #[test]
    fn code_round_trips() {
        for s in [
            ExtensionStrategy::FillZeroes,
            ExtensionStrategy::Clamp,
            ExtensionStrategy::Repeat,
        ] {
            assert_eq!(ExtensionStrategy::from_code(s.code()), Some(s));
        }
    }
}
