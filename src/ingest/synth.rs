//! Deterministic synthetic volume generators (spec §4.15, §8 scenarios 1-2):
//! `build-synth`'s `L` (linear ramp) and `F` (fractal-ish value noise)
//! patterns, plus a constant-volume generator used by the empty-brick test
//! scenario.

use brickvol_core::accessor::RawVolumeAccessor;
use brickvol_core::error::Result;
use brickvol_core::voxel::ScalarType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SynthPattern {
    /// `(x + y*W + z*W*H) mod 2^(8B)` (spec §8 scenario 1).
    Linear,
    /// Constant-valued volume (spec §8 scenario 2: everything collapses to
    /// background, whole pyramid should classify `EMPTY`/`CHILD_EMPTY`).
    Constant(u64),
    /// Simple deterministic multi-octave value noise.
    Fractal,
}

pub struct SynthAccessor {
    dims: [u32; 3],
    voxel_type: ScalarType,
    pattern: SynthPattern,
}

impl SynthAccessor {
    pub fn new(dims: [u32; 3], voxel_type: ScalarType, pattern: SynthPattern) -> Self {
        SynthAccessor {
            dims,
            voxel_type,
            pattern,
        }
    }

    fn sample(&self, x: u32, y: u32, z: u32) -> u64 {
        let range = self.voxel_type.range_max() + 1;
        match self.pattern {
            SynthPattern::Linear => {
                let [w, h, _] = self.dims;
                (x as u64 + y as u64 * w as u64 + z as u64 * w as u64 * h as u64) % range
            }
            SynthPattern::Constant(v) => v % range,
            SynthPattern::Fractal => fractal_value(x, y, z) % range,
        }
    }
}

/// Deterministic, seedless multi-octave value noise: hashes integer lattice
/// coordinates per octave instead of interpolating, which is enough to
/// exercise non-uniform brick classification without pulling in a real
/// noise crate for the ingest test fixture.
fn fractal_value(x: u32, y: u32, z: u32) -> u64 {
    let mut total: u64 = 0;
    let mut amplitude: u64 = 1 << 16;
    for octave in 0..4u32 {
        let scale = 1u32 << octave;
        let (lx, ly, lz) = (x / scale, y / scale, z / scale);
        total += amplitude * hash3(lx, ly, lz) / u32::MAX as u64;
        amplitude /= 2;
    }
    total
}

fn hash3(x: u32, y: u32, z: u32) -> u64 {
    let mut h = x.wrapping_mul(374761393)
        ^ y.wrapping_mul(668265263)
        ^ z.wrapping_mul(2246822519);
    h = (h ^ (h >> 13)).wrapping_mul(1274126177);
    (h ^ (h >> 16)) as u64
}

impl RawVolumeAccessor for SynthAccessor {
    fn dims(&self) -> [u32; 3] {
        self.dims
    }

    fn voxel_type(&self) -> ScalarType {
        self.voxel_type
    }

    fn read_region(&self, x0: u32, x1: u32, y0: u32, y1: u32, z0: u32, z1: u32) -> Result<Vec<u8>> {
        let b = self.voxel_type.byte_width() as usize;
        let mut out = Vec::with_capacity((x1 - x0) as usize * (y1 - y0) as usize * (z1 - z0) as usize * b);
        let mut scratch = vec![0u8; b];
        for z in z0..z1 {
            for y in y0..y1 {
                for x in x0..x1 {
                    let v = self.sample(x, y, z);
                    self.voxel_type.write_le(v, &mut scratch);
                    out.extend_from_slice(&scratch);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_pattern_matches_closed_form() {
        let acc = SynthAccessor::new([4, 4, 4], ScalarType::U8, SynthPattern::Linear);
        let region = acc.read_region(0, 4, 0, 4, 0, 4).unwrap();
        for z in 0..4u32 {
            for y in 0..4u32 {
                for x in 0..4u32 {
                    let idx = ((z * 4 + y) * 4 + x) as usize;
                    let expected = (x + y * 4 + z * 4 * 4) % 256;
                    assert_eq!(region[idx], expected as u8);
                }
            }
        }
    }

    #[test]
    fn constant_pattern_is_uniform() {
        let acc = SynthAccessor::new([4, 4, 4], ScalarType::U16, SynthPattern::Constant(42));
        let region = acc.read_region(0, 4, 0, 4, 0, 4).unwrap();
        for chunk in region.chunks(2) {
            assert_eq!(u16::from_le_bytes([chunk[0], chunk[1]]), 42);
        }
    }

    #[test]
    fn fractal_pattern_is_deterministic() {
        let acc = SynthAccessor::new([8, 8, 8], ScalarType::U8, SynthPattern::Fractal);
        let a = acc.read_region(0, 8, 0, 8, 0, 8).unwrap();
        let b = acc.read_region(0, 8, 0, 8, 0, 8).unwrap();
        assert_eq!(a, b);
    }
}
