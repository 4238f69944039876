//! Brick geometry: LOD pyramid shape and the global brick index `I`.
//!
//! See spec §3 "Brick" / "LOD pyramid". A brick has side `bs` voxels with an
//! overlap `ov` replicated on each face, so its uniquely-owned inner region
//! has side `bs - 2*ov`. Levels halve the inner volume dimensions (ceiling
//! division) until a level has exactly one brick on every axis; that level
//! is the top of the pyramid and is always the last one in `I`'s ordering.

use serde::{Deserialize, Serialize};

/// Per-level brick layout, dense over the whole pyramid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDesc {
    /// Inner (owned) volume dimensions at this level.
    pub dims: [u32; 3],
    /// Brick grid dimensions at this level.
    pub bricks: [u32; 3],
    /// Sum of brick counts of all finer levels (levels 0..L exclusive of L).
    pub prev_bricks: u64,
}

impl LevelDesc {
    pub fn brick_count(&self) -> u64 {
        self.bricks[0] as u64 * self.bricks[1] as u64 * self.bricks[2] as u64
    }

    pub fn is_top(&self) -> bool {
        self.bricks == [1, 1, 1]
    }
}

fn ceil_div(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

/// Build the dense level table for a volume of dimensions `(w, h, d)` with
/// brick side `bs` and overlap `ov`. The inner (owned) brick side is
/// `bs - 2*ov`. Stops at the first level whose brick grid is `1x1x1`
/// (invariant: the top level always has exactly one brick).
pub fn build_level_table(w: u32, h: u32, d: u32, bs: u32, ov: u32) -> Vec<LevelDesc> {
    assert!(bs > 2 * ov, "brick size must exceed twice the overlap");
    let inner = bs - 2 * ov;

    let mut levels = Vec::new();
    let mut dims = [w.max(1), h.max(1), d.max(1)];
    let mut prev_bricks: u64 = 0;

    loop {
        let bricks = [
            ceil_div(dims[0], inner),
            ceil_div(dims[1], inner),
            ceil_div(dims[2], inner),
        ];
        let level = LevelDesc {
            dims,
            bricks,
            prev_bricks,
        };
        let is_top = level.is_top();
        prev_bricks += level.brick_count();
        levels.push(level);
        if is_top {
            break;
        }
        dims = [
            ceil_div(dims[0], 2).max(1),
            ceil_div(dims[1], 2).max(1),
            ceil_div(dims[2], 2).max(1),
        ];
    }

    levels
}

/// Global, dense, 0-based brick index `I` as defined in spec §3:
/// `I = prevBricks[L] + bx + by*bricksX[L] + bz*bricksX[L]*bricksY[L]`.
pub fn global_index(levels: &[LevelDesc], level: usize, bx: u32, by: u32, bz: u32) -> u64 {
    let l = &levels[level];
    debug_assert!(bx < l.bricks[0] && by < l.bricks[1] && bz < l.bricks[2]);
    l.prev_bricks
        + bx as u64
        + by as u64 * l.bricks[0] as u64
        + bz as u64 * l.bricks[0] as u64 * l.bricks[1] as u64
}

/// Inverse of [`global_index`]: resolve a global brick index to its
/// `(level, bx, by, bz)` coordinates. Returns `None` if `i` is out of range.
pub fn locate(levels: &[LevelDesc], i: u64) -> Option<(usize, u32, u32, u32)> {
    for (li, l) in levels.iter().enumerate() {
        let count = l.brick_count();
        if i < l.prev_bricks + count {
            let local = i - l.prev_bricks;
            let bx = (local % l.bricks[0] as u64) as u32;
            let by = ((local / l.bricks[0] as u64) % l.bricks[1] as u64) as u32;
            let bz = (local / (l.bricks[0] as u64 * l.bricks[1] as u64)) as u32;
            return Some((li, bx, by, bz));
        }
    }
    None
}

/// Total brick count across the whole pyramid.
pub fn total_bricks(levels: &[LevelDesc]) -> u64 {
    levels.last().map(|l| l.prev_bricks + l.brick_count()).unwrap_or(0)
}

/// The (up to 8) child bricks of `(level, bx, by, bz)` at `level - 1`.
/// Returns an empty vec for level 0 (finest, no children).
pub fn children(levels: &[LevelDesc], level: usize, bx: u32, by: u32, bz: u32) -> Vec<(u32, u32, u32)> {
    if level == 0 {
        return Vec::new();
    }
    let child_level = &levels[level - 1];
    let mut out = Vec::with_capacity(8);
    for dz in 0..2u32 {
        for dy in 0..2u32 {
            for dx in 0..2u32 {
                let cx = bx * 2 + dx;
                let cy = by * 2 + dy;
                let cz = bz * 2 + dz;
                if cx < child_level.bricks[0] && cy < child_level.bricks[1] && cz < child_level.bricks[2] {
                    out.push((cx, cy, cz));
                }
            }
        }
    }
    out
}
