//! Distance-to-LOD mapping and the background loader's load priority.
//! Both are driven by the same screen-space error budget the atlas config
//! exposes, keeping eye-distance arithmetic out of the manager itself.

use glam::Vec3;

/// `log2(LOD_FACTOR * dist / LEVEL_ZERO_WORLD_SPACE_ERROR)`, clamped to
/// `[0, level_count - 1]`. Preserved exactly per the spec's open question:
/// this is the original mapping, not a bug to be "fixed".
pub fn lod_for_distance(dist: f32, level_zero_world_space_error: f32, lod_factor: f32, level_count: usize) -> usize {
    if level_count <= 1 || dist <= 0.0 {
        return 0;
    }
    let raw = (lod_factor * dist / level_zero_world_space_error).log2();
    if !raw.is_finite() {
        return 0;
    }
    raw.max(0.0).min((level_count - 1) as f32) as usize
}

/// Higher priority for coarser LOD and for bricks closer to the eye,
/// matching the admission order spec §4.9 requires ("coarser LOD first;
/// ties broken by LRU age of the requester frame"): the coarse-first term
/// dominates, distance only orders within the same level.
pub fn load_priority(brick_center: Vec3, eye: Vec3, level: usize, level_count: usize) -> f32 {
    let coarseness = (level_count.saturating_sub(level + 1)) as f32;
    let dist = brick_center.distance(eye).max(1.0);
    coarseness * 1_000.0 - dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_maps_to_finest_level() {
        assert_eq!(lod_for_distance(0.0, 1.0, 1.0, 8), 0);
    }

    #[test]
    fn far_distance_clamps_to_coarsest_level() {
        let lod = lod_for_distance(1_000_000.0, 1.0, 1.0, 8);
        assert_eq!(lod, 7);
    }

    #[test]
    fn single_level_pyramid_is_always_level_zero() {
        assert_eq!(lod_for_distance(500.0, 1.0, 1.0, 1), 0);
    }

    #[test]
    fn coarser_level_always_outranks_finer_regardless_of_distance() {
        let near_fine = load_priority(Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO, 0, 8);
        let far_coarse = load_priority(Vec3::new(10_000.0, 0.0, 0.0), Vec3::ZERO, 7, 8);
        assert!(far_coarse > near_fine);
    }

    #[test]
    fn within_a_level_closer_bricks_rank_higher() {
        let near = load_priority(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO, 2, 8);
        let far = load_priority(Vec3::new(100.0, 0.0, 0.0), Vec3::ZERO, 2, 8);
        assert!(near > far);
    }
}
