//! Brick Cache / Volume Atlas Manager (spec §4.8): LRU residency over a
//! fixed slot count, admission/eviction driven by the miss hashtable,
//! emptiness short-circuiting, and transfer-function re-evaluation.
//!
//! Slot/LRU bookkeeping follows the teacher's `BrickPool` (`brick_pool.rs`):
//! a dense slot array plus a `brick -> slot` map and a frame counter used
//! for least-recently-used eviction instead of a real linked list.

use std::collections::HashMap;
use std::sync::Arc;

use brickvol_core::error::{Error, Result};
use brickvol_core::meta::Emptiness;
use brickvol_net::dataset::Dataset;

use super::hashtable::MissHashTable;
use super::meta_buffer::{BrickMetaBuffer, CHILD_EMPTY, EMPTY, MISSING};
use super::texture::AtlasTexture;
use crate::config::AtlasConfig;

#[derive(Clone, Copy, Debug)]
struct Slot {
    brick_index: Option<u64>,
    last_touch: u64,
}

/// One pending admission, coarsest LOD first (spec §4.8 step 2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Admission {
    pub brick_index: u64,
    pub level: usize,
}

/// Result of [`AtlasManager::admit`]: the slot the brick now lives in and
/// its decoded payload, ready for [`AtlasTexture::upload_brick`]. Mirrors
/// the teacher's `BrickPool`, which also separates `allocate_slot` from
/// `upload_brick` so the manager itself never needs to own GPU resources.
pub struct Admitted {
    pub slot_id: u32,
    pub payload: Vec<u8>,
}

pub struct AtlasManager {
    dataset: Arc<dyn Dataset>,
    slots: Vec<Slot>,
    residency: HashMap<u64, u32>,
    free_slots: Vec<u32>,
    brick_meta: BrickMetaBuffer,
    hashtable: MissHashTable,
    frame: u64,
    pinned_this_frame: std::collections::HashSet<u64>,
    tf_empty_override: std::collections::HashSet<u64>,
    config: AtlasConfig,
}

impl AtlasManager {
    pub fn new(dataset: Arc<dyn Dataset>, config: AtlasConfig, slot_count: u32, hashtable_size: u32) -> Self {
        let brick_count = dataset
            .metadata()
            .levels
            .last()
            .map(|l| l.prev_bricks + l.brick_count())
            .unwrap_or(0);

        let mut brick_meta = BrickMetaBuffer::new(brick_count);
        for (i, row) in dataset.metadata().bricks.iter().enumerate() {
            match row.emptiness {
                Emptiness::Empty => brick_meta.set_emptiness(i as u64, EMPTY),
                Emptiness::ChildEmpty => brick_meta.set_emptiness(i as u64, CHILD_EMPTY),
                Emptiness::Normal => {}
            }
        }

        AtlasManager {
            dataset,
            slots: vec![
                Slot {
                    brick_index: None,
                    last_touch: 0,
                };
                slot_count as usize
            ],
            residency: HashMap::new(),
            free_slots: (0..slot_count).collect(),
            brick_meta,
            hashtable: MissHashTable::new(hashtable_size, config.max_probing_attempts),
            frame: 0,
            pinned_this_frame: std::collections::HashSet::new(),
            tf_empty_override: std::collections::HashSet::new(),
            config,
        }
    }

    pub fn brick_meta(&self) -> &BrickMetaBuffer {
        &self.brick_meta
    }

    /// Begin a frame: bump the frame counter, clear per-frame pins, zero
    /// the miss hashtable (spec §4.8: "zeroed before each frame").
    pub fn begin_frame(&mut self) {
        self.frame += 1;
        self.pinned_this_frame.clear();
        self.hashtable.clear();
    }

    /// Shader-side equivalent: record that brick `i` was sampled and
    /// missing this frame.
    pub fn report_miss(&mut self, brick_index: u64) {
        self.hashtable.insert(brick_index as u32);
    }

    /// Pin a brick for the current frame so it can't be evicted mid-frame.
    pub fn pin(&mut self, brick_index: u64) {
        self.pinned_this_frame.insert(brick_index);
        if let Some(&slot) = self.residency.get(&brick_index) {
            self.slots[slot as usize].last_touch = self.frame;
        }
    }

    /// Step 2-3 of §4.8: read the hashtable back, dedup, sort coarsest LOD
    /// first, and build the admission worklist, skipping bricks that are
    /// EMPTY/CHILD_EMPTY or already resident.
    pub fn collect_admissions(&self) -> Vec<Admission> {
        let levels = &self.dataset.metadata().levels;
        let mut admissions: Vec<Admission> = self
            .hashtable
            .readback()
            .into_iter()
            .map(|i| i as u64)
            .filter(|&i| !self.residency.contains_key(&i))
            .filter(|&i| !self.is_empty_like(i))
            .filter_map(|i| level_of(levels, i).map(|level| Admission { brick_index: i, level }))
            .collect();
        admissions.sort_by(|a, b| b.level.cmp(&a.level));
        admissions
    }

    fn is_empty_like(&self, i: u64) -> bool {
        if self.tf_empty_override.contains(&i) {
            return true;
        }
        matches!(
            self.dataset.metadata().bricks.get(i as usize).map(|b| b.emptiness),
            Some(Emptiness::Empty) | Some(Emptiness::ChildEmpty)
        )
    }

    /// Admit one brick: fetch + decompress via the dataset, allocate (or
    /// evict into) a slot, mark `BrickMeta`, mark MRU. Returns the slot id
    /// and the decoded payload so the caller can upload it to the atlas
    /// texture (step 4 of §4.8); the manager itself holds no GPU resources,
    /// matching the teacher's `BrickPool::allocate_slot`. Callers with a
    /// `wgpu::Queue` and `AtlasTexture` in hand should prefer
    /// [`AtlasManager::admit_and_upload`], which does both in one call.
    pub fn admit(&mut self, brick_index: u64) -> Result<Admitted> {
        if self.is_empty_like(brick_index) {
            self.brick_meta.set_emptiness(brick_index, EMPTY);
            return Err(Error::Resource(format!("brick {brick_index} is empty, not admissible")));
        }

        let mut payload = Vec::new();
        self.dataset.brick(brick_index, &mut payload)?;

        let slot_id = self.allocate_slot(brick_index)?;
        self.brick_meta.set_resident(brick_index, slot_id);
        Ok(Admitted { slot_id, payload })
    }

    /// [`AtlasManager::admit`] followed by the actual GPU upload, returning
    /// just the slot id for the common case where the caller doesn't need
    /// the raw bytes back.
    pub fn admit_and_upload(&mut self, brick_index: u64, texture: &AtlasTexture, queue: &wgpu::Queue) -> Result<u32> {
        let admitted = self.admit(brick_index)?;
        texture.upload_brick(queue, admitted.slot_id, &admitted.payload);
        Ok(admitted.slot_id)
    }

    fn allocate_slot(&mut self, brick_index: u64) -> Result<u32> {
        if let Some(&slot) = self.residency.get(&brick_index) {
            self.slots[slot as usize].last_touch = self.frame;
            return Ok(slot);
        }

        let slot_id = if let Some(free) = self.free_slots.pop() {
            free
        } else {
            self.evict_lru()
                .ok_or_else(|| Error::Resource("atlas full, no evictable slot for admission".into()))?
        };

        self.slots[slot_id as usize] = Slot {
            brick_index: Some(brick_index),
            last_touch: self.frame,
        };
        self.residency.insert(brick_index, slot_id);
        Ok(slot_id)
    }

    /// Strict LRU eviction, skipping slots pinned for the current frame.
    /// Coarser LOD bricks get a bounded rank bonus against thrashing.
    fn evict_lru(&mut self) -> Option<u32> {
        let levels = &self.dataset.metadata().levels;
        let mut best: Option<(u32, i64)> = None;

        for (idx, slot) in self.slots.iter().enumerate() {
            let Some(brick_index) = slot.brick_index else { continue };
            if self.pinned_this_frame.contains(&brick_index) {
                continue;
            }
            let bonus = level_of(levels, brick_index).map(|l| l as i64 * LOD_RANK_BONUS).unwrap_or(0);
            let rank = slot.last_touch as i64 + bonus;
            if best.map(|(_, r)| rank < r).unwrap_or(true) {
                best = Some((idx as u32, rank));
            }
        }

        let (slot_idx, _) = best?;
        let evicted = self.slots[slot_idx as usize].brick_index.take()?;
        self.residency.remove(&evicted);
        self.brick_meta.set_missing(evicted);
        self.free_slots.push(slot_idx);
        Some(slot_idx)
    }

    /// Evict a specific brick, e.g. on background-loader cancellation after
    /// the owning brick was already admitted then superseded.
    pub fn evict(&mut self, brick_index: u64) {
        if let Some(slot_id) = self.residency.remove(&brick_index) {
            self.slots[slot_id as usize].brick_index = None;
            self.free_slots.push(slot_id);
            self.brick_meta.set_missing(brick_index);
        }
    }

    /// Clear all slots, reset BrickMeta to MISSING, preserve level table
    /// (spec §4.8 "Purge").
    pub fn purge(&mut self) {
        for slot in &mut self.slots {
            slot.brick_index = None;
        }
        self.free_slots = (0..self.slots.len() as u32).collect();
        self.residency.clear();
        self.brick_meta.reset_all_missing();
        for (i, row) in self.dataset.metadata().bricks.iter().enumerate() {
            match row.emptiness {
                Emptiness::Empty => self.brick_meta.set_emptiness(i as u64, EMPTY),
                Emptiness::ChildEmpty => self.brick_meta.set_emptiness(i as u64, CHILD_EMPTY),
                Emptiness::Normal => {}
            }
        }
    }

    /// Recompute which NORMAL bricks classify as empty under a new transfer
    /// function (spec §8 scenario 5). Bricks newly empty under TF are
    /// released from their slot and flagged EMPTY within this call, rather
    /// than the shader's next post-frame pass. Bricks no longer empty under
    /// TF are reset to MISSING so the shader re-queries them.
    pub fn reevaluate_emptiness_under_tf(&mut self, empty_under_tf: impl Fn(u64) -> bool) {
        let mut new_override = std::collections::HashSet::new();
        for (i, row) in self.dataset.metadata().bricks.iter().enumerate() {
            if row.emptiness == Emptiness::Normal && empty_under_tf(i as u64) {
                new_override.insert(i as u64);
            }
        }

        for &i in &new_override {
            if !self.tf_empty_override.contains(&i) {
                self.evict(i);
                self.brick_meta.set_emptiness(i, EMPTY);
            }
        }

        for &i in &self.tf_empty_override {
            if !new_override.contains(&i) && !self.residency.contains_key(&i) {
                self.brick_meta.set_missing(i);
            }
        }

        self.tf_empty_override = new_override;
    }

    pub fn is_resident(&self, brick_index: u64) -> bool {
        self.residency.contains_key(&brick_index)
    }

    pub fn occupied_slot_count(&self) -> usize {
        self.residency.len()
    }
}

const LOD_RANK_BONUS: i64 = 1_000_000;

fn level_of(levels: &[brickvol_core::geometry::LevelDesc], brick_index: u64) -> Option<usize> {
    brickvol_core::geometry::locate(levels, brick_index).map(|(level, ..)| level)
}
