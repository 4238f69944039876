//! Local write-through cache for a remote dataset (spec §4.7, scenario 6):
//! track which bricks of a remote dataset have been fetched, report
//! `localRatio` progress, and materialize a valid C4 file once traversal is
//! complete (or whenever the caller wants to snapshot progress so far).
//!
//! The format gives no way to mark "not yet fetched" distinctly from
//! `EMPTY` mid-build, so unlike the teacher's streaming write-as-you-go
//! chunk files this cache buffers fetched payloads in memory and only
//! produces an on-disk container when `finalize` is called.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use brickvol_core::error::Result;
use brickvol_core::format::{Reader, Writer};
use brickvol_core::meta::{BrickRow, DatasetMetadata, Emptiness};

/// Tracks which bricks of a dataset have been fetched, and exposes the
/// fraction of `NORMAL` bricks present (`localRatio`).
pub struct LocalCache {
    path: PathBuf,
    metadata: DatasetMetadata,
    payloads: Vec<Option<Vec<u8>>>,
    present: Vec<bool>,
    normal_total: u64,
    normal_present: AtomicU64,
}

impl LocalCache {
    /// Start (or resume, trusting a previously-finalized file with a
    /// matching `uniqueID`) a local cache for `metadata` at `path`.
    pub fn create(path: &Path, metadata: DatasetMetadata) -> Result<Self> {
        let normal_total = metadata
            .bricks
            .iter()
            .filter(|b| b.emptiness == Emptiness::Normal)
            .count() as u64;

        if let Ok(existing) = Reader::open(path) {
            if existing.metadata().unique_id == metadata.unique_id {
                let bricks = &existing.metadata().bricks;
                let mut payloads = vec![None; bricks.len()];
                let mut present = vec![false; bricks.len()];
                let mut normal_present = 0u64;
                for (i, row) in bricks.iter().enumerate() {
                    if row.emptiness != Emptiness::Normal {
                        continue;
                    }
                    let mut raw = Vec::new();
                    existing.raw_brick(i as u64, &mut raw)?;
                    if !raw.is_empty() {
                        payloads[i] = Some(raw);
                        present[i] = true;
                        normal_present += 1;
                    }
                }
                return Ok(LocalCache {
                    path: path.to_path_buf(),
                    metadata: existing.metadata().clone(),
                    payloads,
                    present,
                    normal_total,
                    normal_present: AtomicU64::new(normal_present),
                });
            }
        }

        let count = metadata.bricks.len();
        Ok(LocalCache {
            path: path.to_path_buf(),
            metadata,
            payloads: vec![None; count],
            present: vec![false; count],
            normal_total,
            normal_present: AtomicU64::new(0),
        })
    }

    pub fn local_ratio(&self) -> f64 {
        if self.normal_total == 0 {
            return 1.0;
        }
        self.normal_present.load(Ordering::Relaxed) as f64 / self.normal_total as f64
    }

    pub fn is_present(&self, i: u64) -> bool {
        self.present.get(i as usize).copied().unwrap_or(false)
    }

    /// The fetched payload for brick `i`, if present.
    pub fn payload(&self, i: u64) -> Option<&[u8]> {
        self.payloads.get(i as usize).and_then(|p| p.as_deref())
    }

    /// Record a fetched brick's already-encoded payload (the same bytes a
    /// `Reader::raw_brick` would hand back).
    pub fn mark_present(&mut self, i: u64, payload: Vec<u8>) {
        let idx = i as usize;
        let Some(row) = self.metadata.bricks.get(idx) else { return };
        if row.emptiness != Emptiness::Normal {
            return;
        }
        if let (Some(p), Some(slot)) = (self.present.get_mut(idx), self.payloads.get_mut(idx)) {
            if !*p {
                self.normal_present.fetch_add(1, Ordering::Relaxed);
            }
            *p = true;
            *slot = Some(payload);
        }
    }

    /// Write the bricks gathered so far to `path` as a valid C4 container.
    /// Bricks not yet fetched are written as zero-size payloads, so calling
    /// this before full traversal produces a file that looks `EMPTY` for
    /// everything still missing; scenario 6 only requires correctness after
    /// the full traversal completes.
    pub fn finalize(&self) -> Result<()> {
        let header_hint = self.metadata.encode().len() as u64 + 64;
        let (mut writer, tmp) = Writer::create(&self.path, header_hint)?;

        let mut bricks = Vec::with_capacity(self.metadata.bricks.len());
        for (i, row) in self.metadata.bricks.iter().enumerate() {
            let payload = self.payloads[i].as_deref().unwrap_or(&[]);
            let (offset, size) = writer.append_brick(payload)?;
            bricks.push(BrickRow {
                offset,
                size,
                emptiness: row.emptiness,
                checksum: row.checksum,
            });
        }

        let mut meta = self.metadata.clone();
        meta.bricks = bricks;
        writer.finish(tmp, &self.path, meta)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickvol_core::codec::CodecTag;
    use brickvol_core::extension::ExtensionStrategy;
    use brickvol_core::geometry::build_level_table;
    use brickvol_core::voxel::ScalarType;

    fn sample_metadata() -> DatasetMetadata {
        let levels = build_level_table(8, 8, 8, 64, 2);
        DatasetMetadata {
            dims: [8, 8, 8],
            voxel_type: ScalarType::U8,
            brick_size: 64,
            overlap: 2,
            extension: ExtensionStrategy::FillZeroes,
            codec: CodecTag::Lz4,
            background: 0,
            levels,
            bricks: vec![
                BrickRow {
                    offset: 0,
                    size: 0,
                    emptiness: Emptiness::Normal,
                    checksum: 0,
                },
                BrickRow {
                    offset: 0,
                    size: 0,
                    emptiness: Emptiness::Empty,
                    checksum: 0,
                },
            ],
            unique_id: [0; 16],
        }
    }

    #[test]
    fn fresh_cache_has_zero_local_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::create(&dir.path().join("c.bvf"), sample_metadata()).unwrap();
        assert_eq!(cache.local_ratio(), 0.0);
        assert!(!cache.is_present(0));
    }

    #[test]
    fn marking_normal_brick_present_updates_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = LocalCache::create(&dir.path().join("c.bvf"), sample_metadata()).unwrap();
        cache.mark_present(0, vec![1, 2, 3, 4]);
        assert_eq!(cache.local_ratio(), 1.0);
        assert!(cache.is_present(0));
    }

    #[test]
    fn empty_bricks_do_not_count_toward_normal_total() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::create(&dir.path().join("c.bvf"), sample_metadata()).unwrap();
        assert_eq!(cache.normal_total, 1);
    }

    #[test]
    fn finalize_writes_a_valid_file_with_fetched_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.bvf");
        let mut cache = LocalCache::create(&path, sample_metadata()).unwrap();
        cache.mark_present(0, vec![9; 64]);
        cache.finalize().unwrap();

        let reader = Reader::open(&path).unwrap();
        let mut payload = Vec::new();
        reader.raw_brick(0, &mut payload).unwrap();
        assert_eq!(payload, vec![9; 64]);
    }

    #[test]
    fn reopening_a_finalized_cache_restores_present_bricks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.bvf");
        let mut cache = LocalCache::create(&path, sample_metadata()).unwrap();
        cache.mark_present(0, vec![5; 64]);
        cache.finalize().unwrap();

        let reopened = LocalCache::create(&path, sample_metadata()).unwrap();
        assert!(reopened.is_present(0));
        assert_eq!(reopened.local_ratio(), 1.0);
    }
}
