//! Container reader: mmaps the file and serves `rawBrick`/`brick` lookups
//! in O(1) plus one read, shareable across concurrent callers (spec §4.4).

use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use super::{MAGIC, VERSION};
use crate::codec::codec_for_tag;
use crate::error::{Error, Result};
use crate::meta::{compute_unique_id, read_framed, DatasetMetadata, Emptiness};

/// An opened bricked volume file. Cheap to clone (`Arc`-backed mmap); safe
/// to share across threads and issue concurrent brick reads on.
#[derive(Clone)]
pub struct Reader {
    mmap: Arc<Mmap>,
    metadata: Arc<DatasetMetadata>,
}

impl Reader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        if mmap.len() < 16 {
            return Err(Error::Corrupt("file shorter than container preamble".into()));
        }
        if &mmap[0..8] != MAGIC {
            return Err(Error::Format("bad magic".into()));
        }
        let version = u32::from_le_bytes(mmap[8..12].try_into().unwrap());
        if version != VERSION {
            return Err(Error::Format(format!("unsupported container version {version}")));
        }
        let header_len = u32::from_le_bytes(mmap[12..16].try_into().unwrap()) as usize;
        if mmap.len() < 16 + header_len {
            return Err(Error::Corrupt("header_len exceeds file size".into()));
        }

        let mut header_cursor = std::io::Cursor::new(&mmap[16..16 + header_len]);
        let blob = read_framed(&mut header_cursor)?;
        let unique_id = compute_unique_id(&blob);
        let metadata = DatasetMetadata::decode(&blob, unique_id)?;
        log::debug!(
            "opened {} ({} bricks across {} levels)",
            path.display(),
            metadata.bricks.len(),
            metadata.levels.len()
        );

        Ok(Reader {
            mmap: Arc::new(mmap),
            metadata: Arc::new(metadata),
        })
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    /// Write the on-disk (possibly compressed) bytes of brick `i` into
    /// `buf`, resizing it to exactly `brickTable[i].size`.
    pub fn raw_brick(&self, i: u64, buf: &mut Vec<u8>) -> Result<()> {
        let row = self
            .metadata
            .bricks
            .get(i as usize)
            .ok_or_else(|| Error::Format(format!("brick index {i} out of range")))?;
        let start = row.offset as usize;
        let end = start + row.size as usize;
        if end > self.mmap.len() {
            return Err(Error::Corrupt(format!("brick {i} offset/size exceeds file bounds")));
        }
        buf.clear();
        buf.extend_from_slice(&self.mmap[start..end]);
        Ok(())
    }

    /// Write the decompressed voxel payload of brick `i` into `buf`. For
    /// EMPTY/CHILD_EMPTY bricks, fills `buf` with the dataset's stored
    /// background value rather than reading zero stored bytes -- the
    /// background is the dataset-wide minimum (spec §4.5 default) and is
    /// frequently nonzero, so a plain zero-fill would not byte-match the
    /// source region.
    pub fn brick(&self, i: u64, buf: &mut Vec<u8>) -> Result<()> {
        let row = *self
            .metadata
            .bricks
            .get(i as usize)
            .ok_or_else(|| Error::Format(format!("brick index {i} out of range")))?;

        let expected_len = self.metadata.brick_size.pow(3) as usize * self.metadata.voxel_type.byte_width() as usize;

        match row.emptiness {
            Emptiness::Empty | Emptiness::ChildEmpty => {
                buf.clear();
                buf.resize(expected_len, 0);
                let b = self.metadata.voxel_type.byte_width() as usize;
                for chunk in buf.chunks_mut(b) {
                    self.metadata.voxel_type.write_le(self.metadata.background, chunk);
                }
                Ok(())
            }
            Emptiness::Normal => {
                let mut raw = Vec::new();
                self.raw_brick(i, &mut raw)?;
                let codec = codec_for_tag(self.metadata.codec);
                let decoded = codec.decode(&raw, expected_len)?;
                *buf = decoded;
                Ok(())
            }
        }
    }
}
