//! Metadata blob (spec §4.3): a length-prefixed, endian-normalized key/value
//! header followed by densely packed level and brick tables. All integers
//! are little-endian on disk regardless of host endianness.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::codec::CodecTag;
use crate::error::{Error, Result};
use crate::extension::ExtensionStrategy;
use crate::geometry::LevelDesc;
use crate::voxel::ScalarType;

/// One row of the dense brick table (spec §4.3 `brickTable`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrickRow {
    pub offset: u64,
    pub size: u64,
    pub emptiness: Emptiness,
    pub checksum: u32,
}

/// Brick classification produced by the builder's bottom-up pass
/// (spec §4.5, §3 "Emptiness").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Emptiness {
    Normal = 0,
    Empty = 1,
    ChildEmpty = 2,
}

impl Emptiness {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(c: u8) -> Result<Self> {
        match c {
            0 => Ok(Emptiness::Normal),
            1 => Ok(Emptiness::Empty),
            2 => Ok(Emptiness::ChildEmpty),
            other => Err(Error::Format(format!("unknown emptiness code {other}"))),
        }
    }
}

/// Full dataset metadata: header fields plus the packed level/brick tables.
/// This is the structure hashed into the content-stable `unique_id`.
#[derive(Clone, Debug)]
pub struct DatasetMetadata {
    pub dims: [u32; 3],
    pub voxel_type: ScalarType,
    pub brick_size: u32,
    pub overlap: u32,
    pub extension: ExtensionStrategy,
    pub codec: CodecTag,
    /// The value `Reader::brick` fills EMPTY/CHILD_EMPTY bricks with
    /// (spec §4.5 default: the dataset-wide minimum), stored as a widened
    /// `u64` and narrowed back to `voxel_type`'s width on read.
    pub background: u64,
    pub levels: Vec<LevelDesc>,
    pub bricks: Vec<BrickRow>,
    pub unique_id: [u8; 16],
}

impl DatasetMetadata {
    /// Serialize to the on-disk metadata blob format, excluding `unique_id`
    /// (computed separately and stored as its own key so content hashing is
    /// well-defined: the id is a hash *of* this blob, not included in it).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(self.dims[0]).unwrap();
        buf.write_u32::<LittleEndian>(self.dims[1]).unwrap();
        buf.write_u32::<LittleEndian>(self.dims[2]).unwrap();
        buf.write_u8(self.voxel_type.code()).unwrap();
        buf.write_u32::<LittleEndian>(self.brick_size).unwrap();
        buf.write_u32::<LittleEndian>(self.overlap).unwrap();
        buf.write_u8(self.extension.code()).unwrap();
        buf.write_u8(self.codec.code()).unwrap();
        buf.write_u64::<LittleEndian>(self.background).unwrap();

        buf.write_u32::<LittleEndian>(self.levels.len() as u32).unwrap();
        for l in &self.levels {
            buf.write_u32::<LittleEndian>(l.dims[0]).unwrap();
            buf.write_u32::<LittleEndian>(l.dims[1]).unwrap();
            buf.write_u32::<LittleEndian>(l.dims[2]).unwrap();
            buf.write_u32::<LittleEndian>(l.bricks[0]).unwrap();
            buf.write_u32::<LittleEndian>(l.bricks[1]).unwrap();
            buf.write_u32::<LittleEndian>(l.bricks[2]).unwrap();
            buf.write_u64::<LittleEndian>(l.prev_bricks).unwrap();
        }

        buf.write_u64::<LittleEndian>(self.bricks.len() as u64).unwrap();
        for b in &self.bricks {
            buf.write_u64::<LittleEndian>(b.offset).unwrap();
            buf.write_u64::<LittleEndian>(b.size).unwrap();
            buf.write_u8(b.emptiness.code()).unwrap();
            buf.write_u32::<LittleEndian>(b.checksum).unwrap();
        }

        buf
    }

    /// Parse a metadata blob produced by [`encode`]. `unique_id` is computed
    /// by the caller (the format reader hashes the raw bytes) and supplied
    /// here rather than re-derived, so this function stays pure.
    pub fn decode(bytes: &[u8], unique_id: [u8; 16]) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let err = |e: std::io::Error| Error::Corrupt(format!("truncated metadata blob: {e}"));

        let dims = [
            cur.read_u32::<LittleEndian>().map_err(err)?,
            cur.read_u32::<LittleEndian>().map_err(err)?,
            cur.read_u32::<LittleEndian>().map_err(err)?,
        ];
        let voxel_type = ScalarType::from_code(cur.read_u8().map_err(err)?)?;
        let brick_size = cur.read_u32::<LittleEndian>().map_err(err)?;
        let overlap = cur.read_u32::<LittleEndian>().map_err(err)?;
        let extension = ExtensionStrategy::from_code(cur.read_u8().map_err(err)?)
            .ok_or_else(|| Error::Format("unknown extension strategy code".into()))?;
        let codec = CodecTag::from_u8(cur.read_u8().map_err(err)?)?;
        let background = cur.read_u64::<LittleEndian>().map_err(err)?;

        let level_count = cur.read_u32::<LittleEndian>().map_err(err)? as usize;
        let mut levels = Vec::with_capacity(level_count);
        for _ in 0..level_count {
            let level_dims = [
                cur.read_u32::<LittleEndian>().map_err(err)?,
                cur.read_u32::<LittleEndian>().map_err(err)?,
                cur.read_u32::<LittleEndian>().map_err(err)?,
            ];
            let bricks = [
                cur.read_u32::<LittleEndian>().map_err(err)?,
                cur.read_u32::<LittleEndian>().map_err(err)?,
                cur.read_u32::<LittleEndian>().map_err(err)?,
            ];
            let prev_bricks = cur.read_u64::<LittleEndian>().map_err(err)?;
            levels.push(LevelDesc {
                dims: level_dims,
                bricks,
                prev_bricks,
            });
        }

        let brick_count = cur.read_u64::<LittleEndian>().map_err(err)? as usize;
        let mut bricks = Vec::with_capacity(brick_count);
        for _ in 0..brick_count {
            let offset = cur.read_u64::<LittleEndian>().map_err(err)?;
            let size = cur.read_u64::<LittleEndian>().map_err(err)?;
            let emptiness = Emptiness::from_code(cur.read_u8().map_err(err)?)?;
            let checksum = cur.read_u32::<LittleEndian>().map_err(err)?;
            bricks.push(BrickRow {
                offset,
                size,
                emptiness,
                checksum,
            });
        }

        Ok(DatasetMetadata {
            dims,
            voxel_type,
            brick_size,
            overlap,
            extension,
            codec,
            background,
            levels,
            bricks,
            unique_id,
        })
    }
}

/// Content-stable 128-bit identifier (spec §4.3 `uniqueID`): an md5 digest
/// of the encoded metadata blob. Two datasets built from the same source
/// with the same layout parameters hash identically.
pub fn compute_unique_id(encoded_metadata: &[u8]) -> [u8; 16] {
    md5::compute(encoded_metadata).0
}

/// Write a length-prefixed framing around an already-encoded blob, used by
/// the container writer to embed the metadata blob in the file header.
pub fn write_framed(out: &mut impl Write, blob: &[u8]) -> Result<()> {
    out.write_u64::<LittleEndian>(blob.len() as u64)?;
    out.write_all(blob)?;
    Ok(())
}

/// Read back a length-prefixed blob written by [`write_framed`].
pub fn read_framed(input: &mut impl Read) -> Result<Vec<u8>> {
    let len = input.read_u64::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::build_level_table;

    fn sample_meta() -> DatasetMetadata {
        let levels = build_level_table(130, 130, 130, 64, 2);
        let total = levels.last().map(|l| l.prev_bricks + l.brick_count()).unwrap();
        let bricks = (0..total)
            .map(|i| BrickRow {
                offset: i * 1000,
                size: 999,
                emptiness: if i % 7 == 0 { Emptiness::Empty } else { Emptiness::Normal },
                checksum: i as u32,
            })
            .collect();
        DatasetMetadata {
            dims: [130, 130, 130],
            voxel_type: ScalarType::U16,
            brick_size: 64,
            overlap: 2,
            extension: ExtensionStrategy::Clamp,
            codec: CodecTag::Lz4,
            background: 3,
            levels,
            bricks,
            unique_id: [0; 16],
        }
    }

    #[test]
    fn encode_decode_round_trips() {
        let meta = sample_meta();
        let blob = meta.encode();
        let decoded = DatasetMetadata::decode(&blob, [0; 16]).unwrap();
        assert_eq!(decoded.dims, meta.dims);
        assert_eq!(decoded.voxel_type, meta.voxel_type);
        assert_eq!(decoded.levels.len(), meta.levels.len());
        assert_eq!(decoded.bricks.len(), meta.bricks.len());
        assert_eq!(decoded.bricks[0].offset, meta.bricks[0].offset);
    }

    #[test]
    fn unique_id_is_stable_for_identical_content() {
        let meta = sample_meta();
        let a = compute_unique_id(&meta.encode());
        let b = compute_unique_id(&meta.encode());
        assert_eq!(a, b);
    }

    #[test]
    fn unique_id_changes_with_content() {
        let mut meta = sample_meta();
        let a = compute_unique_id(&meta.encode());
        meta.brick_size = 32;
        let b = compute_unique_id(&meta.encode());
        assert_ne!(a, b);
    }

    #[test]
    fn framed_round_trips() {
        let blob = b"hello bricked volume".to_vec();
        let mut out = Vec::new();
        write_framed(&mut out, &blob).unwrap();
        let mut cur = Cursor::new(out);
        let back = read_framed(&mut cur).unwrap();
        assert_eq!(back, blob);
    }

    #[test]
    fn truncated_blob_is_corrupt_error() {
        let meta = sample_meta();
        let blob = meta.encode();
        let truncated = &blob[..blob.len() / 2];
        assert!(DatasetMetadata::decode(truncated, [0; 16]).is_err());
    }
}
