//! Raw volume accessor (spec §4.1): read-only, memory-mapped access to a
//! `W*H*D*B`-byte raw scalar array, with a chunked-pread fallback when
//! mapping isn't available (grounded on the mmap-backed reader pattern in
//! the bricked file reader, `format::reader`).

use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};
use crate::voxel::ScalarType;

/// A read-only view over a raw `dims[0] x dims[1] x dims[2]` array of
/// single-channel scalar voxels, row-major with x fastest-varying.
pub trait RawVolumeAccessor: Send + Sync {
    fn dims(&self) -> [u32; 3];
    fn voxel_type(&self) -> ScalarType;

    fn size(&self) -> u64 {
        let [w, h, d] = self.dims();
        w as u64 * h as u64 * d as u64 * self.voxel_type().byte_width() as u64
    }

    /// Read the half-open region `[x0,x1) x [y0,y1) x [z0,z1)` into a
    /// freshly allocated buffer, row-major within the region.
    fn read_region(&self, x0: u32, x1: u32, y0: u32, y1: u32, z0: u32, z1: u32) -> Result<Vec<u8>>;
}

/// Memory-mapped accessor over a flat raw file, with an optional byte
/// offset to skip a leading header the caller has already parsed.
pub struct MmapVolumeAccessor {
    mmap: Mmap,
    offset: usize,
    dims: [u32; 3],
    voxel_type: ScalarType,
}

impl MmapVolumeAccessor {
    pub fn open(path: &Path, dims: [u32; 3], voxel_type: ScalarType, offset: u64) -> Result<Self> {
        let file = File::open(path)?;
        let expected = dims[0] as u64 * dims[1] as u64 * dims[2] as u64 * voxel_type.byte_width() as u64;
        let len = file.metadata()?.len();
        if len < offset + expected {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "raw volume file too small: have {len} bytes, need {} at offset {offset}",
                    offset + expected
                ),
            )));
        }
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(MmapVolumeAccessor {
            mmap,
            offset: offset as usize,
            dims,
            voxel_type,
        })
    }

    fn voxel_offset(&self, x: u32, y: u32, z: u32) -> usize {
        let b = self.voxel_type.byte_width() as usize;
        let [w, h, _] = self.dims;
        self.offset + ((z as usize * h as usize + y as usize) * w as usize + x as usize) * b
    }
}

impl RawVolumeAccessor for MmapVolumeAccessor {
    fn dims(&self) -> [u32; 3] {
        self.dims
    }

    fn voxel_type(&self) -> ScalarType {
        self.voxel_type
    }

    fn read_region(&self, x0: u32, x1: u32, y0: u32, y1: u32, z0: u32, z1: u32) -> Result<Vec<u8>> {
        let b = self.voxel_type.byte_width() as usize;
        let row_len = (x1 - x0) as usize * b;
        let mut out = Vec::with_capacity(row_len * (y1 - y0) as usize * (z1 - z0) as usize);
        for z in z0..z1 {
            for y in y0..y1 {
                let start = self.voxel_offset(x0, y, z);
                out.extend_from_slice(&self.mmap[start..start + row_len]);
            }
        }
        Ok(out)
    }
}

/// Chunked-pread fallback for platforms or files where memory mapping is
/// unavailable (spec §4.1: "falls back to chunked pread").
pub struct FileVolumeAccessor {
    file: std::sync::Mutex<File>,
    offset: u64,
    dims: [u32; 3],
    voxel_type: ScalarType,
}

impl FileVolumeAccessor {
    pub fn open(path: &Path, dims: [u32; 3], voxel_type: ScalarType, offset: u64) -> Result<Self> {
        let file = File::open(path)?;
        let expected = dims[0] as u64 * dims[1] as u64 * dims[2] as u64 * voxel_type.byte_width() as u64;
        let len = file.metadata()?.len();
        if len < offset + expected {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("raw volume file too small: have {len} bytes, need {}", offset + expected),
            )));
        }
        Ok(FileVolumeAccessor {
            file: std::sync::Mutex::new(file),
            offset,
            dims,
            voxel_type,
        })
    }
}

impl RawVolumeAccessor for FileVolumeAccessor {
    fn dims(&self) -> [u32; 3] {
        self.dims
    }

    fn voxel_type(&self) -> ScalarType {
        self.voxel_type
    }

    fn read_region(&self, x0: u32, x1: u32, y0: u32, y1: u32, z0: u32, z1: u32) -> Result<Vec<u8>> {
        use std::io::{Read, Seek, SeekFrom};
        let b = self.voxel_type.byte_width() as usize;
        let [w, h, _] = self.dims;
        let row_len = (x1 - x0) as usize * b;
        let mut out = Vec::with_capacity(row_len * (y1 - y0) as usize * (z1 - z0) as usize);
        let mut file = self.file.lock().unwrap();
        for z in z0..z1 {
            for y in y0..y1 {
                let voxel_index = (z as u64 * h as u64 + y as u64) * w as u64 + x0 as u64;
                let byte_offset = self.offset + voxel_index * b as u64;
                file.seek(SeekFrom::Start(byte_offset))?;
                let mut row = vec![0u8; row_len];
                file.read_exact(&mut row)?;
                out.extend_from_slice(&row);
            }
        }
        Ok(out)
    }
}
