//! Narrow DICOM directory bridge (spec §4.15): not a DICOM parser. Assumes
//! one raw, uncompressed slice per file, fixed geometry across the series,
//! ordered by a numeric suffix in the file name (`slice_0007.raw`-style).
//! Anything beyond that (compressed transfer syntax, multi-frame files,
//! real DICOM tag parsing) is out of scope.

use std::path::{Path, PathBuf};

use brickvol_core::accessor::RawVolumeAccessor;
use brickvol_core::error::{Error, Result};
use brickvol_core::voxel::ScalarType;

/// Concatenates same-sized slice files, numerically ordered, into one raw
/// volume accessor without materializing the whole thing in memory twice:
/// each slice is read on demand from its own file.
pub struct DicomSeriesAccessor {
    slice_paths: Vec<PathBuf>,
    slice_dims: [u32; 2],
    voxel_type: ScalarType,
}

impl DicomSeriesAccessor {
    pub fn open(dir: &Path, slice_dims: [u32; 2], voxel_type: ScalarType) -> Result<Self> {
        let mut entries: Vec<(u64, PathBuf)> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                let stem = path.file_stem()?.to_str()?.to_string();
                let suffix: String = stem.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
                let suffix: String = suffix.chars().rev().collect();
                let n: u64 = suffix.parse().ok()?;
                Some((n, path))
            })
            .collect();

        if entries.is_empty() {
            return Err(Error::Format(format!("no numbered slice files found in {}", dir.display())));
        }
        entries.sort_by_key(|(n, _)| *n);
        let slice_paths = entries.into_iter().map(|(_, p)| p).collect();

        Ok(DicomSeriesAccessor {
            slice_paths,
            slice_dims,
            voxel_type,
        })
    }

    fn read_slice(&self, z: u32) -> Result<Vec<u8>> {
        let path = &self.slice_paths[z as usize];
        let expected = self.slice_dims[0] as usize * self.slice_dims[1] as usize * self.voxel_type.byte_width() as usize;
        let bytes = std::fs::read(path)?;
        if bytes.len() != expected {
            return Err(Error::Format(format!(
                "slice {} has {} bytes, expected {expected}",
                path.display(),
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

impl RawVolumeAccessor for DicomSeriesAccessor {
    fn dims(&self) -> [u32; 3] {
        [self.slice_dims[0], self.slice_dims[1], self.slice_paths.len() as u32]
    }

    fn voxel_type(&self) -> ScalarType {
        self.voxel_type
    }

    fn read_region(&self, x0: u32, x1: u32, y0: u32, y1: u32, z0: u32, z1: u32) -> Result<Vec<u8>> {
        let b = self.voxel_type.byte_width() as usize;
        let row_len = (x1 - x0) as usize * b;
        let mut out = Vec::with_capacity(row_len * (y1 - y0) as usize * (z1 - z0) as usize);
        for z in z0..z1 {
            let slice = self.read_slice(z)?;
            for y in y0..y1 {
                let row_start = (y as usize * self.slice_dims[0] as usize + x0 as usize) * b;
                out.extend_from_slice(&slice[row_start..row_start + row_len]);
            }
        }
        Ok(out)
    }
}
