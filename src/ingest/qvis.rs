//! QVIS bridge (spec §4.15): resolves a `.dat` sidecar plus its raw payload
//! into a C1 [`MmapVolumeAccessor`].

use std::path::Path;

use brickvol_core::accessor::MmapVolumeAccessor;
use brickvol_core::error::Result;

use super::sidecar::SidecarDescriptor;

pub fn open(sidecar_path: &Path) -> Result<MmapVolumeAccessor> {
    let text = std::fs::read_to_string(sidecar_path)?;
    let descriptor = SidecarDescriptor::parse(&text)?;
    let payload_path = descriptor.payload_path(sidecar_path);
    MmapVolumeAccessor::open(&payload_path, descriptor.dims, descriptor.voxel_type, 0)
}
