//! Narrow bridges from foreign formats into a C1 [`brickvol_core::accessor::RawVolumeAccessor`].
//! Foreign-format parsing beyond what's named here is out of scope (spec §4.15).

pub mod dicom;
pub mod nrrd;
pub mod qvis;
pub mod sidecar;
pub mod synth;
