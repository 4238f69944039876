//! QVIS-style sidecar descriptor (spec §6): a plain-text `<stem>.dat` file
//! naming a raw payload file and its geometry.

use std::path::{Path, PathBuf};

use brickvol_core::error::{Error, Result};
use brickvol_core::voxel::ScalarType;

#[derive(Clone, Debug, PartialEq)]
pub struct SidecarDescriptor {
    pub object_file_name: String,
    pub dims: [u32; 3],
    pub components: u32,
    pub slice_thickness: [f32; 3],
    pub voxel_type: ScalarType,
}

impl SidecarDescriptor {
    /// Parse a `.dat` sidecar. Unknown keys (`TaggedFileName`, `ObjectType`,
    /// `GridType`) are accepted and ignored, as spec §6 requires.
    pub fn parse(text: &str) -> Result<Self> {
        let mut object_file_name = None;
        let mut dims = None;
        let mut components = None;
        let mut slice_thickness = [1.0f32; 3];
        let mut voxel_type = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(Error::Format(format!("malformed sidecar line: {line:?}")));
            };
            let value = value.trim();
            match key.trim() {
                "ObjectFileName" => object_file_name = Some(value.to_string()),
                "Resolution" => {
                    let parts: Vec<u32> = value
                        .split_ascii_whitespace()
                        .map(|t| t.parse())
                        .collect::<std::result::Result<_, _>>()
                        .map_err(|_| Error::Format("Resolution must be three integers".into()))?;
                    if parts.len() != 3 {
                        return Err(Error::Format("Resolution must have exactly W H D".into()));
                    }
                    dims = Some([parts[0], parts[1], parts[2]]);
                }
                "Components" => {
                    components = Some(
                        value
                            .parse::<u32>()
                            .map_err(|_| Error::Format("Components must be an integer".into()))?,
                    );
                }
                "SliceThickness" => {
                    let parts: Vec<f32> = value
                        .split_ascii_whitespace()
                        .map(|t| t.parse())
                        .collect::<std::result::Result<_, _>>()
                        .map_err(|_| Error::Format("SliceThickness must be three floats".into()))?;
                    if parts.len() != 3 {
                        return Err(Error::Format("SliceThickness must have exactly ax ay az".into()));
                    }
                    slice_thickness = [parts[0], parts[1], parts[2]];
                }
                "Format" => {
                    voxel_type = Some(match value {
                        "UCHAR" => ScalarType::U8,
                        "USHORT" => ScalarType::U16,
                        "UINT" => ScalarType::U32,
                        other => return Err(Error::Format(format!("unsupported voxel Format {other}"))),
                    });
                }
                "TaggedFileName" | "ObjectType" | "GridType" => {}
                other => return Err(Error::Format(format!("unknown sidecar key {other}"))),
            }
        }

        Ok(SidecarDescriptor {
            object_file_name: object_file_name.ok_or_else(|| Error::Format("missing ObjectFileName".into()))?,
            dims: dims.ok_or_else(|| Error::Format("missing Resolution".into()))?,
            components: components.ok_or_else(|| Error::Format("missing Components".into()))?,
            slice_thickness,
            voxel_type: voxel_type.ok_or_else(|| Error::Format("missing Format".into()))?,
        })
    }

    pub fn payload_path(&self, sidecar_path: &Path) -> PathBuf {
        sidecar_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.object_file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "ObjectFileName: skull.raw\nResolution:     128 128 64\nComponents:     1\nSliceThickness: 1.0 1.0 2.0\nFormat:         UCHAR\nTaggedFileName: --\nObjectType:     TEXTURE_VOLUME_OBJECT\nGridType:       EQUIDISTANT\n";

    #[test]
    fn parses_sample_sidecar() {
        let d = SidecarDescriptor::parse(SAMPLE).unwrap();
        assert_eq!(d.object_file_name, "skull.raw");
        assert_eq!(d.dims, [128, 128, 64]);
        assert_eq!(d.components, 1);
        assert_eq!(d.slice_thickness, [1.0, 1.0, 2.0]);
        assert_eq!(d.voxel_type, ScalarType::U8);
    }

    #[test]
    fn rejects_unknown_key() {
        assert!(SidecarDescriptor::parse("Bogus: 1\n").is_err());
    }

    #[test]
    fn rejects_missing_required_field() {
        assert!(SidecarDescriptor::parse("ObjectFileName: a.raw\n").is_err());
    }

    #[test]
    fn payload_path_is_relative_to_sidecar_directory() {
        let d = SidecarDescriptor::parse(SAMPLE).unwrap();
        let p = d.payload_path(Path::new("/data/volumes/skull.dat"));
        assert_eq!(p, Path::new("/data/volumes/skull.raw"));
    }
}
