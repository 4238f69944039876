//! Minimal NRRD bridge (spec §4.15): reads just `dimension`, `sizes`,
//! `type`, and `spacings` from a detached or attached header, enough to
//! build a C1 accessor. Any other NRRD feature (encoding other than `raw`,
//! non-orthogonal space directions, block types, multiple data files) is
//! explicitly out of scope and rejected with a `Format` error.

use std::path::{Path, PathBuf};

use brickvol_core::accessor::MmapVolumeAccessor;
use brickvol_core::error::{Error, Result};
use brickvol_core::voxel::ScalarType;

#[derive(Clone, Debug, PartialEq)]
pub struct NrrdHeader {
    pub dims: [u32; 3],
    pub voxel_type: ScalarType,
    pub spacings: [f32; 3],
    /// Byte offset of raw data within the file that holds it.
    pub data_offset: u64,
    /// Detached data file name, if `data file:` was present.
    pub data_file: Option<String>,
}

impl NrrdHeader {
    pub fn parse(text: &str) -> Result<(Self, u64)> {
        if !text.starts_with("NRRD000") {
            return Err(Error::Format("missing NRRD magic".into()));
        }

        let mut dimension = None;
        let mut sizes = None;
        let mut voxel_type = None;
        let mut spacings = [1.0f32; 3];
        let mut encoding = None;
        let mut data_file = None;
        let mut header_bytes = 0u64;
        let mut in_header = true;

        for line in text.lines() {
            header_bytes += line.len() as u64 + 1; // + '\n'
            if !in_header {
                continue;
            }
            if line.is_empty() {
                // blank line ends the header; raw data (if attached) follows immediately.
                in_header = false;
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "dimension" => {
                    dimension = Some(
                        value
                            .parse::<u32>()
                            .map_err(|_| Error::Format("bad dimension field".into()))?,
                    );
                }
                "sizes" => {
                    let parts: Vec<u32> = value
                        .split_ascii_whitespace()
                        .map(|t| t.parse())
                        .collect::<std::result::Result<_, _>>()
                        .map_err(|_| Error::Format("bad sizes field".into()))?;
                    sizes = Some(parts);
                }
                "type" => {
                    voxel_type = Some(match value {
                        "uchar" | "unsigned char" => ScalarType::U8,
                        "ushort" | "unsigned short" => ScalarType::U16,
                        "uint" | "unsigned int" => ScalarType::U32,
                        other => return Err(Error::Format(format!("unsupported NRRD type {other}"))),
                    });
                }
                "spacings" => {
                    let parts: Vec<f32> = value
                        .split_ascii_whitespace()
                        .map(|t| t.parse())
                        .collect::<std::result::Result<_, _>>()
                        .map_err(|_| Error::Format("bad spacings field".into()))?;
                    if parts.len() >= 3 {
                        spacings = [parts[0], parts[1], parts[2]];
                    }
                }
                "encoding" => encoding = Some(value.to_string()),
                "data file" | "datafile" => data_file = Some(value.to_string()),
                _ => {}
            }
        }

        let dimension = dimension.ok_or_else(|| Error::Format("missing dimension field".into()))?;
        if dimension != 3 {
            return Err(Error::Format("only 3-dimensional NRRD volumes are supported".into()));
        }
        if let Some(enc) = &encoding {
            if enc != "raw" {
                return Err(Error::Format(format!("unsupported NRRD encoding {enc}, only raw")));
            }
        }
        let sizes = sizes.ok_or_else(|| Error::Format("missing sizes field".into()))?;
        if sizes.len() != 3 {
            return Err(Error::Format("sizes field must have exactly 3 entries".into()));
        }

        Ok((
            NrrdHeader {
                dims: [sizes[0], sizes[1], sizes[2]],
                voxel_type: voxel_type.ok_or_else(|| Error::Format("missing type field".into()))?,
                spacings,
                data_offset: header_bytes,
                data_file,
            },
            header_bytes,
        ))
    }
}

pub fn open(path: &Path) -> Result<MmapVolumeAccessor> {
    let text = std::fs::read_to_string(path)?;
    let (header, header_bytes) = NrrdHeader::parse(&text)?;

    match header.data_file {
        Some(ref name) => {
            let detached: PathBuf = path.parent().unwrap_or_else(|| Path::new(".")).join(name);
            MmapVolumeAccessor::open(&detached, header.dims, header.voxel_type, 0)
        }
        None => MmapVolumeAccessor::open(path, header.dims, header.voxel_type, header_bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATTACHED_HEADER: &str = "NRRD0004\ndimension: 3\nsizes: 4 4 4\ntype: uchar\nencoding: raw\nspacings: 1.0 1.0 1.0\n\n";

    #[test]
    fn parses_attached_header_fields() {
        let (h, _) = NrrdHeader::parse(ATTACHED_HEADER).unwrap();
        assert_eq!(h.dims, [4, 4, 4]);
        assert_eq!(h.voxel_type, ScalarType::U8);
        assert_eq!(h.spacings, [1.0, 1.0, 1.0]);
        assert!(h.data_file.is_none());
    }

    #[test]
    fn rejects_non_raw_encoding() {
        let text = ATTACHED_HEADER.replace("encoding: raw", "encoding: gzip");
        assert!(NrrdHeader::parse(&text).is_err());
    }

    #[test]
    fn rejects_non_three_dimensional() {
        let text = ATTACHED_HEADER.replace("dimension: 3", "dimension: 4");
        assert!(NrrdHeader::parse(&text).is_err());
    }

    #[test]
    fn rejects_missing_magic() {
        assert!(NrrdHeader::parse("dimension: 3\n").is_err());
    }
}
