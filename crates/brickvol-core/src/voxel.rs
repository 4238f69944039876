//! Scalar voxel types (spec §3 "Voxel"): uint8, uint16, uint32, one channel.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The scalar type a dataset's voxels are stored in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    U8,
    U16,
    U32,
}

impl ScalarType {
    /// Byte width `B` (spec §3: `B ∈ {1,2,4}`).
    pub fn byte_width(self) -> u32 {
        match self {
            ScalarType::U8 => 1,
            ScalarType::U16 => 2,
            ScalarType::U32 => 4,
        }
    }

    /// `rangeMax = 2^(8B)-1`.
    pub fn range_max(self) -> u64 {
        match self {
            ScalarType::U8 => u8::MAX as u64,
            ScalarType::U16 => u16::MAX as u64,
            ScalarType::U32 => u32::MAX as u64,
        }
    }

    pub fn from_byte_width(b: u32) -> Result<Self> {
        match b {
            1 => Ok(ScalarType::U8),
            2 => Ok(ScalarType::U16),
            4 => Ok(ScalarType::U32),
            other => Err(Error::Format(format!("unsupported voxel byte width {other}"))),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ScalarType::U8 => 1,
            ScalarType::U16 => 2,
            ScalarType::U32 => 3,
        }
    }

    pub fn from_code(c: u8) -> Result<Self> {
        match c {
            1 => Ok(ScalarType::U8),
            2 => Ok(ScalarType::U16),
            3 => Ok(ScalarType::U32),
            other => Err(Error::Format(format!("unknown scalar type code {other}"))),
        }
    }

    /// Read a single scalar value out of a little-endian byte slice.
    pub fn read_le(self, bytes: &[u8]) -> u64 {
        match self {
            ScalarType::U8 => bytes[0] as u64,
            ScalarType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as u64,
            ScalarType::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
        }
    }

    /// Write a single scalar value as little-endian bytes.
    pub fn write_le(self, value: u64, out: &mut [u8]) {
        match self {
            ScalarType::U8 => out[0] = value as u8,
            ScalarType::U16 => out[..2].copy_from_slice(&(value as u16).to_le_bytes()),
            ScalarType::U32 => out[..4].copy_from_slice(&(value as u32).to_le_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_codes() {
        for t in [ScalarType::U8, ScalarType::U16, ScalarType::U32] {
            assert_eq!(ScalarType::from_code(t.code()).unwrap(), t);
            assert_eq!(ScalarType::from_byte_width(t.byte_width()).unwrap(), t);
        }
    }

    #[test]
    fn range_max_matches_bit_width() {
        assert_eq!(ScalarType::U8.range_max(), 255);
        assert_eq!(ScalarType::U16.range_max(), 65535);
        assert_eq!(ScalarType::U32.range_max(), u32::MAX as u64);
    }

    #[test]
    fn read_write_le_round_trip() {
        let mut buf = [0u8; 4];
        ScalarType::U32.write_le(0x0102_0304, &mut buf);
        assert_eq!(ScalarType::U32.read_le(&buf), 0x0102_0304);
    }
}
