//! Brick payload codec (spec §4.2).
//!
//! A codec must be lossless and byte-exact round-trip, and tolerate
//! brick-sized inputs (up to `bs^3 * B`). The file format records a 1-byte
//! codec tag so future codecs can be added without breaking old files.

use crate::error::{Error, Result};

/// 1-byte on-disk codec tag (spec §4.3 `CODEC` key, §4.4 brick payloads).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CodecTag {
    /// Verbatim, uncompressed payload.
    None = 0,
    /// LZ4 block compression (`lz4_flex`), size-prepended.
    Lz4 = 1,
}

impl CodecTag {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(CodecTag::None),
            1 => Ok(CodecTag::Lz4),
            other => Err(Error::Format(format!("unknown codec tag {other}"))),
        }
    }
}

/// Encode/decode contract for brick payloads.
pub trait Codec: Send + Sync {
    fn tag(&self) -> CodecTag;
    fn encode(&self, bytes: &[u8]) -> Vec<u8>;
    fn decode(&self, bytes: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}

/// Verbatim codec: stores bricks uncompressed. Used when the builder's
/// compression toggle is off.
pub struct NoneCodec;

impl Codec for NoneCodec {
    fn tag(&self) -> CodecTag {
        CodecTag::None
    }

    fn encode(&self, bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }

    fn decode(&self, bytes: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        if bytes.len() != expected_len {
            return Err(Error::Corrupt(format!(
                "verbatim brick length mismatch: got {}, expected {expected_len}",
                bytes.len()
            )));
        }
        Ok(bytes.to_vec())
    }
}

/// LZ4 block codec, size-prepended so `decode` doesn't need an external
/// length (the stored length is still cross-checked against the caller's
/// expectation from the brick table).
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn tag(&self) -> CodecTag {
        CodecTag::Lz4
    }

    fn encode(&self, bytes: &[u8]) -> Vec<u8> {
        lz4_flex::compress_prepend_size(bytes)
    }

    fn decode(&self, bytes: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let decoded = lz4_flex::decompress_size_prepended(bytes)
            .map_err(|e| Error::Corrupt(format!("lz4 decompress failed: {e}")))?;
        if decoded.len() != expected_len {
            return Err(Error::Corrupt(format!(
                "decoded brick length mismatch: got {}, expected {expected_len}",
                decoded.len()
            )));
        }
        Ok(decoded)
    }
}

/// Resolve the codec implementation for an on-disk tag.
pub fn codec_for_tag(tag: CodecTag) -> Box<dyn Codec> {
    match tag {
        CodecTag::None => Box::new(NoneCodec),
        CodecTag::Lz4 => Box::new(Lz4Codec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(codec: &dyn Codec, data: &[u8]) {
        let encoded = codec.encode(data);
        let decoded = codec.decode(&encoded, data.len()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn none_codec_round_trips() {
        let data = vec![7u8; 64 * 64 * 64];
        round_trip(&NoneCodec, &data);
    }

    #[test]
    fn lz4_codec_round_trips_brick_sized_input() {
        let mut data = vec![0u8; 64 * 64 * 64 * 2];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        round_trip(&Lz4Codec, &data);
    }

    #[test]
    fn lz4_codec_round_trips_empty_and_tiny_input() {
        round_trip(&Lz4Codec, &[]);
        round_trip(&Lz4Codec, &[42]);
    }

    #[test]
    fn decode_length_mismatch_is_corrupt_error() {
        let encoded = Lz4Codec.encode(&[1, 2, 3, 4]);
        let err = Lz4Codec.decode(&encoded, 99).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn tag_round_trips_through_u8() {
        for tag in [CodecTag::None, CodecTag::Lz4] {
            assert_eq!(CodecTag::from_u8(tag as u8).unwrap(), tag);
        }
        assert!(CodecTag::from_u8(200).is_err());
    }
}
