//! Container writer: lays out the header then appends brick payloads in
//! ascending brick-index order, writing to a temp file and renaming into
//! place so a reader never observes a partially-written file (grounded on
//! the compress-then-write pattern of the teacher's chunk disk I/O, adapted
//! to a single self-contained container instead of per-chunk files).

use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{MAGIC, VERSION};
use crate::error::{Error, Result};
use crate::meta::{compute_unique_id, write_framed, DatasetMetadata};

/// Incrementally builds a bricked volume file. Bricks must be appended in
/// ascending global index order (spec §4.4: "the file MUST be finest-first
/// in brick order" is satisfied by the builder calling `append_brick` in
/// that order; this writer just enforces monotonic offsets).
pub struct Writer {
    file: BufWriter<File>,
    next_offset: u64,
    brick_count: u64,
    reserved: u64,
}

impl Writer {
    /// Begin a new container at `path.tmp`, reserving space for the header.
    /// `header_len_hint` should be sized from the known level/brick counts
    /// (callers get this wrong at their peril: [`Writer::finish`] refuses to
    /// write a header that doesn't fit the reservation rather than
    /// overrunning the first brick's payload). Call [`Writer::append_brick`]
    /// for every brick in ascending index order, then [`Writer::finish`].
    pub fn create(path: &Path, header_len_hint: u64) -> Result<(Self, std::path::PathBuf)> {
        let tmp_path = tmp_path_for(path);
        let file = File::create(&tmp_path)?;
        let reserved = super::PREAMBLE_LEN + header_len_hint;
        let mut writer = Writer {
            file: BufWriter::new(file),
            next_offset: 0,
            brick_count: 0,
            reserved,
        };
        // Reserve the preamble + header region with zeros; rewritten in `finish`.
        writer.file.write_all(&vec![0u8; reserved as usize])?;
        writer.next_offset = reserved;
        Ok((writer, tmp_path))
    }

    /// Append one brick's already-encoded (compressed or verbatim) payload.
    /// Returns its `(offset, size)` for the brick table. EMPTY/CHILD_EMPTY
    /// bricks should pass an empty slice and get `size = 0`.
    pub fn append_brick(&mut self, payload: &[u8]) -> Result<(u64, u64)> {
        let offset = self.next_offset;
        self.brick_count += 1;
        if payload.is_empty() {
            return Ok((offset, 0));
        }
        self.file.write_all(payload)?;
        self.next_offset += payload.len() as u64;
        Ok((offset, payload.len() as u64))
    }

    /// Finalize: rewrite the header now that brick offsets/sizes and the
    /// content-stable unique id are known, flush, fsync, then atomically
    /// rename into place.
    pub fn finish(mut self, tmp_path: std::path::PathBuf, final_path: &Path, mut metadata: DatasetMetadata) -> Result<()> {
        let encoded = metadata.encode();
        metadata.unique_id = compute_unique_id(&encoded);
        // unique_id isn't part of the encoded blob (see meta::DatasetMetadata::encode),
        // so header_len is stable across this reassignment.
        let header_len = {
            let mut probe = Vec::new();
            write_framed(&mut probe, &encoded)?;
            probe.len() as u64
        };

        if super::PREAMBLE_LEN + header_len > self.reserved {
            return Err(Error::Format(format!(
                "encoded header ({} bytes) overruns the {} bytes reserved at Writer::create time; \
                 the caller's header_len_hint undercounted levels/bricks",
                super::PREAMBLE_LEN + header_len,
                self.reserved
            )));
        }

        self.file.flush()?;
        let mut file = self.file.into_inner().map_err(|e| e.into_error())?;

        use std::io::{Seek, SeekFrom};
        file.seek(SeekFrom::Start(0))?;
        let mut header = Vec::new();
        header.write_all(MAGIC)?;
        header.write_u32::<LittleEndian>(VERSION)?;
        header.write_u32::<LittleEndian>(header_len as u32)?;
        write_framed(&mut header, &encoded)?;
        file.write_all(&header)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp_path, final_path)?;
        log::info!("wrote {} ({} bricks)", final_path.display(), self.brick_count);
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    std::path::PathBuf::from(os)
}
