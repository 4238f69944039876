//! Wire format shared by server and client (spec §4.6).
//!
//! Commands are ASCII lines, space-separated, case-insensitive verb.
//! Responses are either a text block terminated by a blank line, or a
//! binary frame: a 4-byte little-endian length `N` followed by exactly `N`
//! bytes.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use brickvol_core::error::{Error, Result};

pub const PROTOCOL_VERSION: &str = "1";

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Info,
    List,
    Open { id: String },
    GetBricks { indices: Vec<u64> },
}

impl Command {
    /// Parse one already-trimmed line. Unknown verbs, wrong arity, and
    /// non-integer indices are `Protocol` errors (spec §4.6 state machine:
    /// these cause the connection to close).
    pub fn parse(line: &str, max_bricks_per_get: usize) -> Result<Self> {
        let mut tokens = line.split_ascii_whitespace();
        let verb = tokens
            .next()
            .ok_or_else(|| Error::Protocol("empty command line".into()))?;

        match verb.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Command::Info),
            "LIST" => Ok(Command::List),
            "OPEN" => {
                let id = tokens
                    .next()
                    .ok_or_else(|| Error::Protocol("OPEN requires a dataset id".into()))?
                    .to_string();
                if tokens.next().is_some() {
                    return Err(Error::Protocol("OPEN takes exactly one argument".into()));
                }
                Ok(Command::Open { id })
            }
            "GETBRICKS" => {
                let indices: std::result::Result<Vec<u64>, _> = tokens.map(|t| t.parse::<u64>()).collect();
                let indices = indices.map_err(|_| Error::Protocol("GETBRICKS index is not an integer".into()))?;
                if indices.is_empty() {
                    return Err(Error::Protocol("GETBRICKS requires at least one index".into()));
                }
                if indices.len() > max_bricks_per_get {
                    return Err(Error::Protocol(format!(
                        "GETBRICKS requested {} bricks, exceeds limit {max_bricks_per_get}",
                        indices.len()
                    )));
                }
                Ok(Command::GetBricks { indices })
            }
            other => Err(Error::Protocol(format!("unknown verb {other}"))),
        }
    }
}

/// Format the `INFO` response body (spec §4.6: `VERSION=<s>\nMAX_BRICKS_PER_GET_REQUEST=<u>\n\n`).
pub fn format_info(max_bricks_per_get: usize) -> String {
    format!("VERSION={PROTOCOL_VERSION}\nMAX_BRICKS_PER_GET_REQUEST={max_bricks_per_get}\n\n")
}

/// Format one `LIST` line: `<id> <description>\n`. Caller appends the
/// terminating blank line after the last entry.
pub fn format_list_entry(id: &str, description: &str) -> String {
    format!("{id} {description}\n")
}

/// Write a binary frame: 4-byte little-endian length then `payload`.
pub fn write_frame(out: &mut impl Write, payload: &[u8]) -> Result<()> {
    out.write_u32::<LittleEndian>(payload.len() as u32)?;
    out.write_all(payload)?;
    Ok(())
}

/// Read a binary frame written by [`write_frame`].
pub fn read_frame(input: &mut impl Read) -> Result<Vec<u8>> {
    let len = input.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    Ok(buf)
}
