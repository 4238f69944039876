//! Error taxonomy for the bricked-volume core (spec §7).

use thiserror::Error;

/// The six error kinds of spec §7, shared by the builder, file format,
/// remote protocol, and atlas manager.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format error: {0}")]
    Format(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("corrupt data: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, Error>;
