//! Out-of-core bricked volume builder and GPU atlas cache.

pub mod atlas;
pub mod config;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod volume;

pub use brickvol_core::error::{Error, Result};
