//! Logging setup, mirroring the teacher's `core/logging.rs`.

/// Initialize the global logger. Default filter is `info`; override with
/// `RUST_LOG`.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
