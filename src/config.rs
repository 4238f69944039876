//! Config surfaces (spec §4.10): plain structs with `Default` impls, round-
//! trippable through a host's own TOML/JSON sidecar. The core never
//! persists these itself.

use brickvol_core::extension::ExtensionStrategy;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuilderConfig {
    pub brick_size: u32,
    pub overlap: u32,
    pub extension_strategy: ExtensionStrategy,
    pub use_compressor: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            brick_size: 64,
            overlap: 2,
            extension_strategy: ExtensionStrategy::Clamp,
            use_compressor: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub max_bricks_per_get_request: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 9876,
            max_bricks_per_get_request: 64,
        }
    }
}

impl ServerConfig {
    pub fn validated(self) -> brickvol_core::error::Result<Self> {
        if !(1..=1000).contains(&self.max_bricks_per_get_request) {
            return Err(brickvol_core::error::Error::Protocol(format!(
                "max_bricks_per_get_request {} out of range [1, 1000]",
                self.max_bricks_per_get_request
            )));
        }
        Ok(self)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
    pub make_local_copy: bool,
    pub progressive_loading: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            port: 9876,
            timeout_seconds: 10,
            make_local_copy: false,
            progressive_loading: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum OversamplingMode {
    Static,
    Dynamic,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OversamplingConfig {
    pub mode: OversamplingMode,
    pub base: f32,
    pub drop_fps: f32,
    pub recovery_fps: f32,
}

impl Default for OversamplingConfig {
    fn default() -> Self {
        OversamplingConfig {
            mode: OversamplingMode::Static,
            base: 1.0,
            drop_fps: 30.0,
            recovery_fps: 50.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AtlasConfig {
    pub atlas_size_mb: u32,
    pub initial_bricks: u32,
    pub min_hash_table_size_mb: u32,
    pub max_probing_attempts: u32,
    pub request_low_res_lod: bool,
    pub stop_on_miss: bool,
    pub screen_space_error: f32,
    pub oversampling: OversamplingConfig,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        AtlasConfig {
            atlas_size_mb: 512,
            initial_bricks: 64,
            min_hash_table_size_mb: 4,
            max_probing_attempts: 32,
            request_low_res_lod: true,
            stop_on_miss: false,
            screen_space_error: 1.0,
            oversampling: OversamplingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_rejects_out_of_range_limit() {
        let cfg = ServerConfig {
            max_bricks_per_get_request: 0,
            ..ServerConfig::default()
        };
        assert!(cfg.validated().is_err());

        let cfg = ServerConfig {
            max_bricks_per_get_request: 5000,
            ..ServerConfig::default()
        };
        assert!(cfg.validated().is_err());
    }

    #[test]
    fn defaults_are_sane() {
        assert_eq!(BuilderConfig::default().brick_size, 64);
        assert!(ServerConfig::default().validated().is_ok());
    }
}
