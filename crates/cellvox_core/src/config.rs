//! # Engine Configuration
//!
//! Tunables loaded once at startup from TOML. Every key is optional and
//! falls back to its default.
//!
//! ```toml
//! [arena]
//! initial_capacity = 65536
//! growth_factor = 1.5
//!
//! [optimizer]
//! border_is_exposed = true
//!
//! [ray]
//! max_distance = 512.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ChunkError, ChunkResult};

/// Arena packer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Bytes reserved when the arena is created.
    pub initial_capacity: usize,
    /// Headroom multiplier applied when the backing store grows.
    pub growth_factor: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64 * 1024,
            growth_factor: 1.5,
        }
    }
}

/// Compaction settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Treat the outside of the chunk as void when computing visible faces.
    pub border_is_exposed: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { border_is_exposed: true }
    }
}

/// World ray cast settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RayConfig {
    /// Maximum world-space distance of a picking ray.
    pub max_distance: f32,
}

impl Default for RayConfig {
    fn default() -> Self {
        Self { max_distance: 512.0 }
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Arena packer settings.
    pub arena: ArenaConfig,
    /// Compaction settings.
    pub optimizer: OptimizerConfig,
    /// Ray cast settings.
    pub ray: RayConfig,
}

impl EngineConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ChunkError::InvalidConfig` on malformed TOML, unknown value
    /// types, or out-of-range values.
    pub fn from_toml_str(text: &str) -> ChunkResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ChunkError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ChunkError::ConfigRead` if the file cannot be read and
    /// `ChunkError::InvalidConfig` if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> ChunkResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ChunkError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// Returns `ChunkError::InvalidConfig` if a value cannot be represented.
    pub fn to_toml_string(&self) -> ChunkResult<String> {
        toml::to_string(self).map_err(|e| ChunkError::InvalidConfig(e.to_string()))
    }

    fn validate(&self) -> ChunkResult<()> {
        let growth = self.arena.growth_factor;
        if !growth.is_finite() || growth < 1.0 {
            return Err(ChunkError::InvalidConfig(format!(
                "arena.growth_factor must be finite and >= 1.0, got {}",
                self.arena.growth_factor
            )));
        }
        let distance = self.ray.max_distance;
        if !distance.is_finite() || distance <= 0.0 {
            return Err(ChunkError::InvalidConfig(format!(
                "ray.max_distance must be positive and finite, got {}",
                self.ray.max_distance
            )));
        }
        Ok(())
    }
}
