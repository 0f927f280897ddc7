//! # Unified Configuration System
//!
//! All tunables of the batching layer live here: logger level, batcher
//! capacities, trash batch sizing and texture array dimensions.
//!
//! Every struct derives `serde` with `#[serde(default)]`, so a config file
//! only needs to name the values it overrides:
//!
//! ```toml
//! [batcher]
//! max_meshes = 256
//!
//! [textures]
//! layers = 4
//! ```

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};

/// # Engine Configuration
///
/// Process-level behavior that is not tied to a single subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Geometry Batcher Configuration
///
/// Fixed capacities of one batcher. None of these change after the batcher
/// is created; size them for the heaviest frame you expect to pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Vertex buffer capacity, in vertices
    pub max_vertices: usize,
    /// Index buffer capacity, in 32-bit indices
    pub max_indices: usize,
    /// Maximum number of meshes recorded between two flushes
    pub max_meshes: usize,
    /// Name of the texture array sampler uniform bound to unit 0 at flush
    pub sampler_name: String,
}

impl BatcherConfig {
    /// Create a batcher configuration with explicit capacities
    pub fn new(max_vertices: usize, max_indices: usize, max_meshes: usize) -> Self {
        Self {
            max_vertices,
            max_indices,
            max_meshes,
            ..Self::default()
        }
    }

    /// Set the sampler uniform name
    pub fn with_sampler_name(mut self, name: impl Into<String>) -> Self {
        self.sampler_name = name.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_vertices == 0 || self.max_indices == 0 || self.max_meshes == 0 {
            return Err(format!(
                "Batcher capacities must be non-zero (vertices {}, indices {}, meshes {})",
                self.max_vertices, self.max_indices, self.max_meshes
            ));
        }

        // Rebased indices are u32, so every vertex slot must be addressable
        if u32::try_from(self.max_vertices).is_err() {
            return Err(format!(
                "max_vertices {} exceeds the 32-bit index range",
                self.max_vertices
            ));
        }

        if self.sampler_name.is_empty() {
            return Err("Sampler name cannot be empty".to_string());
        }

        Ok(())
    }
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_vertices: 65_536,
            max_indices: 196_608,
            max_meshes: 1_024,
            sampler_name: "textureArray".to_string(),
        }
    }
}

/// # Trash Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrashConfig {
    /// Initial item capacity of batches created through the render context
    pub default_batch_size: usize,
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 64,
        }
    }
}

/// # Texture Array Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureArrayConfig {
    /// Width of every layer in pixels
    pub width: u32,
    /// Height of every layer in pixels
    pub height: u32,
    /// Number of layers in the array
    pub layers: u32,
}

impl TextureArrayConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("Texture layers must have a non-zero size ({}x{})", self.width, self.height));
        }
        if self.layers == 0 {
            return Err("Texture array needs at least one layer".to_string());
        }
        Ok(())
    }
}

impl Default for TextureArrayConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            layers: 16,
        }
    }
}

/// # Render Configuration
///
/// Aggregate of every subsystem configuration, the unit loaded from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Engine-wide settings
    pub engine: EngineConfig,
    /// Default batcher capacities
    pub batcher: BatcherConfig,
    /// Trash batch settings
    pub trash: TrashConfig,
    /// Texture array settings
    pub textures: TextureArrayConfig,
}

impl RenderConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.batcher.validate().map_err(ConfigError::Invalid)?;
        self.textures.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

impl Config for RenderConfig {}
