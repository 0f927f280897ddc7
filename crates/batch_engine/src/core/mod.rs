//! # Core Engine Module
//!
//! Shared configuration types used by every subsystem of the batching layer.

pub mod config;

pub use config::{
    BatcherConfig,
    Config,
    ConfigError,
    EngineConfig,
    RenderConfig,
    TextureArrayConfig,
    TrashConfig,
};
