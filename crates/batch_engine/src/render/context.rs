//! # Render Context
//!
//! Owns the graphics device, the render configuration and the trash
//! registry. Resources are created through the context so they pick up the
//! configured capacities, and batches registered here are destroyed when
//! the context is torn down.
//!
//! ```no_run
//! use batch_engine::prelude::*;
//!
//! let mut context = RenderContext::new(HeadlessDevice::new(), RenderConfig::default())?;
//! let mut batcher = context.create_batcher()?;
//! let trash = context.create_trash_batch(16, true);
//!
//! batcher.submit(context.device_mut(), &Mesh::cube(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), [1.0, 1.0]))?;
//! batcher.flush(context.device_mut(), ShaderHandle::NULL, TextureHandle::NULL)?;
//!
//! trash.borrow_mut().add(batcher);
//! context.teardown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::core::config::{BatcherConfig, ConfigError, RenderConfig};
use crate::render::api::GraphicsDevice;
use crate::render::resources::{
    SharedTrashBatch, TextureArray, TextureResult, TrashBatch, TrashBatchKey, TrashRegistry, TrashResult,
};
use crate::render::systems::batching::{BatchResult, GeometryBatcher};

/// Device, configuration and trash registry for one rendering setup
pub struct RenderContext<D: GraphicsDevice> {
    device: D,
    config: RenderConfig,
    trash: TrashRegistry,
}

impl<D: GraphicsDevice> RenderContext<D> {
    /// Create a context after validating the configuration
    pub fn new(device: D, config: RenderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!(
            "Render context created (batcher {}v/{}i/{}m, textures {}x{}x{})",
            config.batcher.max_vertices,
            config.batcher.max_indices,
            config.batcher.max_meshes,
            config.textures.width,
            config.textures.height,
            config.textures.layers
        );

        Ok(Self {
            device,
            config,
            trash: TrashRegistry::new(),
        })
    }

    /// The device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The device, for submit and flush calls
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Active configuration
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// The trash registry
    pub fn trash_registry(&self) -> &TrashRegistry {
        &self.trash
    }

    /// Create a batcher with the configured capacities
    pub fn create_batcher(&mut self) -> BatchResult<GeometryBatcher> {
        GeometryBatcher::new(&mut self.device, &self.config.batcher)
    }

    /// Create a batcher with explicit capacities
    pub fn create_batcher_with(&mut self, config: &BatcherConfig) -> BatchResult<GeometryBatcher> {
        GeometryBatcher::new(&mut self.device, config)
    }

    /// Create a texture array with the configured dimensions
    pub fn create_texture_array(&mut self) -> TextureResult<TextureArray> {
        let textures = &self.config.textures;
        TextureArray::new(&mut self.device, textures.width, textures.height, textures.layers)
    }

    /// Create a trash batch, registering it for teardown when `auto_register` is set
    ///
    /// A full registry is logged and the batch is returned unregistered; it
    /// still works but must be destroyed by its owner.
    pub fn create_trash_batch(&mut self, max_size: usize, auto_register: bool) -> SharedTrashBatch {
        let batch = TrashBatch::shared(max_size);
        if auto_register {
            if let Err(error) = self.trash.register(&batch) {
                log::debug!("Returning unregistered trash batch: {}", error);
            }
        }
        batch
    }

    /// Create a registered trash batch with the configured size
    pub fn create_default_trash_batch(&mut self) -> SharedTrashBatch {
        self.create_trash_batch(self.config.trash.default_batch_size, true)
    }

    /// Register an existing batch for teardown
    pub fn register_trash_batch(&mut self, batch: &SharedTrashBatch) -> TrashResult<TrashBatchKey> {
        self.trash.register(batch)
    }

    /// Remove a batch from teardown
    pub fn unregister_trash_batch(&mut self, key: TrashBatchKey) -> bool {
        self.trash.unregister(key)
    }

    /// Destroy every registered batch
    ///
    /// Returns the number of items released. Also runs when the context is
    /// dropped; calling it again releases nothing.
    pub fn teardown(&mut self) -> usize {
        self.trash.teardown(&mut self.device)
    }
}

impl<D: GraphicsDevice> Drop for RenderContext<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::HeadlessDevice;
    use crate::render::primitives::Mesh;
    use crate::render::resources::MAX_REGISTERED_BATCHES;

    fn context() -> RenderContext<HeadlessDevice> {
        let mut config = RenderConfig::default();
        config.batcher = BatcherConfig::new(128, 256, 8);
        config.textures.layers = 2;
        RenderContext::new(HeadlessDevice::new(), config).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = RenderConfig::default();
        config.batcher.max_meshes = 0;
        assert!(matches!(
            RenderContext::new(HeadlessDevice::new(), config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_resources_use_config() {
        let mut context = context();
        let mut batcher = context.create_batcher().unwrap();
        let mut array = context.create_texture_array().unwrap();

        assert_eq!(batcher.max_meshes(), 8);
        assert_eq!(array.layers(), 2);
        assert_eq!(context.device().live_buffers(), 2);

        batcher.release(context.device_mut());
        array.release(context.device_mut());
    }

    #[test]
    fn test_teardown_releases_registered_batches() {
        let mut context = context();
        let registered = context.create_default_trash_batch();
        let standalone = context.create_trash_batch(4, false);

        let batcher = context.create_batcher().unwrap();
        registered.borrow_mut().add(batcher);
        registered.borrow_mut().add(Mesh::empty());
        standalone.borrow_mut().add(Mesh::empty());

        assert_eq!(context.teardown(), 2);
        assert_eq!(context.device().live_buffers(), 0);
        assert_eq!(standalone.borrow().len(), 1);
        assert_eq!(context.teardown(), 0);

        standalone.borrow_mut().clear(context.device_mut());
    }

    #[test]
    fn test_drop_runs_teardown() {
        let batch;
        {
            let mut context = context();
            batch = context.create_default_trash_batch();
            let array = context.create_texture_array().unwrap();
            batch.borrow_mut().add(array);
        }
        assert!(batch.borrow().is_empty());
        assert_eq!(batch.borrow().capacity(), 0);
    }

    #[test]
    fn test_registry_overflow_returns_unregistered_batch() {
        let mut context = context();
        let batches: Vec<_> = (0..MAX_REGISTERED_BATCHES)
            .map(|_| context.create_trash_batch(1, true))
            .collect();
        let extra = context.create_trash_batch(1, true);

        assert!(batches.iter().all(|b| b.borrow().is_registered()));
        assert!(!extra.borrow().is_registered());
        assert_eq!(context.trash_registry().live_count(), MAX_REGISTERED_BATCHES);
    }
}
