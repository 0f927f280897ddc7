//! # Resource Trash
//!
//! Deferred release of meshes, batchers and texture arrays.
//!
//! Callers hand finished resources to a [`TrashBatch`] instead of releasing
//! them one by one. Clearing the batch releases every item in the order it
//! was added; the batch stays usable afterwards. Batches can also be
//! registered with a [`TrashRegistry`] so that everything still pending is
//! released in one pass at shutdown.
//!
//! The registry only holds weak references. Dropping the last strong
//! reference to a batch removes it from the shutdown pass without any
//! explicit unregister call.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use slotmap::{new_key_type, SlotMap};

use crate::render::api::GraphicsDevice;
use crate::render::primitives::Mesh;
use crate::render::resources::TextureArray;
use crate::render::systems::batching::GeometryBatcher;

/// Slots added to a full batch before appending
pub const GROWTH_INCREMENT: usize = 256;

/// Maximum number of batches a registry tracks at once
pub const MAX_REGISTERED_BATCHES: usize = 64;

/// Result type for trash registry operations
pub type TrashResult<T> = Result<T, TrashError>;

/// Errors raised by the trash registry
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrashError {
    /// The registry already tracks the maximum number of live batches
    #[error("Trash registry is full ({max} batches); the batch still works but is skipped at teardown")]
    RegistryFull {
        /// Registry bound
        max: usize,
    },
}

/// What a trash item holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrashItemKind {
    /// Host-side mesh data
    Mesh,
    /// A batcher and its device buffers
    Buffer,
    /// A device texture array
    TextureArray,
}

impl fmt::Display for TrashItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrashItemKind::Mesh => write!(f, "mesh"),
            TrashItemKind::Buffer => write!(f, "buffer"),
            TrashItemKind::TextureArray => write!(f, "texture array"),
        }
    }
}

/// A resource waiting to be released
#[derive(Debug)]
pub enum TrashItem {
    /// Mesh storage, freed on release
    Mesh(Mesh),
    /// Batcher whose device buffers are destroyed on release
    Buffer(GeometryBatcher),
    /// Texture array destroyed on release
    TextureArray(TextureArray),
}

impl TrashItem {
    /// Kind of resource held
    pub fn kind(&self) -> TrashItemKind {
        match self {
            TrashItem::Mesh(_) => TrashItemKind::Mesh,
            TrashItem::Buffer(_) => TrashItemKind::Buffer,
            TrashItem::TextureArray(_) => TrashItemKind::TextureArray,
        }
    }

    /// Release the resource
    pub fn release(self, device: &mut dyn GraphicsDevice) {
        match self {
            TrashItem::Mesh(mesh) => drop(mesh),
            TrashItem::Buffer(mut batcher) => batcher.release(device),
            TrashItem::TextureArray(mut array) => array.release(device),
        }
    }
}

impl From<Mesh> for TrashItem {
    fn from(mesh: Mesh) -> Self {
        TrashItem::Mesh(mesh)
    }
}

impl From<GeometryBatcher> for TrashItem {
    fn from(batcher: GeometryBatcher) -> Self {
        TrashItem::Buffer(batcher)
    }
}

impl From<TextureArray> for TrashItem {
    fn from(array: TextureArray) -> Self {
        TrashItem::TextureArray(array)
    }
}

new_key_type! {
    /// Key of a batch inside a [`TrashRegistry`]
    pub struct TrashBatchKey;
}

/// A batch shared between its owner and a registry
pub type SharedTrashBatch = Rc<RefCell<TrashBatch>>;

/// Growable group of resources released together
#[derive(Debug)]
pub struct TrashBatch {
    items: Vec<TrashItem>,
    max_size: usize,
    registry_key: Option<TrashBatchKey>,
}

impl TrashBatch {
    /// Create a batch with room for `max_size` items
    pub fn new(max_size: usize) -> Self {
        Self {
            items: Vec::with_capacity(max_size),
            max_size,
            registry_key: None,
        }
    }

    /// Create a batch ready to be shared with a registry
    pub fn shared(max_size: usize) -> SharedTrashBatch {
        Rc::new(RefCell::new(Self::new(max_size)))
    }

    /// Queue a resource for release
    ///
    /// A full batch grows by [`GROWTH_INCREMENT`] slots first.
    pub fn add(&mut self, item: impl Into<TrashItem>) {
        if self.items.len() >= self.max_size {
            log::warn!(
                "Trash batch full at {} items, growing to {}",
                self.max_size,
                self.max_size + GROWTH_INCREMENT
            );
            self.max_size += GROWTH_INCREMENT;
            self.items.reserve_exact(self.max_size - self.items.len());
        }
        self.items.push(item.into());
    }

    /// Release every queued item in the order it was added
    ///
    /// Storage is kept so the batch can be refilled. Returns the number of
    /// items released.
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) -> usize {
        let count = self.items.len();
        for (index, item) in self.items.drain(..).enumerate() {
            log::trace!("Releasing trash item {} ({})", index, item.kind());
            item.release(device);
        }
        if count > 0 {
            log::debug!("Cleared {} trash items", count);
        }
        count
    }

    /// Release every item and free the batch's own storage
    ///
    /// Destroying an already destroyed batch does nothing. Adding to a
    /// destroyed batch allocates fresh storage.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) -> usize {
        let count = self.clear(device);
        self.items = Vec::new();
        self.max_size = 0;
        count
    }

    /// Items waiting to be released
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items the batch holds before it grows
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Kinds of the queued items, in release order
    pub fn kinds(&self) -> impl Iterator<Item = TrashItemKind> + '_ {
        self.items.iter().map(TrashItem::kind)
    }

    /// Registry key, if the batch is registered
    pub fn registry_key(&self) -> Option<TrashBatchKey> {
        self.registry_key
    }

    /// Whether the batch is tracked by a registry
    pub fn is_registered(&self) -> bool {
        self.registry_key.is_some()
    }
}

impl Drop for TrashBatch {
    fn drop(&mut self) {
        if !self.items.is_empty() {
            log::warn!("Trash batch dropped with {} unreleased items", self.items.len());
        }
    }
}

/// Tracks trash batches so they can all be destroyed at shutdown
#[derive(Debug, Default)]
pub struct TrashRegistry {
    batches: SlotMap<TrashBatchKey, Weak<RefCell<TrashBatch>>>,
}

impl TrashRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a batch for [`teardown`](Self::teardown)
    ///
    /// Batches dropped since the last call no longer count toward the
    /// bound. A full registry leaves the batch untracked. Registering a
    /// tracked batch again returns its existing key.
    pub fn register(&mut self, batch: &SharedTrashBatch) -> TrashResult<TrashBatchKey> {
        self.prune();
        let weak = Rc::downgrade(batch);
        if let Some(key) = self.key_of(&weak) {
            return Ok(key);
        }
        if self.batches.len() >= MAX_REGISTERED_BATCHES {
            log::warn!(
                "Max trash batches reached ({}); batch will not be released at teardown",
                MAX_REGISTERED_BATCHES
            );
            return Err(TrashError::RegistryFull { max: MAX_REGISTERED_BATCHES });
        }

        let key = self.batches.insert(weak);
        if let Ok(mut batch) = batch.try_borrow_mut() {
            batch.registry_key = Some(key);
        }
        log::trace!("Registered trash batch {:?}", key);
        Ok(key)
    }

    /// Stop tracking a batch; returns whether it was tracked
    pub fn unregister(&mut self, key: TrashBatchKey) -> bool {
        match self.batches.remove(key) {
            Some(weak) => {
                if let Some(batch) = weak.upgrade() {
                    if let Ok(mut batch) = batch.try_borrow_mut() {
                        batch.registry_key = None;
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Registered batches that are still alive
    pub fn live_count(&self) -> usize {
        self.batches.values().filter(|weak| weak.strong_count() > 0).count()
    }

    /// Destroy every live registered batch and empty the registry
    ///
    /// Returns the number of items released. Calling it again releases
    /// nothing. A batch that is mutably borrowed elsewhere stays registered
    /// so a later teardown can destroy it.
    pub fn teardown(&mut self, device: &mut dyn GraphicsDevice) -> usize {
        let mut released = 0;
        let mut destroyed = 0;

        let keys: Vec<TrashBatchKey> = self.batches.keys().collect();
        for key in keys {
            let Some(batch) = self.batches.get(key).and_then(Weak::upgrade) else {
                self.batches.remove(key);
                continue;
            };
            let Ok(mut batch) = batch.try_borrow_mut() else {
                log::warn!("Trash batch {:?} is borrowed during teardown; left registered", key);
                continue;
            };
            released += batch.destroy(device);
            batch.registry_key = None;
            self.batches.remove(key);
            destroyed += 1;
        }

        if destroyed > 0 {
            log::info!("Trash teardown destroyed {} batches ({} items)", destroyed, released);
        }
        released
    }

    fn key_of(&self, weak: &Weak<RefCell<TrashBatch>>) -> Option<TrashBatchKey> {
        self.batches
            .iter()
            .find_map(|(key, tracked)| tracked.ptr_eq(weak).then_some(key))
    }

    fn prune(&mut self) {
        self.batches.retain(|_, weak| weak.strong_count() > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::BatcherConfig;
    use crate::render::api::HeadlessDevice;
    use crate::render::primitives::Vertex;

    fn mesh() -> Mesh {
        Mesh::new(vec![Vertex::default(); 3], vec![0, 1, 2])
    }

    #[test]
    fn test_add_grows_by_increment() {
        let mut batch = TrashBatch::new(2);
        batch.add(mesh());
        batch.add(mesh());
        assert_eq!(batch.capacity(), 2);

        batch.add(mesh());
        assert_eq!(batch.capacity(), 2 + GROWTH_INCREMENT);
        assert_eq!(batch.len(), 3);

        let mut device = HeadlessDevice::new();
        batch.clear(&mut device);
    }

    #[test]
    fn test_clear_releases_in_order() {
        let mut device = HeadlessDevice::new();
        let batcher = GeometryBatcher::new(&mut device, &BatcherConfig::new(8, 8, 1)).unwrap();
        let array = TextureArray::new(&mut device, 2, 2, 1).unwrap();

        let mut batch = TrashBatch::new(4);
        batch.add(mesh());
        batch.add(batcher);
        batch.add(array);
        assert_eq!(
            batch.kinds().collect::<Vec<_>>(),
            vec![TrashItemKind::Mesh, TrashItemKind::Buffer, TrashItemKind::TextureArray]
        );

        assert_eq!(batch.clear(&mut device), 3);
        assert!(batch.is_empty());
        assert_eq!(batch.capacity(), 4);
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_layouts(), 0);
        assert_eq!(device.live_textures(), 0);

        // Second clear has nothing left to release
        assert_eq!(batch.clear(&mut device), 0);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut device = HeadlessDevice::new();
        let mut batch = TrashBatch::new(4);
        batch.add(mesh());

        assert_eq!(batch.destroy(&mut device), 1);
        assert_eq!(batch.capacity(), 0);
        assert_eq!(batch.destroy(&mut device), 0);

        // Destroyed batches can be refilled
        batch.add(mesh());
        assert_eq!(batch.capacity(), GROWTH_INCREMENT);
        batch.destroy(&mut device);
    }

    #[test]
    fn test_registry_teardown() {
        let mut device = HeadlessDevice::new();
        let mut registry = TrashRegistry::new();

        let first = TrashBatch::shared(4);
        let second = TrashBatch::shared(4);
        registry.register(&first).unwrap();
        registry.register(&second).unwrap();
        assert!(first.borrow().is_registered());

        first.borrow_mut().add(mesh());
        second.borrow_mut().add(TextureArray::new(&mut device, 2, 2, 1).unwrap());
        second.borrow_mut().add(mesh());

        assert_eq!(registry.teardown(&mut device), 3);
        assert_eq!(registry.live_count(), 0);
        assert!(first.borrow().is_empty());
        assert!(!second.borrow().is_registered());
        assert_eq!(device.live_textures(), 0);

        assert_eq!(registry.teardown(&mut device), 0);
    }

    #[test]
    fn test_registry_bound_counts_live_batches() {
        let mut registry = TrashRegistry::new();
        let batches: Vec<_> = (0..MAX_REGISTERED_BATCHES).map(|_| TrashBatch::shared(1)).collect();
        for batch in &batches {
            registry.register(batch).unwrap();
        }

        let extra = TrashBatch::shared(1);
        assert_eq!(
            registry.register(&extra),
            Err(TrashError::RegistryFull { max: MAX_REGISTERED_BATCHES })
        );
        assert!(!extra.borrow().is_registered());

        // Dropping a registered batch frees its slot
        drop(batches);
        assert_eq!(registry.live_count(), 0);
        assert!(registry.register(&extra).is_ok());
    }

    #[test]
    fn test_unregistered_batch_skipped_at_teardown() {
        let mut device = HeadlessDevice::new();
        let mut registry = TrashRegistry::new();
        let batch = TrashBatch::shared(1);
        let key = registry.register(&batch).unwrap();
        batch.borrow_mut().add(mesh());

        assert!(registry.unregister(key));
        assert!(!registry.unregister(key));
        assert_eq!(registry.teardown(&mut device), 0);
        assert_eq!(batch.borrow().len(), 1);
        batch.borrow_mut().clear(&mut device);
    }

    #[test]
    fn test_borrowed_batch_skipped_at_teardown() {
        let mut device = HeadlessDevice::new();
        let mut registry = TrashRegistry::new();
        let batch = TrashBatch::shared(1);
        registry.register(&batch).unwrap();

        let mut guard = batch.borrow_mut();
        guard.add(mesh());
        assert_eq!(registry.teardown(&mut device), 0);
        assert_eq!(guard.len(), 1);
        assert!(guard.is_registered());
        drop(guard);

        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.teardown(&mut device), 1);
        assert!(!batch.borrow().is_registered());
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_register_twice_reuses_key() {
        let mut registry = TrashRegistry::new();
        let batch = TrashBatch::shared(1);
        let first = registry.register(&batch).unwrap();
        let second = registry.register(&batch).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.live_count(), 1);

        assert!(registry.unregister(first));
        assert!(!batch.borrow().is_registered());
        assert_eq!(registry.live_count(), 0);
    }
}
