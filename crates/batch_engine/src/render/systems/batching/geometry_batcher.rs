//! # Geometry Batcher
//!
//! Packs many independently authored meshes into one fixed-capacity vertex
//! buffer and one index buffer, then draws all of them with a single indexed
//! multi-draw.
//!
//! ## Architecture
//!
//! - **Bump allocation**: two cursors mark the next free vertex and index
//!   slot. Submitting a mesh copies it at the cursors and advances them;
//!   nothing is freed individually. A flush draws everything and resets both
//!   cursors to zero.
//! - **Index rebasing**: every mesh's indices assume its first vertex is 0.
//!   At submit time they are copied through a scratch buffer with the current
//!   vertex cursor added, so the draw can use a base vertex of 0 for every range.
//! - **Slot bookkeeping**: each submission records its vertex/index offset and
//!   count so the flush can rebuild one draw range per mesh.
//!
//! ## Capacity
//!
//! Capacities are fixed at construction. A submission that would exceed the
//! mesh limit or either buffer is rejected with a [`BatchError`] and leaves
//! the batcher untouched; flush and retry.

use crate::core::config::BatcherConfig;
use crate::render::api::{
    BufferHandle, BufferUsage, DeviceError, DrawRange, GraphicsDevice, ShaderHandle,
    TextureHandle, Topology, VertexLayoutHandle,
};
use crate::render::primitives::{Mesh, MeshError, Vertex};

/// Texture unit the texture array is bound to at flush
pub const TEXTURE_UNIT: u32 = 0;

const INDEX_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// Result type for batching operations
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors that can occur while packing or drawing a batch
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BatchError {
    /// Every mesh slot is in use until the next flush
    #[error("Mesh limit reached: {max} meshes already submitted")]
    MeshLimitReached {
        /// Maximum meshes per flush
        max: usize,
    },

    /// The vertex buffer cannot hold the mesh
    #[error("Vertex buffer full: {requested} vertices requested, {available} available")]
    VertexCapacityExceeded {
        /// Vertices in the rejected mesh
        requested: usize,
        /// Free vertex slots
        available: usize,
    },

    /// The index buffer cannot hold the mesh
    #[error("Index buffer full: {requested} indices requested, {available} available")]
    IndexCapacityExceeded {
        /// Indices in the rejected mesh
        requested: usize,
        /// Free index slots
        available: usize,
    },

    /// A rebased index does not fit in 32 bits
    #[error("Index {index} rebased by {base} overflows u32")]
    IndexOverflow {
        /// Original index
        index: u32,
        /// Vertex cursor it was rebased by
        base: usize,
    },

    /// The capacities cannot back a batcher
    #[error("Invalid batcher configuration: {0}")]
    InvalidConfig(String),

    /// The mesh is not a valid triangle list
    #[error("Invalid mesh: {0}")]
    InvalidMesh(#[from] MeshError),

    /// The batcher's device buffers were already released
    #[error("Batcher has been released")]
    Released,

    /// The device rejected an operation
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

/// Position of one submitted mesh inside the shared buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshSlot {
    /// First vertex of the mesh in the vertex buffer
    pub vertex_offset: usize,
    /// First index of the mesh in the index buffer
    pub index_offset: usize,
    /// Number of vertices copied
    pub vertex_count: usize,
    /// Number of indices copied
    pub index_count: usize,
}

impl MeshSlot {
    /// Draw range covering this slot's indices
    ///
    /// Base vertex is always 0 because indices were rebased at submit time.
    pub fn draw_range(&self) -> DrawRange {
        DrawRange {
            index_count: self.index_count as u32,
            index_byte_offset: self.index_offset as u64 * INDEX_SIZE,
            base_vertex: 0,
        }
    }
}

/// Lifecycle state of a batcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatcherState {
    /// Meshes may be submitted
    Accepting,
    /// Every mesh slot is used; flush before submitting again
    Full,
    /// Device buffers were released; the batcher cannot be used again
    Released,
}

/// What a flush handed to the device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// One range per submitted mesh, in submission order
    pub ranges: Vec<DrawRange>,
    /// Vertices that were packed
    pub vertices: usize,
    /// Indices that were packed
    pub indices: usize,
}

impl FlushReport {
    /// Whether the flush drew nothing
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Size in bytes of a buffer holding `count` elements of `stride` bytes
fn buffer_bytes(count: usize, stride: u64, buffer: &str) -> BatchResult<u64> {
    u64::try_from(count)
        .ok()
        .and_then(|count| count.checked_mul(stride))
        .ok_or_else(|| BatchError::InvalidConfig(format!("{buffer} buffer of {count} elements overflows u64 bytes")))
}

/// Packs meshes into shared device buffers and draws them with one call
#[derive(Debug)]
pub struct GeometryBatcher {
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    layout: VertexLayoutHandle,

    max_vertices: usize,
    max_indices: usize,
    max_meshes: usize,
    sampler_name: String,

    slots: Vec<MeshSlot>,
    vertex_cursor: usize,
    index_cursor: usize,

    // Reused between submissions so rebasing does not allocate per mesh
    rebase_scratch: Vec<u32>,
}

impl GeometryBatcher {
    /// Allocate the device buffers and vertex layout for a new batcher
    pub fn new(device: &mut dyn GraphicsDevice, config: &BatcherConfig) -> BatchResult<Self> {
        config.validate().map_err(BatchError::InvalidConfig)?;
        let vertex_bytes = buffer_bytes(config.max_vertices, Vertex::STRIDE as u64, "vertex")?;
        let index_bytes = buffer_bytes(config.max_indices, INDEX_SIZE, "index")?;

        let vertex_buffer = device.create_buffer(BufferUsage::Vertex, vertex_bytes)?;
        if vertex_buffer.is_null() {
            log::error!("Failed to create vertex buffer ({} bytes)", vertex_bytes);
            return Err(DeviceError::NullHandle("vertex buffer").into());
        }

        let index_buffer = match device.create_buffer(BufferUsage::Index, index_bytes) {
            Ok(handle) if !handle.is_null() => handle,
            other => {
                log::error!("Failed to create index buffer ({} bytes)", index_bytes);
                device.destroy_buffer(vertex_buffer);
                other?;
                return Err(DeviceError::NullHandle("index buffer").into());
            }
        };

        let attributes = Vertex::attributes();
        let layout = match device.create_vertex_layout(vertex_buffer, index_buffer, Vertex::STRIDE, &attributes) {
            Ok(handle) if !handle.is_null() => handle,
            other => {
                log::error!("Failed to create vertex layout for batcher");
                device.destroy_buffer(index_buffer);
                device.destroy_buffer(vertex_buffer);
                other?;
                return Err(DeviceError::NullHandle("vertex layout").into());
            }
        };

        log::info!(
            "Created geometry batcher: {} vertices ({} bytes), {} indices ({} bytes), {} meshes",
            config.max_vertices, vertex_bytes, config.max_indices, index_bytes, config.max_meshes
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            layout,
            max_vertices: config.max_vertices,
            max_indices: config.max_indices,
            max_meshes: config.max_meshes,
            sampler_name: config.sampler_name.clone(),
            slots: Vec::with_capacity(config.max_meshes),
            vertex_cursor: 0,
            index_cursor: 0,
            rebase_scratch: Vec::new(),
        })
    }

    /// Copy a mesh into the shared buffers and record its slot
    ///
    /// On any error the batcher is left exactly as it was.
    pub fn submit(&mut self, device: &mut dyn GraphicsDevice, mesh: &Mesh) -> BatchResult<()> {
        if self.is_released() {
            return Err(BatchError::Released);
        }
        if let Err(error) = mesh.validate() {
            log::warn!("Rejecting mesh submission: {}", error);
            return Err(error.into());
        }
        if self.slots.len() == self.max_meshes {
            log::warn!("Rejecting mesh submission: {} meshes already batched", self.max_meshes);
            return Err(BatchError::MeshLimitReached { max: self.max_meshes });
        }

        let vertex_count = mesh.vertex_count();
        let index_count = mesh.index_count();

        let free_vertices = self.max_vertices - self.vertex_cursor;
        if vertex_count > free_vertices {
            log::warn!("Rejecting mesh submission: {} vertices, {} free", vertex_count, free_vertices);
            return Err(BatchError::VertexCapacityExceeded { requested: vertex_count, available: free_vertices });
        }
        let free_indices = self.max_indices - self.index_cursor;
        if index_count > free_indices {
            log::warn!("Rejecting mesh submission: {} indices, {} free", index_count, free_indices);
            return Err(BatchError::IndexCapacityExceeded { requested: index_count, available: free_indices });
        }

        self.rebase_indices(&mesh.indices)?;

        device.upload_buffer(
            self.vertex_buffer,
            (self.vertex_cursor * Vertex::STRIDE) as u64,
            bytemuck::cast_slice(&mesh.vertices),
        )?;
        device.upload_buffer(
            self.index_buffer,
            self.index_cursor as u64 * INDEX_SIZE,
            bytemuck::cast_slice(&self.rebase_scratch),
        )?;

        self.slots.push(MeshSlot {
            vertex_offset: self.vertex_cursor,
            index_offset: self.index_cursor,
            vertex_count,
            index_count,
        });
        self.vertex_cursor += vertex_count;
        self.index_cursor += index_count;

        log::trace!(
            "Batched mesh #{}: {} vertices, {} indices (cursors {}/{})",
            self.slots.len() - 1, vertex_count, index_count, self.vertex_cursor, self.index_cursor
        );
        Ok(())
    }

    /// Fill the scratch buffer with `indices` shifted by the vertex cursor
    fn rebase_indices(&mut self, indices: &[u32]) -> BatchResult<()> {
        let base = self.vertex_cursor;
        let offset = u32::try_from(base).map_err(|_| BatchError::IndexOverflow { index: 0, base })?;

        self.rebase_scratch.clear();
        self.rebase_scratch.reserve(indices.len());
        for &index in indices {
            let rebased = index
                .checked_add(offset)
                .ok_or(BatchError::IndexOverflow { index, base })?;
            self.rebase_scratch.push(rebased);
        }
        Ok(())
    }

    /// Draw every mesh submitted since the last flush, then empty the batcher
    ///
    /// Binds `texture` to unit 0, points the program's sampler uniform at it
    /// and issues one multi-draw with one range per mesh. An empty batcher
    /// draws nothing. The batcher is emptied even when the device rejects the
    /// draw.
    pub fn flush(
        &mut self,
        device: &mut dyn GraphicsDevice,
        shader: ShaderHandle,
        texture: TextureHandle,
    ) -> BatchResult<FlushReport> {
        if self.is_released() {
            return Err(BatchError::Released);
        }
        if self.slots.is_empty() {
            return Ok(FlushReport::default());
        }

        device.bind_texture_array(TEXTURE_UNIT, texture);
        match device.sampler_slot(shader, &self.sampler_name) {
            Some(slot) => device.set_sampler_unit(shader, slot, TEXTURE_UNIT),
            None => log::debug!("Program {:?} has no sampler uniform '{}'", shader, self.sampler_name),
        }

        let report = FlushReport {
            ranges: self.slots.iter().map(MeshSlot::draw_range).collect(),
            vertices: self.vertex_cursor,
            indices: self.index_cursor,
        };
        let result = device.multi_draw_indexed(self.layout, Topology::TriangleList, &report.ranges);

        device.bind_texture_array(TEXTURE_UNIT, TextureHandle::NULL);
        self.reset();

        match result {
            Ok(()) => {
                log::debug!(
                    "Flushed {} meshes ({} vertices, {} indices) in one draw",
                    report.ranges.len(), report.vertices, report.indices
                );
                Ok(report)
            }
            Err(error) => {
                log::error!("Multi-draw of {} meshes failed: {}", report.ranges.len(), error);
                Err(error.into())
            }
        }
    }

    fn reset(&mut self) {
        self.slots.clear();
        self.vertex_cursor = 0;
        self.index_cursor = 0;
    }

    /// Destroy the device buffers and layout
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if self.is_released() {
            return;
        }

        device.destroy_vertex_layout(self.layout);
        device.destroy_buffer(self.vertex_buffer);
        device.destroy_buffer(self.index_buffer);

        self.layout = VertexLayoutHandle::NULL;
        self.vertex_buffer = BufferHandle::NULL;
        self.index_buffer = BufferHandle::NULL;
        self.reset();

        log::debug!("Released geometry batcher buffers");
    }

    /// Whether [`release`](Self::release) has run
    pub fn is_released(&self) -> bool {
        self.vertex_buffer.is_null()
    }

    /// Current lifecycle state
    pub fn state(&self) -> BatcherState {
        if self.is_released() {
            BatcherState::Released
        } else if self.slots.len() == self.max_meshes {
            BatcherState::Full
        } else {
            BatcherState::Accepting
        }
    }

    /// Meshes submitted since the last flush
    pub fn mesh_count(&self) -> usize {
        self.slots.len()
    }

    /// Next free vertex slot
    pub fn vertex_cursor(&self) -> usize {
        self.vertex_cursor
    }

    /// Next free index slot
    pub fn index_cursor(&self) -> usize {
        self.index_cursor
    }

    /// Recorded slots, in submission order
    pub fn slots(&self) -> &[MeshSlot] {
        &self.slots
    }

    /// Vertex buffer capacity in vertices
    pub fn max_vertices(&self) -> usize {
        self.max_vertices
    }

    /// Index buffer capacity in indices
    pub fn max_indices(&self) -> usize {
        self.max_indices
    }

    /// Mesh slots per flush
    pub fn max_meshes(&self) -> usize {
        self.max_meshes
    }

    /// Device vertex buffer, null after release
    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    /// Device index buffer, null after release
    pub fn index_buffer(&self) -> BufferHandle {
        self.index_buffer
    }

    /// Device vertex layout, null after release
    pub fn layout(&self) -> VertexLayoutHandle {
        self.layout
    }
}

impl Drop for GeometryBatcher {
    fn drop(&mut self) {
        if !self.is_released() {
            log::warn!(
                "GeometryBatcher dropped without release; buffers {:?}/{:?} leak on the device",
                self.vertex_buffer, self.index_buffer
            );
        }
    }
}
