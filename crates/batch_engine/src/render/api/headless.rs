//! # Headless Device
//!
//! In-memory [`GraphicsDevice`] that keeps buffer bytes, texture layers and a
//! log of every multi-draw it receives. It is the reference implementation of
//! the device contract: the batcher, texture arrays and trash registry are
//! all exercised against it, and tools can use it to pack geometry without a
//! GPU.
//!
//! Handle values start at 1 and are never reused, so a destroyed handle stays
//! unknown for the lifetime of the device.

use std::collections::HashMap;

use crate::render::primitives::VertexAttribute;
use super::device::{
    BufferHandle, BufferUsage, DeviceError, DeviceResult, DrawRange, GraphicsDevice,
    ShaderHandle, TextureArrayDescriptor, TextureHandle, Topology, VertexLayoutHandle,
};

/// A buffer held in host memory
#[derive(Debug, Clone)]
pub struct HeadlessBuffer {
    /// What the buffer was created for
    pub usage: BufferUsage,
    /// Buffer contents, zero-initialised
    pub data: Vec<u8>,
}

/// Vertex layout record
#[derive(Debug, Clone)]
pub struct HeadlessLayout {
    /// Vertex buffer bound to the layout
    pub vertex_buffer: BufferHandle,
    /// Index buffer bound to the layout
    pub index_buffer: BufferHandle,
    /// Vertex stride in bytes
    pub stride: usize,
    /// Attribute descriptions
    pub attributes: Vec<VertexAttribute>,
}

/// Texture array held in host memory
#[derive(Debug, Clone)]
pub struct HeadlessTexture {
    /// Allocation parameters
    pub descriptor: TextureArrayDescriptor,
    /// Level-0 pixels per layer, `None` until uploaded
    pub layers: Vec<Option<Vec<u8>>>,
    /// How many times the mip chain was regenerated
    pub mipmap_generations: u32,
}

/// One recorded multi-draw dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    /// Layout the draw used
    pub layout: VertexLayoutHandle,
    /// Topology of the draw
    pub topology: Topology,
    /// Sub-draws in dispatch order
    pub ranges: Vec<DrawRange>,
    /// Texture bound to unit 0 at dispatch time
    pub texture_unit0: TextureHandle,
}

/// In-memory graphics device
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_handle: u32,
    buffers: HashMap<BufferHandle, HeadlessBuffer>,
    layouts: HashMap<VertexLayoutHandle, HeadlessLayout>,
    textures: HashMap<TextureHandle, HeadlessTexture>,
    programs: HashMap<ShaderHandle, Vec<String>>,
    sampler_units: HashMap<(ShaderHandle, i32), u32>,
    bound_textures: HashMap<u32, TextureHandle>,
    draw_calls: Vec<DrawCall>,
    fail_creation: bool,
}

impl HeadlessDevice {
    /// Create an empty device
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent create call return the null handle
    ///
    /// Mirrors a driver that fails object creation without raising an error.
    pub fn set_fail_creation(&mut self, fail: bool) {
        self.fail_creation = fail;
    }

    /// Register a linked program exposing the given uniform names
    ///
    /// Slots are assigned in order, starting at 0.
    pub fn register_program(&mut self, uniforms: &[&str]) -> ShaderHandle {
        let handle = ShaderHandle(self.allocate_handle());
        self.programs.insert(handle, uniforms.iter().map(|s| (*s).to_string()).collect());
        handle
    }

    /// Contents of a live buffer
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    /// A live vertex layout
    pub fn layout(&self, layout: VertexLayoutHandle) -> Option<&HeadlessLayout> {
        self.layouts.get(&layout)
    }

    /// A live texture array
    pub fn texture(&self, texture: TextureHandle) -> Option<&HeadlessTexture> {
        self.textures.get(&texture)
    }

    /// Texture currently bound to a unit
    pub fn bound_texture(&self, unit: u32) -> TextureHandle {
        self.bound_textures.get(&unit).copied().unwrap_or(TextureHandle::NULL)
    }

    /// Texture unit a sampler uniform points at
    pub fn sampler_unit(&self, program: ShaderHandle, slot: i32) -> Option<u32> {
        self.sampler_units.get(&(program, slot)).copied()
    }

    /// Every multi-draw issued so far, oldest first
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    /// Number of live buffers
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live vertex layouts
    pub fn live_layouts(&self) -> usize {
        self.layouts.len()
    }

    /// Number of live texture arrays
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    fn allocate_handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn buffer_mut(&mut self, buffer: BufferHandle) -> DeviceResult<&mut HeadlessBuffer> {
        self.buffers.get_mut(&buffer).ok_or(DeviceError::UnknownBuffer(buffer))
    }
}

fn check_range(offset: u64, len: u64, size: u64) -> DeviceResult<()> {
    let end = offset.saturating_add(len);
    if end > size {
        return Err(DeviceError::OutOfRange { offset, end, size });
    }
    Ok(())
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&mut self, usage: BufferUsage, size: u64) -> DeviceResult<BufferHandle> {
        if self.fail_creation {
            return Ok(BufferHandle::NULL);
        }
        let handle = BufferHandle(self.allocate_handle());
        self.buffers.insert(handle, HeadlessBuffer { usage, data: vec![0; size as usize] });
        log::trace!("Headless buffer {:?} ({:?}, {} bytes)", handle, usage, size);
        Ok(handle)
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> DeviceResult<()> {
        let target = self.buffer_mut(buffer)?;
        check_range(offset, data.len() as u64, target.data.len() as u64)?;
        let start = offset as usize;
        target.data[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn create_vertex_layout(
        &mut self,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        stride: usize,
        attributes: &[VertexAttribute],
    ) -> DeviceResult<VertexLayoutHandle> {
        if self.fail_creation {
            return Ok(VertexLayoutHandle::NULL);
        }
        for buffer in [vertex_buffer, index_buffer] {
            if !self.buffers.contains_key(&buffer) {
                return Err(DeviceError::UnknownBuffer(buffer));
            }
        }
        let handle = VertexLayoutHandle(self.allocate_handle());
        self.layouts.insert(
            handle,
            HeadlessLayout { vertex_buffer, index_buffer, stride, attributes: attributes.to_vec() },
        );
        Ok(handle)
    }

    fn destroy_vertex_layout(&mut self, layout: VertexLayoutHandle) {
        self.layouts.remove(&layout);
    }

    fn sampler_slot(&self, program: ShaderHandle, name: &str) -> Option<i32> {
        self.programs
            .get(&program)?
            .iter()
            .position(|uniform| uniform == name)
            .map(|slot| slot as i32)
    }

    fn set_sampler_unit(&mut self, program: ShaderHandle, slot: i32, unit: u32) {
        self.sampler_units.insert((program, slot), unit);
    }

    fn bind_texture_array(&mut self, unit: u32, texture: TextureHandle) {
        if texture.is_null() {
            self.bound_textures.remove(&unit);
        } else {
            self.bound_textures.insert(unit, texture);
        }
    }

    fn multi_draw_indexed(
        &mut self,
        layout: VertexLayoutHandle,
        topology: Topology,
        ranges: &[DrawRange],
    ) -> DeviceResult<()> {
        let record = self.layouts.get(&layout).ok_or(DeviceError::UnknownLayout(layout))?;
        let index_buffer = self
            .buffers
            .get(&record.index_buffer)
            .ok_or(DeviceError::UnknownBuffer(record.index_buffer))?;
        let size = index_buffer.data.len() as u64;

        for range in ranges {
            check_range(range.index_byte_offset, u64::from(range.index_count) * 4, size)?;
        }

        let texture_unit0 = self.bound_texture(0);
        self.draw_calls.push(DrawCall {
            layout,
            topology,
            ranges: ranges.to_vec(),
            texture_unit0,
        });
        Ok(())
    }

    fn create_texture_array(&mut self, descriptor: &TextureArrayDescriptor) -> DeviceResult<TextureHandle> {
        if self.fail_creation {
            return Ok(TextureHandle::NULL);
        }
        let handle = TextureHandle(self.allocate_handle());
        self.textures.insert(
            handle,
            HeadlessTexture {
                descriptor: *descriptor,
                layers: vec![None; descriptor.layers as usize],
                mipmap_generations: 0,
            },
        );
        Ok(handle)
    }

    fn upload_texture_layer(
        &mut self,
        texture: TextureHandle,
        layer: u32,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> DeviceResult<()> {
        let target = self.textures.get_mut(&texture).ok_or(DeviceError::UnknownTexture(texture))?;
        let descriptor = target.descriptor;
        if layer >= descriptor.layers {
            return Err(DeviceError::InvalidLayer { layer, layers: descriptor.layers });
        }

        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(DeviceError::SizeMismatch { expected, actual: rgba.len() });
        }
        // Sub-image uploads must fit inside the allocated layer
        if width > descriptor.width || height > descriptor.height {
            return Err(DeviceError::SizeMismatch {
                expected: descriptor.width as usize * descriptor.height as usize * 4,
                actual: rgba.len(),
            });
        }

        target.layers[layer as usize] = Some(rgba.to_vec());
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: TextureHandle) -> DeviceResult<()> {
        let target = self.textures.get_mut(&texture).ok_or(DeviceError::UnknownTexture(texture))?;
        target.mipmap_generations += 1;
        Ok(())
    }

    fn destroy_texture_array(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.bound_textures.retain(|_, bound| *bound != texture);
    }
}
