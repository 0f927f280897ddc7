//! Layered RGBA8 texture used by the batch shaders
//!
//! Every vertex carries a texture layer index, so a whole batch can sample
//! many images through the single texture bound at flush. Layers are filled
//! in load order until the array is full.

use std::path::Path;

use crate::render::api::{DeviceError, GraphicsDevice, TextureArrayDescriptor, TextureHandle};

/// Result type for texture array operations
pub type TextureResult<T> = Result<T, TextureError>;

/// Errors that can occur while filling a texture array
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    /// Every layer has already been loaded
    #[error("Texture array is full ({layers} layers)")]
    ArrayFull {
        /// Layers in the array
        layers: u32,
    },

    /// Requested layer does not exist
    #[error("Layer {layer} is outside texture array with {layers} layers")]
    LayerOutOfRange {
        /// Requested layer
        layer: u32,
        /// Layers in the array
        layers: u32,
    },

    /// Image could not be read or decoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// The device rejected an operation
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

/// Mip levels needed to reduce the largest dimension to one texel
pub fn mip_levels(width: u32, height: u32) -> u32 {
    width.max(height).max(1).ilog2() + 1
}

/// A fixed slab of equally sized texture layers
#[derive(Debug)]
pub struct TextureArray {
    handle: TextureHandle,
    width: u32,
    height: u32,
    layers: u32,
    used_layers: u32,
}

impl TextureArray {
    /// Allocate a texture array with a full mip chain
    pub fn new(device: &mut dyn GraphicsDevice, width: u32, height: u32, layers: u32) -> TextureResult<Self> {
        let descriptor = TextureArrayDescriptor {
            width,
            height,
            layers,
            mip_levels: mip_levels(width, height),
        };

        let handle = device.create_texture_array(&descriptor)?;
        if handle.is_null() {
            log::error!("Failed to create {}x{} texture array with {} layers", width, height, layers);
            return Err(DeviceError::NullHandle("texture array").into());
        }

        log::info!(
            "Created texture array {:?}: {}x{}, {} layers, {} mip levels",
            handle, width, height, layers, descriptor.mip_levels
        );

        Ok(Self {
            handle,
            width,
            height,
            layers,
            used_layers: 0,
        })
    }

    /// Decode an image file into `layer`
    ///
    /// The image is flipped vertically so its first row lands at texture
    /// coordinate v = 0, converted to RGBA8 and uploaded, then the mip chain
    /// is rebuilt. Returns the layer on success.
    pub fn load_layer<P: AsRef<Path>>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        path: P,
        layer: u32,
    ) -> TextureResult<u32> {
        let path = path.as_ref();
        self.check_layer(layer).inspect_err(|_| {
            log::warn!("Not loading texture {:?} into layer {}: array has no room", path, layer);
        })?;

        log::debug!("Loading texture layer {} from {:?}", layer, path);
        let image = image::open(path)
            .inspect_err(|e| log::warn!("Failed to load texture {:?}: {}", path, e))?
            .flipv()
            .to_rgba8();
        let (width, height) = image.dimensions();

        self.upload_layer_rgba(device, layer, width, height, image.as_raw())?;
        log::info!("Loaded texture {:?} ({}x{}) into layer {}", path, width, height, layer);
        Ok(layer)
    }

    /// Upload tightly packed RGBA8 pixels into `layer` and rebuild mipmaps
    ///
    /// The pixels are written at the layer origin; smaller images leave the
    /// rest of the layer untouched.
    pub fn upload_layer_rgba(
        &mut self,
        device: &mut dyn GraphicsDevice,
        layer: u32,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> TextureResult<()> {
        self.check_layer(layer)?;

        device.upload_texture_layer(self.handle, layer, width, height, rgba)?;
        device.generate_mipmaps(self.handle)?;
        self.used_layers += 1;
        Ok(())
    }

    fn check_layer(&self, layer: u32) -> TextureResult<()> {
        if self.used_layers >= self.layers {
            return Err(TextureError::ArrayFull { layers: self.layers });
        }
        if layer >= self.layers {
            return Err(TextureError::LayerOutOfRange { layer, layers: self.layers });
        }
        Ok(())
    }

    /// Free the device texture
    ///
    /// Safe to call more than once.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if self.handle.is_null() {
            return;
        }
        device.destroy_texture_array(self.handle);
        log::debug!("Released texture array {:?}", self.handle);

        self.handle = TextureHandle::NULL;
        self.layers = 0;
        self.used_layers = 0;
    }

    /// Device handle, bound at flush; null after release
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    /// Whether [`release`](Self::release) has run
    pub fn is_released(&self) -> bool {
        self.handle.is_null()
    }

    /// Layer width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Layer height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Layers in the array, 0 after release
    pub fn layers(&self) -> u32 {
        self.layers
    }

    /// Layers loaded so far
    pub fn used_layers(&self) -> u32 {
        self.used_layers
    }
}
