//! Sample media loading.
//!
//! Decodes image files into RGBA8 bitmaps that renderers draw as the base
//! layer under their overlays. Video and point-cloud media are decoded by
//! external collaborators; this module only handles still images.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

/// Supported image file extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "tif"];

/// Check if a filename has a supported image extension.
pub fn is_image_file(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Errors raised while loading sample media.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(String),
}

/// A decoded RGBA8 bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Bitmap {
    /// Wrap raw RGBA8 pixels. `data.len()` must be `width * height * 4`.
    pub fn from_rgba8(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            data,
            width,
            height,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Load and decode an image file from disk.
pub fn load_bitmap(path: &Path) -> Result<Arc<Bitmap>, MediaError> {
    log::debug!("Loading image: {:?}", path);

    let img = image::open(path).map_err(|e| MediaError::Decode(e.to_string()))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    log::debug!("Loaded {}x{} image", width, height);

    Ok(Arc::new(Bitmap::from_rgba8(rgba.into_raw(), width, height)))
}

/// Decode an image from in-memory bytes.
pub fn decode_bitmap(bytes: &[u8]) -> Result<Arc<Bitmap>, MediaError> {
    let img = image::load_from_memory(bytes).map_err(|e| MediaError::Decode(e.to_string()))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(Arc::new(Bitmap::from_rgba8(rgba.into_raw(), width, height)))
}
