use image::{ImageBuffer, ImageFormat, Rgba, RgbaImage};

use crate::error::PaletteError;

/// Content type assumed when an image source does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// A decoded raster image as a flat RGBA8 buffer.
///
/// Construction guarantees `width * height * 4 == data.len()` with both
/// dimensions non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, PaletteError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4));

        if width == 0 || height == 0 || expected != Some(data.len()) {
            return Err(PaletteError::MalformedInput {
                width,
                height,
                len: data.len(),
            });
        }

        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn from_rgba(image: RgbaImage) -> Result<Self, PaletteError> {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
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

    pub fn pixel_count(&self) -> usize {
        self.data.len() / 4
    }

    /// Borrow the buffer as an `image` view without copying.
    pub fn as_image(&self) -> Result<ImageBuffer<Rgba<u8>, &[u8]>, PaletteError> {
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice()).ok_or(
            PaletteError::MalformedInput {
                width: self.width,
                height: self.height,
                len: self.data.len(),
            },
        )
    }
}

/// Map a declared MIME type (parameters allowed) to an image format.
pub fn format_for_content_type(content_type: &str) -> Option<ImageFormat> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "image/jpg" | "image/pjpeg" => Some(ImageFormat::Jpeg),
        other => ImageFormat::from_mime_type(other),
    }
}

/// Decode encoded image bytes into RGBA pixels.
///
/// The declared content type picks the decoder. Unknown or generic types
/// (`application/octet-stream`) fall back to sniffing the bytes.
pub fn decode(bytes: &[u8], content_type: &str) -> Result<PixelBuffer, PaletteError> {
    let format = match format_for_content_type(content_type) {
        Some(format) => format,
        None => image::guess_format(bytes)
            .map_err(|_| PaletteError::UnsupportedFormat(content_type.to_string()))?,
    };

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|source| PaletteError::Decode { source })?;

    PixelBuffer::from_rgba(img.to_rgba8())
}
