//! Host pixel buffers and the generic image loader used on the fallback path.

use crate::error::JpegError;
use image::{ColorType, DynamicImage, GrayImage, RgbImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 3-byte pixels in blue, green, red order.
    Bgr24,
    /// One byte per pixel.
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgr24 => 3,
            Self::Gray8 => 1,
        }
    }

    pub fn channel_count(self) -> u8 {
        self.bytes_per_pixel() as u8
    }
}

/// An uncompressed image with rows packed without padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: usize, height: usize, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0; width * height * format.bytes_per_pixel()],
        }
    }

    pub fn from_raw(
        width: usize,
        height: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, JpegError> {
        let expected = width * height * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(JpegError::PixelBufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn stride(&self) -> usize {
        self.width * self.format.bytes_per_pixel()
    }

    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = y * self.stride() + x * bpp;
        &self.data[offset..offset + bpp]
    }

    /// Converts any decoded image: grayscale sources stay gray, everything
    /// else becomes BGR with alpha dropped.
    pub fn from_dynamic_image(image: &DynamicImage) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);
        match image.color() {
            ColorType::L8 | ColorType::L16 => Self {
                width,
                height,
                format: PixelFormat::Gray8,
                data: image.to_luma8().into_raw(),
            },
            _ => {
                let mut data = image.to_rgb8().into_raw();
                for pixel in data.chunks_exact_mut(3) {
                    pixel.swap(0, 2);
                }
                Self {
                    width,
                    height,
                    format: PixelFormat::Bgr24,
                    data,
                }
            }
        }
    }

    pub fn to_dynamic_image(&self) -> Result<DynamicImage, JpegError> {
        let invalid = || JpegError::PixelBufferSize {
            expected: self.width * self.height * self.format.bytes_per_pixel(),
            actual: self.data.len(),
        };
        let (width, height) = (self.width as u32, self.height as u32);
        match self.format {
            PixelFormat::Gray8 => GrayImage::from_raw(width, height, self.data.clone())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(invalid),
            PixelFormat::Bgr24 => {
                let mut rgb = self.data.clone();
                for pixel in rgb.chunks_exact_mut(3) {
                    pixel.swap(0, 2);
                }
                RgbImage::from_raw(width, height, rgb)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(invalid)
            }
        }
    }
}

/// Decodes images the structured decoder does not handle.
pub trait ImageLoader {
    fn load(&self, data: &[u8]) -> Result<Bitmap, JpegError>;
}

/// Loads any format the `image` crate was built with.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericImageLoader;

impl ImageLoader for GenericImageLoader {
    fn load(&self, data: &[u8]) -> Result<Bitmap, JpegError> {
        let image = image::load_from_memory(data)?;
        Ok(Bitmap::from_dynamic_image(&image))
    }
}
