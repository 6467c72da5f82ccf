use image::RgbImage;

use crate::errors::{AgroScanError, Result};

/// Number of channels expected in an input buffer.
pub const CHANNELS: usize = 3;

/// An owned width x height x 3 buffer of 8-bit RGB samples.
///
/// The engine only ever reads a buffer; every stage that derives data from
/// it produces a fresh value (`IndexField`, `BinaryMask`, result records).
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a buffer from raw interleaved RGB bytes.
    ///
    /// Fails with `InvalidInput` on zero dimensions or a length mismatch.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AgroScanError::InvalidInput(format!(
                "buffer dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(AgroScanError::InvalidInput(format!(
                "buffer length {} does not match {}x{}x{} = {}",
                data.len(),
                width,
                height,
                CHANNELS,
                expected
            )));
        }
        Ok(Self { width, height, data })
    }

    /// Create a buffer filled with a single RGB color (mainly for tests).
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Result<Self> {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * CHANNELS);
        for _ in 0..pixels {
            data.extend_from_slice(&color);
        }
        Self::new(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn total_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// RGB sample at (x, y). Callers guarantee in-bounds coordinates.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Borrow the underlying bytes as an `image::RgbImage` copy.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("dimensions validated at construction")
    }

    pub fn from_rgb_image(image: &RgbImage) -> Result<Self> {
        Self::new(image.width(), image.height(), image.as_raw().clone())
    }

    /// Downscale so the longer side fits `max_dimension`, preserving aspect
    /// ratio. Returns `None` when the buffer already fits; otherwise the
    /// scaled copy and the scale factor (< 1.0) that was applied.
    pub fn downscale_to_fit(&self, max_dimension: u32) -> Option<(PixelBuffer, f32)> {
        let longer = self.width.max(self.height);
        if max_dimension == 0 || longer <= max_dimension {
            return None;
        }
        let scale = max_dimension as f32 / longer as f32;
        let new_w = ((self.width as f32 * scale) as u32).max(1);
        let new_h = ((self.height as f32 * scale) as u32).max(1);
        let resized = image::imageops::resize(
            &self.to_rgb_image(),
            new_w,
            new_h,
            image::imageops::FilterType::Triangle,
        );
        let buffer = PixelBuffer {
            width: new_w,
            height: new_h,
            data: resized.into_raw(),
        };
        Some((buffer, scale))
    }
}

/// Per-pixel floating-point map sharing a buffer's spatial dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexField {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl IndexField {
    pub(crate) fn from_data(width: u32, height: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self { width, height, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }
}

/// Per-pixel boolean map marking vegetation vs background.
///
/// Immutable once produced; stages that refine a mask return a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl BinaryMask {
    pub(crate) fn from_data(width: u32, height: u32, data: Vec<bool>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self { width, height, data }
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub(crate) fn set(&mut self, x: u32, y: u32, value: bool) {
        self.data[y as usize * self.width as usize + x as usize] = value;
    }

    pub fn values(&self) -> &[bool] {
        &self.data
    }

    /// Count of true ("vegetation") pixels.
    pub fn count_on(&self) -> u64 {
        self.data.iter().filter(|&&v| v).count() as u64
    }

    /// New mask with every pixel of `other` removed from this one.
    ///
    /// Used to resolve symptom-category overlaps by priority.
    pub fn and_not(&self, other: &BinaryMask) -> BinaryMask {
        debug_assert_eq!(self.dimensions(), other.dimensions());
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| a && !b)
            .collect();
        BinaryMask {
            width: self.width,
            height: self.height,
            data,
        }
    }
}
