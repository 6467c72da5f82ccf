use crate::buffer::BinaryMask;
use crate::errors::{AgroScanError, Result};

/// Largest accepted structuring-element size.
pub const MAX_KERNEL_SIZE: u32 = 51;

/// Circular structuring element, precomputed as a list of pixel offsets
/// relative to the kernel center.
#[derive(Debug, Clone)]
pub struct Kernel {
    size: u32,
    offsets: Vec<(i32, i32)>,
}

impl Kernel {
    /// Build a circular kernel of the given odd diameter.
    pub fn circular(size: u32) -> Result<Self> {
        if size == 0 || size % 2 == 0 || size > MAX_KERNEL_SIZE {
            return Err(AgroScanError::InvalidParameter {
                name: "kernel_size",
                value: size as f64,
                range: "odd, [1, 51]",
            });
        }

        let radius = ((size - 1) / 2) as i32;
        let radius_sq = (radius as f32).powi(2);
        let mut offsets = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let dist_sq = (dx * dx + dy * dy) as f32;
                // Small epsilon so points exactly on the circumference count.
                if dist_sq <= radius_sq + 1e-6 {
                    offsets.push((dx, dy));
                }
            }
        }
        Ok(Self { size, offsets })
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

/// Morphological erosion: a pixel survives only if every kernel-covered
/// neighbor is on. Out-of-bounds neighbors count as background, so blobs
/// touching the border erode from the border inward.
pub fn erode(mask: &BinaryMask, kernel: &Kernel, iterations: u32) -> BinaryMask {
    let mut current = mask.clone();
    for _ in 0..iterations {
        current = erode_once(&current, kernel);
    }
    current
}

/// Morphological dilation: a pixel turns on if any kernel-covered neighbor
/// is on.
pub fn dilate(mask: &BinaryMask, kernel: &Kernel, iterations: u32) -> BinaryMask {
    let mut current = mask.clone();
    for _ in 0..iterations {
        current = dilate_once(&current, kernel);
    }
    current
}

fn erode_once(mask: &BinaryMask, kernel: &Kernel) -> BinaryMask {
    let (width, height) = mask.dimensions();
    let mut result = BinaryMask::empty(width, height);

    for y in 0..height {
        for x in 0..width {
            if !mask.get(x, y) {
                continue;
            }
            let mut keep = true;
            for &(dx, dy) in &kernel.offsets {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                    keep = false;
                    break;
                }
                if !mask.get(nx as u32, ny as u32) {
                    keep = false;
                    break;
                }
            }
            if keep {
                result.set(x, y, true);
            }
        }
    }

    result
}

fn dilate_once(mask: &BinaryMask, kernel: &Kernel) -> BinaryMask {
    let (width, height) = mask.dimensions();
    let mut result = BinaryMask::empty(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut on = false;
            for &(dx, dy) in &kernel.offsets {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx >= 0
                    && ny >= 0
                    && nx < width as i32
                    && ny < height as i32
                    && mask.get(nx as u32, ny as u32)
                {
                    on = true;
                    break;
                }
            }
            if on {
                result.set(x, y, true);
            }
        }
    }

    result
}

/// Erosion followed by dilation, tuned to break touching canopies apart at
/// their narrowest point without re-merging them.
pub fn separate(
    mask: &BinaryMask,
    kernel_size: u32,
    erode_iterations: u32,
    dilate_iterations: u32,
) -> Result<BinaryMask> {
    let kernel = Kernel::circular(kernel_size)?;
    let eroded = erode(mask, &kernel, erode_iterations);
    Ok(dilate(&eroded, &kernel, dilate_iterations))
}
