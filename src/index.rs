use rayon::prelude::*;

use crate::buffer::{IndexField, PixelBuffer};

/// Epsilon guard for the min-max rescale of a zero-variance field.
const NORMALIZE_EPSILON: f32 = 1e-6;

/// Raw per-pixel ExG: channel-sum-normalized `2g - r - b`, a zero sum
/// treated as 1. This is the value before any field-wide rescaling.
#[inline]
pub(crate) fn raw_exg(rgb: [u8; 3]) -> f32 {
    let r = rgb[0] as f32 / 255.0;
    let g = rgb[1] as f32 / 255.0;
    let b = rgb[2] as f32 / 255.0;
    let mut total = r + g + b;
    if total == 0.0 {
        total = 1.0;
    }
    (2.0 * g - r - b) / total
}

/// Compute the Excess Green Index (ExG) field for a buffer.
///
/// Channels are normalized by the per-pixel channel sum (a zero sum is
/// treated as 1), the raw index is `2*g_norm - r_norm - b_norm`, and the
/// whole field is then rescaled to [0, 1] against its own observed min/max.
/// Two passes: raw field first, min-max normalization second.
pub fn compute_exg(buffer: &PixelBuffer) -> IndexField {
    let (width, height) = buffer.dimensions();

    let mut raw: Vec<f32> = vec![0.0; width as usize * height as usize];
    raw.par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                *out = raw_exg(buffer.get(x as u32, y as u32));
            }
        });

    let min = raw.iter().copied().fold(f32::INFINITY, f32::min);
    let max = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = (max - min).max(NORMALIZE_EPSILON);
    for v in raw.iter_mut() {
        *v = (*v - min) / range;
    }

    IndexField::from_data(width, height, raw)
}

/// Compute the Green Leaf Index (GLI) field for a buffer.
///
/// `(2g - r - b) / (2g + r + b)` on raw channel values, with the denominator
/// floored to 1 when zero. Reported as-is in [-1, 1], never renormalized.
pub fn compute_gli(buffer: &PixelBuffer) -> IndexField {
    let (width, height) = buffer.dimensions();

    let mut data: Vec<f32> = vec![0.0; width as usize * height as usize];
    data.par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let [r, g, b] = buffer.get(x as u32, y as u32);
                let r = r as f32;
                let g = g as f32;
                let b = b as f32;
                let numerator = 2.0 * g - r - b;
                let mut denominator = 2.0 * g + r + b;
                if denominator == 0.0 {
                    denominator = 1.0;
                }
                *out = numerator / denominator;
            }
        });

    IndexField::from_data(width, height, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exg_matches_buffer_dimensions_and_range() {
        let buf = PixelBuffer::filled(20, 10, [30, 120, 30]).unwrap();
        let field = compute_exg(&buf);
        assert_eq!(field.dimensions(), buf.dimensions());
        for &v in field.values() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn exg_uniform_buffer_is_finite_and_constant() {
        let buf = PixelBuffer::filled(16, 16, [128, 128, 128]).unwrap();
        let field = compute_exg(&buf);
        let first = field.get(0, 0);
        for &v in field.values() {
            assert!(v.is_finite());
            assert_eq!(v, first);
        }
    }

    #[test]
    fn exg_black_buffer_guards_zero_sum() {
        let buf = PixelBuffer::filled(8, 8, [0, 0, 0]).unwrap();
        let field = compute_exg(&buf);
        for &v in field.values() {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn exg_green_exceeds_gray() {
        let mut data = Vec::new();
        // Left half strong green, right half gray.
        for _ in 0..10 {
            for x in 0..10 {
                if x < 5 {
                    data.extend_from_slice(&[30, 120, 30]);
                } else {
                    data.extend_from_slice(&[100, 100, 100]);
                }
            }
        }
        let buf = PixelBuffer::new(10, 10, data).unwrap();
        let field = compute_exg(&buf);
        assert!(field.get(0, 0) > field.get(9, 0));
        // Min-max normalization stretches to the full range.
        assert_eq!(field.get(0, 0), 1.0);
        assert_eq!(field.get(9, 0), 0.0);
    }

    #[test]
    fn gli_stays_in_documented_range() {
        let buf = PixelBuffer::filled(12, 9, [200, 40, 10]).unwrap();
        let field = compute_gli(&buf);
        assert_eq!(field.dimensions(), buf.dimensions());
        for &v in field.values() {
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn gli_black_pixel_is_zero() {
        let buf = PixelBuffer::filled(4, 4, [0, 0, 0]).unwrap();
        let field = compute_gli(&buf);
        assert_eq!(field.get(0, 0), 0.0);
    }

    #[test]
    fn gli_pure_green_is_one() {
        let buf = PixelBuffer::filled(4, 4, [0, 255, 0]).unwrap();
        let field = compute_gli(&buf);
        assert_eq!(field.get(2, 2), 1.0);
    }
}
