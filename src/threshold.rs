use crate::buffer::{BinaryMask, IndexField};
use crate::errors::{AgroScanError, Result};

/// Compute the p-th percentile of a field by sorting a copy of its values.
///
/// Uses linear interpolation between ranks. Stable for constant fields:
/// every percentile of a constant field is that constant.
pub fn percentile(field: &IndexField, p: f32) -> Result<f32> {
    if !(0.0..=100.0).contains(&p) {
        return Err(AgroScanError::InvalidParameter {
            name: "percentile",
            value: p as f64,
            range: "[0, 100]",
        });
    }
    let mut sorted: Vec<f32> = field.values().to_vec();
    if sorted.is_empty() {
        return Err(AgroScanError::Computation(
            "percentile of an empty field".to_string(),
        ));
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("index fields never hold NaN"));

    let rank = p / 100.0 * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Ok(sorted[lo]);
    }
    let frac = rank - lo as f32;
    Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Binarize an index field into a vegetation mask.
///
/// Fields thresholded here are [0, 1]-normalized, so an explicit threshold
/// or clamp bound outside that range is a caller error, never applied
/// silently. An explicit threshold wins when supplied; otherwise the
/// requested percentile of the field is computed and clamped into
/// `clamp_range`. Returns the mask together with the threshold actually
/// used, so heads can echo it in their reported parameters.
pub fn threshold_mask(
    field: &IndexField,
    explicit: Option<f32>,
    threshold_percentile: f32,
    clamp_range: (f32, f32),
) -> Result<(BinaryMask, f32)> {
    if let Some(t) = explicit {
        if !(0.0..=1.0).contains(&t) {
            return Err(AgroScanError::InvalidParameter {
                name: "explicit_threshold",
                value: t as f64,
                range: "[0, 1]",
            });
        }
    }
    let (clamp_min, clamp_max) = clamp_range;
    if !(0.0..=1.0).contains(&clamp_min)
        || !(0.0..=1.0).contains(&clamp_max)
        || clamp_min > clamp_max
    {
        return Err(AgroScanError::InvalidParameter {
            name: "clamp_range",
            value: clamp_min as f64,
            range: "[0, 1], min <= max",
        });
    }

    let threshold = match explicit {
        Some(t) => t,
        None => percentile(field, threshold_percentile)?.clamp(clamp_min, clamp_max),
    };

    let (width, height) = field.dimensions();
    let data = field.values().iter().map(|&v| v > threshold).collect();
    Ok((BinaryMask::from_data(width, height, data), threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;
    use crate::index::compute_exg;
    use assert_approx_eq::assert_approx_eq;

    fn ramp_field(n: usize) -> IndexField {
        let data: Vec<f32> = (0..n).map(|i| i as f32 / (n - 1) as f32).collect();
        IndexField::from_data(n as u32, 1, data)
    }

    #[test]
    fn percentile_of_ramp() {
        let field = ramp_field(101);
        assert_approx_eq!(percentile(&field, 0.0).unwrap(), 0.0, 1e-6);
        assert_approx_eq!(percentile(&field, 50.0).unwrap(), 0.5, 1e-6);
        assert_approx_eq!(percentile(&field, 100.0).unwrap(), 1.0, 1e-6);
        assert_approx_eq!(percentile(&field, 70.0).unwrap(), 0.7, 1e-6);
    }

    #[test]
    fn percentile_of_constant_field_is_that_constant() {
        let field = IndexField::from_data(5, 2, vec![0.42; 10]);
        for p in [0.0, 37.0, 70.0, 100.0] {
            assert_approx_eq!(percentile(&field, p).unwrap(), 0.42, 1e-6);
        }
    }

    #[test]
    fn percentile_rejects_out_of_range() {
        let field = ramp_field(10);
        assert!(percentile(&field, -1.0).is_err());
        assert!(percentile(&field, 100.5).is_err());
    }

    #[test]
    fn explicit_threshold_wins() {
        let field = ramp_field(11);
        let (mask, used) = threshold_mask(&field, Some(0.95), 70.0, (0.0, 1.0)).unwrap();
        assert_eq!(used, 0.95);
        assert_eq!(mask.count_on(), 1); // only the 1.0 sample
    }

    #[test]
    fn percentile_threshold_is_clamped() {
        let field = ramp_field(101);
        // p70 = 0.7, clamped down into [0.1, 0.5].
        let (_, used) = threshold_mask(&field, None, 70.0, (0.1, 0.5)).unwrap();
        assert_approx_eq!(used, 0.5, 1e-6);
        // p70 = 0.7, clamped up into [0.8, 0.9].
        let (_, used) = threshold_mask(&field, None, 70.0, (0.8, 0.9)).unwrap();
        assert_approx_eq!(used, 0.8, 1e-6);
    }

    #[test]
    fn uniform_buffer_mask_is_all_or_nothing() {
        let buf = PixelBuffer::filled(10, 10, [90, 90, 90]).unwrap();
        let field = compute_exg(&buf);
        let (mask, _) = threshold_mask(&field, None, 70.0, (0.0, 1.0)).unwrap();
        let on = mask.count_on();
        assert!(on == 0 || on == 100);
    }

    #[test]
    fn rejects_inverted_clamp_range() {
        let field = ramp_field(10);
        assert!(threshold_mask(&field, None, 70.0, (0.7, 0.5)).is_err());
    }

    #[test]
    fn rejects_explicit_threshold_outside_unit_range() {
        let field = ramp_field(11);
        assert!(threshold_mask(&field, Some(5.0), 70.0, (0.0, 1.0)).is_err());
        assert!(threshold_mask(&field, Some(-0.1), 70.0, (0.0, 1.0)).is_err());
        assert!(threshold_mask(&field, Some(1.0), 70.0, (0.0, 1.0)).is_ok());
    }

    #[test]
    fn rejects_clamp_bounds_outside_unit_range() {
        let field = ramp_field(11);
        assert!(threshold_mask(&field, None, 70.0, (-0.2, 0.5)).is_err());
        assert!(threshold_mask(&field, None, 70.0, (0.5, 1.2)).is_err());
    }
}
