use serde::Serialize;

use crate::buffer::PixelBuffer;
use crate::config::CanopyConfig;
use crate::errors::Result;
use crate::index::compute_exg;
use crate::morphology::separate;
use crate::regions::{extract_regions, Region, RegionFilter, RegionKind, MIN_VEGETATION_PIXELS};
use crate::threshold::threshold_mask;

/// Metrics produced by the canopy counting head.
#[derive(Debug, Clone, Serialize)]
pub struct CanopyCountResult {
    pub total_canopies: u32,
    pub total_canopy_area_pixels: u64,
    /// `total_canopy_area / image_area * 100`.
    pub coverage_percentage: f64,
    pub avg_canopy_area: f64,
    pub min_canopy_area_found: u32,
    pub max_canopy_area_found: u32,
    /// Per-canopy detail, capped at `max_detail_regions`, largest first.
    pub canopies: Vec<Region>,
    pub image_width: u32,
    pub image_height: u32,
    /// Threshold actually applied to the ExG field.
    pub threshold_used: f32,
}

impl CanopyCountResult {
    fn insufficient(buffer: &PixelBuffer, threshold: f32) -> Self {
        Self {
            total_canopies: 0,
            total_canopy_area_pixels: 0,
            coverage_percentage: 0.0,
            avg_canopy_area: 0.0,
            min_canopy_area_found: 0,
            max_canopy_area_found: 0,
            canopies: Vec::new(),
            image_width: buffer.width(),
            image_height: buffer.height(),
            threshold_used: threshold,
        }
    }
}

/// Count and characterize individual plant/tree canopies in an aerial image.
///
/// ExG vegetation segmentation, percentile threshold clamped into the
/// configured range, erosion/dilation to separate touching crowns, then
/// connected-component extraction filtered by canopy area bounds. Large
/// buffers are downscaled first; reported coordinates and areas are always
/// in original resolution.
pub fn count_canopies(buffer: &PixelBuffer, config: &CanopyConfig) -> Result<CanopyCountResult> {
    config.validate()?;

    let scaled = buffer.downscale_to_fit(config.max_dimension);
    let (work, scale): (&PixelBuffer, f32) = match &scaled {
        Some((b, s)) => (b, *s),
        None => (buffer, 1.0),
    };

    let exg = compute_exg(work);
    let (mask, threshold) = threshold_mask(
        &exg,
        config.explicit_threshold,
        config.threshold_percentile,
        (config.threshold_clamp[0], config.threshold_clamp[1]),
    )?;

    if mask.count_on() < MIN_VEGETATION_PIXELS {
        return Ok(CanopyCountResult::insufficient(buffer, threshold));
    }

    let separated = separate(
        &mask,
        config.kernel_size,
        config.erode_iterations,
        config.dilate_iterations,
    )?;

    let filter = RegionFilter::new(
        config.min_canopy_area,
        Some(config.max_canopy_area),
        usize::MAX,
    )
    .with_scale(scale);
    let regions = extract_regions(&separated, RegionKind::Canopy, &filter)?;

    let total_area: u64 = regions.iter().map(|r| r.area_pixels as u64).sum();
    let (avg_area, min_area, max_area) = if regions.is_empty() {
        (0.0, 0, 0)
    } else {
        (
            total_area as f64 / regions.len() as f64,
            regions.iter().map(|r| r.area_pixels).min().unwrap_or(0),
            regions.iter().map(|r| r.area_pixels).max().unwrap_or(0),
        )
    };

    let total_pixels = buffer.total_pixels();
    let coverage = total_area as f64 / total_pixels as f64 * 100.0;

    let mut canopies = regions;
    let total_canopies = canopies.len() as u32;
    canopies.truncate(config.max_detail_regions);

    Ok(CanopyCountResult {
        total_canopies,
        total_canopy_area_pixels: total_area,
        coverage_percentage: round2(coverage.clamp(0.0, 100.0)),
        avg_canopy_area: round1(avg_area),
        min_canopy_area_found: min_area,
        max_canopy_area_found: max_area,
        canopies,
        image_width: buffer.width(),
        image_height: buffer.height(),
        threshold_used: threshold,
    })
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
