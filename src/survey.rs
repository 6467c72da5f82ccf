use serde::Serialize;

use crate::buffer::PixelBuffer;
use crate::errors::{AgroScanError, Result};
use crate::index::{compute_exg, compute_gli};

/// ExG bands of the health survey (upper-exclusive, lower-inclusive).
const HEALTHY_FLOOR: f32 = 0.5;
const MODERATE_FLOOR: f32 = 0.25;
const STRESSED_FLOOR: f32 = 0.1;

/// Number of bins in the per-channel color histogram (8-value-wide bins).
const HISTOGRAM_BINS: usize = 32;

/// Vegetation coverage of an image at a fixed ExG threshold.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageStats {
    pub vegetation_percentage: f64,
    pub non_vegetation_percentage: f64,
    pub total_pixels: u64,
    pub vegetation_pixels: u64,
    pub threshold_used: f32,
}

/// Coarse vegetation-health survey from ExG banding.
#[derive(Debug, Clone, Serialize)]
pub struct HealthEstimate {
    /// 0-100, weighted over the vegetation bands (100/70/30).
    pub health_index: f64,
    pub healthy_percentage: f64,
    pub moderate_percentage: f64,
    pub stressed_percentage: f64,
    pub non_vegetation_percentage: f64,
    pub vegetation_total_percentage: f64,
    pub mean_exg: f64,
    pub mean_gli: f64,
}

/// Distribution of one color channel over the whole image.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub std: f64,
    pub min: u8,
    pub max: u8,
}

/// Per-channel color statistics plus a couple of whole-image summaries.
#[derive(Debug, Clone, Serialize)]
pub struct ColorStats {
    pub red: ChannelStats,
    pub green: ChannelStats,
    pub blue: ChannelStats,
    /// Mean over all samples of all channels (0-255).
    pub brightness: f64,
    pub is_predominantly_green: bool,
}

/// Per-channel color histograms over `HISTOGRAM_BINS` equal-width bins.
#[derive(Debug, Clone, Serialize)]
pub struct ColorHistogram {
    pub red: Vec<u32>,
    pub green: Vec<u32>,
    pub blue: Vec<u32>,
}

/// Percentage of the image covered by vegetation at the given ExG threshold.
pub fn coverage_stats(buffer: &PixelBuffer, threshold: f32) -> Result<CoverageStats> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AgroScanError::InvalidParameter {
            name: "threshold",
            value: threshold as f64,
            range: "[0, 1]",
        });
    }

    let exg = compute_exg(buffer);
    let total_pixels = buffer.total_pixels();
    let vegetation_pixels = exg.values().iter().filter(|&&v| v > threshold).count() as u64;
    let coverage = vegetation_pixels as f64 / total_pixels as f64 * 100.0;

    Ok(CoverageStats {
        vegetation_percentage: round2(coverage),
        non_vegetation_percentage: round2(100.0 - coverage),
        total_pixels,
        vegetation_pixels,
        threshold_used: threshold,
    })
}

/// Band the ExG field into healthy/moderate/stressed/non-vegetation shares
/// and fold them into a single 0-100 health index.
///
/// A simplified RGB-only estimate; precise health assessment would need
/// multispectral (NIR) data.
pub fn estimate_health(buffer: &PixelBuffer) -> HealthEstimate {
    let exg = compute_exg(buffer);
    let gli = compute_gli(buffer);

    let mut healthy = 0u64;
    let mut moderate = 0u64;
    let mut stressed = 0u64;
    for &v in exg.values() {
        if v > HEALTHY_FLOOR {
            healthy += 1;
        } else if v > MODERATE_FLOOR {
            moderate += 1;
        } else if v > STRESSED_FLOOR {
            stressed += 1;
        }
    }

    let total = buffer.total_pixels() as f64;
    let healthy_pct = healthy as f64 / total * 100.0;
    let moderate_pct = moderate as f64 / total * 100.0;
    let stressed_pct = stressed as f64 / total * 100.0;
    let vegetation_total = healthy_pct + moderate_pct + stressed_pct;
    let non_vegetation_pct = 100.0 - vegetation_total;

    let health_index = if vegetation_total > 0.0 {
        (healthy_pct * 100.0 + moderate_pct * 70.0 + stressed_pct * 30.0) / vegetation_total
    } else {
        0.0
    };

    HealthEstimate {
        health_index: round1(health_index),
        healthy_percentage: round1(healthy_pct),
        moderate_percentage: round1(moderate_pct),
        stressed_percentage: round1(stressed_pct),
        non_vegetation_percentage: round1(non_vegetation_pct),
        vegetation_total_percentage: round1(vegetation_total),
        mean_exg: round3(exg.mean()),
        mean_gli: round3(gli.mean()),
    }
}

/// Per-channel mean/std/min/max, overall brightness, and whether green is
/// the dominant channel on average.
pub fn analyze_colors(buffer: &PixelBuffer) -> ColorStats {
    let mut sums = [0.0f64; 3];
    let mut sq_sums = [0.0f64; 3];
    let mut mins = [255u8; 3];
    let mut maxs = [0u8; 3];

    for pixel in buffer.as_raw().chunks_exact(3) {
        for c in 0..3 {
            let v = pixel[c];
            sums[c] += v as f64;
            sq_sums[c] += (v as f64) * (v as f64);
            mins[c] = mins[c].min(v);
            maxs[c] = maxs[c].max(v);
        }
    }

    let n = buffer.total_pixels() as f64;
    let channel = |c: usize| {
        let mean = sums[c] / n;
        let variance = (sq_sums[c] / n - mean * mean).max(0.0);
        ChannelStats {
            mean: round2(mean),
            std: round2(variance.sqrt()),
            min: mins[c],
            max: maxs[c],
        }
    };

    let red = channel(0);
    let green = channel(1);
    let blue = channel(2);
    let brightness = round2((sums[0] + sums[1] + sums[2]) / (3.0 * n));
    let is_predominantly_green =
        sums[1] / n > sums[0] / n && sums[1] / n > sums[2] / n;

    ColorStats {
        red,
        green,
        blue,
        brightness,
        is_predominantly_green,
    }
}

/// 32-bin per-channel color histograms (bin width 8).
pub fn color_histogram(buffer: &PixelBuffer) -> ColorHistogram {
    let mut red = vec![0u32; HISTOGRAM_BINS];
    let mut green = vec![0u32; HISTOGRAM_BINS];
    let mut blue = vec![0u32; HISTOGRAM_BINS];
    let bin_width = 256 / HISTOGRAM_BINS;

    for pixel in buffer.as_raw().chunks_exact(3) {
        red[pixel[0] as usize / bin_width] += 1;
        green[pixel[1] as usize / bin_width] += 1;
        blue[pixel[2] as usize / bin_width] += 1;
    }

    ColorHistogram { red, green, blue }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mostly strong green with a gray strip: the §8 strong-green scenario.
    fn mostly_green(width: u32, height: u32) -> PixelBuffer {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for _ in 0..width {
                if y < height / 20 {
                    data.extend_from_slice(&[110, 105, 100]);
                } else {
                    data.extend_from_slice(&[30, 120, 30]);
                }
            }
        }
        PixelBuffer::new(width, height, data).unwrap()
    }

    #[test]
    fn strong_green_buffer_has_high_coverage() {
        let buf = mostly_green(200, 200);
        let stats = coverage_stats(&buf, 0.3).unwrap();
        assert!(stats.vegetation_percentage > 90.0);
        assert_eq!(
            stats.vegetation_percentage + stats.non_vegetation_percentage,
            100.0
        );
        assert_eq!(stats.total_pixels, 40_000);
    }

    #[test]
    fn strong_green_buffer_classifies_healthy() {
        let buf = mostly_green(200, 200);
        let health = estimate_health(&buf);
        assert!(health.health_index > 90.0);
        assert!(health.healthy_percentage > 90.0);
        assert!(health.vegetation_total_percentage > 90.0);
    }

    #[test]
    fn gray_buffer_has_zero_health_index() {
        let buf = PixelBuffer::filled(100, 100, [128, 128, 128]).unwrap();
        let health = estimate_health(&buf);
        // Uniform field normalizes to zero everywhere: no vegetation bands.
        assert_eq!(health.health_index, 0.0);
        assert_eq!(health.vegetation_total_percentage, 0.0);
        assert_eq!(health.non_vegetation_percentage, 100.0);
    }

    #[test]
    fn coverage_threshold_is_validated() {
        let buf = PixelBuffer::filled(10, 10, [0, 200, 0]).unwrap();
        assert!(coverage_stats(&buf, -0.1).is_err());
        assert!(coverage_stats(&buf, 1.1).is_err());
    }

    #[test]
    fn color_stats_of_uniform_buffer() {
        let buf = PixelBuffer::filled(50, 40, [60, 180, 90]).unwrap();
        let stats = analyze_colors(&buf);
        assert_eq!(stats.green.mean, 180.0);
        assert_eq!(stats.green.std, 0.0);
        assert_eq!(stats.green.min, 180);
        assert_eq!(stats.green.max, 180);
        assert_eq!(stats.brightness, 110.0);
        assert!(stats.is_predominantly_green);
    }

    #[test]
    fn color_stats_spot_dominant_channel() {
        let buf = PixelBuffer::filled(10, 10, [200, 50, 50]).unwrap();
        assert!(!analyze_colors(&buf).is_predominantly_green);
    }

    #[test]
    fn histogram_bins_cover_every_pixel() {
        let buf = mostly_green(100, 100);
        let hist = color_histogram(&buf);
        for channel in [&hist.red, &hist.green, &hist.blue] {
            assert_eq!(channel.len(), 32);
            assert_eq!(channel.iter().sum::<u32>(), 10_000);
        }
        // Green channel: 120s land in bin 15, 105s in bin 13.
        assert_eq!(hist.green[15], 9_500);
        assert_eq!(hist.green[13], 500);
    }

    #[test]
    fn band_percentages_sum_to_100() {
        let buf = mostly_green(100, 100);
        let health = estimate_health(&buf);
        let sum = health.healthy_percentage
            + health.moderate_percentage
            + health.stressed_percentage
            + health.non_vegetation_percentage;
        assert!((sum - 100.0).abs() < 0.3);
    }
}
