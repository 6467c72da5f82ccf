use serde::Serialize;

use crate::buffer::PixelBuffer;
use crate::color::luma;
use crate::config::BiomassConfig;
use crate::errors::Result;
use crate::index::{compute_exg, raw_exg};
use crate::morphology::separate;
use crate::regions::{extract_regions, Region, RegionFilter, RegionKind, MIN_VEGETATION_PIXELS};
use crate::threshold::threshold_mask;

/// Weights of the biomass-index composite.
const WEIGHT_COVERAGE: f64 = 0.40;
const WEIGHT_DENSITY: f64 = 0.30;
const WEIGHT_VIGOR: f64 = 0.15;
const WEIGHT_TEXTURE: f64 = 0.15;

/// Texture variance above this maps to a full texture sub-score.
const TEXTURE_VARIANCE_CAP: f64 = 2000.0;

/// Heuristic kg/ha interpolation endpoints (index 0 and index 100).
/// Not physically calibrated; tuned against typical tropical vegetation
/// figures (sparse pasture ~2 t/ha up to very dense cover ~400 t/ha).
const MIN_BIOMASS_KG_HA: f64 = 2_000.0;
const MAX_BIOMASS_KG_HA: f64 = 400_000.0;

/// Vegetation density classification derived from the biomass index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityClass {
    Esparsa,
    Moderada,
    Densa,
    MuitoDensa,
}

impl DensityClass {
    pub fn from_index(biomass_index: f64) -> Self {
        if biomass_index < 25.0 {
            DensityClass::Esparsa
        } else if biomass_index < 50.0 {
            DensityClass::Moderada
        } else if biomass_index < 75.0 {
            DensityClass::Densa
        } else {
            DensityClass::MuitoDensa
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DensityClass::Esparsa => "esparsa",
            DensityClass::Moderada => "moderada",
            DensityClass::Densa => "densa",
            DensityClass::MuitoDensa => "muito_densa",
        }
    }
}

/// Greenness/texture vigor of the vegetation-mask pixels.
#[derive(Debug, Clone, Serialize)]
pub struct VigorMetrics {
    /// Mean green-channel intensity (0-255) over vegetation pixels.
    pub mean_green_intensity: f64,
    /// Mean raw ExG (channel-sum-normalized `2g - r - b`) over vegetation
    /// pixels. Not the min-max-stretched masking field, so the value is
    /// comparable across images.
    pub mean_exg: f64,
    /// Grayscale variance over vegetation pixels.
    pub texture_variance: f64,
}

impl VigorMetrics {
    fn zero() -> Self {
        Self {
            mean_green_intensity: 0.0,
            mean_exg: 0.0,
            texture_variance: 0.0,
        }
    }
}

/// Metrics produced by the biomass estimation head.
#[derive(Debug, Clone, Serialize)]
pub struct BiomassResult {
    pub vegetation_coverage_pct: f64,
    pub canopy_count: u32,
    pub total_canopy_area_pixels: u64,
    pub avg_canopy_area: f64,
    /// Composite index in [0, 100].
    pub biomass_index: f64,
    pub density_class: DensityClass,
    /// Heuristic linear interpolation, not a calibrated measurement.
    pub estimated_biomass_kg_ha: f64,
    pub canopy_patches: Vec<Region>,
    pub vigor: VigorMetrics,
    pub recommendations: Vec<String>,
    pub threshold_used: f32,
}

impl BiomassResult {
    fn insufficient(coverage_pct: f64, threshold: f32) -> Self {
        Self {
            vegetation_coverage_pct: coverage_pct,
            canopy_count: 0,
            total_canopy_area_pixels: 0,
            avg_canopy_area: 0.0,
            biomass_index: 0.0,
            density_class: DensityClass::Esparsa,
            estimated_biomass_kg_ha: 0.0,
            canopy_patches: Vec::new(),
            vigor: VigorMetrics::zero(),
            recommendations: vec![
                "Vegetacao insuficiente para estimativa de biomassa.".to_string(),
            ],
            threshold_used: threshold,
        }
    }
}

/// Combine the four sub-scores into the 0-100 biomass index.
///
/// `canopy_density` is the canopy-area fraction of the image (0-1). Each
/// sub-score is clamped to [0, 100] before weighting; the index is
/// monotonically non-decreasing in each input with the others held fixed.
pub fn compute_biomass_index(
    coverage_pct: f64,
    canopy_density: f64,
    vigor_green: f64,
    texture_variance: f64,
) -> f64 {
    let coverage_score = coverage_pct.clamp(0.0, 100.0);
    let density_score = (canopy_density * 100.0).clamp(0.0, 100.0);
    let vigor_score = (vigor_green / 255.0 * 100.0).clamp(0.0, 100.0);
    let texture_score = (texture_variance / TEXTURE_VARIANCE_CAP * 100.0).clamp(0.0, 100.0);

    let index = coverage_score * WEIGHT_COVERAGE
        + density_score * WEIGHT_DENSITY
        + vigor_score * WEIGHT_VIGOR
        + texture_score * WEIGHT_TEXTURE;

    round2(index.clamp(0.0, 100.0))
}

/// Linear kg/ha interpolation over the biomass index.
pub fn estimate_biomass_kg_ha(biomass_index: f64) -> f64 {
    let estimated =
        MIN_BIOMASS_KG_HA + biomass_index / 100.0 * (MAX_BIOMASS_KG_HA - MIN_BIOMASS_KG_HA);
    estimated.round()
}

/// Estimate vegetation biomass from coverage, canopy structure and vigor.
pub fn estimate_biomass(buffer: &PixelBuffer, config: &BiomassConfig) -> Result<BiomassResult> {
    config.validate()?;

    let scaled = buffer.downscale_to_fit(config.max_dimension);
    let (work, scale): (&PixelBuffer, f32) = match &scaled {
        Some((b, s)) => (b, *s),
        None => (buffer, 1.0),
    };

    let exg = compute_exg(work);
    let (vegetation, threshold) = threshold_mask(
        &exg,
        None,
        config.threshold_percentile,
        (config.threshold_floor, 1.0),
    )?;

    let vegetation_pixels = vegetation.count_on();
    let coverage_pct =
        round2(vegetation_pixels as f64 / work.total_pixels() as f64 * 100.0);

    if vegetation_pixels < MIN_VEGETATION_PIXELS {
        return Ok(BiomassResult::insufficient(coverage_pct, threshold));
    }

    // Canopy patches, separated the same way the counting head does it.
    let separated = separate(
        &vegetation,
        config.kernel_size,
        config.erode_iterations,
        config.dilate_iterations,
    )?;
    let filter =
        RegionFilter::new(config.min_canopy_area, None, usize::MAX).with_scale(scale);
    let mut patches = extract_regions(&separated, RegionKind::Canopy, &filter)?;

    let total_canopy_area: u64 = patches.iter().map(|p| p.area_pixels as u64).sum();
    patches.truncate(config.max_canopy_patches);
    let canopy_count = patches.len() as u32;
    let avg_canopy_area = if canopy_count > 0 {
        round2(total_canopy_area as f64 / canopy_count as f64)
    } else {
        0.0
    };

    // Vigor metrics over vegetation-mask pixels.
    let (width, height) = work.dimensions();
    let mut green_sum = 0.0f64;
    let mut exg_sum = 0.0f64;
    let mut luma_sum = 0.0f64;
    let mut luma_sq_sum = 0.0f64;
    for y in 0..height {
        for x in 0..width {
            if !vegetation.get(x, y) {
                continue;
            }
            green_sum += work.get(x, y)[1] as f64;
            exg_sum += raw_exg(work.get(x, y)) as f64;
            let l = luma(work.get(x, y)) as f64;
            luma_sum += l;
            luma_sq_sum += l * l;
        }
    }
    let n = vegetation_pixels as f64;
    let mean_green = green_sum / n;
    let mean_luma = luma_sum / n;
    let texture_variance = (luma_sq_sum / n - mean_luma * mean_luma).max(0.0);
    let vigor = VigorMetrics {
        mean_green_intensity: round2(mean_green),
        mean_exg: round4(exg_sum / n),
        texture_variance: round2(texture_variance),
    };

    let canopy_density = total_canopy_area as f64 / buffer.total_pixels() as f64;
    let biomass_index =
        compute_biomass_index(coverage_pct, canopy_density, mean_green, texture_variance);

    let density_class = DensityClass::from_index(biomass_index);
    let estimated_kg_ha = estimate_biomass_kg_ha(biomass_index);

    let recommendations =
        build_recommendations(biomass_index, density_class, coverage_pct, canopy_count);

    Ok(BiomassResult {
        vegetation_coverage_pct: coverage_pct,
        canopy_count,
        total_canopy_area_pixels: total_canopy_area,
        avg_canopy_area,
        biomass_index,
        density_class,
        estimated_biomass_kg_ha: estimated_kg_ha,
        canopy_patches: patches,
        vigor,
        recommendations,
        threshold_used: threshold,
    })
}

fn build_recommendations(
    biomass_index: f64,
    density_class: DensityClass,
    coverage_pct: f64,
    canopy_count: u32,
) -> Vec<String> {
    let mut recs = Vec::new();

    match density_class {
        DensityClass::MuitoDensa => recs.push(format!(
            "Biomassa muito densa (indice {:.1}). \
             Area com excelente cobertura vegetal e alta produtividade.",
            biomass_index
        )),
        DensityClass::Densa => recs.push(format!(
            "Biomassa densa (indice {:.1}). \
             Boa cobertura vegetal. Monitorar para manter niveis atuais.",
            biomass_index
        )),
        DensityClass::Moderada => recs.push(format!(
            "Biomassa moderada (indice {:.1}). \
             Considere avaliar areas com menor cobertura para potencial de melhoria.",
            biomass_index
        )),
        DensityClass::Esparsa => recs.push(format!(
            "Biomassa esparsa (indice {:.1}). \
             Cobertura vegetal baixa. Verificar condicoes do solo e irrigacao.",
            biomass_index
        )),
    }

    if coverage_pct < 30.0 {
        recs.push(
            "Cobertura vegetal abaixo de 30%. \
             Considere replantio ou verificacao de fatores limitantes."
                .to_string(),
        );
    }

    if canopy_count == 0 && coverage_pct > 10.0 {
        recs.push(
            "Vegetacao presente mas sem copas individuais identificadas. \
             Pode indicar vegetacao rasteira ou gramado uniforme."
                .to_string(),
        );
    }

    recs
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn plantation(width: u32, height: u32, squares: &[(u32, u32)], side: u32) -> PixelBuffer {
        let mut data = vec![0u8; (width * height * 3) as usize];
        for i in 0..(width * height) as usize {
            data[i * 3] = 120;
            data[i * 3 + 1] = 110;
            data[i * 3 + 2] = 100;
        }
        for &(x0, y0) in squares {
            for y in y0..(y0 + side).min(height) {
                for x in x0..(x0 + side).min(width) {
                    let i = (y * width + x) as usize;
                    data[i * 3] = 30;
                    data[i * 3 + 1] = 140;
                    data[i * 3 + 2] = 30;
                }
            }
        }
        PixelBuffer::new(width, height, data).unwrap()
    }

    #[test]
    fn mid_gray_buffer_gives_zero_index() {
        let buf = PixelBuffer::filled(100, 100, [128, 128, 128]).unwrap();
        let result = estimate_biomass(&buf, &BiomassConfig::default()).unwrap();
        assert_eq!(result.biomass_index, 0.0);
        assert_eq!(result.density_class, DensityClass::Esparsa);
        assert_eq!(result.canopy_count, 0);
        assert_eq!(result.estimated_biomass_kg_ha, 0.0);
        assert_eq!(result.recommendations.len(), 1);
    }

    #[test]
    fn green_plantation_produces_positive_metrics() {
        let buf = plantation(200, 200, &[(20, 20), (120, 30), (40, 130)], 40);
        let result = estimate_biomass(&buf, &BiomassConfig::default()).unwrap();
        assert!(result.vegetation_coverage_pct > 10.0);
        assert!(result.canopy_count >= 3);
        assert!(result.biomass_index > 0.0);
        assert!(result.total_canopy_area_pixels > 0);
        assert!(result.vigor.mean_green_intensity > 100.0);
        assert!(result.vigor.mean_exg > 0.5);
        assert!(result.estimated_biomass_kg_ha > MIN_BIOMASS_KG_HA);
        assert!(result.estimated_biomass_kg_ha < MAX_BIOMASS_KG_HA);
        assert!(!result.recommendations.is_empty());
    }

    #[test]
    fn mean_exg_is_the_raw_channel_ratio() {
        // Uniform [30, 140, 30] vegetation: raw ExG = 220/200 = 1.1 per
        // pixel, even though the min-max-stretched masking field tops out
        // at 1.0.
        let buf = plantation(200, 200, &[(20, 20)], 60);
        let result = estimate_biomass(&buf, &BiomassConfig::default()).unwrap();
        assert_approx_eq!(result.vigor.mean_exg, 1.1, 1e-6);
    }

    #[test]
    fn index_is_monotonic_in_coverage() {
        let mut previous = -1.0;
        for coverage in [0.0, 10.0, 25.0, 50.0, 75.0, 100.0] {
            let index = compute_biomass_index(coverage, 0.3, 120.0, 800.0);
            assert!(index >= previous);
            previous = index;
        }
    }

    #[test]
    fn sub_scores_are_clamped_before_weighting() {
        // Everything far beyond its cap still yields at most 100.
        let index = compute_biomass_index(250.0, 4.0, 900.0, 1e9);
        assert_eq!(index, 100.0);
        let index = compute_biomass_index(-5.0, -1.0, -10.0, -100.0);
        assert_eq!(index, 0.0);
    }

    #[test]
    fn density_class_boundaries() {
        assert_eq!(DensityClass::from_index(0.0), DensityClass::Esparsa);
        assert_eq!(DensityClass::from_index(24.99), DensityClass::Esparsa);
        assert_eq!(DensityClass::from_index(25.0), DensityClass::Moderada);
        assert_eq!(DensityClass::from_index(50.0), DensityClass::Densa);
        assert_eq!(DensityClass::from_index(75.0), DensityClass::MuitoDensa);
    }

    #[test]
    fn kg_ha_interpolation_endpoints() {
        assert_approx_eq!(estimate_biomass_kg_ha(0.0), 2_000.0, 1e-6);
        assert_approx_eq!(estimate_biomass_kg_ha(100.0), 400_000.0, 1e-6);
        assert_approx_eq!(estimate_biomass_kg_ha(50.0), 201_000.0, 1e-6);
    }

    #[test]
    fn patch_list_is_capped_but_area_totals_all() {
        let mut squares = Vec::new();
        for row in 0..3 {
            for col in 0..3 {
                squares.push((20 + col * 60, 20 + row * 60));
            }
        }
        let buf = plantation(220, 220, &squares, 20);
        let config = BiomassConfig {
            max_canopy_patches: 4,
            ..BiomassConfig::default()
        };
        let result = estimate_biomass(&buf, &config).unwrap();
        assert_eq!(result.canopy_patches.len(), 4);
        // Totals cover more area than the four listed patches alone.
        let listed: u64 = result.canopy_patches.iter().map(|p| p.area_pixels as u64).sum();
        assert!(result.total_canopy_area_pixels >= listed);
    }

    #[test]
    fn rejects_invalid_min_canopy_area() {
        let buf = PixelBuffer::filled(50, 50, [0, 200, 0]).unwrap();
        let config = BiomassConfig {
            min_canopy_area: 20_000,
            ..BiomassConfig::default()
        };
        assert!(estimate_biomass(&buf, &config).is_err());
    }
}
