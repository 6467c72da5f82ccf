use serde::Serialize;

use crate::buffer::{BinaryMask, PixelBuffer};
use crate::color::{luma, rgb_to_hsv};
use crate::config::SymptomConfig;
use crate::errors::Result;
use crate::index::compute_exg;
use crate::regions::{extract_regions, Region, RegionFilter, RegionKind, MIN_VEGETATION_PIXELS};
use crate::threshold::threshold_mask;

/// Infection-severity classification derived from the infection rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Saudavel,
    Leve,
    Moderado,
    Severo,
}

impl Severity {
    /// Classify by infection rate (percentage of vegetation pixels).
    pub fn from_infection_rate(rate: f64) -> Self {
        if rate < 5.0 {
            Severity::Saudavel
        } else if rate < 15.0 {
            Severity::Leve
        } else if rate < 30.0 {
            Severity::Moderado
        } else {
            Severity::Severo
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Saudavel => "saudavel",
            Severity::Leve => "leve",
            Severity::Moderado => "moderado",
            Severity::Severo => "severo",
        }
    }
}

/// Metrics produced by the disease-symptom classification head.
///
/// The four percentages are relative to the vegetation pixel count and
/// always account for 100% of it (each vegetation pixel contributes to at
/// most one symptom category).
#[derive(Debug, Clone, Serialize)]
pub struct SymptomResult {
    pub total_vegetation_pixels: u64,
    pub healthy_percentage: f64,
    pub chlorosis_percentage: f64,
    pub necrosis_percentage: f64,
    pub anomaly_percentage: f64,
    /// `chlorosis% + necrosis% + anomaly%`.
    pub infection_rate: f64,
    pub severity: Severity,
    /// Symptom regions across all categories, largest first, capped.
    pub affected_regions: Vec<Region>,
    pub recommendations: Vec<String>,
    /// Vegetation threshold actually applied to the ExG field.
    pub threshold_used: f32,
}

impl SymptomResult {
    fn insufficient(vegetation_pixels: u64, threshold: f32) -> Self {
        Self {
            total_vegetation_pixels: vegetation_pixels,
            healthy_percentage: 0.0,
            chlorosis_percentage: 0.0,
            necrosis_percentage: 0.0,
            anomaly_percentage: 0.0,
            infection_rate: 0.0,
            severity: Severity::Saudavel,
            affected_regions: Vec::new(),
            recommendations: vec![
                "Vegetacao insuficiente para analise de pragas e doencas.".to_string(),
            ],
            threshold_used: threshold,
        }
    }
}

/// Detect chlorosis, necrosis and texture anomalies in vegetation and derive
/// an infection-severity classification.
///
/// The vegetation mask comes from a percentile-thresholded ExG field with no
/// morphology; symptom categories are picked out in HSV space and by local
/// texture z-scores, restricted to vegetation pixels, with overlap priority
/// necrosis > chlorosis > anomaly.
pub fn classify_symptoms(buffer: &PixelBuffer, config: &SymptomConfig) -> Result<SymptomResult> {
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
    if vegetation_pixels < MIN_VEGETATION_PIXELS {
        return Ok(SymptomResult::insufficient(vegetation_pixels, threshold));
    }

    let chlorosis = detect_chlorosis(work, &vegetation, config);
    let necrosis = detect_necrosis(work, &vegetation, config);
    let anomaly = detect_texture_anomalies(work, &vegetation, config);

    // Overlap priority: necrosis > chlorosis > anomaly.
    let anomaly = anomaly.and_not(&chlorosis).and_not(&necrosis);
    let chlorosis = chlorosis.and_not(&necrosis);

    let chlorosis_pct = round2(chlorosis.count_on() as f64 / vegetation_pixels as f64 * 100.0);
    let necrosis_pct = round2(necrosis.count_on() as f64 / vegetation_pixels as f64 * 100.0);
    let anomaly_pct = round2(anomaly.count_on() as f64 / vegetation_pixels as f64 * 100.0);
    let infection_rate = round2(chlorosis_pct + necrosis_pct + anomaly_pct);
    let healthy_pct = round2((100.0 - infection_rate).max(0.0));

    let severity = Severity::from_infection_rate(infection_rate);

    let filter = RegionFilter::new(
        config.min_region_area,
        None,
        config.max_regions_per_symptom,
    )
    .with_scale(scale);
    let mut affected_regions = extract_regions(&chlorosis, RegionKind::Chlorosis, &filter)?;
    affected_regions.extend(extract_regions(&necrosis, RegionKind::Necrosis, &filter)?);
    affected_regions.extend(extract_regions(&anomaly, RegionKind::TextureAnomaly, &filter)?);

    affected_regions.sort_by(|a, b| b.area_pixels.cmp(&a.area_pixels));
    affected_regions.truncate(config.max_total_regions);
    for (i, region) in affected_regions.iter_mut().enumerate() {
        region.id = i as u32 + 1;
    }

    let recommendations =
        build_recommendations(severity, chlorosis_pct, necrosis_pct, anomaly_pct);

    Ok(SymptomResult {
        total_vegetation_pixels: vegetation_pixels,
        healthy_percentage: healthy_pct,
        chlorosis_percentage: chlorosis_pct,
        necrosis_percentage: necrosis_pct,
        anomaly_percentage: anomaly_pct,
        infection_rate,
        severity,
        affected_regions,
        recommendations,
        threshold_used: threshold,
    })
}

/// Yellowing inside the vegetation mask: hue and saturation windows.
fn detect_chlorosis(
    buffer: &PixelBuffer,
    vegetation: &BinaryMask,
    config: &SymptomConfig,
) -> BinaryMask {
    let (width, height) = buffer.dimensions();
    let mut mask = BinaryMask::empty(width, height);
    for y in 0..height {
        for x in 0..width {
            if !vegetation.get(x, y) {
                continue;
            }
            let (h, s, _) = rgb_to_hsv(buffer.get(x, y));
            if h >= config.chlorosis_hue_range[0]
                && h <= config.chlorosis_hue_range[1]
                && s > config.chlorosis_saturation_floor
            {
                mask.set(x, y, true);
            }
        }
    }
    mask
}

/// Browning/dead tissue: low hue, saturated, dark.
fn detect_necrosis(
    buffer: &PixelBuffer,
    vegetation: &BinaryMask,
    config: &SymptomConfig,
) -> BinaryMask {
    let (width, height) = buffer.dimensions();
    let mut mask = BinaryMask::empty(width, height);
    for y in 0..height {
        for x in 0..width {
            if !vegetation.get(x, y) {
                continue;
            }
            let (h, s, v) = rgb_to_hsv(buffer.get(x, y));
            if h >= config.necrosis_hue_range[0]
                && h <= config.necrosis_hue_range[1]
                && s > config.necrosis_saturation_floor
                && v < config.necrosis_value_ceiling
            {
                mask.set(x, y, true);
            }
        }
    }
    mask
}

/// Local texture outliers: z-score of grayscale luma against box-filtered
/// local mean/std over a large sliding window, computed with integral images.
fn detect_texture_anomalies(
    buffer: &PixelBuffer,
    vegetation: &BinaryMask,
    config: &SymptomConfig,
) -> BinaryMask {
    let (width, height) = buffer.dimensions();
    let w = width as usize;
    let h = height as usize;

    let mut gray = vec![0.0f64; w * h];
    for y in 0..h {
        for x in 0..w {
            gray[y * w + x] = luma(buffer.get(x as u32, y as u32)) as f64;
        }
    }

    // Integral images of gray and gray^2, with a zero top/left border row.
    let stride = w + 1;
    let mut sum = vec![0.0f64; stride * (h + 1)];
    let mut sq_sum = vec![0.0f64; stride * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0.0;
        let mut row_sq = 0.0;
        for x in 0..w {
            let v = gray[y * w + x];
            row_sum += v;
            row_sq += v * v;
            sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
            sq_sum[(y + 1) * stride + x + 1] = sq_sum[y * stride + x + 1] + row_sq;
        }
    }

    let half = (config.anomaly_window / 2) as i64;
    let threshold = config.anomaly_threshold as f64;
    let mut mask = BinaryMask::empty(width, height);

    for y in 0..h {
        for x in 0..w {
            if !vegetation.get(x as u32, y as u32) {
                continue;
            }
            // Window clamped to the image borders.
            let x0 = (x as i64 - half).max(0) as usize;
            let y0 = (y as i64 - half).max(0) as usize;
            let x1 = ((x as i64 + half) as usize).min(w - 1) + 1;
            let y1 = ((y as i64 + half) as usize).min(h - 1) + 1;
            let count = ((x1 - x0) * (y1 - y0)) as f64;

            let window_sum = sum[y1 * stride + x1] - sum[y0 * stride + x1]
                - sum[y1 * stride + x0]
                + sum[y0 * stride + x0];
            let window_sq = sq_sum[y1 * stride + x1] - sq_sum[y0 * stride + x1]
                - sq_sum[y1 * stride + x0]
                + sq_sum[y0 * stride + x0];

            let mean = window_sum / count;
            let variance = (window_sq / count - mean * mean).max(0.0);
            let std = variance.sqrt();

            let z = (gray[y * w + x] - mean).abs() / (std + 1e-10);
            if z > threshold {
                mask.set(x as u32, y as u32, true);
            }
        }
    }

    mask
}

fn build_recommendations(
    severity: Severity,
    chlorosis_pct: f64,
    necrosis_pct: f64,
    anomaly_pct: f64,
) -> Vec<String> {
    let mut recs = Vec::new();

    if severity == Severity::Saudavel {
        recs.push("Vegetacao saudavel. Manter monitoramento regular.".to_string());
        return recs;
    }

    if chlorosis_pct > 5.0 {
        recs.push(format!(
            "Clorose detectada em {:.1}% da vegetacao. \
             Verificar deficiencia de nitrogenio, ferro ou magnesio.",
            chlorosis_pct
        ));
    }
    if necrosis_pct > 5.0 {
        recs.push(format!(
            "Necrose detectada em {:.1}% da vegetacao. \
             Investigar possivel infeccao fungica ou bacteriana.",
            necrosis_pct
        ));
    }
    if anomaly_pct > 5.0 {
        recs.push(format!(
            "Anomalias de textura em {:.1}% da vegetacao. \
             Pode indicar danos por insetos ou estresse hidrico.",
            anomaly_pct
        ));
    }

    match severity {
        Severity::Severo => recs.push(
            "Severidade alta. Recomenda-se inspecao presencial urgente \
             e coleta de amostras para diagnostico laboratorial."
                .to_string(),
        ),
        Severity::Moderado => recs.push(
            "Severidade moderada. Agendar inspecao presencial para \
             confirmar diagnostico e iniciar tratamento."
                .to_string(),
        ),
        _ => recs.push(
            "Severidade leve. Continuar monitoramento e observar \
             evolucao nas proximas semanas."
                .to_string(),
        ),
    }

    recs
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canvas {
        width: u32,
        height: u32,
        data: Vec<u8>,
    }

    impl Canvas {
        fn new(width: u32, height: u32, background: [u8; 3]) -> Self {
            let mut data = Vec::with_capacity((width * height * 3) as usize);
            for _ in 0..width * height {
                data.extend_from_slice(&background);
            }
            Self { width, height, data }
        }

        fn patch(&mut self, x0: u32, y0: u32, side: u32, color: [u8; 3]) -> &mut Self {
            for y in y0..(y0 + side).min(self.height) {
                for x in x0..(x0 + side).min(self.width) {
                    let i = ((y * self.width + x) * 3) as usize;
                    self.data[i..i + 3].copy_from_slice(&color);
                }
            }
            self
        }

        fn build(&self) -> PixelBuffer {
            PixelBuffer::new(self.width, self.height, self.data.clone()).unwrap()
        }
    }

    const GRAY_SOIL: [u8; 3] = [120, 110, 100];
    const RED_SOIL: [u8; 3] = [150, 60, 40];
    const GREEN: [u8; 3] = [30, 140, 30];
    const YELLOW: [u8; 3] = [220, 150, 40];
    const BROWN: [u8; 3] = [140, 80, 40];

    #[test]
    fn severity_thresholds() {
        assert_eq!(Severity::from_infection_rate(0.0), Severity::Saudavel);
        assert_eq!(Severity::from_infection_rate(4.99), Severity::Saudavel);
        assert_eq!(Severity::from_infection_rate(5.0), Severity::Leve);
        assert_eq!(Severity::from_infection_rate(14.99), Severity::Leve);
        assert_eq!(Severity::from_infection_rate(15.0), Severity::Moderado);
        assert_eq!(Severity::from_infection_rate(30.0), Severity::Severo);
    }

    #[test]
    fn uniform_gray_is_insufficient_vegetation() {
        let buf = PixelBuffer::filled(100, 100, [128, 128, 128]).unwrap();
        let result = classify_symptoms(&buf, &SymptomConfig::default()).unwrap();
        assert_eq!(result.healthy_percentage, 0.0);
        assert_eq!(result.infection_rate, 0.0);
        assert_eq!(result.severity, Severity::Saudavel);
        assert!(result.affected_regions.is_empty());
        assert_eq!(result.recommendations.len(), 1);
    }

    #[test]
    fn healthy_green_field_has_near_zero_infection() {
        let buf = Canvas::new(100, 100, GRAY_SOIL)
            .patch(20, 20, 50, GREEN)
            .build();
        let result = classify_symptoms(&buf, &SymptomConfig::default()).unwrap();
        assert!(result.total_vegetation_pixels >= 2500);
        assert!(result.infection_rate < 5.0);
        assert_eq!(result.severity, Severity::Saudavel);
    }

    #[test]
    fn percentages_account_for_all_vegetation() {
        let buf = Canvas::new(100, 100, GRAY_SOIL)
            .patch(10, 10, 50, GREEN)
            .patch(70, 70, 20, YELLOW)
            .build();
        let result = classify_symptoms(&buf, &SymptomConfig::default()).unwrap();
        let total = result.healthy_percentage
            + result.chlorosis_percentage
            + result.necrosis_percentage
            + result.anomaly_percentage;
        assert!((total - 100.0).abs() < 0.05, "sum was {}", total);
    }

    #[test]
    fn detects_chlorosis_patch() {
        let buf = Canvas::new(100, 100, GRAY_SOIL)
            .patch(10, 10, 50, GREEN)
            .patch(70, 70, 20, YELLOW)
            .build();
        let result = classify_symptoms(&buf, &SymptomConfig::default()).unwrap();
        assert!(result.chlorosis_percentage > 5.0);
        assert!(result.infection_rate >= result.chlorosis_percentage);
        assert!(result
            .affected_regions
            .iter()
            .any(|r| r.kind == RegionKind::Chlorosis));
        assert!(!result.recommendations.is_empty());
    }

    #[test]
    fn necrosis_takes_priority_over_chlorosis() {
        // Brown tissue whose hue sits in both symptom windows; red soil
        // background keeps its ExG below the brown patch.
        let buf = Canvas::new(100, 100, RED_SOIL)
            .patch(10, 10, 50, GREEN)
            .patch(70, 70, 20, BROWN)
            .build();
        let result = classify_symptoms(&buf, &SymptomConfig::default()).unwrap();
        assert!(result.necrosis_percentage > 5.0);
        assert_eq!(result.chlorosis_percentage, 0.0);
        assert!(result
            .affected_regions
            .iter()
            .any(|r| r.kind == RegionKind::Necrosis));
    }

    #[test]
    fn detects_texture_anomaly_cluster() {
        let mut canvas = Canvas::new(120, 120, GRAY_SOIL);
        canvas.patch(20, 20, 50, GREEN);
        // Washed-out cluster inside the canopy.
        canvas.patch(40, 40, 12, [200, 255, 200]);
        let buf = canvas.build();
        let result = classify_symptoms(&buf, &SymptomConfig::default()).unwrap();
        assert!(result.anomaly_percentage > 0.0);
        assert!(result
            .affected_regions
            .iter()
            .any(|r| r.kind == RegionKind::TextureAnomaly));
    }

    #[test]
    fn region_ids_are_sequential_after_merge() {
        let buf = Canvas::new(100, 100, GRAY_SOIL)
            .patch(10, 10, 40, GREEN)
            .patch(60, 10, 15, YELLOW)
            .patch(60, 60, 15, YELLOW)
            .build();
        let result = classify_symptoms(&buf, &SymptomConfig::default()).unwrap();
        for (i, region) in result.affected_regions.iter().enumerate() {
            assert_eq!(region.id, i as u32 + 1);
        }
        // Sorted largest first.
        for pair in result.affected_regions.windows(2) {
            assert!(pair[0].area_pixels >= pair[1].area_pixels);
        }
    }

    #[test]
    fn rejects_out_of_range_anomaly_threshold() {
        let buf = PixelBuffer::filled(50, 50, [0, 200, 0]).unwrap();
        let config = SymptomConfig {
            anomaly_threshold: 9.0,
            ..SymptomConfig::default()
        };
        assert!(classify_symptoms(&buf, &config).is_err());
    }
}
