use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::biomass::{estimate_biomass, BiomassResult};
use crate::buffer::{BinaryMask, PixelBuffer, CHANNELS};
use crate::canopy::{count_canopies, CanopyCountResult};
use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::heatmap::render_heatmap;
use crate::image_io::{save_buffer, InputImage};
use crate::index::compute_exg;
use crate::output::{write_json_report, write_regions_csv};
use crate::regions::Region;
use crate::survey::{
    analyze_colors, color_histogram, coverage_stats, estimate_health, ColorHistogram, ColorStats,
    CoverageStats, HealthEstimate,
};
use crate::symptoms::{classify_symptoms, SymptomResult};
use crate::threshold::threshold_mask;

/// Fixed ExG threshold for the coverage survey.
const COVERAGE_THRESHOLD: f32 = 0.3;

/// One head's result, tagged for the service boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "head", rename_all = "snake_case")]
pub enum AnalysisResult {
    Canopy(CanopyCountResult),
    Symptoms(SymptomResult),
    Biomass(BiomassResult),
}

/// Combined report of all analyses run against one image.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub filename: String,
    pub image_width: u32,
    pub image_height: u32,
    pub coverage: CoverageStats,
    pub health: HealthEstimate,
    pub colors: ColorStats,
    pub histogram: ColorHistogram,
    pub canopy: CanopyCountResult,
    pub symptoms: SymptomResult,
    pub biomass: BiomassResult,
}

/// Run every analysis head against a buffer.
pub fn analyze_buffer(
    buffer: &PixelBuffer,
    filename: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisReport> {
    let coverage = coverage_stats(buffer, COVERAGE_THRESHOLD)?;
    let health = estimate_health(buffer);
    let colors = analyze_colors(buffer);
    let histogram = color_histogram(buffer);
    let canopy = count_canopies(buffer, &config.canopy)?;
    let symptoms = classify_symptoms(buffer, &config.symptoms)?;
    let biomass = estimate_biomass(buffer, &config.biomass)?;

    Ok(AnalysisReport {
        filename: filename.to_string(),
        image_width: buffer.width(),
        image_height: buffer.height(),
        coverage,
        health,
        colors,
        histogram,
        canopy,
        symptoms,
        biomass,
    })
}

/// Process a single image: run all heads, then write the JSON report, the
/// flat region table, the heatmap, and (in debug mode) the vegetation mask.
pub fn process_image(input: InputImage, config: &AnalysisConfig, debug: bool) -> Result<()> {
    let InputImage {
        buffer,
        path: _,
        filename,
    } = input;

    let report = analyze_buffer(&buffer, &filename, config)?;

    println!(
        "{}: {} canopies, coverage {:.1}%, severity {}, biomass index {:.1} ({})",
        filename,
        report.canopy.total_canopies,
        report.coverage.vegetation_percentage,
        report.symptoms.severity.label(),
        report.biomass.biomass_index,
        report.biomass.density_class.label(),
    );

    let output_dir = PathBuf::from(&config.output_dir);

    write_json_report(
        &report,
        output_dir.join(format!("{}_analysis.json", filename)),
    )?;

    let mut regions: Vec<Region> = Vec::new();
    regions.extend(report.canopy.canopies.iter().cloned());
    regions.extend(report.symptoms.affected_regions.iter().cloned());
    write_regions_csv(&regions, output_dir.join(format!("{}_regions.csv", filename)))?;

    let exg = compute_exg(&buffer);
    let heatmap = render_heatmap(&exg, config.colormap);
    save_buffer(&heatmap, output_dir.join(format!("{}_heatmap.png", filename)))?;

    if debug {
        let (mask, _) = threshold_mask(
            &exg,
            None,
            config.symptoms.threshold_percentile,
            (config.symptoms.threshold_floor, 1.0),
        )?;
        save_mask(&mask, &output_dir.join(format!("{}_mask.png", filename)))?;
    }

    Ok(())
}

/// Render a binary mask as a black/white PNG for inspection.
fn save_mask(mask: &BinaryMask, path: &Path) -> Result<()> {
    let (width, height) = mask.dimensions();
    let mut data = Vec::with_capacity(width as usize * height as usize * CHANNELS);
    for &on in mask.values() {
        let v = if on { 255 } else { 0 };
        data.extend_from_slice(&[v, v, v]);
    }
    let buffer = PixelBuffer::new(width, height, data)?;
    save_buffer(&buffer, path)
}
