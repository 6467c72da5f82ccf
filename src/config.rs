use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{AgroScanError, Result};
use crate::heatmap::Colormap;
use crate::morphology::MAX_KERNEL_SIZE;

/// Configuration for the canopy counting head.
///
/// Every constant the head relies on lives here with a documented default,
/// so tests can override any of them deterministically.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CanopyConfig {
    /// Percentile of the ExG field used when no explicit threshold is given.
    #[serde(default = "default_threshold_percentile")]
    pub threshold_percentile: f32,

    /// Valid range the derived percentile threshold is clamped into.
    #[serde(default = "default_canopy_threshold_clamp")]
    pub threshold_clamp: [f32; 2],

    /// Caller-supplied threshold; skips the percentile computation entirely.
    #[serde(default)]
    pub explicit_threshold: Option<f32>,

    #[serde(default = "default_kernel_size")]
    pub kernel_size: u32,

    #[serde(default = "default_erode_iterations")]
    pub erode_iterations: u32,

    #[serde(default = "default_dilate_iterations")]
    pub dilate_iterations: u32,

    /// Minimum canopy area in pixels (original resolution).
    #[serde(default = "default_min_canopy_area")]
    pub min_canopy_area: u32,

    /// Maximum canopy area in pixels; larger patches are not single canopies.
    #[serde(default = "default_max_canopy_area")]
    pub max_canopy_area: u32,

    /// Cap on the per-canopy detail list in the result.
    #[serde(default = "default_max_detail_regions")]
    pub max_detail_regions: usize,

    /// Buffers whose longer side exceeds this are downscaled before the
    /// expensive stages; 0 disables downscaling.
    #[serde(default = "default_canopy_max_dimension")]
    pub max_dimension: u32,
}

/// Configuration for the disease-symptom classification head.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SymptomConfig {
    #[serde(default = "default_threshold_percentile")]
    pub threshold_percentile: f32,

    /// Lower bound for the derived vegetation threshold.
    #[serde(default = "default_threshold_floor")]
    pub threshold_floor: f32,

    /// Z-score above which a pixel counts as a texture anomaly.
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f32,

    /// Side of the sliding window for local texture statistics.
    #[serde(default = "default_anomaly_window")]
    pub anomaly_window: u32,

    /// Minimum symptom-region area in pixels.
    #[serde(default = "default_min_region_area")]
    pub min_region_area: u32,

    #[serde(default = "default_max_regions_per_symptom")]
    pub max_regions_per_symptom: usize,

    #[serde(default = "default_max_total_regions")]
    pub max_total_regions: usize,

    /// Chlorosis hue window in degrees (0-360 scale).
    #[serde(default = "default_chlorosis_hue_range")]
    pub chlorosis_hue_range: [f32; 2],

    /// Saturation (0-1) below which yellowing is ignored.
    #[serde(default = "default_chlorosis_saturation_floor")]
    pub chlorosis_saturation_floor: f32,

    /// Necrosis hue window in degrees (0-360 scale).
    #[serde(default = "default_necrosis_hue_range")]
    pub necrosis_hue_range: [f32; 2],

    #[serde(default = "default_necrosis_saturation_floor")]
    pub necrosis_saturation_floor: f32,

    /// Brightness (0-1) above which browning is ignored.
    #[serde(default = "default_necrosis_value_ceiling")]
    pub necrosis_value_ceiling: f32,

    #[serde(default = "default_analysis_max_dimension")]
    pub max_dimension: u32,
}

/// Configuration for the biomass estimation head.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BiomassConfig {
    #[serde(default = "default_threshold_percentile")]
    pub threshold_percentile: f32,

    #[serde(default = "default_threshold_floor")]
    pub threshold_floor: f32,

    #[serde(default = "default_kernel_size")]
    pub kernel_size: u32,

    #[serde(default = "default_erode_iterations")]
    pub erode_iterations: u32,

    #[serde(default = "default_dilate_iterations")]
    pub dilate_iterations: u32,

    /// Minimum canopy-patch area in pixels.
    #[serde(default = "default_min_canopy_area")]
    pub min_canopy_area: u32,

    /// Cap on the reported canopy-patch list.
    #[serde(default = "default_max_canopy_patches")]
    pub max_canopy_patches: usize,

    #[serde(default = "default_analysis_max_dimension")]
    pub max_dimension: u32,
}

/// Top-level configuration for the CLI pipeline.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_input_path")]
    pub input_path: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_colormap")]
    pub colormap: Colormap,

    #[serde(default = "default_parallel")]
    pub use_parallel: bool,

    #[serde(default)]
    pub canopy: CanopyConfig,

    #[serde(default)]
    pub symptoms: SymptomConfig,

    #[serde(default)]
    pub biomass: BiomassConfig,
}

fn default_threshold_percentile() -> f32 {
    70.0
}

fn default_canopy_threshold_clamp() -> [f32; 2] {
    [0.5, 0.7]
}

fn default_threshold_floor() -> f32 {
    0.05
}

fn default_kernel_size() -> u32 {
    5
}

fn default_erode_iterations() -> u32 {
    2
}

fn default_dilate_iterations() -> u32 {
    1
}

fn default_min_canopy_area() -> u32 {
    50
}

fn default_max_canopy_area() -> u32 {
    15000
}

fn default_max_detail_regions() -> usize {
    100
}

fn default_canopy_max_dimension() -> u32 {
    2000
}

fn default_anomaly_threshold() -> f32 {
    2.0
}

fn default_anomaly_window() -> u32 {
    51
}

fn default_min_region_area() -> u32 {
    100
}

fn default_max_regions_per_symptom() -> usize {
    7
}

fn default_max_total_regions() -> usize {
    20
}

fn default_chlorosis_hue_range() -> [f32; 2] {
    [20.0, 40.0]
}

fn default_chlorosis_saturation_floor() -> f32 {
    0.20
}

fn default_necrosis_hue_range() -> [f32; 2] {
    [10.0, 25.0]
}

fn default_necrosis_saturation_floor() -> f32 {
    0.12
}

fn default_necrosis_value_ceiling() -> f32 {
    0.59
}

fn default_analysis_max_dimension() -> u32 {
    1500
}

fn default_max_canopy_patches() -> usize {
    20
}

fn default_input_path() -> String {
    "./input".to_string()
}

fn default_output_dir() -> String {
    "./output".to_string()
}

fn default_colormap() -> Colormap {
    Colormap::Green
}

fn default_parallel() -> bool {
    true
}

impl Default for CanopyConfig {
    fn default() -> Self {
        Self {
            threshold_percentile: default_threshold_percentile(),
            threshold_clamp: default_canopy_threshold_clamp(),
            explicit_threshold: None,
            kernel_size: default_kernel_size(),
            erode_iterations: default_erode_iterations(),
            dilate_iterations: default_dilate_iterations(),
            min_canopy_area: default_min_canopy_area(),
            max_canopy_area: default_max_canopy_area(),
            max_detail_regions: default_max_detail_regions(),
            max_dimension: default_canopy_max_dimension(),
        }
    }
}

impl Default for SymptomConfig {
    fn default() -> Self {
        Self {
            threshold_percentile: default_threshold_percentile(),
            threshold_floor: default_threshold_floor(),
            anomaly_threshold: default_anomaly_threshold(),
            anomaly_window: default_anomaly_window(),
            min_region_area: default_min_region_area(),
            max_regions_per_symptom: default_max_regions_per_symptom(),
            max_total_regions: default_max_total_regions(),
            chlorosis_hue_range: default_chlorosis_hue_range(),
            chlorosis_saturation_floor: default_chlorosis_saturation_floor(),
            necrosis_hue_range: default_necrosis_hue_range(),
            necrosis_saturation_floor: default_necrosis_saturation_floor(),
            necrosis_value_ceiling: default_necrosis_value_ceiling(),
            max_dimension: default_analysis_max_dimension(),
        }
    }
}

impl Default for BiomassConfig {
    fn default() -> Self {
        Self {
            threshold_percentile: default_threshold_percentile(),
            threshold_floor: default_threshold_floor(),
            kernel_size: default_kernel_size(),
            erode_iterations: default_erode_iterations(),
            dilate_iterations: default_dilate_iterations(),
            min_canopy_area: default_min_canopy_area(),
            max_canopy_patches: default_max_canopy_patches(),
            max_dimension: default_analysis_max_dimension(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            output_dir: default_output_dir(),
            colormap: default_colormap(),
            use_parallel: default_parallel(),
            canopy: CanopyConfig::default(),
            symptoms: SymptomConfig::default(),
            biomass: BiomassConfig::default(),
        }
    }
}

fn check_kernel(kernel_size: u32) -> Result<()> {
    if kernel_size == 0 || kernel_size % 2 == 0 || kernel_size > MAX_KERNEL_SIZE {
        return Err(AgroScanError::InvalidParameter {
            name: "kernel_size",
            value: kernel_size as f64,
            range: "odd, [1, 51]",
        });
    }
    Ok(())
}

fn check_percentile(p: f32) -> Result<()> {
    if !(0.0..=100.0).contains(&p) {
        return Err(AgroScanError::InvalidParameter {
            name: "threshold_percentile",
            value: p as f64,
            range: "[0, 100]",
        });
    }
    Ok(())
}

impl CanopyConfig {
    /// Reject out-of-range caller parameters (no silent clamping at the
    /// call boundary; the internal clamp applies only to derived values).
    pub fn validate(&self) -> Result<()> {
        check_percentile(self.threshold_percentile)?;
        check_kernel(self.kernel_size)?;
        if self.threshold_clamp[0] > self.threshold_clamp[1] {
            return Err(AgroScanError::InvalidParameter {
                name: "threshold_clamp",
                value: self.threshold_clamp[0] as f64,
                range: "min <= max",
            });
        }
        if let Some(t) = self.explicit_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(AgroScanError::InvalidParameter {
                    name: "explicit_threshold",
                    value: t as f64,
                    range: "[0, 1]",
                });
            }
        }
        if !(10..=10_000).contains(&self.min_canopy_area) {
            return Err(AgroScanError::InvalidParameter {
                name: "min_canopy_area",
                value: self.min_canopy_area as f64,
                range: "[10, 10000]",
            });
        }
        if self.max_canopy_area < self.min_canopy_area {
            return Err(AgroScanError::InvalidParameter {
                name: "max_canopy_area",
                value: self.max_canopy_area as f64,
                range: ">= min_canopy_area",
            });
        }
        Ok(())
    }
}

impl SymptomConfig {
    pub fn validate(&self) -> Result<()> {
        check_percentile(self.threshold_percentile)?;
        if !(0.5..=5.0).contains(&self.anomaly_threshold) {
            return Err(AgroScanError::InvalidParameter {
                name: "anomaly_threshold",
                value: self.anomaly_threshold as f64,
                range: "[0.5, 5.0]",
            });
        }
        if self.anomaly_window == 0 || self.anomaly_window % 2 == 0 {
            return Err(AgroScanError::InvalidParameter {
                name: "anomaly_window",
                value: self.anomaly_window as f64,
                range: "odd, >= 1",
            });
        }
        if !(10..=10_000).contains(&self.min_region_area) {
            return Err(AgroScanError::InvalidParameter {
                name: "min_region_area",
                value: self.min_region_area as f64,
                range: "[10, 10000]",
            });
        }
        for (name, range) in [
            ("chlorosis_hue_range", &self.chlorosis_hue_range),
            ("necrosis_hue_range", &self.necrosis_hue_range),
        ] {
            if !(0.0..=360.0).contains(&range[0]) || !(0.0..=360.0).contains(&range[1]) || range[0] > range[1] {
                return Err(AgroScanError::InvalidParameter {
                    name,
                    value: range[0] as f64,
                    range: "[0, 360], min <= max",
                });
            }
        }
        Ok(())
    }
}

impl BiomassConfig {
    pub fn validate(&self) -> Result<()> {
        check_percentile(self.threshold_percentile)?;
        check_kernel(self.kernel_size)?;
        if !(10..=10_000).contains(&self.min_canopy_area) {
            return Err(AgroScanError::InvalidParameter {
                name: "min_canopy_area",
                value: self.min_canopy_area as f64,
                range: "[10, 10000]",
            });
        }
        Ok(())
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AgroScanError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: AnalysisConfig = toml::from_str(&content).map_err(|e| {
            AgroScanError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Ok(config)
    }

    /// Validate all head configurations and the input path.
    pub fn validate(&self) -> Result<()> {
        let input_path = PathBuf::from(&self.input_path);
        if !input_path.exists() {
            return Err(AgroScanError::InvalidPath(input_path));
        }
        self.canopy.validate()?;
        self.symptoms.validate()?;
        self.biomass.validate()?;
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AgroScanError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content).map_err(AgroScanError::Io)?;
        Ok(())
    }
}
