// src/lib.rs - Library interface for AgroScan

pub mod biomass;
pub mod buffer;
pub mod canopy;
pub mod color;
pub mod config;
pub mod errors;
pub mod heatmap;
pub mod image_io;
pub mod index;
pub mod morphology;
pub mod output;
pub mod pipeline;
pub mod regions;
pub mod survey;
pub mod symptoms;
pub mod threshold;

// Re-export commonly used types and functions
pub use errors::{AgroScanError, Result};
pub use config::{AnalysisConfig, BiomassConfig, CanopyConfig, SymptomConfig};
pub use pipeline::{analyze_buffer, process_image, AnalysisReport, AnalysisResult};
pub use image_io::{get_image_files_in_dir, load_image, save_buffer, InputImage};

// Re-export the core pixel primitives
pub use buffer::{BinaryMask, IndexField, PixelBuffer};
pub use index::{compute_exg, compute_gli};
pub use threshold::{percentile, threshold_mask};
pub use morphology::{dilate, erode, separate, Kernel};
pub use regions::{extract_regions, Region, RegionFilter, RegionKind, MIN_VEGETATION_PIXELS};

// Re-export the analysis heads
pub use canopy::{count_canopies, CanopyCountResult};
pub use symptoms::{classify_symptoms, Severity, SymptomResult};
pub use biomass::{
    compute_biomass_index, estimate_biomass, estimate_biomass_kg_ha, BiomassResult, DensityClass,
    VigorMetrics,
};

// Re-export the survey and rendering utilities
pub use survey::{
    analyze_colors, color_histogram, coverage_stats, estimate_health, ChannelStats,
    ColorHistogram, ColorStats, CoverageStats, HealthEstimate,
};
pub use heatmap::{render_heatmap, Colormap};
