mod biomass;
mod buffer;
mod canopy;
mod color;
mod config;
mod errors;
mod heatmap;
mod image_io;
mod index;
mod morphology;
mod output;
mod pipeline;
mod regions;
mod survey;
mod symptoms;
mod threshold;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, ValueEnum};
use rayon::prelude::*;

use config::AnalysisConfig;
use errors::{AgroScanError, Result};
use heatmap::Colormap;
use image_io::{get_image_files_in_dir, load_image};
use pipeline::process_image;

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "AgroScan - Aerial Vegetation Analysis")]
struct Args {
    /// Path to input image file or directory
    #[clap(short, long)]
    input: Option<String>,

    /// Path to output directory
    #[clap(short, long)]
    output: Option<String>,

    /// Path to configuration file
    #[clap(short, long, default_value = "agroscan.toml")]
    config: String,

    /// Heatmap colormap (overwrites config)
    #[clap(short = 'm', long)]
    colormap: Option<ColormapArg>,

    /// Enable debug mode (save the vegetation mask alongside the results)
    #[clap(short, long)]
    debug: bool,

    /// Process directory entries sequentially instead of in parallel
    #[clap(long)]
    sequential: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColormapArg {
    Green,
    Jet,
    Viridis,
}

/// Main function
fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration, falling back to defaults when no file is present.
    let mut config = if Path::new(&args.config).exists() {
        AnalysisConfig::from_file(&args.config)?
    } else {
        AnalysisConfig::default()
    };

    // Override config with command-line arguments
    if let Some(input) = args.input.clone() {
        config.input_path = input;
    }

    if let Some(output) = args.output.clone() {
        config.output_dir = output;
    }

    if let Some(colormap) = args.colormap {
        config.colormap = match colormap {
            ColormapArg::Green => Colormap::Green,
            ColormapArg::Jet => Colormap::Jet,
            ColormapArg::Viridis => Colormap::Viridis,
        };
    }

    if args.sequential {
        config.use_parallel = false;
    }

    config.validate()?;

    let start_time = Instant::now();

    fs::create_dir_all(&config.output_dir)?;

    let input_path = PathBuf::from(&config.input_path);

    if input_path.is_file() {
        println!("Processing single file: {}", input_path.display());
        let input_image = load_image(&input_path)?;
        process_image(input_image, &config, args.debug)?;
    } else if input_path.is_dir() {
        println!("Processing directory: {}", input_path.display());
        let files = get_image_files_in_dir(&input_path)?;

        println!("Found {} image files", files.len());

        if config.use_parallel {
            files
                .par_iter()
                .map(|path| {
                    println!("Processing: {}", path.display());
                    match load_image(path) {
                        Ok(input_image) => process_image(input_image, &config, args.debug),
                        Err(e) => {
                            eprintln!("Error loading {}: {}", path.display(), e);
                            Err(e)
                        }
                    }
                })
                .collect::<Vec<_>>();
        } else {
            for path in &files {
                println!("Processing: {}", path.display());
                let input_image = load_image(path)?;
                process_image(input_image, &config, args.debug)?;
            }
        }
    } else {
        return Err(AgroScanError::InvalidPath(input_path));
    }

    let elapsed = start_time.elapsed();
    println!("Processing completed in {:.2} seconds", elapsed.as_secs_f64());

    Ok(())
}
