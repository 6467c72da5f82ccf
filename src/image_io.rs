use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};

use crate::buffer::PixelBuffer;
use crate::errors::{AgroScanError, Result};

/// Represents an input image with its metadata
pub struct InputImage {
    pub buffer: PixelBuffer,
    pub path: PathBuf,
    pub filename: String,
}

/// Get all PNG/JPEG files from a directory (recursively)
pub fn get_image_files_in_dir<P: AsRef<Path>>(dir_path: P) -> Result<Vec<PathBuf>> {
    let dir_path = dir_path.as_ref();

    if !dir_path.exists() {
        return Err(AgroScanError::InvalidPath(dir_path.to_path_buf()));
    }

    if !dir_path.is_dir() {
        return Err(AgroScanError::Config(format!(
            "{} is not a directory",
            dir_path.display()
        )));
    }

    let mut files = Vec::new();
    find_image_files_recursive(dir_path, &mut files)?;

    Ok(files)
}

fn find_image_files_recursive(dir_path: &Path, result: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir_path).map_err(AgroScanError::Io)?;

    for entry in entries {
        let entry = entry.map_err(AgroScanError::Io)?;
        let path = entry.path();

        if path.is_dir() {
            find_image_files_recursive(&path, result)?;
        } else if path.is_file() {
            if let Some(ext) = path.extension() {
                let ext = ext.to_ascii_lowercase();
                if ext == "png" || ext == "jpg" || ext == "jpeg" {
                    result.push(path);
                }
            }
        }
    }

    Ok(())
}

/// Load an image from disk, converting it to an RGB pixel buffer.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<InputImage> {
    let path = path.as_ref();

    let filename = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| AgroScanError::InvalidPath(path.to_path_buf()))?
        .to_string();

    let img = image::open(path).map_err(AgroScanError::Image)?;
    let rgb: RgbImage = img.to_rgb8();
    let buffer = PixelBuffer::from_rgb_image(&rgb)?;

    Ok(InputImage {
        buffer,
        path: path.to_path_buf(),
        filename,
    })
}

/// Save a pixel buffer as a PNG at the specified path
pub fn save_buffer<P: AsRef<Path>>(buffer: &PixelBuffer, path: P) -> Result<()> {
    buffer
        .to_rgb_image()
        .save_with_format(path, ImageFormat::Png)
        .map_err(AgroScanError::Image)?;

    Ok(())
}
