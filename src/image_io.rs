use std::fs;
use std::path::{Path, PathBuf};

use crate::buffer::PixelBuffer;
use crate::errors::{Result, VegMetricsError};

/// Represents a decoded input image with its metadata
pub struct InputImage {
    pub buffer: PixelBuffer,
    pub path: PathBuf,
    pub filename: String,
}

/// Extensions recognized as field photographs.
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Get all image files from a directory (recursively), sorted by path so a
/// directory always yields the same ordering.
pub fn get_image_files_in_dir<P: AsRef<Path>>(dir_path: P) -> Result<Vec<PathBuf>> {
    let dir_path = dir_path.as_ref();

    if !dir_path.exists() {
        return Err(VegMetricsError::InvalidPath(dir_path.to_path_buf()));
    }

    if !dir_path.is_dir() {
        return Err(VegMetricsError::Config(format!(
            "{} is not a directory",
            dir_path.display()
        )));
    }

    let mut image_files = Vec::new();
    find_image_files_recursive(dir_path, &mut image_files)?;
    image_files.sort();

    Ok(image_files)
}

/// Helper function to recursively search for image files
fn find_image_files_recursive(dir_path: &Path, result: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir_path).map_err(VegMetricsError::Io)?;

    for entry in entries {
        let entry = entry.map_err(VegMetricsError::Io)?;
        let path = entry.path();

        if path.is_dir() {
            find_image_files_recursive(&path, result)?;
        } else if path.is_file() {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
                    result.push(path);
                }
            }
        }
    }

    Ok(())
}

/// Load a PNG/JPEG image and copy it into an analysis buffer.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<InputImage> {
    let path = path.as_ref();

    let filename = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| VegMetricsError::InvalidPath(path.to_path_buf()))?
        .to_string();

    let img = image::open(path).map_err(VegMetricsError::Image)?;
    let buffer = PixelBuffer::from_rgba(&img.to_rgba8())?;

    Ok(InputImage {
        buffer,
        path: path.to_path_buf(),
        filename,
    })
}
