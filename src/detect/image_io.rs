use std::path::Path;

use image::RgbImage;

use crate::detect::DetectError;

/// Decodes any supported format into 3-channel RGB. Grey is replicated
/// and alpha dropped.
pub fn load_rgb(path: &Path) -> Result<RgbImage, DetectError> {
    let img = image::open(path).map_err(|source| DetectError::ImageRead {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(
        path = %path.display(),
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "decoded image"
    );
    Ok(img.to_rgb8())
}

/// Output format follows the file extension.
pub fn save(image: &RgbImage, path: &Path) -> Result<(), DetectError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    image.save(path).map_err(|source| DetectError::ImageWrite {
        path: path.to_path_buf(),
        source,
    })
}
