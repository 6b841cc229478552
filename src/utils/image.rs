//! Utility functions for image loading.
//!
//! This module provides functions for loading single or batch images from
//! files and converting them to the RGB format the pipeline works with.

use crate::core::{CountError, constants::DEFAULT_PARALLEL_THRESHOLD};
use image::{DynamicImage, RgbImage};
use rayon::prelude::*;
use std::path::Path;

/// Converts a DynamicImage to an RgbImage.
///
/// # Arguments
///
/// * `img` - The DynamicImage to convert
///
/// # Returns
///
/// * `RgbImage` - The converted RGB image
pub fn dynamic_to_rgb(img: DynamicImage) -> RgbImage {
    img.to_rgb8()
}

/// Loads an image from a file path and converts it to RgbImage.
///
/// Any format supported by the image crate is accepted; the decoded image
/// is converted to 8-bit RGB with channels in R, G, B order.
///
/// # Arguments
///
/// * `path` - A reference to the path of the image file to load
///
/// # Returns
///
/// * `Ok(RgbImage)` - The loaded and converted RGB image
/// * `Err(CountError)` - An error if the image could not be loaded
///
/// # Errors
///
/// This function will return a `CountError::ImageLoad` error if the image
/// cannot be loaded from the specified path.
pub fn load_image(path: &Path) -> Result<RgbImage, CountError> {
    let img = image::open(path).map_err(CountError::ImageLoad)?;
    Ok(dynamic_to_rgb(img))
}

/// Loads multiple images from file paths.
///
/// Decoding is parallelized with rayon once the batch exceeds
/// `DEFAULT_PARALLEL_THRESHOLD` paths; smaller batches are loaded
/// sequentially to avoid the thread-pool overhead.
///
/// # Arguments
///
/// * `paths` - The paths of the image files to load
///
/// # Returns
///
/// A Result containing the loaded images in input order, or the first
/// error encountered.
pub fn load_images_batch(paths: &[impl AsRef<Path> + Sync]) -> Result<Vec<RgbImage>, CountError> {
    if paths.len() > DEFAULT_PARALLEL_THRESHOLD {
        paths
            .par_iter()
            .map(|path| load_image(path.as_ref()))
            .collect()
    } else {
        paths.iter().map(|path| load_image(path.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reports_image_load_error() {
        let err = load_image(Path::new("no/such/image.jpg")).unwrap_err();
        assert!(matches!(err, CountError::ImageLoad(_)));
    }

    #[test]
    fn dynamic_conversion_preserves_dimensions() {
        let dynamic = DynamicImage::new_rgb8(17, 9);
        let rgb = dynamic_to_rgb(dynamic);
        assert_eq!((rgb.width(), rgb.height()), (17, 9));
    }

    #[test]
    fn batch_load_propagates_first_error() {
        let paths = vec![Path::new("also/missing.png"); DEFAULT_PARALLEL_THRESHOLD + 2];
        assert!(load_images_batch(&paths).is_err());
    }
}
