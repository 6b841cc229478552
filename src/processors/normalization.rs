//! Image normalization utilities for crowd counting models.
//!
//! This module provides functionality to normalize images before inference,
//! using standard ImageNet normalization with per-channel mean and standard
//! deviation, producing channel-first float tensors with a batch dimension.

use crate::core::errors::CountError;
use crate::core::constants::{DEFAULT_SCALE, IMAGENET_MEAN, IMAGENET_STD};
use crate::core::tensor::Tensor4D;
use crate::processors::types::ChannelOrder;
use image::RgbImage;
use rayon::prelude::*;

/// Normalizes images for crowd counting inference.
///
/// This struct encapsulates the parameters needed to normalize images,
/// including scaling factors, mean values, standard deviations, and channel
/// ordering. The per-channel affine transform is precomputed as
/// `alpha = scale / std` and `beta = -mean / std` so each pixel costs one
/// multiply-add.
#[derive(Debug)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    pub alpha: Vec<f32>,
    /// Offset values for each channel (beta = -mean / std)
    pub beta: Vec<f32>,
    /// Channel ordering (CHW or HWC)
    pub order: ChannelOrder,
}

impl NormalizeImage {
    /// Creates a new NormalizeImage instance with the specified parameters.
    ///
    /// # Arguments
    ///
    /// * `scale` - Optional scaling factor (defaults to 1.0/255.0)
    /// * `mean` - Optional mean values for each channel (defaults to ImageNet mean)
    /// * `std` - Optional standard deviation values for each channel (defaults to ImageNet std)
    /// * `order` - Optional channel ordering (defaults to CHW)
    ///
    /// # Returns
    ///
    /// A Result containing the new NormalizeImage instance or a CountError if validation fails.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * Scale is less than or equal to 0
    /// * Mean or std vectors don't have exactly 3 elements
    /// * Any standard deviation value is less than or equal to 0
    pub fn new(
        scale: Option<f32>,
        mean: Option<Vec<f32>>,
        std: Option<Vec<f32>>,
        order: Option<ChannelOrder>,
    ) -> Result<Self, CountError> {
        let scale = scale.unwrap_or(DEFAULT_SCALE);
        let mean = mean.unwrap_or_else(|| IMAGENET_MEAN.to_vec());
        let std = std.unwrap_or_else(|| IMAGENET_STD.to_vec());
        let order = order.unwrap_or(ChannelOrder::CHW);

        if scale <= 0.0 {
            return Err(CountError::ConfigError {
                message: "Scale must be greater than 0".to_string(),
            });
        }

        if mean.len() != 3 {
            return Err(CountError::ConfigError {
                message: "Mean must have exactly 3 elements for RGB".to_string(),
            });
        }

        if std.len() != 3 {
            return Err(CountError::ConfigError {
                message: "Std must have exactly 3 elements for RGB".to_string(),
            });
        }

        for (i, &s) in std.iter().enumerate() {
            if s <= 0.0 {
                return Err(CountError::ConfigError {
                    message: format!(
                        "Standard deviation at index {i} must be greater than 0, got {s}"
                    ),
                });
            }
        }

        let alpha: Vec<f32> = std.iter().map(|s| scale / s).collect();
        let beta: Vec<f32> = mean.iter().zip(&std).map(|(m, s)| -m / s).collect();

        Ok(Self { alpha, beta, order })
    }

    /// Creates a NormalizeImage instance with the ImageNet defaults.
    ///
    /// This is the normalization every supported crowd counting model was
    /// trained with: scale 1/255, ImageNet mean and std, CHW order.
    pub fn imagenet() -> Result<Self, CountError> {
        Self::new(None, None, None, None)
    }

    /// Normalizes a single image and returns it as a 4D tensor with batch dimension 1.
    ///
    /// # Arguments
    ///
    /// * `img` - The RgbImage to normalize
    ///
    /// # Returns
    ///
    /// A Result containing the normalized image as a (1, 3, H, W) or
    /// (1, H, W, 3) tensor, or a CountError.
    pub fn normalize_to(&self, img: &RgbImage) -> Result<Tensor4D, CountError> {
        let (width, height) = img.dimensions();
        let channels = 3u32;

        match self.order {
            ChannelOrder::CHW => {
                let mut result = vec![0.0f32; (channels * height * width) as usize];

                for c in 0..channels {
                    for y in 0..height {
                        for x in 0..width {
                            let pixel = img.get_pixel(x, y);
                            let channel_value = pixel[c as usize] as f32;
                            let dst_idx = (c * height * width + y * width + x) as usize;

                            result[dst_idx] =
                                channel_value * self.alpha[c as usize] + self.beta[c as usize];
                        }
                    }
                }

                ndarray::Array4::from_shape_vec(
                    (1, channels as usize, height as usize, width as usize),
                    result,
                )
                .map_err(|e| {
                    CountError::normalization(
                        &format!(
                            "Failed to create CHW tensor for {}x{} image",
                            width, height
                        ),
                        e,
                    )
                })
            }
            ChannelOrder::HWC => {
                let mut result = vec![0.0f32; (height * width * channels) as usize];

                for y in 0..height {
                    for x in 0..width {
                        let pixel = img.get_pixel(x, y);
                        for c in 0..channels {
                            let channel_value = pixel[c as usize] as f32;
                            let dst_idx = (y * width * channels + x * channels + c) as usize;

                            result[dst_idx] =
                                channel_value * self.alpha[c as usize] + self.beta[c as usize];
                        }
                    }
                }

                ndarray::Array4::from_shape_vec(
                    (1, height as usize, width as usize, channels as usize),
                    result,
                )
                .map_err(|e| {
                    CountError::normalization(
                        &format!(
                            "Failed to create HWC tensor for {}x{} image",
                            width, height
                        ),
                        e,
                    )
                })
            }
        }
    }

    /// Normalizes a batch of same-sized images and returns them as a 4D tensor.
    ///
    /// # Arguments
    ///
    /// * `imgs` - A slice of RgbImage instances to normalize
    ///
    /// # Returns
    ///
    /// A Result containing the normalized batch as a 4D tensor or a CountError.
    ///
    /// # Errors
    ///
    /// Returns an error if images in the batch don't all have the same dimensions.
    pub fn normalize_batch_to(&self, imgs: &[RgbImage]) -> Result<Tensor4D, CountError> {
        if imgs.is_empty() {
            return Ok(ndarray::Array4::zeros((0, 0, 0, 0)));
        }

        let batch_size = imgs.len();
        let (first_width, first_height) = imgs[0].dimensions();
        for (i, img) in imgs.iter().enumerate() {
            let (width, height) = img.dimensions();
            if width != first_width || height != first_height {
                return Err(CountError::InvalidInput {
                    message: format!(
                        "All images in batch must have the same dimensions. Image 0: {first_width}x{first_height}, Image {i}: {width}x{height}"
                    ),
                });
            }
        }

        // Single-image normalization per slot, parallelized across the batch.
        let per_image: Result<Vec<Tensor4D>, CountError> = if batch_size > 1 {
            imgs.par_iter().map(|img| self.normalize_to(img)).collect()
        } else {
            imgs.iter().map(|img| self.normalize_to(img)).collect()
        };
        let per_image = per_image?;

        let views: Vec<_> = per_image.iter().map(|t| t.view()).collect();
        ndarray::concatenate(ndarray::Axis(0), &views)
            .map_err(|e| CountError::normalization("Failed to assemble batch tensor", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_image(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb([value, value, value]))
    }

    #[test]
    fn imagenet_normalization_shape_and_values() {
        let normalize = NormalizeImage::imagenet().unwrap();
        let img = solid_image(4, 3, 128);
        let tensor = normalize.normalize_to(&img).unwrap();
        assert_eq!(tensor.dim(), (1, 3, 3, 4));

        for c in 0..3 {
            let expected = (128.0 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            let got = tensor[[0, c, 0, 0]];
            assert!(
                (got - expected).abs() < 1e-5,
                "channel {c}: expected {expected}, got {got}"
            );
        }
    }

    #[test]
    fn normalized_range_for_extreme_pixels() {
        let normalize = NormalizeImage::imagenet().unwrap();
        let black = normalize.normalize_to(&solid_image(2, 2, 0)).unwrap();
        let white = normalize.normalize_to(&solid_image(2, 2, 255)).unwrap();

        // ImageNet normalization maps [0, 255] into roughly [-2.2, 2.7].
        for &v in black.iter() {
            assert!(v < 0.0 && v > -2.5);
        }
        for &v in white.iter() {
            assert!(v > 0.0 && v < 3.0);
        }
    }

    #[test]
    fn hwc_order_places_channels_last() {
        let normalize =
            NormalizeImage::new(None, None, None, Some(ChannelOrder::HWC)).unwrap();
        let mut img = solid_image(2, 2, 0);
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        let tensor = normalize.normalize_to(&img).unwrap();
        assert_eq!(tensor.dim(), (1, 2, 2, 3));
        // Red channel at (0, 0) should be the largest value of that pixel.
        assert!(tensor[[0, 0, 0, 0]] > tensor[[0, 0, 0, 1]]);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(NormalizeImage::new(Some(0.0), None, None, None).is_err());
        assert!(NormalizeImage::new(None, Some(vec![0.5; 2]), None, None).is_err());
        assert!(
            NormalizeImage::new(None, None, Some(vec![0.2, 0.0, 0.2]), None).is_err()
        );
    }

    #[test]
    fn batch_rejects_mixed_dimensions() {
        let normalize = NormalizeImage::imagenet().unwrap();
        let imgs = vec![solid_image(4, 4, 10), solid_image(2, 4, 10)];
        assert!(normalize.normalize_batch_to(&imgs).is_err());
    }

    #[test]
    fn batch_stacks_along_first_axis() {
        let normalize = NormalizeImage::imagenet().unwrap();
        let imgs = vec![solid_image(3, 2, 50), solid_image(3, 2, 200)];
        let tensor = normalize.normalize_batch_to(&imgs).unwrap();
        assert_eq!(tensor.dim(), (2, 3, 2, 3));
        assert!(tensor[[0, 0, 0, 0]] < tensor[[1, 0, 0, 0]]);
    }
}
