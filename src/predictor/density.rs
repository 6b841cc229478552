//! Crowd density predictor
//!
//! This module provides the end-to-end predictor for crowd density
//! estimation. Given an image, it normalizes it with ImageNet statistics,
//! runs the ONNX forward pass, rescales the density map by the configured
//! divisor, and sums the map into a head count.

use crate::core::{
    CommonBuilderConfig, ConfigValidator, CountError, OrtInfer, OrtSessionConfig,
    constants::DEFAULT_DIVIDE, inference::DensityOutput, tensor::Tensor2D,
};
use crate::processors::{DensityPostProcess, NormalizeImage};
use crate::utils::load_image;
use image::RgbImage;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Result of a single density prediction.
///
/// Holds the input image alongside the predicted maps and the derived
/// head count. The density map is at `1/downsample` of the input
/// resolution.
#[derive(Debug, Clone)]
pub struct DensityResult {
    /// Path the input image was loaded from (empty for in-memory images)
    pub input_path: Arc<str>,
    /// The input image
    pub input_img: Arc<RgbImage>,
    /// Predicted density map, rescaled by the divide factor
    pub density_map: Tensor2D,
    /// Auxiliary attention map from the model (same as the density map
    /// for single-output architectures)
    pub auxiliary_map: Tensor2D,
    /// Estimated head count (spatial sum of the density map)
    pub count: f32,
    /// Factor by which the density map is smaller than the input image
    pub downsample: u32,
}

impl DensityResult {
    /// Returns the sum over the top-left quarter-by-quarter corner of the
    /// density map.
    ///
    /// The slice spans a quarter of each dimension, so a uniform crowd
    /// puts roughly a sixteenth of the count here. Useful as a quick
    /// spatial sanity check.
    pub fn quadrant_count(&self) -> f32 {
        DensityPostProcess::quadrant_sum(&self.density_map)
    }
}

impl fmt::Display for DensityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (height, width) = self.density_map.dim();
        write!(
            f,
            "count {:.2} over {}x{} density map (top-left quadrant {:.2})",
            self.count,
            width,
            height,
            self.quadrant_count()
        )
    }
}

/// Configuration for the crowd density predictor.
///
/// Includes the common predictor options plus the density-specific
/// rescaling divisor and map downsample factor.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DensityPredictorConfig {
    /// Common configuration options shared across predictors
    pub common: CommonBuilderConfig,
    /// Divisor applied elementwise to the raw density map
    pub divide: Option<f32>,
    /// Factor by which the model output is smaller than the input image
    pub downsample: Option<u32>,
}

impl DensityPredictorConfig {
    /// Creates a new density predictor configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new density predictor configuration with custom common settings.
    ///
    /// # Arguments
    ///
    /// * `common` - Common configuration options
    pub fn with_common(common: CommonBuilderConfig) -> Self {
        Self {
            common,
            divide: None,
            downsample: None,
        }
    }

    /// Validates the density predictor configuration.
    pub fn validate(&self) -> Result<(), crate::core::ConfigError> {
        ConfigValidator::validate(self)
    }
}

impl ConfigValidator for DensityPredictorConfig {
    fn validate(&self) -> Result<(), crate::core::ConfigError> {
        self.common.validate()?;

        if let Some(divide) = self.divide {
            self.validate_positive_f32(divide, "divide")?;
        }

        if let Some(downsample) = self.downsample {
            self.validate_positive_usize(downsample as usize, "downsample")?;
        }

        Ok(())
    }

    fn get_defaults() -> Self {
        Self {
            common: CommonBuilderConfig::get_defaults(),
            divide: Some(DEFAULT_DIVIDE),
            downsample: Some(1),
        }
    }
}

/// Crowd density predictor.
///
/// Wraps the full inference pipeline: ImageNet normalization, the ONNX
/// forward pass, and density map rescaling. One instance can serve any
/// number of prediction calls concurrently.
#[derive(Debug)]
pub struct DensityPredictor {
    /// Name of the model being used
    pub model_name: String,
    /// Factor by which the density map is smaller than the input image
    pub downsample: u32,

    /// Image normalizer for preprocessing images before inference
    normalize: NormalizeImage,
    /// ONNX Runtime inference engine
    infer: OrtInfer,
    /// Density map rescaler
    post_op: DensityPostProcess,
}

impl DensityPredictor {
    /// Creates a new crowd density predictor.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration for the predictor
    /// * `model_path` - Path to the ONNX model file
    ///
    /// # Returns
    ///
    /// A new instance of `DensityPredictor` or an error if initialization fails
    pub fn new(config: DensityPredictorConfig, model_path: &Path) -> Result<Self, CountError> {
        let model_name = config
            .common
            .model_name
            .as_ref()
            .cloned()
            .unwrap_or_else(|| "DensityPredictor".to_string());

        Ok(Self {
            model_name,
            downsample: config.downsample.unwrap_or(1),
            normalize: NormalizeImage::imagenet()?,
            infer: OrtInfer::from_common(&config.common, model_path)?,
            post_op: DensityPostProcess::new(config.divide)?,
        })
    }

    /// Loads an image from disk and predicts its crowd density.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the input image
    ///
    /// # Returns
    ///
    /// The prediction result or an error if loading or inference fails
    pub fn predict_path(&self, path: impl AsRef<Path>) -> Result<DensityResult, CountError> {
        let path = path.as_ref();
        let img = load_image(path)?;
        let mut result = self.predict_image(img)?;
        result.input_path = Arc::from(path.to_string_lossy().as_ref());
        Ok(result)
    }

    /// Predicts the crowd density of an in-memory image.
    ///
    /// # Arguments
    ///
    /// * `img` - The input image
    ///
    /// # Returns
    ///
    /// The prediction result or an error if inference fails
    pub fn predict_image(&self, img: RgbImage) -> Result<DensityResult, CountError> {
        let input = self.normalize.normalize_to(&img)?;

        tracing::debug!(
            model = %self.model_name,
            width = img.width(),
            height = img.height(),
            "running density inference"
        );

        let DensityOutput {
            mut density,
            auxiliary,
        } = self.infer.infer_density(&input)?;

        self.post_op.apply(&mut density);
        let count = DensityPostProcess::count(&density);

        tracing::info!(model = %self.model_name, count, "predicted crowd count");

        Ok(DensityResult {
            input_path: Arc::from(""),
            input_img: Arc::new(img),
            density_map: density,
            auxiliary_map: auxiliary,
            count,
            downsample: self.downsample,
        })
    }
}

/// Builder for the crowd density predictor.
pub struct DensityPredictorBuilder {
    /// Common configuration options shared across predictors
    common: CommonBuilderConfig,

    /// Divisor applied elementwise to the raw density map
    divide: Option<f32>,
    /// Factor by which the model output is smaller than the input image
    downsample: Option<u32>,
}

impl DensityPredictorBuilder {
    /// Creates a new density predictor builder with default settings.
    pub fn new() -> Self {
        Self {
            common: CommonBuilderConfig::new(),
            divide: None,
            downsample: None,
        }
    }

    /// Sets the model path for the predictor.
    ///
    /// # Arguments
    ///
    /// * `model_path` - Path to the ONNX model file
    pub fn model_path(mut self, model_path: impl Into<std::path::PathBuf>) -> Self {
        self.common = self.common.model_path(model_path);
        self
    }

    /// Sets the model name for the predictor.
    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.common = self.common.model_name(model_name);
        self
    }

    /// Sets the session pool size for concurrent predictions.
    ///
    /// The pool size must be >= 1.
    pub fn session_pool_size(mut self, size: usize) -> Self {
        self.common = self.common.session_pool_size(size);
        self
    }

    /// Sets the ONNX Runtime session configuration.
    pub fn ort_session(mut self, config: OrtSessionConfig) -> Self {
        self.common = self.common.ort_session(config);
        self
    }

    /// Sets the divisor applied to the raw density map.
    ///
    /// Weights exported with a scaled training target need their output
    /// divided back; 1.0 leaves the map untouched.
    ///
    /// # Arguments
    ///
    /// * `divide` - Positive divisor for the density map
    pub fn divide(mut self, divide: f32) -> Self {
        self.divide = Some(divide);
        self
    }

    /// Sets the density map downsample factor.
    ///
    /// # Arguments
    ///
    /// * `downsample` - Factor by which the model output is smaller than
    ///   the input image (1 for full resolution)
    pub fn downsample(mut self, downsample: u32) -> Self {
        self.downsample = Some(downsample);
        self
    }

    /// Builds the crowd density predictor.
    ///
    /// # Arguments
    ///
    /// * `model_path` - Path to the ONNX model file
    ///
    /// # Returns
    ///
    /// A new instance of `DensityPredictor` or an error if building fails
    pub fn build(mut self, model_path: &Path) -> Result<DensityPredictor, CountError> {
        if self.common.model_path.is_none() {
            self.common = self.common.model_path(model_path.to_path_buf());
        }

        let config = DensityPredictorConfig {
            common: self.common,
            divide: self.divide,
            downsample: self.downsample,
        };

        config.validate()?;

        DensityPredictor::new(config, model_path)
    }
}

impl Default for DensityPredictorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn config_rejects_non_positive_divide() {
        let config = DensityPredictorConfig {
            divide: Some(0.0),
            ..DensityPredictorConfig::new()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_rejects_zero_downsample() {
        let config = DensityPredictorConfig {
            downsample: Some(0),
            ..DensityPredictorConfig::new()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn defaults_validate_cleanly() {
        assert!(DensityPredictorConfig::get_defaults().validate().is_ok());
    }

    #[test]
    fn result_display_reports_count_and_quadrant() {
        let map = array![[1.0f32, 0.0], [0.0, 3.0]];
        let result = DensityResult {
            input_path: Arc::from("crowd.jpg"),
            input_img: Arc::new(RgbImage::new(2, 2)),
            density_map: map.clone(),
            auxiliary_map: map,
            count: 4.0,
            downsample: 1,
        };
        let rendered = result.to_string();
        assert!(rendered.contains("count 4.00"));
        assert!(rendered.contains("2x2"));
    }
}
