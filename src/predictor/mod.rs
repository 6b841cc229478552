//! Density map predictors.
//!
//! A predictor owns a weight-loaded ONNX session pool together with the
//! preprocessing and postprocessing steps that surround it, and turns an
//! input image into a crowd density map and head count.

mod density;

pub use density::{
    DensityPredictor, DensityPredictorBuilder, DensityPredictorConfig, DensityResult,
};
