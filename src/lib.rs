//! # crowd-count
//!
//! A Rust library for crowd counting inference using ONNX models.
//! Given an image and a pretrained density-estimation network (MARNet,
//! MSUNet, CSRNet), it predicts a per-pixel density map whose spatial
//! sum approximates the number of people in the image, and renders the
//! map as a false-color heatmap.
//!
//! ## Pipeline
//!
//! 1. Load an image and normalize it with ImageNet statistics into a
//!    `(1, 3, H, W)` float tensor
//! 2. Run the ONNX model through ONNX Runtime
//! 3. Extract the density map and auxiliary attention map, divide by a
//!    normalization scalar, and sum to a count
//! 4. Colorize the density map with a jet colormap and write the
//!    heatmap (optionally superimposed on the input) to disk
//!
//! ## Modules
//!
//! * [`core`] - Error handling, configuration, and ONNX Runtime integration
//! * [`models`] - Dataset/architecture registry and weight resolution
//! * [`predictor`] - The density prediction pipeline
//! * [`processors`] - Image normalization and density-map post-processing
//! * [`utils`] - Image loading, colormaps, and heatmap rendering
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crowd_count::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ModelRegistry::new("models");
//! let predictors = load_models(
//!     &registry,
//!     &[ModelArch::CSRNet],
//!     Dataset::ShanghaiTechA,
//!     DensityPredictorConfig::new(),
//! )?;
//!
//! let result = predictors[&ModelArch::CSRNet].predict_path(Path::new("crowd.jpg"))?;
//! println!("{result}");
//!
//! let config = HeatmapConfig::with_system_font();
//! visualize_density(&result, &config, Path::new("crowd_csrnet_den.png"))?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod models;
pub mod predictor;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use crowd_count::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{CountError, CountResult};
    pub use crate::models::{Dataset, ModelArch, ModelRegistry, load_models};
    pub use crate::predictor::{
        DensityPredictor, DensityPredictorBuilder, DensityPredictorConfig, DensityResult,
    };
    pub use crate::utils::{HeatmapConfig, load_image, visualize_density};
}
