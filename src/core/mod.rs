//! The core module of the crowd counting pipeline.
//!
//! This module contains the fundamental components of the pipeline, including:
//! - Configuration management and validation
//! - Constants used throughout the pipeline
//! - Error handling
//! - Inference engine integration (ONNX Runtime)
//! - Tensor type aliases
//!
//! It also provides re-exports of commonly used types and functions for convenience.

pub mod config;
pub mod constants;
pub mod errors;
pub mod inference;
pub mod tensor;

pub use config::{
    CommonBuilderConfig, ConfigError, ConfigValidator, OrtExecutionProvider,
    OrtGraphOptimizationLevel, OrtSessionConfig,
};
pub use constants::*;
pub use errors::{CountError, ProcessingStage};
pub use inference::{DensityOutput, OrtInfer};
pub use tensor::{Tensor2D, Tensor4D};

/// A convenient result type used throughout the crate.
pub type CountResult<T> = Result<T, CountError>;

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
