//! Configuration utilities for the crowd counting pipeline.
//!
//! This module provides structures and functions for handling configuration,
//! including error types, a validation trait, common builder configuration,
//! and ONNX Runtime session settings.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::constants::MAX_SESSION_POOL_SIZE;

/// Errors that can occur during configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error indicating that a model path does not exist.
    #[error("model path does not exist: {path}")]
    ModelPathNotFound { path: std::path::PathBuf },

    /// Error indicating that a (dataset, architecture) combination has no known weights.
    #[error("no pretrained weights for {arch} on dataset '{dataset}'")]
    UnknownModel { arch: String, dataset: String },

    /// Error indicating that a configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Error indicating that a resource limit has been exceeded.
    #[error("resource limit exceeded: {message}")]
    ResourceLimitExceeded { message: String },
}

/// A trait for validating configuration parameters.
///
/// This trait provides methods for validating configuration parameters used
/// in the pipeline, such as model paths, scalar ranges, and pool sizes.
pub trait ConfigValidator {
    /// Validates the configuration.
    ///
    /// # Returns
    ///
    /// A Result indicating success or a ConfigError if validation fails.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Returns the default configuration.
    fn get_defaults() -> Self
    where
        Self: Sized;

    /// Validates a model path.
    ///
    /// This method checks that the model path exists and is a file.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the model file.
    fn validate_model_path(&self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ModelPathNotFound {
                path: path.to_path_buf(),
            });
        }

        if !path.is_file() {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "Model path must be a file, not a directory: {}",
                    path.display()
                ),
            });
        }

        Ok(())
    }

    /// Validates that a usize value is positive.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to validate.
    /// * `field_name` - The name of the field being validated.
    fn validate_positive_usize(&self, value: usize, field_name: &str) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidConfig {
                message: format!("{} must be greater than 0", field_name),
            });
        }
        Ok(())
    }

    /// Validates that an f32 value is positive and finite.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to validate.
    /// * `field_name` - The name of the field being validated.
    fn validate_positive_f32(&self, value: f32, field_name: &str) -> Result<(), ConfigError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::InvalidConfig {
                message: format!("{} must be a positive finite number, got {}", field_name, value),
            });
        }
        Ok(())
    }

    /// Validates a session pool size against the crate-wide limit.
    ///
    /// # Arguments
    ///
    /// * `pool_size` - The pool size to validate.
    fn validate_session_pool_size(&self, pool_size: usize) -> Result<(), ConfigError> {
        self.validate_positive_usize(pool_size, "session pool size")?;
        if pool_size > MAX_SESSION_POOL_SIZE {
            return Err(ConfigError::ResourceLimitExceeded {
                message: format!(
                    "Session pool size {} exceeds maximum allowed size {}",
                    pool_size, MAX_SESSION_POOL_SIZE
                ),
            });
        }
        Ok(())
    }
}

/// Graph optimization levels for ONNX Runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OrtGraphOptimizationLevel {
    /// Disable all optimizations.
    DisableAll,
    /// Enable basic optimizations.
    Level1,
    /// Enable extended optimizations.
    Level2,
    /// Enable all optimizations.
    Level3,
}

impl Default for OrtGraphOptimizationLevel {
    fn default() -> Self {
        Self::Level1
    }
}

/// Execution providers for ONNX Runtime.
///
/// Providers are tried in order of preference; the CPU provider is always
/// available and acts as the fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrtExecutionProvider {
    /// CPU execution provider (always available)
    CPU,
    /// NVIDIA CUDA execution provider
    CUDA {
        /// CUDA device ID (default: 0)
        device_id: Option<i32>,
    },
    /// CoreML execution provider (macOS/iOS only)
    CoreML {
        /// Enable subgraphs
        subgraphs: Option<bool>,
    },
}

impl Default for OrtExecutionProvider {
    fn default() -> Self {
        Self::CPU
    }
}

/// Configuration for ONNX Runtime sessions.
///
/// This struct contains configuration options for ONNX Runtime sessions,
/// including threading and optimization settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrtSessionConfig {
    /// Number of threads used to parallelize execution within nodes
    pub intra_threads: Option<usize>,
    /// Number of threads used to parallelize execution across nodes
    pub inter_threads: Option<usize>,
    /// Enable parallel execution mode
    pub parallel_execution: Option<bool>,
    /// Graph optimization level
    pub optimization_level: Option<OrtGraphOptimizationLevel>,
    /// Execution providers in order of preference
    pub execution_providers: Option<Vec<OrtExecutionProvider>>,
}

impl OrtSessionConfig {
    /// Creates a new OrtSessionConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of intra-op threads.
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    /// Sets the number of inter-op threads.
    pub fn with_inter_threads(mut self, threads: usize) -> Self {
        self.inter_threads = Some(threads);
        self
    }

    /// Enables or disables parallel execution.
    pub fn with_parallel_execution(mut self, enabled: bool) -> Self {
        self.parallel_execution = Some(enabled);
        self
    }

    /// Sets the graph optimization level.
    pub fn with_optimization_level(mut self, level: OrtGraphOptimizationLevel) -> Self {
        self.optimization_level = Some(level);
        self
    }

    /// Sets the execution providers.
    ///
    /// # Arguments
    ///
    /// * `providers` - Vector of execution providers in order of preference.
    pub fn with_execution_providers(mut self, providers: Vec<OrtExecutionProvider>) -> Self {
        self.execution_providers = Some(providers);
        self
    }
}

/// Configuration for building common components of the pipeline.
///
/// This struct provides configuration options shared by every predictor,
/// such as the model path, model name, and ONNX session settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonBuilderConfig {
    /// The path to the model file (optional).
    pub model_path: Option<std::path::PathBuf>,
    /// The name of the model (optional).
    pub model_name: Option<String>,
    /// Number of pooled ONNX sessions for concurrent predictions (optional).
    pub session_pool_size: Option<usize>,
    /// ONNX Runtime session settings (optional).
    pub ort_session: Option<OrtSessionConfig>,
}

impl CommonBuilderConfig {
    /// Creates a new CommonBuilderConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new CommonBuilderConfig with a model path.
    ///
    /// # Arguments
    ///
    /// * `model_path` - The path to the model file.
    pub fn with_model_path(model_path: std::path::PathBuf) -> Self {
        Self {
            model_path: Some(model_path),
            model_name: None,
            session_pool_size: None,
            ort_session: None,
        }
    }

    /// Sets the model path for the configuration.
    pub fn model_path(mut self, model_path: impl Into<std::path::PathBuf>) -> Self {
        self.model_path = Some(model_path.into());
        self
    }

    /// Sets the model name for the configuration.
    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    /// Sets the session pool size for the configuration.
    pub fn session_pool_size(mut self, pool_size: usize) -> Self {
        self.session_pool_size = Some(pool_size);
        self
    }

    /// Sets the ONNX Runtime session settings for the configuration.
    pub fn ort_session(mut self, ort_session: OrtSessionConfig) -> Self {
        self.ort_session = Some(ort_session);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigValidator::validate(self)
    }

    /// Merges this configuration with another configuration.
    ///
    /// Values from the other configuration override values in this one when
    /// present.
    ///
    /// # Arguments
    ///
    /// * `other` - The other configuration to merge with.
    pub fn merge_with(mut self, other: &CommonBuilderConfig) -> Self {
        if other.model_path.is_some() {
            self.model_path = other.model_path.clone();
        }
        if other.model_name.is_some() {
            self.model_name = other.model_name.clone();
        }
        if other.session_pool_size.is_some() {
            self.session_pool_size = other.session_pool_size;
        }
        if other.ort_session.is_some() {
            self.ort_session = other.ort_session.clone();
        }
        self
    }
}

impl ConfigValidator for CommonBuilderConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(pool_size) = self.session_pool_size {
            self.validate_session_pool_size(pool_size)?;
        }

        if let Some(model_path) = &self.model_path {
            self.validate_model_path(model_path)?;
        }

        Ok(())
    }

    fn get_defaults() -> Self {
        Self {
            model_path: None,
            model_name: None,
            session_pool_size: Some(1),
            ort_session: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;
    impl ConfigValidator for Probe {
        fn validate(&self) -> Result<(), ConfigError> {
            Ok(())
        }
        fn get_defaults() -> Self {
            Probe
        }
    }

    #[test]
    fn positive_f32_rejects_zero_and_nan() {
        let probe = Probe;
        assert!(probe.validate_positive_f32(1.0, "divide").is_ok());
        assert!(probe.validate_positive_f32(0.0, "divide").is_err());
        assert!(probe.validate_positive_f32(-3.0, "divide").is_err());
        assert!(probe.validate_positive_f32(f32::NAN, "divide").is_err());
    }

    #[test]
    fn session_pool_size_limit_enforced() {
        let probe = Probe;
        assert!(probe.validate_session_pool_size(1).is_ok());
        assert!(probe.validate_session_pool_size(0).is_err());
        assert!(
            probe
                .validate_session_pool_size(MAX_SESSION_POOL_SIZE + 1)
                .is_err()
        );
    }

    #[test]
    fn common_config_rejects_missing_model_path() {
        let config = CommonBuilderConfig::new().model_path("definitely/not/here.onnx");
        assert!(config.validate().is_err());
    }

    #[test]
    fn merge_prefers_other_values() {
        let base = CommonBuilderConfig::new()
            .model_name("base")
            .session_pool_size(1);
        let other = CommonBuilderConfig::new().model_name("other");
        let merged = base.merge_with(&other);
        assert_eq!(merged.model_name.as_deref(), Some("other"));
        assert_eq!(merged.session_pool_size, Some(1));
    }
}
