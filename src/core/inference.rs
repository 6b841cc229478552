//! Inference utilities for the crowd counting pipeline.
//!
//! This module provides structures and functions for performing inference
//! using ONNX Runtime models. It includes utilities for loading models,
//! running the forward pass, and extracting the density and auxiliary maps
//! from the output tensors.

use crate::core::{
    config::{CommonBuilderConfig, OrtSessionConfig},
    errors::{CountError, SimpleError},
    tensor::{Tensor2D, Tensor4D},
};
use ort::{
    execution_providers::ExecutionProviderDispatch,
    session::{Session, builder::SessionBuilder},
    value::TensorRef,
};
use std::path::Path;
use std::sync::Mutex;

/// Output of a density-estimation forward pass.
///
/// Crowd counting networks in the MARNet family return a tuple of maps;
/// the first element is the density map and the last is an auxiliary
/// attention map. For single-output models (CSRNet) the two coincide.
#[derive(Debug, Clone)]
pub struct DensityOutput {
    /// Predicted density map (H', W'). Spatial sum approximates the count.
    pub density: Tensor2D,
    /// Auxiliary attention map (H', W').
    pub auxiliary: Tensor2D,
}

/// A struct for performing inference using ONNX Runtime models.
///
/// This struct wraps a pool of ONNX Runtime sessions so that concurrent
/// callers do not serialize on a single session, and handles input-name
/// detection and output extraction.
#[derive(Debug)]
pub struct OrtInfer {
    /// Pool of ONNX Runtime sessions for concurrent predictions.
    sessions: Vec<Mutex<Session>>,
    /// Next index for round-robin session selection.
    next_idx: std::sync::atomic::AtomicUsize,
    /// The name of the input tensor.
    input_name: String,
    /// Names of the output tensors, in declaration order.
    output_names: Vec<String>,
    /// The path to the model file for error context.
    model_path: std::path::PathBuf,
    /// The model name for error context.
    model_name: String,
}

impl OrtInfer {
    /// Creates a new OrtInfer instance with default ONNX Runtime settings and a single session.
    ///
    /// # Arguments
    ///
    /// * `model_path` - The path to the ONNX model file.
    ///
    /// # Returns
    ///
    /// A Result containing the new OrtInfer instance or a CountError.
    pub fn new(model_path: impl AsRef<Path>) -> Result<Self, CountError> {
        Self::from_common(&CommonBuilderConfig::new(), model_path)
    }

    /// Creates a new OrtInfer instance from CommonBuilderConfig, applying ORT session
    /// configuration and constructing a session pool for concurrent predictions.
    ///
    /// The input tensor name is auto-detected by looking for common names in
    /// the model inputs; output names are read from the session metadata.
    ///
    /// # Arguments
    ///
    /// * `common` - The common builder configuration.
    /// * `model_path` - The path to the ONNX model file.
    ///
    /// # Returns
    ///
    /// A Result containing the new OrtInfer instance or a CountError.
    pub fn from_common(
        common: &CommonBuilderConfig,
        model_path: impl AsRef<Path>,
    ) -> Result<Self, CountError> {
        let path = model_path.as_ref();
        let pool_size = common.session_pool_size.unwrap_or(1).max(1);

        let model_name = common
            .model_name
            .clone()
            .or_else(|| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| "unknown_model".to_string());

        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let builder = Session::builder()?;
            let builder = if let Some(cfg) = &common.ort_session {
                Self::apply_ort_config(builder, cfg)?
            } else {
                builder
            };
            let session = builder.commit_from_file(path).map_err(|e| {
                CountError::inference(
                    &model_name,
                    &format!(
                        "failed to create ONNX session from '{}'; verify the model path \
                         and the configured execution providers",
                        path.display()
                    ),
                    Some(e),
                )
            })?;
            sessions.push(Mutex::new(session));
        }

        let (input_name, output_names) = {
            let first = sessions[0].lock().map_err(|_| {
                CountError::invalid_input("Failed to acquire session lock during setup")
            })?;

            let common_names = ["x", "input", "images", "data", "image"];
            let available_inputs: Vec<String> =
                first.inputs.iter().map(|input| input.name.clone()).collect();
            let input_name = common_names
                .iter()
                .find(|&name| available_inputs.iter().any(|input| input == *name))
                .map(|s| s.to_string())
                .or_else(|| available_inputs.first().cloned())
                .unwrap_or_else(|| "x".to_string());

            let output_names: Vec<String> =
                first.outputs.iter().map(|output| output.name.clone()).collect();
            (input_name, output_names)
        };

        if output_names.is_empty() {
            return Err(CountError::inference(
                &model_name,
                "model declares no outputs; expected a density map",
                None::<SimpleError>,
            ));
        }

        Ok(OrtInfer {
            sessions,
            next_idx: std::sync::atomic::AtomicUsize::new(0),
            input_name,
            output_names,
            model_path: path.to_path_buf(),
            model_name,
        })
    }

    fn apply_ort_config(
        mut builder: SessionBuilder,
        cfg: &OrtSessionConfig,
    ) -> Result<SessionBuilder, ort::Error> {
        if let Some(intra) = cfg.intra_threads {
            builder = builder.with_intra_threads(intra)?;
        }
        if let Some(inter) = cfg.inter_threads {
            builder = builder.with_inter_threads(inter)?;
        }
        if let Some(par) = cfg.parallel_execution {
            builder = builder.with_parallel_execution(par)?;
        }
        if let Some(level) = cfg.optimization_level {
            use crate::core::config::OrtGraphOptimizationLevel as OG;
            use ort::session::builder::GraphOptimizationLevel as GOL;
            let mapped = match level {
                OG::DisableAll => GOL::Disable,
                OG::Level1 => GOL::Level1,
                OG::Level2 => GOL::Level2,
                OG::Level3 => GOL::Level3,
            };
            builder = builder.with_optimization_level(mapped)?;
        }
        if let Some(eps) = &cfg.execution_providers {
            let providers = Self::build_execution_providers(eps)?;
            if !providers.is_empty() {
                builder = builder.with_execution_providers(providers)?;
            }
        }
        Ok(builder)
    }

    /// Builds execution providers from configuration.
    fn build_execution_providers(
        eps: &[crate::core::config::OrtExecutionProvider],
    ) -> Result<Vec<ExecutionProviderDispatch>, ort::Error> {
        use crate::core::config::OrtExecutionProvider as EP;
        let mut providers = Vec::new();

        for ep in eps {
            match ep {
                EP::CPU => {
                    // CPU provider is always available
                    providers
                        .push(ort::execution_providers::CPUExecutionProvider::default().build());
                }
                #[cfg(feature = "cuda")]
                EP::CUDA { device_id } => {
                    let mut cuda_provider =
                        ort::execution_providers::CUDAExecutionProvider::default();
                    if let Some(id) = device_id {
                        cuda_provider = cuda_provider.with_device_id(*id);
                    }
                    providers.push(cuda_provider.build());
                }
                #[cfg(feature = "coreml")]
                EP::CoreML { subgraphs } => {
                    let mut coreml_provider =
                        ort::execution_providers::CoreMLExecutionProvider::default();
                    if let Some(sub) = subgraphs {
                        coreml_provider = coreml_provider.with_subgraphs(*sub);
                    }
                    providers.push(coreml_provider.build());
                }
                #[cfg(not(feature = "cuda"))]
                EP::CUDA { .. } => {
                    return Err(ort::Error::new(
                        "CUDA execution provider requested but cuda feature is not enabled",
                    ));
                }
                #[cfg(not(feature = "coreml"))]
                EP::CoreML { .. } => {
                    return Err(ort::Error::new(
                        "CoreML execution provider requested but coreml feature is not enabled",
                    ));
                }
            }
        }

        Ok(providers)
    }

    /// Gets the path to the model file.
    pub fn model_path(&self) -> &std::path::Path {
        &self.model_path
    }

    /// Gets the name of the model.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Runs the forward pass and extracts the density and auxiliary maps.
    ///
    /// The density map is read from the first session output and the
    /// auxiliary map from the last; both are squeezed to (H', W').
    ///
    /// # Arguments
    ///
    /// * `x` - The input tensor of shape (1, 3, H, W).
    ///
    /// # Returns
    ///
    /// A Result containing the DensityOutput or a CountError.
    pub fn infer_density(&self, x: &Tensor4D) -> Result<DensityOutput, CountError> {
        let input_shape = x.shape().to_vec();

        let input_tensor = TensorRef::from_array_view(x.view()).map_err(|e| {
            CountError::inference(
                &self.model_name,
                &format!(
                    "Failed to convert input tensor with shape {:?}",
                    input_shape
                ),
                Some(e),
            )
        })?;

        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        // Round-robin select a session
        let idx = self
            .next_idx
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            % self.sessions.len();
        let mut session_guard = self.sessions[idx].lock().map_err(|_| {
            CountError::inference(
                &self.model_name,
                &format!(
                    "Failed to acquire session lock for session {}/{}",
                    idx,
                    self.sessions.len()
                ),
                Some(SimpleError::new("Session lock acquisition failed")),
            )
        })?;

        let outputs = session_guard.run(inputs).map_err(|e| {
            CountError::inference(
                &self.model_name,
                &format!(
                    "ONNX Runtime inference failed with input '{}' of shape {:?}",
                    self.input_name, input_shape
                ),
                Some(e),
            )
        })?;

        // First output is the density map, last is the auxiliary map;
        // single-output models yield the same map for both.
        let density_name = self.output_names[0].as_str();
        let auxiliary_name = self
            .output_names
            .last()
            .map(|s| s.as_str())
            .unwrap_or(density_name);

        let (shape, data) = outputs[density_name]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                CountError::inference(
                    &self.model_name,
                    &format!("Failed to extract output tensor '{}' as f32", density_name),
                    Some(e),
                )
            })?;
        let density = squeeze_map(density_name, shape, data)?;

        let auxiliary = if auxiliary_name == density_name {
            density.clone()
        } else {
            let (shape, data) = outputs[auxiliary_name]
                .try_extract_tensor::<f32>()
                .map_err(|e| {
                    CountError::inference(
                        &self.model_name,
                        &format!("Failed to extract output tensor '{}' as f32", auxiliary_name),
                        Some(e),
                    )
                })?;
            squeeze_map(auxiliary_name, shape, data)?
        };

        Ok(DensityOutput { density, auxiliary })
    }
}

/// Squeezes a raw output tensor to a 2-D map.
///
/// Accepts (H, W), (1, H, W), and (1, 1, H, W) output shapes; any leading
/// dimension greater than 1 is an error.
fn squeeze_map(name: &str, shape: &[i64], data: &[f32]) -> Result<Tensor2D, CountError> {
    if shape.len() < 2 {
        return Err(CountError::invalid_input(format!(
            "Output '{}' has shape {:?}; expected at least 2 dimensions",
            name, shape
        )));
    }

    let height = shape[shape.len() - 2] as usize;
    let width = shape[shape.len() - 1] as usize;
    let leading: i64 = shape[..shape.len() - 2].iter().product();
    if leading != 1 {
        return Err(CountError::invalid_input(format!(
            "Output '{}' has shape {:?}; expected batch and channel dimensions of 1",
            name, shape
        )));
    }

    if data.len() != height * width {
        return Err(CountError::invalid_input(format!(
            "Output '{}' data size mismatch: expected {}, got {}",
            name,
            height * width,
            data.len()
        )));
    }

    ndarray::Array2::from_shape_vec((height, width), data.to_vec()).map_err(CountError::Tensor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squeeze_map_accepts_singleton_leading_dims() {
        let data: Vec<f32> = (0..6).map(|v| v as f32).collect();
        for shape in [vec![2, 3], vec![1, 2, 3], vec![1, 1, 2, 3]] {
            let map = squeeze_map("dmp", &shape, &data).unwrap();
            assert_eq!(map.dim(), (2, 3));
            assert_eq!(map[[1, 2]], 5.0);
        }
    }

    #[test]
    fn squeeze_map_rejects_real_batch_dim() {
        let data = vec![0.0f32; 12];
        assert!(squeeze_map("dmp", &[2, 2, 3], &data).is_err());
    }

    #[test]
    fn squeeze_map_rejects_size_mismatch() {
        let data = vec![0.0f32; 5];
        assert!(squeeze_map("dmp", &[1, 2, 3], &data).is_err());
    }
}
