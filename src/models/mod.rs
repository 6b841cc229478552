//! Model registry: datasets, architectures, and weight resolution.
//!
//! Pretrained crowd counting weights are published per (architecture,
//! dataset) pair. This module maps those pairs to weight files under a
//! models directory and builds ready-to-use predictors from them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::{ConfigError, CountError};
use crate::predictor::{DensityPredictor, DensityPredictorConfig};

/// Benchmark dataset a model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dataset {
    /// ShanghaiTech part A (dense crowds)
    ShanghaiTechA,
    /// ShanghaiTech part B (sparse street scenes)
    ShanghaiTechB,
    /// UCF-QNRF (high-resolution, extreme density range)
    UcfQnrf,
}

impl Dataset {
    /// Returns the short key used in weight file names and CLI flags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::ShanghaiTechA => "sha",
            Dataset::ShanghaiTechB => "shb",
            Dataset::UcfQnrf => "qnrf",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = ConfigError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "sha" => Ok(Dataset::ShanghaiTechA),
            "shb" => Ok(Dataset::ShanghaiTechB),
            "qnrf" => Ok(Dataset::UcfQnrf),
            _ => Err(ConfigError::InvalidConfig {
                message: format!("unknown dataset key '{key}' (expected sha, shb, or qnrf)"),
            }),
        }
    }
}

/// Crowd counting network architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelArch {
    /// Multi-scale attention refinement network; outputs density and attention maps.
    MARNet,
    /// U-shaped VGG density estimator (published under U_VGG weights).
    MSUNet,
    /// Dilated-convolution density estimator; output is 1/8 input resolution.
    CSRNet,
}

impl ModelArch {
    /// Returns the canonical architecture name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelArch::MARNet => "MARNet",
            ModelArch::MSUNet => "MSUNet",
            ModelArch::CSRNet => "CSRNet",
        }
    }

    /// Returns the stem used in weight file names.
    ///
    /// MSUNet loads the published U_VGG weights; the others use their own name.
    pub fn weight_stem(&self) -> &'static str {
        match self {
            ModelArch::MSUNet => "U_VGG",
            other => other.as_str(),
        }
    }

    /// Returns the factor by which the output density map is smaller than the input.
    pub fn default_downsample(&self) -> u32 {
        match self {
            ModelArch::MARNet | ModelArch::MSUNet => 1,
            ModelArch::CSRNet => 8,
        }
    }

    /// Returns whether pretrained weights exist for this architecture on a dataset.
    ///
    /// CSRNet was never released for UCF-QNRF.
    pub fn supports(&self, dataset: Dataset) -> bool {
        !matches!((self, dataset), (ModelArch::CSRNet, Dataset::UcfQnrf))
    }
}

impl fmt::Display for ModelArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelArch {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "marnet" => Ok(ModelArch::MARNet),
            "msunet" | "u_vgg" | "uvgg" => Ok(ModelArch::MSUNet),
            "csrnet" => Ok(ModelArch::CSRNet),
            _ => Err(ConfigError::InvalidConfig {
                message: format!(
                    "unknown architecture '{name}' (expected MARNet, MSUNet, or CSRNet)"
                ),
            }),
        }
    }
}

/// Resolves (dataset, architecture) pairs to weight file paths.
///
/// The default layout is `<root>/<weight_stem>_<dataset>.onnx`, e.g.
/// `models/MARNet_sha.onnx` or `models/U_VGG_qnrf.onnx`. Individual pairs
/// can be overridden with explicit paths.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    root: PathBuf,
    overrides: HashMap<(Dataset, ModelArch), PathBuf>,
}

impl ModelRegistry {
    /// Creates a registry rooted at the given models directory.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory holding the ONNX weight files.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overrides: HashMap::new(),
        }
    }

    /// Overrides the weight path for a single (dataset, architecture) pair.
    pub fn with_weights(
        mut self,
        dataset: Dataset,
        arch: ModelArch,
        path: impl Into<PathBuf>,
    ) -> Self {
        self.overrides.insert((dataset, arch), path.into());
        self
    }

    /// Returns the models directory this registry is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the weight path for an architecture on a dataset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownModel` when no pretrained weights exist
    /// for the combination (and no override was registered).
    pub fn resolve(&self, dataset: Dataset, arch: ModelArch) -> Result<PathBuf, ConfigError> {
        if let Some(path) = self.overrides.get(&(dataset, arch)) {
            return Ok(path.clone());
        }

        if !arch.supports(dataset) {
            return Err(ConfigError::UnknownModel {
                arch: arch.to_string(),
                dataset: dataset.to_string(),
            });
        }

        Ok(self
            .root
            .join(format!("{}_{}.onnx", arch.weight_stem(), dataset)))
    }
}

/// Instantiates weight-loaded predictors for the requested architectures.
///
/// Each predictor is constructed once and can be reused for any number of
/// images. The architecture's default downsample factor is applied unless
/// the base configuration overrides it.
///
/// # Arguments
///
/// * `registry` - Weight path resolver.
/// * `archs` - Architectures to load. Must be non-empty.
/// * `dataset` - Dataset whose weights to use.
/// * `base_config` - Configuration shared by every predictor (divide,
///   session settings); model path and downsample are filled per model.
///
/// # Returns
///
/// A map from architecture to predictor, with exactly the requested keys.
pub fn load_models(
    registry: &ModelRegistry,
    archs: &[ModelArch],
    dataset: Dataset,
    base_config: DensityPredictorConfig,
) -> Result<HashMap<ModelArch, DensityPredictor>, CountError> {
    if archs.is_empty() {
        return Err(CountError::config_error(
            "at least one model architecture must be requested",
        ));
    }

    let mut predictors = HashMap::with_capacity(archs.len());
    for &arch in archs {
        if predictors.contains_key(&arch) {
            continue;
        }

        let weight_path = registry.resolve(dataset, arch)?;
        tracing::info!(
            "loading {} ({} weights) from {}",
            arch,
            dataset,
            weight_path.display()
        );

        let mut config = base_config.clone();
        config.common = config.common.model_name(arch.as_str());
        if config.downsample.is_none() {
            config.downsample = Some(arch.default_downsample());
        }

        let predictor = DensityPredictor::new(config, &weight_path)?;
        predictors.insert(arch, predictor);
    }

    Ok(predictors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_resolves_under_root() {
        let registry = ModelRegistry::new("/opt/weights");
        let path = registry
            .resolve(Dataset::ShanghaiTechA, ModelArch::MARNet)
            .unwrap();
        assert_eq!(path, PathBuf::from("/opt/weights/MARNet_sha.onnx"));
    }

    #[test]
    fn msunet_resolves_to_u_vgg_weights() {
        let registry = ModelRegistry::new("models");
        let path = registry
            .resolve(Dataset::UcfQnrf, ModelArch::MSUNet)
            .unwrap();
        assert_eq!(path, PathBuf::from("models/U_VGG_qnrf.onnx"));
    }

    #[test]
    fn csrnet_on_qnrf_is_unknown() {
        let registry = ModelRegistry::new("models");
        let err = registry
            .resolve(Dataset::UcfQnrf, ModelArch::CSRNet)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModel { .. }));
    }

    #[test]
    fn override_beats_default_layout_and_support_table() {
        let registry = ModelRegistry::new("models").with_weights(
            Dataset::UcfQnrf,
            ModelArch::CSRNet,
            "custom/csrnet_qnrf.onnx",
        );
        let path = registry
            .resolve(Dataset::UcfQnrf, ModelArch::CSRNet)
            .unwrap();
        assert_eq!(path, PathBuf::from("custom/csrnet_qnrf.onnx"));
    }

    #[test]
    fn arch_parsing_accepts_aliases() {
        assert_eq!(ModelArch::from_str("MARNet").unwrap(), ModelArch::MARNet);
        assert_eq!(ModelArch::from_str("u_vgg").unwrap(), ModelArch::MSUNet);
        assert_eq!(ModelArch::from_str("csrnet").unwrap(), ModelArch::CSRNet);
        assert!(ModelArch::from_str("resnet").is_err());
    }

    #[test]
    fn dataset_keys_round_trip() {
        for dataset in [
            Dataset::ShanghaiTechA,
            Dataset::ShanghaiTechB,
            Dataset::UcfQnrf,
        ] {
            assert_eq!(Dataset::from_str(dataset.as_str()).unwrap(), dataset);
        }
        assert!(Dataset::from_str("ucf50").is_err());
    }

    #[test]
    fn csrnet_output_is_eighth_resolution() {
        assert_eq!(ModelArch::CSRNet.default_downsample(), 8);
        assert_eq!(ModelArch::MARNet.default_downsample(), 1);
    }

    #[test]
    fn load_models_rejects_empty_request() {
        let registry = ModelRegistry::new("models");
        let result = load_models(
            &registry,
            &[],
            Dataset::ShanghaiTechA,
            DensityPredictorConfig::new(),
        );
        assert!(result.is_err());
    }
}
