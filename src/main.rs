//! Crowd counting command-line tool.
//!
//! Loads one or more pretrained density estimation models, predicts the
//! crowd count for each input image, and writes a jet heatmap next to the
//! input (or into an output directory).
//!
//! Usage:
//! ```
//! crowd-count --models-dir models --dataset sha --arch marnet crowd.jpg
//! ```

use clap::Parser;
use crowd_count::core::init_tracing;
use crowd_count::models::{Dataset, ModelArch, ModelRegistry, load_models};
use crowd_count::predictor::DensityPredictorConfig;
use crowd_count::utils::{HeatmapConfig, default_output_path, visualize_density};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{error, info};

/// Command-line arguments for the crowd counting tool
#[derive(Parser)]
#[command(name = "crowd-count")]
#[command(about = "Estimates crowd counts from images and renders density heatmaps")]
struct Args {
    /// Image file paths to process
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Directory holding the ONNX weight files
    #[arg(short = 'm', long, default_value = "models")]
    models_dir: PathBuf,

    /// Dataset whose weights to use (sha, shb, or qnrf)
    #[arg(short, long, default_value = "sha")]
    dataset: String,

    /// Model architectures to run (marnet, msunet, csrnet); may be repeated
    #[arg(short, long = "arch", default_value = "marnet")]
    archs: Vec<String>,

    /// Explicit path to a single ONNX model file, overriding the
    /// models directory layout (requires exactly one --arch)
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Divisor applied to the raw density map
    #[arg(long)]
    divide: Option<f32>,

    /// Factor by which the density map is smaller than the input image
    /// (defaults to the architecture's native factor)
    #[arg(long)]
    downsample: Option<u32>,

    /// Directory for heatmap output files (defaults to each image's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Path to a JSON predictor configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a font file for the count label
    #[arg(long)]
    font: Option<PathBuf>,

    /// Blend the heatmap over the input image instead of saving it alone
    #[arg(long)]
    overlay: bool,

    /// Skip drawing the predicted count on the heatmap
    #[arg(long)]
    no_label: bool,
}

/// Loads the base predictor configuration, from a JSON file when given.
fn load_base_config(args: &Args) -> Result<DensityPredictorConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            let config: DensityPredictorConfig = serde_json::from_str(&raw)?;
            info!("Loaded predictor configuration from {}", path.display());
            config
        }
        None => DensityPredictorConfig::new(),
    };

    if args.divide.is_some() {
        config.divide = args.divide;
    }
    if args.downsample.is_some() {
        config.downsample = args.downsample;
    }

    config.validate()?;
    Ok(config)
}

/// Builds the heatmap rendering configuration from the CLI flags.
fn build_heatmap_config(args: &Args) -> HeatmapConfig {
    let mut config = match &args.font {
        Some(path) => HeatmapConfig::with_font_path(path).unwrap_or_else(|e| {
            error!("Failed to load font {}: {}", path.display(), e);
            HeatmapConfig::with_system_font()
        }),
        None => HeatmapConfig::with_system_font(),
    };
    config.overlay = args.overlay;
    config.label = !args.no_label;
    config
}

/// Parses the architecture flags, collapsing repeats while keeping order.
fn parse_archs(names: &[String]) -> Result<Vec<ModelArch>, crowd_count::core::ConfigError> {
    let mut archs = Vec::with_capacity(names.len());
    for name in names {
        let arch = ModelArch::from_str(name)?;
        if !archs.contains(&arch) {
            archs.push(arch);
        }
    }
    Ok(archs)
}

/// Splits the input paths into readable ones and a count of missing ones.
///
/// Missing paths are logged and counted as failures so a typo'd path
/// cannot produce a clean exit, while the remaining images still run.
fn partition_existing(paths: &[PathBuf]) -> (Vec<&PathBuf>, usize) {
    let mut existing = Vec::with_capacity(paths.len());
    let mut missing = 0;
    for path in paths {
        if Path::new(path).exists() {
            existing.push(path);
        } else {
            error!("Image file not found: {}", path.display());
            missing += 1;
        }
    }
    (existing, missing)
}

fn run(args: &Args, images: &[&PathBuf]) -> Result<usize, Box<dyn std::error::Error>> {
    let dataset = Dataset::from_str(&args.dataset)?;
    let archs = parse_archs(&args.archs)?;

    let mut registry = ModelRegistry::new(&args.models_dir);
    if let Some(model_path) = &args.model_path {
        if archs.len() != 1 {
            return Err("--model-path requires exactly one --arch".into());
        }
        registry = registry.with_weights(dataset, archs[0], model_path);
    }

    let base_config = load_base_config(args)?;
    let predictors = load_models(&registry, &archs, dataset, base_config)?;
    let heatmap_config = build_heatmap_config(args);

    if let Some(dir) = &args.output_dir
        && !dir.exists()
    {
        std::fs::create_dir_all(dir)?;
    }

    let mut failures = 0;
    for (i, image_path) in images.iter().enumerate() {
        info!(
            "Processing image {} of {}: {}",
            i + 1,
            images.len(),
            image_path.display()
        );

        for &arch in &archs {
            let Some(predictor) = predictors.get(&arch) else {
                continue;
            };

            match predictor.predict_path(image_path) {
                Ok(result) => {
                    info!("{}: {}", arch, result);

                    let output_path = default_output_path(
                        image_path,
                        arch.as_str(),
                        args.output_dir.as_deref(),
                    );
                    if let Err(e) = visualize_density(&result, &heatmap_config, &output_path) {
                        error!(
                            "Failed to render heatmap for {}: {}",
                            image_path.display(),
                            e
                        );
                        failures += 1;
                    }
                }
                Err(e) => {
                    error!(
                        "{} prediction failed for {}: {}",
                        arch,
                        image_path.display(),
                        e
                    );
                    failures += 1;
                }
            }
        }
    }

    Ok(failures)
}

fn main() -> ExitCode {
    init_tracing();

    let args = Args::parse();

    // Drop unreadable inputs early so one bad path does not abort the run
    let (existing, missing) = partition_existing(&args.images);

    if existing.is_empty() {
        error!("No valid image files found");
        return ExitCode::FAILURE;
    }

    match run(&args, &existing) {
        Ok(failures) if failures + missing == 0 => ExitCode::SUCCESS,
        Ok(failures) => {
            error!("{} input(s) failed", failures + missing);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_inputs_are_dropped_and_counted() {
        let paths = vec![
            PathBuf::from("Cargo.toml"),
            PathBuf::from("no/such/image.jpg"),
        ];
        let (existing, missing) = partition_existing(&paths);
        assert_eq!(existing, vec![&paths[0]]);
        assert_eq!(missing, 1);
    }

    #[test]
    fn all_missing_inputs_leave_nothing_to_run() {
        let paths = vec![PathBuf::from("also/missing.png")];
        let (existing, missing) = partition_existing(&paths);
        assert!(existing.is_empty());
        assert_eq!(missing, 1);
    }

    #[test]
    fn repeated_arch_flags_collapse_to_one() {
        let names = vec![
            "marnet".to_string(),
            "MARNet".to_string(),
            "csrnet".to_string(),
        ];
        let archs = parse_archs(&names).unwrap();
        assert_eq!(archs, vec![ModelArch::MARNet, ModelArch::CSRNet]);
    }

    #[test]
    fn unknown_arch_flag_is_an_error() {
        assert!(parse_archs(&["resnet".to_string()]).is_err());
    }
}
