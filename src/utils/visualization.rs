//! Visualization utilities for density predictions.
//!
//! This module renders density maps as jet-colormapped heatmaps, optionally
//! superimposed on the input image and annotated with the predicted count.
//! The heatmap is colorized at the model's output resolution and then
//! upscaled by the downsample factor so it matches the input image size.

use crate::core::errors::{CountError, SimpleError};
use crate::core::tensor::Tensor2D;
use crate::predictor::DensityResult;
use crate::utils::colormap::jet_color;

use ab_glyph::FontVec;
use image::{Rgb, RgbImage, imageops};
use imageproc::drawing::draw_text_mut;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const LABEL_SHADOW: Rgb<u8> = Rgb([0, 0, 0]);

/// Fraction of the input image kept when superimposing the heatmap.
const OVERLAY_IMAGE_WEIGHT: f32 = 0.4;

/// Configuration for density heatmap rendering.
///
/// Controls whether the heatmap is blended over the input image, whether
/// the predicted count is drawn as a label, and which font is used for it.
pub struct HeatmapConfig {
    /// The font used for the count label. If None, the label is skipped.
    pub font: Option<FontVec>,

    /// The scale factor for the label font. Defaults to 24.0.
    pub font_scale: f32,

    /// Blend the heatmap over the input image instead of saving it alone.
    pub overlay: bool,

    /// Draw the predicted count in the top-left corner.
    pub label: bool,
}

impl Default for HeatmapConfig {
    /// Creates a default HeatmapConfig with no font, overlay disabled, and labeling enabled.
    fn default() -> Self {
        Self {
            font: None,
            font_scale: 24.0,
            overlay: false,
            label: true,
        }
    }
}

impl HeatmapConfig {
    /// Creates a HeatmapConfig with a font loaded from the specified path.
    ///
    /// # Arguments
    ///
    /// * `font_path` - Path to the font file to load
    ///
    /// # Returns
    ///
    /// A Result containing the HeatmapConfig if successful, or an error if
    /// the font could not be loaded.
    pub fn with_font_path(font_path: &Path) -> Result<Self, CountError> {
        let font_data = std::fs::read(font_path)?;
        let font = FontVec::try_from_vec(font_data).map_err(|_| {
            CountError::visualization(
                &format!("Failed to parse font file: {}", font_path.display()),
                SimpleError::new("invalid font data"),
            )
        })?;

        Ok(Self {
            font: Some(font),
            ..Self::default()
        })
    }

    /// Creates a HeatmapConfig with a system font.
    ///
    /// This function attempts to load a system font from common locations.
    /// If no system font is found, it falls back to the default configuration
    /// and the count label is skipped.
    pub fn with_system_font() -> Self {
        let font_paths = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/System/Library/Fonts/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ];

        for path in &font_paths {
            if let Ok(font_data) = std::fs::read(path)
                && let Ok(font) = FontVec::try_from_vec(font_data)
            {
                info!("Loaded system font: {}", path);
                return Self {
                    font: Some(font),
                    ..Self::default()
                };
            }
        }

        debug!("No system font found, count label will be skipped");
        Self::default()
    }
}

/// Renders a density map as a jet-colormapped heatmap.
///
/// The map is min-max normalized, colorized through the jet lookup table
/// at its native resolution, and then upscaled by `downsample` with
/// bilinear filtering so the result matches the input image resolution.
/// A constant map renders as uniform cold blue.
///
/// # Arguments
///
/// * `map` - The density map to render
/// * `downsample` - Factor by which the map is smaller than the input image
///
/// # Returns
///
/// A Result containing the heatmap image, or an error if the map is empty.
pub fn render_density_heatmap(map: &Tensor2D, downsample: u32) -> Result<RgbImage, CountError> {
    let (height, width) = map.dim();
    if height == 0 || width == 0 {
        return Err(CountError::invalid_input(
            "cannot render a heatmap from an empty density map",
        ));
    }

    let min = map.iter().copied().fold(f32::INFINITY, f32::min);
    let max = map.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    let mut heatmap = RgbImage::new(width as u32, height as u32);
    for ((y, x), &value) in map.indexed_iter() {
        let t = if range > 0.0 { (value - min) / range } else { 0.0 };
        heatmap.put_pixel(x as u32, y as u32, jet_color(t));
    }

    let downsample = downsample.max(1);
    if downsample > 1 {
        heatmap = imageops::resize(
            &heatmap,
            width as u32 * downsample,
            height as u32 * downsample,
            imageops::FilterType::Triangle,
        );
    }

    Ok(heatmap)
}

/// Blends a heatmap over an input image.
///
/// The heatmap is resized to the image dimensions when they differ, then
/// blended with a fixed 0.4 image / 0.6 heatmap weighting.
///
/// # Arguments
///
/// * `img` - The input image
/// * `heatmap` - The rendered heatmap
pub fn superimpose_heatmap(img: &RgbImage, heatmap: &RgbImage) -> RgbImage {
    let resized;
    let heatmap = if heatmap.dimensions() == img.dimensions() {
        heatmap
    } else {
        resized = imageops::resize(
            heatmap,
            img.width(),
            img.height(),
            imageops::FilterType::Triangle,
        );
        &resized
    };

    let mut blended = RgbImage::new(img.width(), img.height());
    for (x, y, pixel) in blended.enumerate_pixels_mut() {
        let base = img.get_pixel(x, y).0;
        let heat = heatmap.get_pixel(x, y).0;
        let mut out = [0u8; 3];
        for c in 0..3 {
            let value = base[c] as f32 * OVERLAY_IMAGE_WEIGHT
                + heat[c] as f32 * (1.0 - OVERLAY_IMAGE_WEIGHT);
            out[c] = value.round().clamp(0.0, 255.0) as u8;
        }
        *pixel = Rgb(out);
    }
    blended
}

/// Draws the predicted count in the top-left corner of an image.
///
/// The label is drawn twice, first as a dark shadow offset by one pixel,
/// so it stays readable over both cold and hot heatmap regions.
fn draw_count_label(img: &mut RgbImage, count: f32, font: &FontVec, scale: f32) {
    let text = format!("count: {count:.1}");
    draw_text_mut(img, LABEL_SHADOW, 9, 9, scale, font, &text);
    draw_text_mut(img, LABEL_COLOR, 8, 8, scale, font, &text);
}

/// Derives the default heatmap output path for an input image.
///
/// The output file is named `<stem>_<model>_den.png` and placed in
/// `output_dir` when given, otherwise next to the input image.
///
/// # Arguments
///
/// * `input_path` - Path of the input image
/// * `model_name` - Name of the model that produced the prediction
/// * `output_dir` - Optional directory for the output file
pub fn default_output_path(
    input_path: &Path,
    model_name: &str,
    output_dir: Option<&Path>,
) -> PathBuf {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let file_name = format!("{stem}_{model_name}_den.png");

    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(file_name),
    }
}

/// Renders a density prediction to a heatmap file.
///
/// Builds the heatmap from the result's density map, optionally blends it
/// over the input image and draws the count label, then saves the image to
/// the output path.
///
/// # Arguments
///
/// * `result` - The density prediction to visualize
/// * `config` - The HeatmapConfig controlling overlay, labeling, and font
/// * `output_path` - The path where the heatmap image will be saved
///
/// # Returns
///
/// A Result indicating success or failure of the visualization process.
pub fn visualize_density(
    result: &DensityResult,
    config: &HeatmapConfig,
    output_path: &Path,
) -> Result<(), CountError> {
    let heatmap = render_density_heatmap(&result.density_map, result.downsample)?;

    let mut out = if config.overlay {
        superimpose_heatmap(&result.input_img, &heatmap)
    } else {
        heatmap
    };

    if config.label
        && let Some(font) = &config.font
    {
        draw_count_label(&mut out, result.count, font, config.font_scale);
    }

    out.save(output_path).map_err(|e| {
        CountError::visualization(
            &format!("failed to save heatmap to {}", output_path.display()),
            e,
        )
    })?;

    info!("Heatmap saved to: {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    #[test]
    fn heatmap_matches_map_resolution_at_unit_downsample() {
        let map = Array2::from_shape_fn((6, 9), |(y, x)| (y * x) as f32);
        let heatmap = render_density_heatmap(&map, 1).unwrap();
        assert_eq!(heatmap.dimensions(), (9, 6));
    }

    #[test]
    fn heatmap_upscales_by_downsample_factor() {
        let map = Array2::from_shape_fn((4, 5), |(y, x)| (y + x) as f32);
        let heatmap = render_density_heatmap(&map, 8).unwrap();
        assert_eq!(heatmap.dimensions(), (40, 32));
    }

    #[test]
    fn constant_map_renders_cold_blue() {
        let map = Array2::from_elem((3, 3), 2.5f32);
        let heatmap = render_density_heatmap(&map, 1).unwrap();
        assert_eq!(*heatmap.get_pixel(1, 1), jet_color(0.0));
    }

    #[test]
    fn hottest_cell_renders_red() {
        let map = array![[0.0f32, 0.0], [0.0, 10.0]];
        let heatmap = render_density_heatmap(&map, 1).unwrap();
        let hot = heatmap.get_pixel(1, 1);
        assert!(hot.0[0] > hot.0[2]);
        let cold = heatmap.get_pixel(0, 0);
        assert!(cold.0[2] > cold.0[0]);
    }

    #[test]
    fn empty_map_is_rejected() {
        let map = Array2::<f32>::zeros((0, 0));
        assert!(render_density_heatmap(&map, 1).is_err());
    }

    #[test]
    fn overlay_output_matches_image_dimensions() {
        let img = RgbImage::new(16, 12);
        let map = Array2::from_shape_fn((3, 4), |(y, x)| (y + x) as f32);
        let heatmap = render_density_heatmap(&map, 1).unwrap();
        let blended = superimpose_heatmap(&img, &heatmap);
        assert_eq!(blended.dimensions(), (16, 12));
    }

    #[test]
    fn overlay_blends_with_fixed_weights() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([100, 100, 100]));
        let mut heatmap = RgbImage::new(1, 1);
        heatmap.put_pixel(0, 0, Rgb([200, 0, 50]));

        let blended = superimpose_heatmap(&img, &heatmap);
        // 0.4 * image + 0.6 * heatmap per channel
        assert_eq!(*blended.get_pixel(0, 0), Rgb([160, 40, 70]));
    }

    #[test]
    fn default_output_name_includes_stem_and_model() {
        let path = default_output_path(Path::new("shots/mall.jpg"), "CSRNet", None);
        assert_eq!(path, PathBuf::from("shots/mall_CSRNet_den.png"));

        let path = default_output_path(
            Path::new("shots/mall.jpg"),
            "MARNet",
            Some(Path::new("out")),
        );
        assert_eq!(path, PathBuf::from("out/mall_MARNet_den.png"));
    }
}
