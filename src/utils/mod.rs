//! Utility functions for the crowd counting pipeline.
//!
//! This module provides image loading helpers, the jet colormap used for
//! density heatmaps, and the heatmap rendering utilities.

pub mod colormap;
pub mod image;
pub mod visualization;

pub use colormap::jet_color;
pub use image::{load_image, load_images_batch};
pub use visualization::{
    HeatmapConfig, default_output_path, render_density_heatmap, superimpose_heatmap,
    visualize_density,
};
