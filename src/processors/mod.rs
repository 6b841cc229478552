//! Image processing utilities for crowd counting.
//!
//! This module provides the transforms applied around the model forward
//! pass: input normalization before inference, and density-map
//! post-processing after it.
//!
//! # Modules
//!
//! * `density` - Density-map post-processing (scaling, counting)
//! * `normalization` - Image normalization for preparing model inputs
//! * `types` - Type definitions used across the processors module

pub mod density;
mod normalization;
pub mod types;

pub use density::*;
pub use normalization::*;
pub use types::*;
