//! Tensor type aliases used across preprocessing and inference.

/// A 2-D float tensor, used for density and auxiliary maps (H, W).
pub type Tensor2D = ndarray::Array2<f32>;

/// A 4-D float tensor in NCHW layout, used as model input (N, C, H, W).
pub type Tensor4D = ndarray::Array4<f32>;
