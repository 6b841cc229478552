//! Density-map post-processing.
//!
//! After the forward pass, the raw density map is divided by a
//! normalization scalar chosen by the caller (training pipelines bake a
//! multiplier into the ground-truth maps; dividing undoes it). The
//! spatial sum of the scaled map is the predicted count.

use crate::core::errors::CountError;
use crate::core::tensor::Tensor2D;

/// Post-processes raw density maps produced by the model.
#[derive(Debug, Clone)]
pub struct DensityPostProcess {
    /// Scalar the raw density map is divided by. Must be positive.
    pub divide: f32,
}

impl DensityPostProcess {
    /// Creates a new DensityPostProcess instance.
    ///
    /// # Arguments
    ///
    /// * `divide` - Optional normalization scalar (defaults to 1.0).
    ///
    /// # Errors
    ///
    /// Returns an error if the scalar is not a positive finite number.
    pub fn new(divide: Option<f32>) -> Result<Self, CountError> {
        let divide = divide.unwrap_or(crate::core::constants::DEFAULT_DIVIDE);
        if !divide.is_finite() || divide <= 0.0 {
            return Err(CountError::ConfigError {
                message: format!("divide must be a positive finite number, got {divide}"),
            });
        }
        Ok(Self { divide })
    }

    /// Applies the normalization scalar to a raw density map in place.
    pub fn apply(&self, map: &mut Tensor2D) {
        if self.divide != 1.0 {
            map.mapv_inplace(|v| v / self.divide);
        }
    }

    /// Returns the predicted count for a scaled density map.
    ///
    /// The count is the spatial sum of the map. Values may be slightly
    /// negative post-network; they are summed as-is.
    pub fn count(map: &Tensor2D) -> f32 {
        map.sum()
    }

    /// Returns the density sum over the top-left quarter-by-quarter corner
    /// of the map.
    ///
    /// The slice spans a quarter of each dimension, so a uniform crowd
    /// puts roughly a sixteenth of the count here. Useful as a quick
    /// spatial sanity check.
    pub fn quadrant_sum(map: &Tensor2D) -> f32 {
        let (height, width) = map.dim();
        map.slice(ndarray::s![..height / 4, ..width / 4]).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn divide_scales_sum_inversely() {
        let raw = Array2::from_elem((8, 8), 0.5f32);
        let raw_sum = raw.sum();

        let post = DensityPostProcess::new(Some(50.0)).unwrap();
        let mut scaled = raw.clone();
        post.apply(&mut scaled);

        assert!((DensityPostProcess::count(&scaled) - raw_sum / 50.0).abs() < 1e-4);
    }

    #[test]
    fn identity_divide_preserves_map() {
        let raw = Array2::from_shape_fn((4, 6), |(y, x)| (y * 6 + x) as f32);
        let post = DensityPostProcess::new(None).unwrap();
        let mut scaled = raw.clone();
        post.apply(&mut scaled);
        assert_eq!(scaled, raw);
    }

    #[test]
    fn negative_values_are_summed_as_is() {
        let mut map = Array2::from_elem((2, 2), 1.0f32);
        map[[0, 0]] = -0.5;
        assert!((DensityPostProcess::count(&map) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn uniform_map_corner_sum_is_a_sixteenth() {
        let map = Array2::from_elem((8, 8), 1.0f32);
        // 2x2 slice of a 64-cell uniform map
        assert!((DensityPostProcess::quadrant_sum(&map) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn quadrant_sum_covers_top_left() {
        let mut map = Array2::zeros((8, 8));
        map[[0, 0]] = 3.0;
        map[[7, 7]] = 5.0;
        assert!((DensityPostProcess::quadrant_sum(&map) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_non_positive_divide() {
        assert!(DensityPostProcess::new(Some(0.0)).is_err());
        assert!(DensityPostProcess::new(Some(-1.0)).is_err());
        assert!(DensityPostProcess::new(Some(f32::NAN)).is_err());
    }
}
