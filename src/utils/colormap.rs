//! Jet colormap for density heatmaps.
//!
//! Maps normalized density values to the classic blue-to-red jet ramp.
//! A 256-entry lookup table is built once and shared across calls.

use image::Rgb;
use once_cell::sync::Lazy;

/// Precomputed jet lookup table indexed by an 8-bit intensity.
static JET_LUT: Lazy<[Rgb<u8>; 256]> = Lazy::new(|| {
    let mut table = [Rgb([0u8; 3]); 256];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = jet_exact(i as f32 / 255.0);
    }
    table
});

/// Evaluates the jet ramp at `t` in [0, 1].
///
/// Each channel is a pair of opposing linear ramps clamped to [0, 1],
/// which produces the blue, cyan, yellow, red progression.
fn jet_exact(t: f32) -> Rgb<u8> {
    let r = (4.0 * t - 1.5).min(-4.0 * t + 4.5).clamp(0.0, 1.0);
    let g = (4.0 * t - 0.5).min(-4.0 * t + 3.5).clamp(0.0, 1.0);
    let b = (4.0 * t + 0.5).min(-4.0 * t + 2.5).clamp(0.0, 1.0);
    Rgb([(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8])
}

/// Returns the jet color for a normalized intensity in [0, 1].
///
/// Values outside the range are clamped. Lookups go through the
/// precomputed table, so repeated calls are a single index operation.
///
/// # Arguments
///
/// * `t` - Normalized intensity (0.0 = coldest blue, 1.0 = hottest red)
pub fn jet_color(t: f32) -> Rgb<u8> {
    let clamped = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    JET_LUT[(clamped * 255.0).round() as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_dark_blue_and_dark_red() {
        let cold = jet_color(0.0);
        assert_eq!(cold.0[0], 0);
        assert_eq!(cold.0[1], 0);
        assert!(cold.0[2] >= 127);

        let hot = jet_color(1.0);
        assert!(hot.0[0] >= 127);
        assert_eq!(hot.0[1], 0);
        assert_eq!(hot.0[2], 0);
    }

    #[test]
    fn midpoint_is_green_dominant() {
        let mid = jet_color(0.5);
        assert_eq!(mid.0[1], 255);
        assert!(mid.0[0] < 128);
        assert!(mid.0[2] < 128);
    }

    #[test]
    fn out_of_range_values_clamp() {
        assert_eq!(jet_color(-1.0), jet_color(0.0));
        assert_eq!(jet_color(2.0), jet_color(1.0));
        assert_eq!(jet_color(f32::NAN), jet_color(0.0));
    }
}
