//! Min/max estimation of (scale, zero-point).

use super::QuantType;
use crate::errors::{QuantRnnError, Result};
use serde::Serialize;

/// Lower bound on the scale. Keeps a zero-width range invertible.
pub const MIN_SCALE: f32 = f32::EPSILON;

/// Scale and zero-point of one linear quantization group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantParams<Q> {
    pub scale: f32,
    pub zero_point: Q,
}

impl<Q: QuantType> QuantParams<Q> {
    pub fn new(scale: f32, zero_point: Q) -> Self {
        Self { scale, zero_point }
    }

    /// Real values at the ends of the integer range.
    pub fn representable_range(&self) -> (f32, f32) {
        let zp = self.zero_point.to_i32();
        (
            (Q::QMIN - zp) as f32 * self.scale,
            (Q::QMAX - zp) as f32 * self.scale,
        )
    }
}

/// Estimate parameters so that `[min(x, 0), max(x, 0)]` maps linearly onto
/// the full integer range of `Q`.
///
/// The range always includes 0.0, so zero is exactly representable. A
/// zero-width range gets `MIN_SCALE` instead of a zero scale. Errors on empty
/// input or non-finite values.
pub fn estimate_params<Q: QuantType>(values: &[f32]) -> Result<QuantParams<Q>> {
    if values.is_empty() {
        return Err(QuantRnnError::Quantization("empty buffer".to_string()));
    }
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(QuantRnnError::Quantization(format!(
            "non-finite value {} at index {}",
            values[pos], pos
        )));
    }

    let (min_val, max_val) = values
        .iter()
        .fold((0.0f32, 0.0f32), |(min, max), &v| (min.min(v), max.max(v)));

    let qmin = Q::QMIN as f32;
    let qmax = Q::QMAX as f32;
    // The range of two finite f32 values can exceed f32::MAX.
    let range = f64::from(max_val) - f64::from(min_val);
    let scale = (range / f64::from(qmax - qmin)).min(f64::from(f32::MAX)) as f32;
    let scale = scale.max(MIN_SCALE);

    let initial_zero_point = qmin - min_val / scale;
    let zero_point = initial_zero_point.clamp(qmin, qmax).round_ties_even() as i32;

    Ok(QuantParams {
        scale,
        zero_point: Q::saturate(zero_point),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unsigned_covers_min_max() {
        let p = estimate_params::<u8>(&[-1.0, 0.5, 3.0]).unwrap();
        assert_relative_eq!(p.scale, 4.0 / 255.0);
        // -1.0 / scale = -63.75 -> zero-point 64
        assert_eq!(p.zero_point, 64);
    }

    #[test]
    fn signed_covers_min_max() {
        let p = estimate_params::<i8>(&[-1.0, 0.5, 3.0]).unwrap();
        assert_relative_eq!(p.scale, 4.0 / 255.0);
        assert_eq!(p.zero_point, -64);
    }

    #[test]
    fn positive_only_range_is_extended_to_zero() {
        let p = estimate_params::<u8>(&[2.0, 4.0]).unwrap();
        assert_relative_eq!(p.scale, 4.0 / 255.0);
        assert_eq!(p.zero_point, 0);

        let p = estimate_params::<i8>(&[2.0, 4.0]).unwrap();
        assert_eq!(p.zero_point, -128);
    }

    #[test]
    fn negative_only_range_puts_zero_point_at_top() {
        let p = estimate_params::<u8>(&[-2.0, -1.0]).unwrap();
        assert_eq!(p.zero_point, 255);
        let p = estimate_params::<i8>(&[-2.0, -1.0]).unwrap();
        assert_eq!(p.zero_point, 127);
    }

    #[test]
    fn degenerate_all_zero_buffer_gets_epsilon_scale() {
        let p = estimate_params::<u8>(&[0.0; 16]).unwrap();
        assert!(p.scale.is_finite());
        assert!(p.scale > 0.0);
        assert_eq!(p.scale, MIN_SCALE);
        assert_eq!(p.zero_point, 0);

        let p = estimate_params::<i8>(&[0.0; 16]).unwrap();
        assert_eq!(p.scale, MIN_SCALE);
        assert_eq!(p.zero_point, -128);
    }

    #[test]
    fn degenerate_identical_values_give_finite_scale() {
        for v in [0.7f32, -3.25, 1e-30] {
            let p = estimate_params::<i8>(&[v; 9]).unwrap();
            assert!(p.scale.is_finite() && p.scale > 0.0, "value {}", v);
            let (lo, hi) = p.representable_range();
            assert!(lo.is_finite() && hi.is_finite());
        }
    }

    #[test]
    fn range_wider_than_f32_max_keeps_finite_scale() {
        let values = [-3.0e38f32, 3.0e38, 1.0];
        let p = estimate_params::<u8>(&values).unwrap();
        assert!(p.scale.is_finite());
        assert_relative_eq!(p.scale, 3.0e38 / 127.5, max_relative = 1e-6);

        let out = crate::quantization::apply_qdq::<u8>(&values, 1).unwrap();
        for (&x, &y) in values.iter().zip(&out) {
            assert!(y.is_finite(), "{} -> {}", x, y);
            assert!((x - y).abs() <= p.scale, "{} -> {}", x, y);
        }

        let p = estimate_params::<i8>(&[-f32::MAX, f32::MAX]).unwrap();
        assert!(p.scale.is_finite());
    }

    #[test]
    fn empty_and_non_finite_are_errors() {
        assert!(estimate_params::<u8>(&[]).is_err());
        assert!(estimate_params::<u8>(&[1.0, f32::NAN]).is_err());
        assert!(estimate_params::<i8>(&[f32::INFINITY]).is_err());
    }

    #[test]
    fn zero_is_exactly_representable() {
        let p = estimate_params::<u8>(&[-0.3, 0.9, 0.1]).unwrap();
        let (lo, hi) = p.representable_range();
        assert!(lo <= 0.0 && hi >= 0.0);
        let q = crate::quantization::quantize_value(0.0, p);
        assert_eq!(q, p.zero_point);
        assert_eq!(crate::quantization::dequantize_value(q, p), 0.0);
    }
}
