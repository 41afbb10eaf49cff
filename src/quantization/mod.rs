//! Linear 8-bit quantization: parameter estimation, quantize/dequantize,
//! QDQ round trips and per-direction weight quantization.

pub mod linear;
pub mod params;
pub mod qdq;
pub mod weight;

pub use linear::{dequantize_linear, dequantize_value, quantize_linear, quantize_value};
pub use params::{estimate_params, QuantParams, MIN_SCALE};
pub use qdq::{apply_qdq, apply_qdq_with_params};
pub use weight::{
    quantize_weight, transpose_per_direction, untranspose_per_direction, QuantizedWeight,
};

use crate::errors::{QuantRnnError, Result};
use crate::tensor::Element;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-width integer type a float buffer can be quantized to.
pub trait QuantType: Element + Into<i32> {
    /// Smallest representable value.
    const QMIN: i32;
    /// Largest representable value.
    const QMAX: i32;
    /// Runtime tag for this type.
    const KIND: WeightType;

    /// Convert with saturation to `[QMIN, QMAX]`.
    fn saturate(value: i32) -> Self;

    #[inline]
    fn to_i32(self) -> i32 {
        self.into()
    }
}

impl QuantType for u8 {
    const QMIN: i32 = u8::MIN as i32;
    const QMAX: i32 = u8::MAX as i32;
    const KIND: WeightType = WeightType::U8;

    #[inline]
    fn saturate(value: i32) -> Self {
        value.clamp(Self::QMIN, Self::QMAX) as u8
    }
}

impl QuantType for i8 {
    const QMIN: i32 = i8::MIN as i32;
    const QMAX: i32 = i8::MAX as i32;
    const KIND: WeightType = WeightType::I8;

    #[inline]
    fn saturate(value: i32) -> Self {
        value.clamp(Self::QMIN, Self::QMAX) as i8
    }
}

/// 8-bit weight element type selected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightType {
    I8,
    U8,
}

impl WeightType {
    pub const ALL: [WeightType; 2] = [WeightType::I8, WeightType::U8];
}

impl fmt::Display for WeightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightType::I8 => write!(f, "i8"),
            WeightType::U8 => write!(f, "u8"),
        }
    }
}

/// Element count of one direction slice; errors when `len` does not split evenly.
pub fn size_per_direction(len: usize, num_directions: usize) -> Result<usize> {
    if num_directions == 0 {
        return Err(QuantRnnError::Quantization(
            "number of directions must be at least 1".to_string(),
        ));
    }
    if len % num_directions != 0 {
        return Err(QuantRnnError::Quantization(format!(
            "buffer of {} elements does not split into {} equal directions",
            len, num_directions
        )));
    }
    Ok(len / num_directions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturate_clamps_to_type_range() {
        assert_eq!(u8::saturate(-5), 0);
        assert_eq!(u8::saturate(300), 255);
        assert_eq!(i8::saturate(-200), -128);
        assert_eq!(i8::saturate(200), 127);
        assert_eq!(i8::saturate(-3), -3);
    }

    #[test]
    fn size_per_direction_requires_even_split() {
        assert_eq!(size_per_direction(12, 2).unwrap(), 6);
        assert!(size_per_direction(7, 2).is_err());
        assert!(size_per_direction(4, 0).is_err());
    }
}
