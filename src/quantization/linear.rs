//! Linear quantizer and dequantizer.
//!
//! `q = saturate(round_half_even(x / scale) + zero_point)`
//! `x' = (q - zero_point) * scale`
//!
//! Ties round to even, matching `nearbyint` under the default FP environment.

use super::{QuantParams, QuantType};

/// Quantize a single value. NaN maps to the zero-point.
#[inline]
pub fn quantize_value<Q: QuantType>(x: f32, params: QuantParams<Q>) -> Q {
    if x.is_nan() {
        return params.zero_point;
    }
    let q = (x / params.scale).round_ties_even() + params.zero_point.to_i32() as f32;
    Q::saturate(q.clamp(Q::QMIN as f32, Q::QMAX as f32) as i32)
}

#[inline]
pub fn dequantize_value<Q: QuantType>(q: Q, params: QuantParams<Q>) -> f32 {
    (q.to_i32() - params.zero_point.to_i32()) as f32 * params.scale
}

/// Quantize a buffer with one (scale, zero-point) pair. Output length equals input length.
pub fn quantize_linear<Q: QuantType>(values: &[f32], params: QuantParams<Q>) -> Vec<Q> {
    values.iter().map(|&x| quantize_value(x, params)).collect()
}

/// Quantize into a caller-provided buffer of the same length.
pub fn quantize_linear_into<Q: QuantType>(values: &[f32], out: &mut [Q], params: QuantParams<Q>) {
    debug_assert_eq!(values.len(), out.len());
    for (o, &x) in out.iter_mut().zip(values) {
        *o = quantize_value(x, params);
    }
}

pub fn dequantize_linear<Q: QuantType>(quantized: &[Q], params: QuantParams<Q>) -> Vec<f32> {
    quantized
        .iter()
        .map(|&q| dequantize_value(q, params))
        .collect()
}
