//! Quantize-then-dequantize round trip.
//!
//! Injects the precision loss a quantized kernel would see into an otherwise
//! full-precision buffer. Each direction slice is quantized with its own
//! parameters.

use super::{
    dequantize_value, estimate_params, quantize_linear, size_per_direction, QuantParams,
    QuantType,
};
use crate::errors::Result;
use tracing::trace;

/// QDQ `values` split into `num_directions` equal slices along the leading axis.
pub fn apply_qdq<Q: QuantType>(values: &[f32], num_directions: usize) -> Result<Vec<f32>> {
    apply_qdq_with_params::<Q>(values, num_directions).map(|(out, _)| out)
}

/// Like [`apply_qdq`], also returning the parameters used for each slice.
pub fn apply_qdq_with_params<Q: QuantType>(
    values: &[f32],
    num_directions: usize,
) -> Result<(Vec<f32>, Vec<QuantParams<Q>>)> {
    let size_per_dir = size_per_direction(values.len(), num_directions)?;
    let mut result = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(num_directions);

    for slice in values.chunks(size_per_dir.max(1)).take(num_directions) {
        let p = estimate_params::<Q>(slice)?;
        let quantized = quantize_linear(slice, p);
        trace!(
            scale = p.scale,
            zero_point = p.zero_point.to_i32(),
            ?quantized,
            "qdq slice"
        );
        result.extend(quantized.into_iter().map(|q| dequantize_value(q, p)));
        params.push(p);
    }

    Ok((result, params))
}
