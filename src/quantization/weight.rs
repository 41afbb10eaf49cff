//! Per-direction weight quantization.
//!
//! Recurrent weights arrive as `[directions, rows, cols]` with rows indexing
//! gate outputs. The quantized kernel consumes `[directions, cols, rows]`, so
//! each direction block is transposed before it is quantized.

use super::{
    dequantize_linear, estimate_params, quantize_linear, QuantParams, QuantType,
};
use crate::errors::{QuantRnnError, Result};
use crate::tensor::Tensor;
use tracing::trace;

/// Quantized weight in `[directions, cols, rows]` layout with one scale and
/// zero-point per direction.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedWeight<Q> {
    pub data: Vec<Q>,
    pub scales: Vec<f32>,
    pub zero_points: Vec<Q>,
    pub num_directions: usize,
    /// Rows of the original (untransposed) block.
    pub rows: usize,
    /// Columns of the original (untransposed) block.
    pub cols: usize,
}

impl<Q: QuantType> QuantizedWeight<Q> {
    #[inline]
    pub fn size_per_direction(&self) -> usize {
        self.rows * self.cols
    }

    pub fn params(&self, direction: usize) -> QuantParams<Q> {
        QuantParams::new(self.scales[direction], self.zero_points[direction])
    }

    /// Shape of the quantized buffer: `[directions, cols, rows]`.
    pub fn shape(&self) -> Vec<usize> {
        vec![self.num_directions, self.cols, self.rows]
    }

    /// Dequantize back to floats, still in the transposed layout.
    pub fn dequantize(&self) -> Vec<f32> {
        let per_dir = self.size_per_direction();
        let mut out = Vec::with_capacity(self.data.len());
        for dir in 0..self.num_directions {
            let block = &self.data[dir * per_dir..(dir + 1) * per_dir];
            out.extend(dequantize_linear(block, self.params(dir)));
        }
        out
    }

    pub fn data_tensor(&self) -> Result<Tensor<Q>> {
        Tensor::new(self.shape(), self.data.clone())
    }

    pub fn scale_tensor(&self) -> Tensor<f32> {
        Tensor::from_vec(self.scales.clone())
    }

    pub fn zero_point_tensor(&self) -> Tensor<Q> {
        Tensor::from_vec(self.zero_points.clone())
    }
}

fn check_block_len(len: usize, num_directions: usize, rows: usize, cols: usize) -> Result<()> {
    if num_directions == 0 {
        return Err(QuantRnnError::Quantization(
            "number of directions must be at least 1".to_string(),
        ));
    }
    let expected = num_directions * rows * cols;
    if len != expected {
        return Err(QuantRnnError::ShapeMismatch {
            name: "weight".to_string(),
            expected: vec![num_directions, rows, cols],
            actual: vec![len],
        });
    }
    Ok(())
}

/// Transpose each `[rows, cols]` direction block to `[cols, rows]`.
pub fn transpose_per_direction<T: Copy + Default>(
    values: &[T],
    num_directions: usize,
    rows: usize,
    cols: usize,
) -> Result<Vec<T>> {
    check_block_len(values.len(), num_directions, rows, cols)?;
    let per_dir = rows * cols;
    let mut out = vec![T::default(); values.len()];
    for dir in 0..num_directions {
        let src = &values[dir * per_dir..(dir + 1) * per_dir];
        let dst = &mut out[dir * per_dir..(dir + 1) * per_dir];
        for r in 0..rows {
            for c in 0..cols {
                dst[c * rows + r] = src[r * cols + c];
            }
        }
    }
    Ok(out)
}

/// Inverse of [`transpose_per_direction`]: `[cols, rows]` blocks back to `[rows, cols]`.
pub fn untranspose_per_direction<T: Copy + Default>(
    values: &[T],
    num_directions: usize,
    rows: usize,
    cols: usize,
) -> Result<Vec<T>> {
    transpose_per_direction(values, num_directions, cols, rows)
}

/// Transpose then quantize each direction with its own parameters.
pub fn quantize_weight<Q: QuantType>(
    w: &[f32],
    num_directions: usize,
    rows: usize,
    cols: usize,
) -> Result<QuantizedWeight<Q>> {
    let transposed = transpose_per_direction(w, num_directions, rows, cols)?;
    let per_dir = rows * cols;

    let mut data = Vec::with_capacity(w.len());
    let mut scales = Vec::with_capacity(num_directions);
    let mut zero_points = Vec::with_capacity(num_directions);

    for dir in 0..num_directions {
        let block = &transposed[dir * per_dir..(dir + 1) * per_dir];
        let params = estimate_params::<Q>(block)?;
        data.extend(quantize_linear(block, params));
        scales.push(params.scale);
        zero_points.push(params.zero_point);
    }

    trace!(?scales, ?zero_points, quantized = ?data, "quantized weight");

    Ok(QuantizedWeight {
        data,
        scales,
        zero_points,
        num_directions,
        rows,
        cols,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_moves_elements_per_direction() {
        // two directions of a 2x3 block
        let w: Vec<i32> = (0..12).collect();
        let t = transpose_per_direction(&w, 2, 2, 3).unwrap();
        assert_eq!(t, vec![0, 3, 1, 4, 2, 5, 6, 9, 7, 10, 8, 11]);
    }

    #[test]
    fn untranspose_restores_original() {
        let w: Vec<f32> = (0..40).map(|i| i as f32 * 0.5 - 3.0).collect();
        let t = transpose_per_direction(&w, 2, 4, 5).unwrap();
        assert_eq!(untranspose_per_direction(&t, 2, 4, 5).unwrap(), w);
    }

    #[test]
    fn side_tensors_have_one_entry_per_direction() {
        let w: Vec<f32> = (0..2 * 8 * 3).map(|i| (i as f32).cos()).collect();
        let q = quantize_weight::<i8>(&w, 2, 8, 3).unwrap();
        assert_eq!(q.scales.len(), 2);
        assert_eq!(q.zero_points.len(), 2);
        assert_eq!(q.data.len(), w.len());
        assert_eq!(q.shape(), vec![2, 3, 8]);
    }

    #[test]
    fn dequantized_weight_is_close_to_transposed_original() {
        let w: Vec<f32> = (0..8 * 2).map(|i| (i as f32 * 0.7).sin()).collect();
        let q = quantize_weight::<u8>(&w, 1, 8, 2).unwrap();
        let transposed = transpose_per_direction(&w, 1, 8, 2).unwrap();
        for (x, y) in transposed.iter().zip(q.dequantize()) {
            assert!((x - y).abs() <= q.scales[0]);
        }
    }

    #[test]
    fn wrong_length_is_a_shape_error() {
        let err = quantize_weight::<u8>(&[0.0; 10], 2, 2, 3).unwrap_err();
        assert!(matches!(err, QuantRnnError::ShapeMismatch { .. }));
    }
}
