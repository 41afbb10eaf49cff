//! Integer GEMM for dynamically quantized activations.
//!
//! Weights are prepacked once into `[n, k]` rows of raw `i32` values; scale
//! and zero-point are applied at compute time, so a constant weight can be
//! packed before its quantization side tensors are known. With `a' = a - a_zp`:
//!
//! `Σ a'·(w - w_zp) = Σ a'·w - w_zp · Σ a'`

#![allow(clippy::needless_range_loop)]

use crate::quantization::QuantType;
use rayon::prelude::*;

/// Weight block packed as `[n, k]` rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedWeight {
    data: Vec<i32>,
    k: usize,
    n: usize,
}

impl PackedWeight {
    /// Pack a quantized `[k, n]` block (the transposed layout the quantized
    /// LSTM receives) into `[n, k]` rows.
    pub fn pack<Q: QuantType>(block: &[Q], k: usize, n: usize) -> Self {
        debug_assert_eq!(block.len(), k * n);
        let mut data = vec![0i32; k * n];
        for kk in 0..k {
            for nn in 0..n {
                data[nn * k + kk] = block[kk * n + nn].to_i32();
            }
        }
        Self { data, k, n }
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }
}

/// Quantization of the activation operand.
#[derive(Debug, Clone, Copy)]
pub struct ActivationQuant {
    pub scale: f32,
    pub zero_point: u8,
}

/// Quantization of the weight operand.
#[derive(Debug, Clone, Copy)]
pub struct WeightQuant {
    pub scale: f32,
    pub zero_point: i32,
}

/// `out[m, n] (+)= (a - a_zp)[m, k] · (packed - w_zp)ᵀ * a_scale * w_scale`.
pub fn qgemm_u8(
    a: &[u8],
    a_quant: ActivationQuant,
    packed: &PackedWeight,
    w_quant: WeightQuant,
    out: &mut [f32],
    m: usize,
    accumulate: bool,
) {
    let k = packed.k;
    let n = packed.n;
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(out.len(), m * n);
    if n == 0 {
        return;
    }

    let a_zp = i32::from(a_quant.zero_point);
    let multiplier = a_quant.scale * w_quant.scale;

    out.par_chunks_mut(n).enumerate().for_each(|(row, out_row)| {
        let a_row = &a[row * k..(row + 1) * k];
        let a_sum: i32 = a_row.iter().map(|&v| i32::from(v) - a_zp).sum();
        for col in 0..n {
            let w_row = &packed.data[col * k..(col + 1) * k];
            let mut acc = 0i32;
            for i in 0..k {
                acc += (i32::from(a_row[i]) - a_zp) * w_row[i];
            }
            acc -= w_quant.zero_point * a_sum;
            let value = acc as f32 * multiplier;
            if accumulate {
                out_row[col] += value;
            } else {
                out_row[col] = value;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_transposes_block() {
        // k = 2, n = 3 block [[1, 2, 3], [4, 5, 6]]
        let block = [1u8, 2, 3, 4, 5, 6];
        let packed = PackedWeight::pack(&block, 2, 3);
        assert_eq!(packed.data, vec![1, 4, 2, 5, 3, 6]);
        assert_eq!((packed.k(), packed.n()), (2, 3));
    }

    #[test]
    fn integer_product_matches_float_product_of_dequantized_values() {
        let w = [-3i8, 7, 0, 12, -128, 127];
        let w_quant = WeightQuant {
            scale: 0.02,
            zero_point: -2,
        };
        let packed = PackedWeight::pack(&w, 3, 2);

        let a = [10u8, 200, 128, 0, 255, 64];
        let a_quant = ActivationQuant {
            scale: 0.01,
            zero_point: 128,
        };

        let mut out = [0.0f32; 4];
        qgemm_u8(&a, a_quant, &packed, w_quant, &mut out, 2, false);

        for row in 0..2 {
            for col in 0..2 {
                let mut expected = 0.0f64;
                for kk in 0..3 {
                    let av = (a[row * 3 + kk] as f64 - 128.0) * 0.01;
                    let wv = (w[kk * 2 + col] as f64 + 2.0) * 0.02;
                    expected += av * wv;
                }
                let got = out[row * 2 + col] as f64;
                assert!((got - expected).abs() < 1e-4, "{} vs {}", got, expected);
            }
        }
    }

    #[test]
    fn accumulate_adds_to_existing() {
        let packed = PackedWeight::pack(&[3u8], 1, 1);
        let mut out = [1.0f32];
        qgemm_u8(
            &[5],
            ActivationQuant {
                scale: 1.0,
                zero_point: 1,
            },
            &packed,
            WeightQuant {
                scale: 0.5,
                zero_point: 1,
            },
            &mut out,
            1,
            true,
        );
        // (5 - 1) * (3 - 1) * 0.5 = 4
        assert_eq!(out, [5.0]);
    }
}
