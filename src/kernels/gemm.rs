//! Row-parallel float GEMM against row-major weights.

#![allow(clippy::needless_range_loop)]

use rayon::prelude::*;

/// `out[m, n] (+)= a[m, k] · w[n, k]ᵀ`.
///
/// `w` holds one row of `k` weights per output column, which is the layout of
/// an LSTM `W`/`R` block (`[4 * hidden, input]`). Each output row is owned by
/// one task and summed left to right, so results do not depend on scheduling.
pub fn gemm_f32_nt(
    a: &[f32],
    w: &[f32],
    out: &mut [f32],
    m: usize,
    k: usize,
    n: usize,
    accumulate: bool,
) {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(w.len(), n * k);
    debug_assert_eq!(out.len(), m * n);
    if n == 0 {
        return;
    }

    out.par_chunks_mut(n).enumerate().for_each(|(row, out_row)| {
        let a_row = &a[row * k..(row + 1) * k];
        for col in 0..n {
            let w_row = &w[col * k..(col + 1) * k];
            let mut sum = 0.0f32;
            for i in 0..k {
                sum += a_row[i] * w_row[i];
            }
            if accumulate {
                out_row[col] += sum;
            } else {
                out_row[col] = sum;
            }
        }
    });
}
