//! Element-wise comparison of reference and kernel outputs.

use super::config::Tolerance;
use crate::errors::QuantRnnError;
use crate::ops::lstm::LstmOutputs;
use crate::tensor::Tensor;
use serde::Serialize;

/// Statistics for a tensor: min, max, mean, std, and anomaly flags.
#[derive(Debug, Clone, Serialize)]
pub struct TensorStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub std: f32,
    pub count: usize,
    pub nan_count: usize,
    pub inf_count: usize,
}

impl TensorStats {
    pub fn from_slice(slice: &[f32]) -> Self {
        let count = slice.len();
        let nan_count = slice.iter().filter(|x| x.is_nan()).count();
        let inf_count = slice.iter().filter(|x| x.is_infinite()).count();
        let finite = || slice.iter().copied().filter(|x| x.is_finite());
        let finite_count = count - nan_count - inf_count;

        let mean = if finite_count > 0 {
            finite().sum::<f32>() / finite_count as f32
        } else {
            f32::NAN
        };
        let var: f32 = finite().map(|x| (x - mean) * (x - mean)).sum();
        let std = if finite_count > 1 {
            (var / (finite_count - 1) as f32).sqrt()
        } else {
            0.0
        };
        let min = finite().fold(f32::INFINITY, f32::min);
        let max = finite().fold(f32::NEG_INFINITY, f32::max);
        Self {
            min: if min == f32::INFINITY { 0.0 } else { min },
            max: if max == f32::NEG_INFINITY { 0.0 } else { max },
            mean,
            std,
            count,
            nan_count,
            inf_count,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.nan_count == 0 && self.inf_count == 0
    }
}

/// First element outside tolerance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub tensor: String,
    pub index: usize,
    pub expected: f32,
    pub actual: f32,
    pub delta: f32,
}

impl From<Mismatch> for QuantRnnError {
    fn from(m: Mismatch) -> Self {
        QuantRnnError::NumericMismatch {
            tensor: m.tensor,
            index: m.index,
            expected: m.expected,
            actual: m.actual,
            delta: m.delta,
        }
    }
}

/// Comparison summary for one named output.
#[derive(Debug, Clone, Serialize)]
pub struct OutputComparison {
    pub name: String,
    pub max_abs_diff: f32,
    pub expected: TensorStats,
    pub actual: TensorStats,
    pub mismatch: Option<Mismatch>,
}

impl OutputComparison {
    pub fn passed(&self) -> bool {
        self.mismatch.is_none()
    }
}

/// Compare two tensors element-wise. Shapes must match exactly.
pub fn compare_tensor(
    name: &str,
    expected: &Tensor<f32>,
    actual: &Tensor<f32>,
    tolerance: Tolerance,
) -> Result<OutputComparison, QuantRnnError> {
    actual.expect_shape(name, expected.shape())?;

    let mut max_abs_diff = 0.0f32;
    let mut mismatch = None;
    for (index, (&e, &a)) in expected.data().iter().zip(actual.data()).enumerate() {
        let delta = (a - e).abs();
        max_abs_diff = max_abs_diff.max(delta);
        if mismatch.is_none() && !tolerance.allows(e, a) {
            mismatch = Some(Mismatch {
                tensor: name.to_string(),
                index,
                expected: e,
                actual: a,
                delta,
            });
        }
    }

    Ok(OutputComparison {
        name: name.to_string(),
        max_abs_diff,
        expected: TensorStats::from_slice(expected.data()),
        actual: TensorStats::from_slice(actual.data()),
        mismatch,
    })
}

/// Compare `Y`, `Y_h` and `Y_c`.
pub fn compare_lstm_outputs(
    expected: &LstmOutputs,
    actual: &LstmOutputs,
    tolerance: Tolerance,
) -> Result<Vec<OutputComparison>, QuantRnnError> {
    expected
        .named()
        .into_iter()
        .zip(actual.named())
        .map(|((name, e), (_, a))| compare_tensor(name, e, a, tolerance))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(values: &[f32]) -> Tensor<f32> {
        Tensor::from_vec(values.to_vec())
    }

    #[test]
    fn reports_first_violation() {
        let cmp = compare_tensor(
            "Y",
            &t(&[1.0, 2.0, 3.0, 4.0]),
            &t(&[1.0, 2.5, 3.0, 9.0]),
            Tolerance::new(0.1, 0.0),
        )
        .unwrap();
        let m = cmp.mismatch.clone().unwrap();
        assert_eq!((m.index, m.expected, m.actual, m.delta), (1, 2.0, 2.5, 0.5));
        assert_eq!(cmp.max_abs_diff, 5.0);
        assert!(!cmp.passed());

        let err: QuantRnnError = m.into();
        assert!(err.to_string().contains("Y[1]"));
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let err = compare_tensor("Y_h", &t(&[1.0, 2.0]), &t(&[1.0]), Tolerance::QDQ_WEIGHTS)
            .unwrap_err();
        assert!(matches!(err, QuantRnnError::ShapeMismatch { .. }));
    }

    #[test]
    fn nan_output_fails() {
        let cmp = compare_tensor("Y_c", &t(&[0.0]), &t(&[f32::NAN]), Tolerance::new(1.0, 1.0))
            .unwrap();
        assert!(!cmp.passed());
        assert!(!cmp.actual.is_healthy());
    }

    #[test]
    fn stats_skip_non_finite_values() {
        let stats = TensorStats::from_slice(&[1.0, 3.0, f32::INFINITY, f32::NAN]);
        assert_eq!(stats.count, 4);
        assert_eq!((stats.min, stats.max, stats.mean), (1.0, 3.0, 2.0));
        assert_eq!((stats.nan_count, stats.inf_count), (1, 1));
    }
}
