//! `SplitTraining` (contrib domain, version 1): split a tensor along one axis
//! into sizes given by a runtime `split` input.
//!
//! The copy treats the input as `before_dims` outer blocks of
//! `block_size_including_axis_dim` elements; each axis position inside a block
//! owns `block_size_inside_axis_dim` contiguous elements. An element's output
//! is found by searching the running prefix sums of the split sizes.

use super::{KernelInfo, OpInputs, OpKernel};
use crate::errors::{QuantRnnError, Result};
use crate::tensor::{Element, Tensor, TensorValue};
use tracing::debug;

/// Output counts up to this size keep their per-output arguments inline.
pub const INLINE_ARG_CAPACITY: usize = 8;

/// Per-output kernel arguments: a fixed inline array for small output counts,
/// a heap-staged buffer otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelArgs<T> {
    Inline {
        values: [T; INLINE_ARG_CAPACITY],
        len: usize,
    },
    Staged(Vec<T>),
}

impl<T: Copy + Default> KernelArgs<T> {
    pub fn from_slice(values: &[T]) -> Self {
        if values.len() <= INLINE_ARG_CAPACITY {
            let mut inline = [T::default(); INLINE_ARG_CAPACITY];
            inline[..values.len()].copy_from_slice(values);
            KernelArgs::Inline {
                values: inline,
                len: values.len(),
            }
        } else {
            KernelArgs::Staged(values.to_vec())
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            KernelArgs::Inline { values, len } => &values[..*len],
            KernelArgs::Staged(values) => values,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, KernelArgs::Inline { .. })
    }
}

/// Validated geometry of one split.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPlan {
    pub axis: usize,
    pub before_dims: usize,
    pub block_size_including_axis_dim: usize,
    pub block_size_inside_axis_dim: usize,
    pub split_sizes: Vec<usize>,
    pub output_shapes: Vec<Vec<usize>>,
}

impl SplitPlan {
    /// Resolve `axis`, expand an empty `split` to an equal split and check
    /// the sizes against the input shape.
    pub fn new(input_shape: &[usize], axis: i64, num_outputs: usize, split: &[i64]) -> Result<Self> {
        let rank = input_shape.len() as i64;
        let resolved = if axis < 0 { axis + rank } else { axis };
        if resolved < 0 || resolved >= rank {
            return Err(QuantRnnError::attribute(
                "axis",
                format!("axis {} is out of range for rank {}", axis, rank),
            ));
        }
        let axis = resolved as usize;
        let axis_dim = input_shape[axis];

        let split_sizes: Vec<usize> = if split.is_empty() {
            if axis_dim % num_outputs != 0 {
                return Err(QuantRnnError::input(
                    "split",
                    format!(
                        "axis dimension {} does not divide into {} equal outputs",
                        axis_dim, num_outputs
                    ),
                ));
            }
            vec![axis_dim / num_outputs; num_outputs]
        } else {
            if split.len() != num_outputs {
                return Err(QuantRnnError::input(
                    "split",
                    format!("{} sizes given for {} outputs", split.len(), num_outputs),
                ));
            }
            let sizes = split
                .iter()
                .map(|&s| {
                    usize::try_from(s).map_err(|_| {
                        QuantRnnError::input("split", format!("negative split size {}", s))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let total = sizes
                .iter()
                .try_fold(0usize, |acc, &s| acc.checked_add(s))
                .ok_or_else(|| QuantRnnError::input("split", "split sizes overflow"))?;
            if total != axis_dim {
                return Err(QuantRnnError::input(
                    "split",
                    format!(
                        "split sizes sum to {} but axis dimension is {}",
                        total, axis_dim
                    ),
                ));
            }
            sizes
        };

        let before_dims = input_shape[..axis].iter().product();
        let block_size_inside_axis_dim: usize = input_shape[axis + 1..].iter().product();
        let output_shapes = split_sizes
            .iter()
            .map(|&size| {
                let mut shape = input_shape.to_vec();
                shape[axis] = size;
                shape
            })
            .collect();

        Ok(Self {
            axis,
            before_dims,
            block_size_including_axis_dim: axis_dim * block_size_inside_axis_dim,
            block_size_inside_axis_dim,
            split_sizes,
            output_shapes,
        })
    }

    /// Running sums of the split sizes.
    pub fn split_sizes_range(&self) -> Vec<usize> {
        self.split_sizes
            .iter()
            .scan(0usize, |acc, &s| {
                *acc += s;
                Some(*acc)
            })
            .collect()
    }
}

fn split_typed<T: Element>(input: &Tensor<T>, plan: &SplitPlan) -> Result<Vec<TensorValue>> {
    let mut outputs: Vec<Vec<T>> = plan
        .output_shapes
        .iter()
        .map(|shape| vec![T::default(); shape.iter().product()])
        .collect();

    if !input.is_empty() {
        let sizes = KernelArgs::from_slice(&plan.split_sizes);
        let ranges = KernelArgs::from_slice(&plan.split_sizes_range());
        let (sizes, ranges) = (sizes.as_slice(), ranges.as_slice());
        let inside = plan.block_size_inside_axis_dim;

        for (idx, &value) in input.data().iter().enumerate() {
            let outer = idx / plan.block_size_including_axis_dim;
            let offset = idx % plan.block_size_including_axis_dim;
            let axis_pos = offset / inside;
            let inner = offset % inside;

            let out = ranges.partition_point(|&end| end <= axis_pos);
            let start = ranges[out] - sizes[out];
            let out_idx = (outer * sizes[out] + (axis_pos - start)) * inside + inner;
            outputs[out][out_idx] = value;
        }
    }

    outputs
        .into_iter()
        .zip(&plan.output_shapes)
        .map(|(data, shape)| Tensor::new(shape.clone(), data).map(TensorValue::from))
        .collect()
}

/// Host split with a runtime `split` input.
#[derive(Debug, Clone)]
pub struct SplitTrainingKernel {
    axis: i64,
    num_outputs: usize,
}

impl SplitTrainingKernel {
    pub fn new(info: &KernelInfo) -> Result<Self> {
        if info.num_outputs == 0 {
            return Err(QuantRnnError::attribute(
                "num_outputs",
                "split needs at least one output",
            ));
        }
        Ok(Self {
            axis: info.attributes.int_or("axis", 0)?,
            num_outputs: info.num_outputs,
        })
    }
}

impl OpKernel for SplitTrainingKernel {
    fn op_type(&self) -> &'static str {
        "SplitTraining"
    }

    fn compute(&self, inputs: &OpInputs) -> Result<Vec<TensorValue>> {
        let input = inputs
            .get(0)
            .ok_or_else(|| QuantRnnError::MissingInput("input".to_string()))?;
        let split = inputs.required::<i64>(1, "split")?;
        if split.rank() != 1 {
            return Err(QuantRnnError::input(
                "split",
                "split tensor must be a vector tensor",
            ));
        }

        let plan = SplitPlan::new(input.shape(), self.axis, self.num_outputs, split.data())?;
        debug!(
            axis = plan.axis,
            outputs = self.num_outputs,
            inline_args = self.num_outputs <= INLINE_ARG_CAPACITY,
            element_size = input.element_size(),
            "split"
        );

        match input {
            TensorValue::F32(t) => split_typed(t, &plan),
            TensorValue::U8(t) => split_typed(t, &plan),
            TensorValue::I8(t) => split_typed(t, &plan),
            TensorValue::I32(t) => split_typed(t, &plan),
            TensorValue::I64(t) => split_typed(t, &plan),
        }
    }
}
