//! Operators: the executable-kernel interface, its registry, and the kernels
//! shipped with the crate.
//!
//! A kernel is created once per node from a [`KernelInfo`] (attributes plus
//! any constant inputs, which it may prepack) and then run any number of
//! times against [`OpInputs`].

pub mod attributes;
pub mod lstm;
pub mod registry;
pub mod split;

pub use attributes::{AttributeValue, Attributes};
pub use lstm::{
    Activation, Direction, DynamicQuantizeLstmKernel, LstmAttributes, LstmKernel,
};
pub use registry::{KernelFactory, KernelRegistry, OpKey};
pub use split::{SplitTrainingKernel, INLINE_ARG_CAPACITY};

use crate::errors::{QuantRnnError, Result};
use crate::tensor::{Element, Tensor, TensorValue};
use std::collections::BTreeMap;

/// Default ONNX domain.
pub const ONNX_DOMAIN: &str = "";
/// Contrib-operator domain.
pub const MS_DOMAIN: &str = "com.microsoft";

/// An executable operator.
pub trait OpKernel: Send + Sync {
    /// Operator type name, for logs and errors.
    fn op_type(&self) -> &'static str;

    /// Run on `inputs`, returning outputs in declaration order.
    fn compute(&self, inputs: &OpInputs) -> Result<Vec<TensorValue>>;
}

/// Positional inputs; `None` marks an absent optional input.
#[derive(Debug, Clone, Default)]
pub struct OpInputs {
    values: Vec<Option<TensorValue>>,
}

impl OpInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: impl Into<TensorValue>) -> &mut Self {
        self.values.push(Some(value.into()));
        self
    }

    pub fn push_missing(&mut self) -> &mut Self {
        self.values.push(None);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Input at `index`, or `None` if absent or past the end.
    pub fn get(&self, index: usize) -> Option<&TensorValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn required<T: Element>(&self, index: usize, name: &str) -> Result<&Tensor<T>> {
        self.get(index)
            .ok_or_else(|| QuantRnnError::MissingInput(name.to_string()))?
            .typed(name)
    }

    pub fn optional<T: Element>(&self, index: usize, name: &str) -> Result<Option<&Tensor<T>>> {
        self.get(index).map(|v| v.typed(name)).transpose()
    }
}

impl FromIterator<Option<TensorValue>> for OpInputs {
    fn from_iter<I: IntoIterator<Item = Option<TensorValue>>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// What a kernel knows at construction time.
#[derive(Debug, Clone, Default)]
pub struct KernelInfo {
    pub attributes: Attributes,
    /// Constant inputs by position.
    pub initializers: BTreeMap<usize, TensorValue>,
    pub num_outputs: usize,
}

impl KernelInfo {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes,
            initializers: BTreeMap::new(),
            num_outputs: 0,
        }
    }

    pub fn with_initializer(mut self, index: usize, value: impl Into<TensorValue>) -> Self {
        self.initializers.insert(index, value.into());
        self
    }

    pub fn with_num_outputs(mut self, num_outputs: usize) -> Self {
        self.num_outputs = num_outputs;
        self
    }

    pub fn initializer(&self, index: usize) -> Option<&TensorValue> {
        self.initializers.get(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_input_is_distinct_from_zero_tensor() {
        let mut inputs = OpInputs::new();
        inputs
            .push(Tensor::from_vec(vec![0.0f32; 3]))
            .push_missing();
        assert!(inputs.optional::<f32>(0, "B").unwrap().is_some());
        assert!(inputs.optional::<f32>(1, "P").unwrap().is_none());
        assert!(inputs.optional::<f32>(7, "P").unwrap().is_none());
        assert!(matches!(
            inputs.required::<f32>(1, "P").unwrap_err(),
            QuantRnnError::MissingInput(_)
        ));
    }
}
