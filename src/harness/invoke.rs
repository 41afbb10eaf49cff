//! Builder for a single operator invocation through the registry.

use crate::errors::Result;
use crate::ops::{AttributeValue, Attributes, KernelInfo, KernelRegistry, OpInputs};
use crate::tensor::TensorValue;
use std::collections::BTreeMap;
use tracing::debug;

/// One node: attributes, positional inputs (some marked constant) and the
/// number of outputs.
#[derive(Debug, Clone)]
pub struct OpInvocation {
    domain: String,
    op_type: String,
    version: u32,
    attributes: Attributes,
    inputs: Vec<Option<TensorValue>>,
    initializers: BTreeMap<usize, TensorValue>,
    num_outputs: usize,
}

impl OpInvocation {
    pub fn new(domain: &str, op_type: &str, version: u32) -> Self {
        Self {
            domain: domain.to_string(),
            op_type: op_type.to_string(),
            version,
            attributes: Attributes::new(),
            inputs: Vec::new(),
            initializers: BTreeMap::new(),
            num_outputs: 0,
        }
    }

    pub fn attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.set(name, value);
        self
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn input(self, value: impl Into<TensorValue>) -> Self {
        self.input_with(value, false)
    }

    /// Add an input; a constant one is also handed to the kernel at
    /// construction.
    pub fn input_with(mut self, value: impl Into<TensorValue>, is_initializer: bool) -> Self {
        let value = value.into();
        if is_initializer {
            self.initializers.insert(self.inputs.len(), value.clone());
        }
        self.inputs.push(Some(value));
        self
    }

    pub fn optional_input(self, value: Option<impl Into<TensorValue>>) -> Self {
        match value {
            Some(v) => self.input(v),
            None => self.missing_input(),
        }
    }

    pub fn missing_input(mut self) -> Self {
        self.inputs.push(None);
        self
    }

    pub fn num_outputs(mut self, num_outputs: usize) -> Self {
        self.num_outputs = num_outputs;
        self
    }

    pub fn kernel_info(&self) -> KernelInfo {
        KernelInfo {
            attributes: self.attributes.clone(),
            initializers: self.initializers.clone(),
            num_outputs: self.num_outputs,
        }
    }

    /// Create the kernel and run it once.
    pub fn run(&self, registry: &KernelRegistry) -> Result<Vec<TensorValue>> {
        let kernel = registry.create(&self.domain, &self.op_type, self.version, &self.kernel_info())?;
        let inputs: OpInputs = self.inputs.iter().cloned().collect();
        debug!(
            op_type = kernel.op_type(),
            inputs = inputs.len(),
            constants = self.initializers.len(),
            "running operator"
        );
        kernel.compute(&inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::MS_DOMAIN;
    use crate::tensor::Tensor;

    #[test]
    fn initializers_are_indexed_by_position() {
        let inv = OpInvocation::new(MS_DOMAIN, "SplitTraining", 1)
            .input(Tensor::from_vec(vec![1.0f32, 2.0]))
            .missing_input()
            .input_with(Tensor::from_vec(vec![1i64, 1]), true)
            .num_outputs(2);
        let info = inv.kernel_info();
        assert_eq!(info.initializers.keys().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(info.num_outputs, 2);
    }

    #[test]
    fn runs_split_through_registry() {
        let outputs = OpInvocation::new(MS_DOMAIN, "SplitTraining", 1)
            .attribute("axis", 0i64)
            .input(Tensor::from_vec(vec![1.0f32, 2.0, 3.0]))
            .input(Tensor::from_vec(vec![1i64, 2]))
            .num_outputs(2)
            .run(&KernelRegistry::default_registry())
            .unwrap();
        assert_eq!(outputs[1], TensorValue::from(Tensor::from_vec(vec![2.0f32, 3.0])));
    }
}
