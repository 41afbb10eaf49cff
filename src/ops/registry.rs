//! Kernel registry: (domain, op type, version) → kernel factory.
//!
//! - Built-in: `LSTM` (opset 7), `DynamicQuantizeLSTM` and `SplitTraining`
//!   (contrib domain, version 1).
//! - Lookup picks the newest registration whose since-version does not exceed
//!   the requested version.

use super::{
    DynamicQuantizeLstmKernel, KernelInfo, LstmKernel, OpKernel, SplitTrainingKernel,
    MS_DOMAIN, ONNX_DOMAIN,
};
use crate::errors::{QuantRnnError, Result};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Builds a kernel from its construction-time info.
pub type KernelFactory = fn(&KernelInfo) -> Result<Box<dyn OpKernel>>;

/// Registry key without version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpKey {
    pub domain: String,
    pub op_type: String,
}

impl OpKey {
    pub fn new(domain: &str, op_type: &str) -> Self {
        Self {
            domain: domain.to_string(),
            op_type: op_type.to_string(),
        }
    }
}

/// Registry of kernel factories.
#[derive(Clone, Default)]
pub struct KernelRegistry {
    entries: HashMap<OpKey, BTreeMap<u32, KernelFactory>>,
}

impl KernelRegistry {
    /// New empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry with the built-in kernels.
    pub fn default_registry() -> Self {
        let mut r = Self::new();
        r.register(ONNX_DOMAIN, "LSTM", 7, |info| {
            Ok(Box::new(LstmKernel::new(info)?))
        });
        r.register(MS_DOMAIN, "DynamicQuantizeLSTM", 1, |info| {
            Ok(Box::new(DynamicQuantizeLstmKernel::new(info)?))
        });
        r.register(MS_DOMAIN, "SplitTraining", 1, |info| {
            Ok(Box::new(SplitTrainingKernel::new(info)?))
        });
        r
    }

    /// Register a factory. Overwrites an existing entry with the same since-version.
    pub fn register(
        &mut self,
        domain: &str,
        op_type: &str,
        since_version: u32,
        factory: KernelFactory,
    ) {
        self.entries
            .entry(OpKey::new(domain, op_type))
            .or_default()
            .insert(since_version, factory);
    }

    /// Find the factory serving `version`.
    pub fn resolve(&self, domain: &str, op_type: &str, version: u32) -> Result<(u32, KernelFactory)> {
        self.entries
            .get(&OpKey::new(domain, op_type))
            .and_then(|versions| versions.range(..=version).next_back())
            .map(|(&since, &factory)| (since, factory))
            .ok_or_else(|| QuantRnnError::UnknownOperator {
                domain: domain.to_string(),
                name: op_type.to_string(),
                version,
            })
    }

    /// Resolve and construct a kernel.
    pub fn create(
        &self,
        domain: &str,
        op_type: &str,
        version: u32,
        info: &KernelInfo,
    ) -> Result<Box<dyn OpKernel>> {
        let (since, factory) = self.resolve(domain, op_type, version)?;
        debug!(
            domain,
            op_type,
            version,
            since,
            initializers = info.initializers.len(),
            "creating kernel"
        );
        factory(info)
    }

    /// All registered (key, since-version) pairs, sorted.
    pub fn list(&self) -> Vec<(OpKey, u32)> {
        let mut out: Vec<(OpKey, u32)> = self
            .entries
            .iter()
            .flat_map(|(key, versions)| versions.keys().map(move |&v| (key.clone(), v)))
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OpInputs;
    use crate::tensor::TensorValue;

    struct Fixed(&'static str);

    impl OpKernel for Fixed {
        fn op_type(&self) -> &'static str {
            self.0
        }

        fn compute(&self, _inputs: &OpInputs) -> Result<Vec<TensorValue>> {
            Ok(vec![])
        }
    }

    #[test]
    fn default_registry_has_builtins() {
        let reg = KernelRegistry::default_registry();
        assert!(reg.resolve(ONNX_DOMAIN, "LSTM", 7).is_ok());
        assert!(reg.resolve(ONNX_DOMAIN, "LSTM", 14).is_ok());
        assert!(reg.resolve(MS_DOMAIN, "DynamicQuantizeLSTM", 1).is_ok());
        assert!(reg.resolve(MS_DOMAIN, "SplitTraining", 1).is_ok());
        assert_eq!(reg.list().len(), 3);
    }

    #[test]
    fn unknown_operator_fails() {
        let reg = KernelRegistry::default_registry();
        assert!(matches!(
            reg.resolve(ONNX_DOMAIN, "GRU", 7),
            Err(QuantRnnError::UnknownOperator { .. })
        ));
        // registered, but only from version 7 on
        assert!(reg.resolve(ONNX_DOMAIN, "LSTM", 6).is_err());
        // right name, wrong domain
        assert!(reg.resolve(ONNX_DOMAIN, "DynamicQuantizeLSTM", 1).is_err());
    }

    #[test]
    fn picks_newest_version_not_above_request() {
        let mut reg = KernelRegistry::new();
        reg.register("test", "Op", 1, |_| Ok(Box::new(Fixed("v1"))));
        reg.register("test", "Op", 5, |_| Ok(Box::new(Fixed("v5"))));

        let info = KernelInfo::default();
        assert_eq!(reg.create("test", "Op", 4, &info).unwrap().op_type(), "v1");
        assert_eq!(reg.create("test", "Op", 5, &info).unwrap().op_type(), "v5");
        assert_eq!(reg.create("test", "Op", 9, &info).unwrap().op_type(), "v5");
    }
}
