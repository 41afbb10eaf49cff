//! Central error types for quant-rnn.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantRnnError {
    #[error("Shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Type mismatch for {name}: expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid attribute '{name}': {reason}")]
    InvalidAttribute { name: String, reason: String },

    #[error("Missing required input '{0}'")]
    MissingInput(String),

    #[error("Invalid input '{name}': {reason}")]
    InvalidInput { name: String, reason: String },

    #[error("No kernel registered for {domain}::{name} (version {version})")]
    UnknownOperator {
        domain: String,
        name: String,
        version: u32,
    },

    #[error("Cannot quantize buffer: {0}")]
    Quantization(String),

    #[error(
        "Numeric mismatch in {tensor}[{index}]: expected {expected}, got {actual} (delta {delta})"
    )]
    NumericMismatch {
        tensor: String,
        index: usize,
        expected: f32,
        actual: f32,
        delta: f32,
    },
}

impl QuantRnnError {
    pub(crate) fn attribute(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn input(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QuantRnnError>;
