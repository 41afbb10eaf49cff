//! # quant-rnn
//!
//! Quantize/dequantize protocol and reference comparison for a dynamically
//! quantized LSTM operator.
//!
//! ## Architecture
//!
//! - **Quantization**: min/max (scale, zero-point) estimation, round-half-even
//!   linear quantization, QDQ round trips and per-direction weight quantization
//! - **Kernels**: row-parallel float GEMM and `u8 x {u8, i8}` integer GEMM
//! - **Operators**: float `LSTM`, `DynamicQuantizeLSTM` with weight prepacking,
//!   `SplitTraining`, behind a versioned kernel registry
//! - **Harness**: seeded case generation, float reference on QDQ'd
//!   activations, tolerance comparison and the configuration sweep

pub mod errors;
pub mod harness;
pub mod kernels;
pub mod ops;
pub mod quantization;
pub mod tensor;

pub use errors::{QuantRnnError, Result};
pub use harness::{
    compute_reference, run_case, run_sweep, CaseMatrix, CaseReport, CaseStage, HarnessConfig,
    LstmCaseConfig, RandomValueGenerator, ReferenceWeights, Tolerance,
};
pub use ops::lstm::LstmOutputs;
pub use ops::{KernelInfo, KernelRegistry, OpInputs, OpKernel};
pub use quantization::{
    apply_qdq, estimate_params, quantize_weight, QuantParams, QuantType, QuantizedWeight,
    WeightType,
};
pub use tensor::{Tensor, TensorValue};
