//! Reference-comparison harness for the dynamically quantized LSTM.
//!
//! A case draws seeded Gaussian inputs, quantizes the weights, runs the float
//! `LSTM` on QDQ'd activations and the `DynamicQuantizeLSTM` kernel on the
//! quantized weights, and compares `Y`, `Y_h` and `Y_c` within a tolerance.

pub mod case;
pub mod compare;
pub mod config;
pub mod driver;
pub mod invoke;
pub mod random;
pub mod reference;

pub use case::{lstm_attributes, LstmCaseInputs};
pub use compare::{compare_lstm_outputs, compare_tensor, Mismatch, OutputComparison, TensorStats};
pub use config::{CaseShape, HarnessConfig, LstmCaseConfig, ReferenceWeights, Tolerance};
pub use driver::{
    build_quantized_case, run_case, run_sweep, CaseMatrix, CaseReport, CaseStage,
    QuantizedCaseWeights, SweepReport,
};
pub use invoke::OpInvocation;
pub use random::RandomValueGenerator;
pub use reference::{apply_qdq_as, compute_reference};
