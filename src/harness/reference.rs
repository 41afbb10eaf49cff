//! Float reference for the quantized LSTM.
//!
//! The float `LSTM` runs on activations that carry the same quantization
//! noise the quantized kernel introduces: `X` as one `u8` group, `initial_h`
//! per direction. Weights are full precision unless the case asks for QDQ'd
//! weights.

use super::case::{lstm_attributes, LstmCaseInputs};
use super::config::ReferenceWeights;
use super::invoke::OpInvocation;
use crate::errors::Result;
use crate::ops::lstm::LstmOutputs;
use crate::ops::{Direction, KernelRegistry, ONNX_DOMAIN};
use crate::quantization::{apply_qdq, WeightType};
use crate::tensor::Tensor;

/// QDQ with the element type picked at runtime.
pub fn apply_qdq_as(
    weight_type: WeightType,
    values: &[f32],
    num_directions: usize,
) -> Result<Vec<f32>> {
    match weight_type {
        WeightType::I8 => apply_qdq::<i8>(values, num_directions),
        WeightType::U8 => apply_qdq::<u8>(values, num_directions),
    }
}

fn qdq_tensor(
    tensor: &Tensor<f32>,
    weight_type: WeightType,
    num_directions: usize,
) -> Result<Tensor<f32>> {
    Tensor::new(
        tensor.shape().to_vec(),
        apply_qdq_as(weight_type, tensor.data(), num_directions)?,
    )
}

/// Run `LSTM` v7 through `registry` on the case inputs.
pub fn compute_reference(
    registry: &KernelRegistry,
    inputs: &LstmCaseInputs,
    direction: Direction,
    hidden_size: usize,
    weight_type: WeightType,
    weights: ReferenceWeights,
) -> Result<LstmOutputs> {
    let dirs = direction.num_directions();

    let x = qdq_tensor(&inputs.x, WeightType::U8, 1)?;
    let initial_h = qdq_tensor(&inputs.initial_h, WeightType::U8, dirs)?;
    let (w, r) = match weights {
        ReferenceWeights::FullPrecision => (inputs.w.clone(), inputs.r.clone()),
        ReferenceWeights::QuantizeDequantize => (
            qdq_tensor(&inputs.w, weight_type, dirs)?,
            qdq_tensor(&inputs.r, weight_type, dirs)?,
        ),
    };

    let outputs = OpInvocation::new(ONNX_DOMAIN, "LSTM", 7)
        .attributes(lstm_attributes(direction, hidden_size))
        .input(x)
        .input(w)
        .input(r)
        .optional_input(inputs.b.clone())
        .missing_input()
        .input(initial_h)
        .input(inputs.initial_c.clone())
        .optional_input(inputs.p.clone())
        .num_outputs(3)
        .run(registry)?;
    LstmOutputs::from_values(outputs)
}
