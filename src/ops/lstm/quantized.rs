//! `DynamicQuantizeLSTM` (contrib domain, version 1).
//!
//! Weights arrive already quantized in the transposed layout: `W` is
//! `[dirs, input, 4H]` and `R` is `[dirs, H, 4H]`, both `u8` or `i8`, with one
//! scale and zero-point per direction. Activations are quantized to `u8` on the
//! fly: `X` once over the whole tensor, the hidden state per direction at every
//! step.

use super::cell::{run_lstm, GateProjection};
use super::{input, state_inputs, LstmAttributes, LstmDims};
use crate::errors::{QuantRnnError, Result};
use crate::kernels::{qgemm_u8, ActivationQuant, PackedWeight, WeightQuant};
use crate::ops::{KernelInfo, OpInputs, OpKernel};
use crate::quantization::{estimate_params, quantize_linear, QuantType, WeightType};
use crate::tensor::{Tensor, TensorValue};
use tracing::{debug, trace};

/// One quantized weight input packed per direction.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedWeights {
    pub weight_type: WeightType,
    pub directions: Vec<PackedWeight>,
}

impl PackedWeights {
    /// Pack a `[dirs, k, 4H]` quantized tensor.
    pub fn from_value(
        value: &TensorValue,
        name: &str,
        num_directions: usize,
        gates: usize,
    ) -> Result<Self> {
        match value {
            TensorValue::U8(t) => Self::pack_typed(t, name, num_directions, gates),
            TensorValue::I8(t) => Self::pack_typed(t, name, num_directions, gates),
            other => Err(QuantRnnError::TypeMismatch {
                name: name.to_string(),
                expected: "u8 or i8",
                actual: other.type_name(),
            }),
        }
    }

    fn pack_typed<Q: QuantType>(
        tensor: &Tensor<Q>,
        name: &str,
        num_directions: usize,
        gates: usize,
    ) -> Result<Self> {
        let shape = tensor.shape();
        if shape.len() != 3 || shape[0] != num_directions || shape[2] != gates {
            return Err(QuantRnnError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![num_directions, shape.get(1).copied().unwrap_or(0), gates],
                actual: shape.to_vec(),
            });
        }
        let k = shape[1];
        let per_dir = k * gates;
        let data = tensor.data();
        let directions = (0..num_directions)
            .map(|dir| PackedWeight::pack(&data[dir * per_dir..(dir + 1) * per_dir], k, gates))
            .collect();
        Ok(Self {
            weight_type: Q::KIND,
            directions,
        })
    }

    /// Reduction depth (`input` for W, `H` for R).
    pub fn k(&self) -> usize {
        self.directions.first().map_or(0, PackedWeight::k)
    }
}

/// Reads per-direction scales and zero-points, checking the zero-point type
/// against the weight type.
fn weight_quant(
    inputs: &OpInputs,
    scale_index: usize,
    zero_point_index: usize,
    names: (&str, &str),
    weight_type: WeightType,
    num_directions: usize,
) -> Result<Vec<WeightQuant>> {
    let (scale_name, zp_name) = names;
    let scales = inputs.required::<f32>(scale_index, scale_name)?;
    scales.expect_shape(scale_name, &[num_directions])?;

    let zp_value = inputs
        .get(zero_point_index)
        .ok_or_else(|| QuantRnnError::MissingInput(zp_name.to_string()))?;
    let zero_points: Vec<i32> = match weight_type {
        WeightType::U8 => widen::<u8>(zp_value, zp_name, num_directions)?,
        WeightType::I8 => widen::<i8>(zp_value, zp_name, num_directions)?,
    };

    Ok(scales
        .data()
        .iter()
        .zip(zero_points)
        .map(|(&scale, zero_point)| WeightQuant { scale, zero_point })
        .collect())
}

fn widen<Q: QuantType>(value: &TensorValue, name: &str, num_directions: usize) -> Result<Vec<i32>> {
    let t = value.typed::<Q>(name)?;
    t.expect_shape(name, &[num_directions])?;
    Ok(t.data().iter().map(|&v| v.to_i32()).collect())
}

struct QuantizedProjection<'a> {
    dims: LstmDims,
    x: Vec<u8>,
    x_quant: ActivationQuant,
    w: &'a PackedWeights,
    w_quant: Vec<WeightQuant>,
    r: &'a PackedWeights,
    r_quant: Vec<WeightQuant>,
}

impl GateProjection for QuantizedProjection<'_> {
    fn project_input(&self, dir: usize, out: &mut [f32]) -> Result<()> {
        qgemm_u8(
            &self.x,
            self.x_quant,
            &self.w.directions[dir],
            self.w_quant[dir],
            out,
            self.dims.seq_len * self.dims.batch,
            false,
        );
        Ok(())
    }

    fn accumulate_hidden(&self, dir: usize, h: &[f32], out: &mut [f32]) -> Result<()> {
        if h.is_empty() {
            return Ok(());
        }
        let params = estimate_params::<u8>(h)?;
        let h_q = quantize_linear(h, params);
        trace!(
            direction = dir,
            scale = params.scale,
            zero_point = params.zero_point,
            "quantized hidden state"
        );
        qgemm_u8(
            &h_q,
            ActivationQuant {
                scale: params.scale,
                zero_point: params.zero_point,
            },
            &self.r.directions[dir],
            self.r_quant[dir],
            out,
            self.dims.batch,
            true,
        );
        Ok(())
    }
}

/// LSTM over 8-bit weights with dynamically quantized activations.
#[derive(Debug, Clone)]
pub struct DynamicQuantizeLstmKernel {
    attrs: LstmAttributes,
    packed_w: Option<PackedWeights>,
    packed_r: Option<PackedWeights>,
}

impl DynamicQuantizeLstmKernel {
    /// Parses attributes and prepacks `W` and `R` when they are initializers.
    pub fn new(info: &KernelInfo) -> Result<Self> {
        let attrs = LstmAttributes::from_attributes(&info.attributes)?;
        let dirs = attrs.num_directions();
        let gates = 4 * attrs.hidden_size;

        let packed_w = info
            .initializer(input::W)
            .map(|w| PackedWeights::from_value(w, "W", dirs, gates))
            .transpose()?;
        let packed_r = info
            .initializer(input::R)
            .map(|r| PackedWeights::from_value(r, "R", dirs, gates))
            .transpose()?;
        if let (Some(w), Some(r)) = (&packed_w, &packed_r) {
            check_same_type(w, r)?;
        }

        debug!(
            hidden_size = attrs.hidden_size,
            direction = %attrs.direction,
            prepacked_w = packed_w.is_some(),
            prepacked_r = packed_r.is_some(),
            "DynamicQuantizeLSTM kernel ready"
        );
        Ok(Self {
            attrs,
            packed_w,
            packed_r,
        })
    }

    pub fn attributes(&self) -> &LstmAttributes {
        &self.attrs
    }

    /// Whether `W` and `R` were packed at construction.
    pub fn is_prepacked(&self) -> (bool, bool) {
        (self.packed_w.is_some(), self.packed_r.is_some())
    }
}

fn check_same_type(w: &PackedWeights, r: &PackedWeights) -> Result<()> {
    if w.weight_type != r.weight_type {
        return Err(QuantRnnError::input(
            "R",
            format!(
                "element type {} differs from W element type {}",
                r.weight_type, w.weight_type
            ),
        ));
    }
    Ok(())
}

impl OpKernel for DynamicQuantizeLstmKernel {
    fn op_type(&self) -> &'static str {
        "DynamicQuantizeLSTM"
    }

    fn compute(&self, inputs: &OpInputs) -> Result<Vec<TensorValue>> {
        let (dims, state) = state_inputs(&self.attrs, inputs)?;
        let dirs = dims.num_directions;
        let gates = dims.gates();

        let packed_at_compute = |index: usize, name: &str| -> Result<PackedWeights> {
            let value = inputs
                .get(index)
                .ok_or_else(|| QuantRnnError::MissingInput(name.to_string()))?;
            PackedWeights::from_value(value, name, dirs, gates)
        };
        let w_owned;
        let w = match &self.packed_w {
            Some(w) => w,
            None => {
                w_owned = packed_at_compute(input::W, "W")?;
                &w_owned
            }
        };
        let r_owned;
        let r = match &self.packed_r {
            Some(r) => r,
            None => {
                r_owned = packed_at_compute(input::R, "R")?;
                &r_owned
            }
        };
        check_same_type(w, r)?;
        if w.k() != dims.input_size {
            return Err(QuantRnnError::ShapeMismatch {
                name: "W".to_string(),
                expected: vec![dirs, dims.input_size, gates],
                actual: vec![dirs, w.k(), gates],
            });
        }
        if r.k() != dims.hidden {
            return Err(QuantRnnError::ShapeMismatch {
                name: "R".to_string(),
                expected: vec![dirs, dims.hidden, gates],
                actual: vec![dirs, r.k(), gates],
            });
        }

        let w_quant = weight_quant(
            inputs,
            input::W_SCALE,
            input::W_ZERO_POINT,
            ("W_scale", "W_zero_point"),
            w.weight_type,
            dirs,
        )?;
        let r_quant = weight_quant(
            inputs,
            input::R_SCALE,
            input::R_ZERO_POINT,
            ("R_scale", "R_zero_point"),
            r.weight_type,
            dirs,
        )?;

        let x = state.x.data();
        let (x_q, x_quant) = if x.is_empty() {
            (
                Vec::new(),
                ActivationQuant {
                    scale: 1.0,
                    zero_point: 0,
                },
            )
        } else {
            let params = estimate_params::<u8>(x)?;
            (
                quantize_linear(x, params),
                ActivationQuant {
                    scale: params.scale,
                    zero_point: params.zero_point,
                },
            )
        };
        trace!(scale = x_quant.scale, zero_point = x_quant.zero_point, "quantized X");

        let projection = QuantizedProjection {
            dims,
            x: x_q,
            x_quant,
            w,
            w_quant,
            r,
            r_quant,
        };
        Ok(run_lstm(&self.attrs, dims, &state, &projection)?.into_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::lstm::LstmOutputs;
    use crate::ops::Attributes;
    use crate::quantization::quantize_weight;

    const H: usize = 2;
    const I: usize = 3;
    const BATCH: usize = 2;

    fn attrs() -> Attributes {
        Attributes::new().with("hidden_size", H as i64)
    }

    fn float_weights() -> (Vec<f32>, Vec<f32>) {
        let w = (0..4 * H * I).map(|i| (i as f32 * 0.41).sin() * 0.3).collect();
        let r = (0..4 * H * H).map(|i| (i as f32 * 0.29).cos() * 0.3).collect();
        (w, r)
    }

    fn inputs<Q: QuantType>(with_weights: bool) -> (OpInputs, TensorValue, TensorValue) {
        let (w, r) = float_weights();
        let wq = quantize_weight::<Q>(&w, 1, 4 * H, I).unwrap();
        let rq = quantize_weight::<Q>(&r, 1, 4 * H, H).unwrap();
        let w_value: TensorValue = wq.data_tensor().unwrap().into();
        let r_value: TensorValue = rq.data_tensor().unwrap().into();

        let x: Vec<f32> = (0..BATCH * I).map(|i| (i as f32 * 0.53).cos() * 0.4).collect();
        let mut inputs = OpInputs::new();
        inputs.push(Tensor::new(vec![1, BATCH, I], x).unwrap());
        if with_weights {
            inputs.push(w_value.clone()).push(r_value.clone());
        } else {
            inputs.push_missing().push_missing();
        }
        inputs
            .push_missing()
            .push_missing()
            .push_missing()
            .push_missing()
            .push_missing()
            .push(wq.scale_tensor())
            .push(wq.zero_point_tensor())
            .push(rq.scale_tensor())
            .push(rq.zero_point_tensor());
        (inputs, w_value, r_value)
    }

    #[test]
    fn prepacked_matches_runtime_weights() {
        let (runtime_inputs, w, r) = inputs::<i8>(true);
        let runtime = DynamicQuantizeLstmKernel::new(&KernelInfo::new(attrs())).unwrap();
        assert_eq!(runtime.is_prepacked(), (false, false));

        let info = KernelInfo::new(attrs())
            .with_initializer(input::W, w)
            .with_initializer(input::R, r);
        let prepacked = DynamicQuantizeLstmKernel::new(&info).unwrap();
        assert_eq!(prepacked.is_prepacked(), (true, true));
        let (without_weights, _, _) = inputs::<i8>(false);

        let a = runtime.compute(&runtime_inputs).unwrap();
        let b = prepacked.compute(&without_weights).unwrap();
        assert_eq!(a, b);
        let out = LstmOutputs::from_values(a).unwrap();
        assert_eq!(out.y.shape(), &[1, 1, BATCH, H]);
    }

    #[test]
    fn missing_runtime_weight_is_reported() {
        let (inputs, _, _) = inputs::<u8>(false);
        let kernel = DynamicQuantizeLstmKernel::new(&KernelInfo::new(attrs())).unwrap();
        assert!(matches!(
            kernel.compute(&inputs),
            Err(QuantRnnError::MissingInput(name)) if name == "W"
        ));
    }

    #[test]
    fn zero_point_type_must_match_weight_type() {
        let (mut inputs, _, _) = inputs::<u8>(true);
        let mut values: Vec<Option<TensorValue>> =
            (0..inputs.len()).map(|i| inputs.get(i).cloned()).collect();
        values[input::W_ZERO_POINT] = Some(Tensor::from_vec(vec![0i8]).into());
        inputs = values.into_iter().collect();

        let kernel = DynamicQuantizeLstmKernel::new(&KernelInfo::new(attrs())).unwrap();
        assert!(matches!(
            kernel.compute(&inputs),
            Err(QuantRnnError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn float_weights_are_rejected() {
        let w = Tensor::new(vec![1, I, 4 * H], vec![0.0f32; 4 * H * I]).unwrap();
        let info = KernelInfo::new(attrs()).with_initializer(input::W, w);
        assert!(matches!(
            DynamicQuantizeLstmKernel::new(&info),
            Err(QuantRnnError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn wrong_scale_length_is_rejected() {
        let (inputs, _, _) = inputs::<u8>(true);
        let mut values: Vec<Option<TensorValue>> =
            (0..inputs.len()).map(|i| inputs.get(i).cloned()).collect();
        values[input::R_SCALE] = Some(Tensor::from_vec(vec![0.1f32, 0.2]).into());
        let inputs: OpInputs = values.into_iter().collect();

        let kernel = DynamicQuantizeLstmKernel::new(&KernelInfo::new(attrs())).unwrap();
        assert!(matches!(
            kernel.compute(&inputs),
            Err(QuantRnnError::ShapeMismatch { .. })
        ));
    }
}
