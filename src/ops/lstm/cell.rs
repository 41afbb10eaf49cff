//! The LSTM recurrence shared by the float and quantized kernels.
//!
//! A kernel supplies the two matrix products through [`GateProjection`]; the
//! element-wise cell math, direction handling and `sequence_lens` masking
//! live here.

use super::{LstmAttributes, LstmDims, StateInputs};
use crate::errors::{QuantRnnError, Result};
use crate::kernels::ScratchBuffer;
use crate::tensor::{Tensor, TensorValue};

/// Gate blocks inside one `4 * hidden` row.
const GATE_I: usize = 0;
const GATE_O: usize = 1;
const GATE_F: usize = 2;
const GATE_C: usize = 3;

/// Peephole blocks inside one `3 * hidden` row.
const PEEP_I: usize = 0;
const PEEP_O: usize = 1;
const PEEP_F: usize = 2;

/// Computes the gate projections for one direction.
pub(crate) trait GateProjection {
    /// `out[seq * batch, 4H] = X · W[dir]ᵀ` for every time step at once.
    fn project_input(&self, dir: usize, out: &mut [f32]) -> Result<()>;

    /// `out[batch, 4H] += h · R[dir]ᵀ`.
    fn accumulate_hidden(&self, dir: usize, h: &[f32], out: &mut [f32]) -> Result<()>;
}

/// The three LSTM outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct LstmOutputs {
    /// `[seq, dirs, batch, hidden]`
    pub y: Tensor<f32>,
    /// `[dirs, batch, hidden]`
    pub y_h: Tensor<f32>,
    /// `[dirs, batch, hidden]`
    pub y_c: Tensor<f32>,
}

impl LstmOutputs {
    pub const NAMES: [&'static str; 3] = ["Y", "Y_h", "Y_c"];

    pub fn into_values(self) -> Vec<TensorValue> {
        vec![self.y.into(), self.y_h.into(), self.y_c.into()]
    }

    /// Rebuild from kernel outputs in `Y, Y_h, Y_c` order.
    pub fn from_values(values: Vec<TensorValue>) -> Result<Self> {
        let count = values.len();
        let mut it = values.into_iter();
        match (it.next(), it.next(), it.next(), it.next()) {
            (Some(y), Some(y_h), Some(y_c), None) => Ok(Self {
                y: y.typed::<f32>("Y")?.clone(),
                y_h: y_h.typed::<f32>("Y_h")?.clone(),
                y_c: y_c.typed::<f32>("Y_c")?.clone(),
            }),
            _ => Err(QuantRnnError::DimensionMismatch {
                expected: 3,
                actual: count,
            }),
        }
    }

    /// `(name, tensor)` pairs in output order.
    pub fn named(&self) -> [(&'static str, &Tensor<f32>); 3] {
        [
            (Self::NAMES[0], &self.y),
            (Self::NAMES[1], &self.y_h),
            (Self::NAMES[2], &self.y_c),
        ]
    }
}

#[inline]
fn clipped(x: f32, clip: Option<f32>) -> f32 {
    match clip {
        Some(c) => x.clamp(-c, c),
        None => x,
    }
}

/// Run every direction of the recurrence.
pub(crate) fn run_lstm<P: GateProjection>(
    attrs: &LstmAttributes,
    dims: LstmDims,
    state: &StateInputs<'_>,
    projection: &P,
) -> Result<LstmOutputs> {
    let LstmDims {
        seq_len,
        batch,
        hidden,
        num_directions,
        ..
    } = dims;
    let gates = dims.gates();
    let state_len = batch * hidden;

    let mut y = vec![0.0f32; seq_len * num_directions * state_len];
    let mut y_h = vec![0.0f32; num_directions * state_len];
    let mut y_c = vec![0.0f32; num_directions * state_len];

    let lengths: Vec<usize> = match &state.sequence_lens {
        Some(lens) => lens.clone(),
        None => vec![seq_len; batch],
    };

    for dir in 0..num_directions {
        let [f_act, g_act, h_act] = attrs.direction_activations(dir);
        let reverse = attrs.direction.is_reverse(dir);
        let state_range = dir * state_len..(dir + 1) * state_len;

        let mut h = ScratchBuffer::zeroed(state_len);
        let mut c = ScratchBuffer::zeroed(state_len);
        if let Some(init) = state.initial_h {
            h.copy_from_slice(&init[state_range.clone()]);
        }
        if let Some(init) = state.initial_c {
            c.copy_from_slice(&init[state_range.clone()]);
        }

        // Wb + Rb folded into one row.
        let bias: Option<Vec<f32>> = state.bias.map(|b| {
            let row = &b[dir * 2 * gates..(dir + 1) * 2 * gates];
            row[..gates]
                .iter()
                .zip(&row[gates..])
                .map(|(wb, rb)| wb + rb)
                .collect()
        });
        let peephole = state
            .peephole
            .map(|p| &p[dir * 3 * hidden..(dir + 1) * 3 * hidden]);

        let mut input_gates = ScratchBuffer::zeroed(seq_len * batch * gates);
        if !input_gates.is_empty() {
            projection.project_input(dir, &mut input_gates)?;
        }
        let mut step_gates = ScratchBuffer::zeroed(batch * gates);

        for step in 0..seq_len {
            let active: Vec<Option<usize>> = lengths
                .iter()
                .map(|&len| {
                    (step < len).then(|| if reverse { len - 1 - step } else { step })
                })
                .collect();
            if active.iter().all(Option::is_none) {
                break;
            }

            step_gates.clear();
            for (b, t) in active.iter().enumerate() {
                if let Some(t) = *t {
                    let src = (t * batch + b) * gates;
                    step_gates[b * gates..(b + 1) * gates]
                        .copy_from_slice(&input_gates[src..src + gates]);
                }
            }
            projection.accumulate_hidden(dir, &h, &mut step_gates)?;

            for (b, t) in active.iter().enumerate() {
                let Some(t) = *t else { continue };
                let row = &mut step_gates[b * gates..(b + 1) * gates];
                if let Some(bias) = &bias {
                    row.iter_mut().zip(bias).for_each(|(g, b)| *g += b);
                }

                for j in 0..hidden {
                    let s = b * hidden + j;
                    let c_prev = c[s];
                    let peep = |block: usize| peephole.map_or(0.0, |p| p[block * hidden + j]);

                    let i_gate = f_act.apply(clipped(
                        row[GATE_I * hidden + j] + peep(PEEP_I) * c_prev,
                        attrs.clip,
                    ));
                    let f_gate = if attrs.input_forget {
                        1.0 - i_gate
                    } else {
                        f_act.apply(clipped(
                            row[GATE_F * hidden + j] + peep(PEEP_F) * c_prev,
                            attrs.clip,
                        ))
                    };
                    let candidate = g_act.apply(clipped(row[GATE_C * hidden + j], attrs.clip));
                    let c_new = f_gate * c_prev + i_gate * candidate;
                    let o_gate = f_act.apply(clipped(
                        row[GATE_O * hidden + j] + peep(PEEP_O) * c_new,
                        attrs.clip,
                    ));
                    let h_new = o_gate * h_act.apply(c_new);

                    c[s] = c_new;
                    h[s] = h_new;
                    y[((t * num_directions + dir) * batch + b) * hidden + j] = h_new;
                }
            }
        }

        y_h[state_range.clone()].copy_from_slice(&h);
        y_c[state_range].copy_from_slice(&c);
    }

    Ok(LstmOutputs {
        y: Tensor::new(vec![seq_len, num_directions, batch, hidden], y)?,
        y_h: Tensor::new(dims.state_shape(), y_h)?,
        y_c: Tensor::new(dims.state_shape(), y_c)?,
    })
}
