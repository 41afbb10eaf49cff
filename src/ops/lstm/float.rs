//! Float `LSTM` kernel (ONNX opset 7).

use super::cell::{run_lstm, GateProjection};
use super::{input, state_inputs, LstmAttributes, LstmDims};
use crate::errors::Result;
use crate::kernels::gemm_f32_nt;
use crate::ops::{KernelInfo, OpInputs, OpKernel};
use crate::tensor::TensorValue;
use tracing::debug;

/// Full-precision LSTM. `W` is `[dirs, 4H, input]`, `R` is `[dirs, 4H, H]`.
#[derive(Debug, Clone)]
pub struct LstmKernel {
    attrs: LstmAttributes,
}

impl LstmKernel {
    pub fn new(info: &KernelInfo) -> Result<Self> {
        let attrs = LstmAttributes::from_attributes(&info.attributes)?;
        debug!(
            hidden_size = attrs.hidden_size,
            direction = %attrs.direction,
            "LSTM kernel ready"
        );
        Ok(Self { attrs })
    }

    pub fn attributes(&self) -> &LstmAttributes {
        &self.attrs
    }
}

struct FloatProjection<'a> {
    dims: LstmDims,
    x: &'a [f32],
    w: &'a [f32],
    r: &'a [f32],
}

impl GateProjection for FloatProjection<'_> {
    fn project_input(&self, dir: usize, out: &mut [f32]) -> Result<()> {
        let LstmDims {
            seq_len,
            batch,
            input_size,
            ..
        } = self.dims;
        let n = self.dims.gates();
        let w = &self.w[dir * n * input_size..(dir + 1) * n * input_size];
        gemm_f32_nt(self.x, w, out, seq_len * batch, input_size, n, false);
        Ok(())
    }

    fn accumulate_hidden(&self, dir: usize, h: &[f32], out: &mut [f32]) -> Result<()> {
        let hidden = self.dims.hidden;
        let n = self.dims.gates();
        let r = &self.r[dir * n * hidden..(dir + 1) * n * hidden];
        gemm_f32_nt(h, r, out, self.dims.batch, hidden, n, true);
        Ok(())
    }
}

impl OpKernel for LstmKernel {
    fn op_type(&self) -> &'static str {
        "LSTM"
    }

    fn compute(&self, inputs: &OpInputs) -> Result<Vec<TensorValue>> {
        let (dims, state) = state_inputs(&self.attrs, inputs)?;
        let gates = dims.gates();

        let w = inputs.required::<f32>(input::W, "W")?;
        w.expect_shape("W", &[dims.num_directions, gates, dims.input_size])?;
        let r = inputs.required::<f32>(input::R, "R")?;
        r.expect_shape("R", &[dims.num_directions, gates, dims.hidden])?;

        let projection = FloatProjection {
            dims,
            x: state.x.data(),
            w: w.data(),
            r: r.data(),
        };
        Ok(run_lstm(&self.attrs, dims, &state, &projection)?.into_values())
    }
}
