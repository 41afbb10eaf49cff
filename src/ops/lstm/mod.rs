//! LSTM operators: the float kernel (`LSTM`) and the dynamically quantized
//! kernel (`DynamicQuantizeLSTM`).
//!
//! Both share attribute parsing, input validation and the cell recurrence in
//! [`cell`]; they differ only in how gate projections `x·Wᵀ` and `h·Rᵀ` are
//! computed.

pub mod activation;
pub mod cell;
pub mod float;
pub mod quantized;

pub use activation::Activation;
pub use cell::LstmOutputs;
pub use float::LstmKernel;
pub use quantized::DynamicQuantizeLstmKernel;

use super::{Attributes, OpInputs};
use crate::errors::{QuantRnnError, Result};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Input positions shared by both LSTM variants.
pub mod input {
    pub const X: usize = 0;
    pub const W: usize = 1;
    pub const R: usize = 2;
    pub const B: usize = 3;
    pub const SEQUENCE_LENS: usize = 4;
    pub const INITIAL_H: usize = 5;
    pub const INITIAL_C: usize = 6;
    pub const P: usize = 7;
    pub const W_SCALE: usize = 8;
    pub const W_ZERO_POINT: usize = 9;
    pub const R_SCALE: usize = 10;
    pub const R_ZERO_POINT: usize = 11;
}

/// Number of gates per hidden unit (i, o, f, c).
pub const NUM_GATES: usize = 4;

/// Processing direction of the recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
    Bidirectional,
}

impl Direction {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "forward" => Ok(Direction::Forward),
            "reverse" => Ok(Direction::Reverse),
            "bidirectional" => Ok(Direction::Bidirectional),
            other => Err(QuantRnnError::attribute(
                "direction",
                format!("unknown direction '{}'", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
            Direction::Bidirectional => "bidirectional",
        }
    }

    pub fn num_directions(&self) -> usize {
        match self {
            Direction::Bidirectional => 2,
            _ => 1,
        }
    }

    /// Whether direction slot `dir` walks time backwards.
    pub fn is_reverse(&self, dir: usize) -> bool {
        match self {
            Direction::Forward => false,
            Direction::Reverse => true,
            Direction::Bidirectional => dir == 1,
        }
    }

    /// Default `[f, g, h]` activation names repeated per direction.
    pub fn default_activation_names(&self) -> Vec<String> {
        ["Sigmoid", "Tanh", "Tanh"]
            .iter()
            .cycle()
            .take(3 * self.num_directions())
            .map(|s| s.to_string())
            .collect()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed LSTM attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct LstmAttributes {
    pub hidden_size: usize,
    pub direction: Direction,
    /// `[f, g, h]` per direction.
    pub activations: Vec<Activation>,
    pub clip: Option<f32>,
    pub input_forget: bool,
}

impl LstmAttributes {
    pub fn from_attributes(attrs: &Attributes) -> Result<Self> {
        let hidden_size = attrs.required_int("hidden_size")?;
        if hidden_size <= 0 {
            return Err(QuantRnnError::attribute(
                "hidden_size",
                format!("must be positive, got {}", hidden_size),
            ));
        }

        let direction = Direction::parse(attrs.string("direction")?.unwrap_or("forward"))?;

        let mut names = attrs.strings("activations")?;
        if names.is_empty() {
            names = direction.default_activation_names();
        }
        if names.len() != 3 * direction.num_directions() {
            return Err(QuantRnnError::attribute(
                "activations",
                format!(
                    "expected {} activations for {} direction, got {}",
                    3 * direction.num_directions(),
                    direction,
                    names.len()
                ),
            ));
        }
        let activations = Activation::parse_list(
            &names,
            &attrs.floats("activation_alpha")?,
            &attrs.floats("activation_beta")?,
        )?;

        let clip = attrs.float("clip")?;
        if let Some(c) = clip {
            if !(c > 0.0) {
                return Err(QuantRnnError::attribute(
                    "clip",
                    format!("must be positive, got {}", c),
                ));
            }
        }

        let input_forget = match attrs.int_or("input_forget", 0)? {
            0 => false,
            1 => true,
            other => {
                return Err(QuantRnnError::attribute(
                    "input_forget",
                    format!("must be 0 or 1, got {}", other),
                ))
            }
        };

        Ok(Self {
            hidden_size: hidden_size as usize,
            direction,
            activations,
            clip,
            input_forget,
        })
    }

    pub fn num_directions(&self) -> usize {
        self.direction.num_directions()
    }

    /// `[f, g, h]` for direction slot `dir`.
    pub fn direction_activations(&self, dir: usize) -> [Activation; 3] {
        [
            self.activations[3 * dir],
            self.activations[3 * dir + 1],
            self.activations[3 * dir + 2],
        ]
    }
}

/// Problem sizes derived from `X` and the attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LstmDims {
    pub seq_len: usize,
    pub batch: usize,
    pub input_size: usize,
    pub hidden: usize,
    pub num_directions: usize,
}

impl LstmDims {
    #[inline]
    pub fn gates(&self) -> usize {
        NUM_GATES * self.hidden
    }

    /// `[num_directions, batch, hidden]`.
    pub fn state_shape(&self) -> Vec<usize> {
        vec![self.num_directions, self.batch, self.hidden]
    }
}

/// Validated float inputs common to both variants (everything except W and R).
pub(crate) struct StateInputs<'a> {
    pub x: &'a Tensor<f32>,
    pub bias: Option<&'a [f32]>,
    pub sequence_lens: Option<Vec<usize>>,
    pub initial_h: Option<&'a [f32]>,
    pub initial_c: Option<&'a [f32]>,
    pub peephole: Option<&'a [f32]>,
}

/// Validate `X`, `B`, `sequence_lens`, `initial_h`, `initial_c` and `P`.
pub(crate) fn state_inputs<'a>(
    attrs: &LstmAttributes,
    inputs: &'a OpInputs,
) -> Result<(LstmDims, StateInputs<'a>)> {
    let x = inputs.required::<f32>(input::X, "X")?;
    if x.rank() != 3 {
        return Err(QuantRnnError::input(
            "X",
            format!("expected rank 3 [seq_length, batch_size, input_size], got {:?}", x.shape()),
        ));
    }
    let dims = LstmDims {
        seq_len: x.shape()[0],
        batch: x.shape()[1],
        input_size: x.shape()[2],
        hidden: attrs.hidden_size,
        num_directions: attrs.num_directions(),
    };
    let dirs = dims.num_directions;
    let h = dims.hidden;

    let bias = inputs.optional::<f32>(input::B, "B")?;
    if let Some(b) = bias {
        b.expect_shape("B", &[dirs, 2 * NUM_GATES * h])?;
    }

    let sequence_lens = match inputs.optional::<i32>(input::SEQUENCE_LENS, "sequence_lens")? {
        None => None,
        Some(lens) => {
            lens.expect_shape("sequence_lens", &[dims.batch])?;
            let checked = lens
                .data()
                .iter()
                .map(|&l| {
                    usize::try_from(l)
                        .ok()
                        .filter(|&l| l <= dims.seq_len)
                        .ok_or_else(|| {
                            QuantRnnError::input(
                                "sequence_lens",
                                format!("length {} outside [0, {}]", l, dims.seq_len),
                            )
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            Some(checked)
        }
    };

    let state_shape = dims.state_shape();
    let initial_h = inputs.optional::<f32>(input::INITIAL_H, "initial_h")?;
    if let Some(t) = initial_h {
        t.expect_shape("initial_h", &state_shape)?;
    }
    let initial_c = inputs.optional::<f32>(input::INITIAL_C, "initial_c")?;
    if let Some(t) = initial_c {
        t.expect_shape("initial_c", &state_shape)?;
    }

    let peephole = inputs.optional::<f32>(input::P, "P")?;
    if let Some(p) = peephole {
        p.expect_shape("P", &[dirs, 3 * h])?;
    }

    Ok((
        dims,
        StateInputs {
            x,
            bias: bias.map(Tensor::data),
            sequence_lens,
            initial_h: initial_h.map(Tensor::data),
            initial_c: initial_c.map(Tensor::data),
            peephole: peephole.map(Tensor::data),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Attributes {
        Attributes::new().with("hidden_size", 3i64)
    }

    #[test]
    fn defaults() {
        let a = LstmAttributes::from_attributes(&base()).unwrap();
        assert_eq!(a.direction, Direction::Forward);
        assert_eq!(
            a.direction_activations(0),
            [Activation::Sigmoid, Activation::Tanh, Activation::Tanh]
        );
        assert_eq!(a.clip, None);
        assert!(!a.input_forget);
    }

    #[test]
    fn bidirectional_needs_six_activations() {
        let attrs = base()
            .with("direction", "bidirectional")
            .with("activations", vec!["sigmoid", "tanh", "tanh"]);
        assert!(LstmAttributes::from_attributes(&attrs).is_err());

        let attrs = base().with("direction", "bidirectional");
        let a = LstmAttributes::from_attributes(&attrs).unwrap();
        assert_eq!(a.activations.len(), 6);
        assert_eq!(a.num_directions(), 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(LstmAttributes::from_attributes(&Attributes::new()).is_err());
        assert!(LstmAttributes::from_attributes(&base().with("hidden_size", 0i64)).is_err());
        assert!(LstmAttributes::from_attributes(&base().with("direction", "sideways")).is_err());
        assert!(LstmAttributes::from_attributes(&base().with("clip", -1.0f32)).is_err());
        assert!(LstmAttributes::from_attributes(&base().with("input_forget", 2i64)).is_err());
    }

    #[test]
    fn reverse_slots() {
        assert!(!Direction::Forward.is_reverse(0));
        assert!(Direction::Reverse.is_reverse(0));
        assert!(!Direction::Bidirectional.is_reverse(0));
        assert!(Direction::Bidirectional.is_reverse(1));
    }
}
