//! Float inputs of one LSTM case and the attributes both operators share.

use super::config::LstmCaseConfig;
use super::random::RandomValueGenerator;
use crate::ops::{Attributes, Direction};
use crate::tensor::Tensor;

/// Full-precision inputs in the float LSTM layout (`W [dirs, 4H, I]`,
/// `R [dirs, 4H, H]`).
#[derive(Debug, Clone, PartialEq)]
pub struct LstmCaseInputs {
    pub x: Tensor<f32>,
    pub w: Tensor<f32>,
    pub r: Tensor<f32>,
    pub b: Option<Tensor<f32>>,
    pub initial_h: Tensor<f32>,
    pub initial_c: Tensor<f32>,
    pub p: Option<Tensor<f32>>,
}

impl LstmCaseInputs {
    /// Draw every input from `N(0, std_dev²)` in the fixed order
    /// X, W, R, B, initial_h, initial_c, P.
    pub fn generate(rng: &mut RandomValueGenerator, config: &LstmCaseConfig, std_dev: f32) -> Self {
        let dirs = config.num_directions();
        let h = config.hidden_size;
        let mut draw = |shape: &[usize]| rng.gaussian(shape, 0.0, std_dev);

        let x = draw(&[config.seq_len, config.batch_size, config.input_size]);
        let w = draw(&[dirs, 4 * h, config.input_size]);
        let r = draw(&[dirs, 4 * h, h]);
        let b = config.has_bias.then(|| draw(&[dirs, 8 * h]));
        let initial_h = draw(&[dirs, config.batch_size, h]);
        let initial_c = draw(&[dirs, config.batch_size, h]);
        let p = config.has_peephole.then(|| draw(&[dirs, 3 * h]));

        Self {
            x,
            w,
            r,
            b,
            initial_h,
            initial_c,
            p,
        }
    }
}

/// Attributes of the case's LSTM node, with the activations spelled out.
pub fn lstm_attributes(direction: Direction, hidden_size: usize) -> Attributes {
    let activations: Vec<&str> = ["sigmoid", "tanh", "tanh"]
        .iter()
        .copied()
        .cycle()
        .take(3 * direction.num_directions())
        .collect();
    Attributes::new()
        .with("activations", activations)
        .with("direction", direction.as_str())
        .with("hidden_size", hidden_size as i64)
        .with("input_forget", 0i64)
}
