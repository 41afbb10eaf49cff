//! Harness configuration: case shapes, seeds and tolerances.
//!
//! Defaults reproduce the built-in sweep. `HarnessConfig::load_from_env`
//! layers a JSON file (`QUANT_RNN_CONFIG`) and a seed override
//! (`QUANT_RNN_SEED`) on top.

use crate::ops::Direction;
use crate::quantization::WeightType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "QUANT_RNN_CONFIG";
/// Environment variable overriding the seed.
pub const SEED_ENV: &str = "QUANT_RNN_SEED";

/// Element-wise closeness bound: `|actual - expected| <= abs + rel * |expected|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub abs: f32,
    pub rel: f32,
}

impl Tolerance {
    /// Reference on full-precision weights: the bound absorbs weight
    /// quantization error.
    pub const FULL_PRECISION_WEIGHTS: Tolerance = Tolerance { abs: 2e-2, rel: 0.0 };
    /// Reference on QDQ'd weights: only float summation order differs.
    pub const QDQ_WEIGHTS: Tolerance = Tolerance {
        abs: 1e-4,
        rel: 1e-4,
    };

    pub fn new(abs: f32, rel: f32) -> Self {
        Self { abs, rel }
    }

    #[inline]
    pub fn bound(&self, expected: f32) -> f32 {
        self.abs + self.rel * expected.abs()
    }

    /// NaN on either side never passes.
    #[inline]
    pub fn allows(&self, expected: f32, actual: f32) -> bool {
        (actual - expected).abs() <= self.bound(expected)
    }
}

/// Which weights the float reference runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceWeights {
    /// Original float `W`/`R`.
    #[default]
    FullPrecision,
    /// `W`/`R` passed through quantize-dequantize with the case's weight type.
    QuantizeDequantize,
}

impl ReferenceWeights {
    pub fn default_tolerance(&self) -> Tolerance {
        match self {
            ReferenceWeights::FullPrecision => Tolerance::FULL_PRECISION_WEIGHTS,
            ReferenceWeights::QuantizeDequantize => Tolerance::QDQ_WEIGHTS,
        }
    }
}

/// `(input_size, batch_size, hidden_size)` of a sweep entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseShape {
    pub input_size: usize,
    pub batch_size: usize,
    pub hidden_size: usize,
}

impl CaseShape {
    pub const fn new(input_size: usize, batch_size: usize, hidden_size: usize) -> Self {
        Self {
            input_size,
            batch_size,
            hidden_size,
        }
    }
}

/// One quantized-LSTM comparison case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmCaseConfig {
    pub input_size: usize,
    pub batch_size: usize,
    pub hidden_size: usize,
    #[serde(default = "default_seq_len")]
    pub seq_len: usize,
    pub direction: Direction,
    pub weight_type: WeightType,
    pub has_bias: bool,
    pub has_peephole: bool,
    pub weights_are_initializers: bool,
    #[serde(default)]
    pub reference_weights: ReferenceWeights,
    /// Overrides the mode's default tolerance.
    #[serde(default)]
    pub tolerance: Option<Tolerance>,
}

fn default_seq_len() -> usize {
    1
}

impl LstmCaseConfig {
    /// Forward, no bias or peephole, runtime weights, single step.
    pub fn new(shape: CaseShape, weight_type: WeightType) -> Self {
        Self {
            input_size: shape.input_size,
            batch_size: shape.batch_size,
            hidden_size: shape.hidden_size,
            seq_len: default_seq_len(),
            direction: Direction::Forward,
            weight_type,
            has_bias: false,
            has_peephole: false,
            weights_are_initializers: false,
            reference_weights: ReferenceWeights::default(),
            tolerance: None,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_bias_and_peephole(mut self, enabled: bool) -> Self {
        self.has_bias = enabled;
        self.has_peephole = enabled;
        self
    }

    pub fn with_initializers(mut self, enabled: bool) -> Self {
        self.weights_are_initializers = enabled;
        self
    }

    pub fn with_reference_weights(mut self, mode: ReferenceWeights) -> Self {
        self.reference_weights = mode;
        self
    }

    pub fn num_directions(&self) -> usize {
        self.direction.num_directions()
    }

    /// Effective tolerance: the override, else the mode's default.
    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
            .unwrap_or_else(|| self.reference_weights.default_tolerance())
    }

    /// Short human-readable case name.
    pub fn label(&self) -> String {
        format!(
            "I{}_B{}_H{}_{}_{}{}{}",
            self.input_size,
            self.batch_size,
            self.hidden_size,
            self.direction,
            self.weight_type,
            if self.has_bias || self.has_peephole {
                "_bias_p"
            } else {
                ""
            },
            if self.weights_are_initializers {
                "_prepacked"
            } else {
                ""
            },
        )
    }
}

/// Top-level harness settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub seed: u64,
    /// Standard deviation of every generated tensor (mean is 0).
    pub std_dev: f32,
    pub shapes: Vec<CaseShape>,
    pub reference_weights: ReferenceWeights,
    pub tolerance: Option<Tolerance>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            std_dev: 0.25,
            shapes: vec![CaseShape::new(2, 3, 2)],
            reference_weights: ReferenceWeights::default(),
            tolerance: None,
        }
    }
}

impl HarnessConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid harness config JSON")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading harness config {}", path.display()))?;
        Self::from_json(&content)
    }

    /// Defaults, then the file named by `QUANT_RNN_CONFIG`, then `QUANT_RNN_SEED`.
    /// An unreadable file or unparsable seed is logged and ignored.
    pub fn load_from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            match Self::from_file(&path) {
                Ok(loaded) => config = loaded,
                Err(e) => warn!(path = %path, error = %e, "ignoring harness config"),
            }
        }
        if let Ok(seed) = std::env::var(SEED_ENV) {
            match seed.trim().parse() {
                Ok(seed) => config.seed = seed,
                Err(_) => warn!(value = %seed, "ignoring non-numeric {}", SEED_ENV),
            }
        }
        config
    }

    /// Every case of the sweep, shape by shape.
    pub fn cases(&self) -> Vec<LstmCaseConfig> {
        self.shapes
            .iter()
            .flat_map(|&shape| {
                super::CaseMatrix::for_shape(shape)
                    .into_iter()
                    .map(|case| LstmCaseConfig {
                        reference_weights: self.reference_weights,
                        tolerance: self.tolerance,
                        ..case
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_bound_mixes_abs_and_rel() {
        let tol = Tolerance::new(0.1, 0.5);
        assert!(tol.allows(2.0, 3.1));
        assert!(!tol.allows(2.0, 3.2));
        assert!(!tol.allows(0.0, f32::NAN));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = HarnessConfig::from_json(r#"{ "seed": 7 }"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.std_dev, 0.25);
        assert_eq!(config.shapes, vec![CaseShape::new(2, 3, 2)]);
    }

    #[test]
    fn json_round_trip() {
        let config = HarnessConfig {
            reference_weights: ReferenceWeights::QuantizeDequantize,
            tolerance: Some(Tolerance::new(1e-3, 0.0)),
            ..HarnessConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("quantize_dequantize"));
        assert_eq!(HarnessConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn case_tolerance_follows_mode_unless_overridden() {
        let case = LstmCaseConfig::new(CaseShape::new(2, 3, 2), WeightType::I8);
        assert_eq!(case.tolerance(), Tolerance::FULL_PRECISION_WEIGHTS);
        let case = case.with_reference_weights(ReferenceWeights::QuantizeDequantize);
        assert_eq!(case.tolerance(), Tolerance::QDQ_WEIGHTS);
        let case = LstmCaseConfig {
            tolerance: Some(Tolerance::new(0.5, 0.0)),
            ..case
        };
        assert_eq!(case.tolerance().abs, 0.5);
    }

    #[test]
    fn sweep_has_sixteen_cases_per_shape() {
        let config = HarnessConfig {
            shapes: vec![CaseShape::new(2, 3, 2), CaseShape::new(3, 2, 4)],
            ..HarnessConfig::default()
        };
        let cases = config.cases();
        assert_eq!(cases.len(), 32);
        assert!(cases
            .iter()
            .all(|c| c.reference_weights == ReferenceWeights::FullPrecision));
    }

    #[test]
    fn label_names_the_axes() {
        let case = LstmCaseConfig::new(CaseShape::new(2, 3, 2), WeightType::U8)
            .with_direction(Direction::Bidirectional)
            .with_bias_and_peephole(true)
            .with_initializers(true);
        assert_eq!(case.label(), "I2_B3_H2_bidirectional_u8_bias_p_prepacked");
    }
}
