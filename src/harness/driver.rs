//! Quantized-LSTM case driver.
//!
//! Each case walks a fixed sequence of stages:
//!
//! `GenerateInputs -> QuantizeWeights -> BuildQuantizedCase -> RunReference
//!  -> RunQuantizedKernel -> Compare -> Pass | Fail`
//!
//! A failure before `Compare` is returned as an error whose context names the
//! stage. A numeric disagreement is not an error: the report records the
//! first offending element and `CaseReport::ensure_passed` turns it into one.

use super::case::{lstm_attributes, LstmCaseInputs};
use super::compare::{compare_lstm_outputs, OutputComparison};
use super::config::{CaseShape, HarnessConfig, LstmCaseConfig, Tolerance};
use super::invoke::OpInvocation;
use super::random::RandomValueGenerator;
use super::reference::compute_reference;
use crate::errors::QuantRnnError;
use crate::ops::lstm::LstmOutputs;
use crate::ops::{Direction, KernelRegistry, MS_DOMAIN};
use crate::quantization::{quantize_weight, QuantType, WeightType};
use crate::tensor::{Tensor, TensorValue};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Stage of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaseStage {
    GenerateInputs,
    QuantizeWeights,
    BuildQuantizedCase,
    RunReference,
    RunQuantizedKernel,
    Compare,
    Pass,
    Fail,
}

impl CaseStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStage::Pass | CaseStage::Fail)
    }
}

impl fmt::Display for CaseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The 8 configuration rows per weight type: (bias + peephole, constant
/// weights, direction).
pub struct CaseMatrix;

impl CaseMatrix {
    pub const ROWS: [(bool, bool, Direction); 8] = [
        (false, false, Direction::Forward),
        (false, false, Direction::Bidirectional),
        (false, true, Direction::Forward),
        (false, true, Direction::Bidirectional),
        (true, false, Direction::Forward),
        (true, false, Direction::Bidirectional),
        (true, true, Direction::Forward),
        (true, true, Direction::Bidirectional),
    ];

    /// All 16 cases for `shape`, `i8` first.
    pub fn for_shape(shape: CaseShape) -> Vec<LstmCaseConfig> {
        WeightType::ALL
            .into_iter()
            .flat_map(|weight_type| {
                Self::ROWS
                    .into_iter()
                    .map(move |(bias_and_peephole, initializers, direction)| {
                        LstmCaseConfig::new(shape, weight_type)
                            .with_bias_and_peephole(bias_and_peephole)
                            .with_initializers(initializers)
                            .with_direction(direction)
                    })
            })
            .collect()
    }
}

/// Quantized `W`/`R` with their side tensors, typed at runtime.
#[derive(Debug, Clone)]
pub struct QuantizedCaseWeights {
    pub w: TensorValue,
    pub w_scale: Tensor<f32>,
    pub w_zero_point: TensorValue,
    pub r: TensorValue,
    pub r_scale: Tensor<f32>,
    pub r_zero_point: TensorValue,
}

impl QuantizedCaseWeights {
    pub fn quantize(
        inputs: &LstmCaseInputs,
        config: &LstmCaseConfig,
    ) -> Result<Self, QuantRnnError> {
        match config.weight_type {
            WeightType::I8 => Self::quantize_typed::<i8>(inputs, config),
            WeightType::U8 => Self::quantize_typed::<u8>(inputs, config),
        }
    }

    fn quantize_typed<Q: QuantType>(
        inputs: &LstmCaseInputs,
        config: &LstmCaseConfig,
    ) -> Result<Self, QuantRnnError> {
        let dirs = config.num_directions();
        let gates = 4 * config.hidden_size;
        let w = quantize_weight::<Q>(inputs.w.data(), dirs, gates, config.input_size)?;
        let r = quantize_weight::<Q>(inputs.r.data(), dirs, gates, config.hidden_size)?;
        Ok(Self {
            w: w.data_tensor()?.into(),
            w_scale: w.scale_tensor(),
            w_zero_point: w.zero_point_tensor().into(),
            r: r.data_tensor()?.into(),
            r_scale: r.scale_tensor(),
            r_zero_point: r.zero_point_tensor().into(),
        })
    }
}

/// `DynamicQuantizeLSTM` node for a case.
pub fn build_quantized_case(
    inputs: &LstmCaseInputs,
    weights: &QuantizedCaseWeights,
    config: &LstmCaseConfig,
) -> OpInvocation {
    let constant = config.weights_are_initializers;
    OpInvocation::new(MS_DOMAIN, "DynamicQuantizeLSTM", 1)
        .attributes(lstm_attributes(config.direction, config.hidden_size))
        .input(inputs.x.clone())
        .input_with(weights.w.clone(), constant)
        .input_with(weights.r.clone(), constant)
        .optional_input(inputs.b.clone())
        .missing_input()
        .input(inputs.initial_h.clone())
        .input(inputs.initial_c.clone())
        .optional_input(inputs.p.clone())
        .input(weights.w_scale.clone())
        .input(weights.w_zero_point.clone())
        .input(weights.r_scale.clone())
        .input(weights.r_zero_point.clone())
        .num_outputs(3)
}

/// Outcome of one case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub label: String,
    pub config: LstmCaseConfig,
    pub tolerance: Tolerance,
    pub stage: CaseStage,
    pub outputs: Vec<OutputComparison>,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.stage == CaseStage::Pass
    }

    /// Error with the first mismatching element, if any.
    pub fn ensure_passed(&self) -> Result<()> {
        match self.outputs.iter().find_map(|o| o.mismatch.clone()) {
            Some(m) => Err(QuantRnnError::from(m)).with_context(|| format!("case {}", self.label)),
            None => Ok(()),
        }
    }

    pub fn max_abs_diff(&self) -> f32 {
        self.outputs
            .iter()
            .map(|o| o.max_abs_diff)
            .fold(0.0, f32::max)
    }
}

struct CaseRun<'a> {
    label: String,
    stage: CaseStage,
    registry: &'a KernelRegistry,
}

impl CaseRun<'_> {
    fn enter(&mut self, next: CaseStage) {
        debug!(case = %self.label, from = %self.stage, to = %next, "case stage");
        self.stage = next;
    }

    fn context(&self) -> String {
        format!("case {} failed at stage {}", self.label, self.stage)
    }
}

/// Run one case to `Pass` or `Fail`.
pub fn run_case(
    registry: &KernelRegistry,
    config: &LstmCaseConfig,
    seed: u64,
    std_dev: f32,
) -> Result<CaseReport> {
    let mut run = CaseRun {
        label: config.label(),
        stage: CaseStage::GenerateInputs,
        registry,
    };

    let mut rng = RandomValueGenerator::new(seed);
    let inputs = LstmCaseInputs::generate(&mut rng, config, std_dev);

    run.enter(CaseStage::QuantizeWeights);
    let weights = QuantizedCaseWeights::quantize(&inputs, config).with_context(|| run.context())?;

    run.enter(CaseStage::BuildQuantizedCase);
    let invocation = build_quantized_case(&inputs, &weights, config);

    run.enter(CaseStage::RunReference);
    let expected = compute_reference(
        run.registry,
        &inputs,
        config.direction,
        config.hidden_size,
        config.weight_type,
        config.reference_weights,
    )
    .with_context(|| run.context())?;

    run.enter(CaseStage::RunQuantizedKernel);
    let actual = invocation
        .run(run.registry)
        .and_then(LstmOutputs::from_values)
        .with_context(|| run.context())?;

    run.enter(CaseStage::Compare);
    let tolerance = config.tolerance();
    let outputs =
        compare_lstm_outputs(&expected, &actual, tolerance).with_context(|| run.context())?;

    let verdict = if outputs.iter().all(OutputComparison::passed) {
        CaseStage::Pass
    } else {
        CaseStage::Fail
    };
    run.enter(verdict);

    Ok(CaseReport {
        label: run.label,
        config: config.clone(),
        tolerance,
        stage: verdict,
        outputs,
    })
}

/// Reports for a whole sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub seed: u64,
    pub cases: Vec<CaseReport>,
    pub passed: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Run every case of `config`. Stops at the first case that errors before
/// comparison; numeric failures are collected.
pub fn run_sweep(registry: &KernelRegistry, config: &HarnessConfig) -> Result<SweepReport> {
    let cases = config
        .cases()
        .iter()
        .map(|case| run_case(registry, case, config.seed, config.std_dev))
        .collect::<Result<Vec<_>>>()?;
    let passed = cases.iter().filter(|c| c.passed()).count();
    let failed = cases.len() - passed;
    info!(seed = config.seed, passed, failed, "quantized LSTM sweep finished");
    Ok(SweepReport {
        seed: config.seed,
        cases,
        passed,
        failed,
    })
}
