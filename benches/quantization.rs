//! Criterion benchmarks for quantization and the LSTM kernels.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quant_rnn::harness::{
    build_quantized_case, compute_reference, CaseShape, LstmCaseConfig, LstmCaseInputs,
    QuantizedCaseWeights, RandomValueGenerator,
};
use quant_rnn::kernels::{gemm_f32_nt, qgemm_u8, ActivationQuant, PackedWeight, WeightQuant};
use quant_rnn::ops::Direction;
use quant_rnn::quantization::{
    apply_qdq, estimate_params, quantize_linear, quantize_weight, WeightType,
};
use quant_rnn::KernelRegistry;

fn gaussian(rng: &mut RandomValueGenerator, len: usize) -> Vec<f32> {
    rng.gaussian(&[len], 0.0, 0.25).into_data()
}

fn bench_qdq(c: &mut Criterion) {
    let mut rng = RandomValueGenerator::new(1);
    let values = gaussian(&mut rng, 4096);
    let weight = gaussian(&mut rng, 2 * 256 * 64);

    c.bench_function("estimate_params_u8_4096", |b| {
        b.iter(|| estimate_params::<u8>(black_box(&values)))
    });
    c.bench_function("apply_qdq_u8_4096_2dirs", |b| {
        b.iter(|| apply_qdq::<u8>(black_box(&values), 2))
    });
    c.bench_function("quantize_weight_i8_2x256x64", |b| {
        b.iter(|| quantize_weight::<i8>(black_box(&weight), 2, 256, 64))
    });
}

fn bench_gemm(c: &mut Criterion) {
    let (m, k, n) = (16, 128, 512);
    let mut rng = RandomValueGenerator::new(2);
    let a = gaussian(&mut rng, m * k);
    let w = gaussian(&mut rng, n * k);
    let mut out = vec![0.0f32; m * n];

    c.bench_function("gemm_f32_nt_16x128x512", |b| {
        b.iter(|| gemm_f32_nt(black_box(&a), black_box(&w), &mut out, m, k, n, false))
    });

    let a_params = estimate_params::<u8>(&a).unwrap();
    let a_q = quantize_linear(&a, a_params);
    let a_quant = ActivationQuant {
        scale: a_params.scale,
        zero_point: a_params.zero_point,
    };
    let w_q = quantize_weight::<i8>(&w, 1, n, k).unwrap();
    let packed = PackedWeight::pack(&w_q.data, k, n);
    let w_quant = WeightQuant {
        scale: w_q.scales[0],
        zero_point: i32::from(w_q.zero_points[0]),
    };

    c.bench_function("qgemm_u8_i8_16x128x512", |b| {
        b.iter(|| qgemm_u8(black_box(&a_q), a_quant, &packed, w_quant, &mut out, m, false))
    });
}

fn bench_lstm(c: &mut Criterion) {
    let registry = KernelRegistry::default_registry();
    let config = LstmCaseConfig::new(CaseShape::new(64, 8, 128), WeightType::I8)
        .with_direction(Direction::Bidirectional)
        .with_bias_and_peephole(true);
    let inputs = LstmCaseInputs::generate(&mut RandomValueGenerator::new(3), &config, 0.25);
    let weights = QuantizedCaseWeights::quantize(&inputs, &config).unwrap();

    let runtime = build_quantized_case(&inputs, &weights, &config);
    c.bench_function("dynamic_quantize_lstm_runtime_weights", |b| {
        b.iter(|| runtime.run(&registry).unwrap())
    });

    let constant = build_quantized_case(&inputs, &weights, &config.clone().with_initializers(true));
    c.bench_function("dynamic_quantize_lstm_prepacked", |b| {
        b.iter(|| constant.run(&registry).unwrap())
    });

    c.bench_function("float_lstm_reference", |b| {
        b.iter(|| {
            compute_reference(
                &registry,
                &inputs,
                config.direction,
                config.hidden_size,
                config.weight_type,
                config.reference_weights,
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_qdq, bench_gemm, bench_lstm);
criterion_main!(benches);
