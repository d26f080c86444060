//! Layers and inputs shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use rust_neural_layers::prelude::*;

/// One instance of every layer type, with non-trivial parameters.
pub fn sample_layers() -> Vec<Box<dyn Layer>> {
    let mut context = ThreadContext::new(1234);

    let encoder = Arc::new(DenseLayer::xavier(
        "encoder",
        4,
        3,
        Activation::Tanh,
        &mut context,
    ));
    let mut decoder = ReverseLayer::new("decoder", encoder, Activation::Softplus);
    decoder.random_fill(0.1, &mut context);

    let mut affine = ScaleShiftLayer::new("affine", 4);
    affine.random_fill(0.5, &mut context);

    vec![
        Box::new(DenseLayer::xavier("linear", 4, 3, Activation::Identity, &mut context)),
        Box::new(DenseLayer::xavier("logistic", 4, 2, Activation::Logistic, &mut context)),
        Box::new(DenseLayer::xavier("tanh", 5, 3, Activation::Tanh, &mut context)),
        Box::new(DenseLayer::xavier("relu", 3, 5, Activation::Relu, &mut context)),
        Box::new(DenseLayer::xavier("softplus", 4, 3, Activation::Softplus, &mut context)),
        Box::new(affine),
        Box::new(decoder),
    ]
}

/// Deterministic input vector in [-1, 1].
pub fn sample_input(len: usize, seed: u64) -> Vec<f64> {
    let mut context = ThreadContext::new(seed);
    (0..len).map(|_| context.uniform(1.0) as f64).collect()
}

pub fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|&v| v as f32).collect()
}

/// Copy of every parameter value, group by group.
pub fn snapshot(layer: &dyn Layer) -> Vec<Vec<f32>> {
    layer
        .parameter_buffers()
        .iter()
        .map(|buffer| buffer.to_vec())
        .collect()
}
