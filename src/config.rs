//! Configuration structures for building layers
//!
//! This module parses a single layer description from JSON and builds the
//! corresponding boxed [`Layer`].

use serde::Deserialize;
use std::fs;

use crate::error::{LayerError, LayerResult};
use crate::layers::{DenseLayer, Layer, ScaleShiftLayer};
use crate::utils::activations::Activation;
use crate::utils::rng::ThreadContext;

/// Configuration for a single layer.
///
/// Different layer types require different fields:
///
/// - **dense**: Requires `inputs` and `outputs`; optional `activation`
///   (default `identity`)
/// - **scale_shift**: Requires `size`
///
/// `init_limit` bounds the uniform random fill of the parameters (`0` keeps
/// dense parameters at zero; dense defaults to the Xavier limit, scale_shift
/// to its identity initialization). `seed` seeds the fill (default 0).
///
/// # Example
///
/// ```json
/// {
///   "layer_type": "dense",
///   "name": "hidden",
///   "inputs": 784,
///   "outputs": 128,
///   "activation": "tanh",
///   "seed": 42
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    /// Type of layer: "dense" or "scale_shift"
    pub layer_type: String,

    /// Layer name used in diagnostics (defaults to the layer type)
    pub name: Option<String>,

    // Dense layer parameters
    pub inputs: Option<usize>,
    pub outputs: Option<usize>,
    pub activation: Option<Activation>,

    // ScaleShift layer parameters
    pub size: Option<usize>,

    pub init_limit: Option<f32>,
    pub seed: Option<u64>,
}

impl LayerConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.layer_type)
    }
}

/// Loads a layer configuration from a JSON file.
///
/// # Examples
///
/// ```no_run
/// use rust_neural_layers::config::load_config;
///
/// let cfg = load_config("config/dense_tanh.json").unwrap();
/// assert_eq!(cfg.layer_type, "dense");
/// ```
pub fn load_config(path: &str) -> LayerResult<LayerConfig> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(json: &str) -> LayerResult<LayerConfig> {
    let config: LayerConfig = serde_json::from_str(json)?;
    validate_config(&config)?;
    Ok(config)
}

fn missing(config: &LayerConfig, field: &str) -> LayerError {
    LayerError::InvalidConfig(format!(
        "{} layer missing {}",
        config.layer_type, field
    ))
}

fn validate_config(config: &LayerConfig) -> LayerResult<()> {
    match config.layer_type.as_str() {
        "dense" => {
            config.inputs.ok_or_else(|| missing(config, "inputs"))?;
            config.outputs.ok_or_else(|| missing(config, "outputs"))?;
        }
        "scale_shift" => {
            config.size.ok_or_else(|| missing(config, "size"))?;
            if config.activation.is_some() {
                return Err(LayerError::InvalidConfig(
                    "scale_shift layer takes no activation".to_string(),
                ));
            }
        }
        other => {
            return Err(LayerError::InvalidConfig(format!(
                "Unknown layer type: {}",
                other
            )))
        }
    }

    if let Some(limit) = config.init_limit {
        if !limit.is_finite() || limit < 0.0 {
            return Err(LayerError::InvalidConfig(
                "init_limit must be finite and non-negative".to_string(),
            ));
        }
    }

    Ok(())
}

/// Builds the layer a validated configuration describes.
pub fn build_layer(config: &LayerConfig) -> LayerResult<Box<dyn Layer>> {
    validate_config(config)?;
    let mut context = ThreadContext::new(config.seed.unwrap_or(0));

    let layer: Box<dyn Layer> = match config.layer_type.as_str() {
        "dense" => {
            let inputs = config.inputs.unwrap_or_default();
            let outputs = config.outputs.unwrap_or_default();
            let mut layer = DenseLayer::new(
                config.name(),
                inputs,
                outputs,
                config.activation.unwrap_or_default(),
            );
            let limit = config
                .init_limit
                .unwrap_or_else(|| DenseLayer::xavier_limit(inputs, outputs));
            if limit > 0.0 {
                layer.random_fill(limit, &mut context);
            }
            Box::new(layer)
        }
        _ => {
            let mut layer = ScaleShiftLayer::new(config.name(), config.size.unwrap_or_default());
            if let Some(limit) = config.init_limit {
                if limit > 0.0 {
                    layer.random_fill(limit, &mut context);
                } else {
                    layer.zero_fill();
                }
            }
            Box::new(layer)
        }
    };

    log::debug!(
        "built {} layer '{}' ({} -> {}, {} parameters)",
        layer.class_id(),
        layer.name(),
        layer.inputs(),
        layer.outputs(),
        layer.parameter_count()
    );
    Ok(layer)
}
