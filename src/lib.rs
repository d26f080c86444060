//! Rust Neural Layers Library
//!
//! The contract every trainable layer satisfies: forward evaluation in two
//! precisions, back-propagation with caller-owned temporary space and
//! gradient accumulators, a rebuildable view of the trainable parameters,
//! and persistence that can rebuild a layer from a type tag.
//!
//! # Modules
//!
//! - `layers`: Layer trait, precision-generic extension and concrete layers
//! - `parameters`: Parameter views and gradient accumulators
//! - `registry`: Layer type registry and polymorphic persistence
//! - `store`: Binary store reader/writer
//! - `numeric`: f32/f64 dispatch
//! - `config`: JSON layer configuration
//! - `utils`: Per-thread random context and activation functions
//!
//! # Example
//!
//! ```
//! use rust_neural_layers::prelude::*;
//!
//! let mut context = ThreadContext::new(42);
//! let layer = DenseLayer::xavier("hidden", 3, 2, Activation::Tanh, &mut context);
//!
//! let propagation = layer.forward(&[1.0f32, 2.0, 3.0]);
//! let mut gradient = Gradients::zeros(layer.parameters());
//! layer.backward(&propagation, &[0.5, -0.5], None, &mut gradient, 1.0);
//! assert_eq!(gradient.flatten().len(), layer.parameter_count());
//! ```

pub mod config;
pub mod error;
pub mod layers;
pub mod numeric;
pub mod parameters;
pub mod registry;
pub mod store;
pub mod utils;

pub mod prelude {
    pub use crate::error::{LayerError, LayerResult};
    pub use crate::layers::{
        DenseLayer, Layer, LayerExt, LayerInfo, Propagation, ReverseLayer, ScaleShiftLayer,
    };
    pub use crate::numeric::Real;
    pub use crate::parameters::{Gradients, ParameterShape, Parameters};
    pub use crate::registry::{save_layer, LayerRegistry};
    pub use crate::store::{StoreReader, StoreWriter};
    pub use crate::utils::{Activation, ThreadContext};
}
