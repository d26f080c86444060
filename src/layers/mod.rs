//! Layer abstractions for neural networks
//!
//! This module provides the Layer trait, its precision-generic extension
//! and the concrete layer types.

mod r#trait;
pub mod dense;
pub mod ext;
pub mod reverse;
pub mod scale_shift;

// Re-export the Layer trait for convenience
pub use dense::DenseLayer;
pub use ext::{LayerExt, Propagation};
pub use r#trait::{same_values, validate_parameters, Layer, LayerInfo};
pub use reverse::ReverseLayer;
pub use scale_shift::ScaleShiftLayer;
