//! Shared utilities for layer implementations
//!
//! This module provides the per-thread random context and the activation
//! functions used by the concrete layers.

pub mod activations;
pub mod rng;

pub use activations::Activation;
pub use rng::{SimpleRng, ThreadContext};
