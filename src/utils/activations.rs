//! Activation (transfer) functions for the concrete layers
//!
//! Each function is evaluated generically over the kernel precision. The
//! derivative is expressed in terms of the activation's *output* where
//! possible, so most layers need no temporary space to differentiate it;
//! softplus is the exception and needs the pre-activation sum.

use serde::{Deserialize, Serialize};

use crate::numeric::Real;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Identity,
    Logistic,
    Tanh,
    Relu,
    Softplus,
}

impl Activation {
    /// Stable name used in configuration files and persisted layers.
    pub fn tag(self) -> &'static str {
        match self {
            Activation::Identity => "identity",
            Activation::Logistic => "logistic",
            Activation::Tanh => "tanh",
            Activation::Relu => "relu",
            Activation::Softplus => "softplus",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "identity" => Some(Activation::Identity),
            "logistic" => Some(Activation::Logistic),
            "tanh" => Some(Activation::Tanh),
            "relu" => Some(Activation::Relu),
            "softplus" => Some(Activation::Softplus),
            _ => None,
        }
    }

    pub fn apply<F: Real>(self, z: F) -> F {
        match self {
            Activation::Identity => z,
            Activation::Logistic => F::one() / (F::one() + (-z).exp()),
            Activation::Tanh => z.tanh(),
            Activation::Relu => z.max(F::zero()),
            // ln(1 + e^z) without overflowing for large z
            Activation::Softplus => z.max(F::zero()) + (-z.abs()).exp().ln_1p(),
        }
    }

    /// Whether [`derivative`](Self::derivative) needs the pre-activation sum.
    pub fn needs_preactivation(self) -> bool {
        matches!(self, Activation::Softplus)
    }

    /// d(output)/d(pre-activation).
    ///
    /// `preactivation` must be supplied when
    /// [`needs_preactivation`](Self::needs_preactivation) is true.
    pub fn derivative<F: Real>(self, output: F, preactivation: Option<F>) -> F {
        match self {
            Activation::Identity => F::one(),
            Activation::Logistic => output * (F::one() - output),
            Activation::Tanh => F::one() - output * output,
            Activation::Relu => {
                if output > F::zero() {
                    F::one()
                } else {
                    F::zero()
                }
            }
            Activation::Softplus => {
                let z = preactivation.unwrap_or_else(|| {
                    panic!("softplus derivative requires the pre-activation value")
                });
                Activation::Logistic.apply(z)
            }
        }
    }

    /// Output range to train towards when using the fraction `maximum` of
    /// the activation's range.
    pub fn targets(self, maximum: f32) -> (f32, f32) {
        match self {
            Activation::Identity | Activation::Tanh => (-maximum, maximum),
            Activation::Logistic => (0.5 - maximum / 2.0, 0.5 + maximum / 2.0),
            Activation::Relu | Activation::Softplus => (0.0, maximum),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_logistic_zero() {
        assert_relative_eq!(Activation::Logistic.apply(0.0f64), 0.5);
    }

    #[test]
    fn test_logistic_derivative_at_half() {
        assert_relative_eq!(Activation::Logistic.derivative(0.5f64, None), 0.25);
    }

    #[test]
    fn test_relu_mixed() {
        let data: Vec<f32> = [-2.0f32, -1.0, 0.0, 1.0, 2.0]
            .iter()
            .map(|&x| Activation::Relu.apply(x))
            .collect();
        assert_eq!(data, vec![0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_softplus_large_input_stable() {
        let y = Activation::Softplus.apply(1000.0f32);
        assert!(y.is_finite());
        assert_relative_eq!(y, 1000.0);
        assert_relative_eq!(Activation::Softplus.apply(0.0f64), 2.0f64.ln());
    }

    #[test]
    fn test_tanh_derivative_from_output() {
        let z = 0.3f64;
        let y = Activation::Tanh.apply(z);
        assert_relative_eq!(Activation::Tanh.derivative(y, None), 1.0 - z.tanh().powi(2));
    }

    #[test]
    fn test_tag_roundtrip() {
        for activation in [
            Activation::Identity,
            Activation::Logistic,
            Activation::Tanh,
            Activation::Relu,
            Activation::Softplus,
        ] {
            assert_eq!(Activation::from_tag(activation.tag()), Some(activation));
        }
        assert_eq!(Activation::from_tag("gelu"), None);
    }

    #[test]
    fn test_targets() {
        assert_eq!(Activation::Tanh.targets(0.8), (-0.8, 0.8));
        assert_eq!(Activation::Relu.targets(0.8), (0.0, 0.8));
        let (low, high) = Activation::Logistic.targets(0.8);
        assert_relative_eq!(low, 0.1);
        assert_relative_eq!(high, 0.9);
    }
}
