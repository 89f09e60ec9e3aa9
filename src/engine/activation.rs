//! Element-wise activations applied after computation units.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Identity,
    #[default]
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Identity => "identity",
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
        }
    }

    pub fn apply_scalar(&self, x: f64) -> f64 {
        match self {
            Activation::Identity => x,
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }

    /// Applies the activation in place and returns the array.
    pub fn apply(&self, mut values: Array2<f64>) -> Array2<f64> {
        if *self != Activation::Identity {
            values.mapv_inplace(|x| self.apply_scalar(x));
        }
        values
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "identity" | "linear" | "none" => Ok(Activation::Identity),
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "sigmoid" => Ok(Activation::Sigmoid),
            _ => Err(ConfigError::UnsupportedActivation(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_relu() {
        assert_eq!(
            Activation::Relu.apply(array![[-1.0, 2.0]]),
            array![[0.0, 2.0]]
        );
    }

    #[test]
    fn test_scalar_values() {
        assert!((Activation::Sigmoid.apply_scalar(0.0) - 0.5).abs() < 1e-12);
        assert!((Activation::Tanh.apply_scalar(0.0)).abs() < 1e-12);
        assert_eq!(Activation::Identity.apply_scalar(-3.5), -3.5);
    }

    #[test]
    fn test_parse() {
        assert_eq!("ReLU".parse::<Activation>().unwrap(), Activation::Relu);
        assert_eq!("none".parse::<Activation>().unwrap(), Activation::Identity);
        assert!(matches!(
            "gelu".parse::<Activation>(),
            Err(ConfigError::UnsupportedActivation(_))
        ));
    }
}
