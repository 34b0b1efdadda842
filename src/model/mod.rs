//! Model module containing GAN architecture components
//!
//! This module provides:
//! - Layer chain descriptions and eager shape validation
//! - Generator network (fully-connected and convolutional)
//! - Discriminator network (fully-connected and convolutional)
//! - `Gan` wrapper owning both networks and their variable stores

mod discriminator;
mod gan;
mod generator;
pub mod layout;

pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use gan::{snapshots_equal, Gan};
pub use generator::{Generator, GeneratorConfig};
pub use layout::{Architecture, LayerKind, LayerSpec};

use serde::{Deserialize, Serialize};
use tch::{nn, Tensor};

/// Negative slope shared by every LeakyReLU in both networks
pub const LEAKY_SLOPE: f64 = 0.2;

/// LeakyReLU with slope [`LEAKY_SLOPE`]
pub(crate) fn leaky_relu(xs: &Tensor) -> Tensor {
    xs.maximum(&(xs * LEAKY_SLOPE))
}

/// Normal initialization for weight tensors; biases start at zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightInit {
    pub mean: f64,
    pub std: f64,
}

impl Default for WeightInit {
    fn default() -> Self {
        Self { mean: 0.0, std: 0.02 }
    }
}

impl WeightInit {
    pub(crate) fn ws_init(&self) -> nn::Init {
        nn::Init::Randn {
            mean: self.mean,
            stdev: self.std,
        }
    }

    pub(crate) fn linear_config(&self) -> nn::LinearConfig {
        nn::LinearConfig {
            ws_init: self.ws_init(),
            bs_init: Some(nn::Init::Const(0.0)),
            bias: true,
        }
    }

    /// Scale 1, shift 0
    pub(crate) fn batch_norm_config() -> nn::BatchNormConfig {
        nn::BatchNormConfig {
            ws_init: nn::Init::Const(1.0),
            bs_init: nn::Init::Const(0.0),
            ..Default::default()
        }
    }
}
