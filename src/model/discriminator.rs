//! Discriminator network
//!
//! The Discriminator scores images as real or generated. The fully-connected
//! variant regularizes with dropout between layers; the convolutional variant
//! downsamples with strided convolutions and batch normalization.

use tch::{nn, nn::Module, nn::ModuleT, Tensor};

use super::layout::{conv_depth, validate_chain, Architecture, LayerSpec};
use super::{leaky_relu, WeightInit};
use crate::error::{GanError, Result};

/// Discriminator network configuration
#[derive(Debug, Clone)]
pub struct DiscriminatorConfig {
    pub architecture: Architecture,
    /// Width multiplier: hidden units (linear) or base filters (conv)
    pub width: i64,
    /// Input image channels
    pub channels: i64,
    /// Input image side length
    pub image_size: i64,
    /// Dropout rate between hidden layers (linear variant, training only)
    pub dropout: f64,
    pub init: WeightInit,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::Linear,
            width: 256,
            channels: 1,
            image_size: 28,
            dropout: 0.3,
            init: WeightInit::default(),
        }
    }
}

impl DiscriminatorConfig {
    /// Number of input values per sample
    pub fn pixels(&self) -> i64 {
        self.channels * self.image_size * self.image_size
    }

    /// Layer chain for this configuration, validated end to end
    pub fn layers(&self) -> Result<Vec<LayerSpec>> {
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(GanError::Config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }

        let (layers, input) = match self.architecture {
            Architecture::Linear => {
                let w = self.width;
                let layers = vec![
                    LayerSpec::linear("fc1", self.pixels(), w * 4),
                    LayerSpec::linear("fc2", w * 4, w * 2),
                    LayerSpec::linear("fc3", w * 2, w),
                    LayerSpec::linear("fc4", w, 1),
                ];
                (layers, (self.pixels(), 1))
            }
            Architecture::Convolutional => {
                let depth = conv_depth(self.image_size)?;
                let mut layers = Vec::with_capacity(depth as usize + 1);
                let mut in_dim = self.channels;
                let mut out_dim = self.width;
                let mut side = self.image_size;
                for i in 0..depth {
                    let spec = LayerSpec::conv(
                        format!("conv{}", i + 1),
                        in_dim,
                        out_dim,
                        side,
                        4,
                        2,
                        1,
                    );
                    side = spec.out_side;
                    in_dim = out_dim;
                    out_dim *= 2;
                    layers.push(spec);
                }
                layers.push(LayerSpec::conv(
                    format!("conv{}", depth + 1),
                    in_dim,
                    1,
                    side,
                    4,
                    1,
                    0,
                ));
                (layers, (self.channels, self.image_size))
            }
        };

        validate_chain(&layers, input, (1, 1))?;
        Ok(layers)
    }
}

#[derive(Debug)]
enum Body {
    Linear(Vec<nn::Linear>),
    Conv {
        convs: Vec<nn::Conv2D>,
        /// One per conv except the first and the last
        norms: Vec<nn::BatchNorm>,
    },
}

/// Discriminator network
///
/// Architecture (linear):
/// 1. `C*H*W -> 4w -> 2w -> w` with LeakyReLU(0.2) and Dropout
/// 2. `w -> 1` with Sigmoid
///
/// Architecture (convolutional):
/// 1. Conv 4x4 stride 2 with LeakyReLU(0.2), no normalization
/// 2. Conv 4x4 stride 2 stages with BatchNorm and LeakyReLU(0.2)
/// 3. Conv 4x4 stride 1 collapsing the 4x4 map to one Sigmoid score
#[derive(Debug)]
pub struct Discriminator {
    config: DiscriminatorConfig,
    layers: Vec<LayerSpec>,
    body: Body,
}

impl Discriminator {
    /// Create a new Discriminator network under `vs`
    pub fn new(vs: &nn::Path, config: DiscriminatorConfig) -> Result<Self> {
        let layers = config.layers()?;

        let body = match config.architecture {
            Architecture::Linear => Body::Linear(
                layers
                    .iter()
                    .map(|l| {
                        nn::linear(
                            vs / l.name.as_str(),
                            l.in_dim,
                            l.out_dim,
                            config.init.linear_config(),
                        )
                    })
                    .collect(),
            ),
            Architecture::Convolutional => {
                let last = layers.len() - 1;
                let mut convs = Vec::with_capacity(layers.len());
                let mut norms = Vec::new();
                for (i, l) in layers.iter().enumerate() {
                    let conv_config = nn::ConvConfig {
                        stride: l.stride,
                        padding: l.padding,
                        ws_init: config.init.ws_init(),
                        bs_init: nn::Init::Const(0.0),
                        ..Default::default()
                    };
                    convs.push(nn::conv2d(
                        vs / l.name.as_str(),
                        l.in_dim,
                        l.out_dim,
                        l.kernel,
                        conv_config,
                    ));
                    if i > 0 && i < last {
                        norms.push(nn::batch_norm2d(
                            vs / format!("{}_bn", l.name),
                            l.out_dim,
                            WeightInit::batch_norm_config(),
                        ));
                    }
                }
                Body::Conv { convs, norms }
            }
        };

        Ok(Self {
            config,
            layers,
            body,
        })
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `input` - Images (batch_size, C, H, W) or flattened (batch_size, C*H*W)
    /// * `train` - Whether in training mode (affects dropout and batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size) with probabilities of being real
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        let c = &self.config;
        let x = match &self.body {
            Body::Linear(fcs) => {
                let mut x = input.view([-1, c.pixels()]);
                let last = fcs.len() - 1;
                for fc in &fcs[..last] {
                    x = leaky_relu(&fc.forward(&x)).dropout(c.dropout, train);
                }
                fcs[last].forward(&x)
            }
            Body::Conv { convs, norms } => {
                let mut x = input.view([-1, c.channels, c.image_size, c.image_size]);
                x = leaky_relu(&convs[0].forward(&x));
                let last = convs.len() - 1;
                for (conv, bn) in convs[1..last].iter().zip(norms.iter()) {
                    x = leaky_relu(&bn.forward_t(&conv.forward(&x), train));
                }
                convs[last].forward(&x)
            }
        };

        x.sigmoid().view([-1])
    }

    /// Classify samples (inference mode)
    pub fn classify(&self, input: &Tensor) -> Tensor {
        self.forward_t(input, false)
    }

    /// Get configuration
    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }

    /// Validated layer chain
    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }
}

impl ModuleT for Discriminator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Discriminator::forward_t(self, xs, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    #[test]
    fn test_linear_discriminator_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let config = DiscriminatorConfig {
            width: 32,
            ..Default::default()
        };
        let disc = Discriminator::new(&vs.root(), config).unwrap();

        let images = Tensor::randn([4, 1, 28, 28], (Kind::Float, Device::Cpu));
        assert_eq!(disc.forward_t(&images, true).size(), vec![4]);

        let flat = Tensor::randn([4, 784], (Kind::Float, Device::Cpu));
        assert_eq!(disc.forward_t(&flat, false).size(), vec![4]);
    }

    #[test]
    fn test_conv_discriminator_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let config = DiscriminatorConfig {
            architecture: Architecture::Convolutional,
            width: 8,
            image_size: 64,
            ..Default::default()
        };
        let disc = Discriminator::new(&vs.root(), config).unwrap();

        let dims: Vec<i64> = disc.layers().iter().map(|l| l.out_dim).collect();
        assert_eq!(dims, vec![8, 16, 32, 64, 1]);

        let images = Tensor::randn([3, 1, 64, 64], (Kind::Float, Device::Cpu));
        assert_eq!(disc.forward_t(&images, true).size(), vec![3]);
    }

    #[test]
    fn test_discriminator_classify_is_probability() {
        let vs = VarStore::new(Device::Cpu);
        let disc = Discriminator::new(&vs.root(), DiscriminatorConfig::default()).unwrap();

        let input = Tensor::randn([8, 1, 28, 28], (Kind::Float, Device::Cpu));
        let probs = disc.classify(&input);

        let min_val = probs.min().double_value(&[]);
        let max_val = probs.max().double_value(&[]);
        assert!(min_val >= 0.0 && max_val <= 1.0);
    }

    #[test]
    fn test_dropout_only_in_training() {
        let vs = VarStore::new(Device::Cpu);
        let disc = Discriminator::new(&vs.root(), DiscriminatorConfig::default()).unwrap();

        let input = Tensor::randn([16, 1, 28, 28], (Kind::Float, Device::Cpu));
        let a = disc.forward_t(&input, false);
        let b = disc.forward_t(&input, false);
        assert!(a.equal(&b));
    }

    #[test]
    fn test_discriminator_rejects_bad_dropout() {
        let vs = VarStore::new(Device::Cpu);
        let config = DiscriminatorConfig {
            dropout: 1.0,
            ..Default::default()
        };
        assert!(Discriminator::new(&vs.root(), config).is_err());
    }
}
