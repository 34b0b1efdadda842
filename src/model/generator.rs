//! Generator network
//!
//! The Generator maps latent noise to images. The fully-connected variant
//! produces a flattened pixel vector; the convolutional variant upsamples a
//! `latent x 1 x 1` map with transposed convolutions.

use tch::{nn, nn::Module, nn::ModuleT, Device, Kind, Tensor};

use super::layout::{conv_depth, validate_chain, Architecture, LayerSpec};
use super::{leaky_relu, WeightInit};
use crate::error::Result;

/// Generator network configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub architecture: Architecture,
    /// Size of the latent noise vector
    pub latent_dim: i64,
    /// Width multiplier: hidden units (linear) or base filters (conv)
    pub width: i64,
    /// Output image channels
    pub channels: i64,
    /// Output image side length
    pub image_size: i64,
    pub init: WeightInit,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::Linear,
            latent_dim: 100,
            width: 256,
            channels: 1,
            image_size: 28,
            init: WeightInit::default(),
        }
    }
}

impl GeneratorConfig {
    /// Number of output values per sample
    pub fn pixels(&self) -> i64 {
        self.channels * self.image_size * self.image_size
    }

    /// Layer chain for this configuration, validated end to end
    pub fn layers(&self) -> Result<Vec<LayerSpec>> {
        let layers = match self.architecture {
            Architecture::Linear => {
                let w = self.width;
                vec![
                    LayerSpec::linear("fc1", self.latent_dim, w),
                    LayerSpec::linear("fc2", w, w * 2),
                    LayerSpec::linear("fc3", w * 2, w * 4),
                    LayerSpec::linear("fc4", w * 4, self.pixels()),
                ]
            }
            Architecture::Convolutional => {
                let depth = conv_depth(self.image_size)?;
                let mut filters = self.width << (depth - 1);
                let mut layers = vec![LayerSpec::conv_transpose(
                    "deconv1",
                    self.latent_dim,
                    filters,
                    1,
                    4,
                    1,
                    0,
                )];
                let mut side = 4;
                for i in 1..depth {
                    let spec = LayerSpec::conv_transpose(
                        format!("deconv{}", i + 1),
                        filters,
                        filters / 2,
                        side,
                        4,
                        2,
                        1,
                    );
                    side = spec.out_side;
                    filters /= 2;
                    layers.push(spec);
                }
                layers.push(LayerSpec::conv_transpose(
                    format!("deconv{}", depth + 1),
                    filters,
                    self.channels,
                    side,
                    4,
                    2,
                    1,
                ));
                layers
            }
        };

        let output = match self.architecture {
            Architecture::Linear => (self.pixels(), 1),
            Architecture::Convolutional => (self.channels, self.image_size),
        };
        validate_chain(&layers, (self.latent_dim, 1), output)?;
        Ok(layers)
    }
}

#[derive(Debug)]
enum Body {
    Linear(Vec<nn::Linear>),
    Conv {
        deconvs: Vec<nn::ConvTranspose2D>,
        norms: Vec<nn::BatchNorm>,
    },
}

/// Generator network
///
/// Architecture (linear):
/// 1. `latent -> w -> 2w -> 4w` with LeakyReLU(0.2)
/// 2. `4w -> C*H*W` with Tanh
///
/// Architecture (convolutional):
/// 1. ConvTranspose 4x4 stride 1 from `latent x 1 x 1` to a 4x4 map
/// 2. ConvTranspose 4x4 stride 2 stages, each with BatchNorm and ReLU
/// 3. Final ConvTranspose to `C` channels with Tanh
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    layers: Vec<LayerSpec>,
    body: Body,
}

impl Generator {
    /// Create a new Generator network under `vs`.
    ///
    /// Fails with a shape error before allocating anything if the
    /// configuration does not chain.
    pub fn new(vs: &nn::Path, config: GeneratorConfig) -> Result<Self> {
        let layers = config.layers()?;

        let body = match config.architecture {
            Architecture::Linear => {
                Body::Linear(
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
                )
            }
            Architecture::Convolutional => {
                let mut deconvs = Vec::with_capacity(layers.len());
                let mut norms = Vec::with_capacity(layers.len() - 1);
                for (i, l) in layers.iter().enumerate() {
                    let deconv_config = nn::ConvTransposeConfig {
                        stride: l.stride,
                        padding: l.padding,
                        ws_init: config.init.ws_init(),
                        bs_init: nn::Init::Const(0.0),
                        ..Default::default()
                    };
                    deconvs.push(nn::conv_transpose2d(
                        vs / l.name.as_str(),
                        l.in_dim,
                        l.out_dim,
                        l.kernel,
                        deconv_config,
                    ));
                    // Output layer feeds tanh directly, no normalization
                    if i + 1 < layers.len() {
                        norms.push(nn::batch_norm2d(
                            vs / format!("{}_bn", l.name),
                            l.out_dim,
                            WeightInit::batch_norm_config(),
                        ));
                    }
                }
                Body::Conv { deconvs, norms }
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
    /// * `noise` - Tensor of shape (batch_size, latent_dim) or
    ///   (batch_size, latent_dim, 1, 1)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// (batch_size, C*H*W) for the linear variant, (batch_size, C, H, W) for
    /// the convolutional one, values in [-1, 1]
    pub fn forward_t(&self, noise: &Tensor, train: bool) -> Tensor {
        let latent_dim = self.config.latent_dim;
        match &self.body {
            Body::Linear(fcs) => {
                let mut x = noise.view([-1, latent_dim]);
                let last = fcs.len() - 1;
                for (i, fc) in fcs.iter().enumerate() {
                    x = fc.forward(&x);
                    x = if i < last { leaky_relu(&x) } else { x.tanh() };
                }
                x
            }
            Body::Conv { deconvs, norms } => {
                let mut x = noise.view([-1, latent_dim, 1, 1]);
                for (deconv, bn) in deconvs.iter().zip(norms.iter()) {
                    x = bn.forward_t(&deconv.forward(&x), train).relu();
                }
                // deconvs has exactly one more entry than norms
                deconvs[deconvs.len() - 1].forward(&x).tanh()
            }
        }
    }

    /// Generate images in evaluation mode, shaped (batch_size, C, H, W)
    pub fn generate(&self, noise: &Tensor) -> Tensor {
        self.to_images(&self.forward_t(noise, false))
    }

    /// Generate images from freshly sampled noise
    pub fn generate_random(&self, num_samples: i64, device: Device) -> Tensor {
        let noise = Tensor::randn([num_samples, self.config.latent_dim], (Kind::Float, device));
        self.generate(&noise)
    }

    /// Reshape raw generator output into (batch_size, C, H, W)
    pub fn to_images(&self, output: &Tensor) -> Tensor {
        let c = &self.config;
        output.view([-1, c.channels, c.image_size, c.image_size])
    }

    /// Get configuration
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Validated layer chain
    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }
}

impl ModuleT for Generator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Generator::forward_t(self, xs, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GanError;
    use tch::nn::VarStore;

    #[test]
    fn test_linear_generator_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let config = GeneratorConfig {
            width: 32,
            ..Default::default()
        };
        let gen = Generator::new(&vs.root(), config).unwrap();

        let noise = Tensor::randn([4, 100], (Kind::Float, Device::Cpu));
        assert_eq!(gen.forward_t(&noise, true).size(), vec![4, 784]);
        assert_eq!(gen.generate(&noise).size(), vec![4, 1, 28, 28]);
    }

    #[test]
    fn test_conv_generator_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let config = GeneratorConfig {
            architecture: Architecture::Convolutional,
            width: 8,
            image_size: 64,
            ..Default::default()
        };
        let gen = Generator::new(&vs.root(), config).unwrap();

        // 1024/512/256/128 pattern scaled down: 64, 32, 16, 8, then 1 channel
        let dims: Vec<i64> = gen.layers().iter().map(|l| l.out_dim).collect();
        assert_eq!(dims, vec![64, 32, 16, 8, 1]);

        let noise = Tensor::randn([2, 100], (Kind::Float, Device::Cpu));
        assert_eq!(gen.forward_t(&noise, true).size(), vec![2, 1, 64, 64]);
    }

    #[test]
    fn test_generator_output_bounded() {
        let vs = VarStore::new(Device::Cpu);
        let gen = Generator::new(&vs.root(), GeneratorConfig { width: 16, ..Default::default() }).unwrap();

        let samples = gen.generate_random(8, Device::Cpu);
        assert!(samples.min().double_value(&[]) >= -1.0);
        assert!(samples.max().double_value(&[]) <= 1.0);
    }

    #[test]
    fn test_conv_generator_rejects_bad_image_size() {
        let vs = VarStore::new(Device::Cpu);
        let config = GeneratorConfig {
            architecture: Architecture::Convolutional,
            image_size: 28,
            ..Default::default()
        };
        let err = Generator::new(&vs.root(), config).unwrap_err();
        assert!(matches!(err, GanError::Shape(_)));
        assert!(vs.variables().is_empty());
    }

    #[test]
    fn test_generator_parameter_shapes_match_chain() {
        let vs = VarStore::new(Device::Cpu);
        let config = GeneratorConfig {
            architecture: Architecture::Convolutional,
            width: 4,
            image_size: 16,
            ..Default::default()
        };
        let gen = Generator::new(&vs.root(), config).unwrap();
        let vars = vs.variables();

        for layer in gen.layers() {
            let weight = &vars[&format!("{}.weight", layer.name)];
            assert_eq!(weight.size(), layer.weight_shape());
            let bias = &vars[&format!("{}.bias", layer.name)];
            assert_eq!(bias.size(), layer.bias_shape());
        }
    }
}
