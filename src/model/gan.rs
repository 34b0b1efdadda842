//! GAN wrapper combining Generator and Discriminator
//!
//! Each network lives in its own `VarStore` so that each optimizer only ever
//! sees the parameters of the network it updates.

use std::path::Path;

use tch::{nn, nn::OptimizerConfig, nn::VarStore, Device, Kind, Tensor};

use super::discriminator::{Discriminator, DiscriminatorConfig};
use super::generator::{Generator, GeneratorConfig};
use crate::error::{GanError, Result};

/// Complete GAN model
pub struct Gan {
    /// Generator network
    pub generator: Generator,
    /// Discriminator network
    pub discriminator: Discriminator,
    /// Variable store for generator
    pub gen_vs: VarStore,
    /// Variable store for discriminator
    pub disc_vs: VarStore,
    /// Device (CPU/GPU)
    pub device: Device,
}

impl Gan {
    /// Create a new GAN model
    ///
    /// # Arguments
    ///
    /// * `gen_config` - Generator configuration
    /// * `disc_config` - Discriminator configuration
    /// * `device` - Device to create model on
    pub fn new(
        gen_config: GeneratorConfig,
        disc_config: DiscriminatorConfig,
        device: Device,
    ) -> Result<Self> {
        if gen_config.architecture != disc_config.architecture
            || gen_config.channels != disc_config.channels
            || gen_config.image_size != disc_config.image_size
        {
            return Err(GanError::Shape(format!(
                "generator produces {} {}x{}x{} images but discriminator expects {} {}x{}x{}",
                gen_config.architecture,
                gen_config.channels,
                gen_config.image_size,
                gen_config.image_size,
                disc_config.architecture,
                disc_config.channels,
                disc_config.image_size,
                disc_config.image_size
            )));
        }

        let gen_vs = VarStore::new(device);
        let disc_vs = VarStore::new(device);

        let generator = Generator::new(&gen_vs.root(), gen_config)?;
        let discriminator = Discriminator::new(&disc_vs.root(), disc_config)?;

        Ok(Self {
            generator,
            discriminator,
            gen_vs,
            disc_vs,
            device,
        })
    }

    /// Sample a batch of standard-normal latent vectors
    pub fn sample_noise(&self, num_samples: i64) -> Tensor {
        Tensor::randn([num_samples, self.latent_dim()], (Kind::Float, self.device))
    }

    /// Generate synthetic images in evaluation mode
    ///
    /// # Returns
    ///
    /// Tensor of shape (num_samples, C, H, W)
    pub fn generate(&self, num_samples: i64) -> Tensor {
        self.generate_from_noise(&self.sample_noise(num_samples))
    }

    /// Generate images from specific noise vectors, evaluation mode
    pub fn generate_from_noise(&self, noise: &Tensor) -> Tensor {
        tch::no_grad(|| self.generator.generate(noise))
    }

    /// Discriminate samples (get probability of being real)
    pub fn discriminate(&self, samples: &Tensor) -> Tensor {
        tch::no_grad(|| self.discriminator.classify(samples))
    }

    /// Adam optimizer over the generator parameters only
    pub fn generator_optimizer(&self, lr: f64, beta1: f64, beta2: f64) -> Result<nn::Optimizer> {
        Ok(adam(beta1, beta2).build(&self.gen_vs, lr)?)
    }

    /// Adam optimizer over the discriminator parameters only
    pub fn discriminator_optimizer(&self, lr: f64, beta1: f64, beta2: f64) -> Result<nn::Optimizer> {
        Ok(adam(beta1, beta2).build(&self.disc_vs, lr)?)
    }

    /// Stop gradients from accumulating in the discriminator parameters
    pub fn freeze_discriminator(&mut self) {
        self.disc_vs.freeze();
    }

    pub fn unfreeze_discriminator(&mut self) {
        self.disc_vs.unfreeze();
    }

    /// Detached copies of the generator's trainable parameters
    pub fn snapshot_generator(&self) -> Vec<Tensor> {
        snapshot(&self.gen_vs)
    }

    /// Detached copies of the discriminator's trainable parameters
    pub fn snapshot_discriminator(&self) -> Vec<Tensor> {
        snapshot(&self.disc_vs)
    }

    /// Save model checkpoints
    pub fn save(&self, gen_path: impl AsRef<Path>, disc_path: impl AsRef<Path>) -> Result<()> {
        let (gen_path, disc_path) = (gen_path.as_ref(), disc_path.as_ref());
        self.gen_vs
            .save(gen_path)
            .map_err(|e| GanError::artifact(gen_path, e))?;
        self.disc_vs
            .save(disc_path)
            .map_err(|e| GanError::artifact(disc_path, e))?;
        Ok(())
    }

    /// Load model checkpoints
    pub fn load(&mut self, gen_path: impl AsRef<Path>, disc_path: impl AsRef<Path>) -> Result<()> {
        self.gen_vs.load(gen_path)?;
        self.disc_vs.load(disc_path)?;
        Ok(())
    }

    /// Get latent dimension
    pub fn latent_dim(&self) -> i64 {
        self.generator.config().latent_dim
    }

    /// Get image side length
    pub fn image_size(&self) -> i64 {
        self.generator.config().image_size
    }

    /// Get number of image channels
    pub fn channels(&self) -> i64 {
        self.generator.config().channels
    }
}

fn adam(beta1: f64, beta2: f64) -> nn::Adam {
    nn::Adam {
        beta1,
        beta2,
        wd: 0.0,
        ..Default::default()
    }
}

fn snapshot(vs: &VarStore) -> Vec<Tensor> {
    vs.trainable_variables()
        .iter()
        .map(|t| t.detach().copy())
        .collect()
}

/// Whether two parameter snapshots are bit-identical
pub fn snapshots_equal(a: &[Tensor], b: &[Tensor]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equal(y))
}
