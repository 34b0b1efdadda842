//! Loss functions for GAN training
//!
//! Both networks end in a sigmoid, so the losses are Binary Cross Entropy on
//! probabilities rather than on logits.

use tch::{Reduction, Tensor};

/// Mean BCE between probabilities and a constant target.
///
/// libtorch refuses NaN probabilities; those yield a NaN loss that stays
/// attached to the graph so the step guard can reject it.
fn bce_against(probs: &Tensor, target: f64) -> Tensor {
    let targets = Tensor::full_like(probs, target);
    match probs.f_binary_cross_entropy::<Tensor>(&targets, None, Reduction::Mean) {
        Ok(loss) => loss,
        Err(_) => probs.mean(probs.kind()) * f64::NAN,
    }
}

/// Generator loss: -log(D(G(z)))
///
/// The generator wants the discriminator to output 1 (real) for fake samples.
///
/// # Arguments
///
/// * `fake_probs` - Discriminator output on generated samples, in [0, 1]
///
/// # Returns
///
/// Scalar loss tensor
pub fn generator_loss(fake_probs: &Tensor) -> Tensor {
    bce_against(fake_probs, 1.0)
}

/// Discriminator loss: -log(D(x)) - log(1-D(G(z)))
///
/// Real and fake terms are averaged separately and summed with equal weight.
///
/// # Arguments
///
/// * `real_probs` - Discriminator output on real samples
/// * `fake_probs` - Discriminator output on generated samples
pub fn discriminator_loss(real_probs: &Tensor, fake_probs: &Tensor) -> Tensor {
    bce_against(real_probs, 1.0) + bce_against(fake_probs, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn test_generator_loss() {
        let fake_probs = Tensor::rand([4], (Kind::Float, Device::Cpu));
        let loss = generator_loss(&fake_probs);

        assert_eq!(loss.size(), Vec::<i64>::new());
        assert!(loss.double_value(&[]) >= 0.0);
    }

    #[test]
    fn test_discriminator_loss() {
        let real_probs = Tensor::rand([4], (Kind::Float, Device::Cpu));
        let fake_probs = Tensor::rand([4], (Kind::Float, Device::Cpu));
        let loss = discriminator_loss(&real_probs, &fake_probs);

        assert_eq!(loss.size(), Vec::<i64>::new());
        assert!(loss.double_value(&[]) >= 0.0);
    }

    #[test]
    fn test_perfect_discriminator() {
        // Perfect discriminator: high confidence on real, low on fake
        let real_probs = Tensor::full([4], 0.9999, (Kind::Float, Device::Cpu));
        let fake_probs = Tensor::full([4], 0.0001, (Kind::Float, Device::Cpu));
        let loss = discriminator_loss(&real_probs, &fake_probs);

        assert!(loss.double_value(&[]) < 0.01);
    }

    #[test]
    fn test_coin_flip_discriminator() {
        let half = Tensor::full([8], 0.5, (Kind::Float, Device::Cpu));
        let ln2 = std::f64::consts::LN_2;

        assert!((generator_loss(&half).double_value(&[]) - ln2).abs() < 1e-5);
        assert!((discriminator_loss(&half, &half).double_value(&[]) - 2.0 * ln2).abs() < 1e-5);
    }

    #[test]
    fn test_nan_probabilities_give_nan_loss() {
        let probs = Tensor::full([4], f64::NAN, (Kind::Float, Device::Cpu));
        assert!(generator_loss(&probs).double_value(&[]).is_nan());
    }

    #[test]
    fn test_saturated_outputs_stay_finite() {
        // libtorch clamps log terms, so certain mistakes give a large finite loss
        let ones = Tensor::ones([4], (Kind::Float, Device::Cpu));
        let zeros = Tensor::zeros([4], (Kind::Float, Device::Cpu));
        let loss = discriminator_loss(&zeros, &ones).double_value(&[]);
        assert!(loss.is_finite());
        assert!(loss > 10.0);
    }
}
