//! Layer chain descriptions
//!
//! Every network is described as an ordered list of [`LayerSpec`]s before any
//! parameter is allocated. The chain is validated eagerly so that a bad
//! configuration fails at construction rather than in the middle of an epoch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GanError, Result};

/// Network family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// Fully-connected generator and discriminator on flattened pixels
    Linear,
    /// DCGAN: transposed convolutions up, strided convolutions down
    Convolutional,
}

impl Architecture {
    /// File prefix used for sample images and plots
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Architecture::Linear => "MNIST_GAN",
            Architecture::Convolutional => "MNIST_DCGAN",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::Linear => write!(f, "linear"),
            Architecture::Convolutional => write!(f, "convolutional"),
        }
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" | "fc" | "gan" => Ok(Architecture::Linear),
            "conv" | "convolutional" | "dcgan" => Ok(Architecture::Convolutional),
            other => Err(format!(
                "unknown architecture '{}', expected 'linear' or 'conv'",
                other
            )),
        }
    }
}

/// Kind of parameterized layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Linear,
    Conv,
    ConvTranspose,
}

/// One parameterized layer in a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSpec {
    /// Variable-store path of the layer
    pub name: String,
    pub kind: LayerKind,
    /// Input features (linear) or channels (conv)
    pub in_dim: i64,
    /// Output features (linear) or channels (conv)
    pub out_dim: i64,
    /// Spatial side of the input feature map, 1 for linear layers
    pub in_side: i64,
    /// Spatial side of the output feature map, 1 for linear layers
    pub out_side: i64,
    pub kernel: i64,
    pub stride: i64,
    pub padding: i64,
}

impl LayerSpec {
    pub fn linear(name: impl Into<String>, in_dim: i64, out_dim: i64) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Linear,
            in_dim,
            out_dim,
            in_side: 1,
            out_side: 1,
            kernel: 1,
            stride: 1,
            padding: 0,
        }
    }

    /// Strided convolution: `out = (in + 2p - k) / s + 1`
    pub fn conv(
        name: impl Into<String>,
        in_dim: i64,
        out_dim: i64,
        in_side: i64,
        kernel: i64,
        stride: i64,
        padding: i64,
    ) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Conv,
            in_dim,
            out_dim,
            in_side,
            out_side: (in_side + 2 * padding - kernel) / stride + 1,
            kernel,
            stride,
            padding,
        }
    }

    /// Transposed convolution: `out = (in - 1) * s - 2p + k`
    pub fn conv_transpose(
        name: impl Into<String>,
        in_dim: i64,
        out_dim: i64,
        in_side: i64,
        kernel: i64,
        stride: i64,
        padding: i64,
    ) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::ConvTranspose,
            in_dim,
            out_dim,
            in_side,
            out_side: (in_side - 1) * stride - 2 * padding + kernel,
            kernel,
            stride,
            padding,
        }
    }

    /// Shape of the weight tensor libtorch allocates for this layer
    pub fn weight_shape(&self) -> Vec<i64> {
        match self.kind {
            LayerKind::Linear => vec![self.out_dim, self.in_dim],
            LayerKind::Conv => vec![self.out_dim, self.in_dim, self.kernel, self.kernel],
            LayerKind::ConvTranspose => {
                vec![self.in_dim, self.out_dim, self.kernel, self.kernel]
            }
        }
    }

    /// Shape of the bias tensor
    pub fn bias_shape(&self) -> Vec<i64> {
        vec![self.out_dim]
    }
}

/// Check that `layers` is non-empty, every dimension is positive, and each
/// layer consumes exactly what the previous one produces.
///
/// `input` and `output` are `(dim, side)` pairs for the two ends of the chain.
pub fn validate_chain(layers: &[LayerSpec], input: (i64, i64), output: (i64, i64)) -> Result<()> {
    let first = layers
        .first()
        .ok_or_else(|| GanError::Shape("network has no layers".to_string()))?;

    for layer in layers {
        if layer.in_dim <= 0 || layer.out_dim <= 0 || layer.in_side <= 0 || layer.out_side <= 0 {
            return Err(GanError::Shape(format!(
                "layer {} has non-positive dimensions ({}x{}x{} -> {}x{}x{})",
                layer.name,
                layer.in_dim,
                layer.in_side,
                layer.in_side,
                layer.out_dim,
                layer.out_side,
                layer.out_side
            )));
        }
    }

    if (first.in_dim, first.in_side) != input {
        return Err(GanError::Shape(format!(
            "layer {} expects input {:?} but network input is {:?}",
            first.name,
            (first.in_dim, first.in_side),
            input
        )));
    }

    for pair in layers.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.out_dim != next.in_dim || prev.out_side != next.in_side {
            return Err(GanError::Shape(format!(
                "layer {} produces {}x{}x{} but layer {} expects {}x{}x{}",
                prev.name,
                prev.out_dim,
                prev.out_side,
                prev.out_side,
                next.name,
                next.in_dim,
                next.in_side,
                next.in_side
            )));
        }
    }

    // Non-empty checked above
    let last = &layers[layers.len() - 1];
    if (last.out_dim, last.out_side) != output {
        return Err(GanError::Shape(format!(
            "layer {} produces {:?} but network output must be {:?}",
            last.name,
            (last.out_dim, last.out_side),
            output
        )));
    }

    Ok(())
}

/// Number of stride-2 stages needed to go between a 4x4 map and `image_size`.
///
/// The convolutional networks only support `image_size = 4 * 2^n` with `n >= 1`.
pub fn conv_depth(image_size: i64) -> Result<u32> {
    if image_size < 8 || image_size % 4 != 0 || !((image_size / 4) as u64).is_power_of_two() {
        return Err(GanError::Shape(format!(
            "convolutional networks need an image size of 4 * 2^n (8, 16, 32, 64, ...), got {}",
            image_size
        )));
    }
    Ok((image_size / 4).trailing_zeros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv_arithmetic() {
        let down = LayerSpec::conv("c", 1, 8, 64, 4, 2, 1);
        assert_eq!(down.out_side, 32);

        let up = LayerSpec::conv_transpose("d", 100, 64, 1, 4, 1, 0);
        assert_eq!(up.out_side, 4);

        let up = LayerSpec::conv_transpose("d", 64, 32, 4, 4, 2, 1);
        assert_eq!(up.out_side, 8);
    }

    #[test]
    fn test_validate_chain_ok() {
        let layers = vec![
            LayerSpec::linear("fc1", 100, 256),
            LayerSpec::linear("fc2", 256, 784),
        ];
        assert!(validate_chain(&layers, (100, 1), (784, 1)).is_ok());
    }

    #[test]
    fn test_validate_chain_mismatch() {
        let layers = vec![
            LayerSpec::linear("fc1", 100, 256),
            LayerSpec::linear("fc2", 512, 784),
        ];
        let err = validate_chain(&layers, (100, 1), (784, 1)).unwrap_err();
        assert!(matches!(err, GanError::Shape(_)));
    }

    #[test]
    fn test_validate_chain_rejects_empty_and_zero() {
        assert!(validate_chain(&[], (1, 1), (1, 1)).is_err());

        let layers = vec![LayerSpec::linear("fc1", 0, 10)];
        assert!(validate_chain(&layers, (0, 1), (10, 1)).is_err());
    }

    #[test]
    fn test_conv_depth() {
        assert_eq!(conv_depth(64).unwrap(), 4);
        assert_eq!(conv_depth(8).unwrap(), 1);
        assert!(conv_depth(28).is_err());
        assert!(conv_depth(4).is_err());
        assert!(conv_depth(48).is_err());
    }

    #[test]
    fn test_architecture_parse() {
        assert_eq!("dcgan".parse::<Architecture>().unwrap(), Architecture::Convolutional);
        assert_eq!("Linear".parse::<Architecture>().unwrap(), Architecture::Linear);
        assert!("rnn".parse::<Architecture>().is_err());
    }
}
