//! # Shared Builder Plumbing
//!
//! * [`InputConfig`] / [`ModelInput`] - input binding of a network.
//! * [`ConvPolicy`] - bias / initializer policy shared by every conv of a network.
//! * [`ModelOutput`] - output handle of a forward pass.

use crate::compat::conv_shape::same_padding;
use crate::errors::ZooError;
use burn::config::Config;
use burn::nn::conv::Conv2dConfig;
use burn::nn::{Initializer, PaddingConfig2d};
use burn::prelude::{Backend, Tensor};

/// He-normal kernel initializer; the default for every conv kernel.
pub const HE_INITIALIZER: Initializer = Initializer::KaimingNormal {
    gain: std::f64::consts::SQRT_2,
    fan_out_only: false,
};

/// Network input configuration.
///
/// Shapes are ``[batch, channels, height, width]``.
///
/// A network can be fed by a fresh placeholder (`input_shape`),
/// or by a pre-built upstream tensor (`input_tensor`).
/// When both are set, `input_tensor` wins.
#[derive(Config, Debug, PartialEq)]
pub struct InputConfig {
    /// Shape of a fresh input placeholder.
    #[config(default = "None")]
    pub input_shape: Option<[usize; 4]>,

    /// Shape of an upstream tensor fed into the network.
    #[config(default = "None")]
    pub input_tensor: Option<[usize; 4]>,
}

impl From<[usize; 4]> for InputConfig {
    fn from(shape: [usize; 4]) -> Self {
        Self::from_shape(shape)
    }
}

impl InputConfig {
    /// Input from a fresh placeholder.
    pub fn from_shape(shape: [usize; 4]) -> Self {
        Self::new().with_input_shape(Some(shape))
    }

    /// Input from an upstream tensor.
    pub fn from_tensor(shape: [usize; 4]) -> Self {
        Self::new().with_input_tensor(Some(shape))
    }

    /// Resolve the input binding.
    ///
    /// # Errors
    ///
    /// - [`ZooError::MissingInput`] when neither shape is set.
    /// - [`ZooError::InvalidConfig`] on a zero-sized dimension.
    pub fn resolve(&self) -> Result<ModelInput, ZooError> {
        let (shape, source) = match (self.input_tensor, self.input_shape) {
            (Some(shape), _) => (shape, InputSource::Upstream),
            (None, Some(shape)) => (shape, InputSource::Placeholder),
            (None, None) => return Err(ZooError::MissingInput),
        };

        if shape.contains(&0) {
            return Err(ZooError::invalid_config(format!(
                "input shape must be non-zero, got {shape:?}"
            )));
        }

        Ok(ModelInput { shape, source })
    }
}

/// Where the input of a network comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// A fresh input placeholder.
    Placeholder,

    /// A pre-built upstream tensor.
    Upstream,
}

/// Resolved network input binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInput {
    /// ``[batch, channels, height, width]``.
    pub shape: [usize; 4],

    /// Input source.
    pub source: InputSource,
}

impl ModelInput {
    /// Batch size.
    pub fn batch(&self) -> usize {
        self.shape[0]
    }

    /// Number of input channels.
    pub fn channels(&self) -> usize {
        self.shape[1]
    }

    /// ``[height, width]``.
    pub fn resolution(&self) -> [usize; 2] {
        [self.shape[2], self.shape[3]]
    }
}

/// Conv layer policy shared by a whole network.
#[derive(Config, Debug)]
pub struct ConvPolicy {
    /// Use a bias on conv layers.
    #[config(default = "false")]
    pub use_bias: bool,

    /// Kernel initializer.
    #[config(default = "HE_INITIALIZER")]
    pub initializer: Initializer,
}

impl ConvPolicy {
    /// A square conv with symmetric ``SAME`` padding.
    ///
    /// The output resolution is ``ceil(in / stride)``.
    pub fn same_conv(
        &self,
        channels: [usize; 2],
        kernel_size: usize,
        stride: usize,
    ) -> Conv2dConfig {
        let pad = same_padding(kernel_size, 1);
        self.conv(channels, kernel_size, stride)
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
    }

    /// A square conv with no padding.
    pub fn valid_conv(
        &self,
        channels: [usize; 2],
        kernel_size: usize,
        stride: usize,
    ) -> Conv2dConfig {
        self.conv(channels, kernel_size, stride)
            .with_padding(PaddingConfig2d::Valid)
    }

    fn conv(
        &self,
        channels: [usize; 2],
        kernel_size: usize,
        stride: usize,
    ) -> Conv2dConfig {
        Conv2dConfig::new(channels, [kernel_size, kernel_size])
            .with_stride([stride, stride])
            .with_bias(self.use_bias)
            .with_initializer(self.initializer.clone())
    }
}

/// Output handle of a network forward pass.
#[derive(Debug, Clone)]
pub enum ModelOutput<B: Backend> {
    /// Backbone feature map, ``[batch, channels, height, width]``.
    Features(Tensor<B, 4>),

    /// Classification logits, ``[batch, num_classes]``.
    Logits(Tensor<B, 2>),
}

impl<B: Backend> ModelOutput<B> {
    /// Output shape, as a vector.
    pub fn dims(&self) -> Vec<usize> {
        match self {
            Self::Features(x) => x.dims().to_vec(),
            Self::Logits(x) => x.dims().to_vec(),
        }
    }

    /// The feature map, if this is a backbone output.
    pub fn features(self) -> Option<Tensor<B, 4>> {
        match self {
            Self::Features(x) => Some(x),
            Self::Logits(_) => None,
        }
    }

    /// The logits, if this is a head output.
    pub fn logits(self) -> Option<Tensor<B, 2>> {
        match self {
            Self::Logits(x) => Some(x),
            Self::Features(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_input_resolve() {
        let input = InputConfig::from([2, 3, 32, 48]).resolve().unwrap();
        assert_eq!(input.source, InputSource::Placeholder);
        assert_eq!(input.batch(), 2);
        assert_eq!(input.channels(), 3);
        assert_eq!(input.resolution(), [32, 48]);

        let input = InputConfig::from_shape([1, 3, 8, 8])
            .with_input_tensor(Some([4, 1, 16, 16]))
            .resolve()
            .unwrap();
        assert_eq!(input.source, InputSource::Upstream);
        assert_eq!(input.shape, [4, 1, 16, 16]);
    }

    #[test]
    fn test_input_resolve_errors() {
        assert_eq!(InputConfig::new().resolve(), Err(ZooError::MissingInput));
        assert!(matches!(
            InputConfig::from_tensor([1, 0, 8, 8]).resolve(),
            Err(ZooError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_conv_policy() {
        let policy = ConvPolicy::new().with_use_bias(true);

        let conv = policy.same_conv([3, 8], 7, 2);
        assert_eq!(conv.kernel_size, [7, 7]);
        assert_eq!(conv.stride, [2, 2]);
        assert!(conv.bias);
        assert!(matches!(conv.padding, PaddingConfig2d::Explicit(3, 3)));
        assert!(matches!(conv.initializer, Initializer::KaimingNormal { .. }));

        let conv = ConvPolicy::new().valid_conv([8, 8], 1, 1);
        assert!(!conv.bias);
        assert!(matches!(conv.padding, PaddingConfig2d::Valid));
    }

    #[test]
    fn test_model_output() {
        type B = NdArray<f32>;
        let device = Default::default();

        let out: ModelOutput<B> = ModelOutput::Logits(Tensor::zeros([2, 5], &device));
        assert_eq!(out.dims(), vec![2, 5]);
        assert!(out.clone().features().is_none());
        assert_eq!(out.logits().unwrap().dims(), [2, 5]);
    }
}
