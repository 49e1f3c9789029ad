//! # `NormAct2d` - norm/activation block.
//!
//! The pre-activation half of a conv unit:
//! used ahead of convolutions in pre-activation residual blocks,
//! in `DenseNet` composite functions, and as the final ``bn / relu``
//! of backbones which end in a pre-activated feature map.

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use crate::compat::normalization_wrapper::{Normalization, NormalizationConfig};
use bimm_contracts::assert_shape_contract_periodically;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

/// [`NormAct2d`] Config.
#[derive(Config, Debug)]
pub struct NormAct2dConfig {
    /// Number of channels.
    pub num_features: usize,

    /// The [`Normalization`] config; resized to `num_features` on init.
    #[config(default = "NormalizationConfig::default()")]
    pub norm: NormalizationConfig,

    /// The [`Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl NormAct2dConfig {
    /// Initialize a [`NormAct2d`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> NormAct2d<B> {
        NormAct2d {
            norm: self
                .norm
                .with_num_features(self.num_features)
                .init(device),
            act: self.act.init(device),
        }
    }
}

/// Sequenced norm/activation block.
#[derive(Module, Debug)]
pub struct NormAct2d<B: Backend> {
    /// Norm layer.
    pub norm: Normalization<B>,

    /// Activation layer.
    pub act: Activation<B>,
}

impl<B: Backend> NormAct2d<B> {
    /// Number of channels.
    pub fn num_features(&self) -> usize {
        self.norm.num_features()
    }

    /// Forward Pass.
    ///
    /// Shape preserving on ``[batch, num_features, height, width]``.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        assert_shape_contract_periodically!(
            ["batch", "num_features", "height", "width"],
            &input,
            &[("num_features", self.num_features())]
        );

        let x = self.norm.forward(input);
        self.act.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_norm_act() {
        type B = NdArray<f32>;
        let device = Default::default();

        let layer: NormAct2d<B> = NormAct2dConfig::new(5)
            .with_act(ActivationConfig::Relu6)
            .init(&device);
        assert_eq!(layer.num_features(), 5);

        let input = Tensor::random([2, 5, 3, 3], Distribution::Default, &device);
        let output = layer.forward(input.clone());
        assert_eq!(output.dims(), [2, 5, 3, 3]);

        let expected = layer.act.forward(layer.norm.forward(input));
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
