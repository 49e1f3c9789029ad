//! # VGG Stage
//!
//! ``n x (3x3 conv -> bn -> act) -> maxpool(2x2/2)``

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::conv_shape::maybe_square_output_resolution;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA2dConfig, CNA2d, CNA2dMeta};
use crate::models::common::ConvPolicy;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::PaddingConfig2d;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::{Backend, Tensor};

/// [`VggStage`] Config.
#[derive(Config, Debug)]
pub struct VggStageConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels of every conv.
    pub out_channels: usize,

    /// Number of conv units.
    pub num_convs: usize,

    /// Conv bias / initializer policy.
    #[config(default = "ConvPolicy::new()")]
    pub conv: ConvPolicy,

    /// Normalization config; resized per layer.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// Activation config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl VggStageConfig {
    /// Output resolution of the stage; `None` when the pool does not fit.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> Option<[usize; 2]> {
        maybe_square_output_resolution(input_resolution, 2, 2, 0)
    }

    /// Initialize a [`VggStage`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> VggStage<B> {
        let cna_builder = AbstractCNA2dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        };

        let convs = (0..self.num_convs)
            .map(|idx| {
                let in_channels = if idx == 0 {
                    self.in_channels
                } else {
                    self.out_channels
                };
                cna_builder
                    .build_config(
                        self.conv
                            .same_conv([in_channels, self.out_channels], 3, 1),
                    )
                    .init(device)
            })
            .collect();

        VggStage {
            convs,
            pool: MaxPool2dConfig::new([2, 2])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Valid)
                .init(),
        }
    }
}

/// VGG conv stage.
#[derive(Module, Debug)]
pub struct VggStage<B: Backend> {
    /// Conv units.
    pub convs: Vec<CNA2d<B>>,

    /// Closing pool.
    pub pool: MaxPool2d,
}

impl<B: Backend> VggStage<B> {
    /// Input channels.
    pub fn in_channels(&self) -> usize {
        self.convs[0].in_channels()
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.convs[self.convs.len() - 1].out_channels()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, height / 2, width / 2]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, height, width] = unpack_shape_contract!(
            ["batch", "in_channels", "height", "width"],
            &input,
            &["batch", "height", "width"],
            &[("in_channels", self.in_channels())]
        );

        let x = self.convs.iter().fold(input, |x, conv| conv.forward(x));
        let x = self.pool.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", height / 2),
                ("out_width", width / 2)
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_vgg_stage() {
        type B = NdArray<f32>;
        let device = Default::default();

        let config = VggStageConfig::new(3, 8, 3).with_activation(ActivationConfig::Relu6);
        assert_eq!(config.output_resolution([9, 8]), Some([4, 4]));
        assert_eq!(config.output_resolution([1, 8]), None);

        let stage: VggStage<B> = config.init(&device);
        assert_eq!(stage.convs.len(), 3);
        assert_eq!(stage.in_channels(), 3);
        assert_eq!(stage.out_channels(), 8);
        assert_eq!(stage.convs[1].in_channels(), 8);
        assert!(stage.convs[0].conv.bias.is_none());

        let output = stage.forward(Tensor::ones([2, 3, 9, 8], &device));
        assert_eq!(output.dims(), [2, 8, 4, 4]);
    }
}
