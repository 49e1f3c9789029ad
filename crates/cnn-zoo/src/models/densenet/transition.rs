//! # `DenseNet` Transition
//!
//! ``bn -> act -> 1x1 conv(floor(c * compression)) -> [dropout] -> avgpool(2x2/2)``

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::conv_shape::maybe_square_output_resolution;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::norm_act::{NormAct2d, NormAct2dConfig};
use crate::models::common::ConvPolicy;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::nn::pool::{AvgPool2d, AvgPool2dConfig};
use burn::nn::{Dropout, DropoutConfig};
use burn::prelude::{Backend, Tensor};

/// Compressed width of a transition.
///
/// ``floor(in_channels * compression)``
pub fn compressed_channels(
    in_channels: usize,
    compression: f64,
) -> usize {
    (in_channels as f64 * compression).floor() as usize
}

/// [`Transition`] Config.
#[derive(Config, Debug)]
pub struct TransitionConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Dropout probability; `None` for no dropout.
    #[config(default = "None")]
    pub drop_prob: Option<f64>,

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

impl TransitionConfig {
    /// Output resolution; `None` when the pool does not fit.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> Option<[usize; 2]> {
        maybe_square_output_resolution(input_resolution, 2, 2, 0)
    }

    /// Initialize a [`Transition`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Transition<B> {
        Transition {
            norm_act: NormAct2dConfig::new(self.in_channels)
                .with_norm(self.normalization.clone())
                .with_act(self.activation.clone())
                .init(device),
            conv: self
                .conv
                .valid_conv([self.in_channels, self.out_channels], 1, 1)
                .init(device),
            dropout: self.drop_prob.map(|p| DropoutConfig::new(p).init()),
            pool: AvgPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}

/// `DenseNet` transition block.
#[derive(Module, Debug)]
pub struct Transition<B: Backend> {
    /// Input ``bn -> act``.
    pub norm_act: NormAct2d<B>,

    /// ``1x1`` compression conv.
    pub conv: Conv2d<B>,

    /// Optional dropout.
    pub dropout: Option<Dropout>,

    /// ``2x2/2`` average pool.
    pub pool: AvgPool2d,
}

impl<B: Backend> Transition<B> {
    /// Input channels.
    pub fn in_channels(&self) -> usize {
        self.norm_act.num_features()
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
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

        let x = self.norm_act.forward(input);
        let x = self.conv.forward(x);
        let x = match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        };
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
