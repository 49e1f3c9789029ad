//! # `DenseNet` Input Stem
//!
//! ```text,ignore
//! subsample: zero_pad(3) -> 7x7/2 valid conv -> bn -> act -> zero_pad(1) -> 3x3/2 valid maxpool
//! otherwise: 3x3/1 same conv
//! ```

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::conv_shape::maybe_square_output_resolution;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::norm_act::{NormAct2d, NormAct2dConfig};
use crate::models::common::ConvPolicy;
use burn::config::Config;
use burn::module::Module;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::{Backend, Tensor};

/// Zero padding ahead of the subsampling conv.
pub const STEM_CONV_PAD: usize = 3;

/// Zero padding ahead of the subsampling pool.
pub const STEM_POOL_PAD: usize = 1;

/// [`DenseNetStem`] Config.
#[derive(Config, Debug)]
pub struct DenseNetStemConfig {
    /// The stem conv.
    pub conv: Conv2dConfig,

    /// ``bn -> act`` after the conv; subsampling stems only.
    pub norm_act: Option<NormAct2dConfig>,

    /// Closing pool; subsampling stems only.
    pub pool: Option<MaxPool2dConfig>,

    /// Zero padding ahead of the conv.
    #[config(default = "0")]
    pub conv_pad: usize,

    /// Zero padding ahead of the pool.
    #[config(default = "0")]
    pub pool_pad: usize,
}

impl DenseNetStemConfig {
    /// Build a stem config.
    pub fn build(
        in_channels: usize,
        out_channels: usize,
        subsample: bool,
        conv: &ConvPolicy,
        normalization: NormalizationConfig,
        activation: ActivationConfig,
    ) -> Self {
        if subsample {
            Self {
                conv: conv.valid_conv([in_channels, out_channels], 7, 2),
                norm_act: Some(
                    NormAct2dConfig::new(out_channels)
                        .with_norm(normalization)
                        .with_act(activation),
                ),
                pool: Some(MaxPool2dConfig::new([3, 3]).with_strides([2, 2])),
                conv_pad: STEM_CONV_PAD,
                pool_pad: STEM_POOL_PAD,
            }
        } else {
            Self::new(conv.same_conv([in_channels, out_channels], 3, 1))
        }
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    /// Output resolution of the stem; `None` when a window does not fit.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> Option<[usize; 2]> {
        let conv_padding = match self.conv.padding {
            PaddingConfig2d::Explicit(pad, _) => pad,
            _ => 0,
        };
        let x = maybe_square_output_resolution(
            input_resolution,
            self.conv.kernel_size[0],
            self.conv.stride[0],
            self.conv_pad + conv_padding,
        )?;
        match &self.pool {
            Some(pool) => maybe_square_output_resolution(
                x,
                pool.kernel_size[0],
                pool.strides[0],
                self.pool_pad,
            ),
            None => Some(x),
        }
    }

    /// Initialize a [`DenseNetStem`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DenseNetStem<B> {
        DenseNetStem {
            conv_pad: self.conv_pad,
            conv: self.conv.init(device),
            norm_act: self.norm_act.map(|c| c.init(device)),
            pool_pad: self.pool_pad,
            pool: self.pool.map(|c| c.init()),
        }
    }
}

/// `DenseNet` input stem.
#[derive(Module, Debug)]
pub struct DenseNetStem<B: Backend> {
    /// Zero padding ahead of the conv.
    pub conv_pad: usize,

    /// The stem conv.
    pub conv: Conv2d<B>,

    /// Optional ``bn -> act``.
    pub norm_act: Option<NormAct2d<B>>,

    /// Zero padding ahead of the pool.
    pub pool_pad: usize,

    /// Optional pool.
    pub pool: Option<MaxPool2d>,
}

fn zero_pad<B: Backend>(
    x: Tensor<B, 4>,
    pad: usize,
) -> Tensor<B, 4> {
    if pad == 0 {
        x
    } else {
        x.pad((pad, pad, pad, pad), 0.0)
    }
}

impl<B: Backend> DenseNetStem<B> {
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
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = zero_pad(input, self.conv_pad);
        let x = self.conv.forward(x);
        let x = match &self.norm_act {
            Some(norm_act) => norm_act.forward(x),
            None => x,
        };
        match &self.pool {
            Some(pool) => pool.forward(zero_pad(x, self.pool_pad)),
            None => x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_subsample_stem() {
        type B = NdArray<f32>;
        let device = Default::default();

        let config = DenseNetStemConfig::build(
            3,
            8,
            true,
            &ConvPolicy::new(),
            NormalizationConfig::default(),
            ActivationConfig::Relu,
        );
        assert_eq!(config.out_channels(), 8);
        assert_eq!(config.output_resolution([224, 224]), Some([56, 56]));

        let stem: DenseNetStem<B> = config.init(&device);
        assert!(stem.norm_act.is_some());

        // 224 -> pad 230 -> conv 112 -> pad 114 -> pool 56
        let output = stem.forward(Tensor::ones([1, 3, 224, 224], &device));
        assert_eq!(output.dims(), [1, 8, 56, 56]);
    }

    #[test]
    fn test_plain_stem() {
        type B = NdArray<f32>;
        let device = Default::default();

        let stem: DenseNetStem<B> = DenseNetStemConfig::build(
            1,
            4,
            false,
            &ConvPolicy::new(),
            NormalizationConfig::default(),
            ActivationConfig::Relu,
        )
        .init(&device);
        assert!(stem.norm_act.is_none());
        assert!(stem.pool.is_none());

        let output = stem.forward(Tensor::ones([2, 1, 7, 9], &device));
        assert_eq!(output.dims(), [2, 4, 7, 9]);
    }
}
