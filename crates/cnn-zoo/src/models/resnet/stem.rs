//! # `ResNetV1` Input Stem
//!
//! Either a single ``7x7/2`` conv unit, or (factorized) three ``3x3``
//! conv units with strides ``1, 1, 2``; then a ``3x3/2`` max pool.
//!
//! ```text,ignore
//! default:    conv1(7x7/2) -> bn -> act -> maxpool(3x3/2)
//! factorized: conv1_1(3x3) -> bn -> act
//!          -> conv1_2(3x3) -> bn -> act
//!          -> conv1_3(3x3/2) -> bn -> act -> maxpool(3x3/2)
//! ```

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA2dConfig, CNA2d, CNA2dConfig, CNA2dMeta};
use crate::models::common::ConvPolicy;
use crate::models::resnet::util::same_output_resolution;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::PaddingConfig2d;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::{Backend, Tensor};

/// Stem structure config.
#[derive(Config, Debug)]
pub struct ResNetStemConfig {
    /// The first conv unit.
    pub cna1: CNA2dConfig,

    /// The second conv unit.
    pub cna2: Option<CNA2dConfig>,

    /// The third conv unit.
    pub cna3: Option<CNA2dConfig>,

    /// The pooling layer.
    pub pool: MaxPool2dConfig,
}

impl ResNetStemConfig {
    /// Build a stem config.
    ///
    /// # Arguments
    ///
    /// - `in_channels`: the input image channels.
    /// - `feature_maps`: conv width; ``init_filters``.
    /// - `out_channels`: factorized stem output width.
    /// - `factorized`: use three ``3x3`` units rather than one ``7x7``.
    pub fn build(
        in_channels: usize,
        feature_maps: usize,
        out_channels: usize,
        factorized: bool,
        conv: &ConvPolicy,
        normalization: NormalizationConfig,
        activation: ActivationConfig,
    ) -> Self {
        let cna_builder = AbstractCNA2dConfig {
            norm: normalization,
            act: activation,
        };

        let (cna1, cna2, cna3) = if factorized {
            (
                cna_builder.build_config(conv.same_conv([in_channels, feature_maps], 3, 1)),
                Some(cna_builder.build_config(conv.same_conv([feature_maps, feature_maps], 3, 1))),
                Some(cna_builder.build_config(conv.same_conv([feature_maps, out_channels], 3, 2))),
            )
        } else {
            (
                cna_builder.build_config(conv.same_conv([in_channels, feature_maps], 7, 2)),
                None,
                None,
            )
        };

        Self {
            cna1,
            cna2,
            cna3,
            pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1)),
        }
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        match &self.cna3 {
            Some(cna3) => cna3.out_channels(),
            None => self.cna1.out_channels(),
        }
    }

    /// Initialize a [`ResNetStem`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ResNetStem<B> {
        ResNetStem {
            cna1: self.cna1.init(device),
            cna2: self.cna2.map(|c| c.init(device)),
            cna3: self.cna3.map(|c| c.init(device)),
            pool: self.pool.init(),
        }
    }
}

/// Stem module.
#[derive(Module, Debug)]
pub struct ResNetStem<B: Backend> {
    /// The first conv unit.
    pub cna1: CNA2d<B>,
    /// The second conv unit.
    pub cna2: Option<CNA2d<B>>,
    /// The third conv unit.
    pub cna3: Option<CNA2d<B>>,
    /// The pooling.
    pub pool: MaxPool2d,
}

impl<B: Backend> ResNetStem<B> {
    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        self.cna1.in_channels()
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        match &self.cna3 {
            Some(cna3) => cna3.out_channels(),
            None => self.cna1.out_channels(),
        }
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, ceil(height / 4), ceil(width / 4)]``
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
        let [out_height, out_width] = same_output_resolution([height, width], 4);

        let mut x = self.cna1.forward(input);
        if let Some(cna2) = &self.cna2 {
            x = cna2.forward(x);
        }
        if let Some(cna3) = &self.cna3 {
            x = cna3.forward(x);
        }
        let x = self.pool.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}
