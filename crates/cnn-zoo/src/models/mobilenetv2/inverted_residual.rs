//! # [`InvertedResidual`] - `MobileNetV2` unit.
//!
//! ```text,ignore
//! x -> [1x1 expand -> bn -> act] -> 3x3 depthwise (stride) -> bn -> act -> 1x1 -> bn -> (+ x)
//! ```
//!
//! The projection is linear; the residual sum is only used when
//! the block keeps both the resolution and the width.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::errors::{ZooError, expect_positive};
use crate::layers::blocks::cna::{AbstractCNA2dConfig, CNA2d, CNA2dMeta};
use crate::layers::blocks::conv_norm::{ConvNorm2d, ConvNorm2dConfig, ConvNorm2dMeta};
use crate::models::common::ConvPolicy;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`InvertedResidual`] Config.
#[derive(Config, Debug)]
pub struct InvertedResidualConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Expansion factor of the hidden width.
    #[config(default = "6")]
    pub expansion: usize,

    /// Stride of the depthwise conv.
    #[config(default = "1")]
    pub stride: usize,

    /// Conv bias / initializer policy.
    #[config(default = "ConvPolicy::new()")]
    pub conv: ConvPolicy,

    /// Normalization config; resized per layer.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// Activation config.
    #[config(default = "ActivationConfig::Relu6")]
    pub activation: ActivationConfig,
}

impl InvertedResidualConfig {
    /// Width of the depthwise conv: ``in_channels * expansion``.
    pub fn hidden_channels(&self) -> usize {
        self.in_channels * self.expansion
    }

    /// Does the block add its input to its output?
    pub fn has_residual(&self) -> bool {
        self.stride == 1 && self.in_channels == self.out_channels
    }

    /// Check the config.
    pub fn try_validate(&self) -> Result<(), ZooError> {
        expect_positive("expansion", self.expansion)?;
        expect_positive("stride", self.stride)?;
        if self.in_channels == 0 || self.out_channels == 0 {
            return Err(ZooError::invalid_config(format!(
                "inverted residual widths must be positive, got {} -> {}",
                self.in_channels, self.out_channels
            )));
        }
        Ok(())
    }

    /// Initialize an [`InvertedResidual`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> InvertedResidual<B> {
        let hidden = self.hidden_channels();
        let cna = AbstractCNA2dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        };

        let expand = if self.expansion != 1 {
            Some(
                cna.build_config(self.conv.same_conv([self.in_channels, hidden], 1, 1))
                    .init(device),
            )
        } else {
            None
        };

        InvertedResidual {
            expand,
            depthwise: cna
                .build_config(
                    self.conv
                        .same_conv([hidden, hidden], 3, self.stride)
                        .with_groups(hidden),
                )
                .init(device),
            project: ConvNorm2dConfig::new(
                self.conv.same_conv([hidden, self.out_channels], 1, 1),
            )
            .with_norm(self.normalization.clone())
            .init(device),
        }
    }
}

/// `MobileNetV2` inverted residual block.
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    /// Optional ``1x1`` expansion; absent when ``expansion == 1``.
    pub expand: Option<CNA2d<B>>,

    /// ``3x3`` depthwise conv.
    pub depthwise: CNA2d<B>,

    /// Linear ``1x1`` projection.
    pub project: ConvNorm2d<B>,
}

impl<B: Backend> InvertedResidual<B> {
    /// Input channels.
    pub fn in_channels(&self) -> usize {
        match &self.expand {
            Some(expand) => expand.in_channels(),
            None => self.depthwise.in_channels(),
        }
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.project.out_channels()
    }

    /// Depthwise stride.
    pub fn stride(&self) -> usize {
        self.depthwise.stride()[0]
    }

    /// Does the block add its input to its output?
    pub fn has_residual(&self) -> bool {
        self.stride() == 1 && self.in_channels() == self.out_channels()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, ceil(height / stride), ceil(width / stride)]``
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
        let stride = self.stride();

        let x = match &self.expand {
            Some(expand) => expand.forward(input.clone()),
            None => input.clone(),
        };
        let x = self.depthwise.forward(x);
        let x = self.project.forward(x);
        let x = if self.has_residual() { x + input } else { x };

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", height.div_ceil(stride)),
                ("out_width", width.div_ceil(stride))
            ]
        );

        x
    }
}
