//! # [`PreActBlock`] - `ResNetV1` pre-activation basic unit.
//!
//! ```text,ignore
//! pre = act(bn(x))
//! shortcut = x | 1x1 (stride) conv on pre
//! y = 3x3 (stride) -> bn -> act -> 3x3
//! return y + shortcut
//! ```
//!
//! Blocks are not followed by an activation; the network
//! closes the last stage with a [`NormAct2d`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::errors::ZooError;
use crate::layers::blocks::cna::{AbstractCNA2dConfig, CNA2d, CNA2dMeta};
use crate::layers::blocks::norm_act::{NormAct2d, NormAct2dConfig};
use crate::models::common::ConvPolicy;
use crate::models::resnet::residual_block::ResidualBlockMeta;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Module, Tensor};

/// [`PreActBlock`] Config.
#[derive(Config, Debug)]
pub struct PreActBlockConfig {
    /// Input feature planes.
    pub in_planes: usize,

    /// Output feature planes.
    pub out_planes: usize,

    /// Stride of the first ``3x3`` conv and the projection.
    #[config(default = "1")]
    pub stride: usize,

    /// Force a projection shortcut.
    ///
    /// A projection is always used when the stride or width changes.
    #[config(default = "false")]
    pub projection: bool,

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

impl ResidualBlockMeta for PreActBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn out_planes(&self) -> usize {
        self.out_planes
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl PreActBlockConfig {
    /// Will this block carry a projection shortcut?
    pub fn has_projection(&self) -> bool {
        self.projection || self.stride != 1 || self.in_planes != self.out_planes
    }

    /// Check the config.
    pub fn try_validate(&self) -> Result<(), ZooError> {
        for (name, value) in [
            ("in_planes", self.in_planes),
            ("out_planes", self.out_planes),
            ("stride", self.stride),
        ] {
            if value == 0 {
                return Err(ZooError::invalid_config(format!(
                    "pre-activation block {name} must be positive"
                )));
            }
        }
        Ok(())
    }

    /// Initialize a [`PreActBlock`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> PreActBlock<B> {
        let shortcut = if self.has_projection() {
            Some(
                self.conv
                    .same_conv([self.in_planes, self.out_planes], 1, self.stride)
                    .init(device),
            )
        } else {
            None
        };

        let cna1 = AbstractCNA2dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        }
        .build_config(
            self.conv
                .same_conv([self.in_planes, self.out_planes], 3, self.stride),
        );

        PreActBlock {
            preact: NormAct2dConfig::new(self.in_planes)
                .with_norm(self.normalization.clone())
                .with_act(self.activation.clone())
                .init(device),
            shortcut,
            cna1: cna1.init(device),
            conv2: self
                .conv
                .same_conv([self.out_planes, self.out_planes], 3, 1)
                .init(device),
        }
    }
}

/// `ResNetV1` pre-activation basic block.
#[derive(Module, Debug)]
pub struct PreActBlock<B: Backend> {
    /// Pre-activation.
    pub preact: NormAct2d<B>,

    /// Optional ``1x1`` projection of the pre-activated input.
    pub shortcut: Option<Conv2d<B>>,

    /// ``3x3`` strided conv/norm/act.
    pub cna1: CNA2d<B>,

    /// ``3x3`` conv.
    pub conv2: Conv2d<B>,
}

impl<B: Backend> ResidualBlockMeta for PreActBlock<B> {
    fn in_planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn out_planes(&self) -> usize {
        self.conv2.weight.shape().dims[0]
    }

    fn stride(&self) -> usize {
        self.cna1.stride()[0]
    }
}

impl<B: Backend> PreActBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_planes, ceil(in_height / stride), ceil(in_width / stride)]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_planes", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_planes", self.in_planes())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let pre = self.preact.forward(input.clone());

        let identity = match &self.shortcut {
            Some(shortcut) => shortcut.forward(pre.clone()),
            None => input,
        };

        let x = self.cna1.forward(pre);
        let x = self.conv2.forward(x) + identity;

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width),
            ]
        );

        x
    }
}
