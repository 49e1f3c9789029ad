//! # [`PointwiseBlock`] - `ResNetV1` bottleneck unit.
//!
//! ```text,ignore
//! x -> 1x1 (stride) -> bn -> act -> 3x3 -> bn -> act -> 1x1 -> bn -> (+ shortcut) -> act
//! ```
//!
//! The shortcut is the identity, or a ``1x1 (stride) -> bn`` projection.
//!
//! [`PointwiseBlockConfig`] implements [`Config`], and provides
//! [`PointwiseBlockConfig::init`] to initialize a [`PointwiseBlock`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::errors::ZooError;
use crate::layers::blocks::cna::{AbstractCNA2dConfig, CNA2d, CNA2dMeta};
use crate::layers::blocks::conv_norm::{ConvNorm2d, ConvNorm2dConfig, ConvNorm2dMeta};
use crate::models::common::ConvPolicy;
use crate::models::resnet::residual_block::ResidualBlockMeta;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`PointwiseBlock`] Config.
#[derive(Config, Debug)]
pub struct PointwiseBlockConfig {
    /// Input feature planes.
    pub in_planes: usize,

    /// Bottleneck planes of the inner ``1x1`` and ``3x3`` convs.
    pub reduction: usize,

    /// Output feature planes.
    pub out_planes: usize,

    /// Stride of the first ``1x1`` conv and the projection.
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

impl ResidualBlockMeta for PointwiseBlockConfig {
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

impl PointwiseBlockConfig {
    /// Will this block carry a projection shortcut?
    pub fn has_projection(&self) -> bool {
        self.projection || self.stride != 1 || self.in_planes != self.out_planes
    }

    /// Check the config.
    pub fn try_validate(&self) -> Result<(), ZooError> {
        for (name, value) in [
            ("in_planes", self.in_planes),
            ("reduction", self.reduction),
            ("out_planes", self.out_planes),
            ("stride", self.stride),
        ] {
            if value == 0 {
                return Err(ZooError::invalid_config(format!(
                    "pointwise block {name} must be positive"
                )));
            }
        }
        Ok(())
    }

    /// Initialize a [`PointwiseBlock`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> PointwiseBlock<B> {
        let cna_builder = AbstractCNA2dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        };

        let shortcut = if self.has_projection() {
            Some(
                ConvNorm2dConfig::new(self.conv.same_conv(
                    [self.in_planes, self.out_planes],
                    1,
                    self.stride,
                ))
                .with_norm(self.normalization.clone()),
            )
        } else {
            None
        };

        let cna1 = cna_builder.build_config(self.conv.same_conv(
            [self.in_planes, self.reduction],
            1,
            self.stride,
        ));
        let cna2 =
            cna_builder.build_config(self.conv.same_conv([self.reduction, self.reduction], 3, 1));
        let cna3 =
            cna_builder.build_config(self.conv.same_conv([self.reduction, self.out_planes], 1, 1));

        PointwiseBlock {
            shortcut: shortcut.map(|c| c.init(device)),
            cna1: cna1.init(device),
            cna2: cna2.init(device),
            cna3: cna3.init(device),
        }
    }
}

/// `ResNetV1` bottleneck block.
#[derive(Module, Debug)]
pub struct PointwiseBlock<B: Backend> {
    /// Optional projection shortcut.
    pub shortcut: Option<ConvNorm2d<B>>,

    /// ``1x1`` reduction.
    pub cna1: CNA2d<B>,

    /// ``3x3`` conv.
    pub cna2: CNA2d<B>,

    /// ``1x1`` expansion; the residual sum runs before its activation.
    pub cna3: CNA2d<B>,
}

impl<B: Backend> ResidualBlockMeta for PointwiseBlock<B> {
    fn in_planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn out_planes(&self) -> usize {
        self.cna3.out_channels()
    }

    fn stride(&self) -> usize {
        self.cna1.stride()[0]
    }
}

impl<B: Backend> PointwiseBlock<B> {
    /// Bottleneck planes.
    pub fn reduction(&self) -> usize {
        self.cna1.out_channels()
    }

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

        let identity = match &self.shortcut {
            Some(shortcut) => {
                debug_assert_eq!(shortcut.out_channels(), self.out_planes());
                shortcut.forward(input.clone())
            }
            None => input.clone(),
        };

        let x = self.cna1.forward(input);
        let x = self.cna2.forward(x);
        let x = self.cna3.hook_forward(x, |x| x + identity);

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
