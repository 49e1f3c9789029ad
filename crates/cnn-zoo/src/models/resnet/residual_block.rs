//! # Residual Block Wrapper

use crate::errors::ZooError;
use crate::models::resnet::pointwise::{PointwiseBlock, PointwiseBlockConfig};
use crate::models::resnet::preact::{PreActBlock, PreActBlockConfig};
use crate::models::resnet::util::same_output_resolution;
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`ResidualBlock`] Meta API.
pub trait ResidualBlockMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The stride of the block.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[ceil(in_height / stride), ceil(in_width / stride)]``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        same_output_resolution(input_resolution, self.stride())
    }
}

/// [`ResidualBlock`] Config.
#[derive(Config, Debug)]
pub enum ResidualBlockConfig {
    /// A bottleneck [`PointwiseBlock`].
    Pointwise(PointwiseBlockConfig),

    /// A pre-activation [`PreActBlock`].
    PreAct(PreActBlockConfig),
}

impl ResidualBlockMeta for ResidualBlockConfig {
    fn in_planes(&self) -> usize {
        match self {
            Self::Pointwise(config) => config.in_planes(),
            Self::PreAct(config) => config.in_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Pointwise(config) => config.out_planes(),
            Self::PreAct(config) => config.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Pointwise(config) => config.stride(),
            Self::PreAct(config) => config.stride(),
        }
    }
}

impl From<PointwiseBlockConfig> for ResidualBlockConfig {
    fn from(config: PointwiseBlockConfig) -> Self {
        Self::Pointwise(config)
    }
}

impl From<PreActBlockConfig> for ResidualBlockConfig {
    fn from(config: PreActBlockConfig) -> Self {
        Self::PreAct(config)
    }
}

impl ResidualBlockConfig {
    /// Does the block carry a projection shortcut?
    pub fn has_projection(&self) -> bool {
        match self {
            Self::Pointwise(config) => config.has_projection(),
            Self::PreAct(config) => config.has_projection(),
        }
    }

    /// Check the config.
    pub fn try_validate(&self) -> Result<(), ZooError> {
        match self {
            Self::Pointwise(config) => config.try_validate(),
            Self::PreAct(config) => config.try_validate(),
        }
    }

    /// Initialize a [`ResidualBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResidualBlock<B> {
        match self {
            Self::Pointwise(config) => ResidualBlock::Pointwise(config.clone().init(device)),
            Self::PreAct(config) => ResidualBlock::PreAct(config.clone().init(device)),
        }
    }
}

/// A [`PointwiseBlock`] or [`PreActBlock`] wrapper.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum ResidualBlock<B: Backend> {
    /// A bottleneck [`PointwiseBlock`].
    Pointwise(PointwiseBlock<B>),

    /// A pre-activation [`PreActBlock`].
    PreAct(PreActBlock<B>),
}

impl<B: Backend> From<PointwiseBlock<B>> for ResidualBlock<B> {
    fn from(block: PointwiseBlock<B>) -> Self {
        Self::Pointwise(block)
    }
}

impl<B: Backend> From<PreActBlock<B>> for ResidualBlock<B> {
    fn from(block: PreActBlock<B>) -> Self {
        Self::PreAct(block)
    }
}

impl<B: Backend> ResidualBlockMeta for ResidualBlock<B> {
    fn in_planes(&self) -> usize {
        match self {
            Self::Pointwise(block) => block.in_planes(),
            Self::PreAct(block) => block.in_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Pointwise(block) => block.out_planes(),
            Self::PreAct(block) => block.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Pointwise(block) => block.stride(),
            Self::PreAct(block) => block.stride(),
        }
    }
}

impl<B: Backend> ResidualBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_planes, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::Pointwise(block) => block.forward(input),
            Self::PreAct(block) => block.forward(input),
        }
    }

    /// Does the block carry a projection shortcut?
    pub fn has_projection(&self) -> bool {
        match self {
            Self::Pointwise(block) => block.shortcut.is_some(),
            Self::PreAct(block) => block.shortcut.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_residual_block_config() {
        let config: ResidualBlockConfig = PointwiseBlockConfig::new(8, 4, 16).with_stride(2).into();
        assert!(matches!(config, ResidualBlockConfig::Pointwise(_)));
        assert_eq!(config.in_planes(), 8);
        assert_eq!(config.out_planes(), 16);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([15, 16]), [8, 8]);
        assert!(config.has_projection());

        let config: ResidualBlockConfig = PreActBlockConfig::new(8, 8).into();
        assert!(matches!(config, ResidualBlockConfig::PreAct(_)));
        assert!(!config.has_projection());
        assert!(config.try_validate().is_ok());
    }

    #[test]
    fn test_residual_block_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: ResidualBlock<B> = ResidualBlockConfig::from(PreActBlockConfig::new(4, 8))
            .init(&device);
        assert_eq!(block.in_planes(), 4);
        assert_eq!(block.out_planes(), 8);
        assert!(block.has_projection());

        let output = block.forward(Tensor::ones([2, 4, 6, 6], &device));
        assert_eq!(output.dims(), [2, 8, 6, 6]);
    }
}
