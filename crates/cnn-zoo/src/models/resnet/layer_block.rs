//! # `ResNetV1` Layer Block
//!
//! A [`LayerBlock`] is one stage: a sequence of [`ResidualBlock`]s.
//!
//! [`LayerBlockMeta`] defines a common meta API for [`LayerBlock`]
//! and [`LayerBlockConfig`].

use crate::errors::ZooError;
use crate::models::resnet::residual_block::{
    ResidualBlock, ResidualBlockConfig, ResidualBlockMeta,
};
use crate::models::resnet::util::same_output_resolution;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`LayerBlock`] Meta API.
pub trait LayerBlockMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the layer block is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// Get the effective stride of the layers.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        same_output_resolution(input_resolution, self.stride())
    }
}

/// [`LayerBlock`] Configuration.
#[derive(Config, Debug)]
pub struct LayerBlockConfig {
    /// The component blocks.
    pub blocks: Vec<ResidualBlockConfig>,
}

impl From<Vec<ResidualBlockConfig>> for LayerBlockConfig {
    fn from(blocks: Vec<ResidualBlockConfig>) -> Self {
        Self { blocks }
    }
}

impl LayerBlockMeta for LayerBlockConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl LayerBlockConfig {
    /// Build a stage config.
    ///
    /// Block 0 is built by `first`; blocks ``1..num_blocks`` by `rest`,
    /// which receives the output planes of the block before it.
    pub fn build<F, G>(
        num_blocks: usize,
        first: F,
        rest: G,
    ) -> Self
    where
        F: FnOnce() -> ResidualBlockConfig,
        G: Fn(usize) -> ResidualBlockConfig,
    {
        let mut blocks: Vec<ResidualBlockConfig> = Vec::with_capacity(num_blocks);
        if num_blocks > 0 {
            blocks.push(first());
        }
        while blocks.len() < num_blocks {
            let planes = blocks[blocks.len() - 1].out_planes();
            blocks.push(rest(planes));
        }
        Self { blocks }
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), ZooError> {
        if self.is_empty() {
            return Err(ZooError::invalid_repetition("blocks", 0));
        }

        for block in &self.blocks {
            block.try_validate()?;
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.out_planes() != curr.in_planes() {
                return Err(ZooError::invalid_config(format!(
                    "block[{}].out_planes({}) != block[{}].in_planes({})",
                    idx - 1,
                    prev.out_planes(),
                    idx,
                    curr.in_planes(),
                )));
            }
        }
        Ok(())
    }

    /// Initialize a new [`LayerBlock`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Result<LayerBlock<B>, ZooError> {
        self.try_validate()?;

        Ok(LayerBlock {
            blocks: self
                .blocks
                .into_iter()
                .map(|block| block.init(device))
                .collect(),
        })
    }
}

/// Layer block.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    /// Internal blocks.
    pub blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> LayerBlockMeta for LayerBlock<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl<B: Backend> LayerBlock<B> {
    /// Apply the layer block.
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
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_planes", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_planes", self.in_planes())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = self
            .blocks
            .iter()
            .fold(input, |x, block| block.forward(x));

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::pointwise::PointwiseBlockConfig;
    use crate::models::resnet::preact::PreActBlockConfig;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_layer_block_build() {
        let config = LayerBlockConfig::build(
            3,
            || {
                PointwiseBlockConfig::new(16, 16, 64)
                    .with_stride(2)
                    .into()
            },
            |planes| PointwiseBlockConfig::new(planes, planes / 4, planes).into(),
        );
        assert_eq!(config.len(), 3);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 64);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([9, 9]), [5, 5]);
        assert!(config.blocks[0].has_projection());
        assert!(!config.blocks[1].has_projection());
        assert!(config.try_validate().is_ok());
    }

    #[test]
    fn test_layer_block_validate() {
        let empty = LayerBlockConfig::new(vec![]);
        assert_eq!(
            empty.try_validate(),
            Err(ZooError::invalid_repetition("blocks", 0))
        );

        let mismatched = LayerBlockConfig::new(vec![
            PreActBlockConfig::new(4, 8).into(),
            PreActBlockConfig::new(4, 4).into(),
        ]);
        assert!(matches!(
            mismatched.try_validate(),
            Err(ZooError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_layer_block_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: LayerBlock<B> = LayerBlockConfig::build(
            2,
            || {
                PreActBlockConfig::new(4, 8)
                    .with_stride(2)
                    .into()
            },
            |planes| PreActBlockConfig::new(planes, planes).into(),
        )
        .try_init(&device)
        .unwrap();

        assert_eq!(block.len(), 2);
        assert_eq!(block.stride(), 2);

        let input = Tensor::random([2, 4, 8, 8], Distribution::Default, &device);
        let output = block.forward(input.clone());
        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_planes", 8),
                ("out_height", 4),
                ("out_width", 4)
            ]
        );

        let expected = block.blocks[1].forward(block.blocks[0].forward(input));
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
