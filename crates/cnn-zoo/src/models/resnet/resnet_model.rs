//! # `ResNetV1` Core Model
//!
//! [`ResNetV1Config`] implements [`Config`], and provides the high-level
//! builder options. It provides [`ResNetV1Config::to_structure`] to convert
//! to a [`ResNetV1StructureConfig`], which is the exact layer plan.
//!
//! [`ResNetV1`] implements [`Module`], and provides [`ResNetV1::forward`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::errors::{ZooError, expect_positive};
use crate::layers::blocks::norm_act::{NormAct2d, NormAct2dConfig};
use crate::layers::heads::{ClassificationHead, ClassificationHeadConfig};
use crate::models::classifier::BuildOutput;
use crate::models::common::{ConvPolicy, HE_INITIALIZER, InputConfig, ModelOutput};
use crate::models::resnet::block_type::ResNetBlockType;
use crate::models::resnet::layer_block::{LayerBlock, LayerBlockConfig, LayerBlockMeta};
use crate::models::resnet::pointwise::PointwiseBlockConfig;
use crate::models::resnet::preact::PreActBlockConfig;
use crate::models::resnet::stem::{ResNetStem, ResNetStemConfig};
use crate::models::DEFAULT_MODEL_NAME;
use burn::config::Config;
use burn::module::Module;
use burn::nn::Initializer;
use burn::prelude::{Backend, Tensor};
use tracing::debug;

/// ResNet-18 stage depths.
pub const RESNET18_BLOCKS: [usize; 4] = [2, 2, 2, 2];
/// ResNet-34 stage depths.
pub const RESNET34_BLOCKS: [usize; 4] = [3, 4, 6, 3];
/// ResNet-50 stage depths.
pub const RESNET50_BLOCKS: [usize; 4] = [3, 4, 6, 3];
/// ResNet-101 stage depths.
pub const RESNET101_BLOCKS: [usize; 4] = [3, 4, 23, 3];
/// ResNet-152 stage depths.
pub const RESNET152_BLOCKS: [usize; 4] = [3, 8, 36, 3];

/// Output width of the first bottleneck stage, independent of `init_filters`.
pub const POINTWISE_FIRST_STAGE_WIDTH: usize = 256;

/// High-level `ResNetV1` builder configuration.
#[derive(Config, Debug)]
pub struct ResNetV1Config {
    /// Input binding.
    pub input: InputConfig,

    /// Number of residual blocks per stage.
    #[config(default = "RESNET18_BLOCKS.to_vec()")]
    pub repetition: Vec<usize>,

    /// Append a global-pool + linear classification head.
    #[config(default = "false")]
    pub include_top: bool,

    /// Number of classes of the head.
    #[config(default = "1000")]
    pub num_classes: usize,

    /// Replace the ``7x7`` stem conv with three ``3x3`` convs.
    #[config(default = "false")]
    pub factorization_first_layer: bool,

    /// Use a bias on conv layers.
    #[config(default = "false")]
    pub use_bias: bool,

    /// Activation config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,

    /// Residual block family.
    #[config(default = "ResNetBlockType::WithPointwise")]
    pub block_type: ResNetBlockType,

    /// Wrap the network in a named [`crate::models::classifier::Classifier`].
    #[config(default = "false")]
    pub create_model: bool,

    /// Classifier name.
    #[config(default = "DEFAULT_MODEL_NAME.to_string()")]
    pub name_model: String,

    /// Stem width; and the stage-0 width of pre-activation stages.
    #[config(default = "64")]
    pub init_filters: usize,

    /// Bottleneck width of the first bottleneck block.
    #[config(default = "64")]
    pub min_reduction: usize,

    /// Normalization config; resized per layer.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// Conv kernel initializer.
    #[config(default = "HE_INITIALIZER")]
    pub kernel_initializer: Initializer,
}

impl ResNetV1Config {
    /// Rebind the input.
    pub fn with_input(
        mut self,
        input: InputConfig,
    ) -> Self {
        self.input = input;
        self
    }

    /// The conv policy shared by every conv layer.
    pub fn conv_policy(&self) -> ConvPolicy {
        ConvPolicy::new()
            .with_use_bias(self.use_bias)
            .with_initializer(self.kernel_initializer.clone())
    }

    /// Width of the stem output.
    pub fn stem_width(&self) -> usize {
        match (self.factorization_first_layer, self.block_type) {
            (true, ResNetBlockType::WithoutPointwise) => 2 * self.init_filters,
            _ => self.init_filters,
        }
    }

    /// Check the config.
    pub fn try_validate(&self) -> Result<(), ZooError> {
        if self.repetition.is_empty() {
            return Err(ZooError::invalid_repetition("repetition", 0));
        }
        for &repeat in &self.repetition {
            expect_positive("repetition", repeat)?;
        }
        if self.init_filters == 0 {
            return Err(ZooError::invalid_config("init_filters must be positive"));
        }
        if self.block_type.is_pointwise() && self.min_reduction == 0 {
            return Err(ZooError::invalid_config("min_reduction must be positive"));
        }
        if self.include_top && self.num_classes == 0 {
            return Err(ZooError::invalid_config("num_classes must be positive"));
        }
        Ok(())
    }

    /// Convert to a [`ResNetV1StructureConfig`].
    ///
    /// # Arguments
    ///
    /// - `in_channels`: the number of input image channels.
    pub fn to_structure(
        &self,
        in_channels: usize,
    ) -> Result<ResNetV1StructureConfig, ZooError> {
        self.try_validate()?;

        let conv = self.conv_policy();
        let norm = self.normalization.clone();
        let act = self.activation.clone();

        let stem = ResNetStemConfig::build(
            in_channels,
            self.init_filters,
            self.stem_width(),
            self.factorization_first_layer,
            &conv,
            norm.clone(),
            act.clone(),
        );

        let pointwise = |in_planes: usize, reduction: usize, out_planes: usize| {
            PointwiseBlockConfig::new(in_planes, reduction, out_planes)
                .with_conv(conv.clone())
                .with_normalization(norm.clone())
                .with_activation(act.clone())
        };
        let preact = |in_planes: usize, out_planes: usize| {
            PreActBlockConfig::new(in_planes, out_planes)
                .with_conv(conv.clone())
                .with_normalization(norm.clone())
                .with_activation(act.clone())
        };

        let mut planes = stem.out_channels();
        let mut layers = Vec::with_capacity(self.repetition.len());
        for (stage, &repeat) in self.repetition.iter().enumerate() {
            let layer = match self.block_type {
                ResNetBlockType::WithPointwise => {
                    let (reduction, out_planes, stride) = if stage == 0 {
                        (self.min_reduction, POINTWISE_FIRST_STAGE_WIDTH, 1)
                    } else {
                        (planes / 2, 2 * planes, 2)
                    };
                    LayerBlockConfig::build(
                        repeat,
                        || {
                            pointwise(planes, reduction, out_planes)
                                .with_stride(stride)
                                .with_projection(true)
                                .into()
                        },
                        |p| pointwise(p, p / 4, p).into(),
                    )
                }
                ResNetBlockType::WithoutPointwise => {
                    let (out_planes, stride) = if stage == 0 {
                        (self.init_filters, 1)
                    } else {
                        (2 * planes, 2)
                    };
                    LayerBlockConfig::build(
                        repeat,
                        || {
                            preact(planes, out_planes)
                                .with_stride(stride)
                                .with_projection(true)
                                .into()
                        },
                        |p| preact(p, p).into(),
                    )
                }
            };
            layer.try_validate()?;
            debug!(
                stage,
                blocks = layer.len(),
                in_planes = layer.in_planes(),
                out_planes = layer.out_planes(),
                "resnet stage"
            );
            planes = layer.out_planes();
            layers.push(layer);
        }

        let post_norm = if self.block_type.is_pointwise() {
            None
        } else {
            Some(
                NormAct2dConfig::new(planes)
                    .with_norm(norm)
                    .with_act(act),
            )
        };

        let head = if self.include_top {
            Some(ClassificationHeadConfig::new(planes, self.num_classes))
        } else {
            None
        };

        Ok(ResNetV1StructureConfig {
            stem,
            layers,
            post_norm,
            head,
        })
    }

    /// Initialize a [`ResNetV1`] network.
    #[tracing::instrument(level = "debug", skip_all, fields(name = %self.name_model))]
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<ResNetV1<B>, ZooError> {
        let input = self.input.resolve()?;
        self.to_structure(input.channels())?.try_init(device)
    }

    /// Build the network, as a graph or a named classifier.
    pub fn build<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<BuildOutput<B>, ZooError> {
        let input = self.input.resolve()?;
        let network = self.try_init::<B>(device)?;
        Ok(BuildOutput::assemble(
            network.into(),
            input,
            self.create_model,
            &self.name_model,
        ))
    }
}

/// [`ResNetV1`] Structure Config.
///
/// The exact layer plan of a network.
#[derive(Config, Debug)]
pub struct ResNetV1StructureConfig {
    /// Input stem.
    pub stem: ResNetStemConfig,

    /// Residual stages.
    pub layers: Vec<LayerBlockConfig>,

    /// Closing ``bn -> act``; pre-activation networks only.
    pub post_norm: Option<NormAct2dConfig>,

    /// Optional classification head.
    pub head: Option<ClassificationHeadConfig>,
}

impl ResNetV1StructureConfig {
    /// Output widths of each stage.
    pub fn stage_widths(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.out_planes()).collect()
    }

    /// Initialize a [`ResNetV1`] network.
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Result<ResNetV1<B>, ZooError> {
        let layers = self
            .layers
            .into_iter()
            .map(|layer| layer.try_init(device))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResNetV1 {
            stem: self.stem.init(device),
            layers,
            post_norm: self.post_norm.map(|c| c.init(device)),
            head: self.head.map(|c| c.init(device)),
        })
    }
}

/// `ResNetV1` network.
#[derive(Module, Debug)]
pub struct ResNetV1<B: Backend> {
    /// Input stem.
    pub stem: ResNetStem<B>,

    /// Residual stages.
    pub layers: Vec<LayerBlock<B>>,

    /// Closing ``bn -> act``.
    pub post_norm: Option<NormAct2d<B>>,

    /// Classification head.
    pub head: Option<ClassificationHead<B>>,
}

impl<B: Backend> ResNetV1<B> {
    /// Output widths of each stage.
    pub fn stage_widths(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.out_planes()).collect()
    }

    /// Width of the backbone feature map.
    pub fn out_channels(&self) -> usize {
        match self.layers.last() {
            Some(layer) => layer.out_planes(),
            None => self.stem.out_channels(),
        }
    }

    /// Number of head classes, if there is a head.
    pub fn num_classes(&self) -> Option<usize> {
        self.head.as_ref().map(|h| h.num_classes())
    }

    /// Backbone forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, height / 32, width / 32]``
    pub fn forward_features(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.stem.forward(input);
        let x = self.layers.iter().fold(x, |x, layer| layer.forward(x));
        match &self.post_norm {
            Some(post_norm) => post_norm.forward(x),
            None => x,
        }
    }

    /// Forward pass; through the head, when there is one.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> ModelOutput<B> {
        let x = self.forward_features(input);
        match &self.head {
            Some(head) => ModelOutput::Logits(head.forward(x)),
            None => ModelOutput::Features(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::residual_block::ResidualBlockConfig;
    use burn::backend::NdArray;

    fn small_config(block_type: ResNetBlockType) -> ResNetV1Config {
        ResNetV1Config::new([1, 3, 32, 32].into())
            .with_block_type(block_type)
            .with_repetition(vec![1, 2])
            .with_init_filters(4)
            .with_min_reduction(4)
    }

    #[test]
    fn test_pointwise_structure() {
        let structure = small_config(ResNetBlockType::WithPointwise)
            .with_repetition(vec![3, 4, 6, 3])
            .to_structure(3)
            .unwrap();

        assert_eq!(structure.stem.out_channels(), 4);
        assert_eq!(structure.stage_widths(), vec![256, 512, 1024, 2048]);
        assert_eq!(
            structure
                .layers
                .iter()
                .map(|l| l.len())
                .collect::<Vec<_>>(),
            vec![3, 4, 6, 3]
        );
        assert_eq!(
            structure
                .layers
                .iter()
                .map(|l| l.stride())
                .collect::<Vec<_>>(),
            vec![1, 2, 2, 2]
        );
        assert!(structure.post_norm.is_none());
        assert!(structure.head.is_none());

        let ResidualBlockConfig::Pointwise(first) = &structure.layers[0].blocks[0] else {
            panic!("expected a pointwise block");
        };
        assert_eq!(first.reduction, 4);
        assert!(first.has_projection());

        let ResidualBlockConfig::Pointwise(second) = &structure.layers[1].blocks[0] else {
            panic!("expected a pointwise block");
        };
        assert_eq!(second.in_planes, 256);
        assert_eq!(second.reduction, 128);
        assert_eq!(second.out_planes, 512);

        let ResidualBlockConfig::Pointwise(identity) = &structure.layers[1].blocks[1] else {
            panic!("expected a pointwise block");
        };
        assert_eq!(identity.reduction, 128);
        assert!(!identity.has_projection());
    }

    #[test]
    fn test_preact_structure() {
        let structure = small_config(ResNetBlockType::WithoutPointwise)
            .with_repetition(vec![2, 2, 2, 2])
            .with_factorization_first_layer(true)
            .with_include_top(true)
            .with_num_classes(7)
            .to_structure(3)
            .unwrap();

        assert_eq!(structure.stem.out_channels(), 8);
        assert_eq!(structure.stage_widths(), vec![4, 8, 16, 32]);
        assert!(structure.layers[0].blocks[0].has_projection());
        assert!(!structure.layers[0].blocks[1].has_projection());
        assert_eq!(structure.post_norm.as_ref().unwrap().num_features, 32);

        let head = structure.head.unwrap();
        assert_eq!(head.in_channels, 32);
        assert_eq!(head.num_classes, 7);
    }

    #[test]
    fn test_validation() {
        let config = small_config(ResNetBlockType::WithPointwise);

        assert_eq!(
            config.clone().with_repetition(vec![]).to_structure(3).err(),
            Some(ZooError::invalid_repetition("repetition", 0))
        );
        assert_eq!(
            config
                .clone()
                .with_repetition(vec![2, 0, 2])
                .to_structure(3)
                .err(),
            Some(ZooError::invalid_repetition("repetition", 0))
        );
        assert!(matches!(
            config.clone().with_init_filters(0).try_validate(),
            Err(ZooError::InvalidConfig(_))
        ));
        assert_eq!(
            config
                .with_input(InputConfig::new())
                .try_init::<NdArray<f32>>(&Default::default())
                .err(),
            Some(ZooError::MissingInput)
        );
    }

    #[test]
    fn test_pointwise_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNetV1<B> = small_config(ResNetBlockType::WithPointwise)
            .try_init(&device)
            .unwrap();
        assert_eq!(model.stage_widths(), vec![256, 512]);
        assert_eq!(model.num_classes(), None);

        let output = model.forward(Tensor::ones([1, 3, 32, 32], &device));
        assert_eq!(output.dims(), vec![1, 512, 4, 4]);
    }

    #[test]
    fn test_preact_forward_with_head() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNetV1<B> = small_config(ResNetBlockType::WithoutPointwise)
            .with_include_top(true)
            .with_num_classes(5)
            .try_init(&device)
            .unwrap();
        assert_eq!(model.out_channels(), 8);
        assert_eq!(model.num_classes(), Some(5));
        assert!(model.post_norm.is_some());

        let input = Tensor::ones([2, 3, 32, 32], &device);
        assert_eq!(model.forward_features(input.clone()).dims(), [2, 8, 4, 4]);

        let logits = model.forward(input).logits().unwrap();
        assert_eq!(logits.dims(), [2, 5]);
    }
}
