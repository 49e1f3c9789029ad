//! # VGG Core Model
//!
//! Five [`VggStage`]s of widths ``[w, 2w, 4w, 8w, 8w]``;
//! stages 1-2 hold two convs, stages 3-5 hold `repetition` convs.
//! The optional head is a [`FlattenHead`]: ``fc6 -> fc7 -> fc8``.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::errors::{ZooError, expect_positive};
use crate::layers::heads::{FlattenHead, FlattenHeadConfig};
use crate::models::DEFAULT_MODEL_NAME;
use crate::models::classifier::BuildOutput;
use crate::models::common::{ConvPolicy, HE_INITIALIZER, InputConfig, ModelOutput};
use crate::models::vgg::stage::{VggStage, VggStageConfig};
use burn::config::Config;
use burn::module::Module;
use burn::nn::Initializer;
use burn::prelude::{Backend, Tensor};
use tracing::debug;

/// Number of VGG stages.
pub const VGG_NUM_STAGES: usize = 5;

/// Per-stage width multipliers of the base width.
pub const VGG_WIDTH_FACTORS: [usize; VGG_NUM_STAGES] = [1, 2, 4, 8, 8];

/// Total downsampling of the VGG backbone.
pub const VGG_REDUCTION: usize = 32;

/// High-level VGG builder configuration.
#[derive(Config, Debug)]
pub struct VggConfig {
    /// Input binding.
    pub input: InputConfig,

    /// Number of convs in each of stages 3-5.
    #[config(default = "3")]
    pub repetition: usize,

    /// Append the ``fc6 / fc7 / fc8`` head.
    #[config(default = "false")]
    pub include_top: bool,

    /// Number of classes of the head.
    #[config(default = "1000")]
    pub num_classes: usize,

    /// Use a bias on conv layers.
    #[config(default = "false")]
    pub use_bias: bool,

    /// Activation of the conv stages; the hidden head layers use ReLU.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,

    /// Wrap the network in a named [`crate::models::classifier::Classifier`].
    #[config(default = "false")]
    pub create_model: bool,

    /// Classifier name.
    #[config(default = "DEFAULT_MODEL_NAME.to_string()")]
    pub name_model: String,

    /// Width of the first stage.
    #[config(default = "64")]
    pub base_width: usize,

    /// Width of the hidden head layers.
    #[config(default = "4096")]
    pub fc_width: usize,

    /// Normalization config; resized per layer.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// Conv kernel initializer.
    #[config(default = "HE_INITIALIZER")]
    pub kernel_initializer: Initializer,
}

impl VggConfig {
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

    /// Output width of each stage.
    pub fn stage_widths(&self) -> [usize; VGG_NUM_STAGES] {
        VGG_WIDTH_FACTORS.map(|f| f * self.base_width)
    }

    /// Number of convs in each stage.
    pub fn stage_depths(&self) -> [usize; VGG_NUM_STAGES] {
        [2, 2, self.repetition, self.repetition, self.repetition]
    }

    /// Check the config.
    pub fn try_validate(&self) -> Result<(), ZooError> {
        expect_positive("repetition", self.repetition)?;
        if self.base_width == 0 {
            return Err(ZooError::invalid_config("base_width must be positive"));
        }
        if self.include_top && (self.num_classes == 0 || self.fc_width == 0) {
            return Err(ZooError::invalid_config(
                "num_classes and fc_width must be positive",
            ));
        }
        Ok(())
    }

    /// Convert to a [`VggStructureConfig`].
    ///
    /// # Arguments
    ///
    /// - `in_channels`: the number of input image channels.
    /// - `resolution`: the input ``[height, width]``.
    pub fn to_structure(
        &self,
        in_channels: usize,
        resolution: [usize; 2],
    ) -> Result<VggStructureConfig, ZooError> {
        self.try_validate()?;

        let too_small = || {
            ZooError::invalid_config(format!(
                "VGG input resolution must be at least {VGG_REDUCTION}x{VGG_REDUCTION}, got {resolution:?}"
            ))
        };

        let conv = self.conv_policy();
        let mut channels = in_channels;
        let mut current = resolution;
        let mut stages = Vec::with_capacity(VGG_NUM_STAGES);
        for (idx, (width, depth)) in self
            .stage_widths()
            .into_iter()
            .zip(self.stage_depths())
            .enumerate()
        {
            let stage = VggStageConfig::new(channels, width, depth)
                .with_conv(conv.clone())
                .with_normalization(self.normalization.clone())
                .with_activation(self.activation.clone());
            current = stage.output_resolution(current).ok_or_else(too_small)?;
            debug!(stage = idx + 1, width, depth, resolution = ?current, "vgg stage");
            stages.push(stage);
            channels = width;
        }
        let [out_height, out_width] = current;

        let head = if self.include_top {
            Some(
                FlattenHeadConfig::new(
                    channels * out_height * out_width,
                    vec![self.fc_width, self.fc_width],
                    self.num_classes,
                ),
            )
        } else {
            None
        };

        Ok(VggStructureConfig { stages, head })
    }

    /// Initialize a [`Vgg`] network.
    #[tracing::instrument(level = "debug", skip_all, fields(name = %self.name_model))]
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<Vgg<B>, ZooError> {
        let input = self.input.resolve()?;
        Ok(self
            .to_structure(input.channels(), input.resolution())?
            .init(device))
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

/// [`Vgg`] Structure Config.
#[derive(Config, Debug)]
pub struct VggStructureConfig {
    /// Conv stages.
    pub stages: Vec<VggStageConfig>,

    /// Optional flatten head.
    pub head: Option<FlattenHeadConfig>,
}

impl VggStructureConfig {
    /// Initialize a [`Vgg`] network.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Vgg<B> {
        Vgg {
            stages: self
                .stages
                .into_iter()
                .map(|stage| stage.init(device))
                .collect(),
            head: self.head.map(|head| head.init(device)),
        }
    }
}

/// VGG network.
#[derive(Module, Debug)]
pub struct Vgg<B: Backend> {
    /// Conv stages.
    pub stages: Vec<VggStage<B>>,

    /// Classification head.
    pub head: Option<FlattenHead<B>>,
}

impl<B: Backend> Vgg<B> {
    /// Output width of each stage.
    pub fn stage_widths(&self) -> Vec<usize> {
        self.stages.iter().map(|s| s.out_channels()).collect()
    }

    /// Width of the backbone feature map.
    pub fn out_channels(&self) -> usize {
        self.stages[self.stages.len() - 1].out_channels()
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
        self.stages
            .iter()
            .fold(input, |x, stage| stage.forward(x))
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
    use burn::backend::NdArray;

    fn small_config() -> VggConfig {
        VggConfig::new([1, 3, 64, 32].into())
            .with_base_width(2)
            .with_fc_width(8)
    }

    #[test]
    fn test_structure() {
        let structure = small_config().to_structure(3, [64, 32]).unwrap();
        assert_eq!(
            structure
                .stages
                .iter()
                .map(|s| (s.out_channels, s.num_convs))
                .collect::<Vec<_>>(),
            vec![(2, 2), (4, 2), (8, 3), (16, 3), (16, 3)]
        );
        assert!(structure.head.is_none());

        let structure = small_config()
            .with_repetition(4)
            .with_include_top(true)
            .with_num_classes(10)
            .to_structure(3, [64, 32])
            .unwrap();
        assert_eq!(structure.stages[4].num_convs, 4);

        let head = structure.head.unwrap();
        assert_eq!(head.in_features, 16 * 2 * 1);
        assert_eq!(head.hidden, vec![8, 8]);
        assert_eq!(head.num_classes, 10);
        assert!(matches!(head.act, ActivationConfig::Relu));
    }

    #[test]
    fn test_dense_layers_keep_relu() {
        let structure = small_config()
            .with_activation(ActivationConfig::Relu6)
            .with_include_top(true)
            .to_structure(3, [64, 32])
            .unwrap();

        assert!(matches!(structure.stages[0].activation, ActivationConfig::Relu6));
        assert!(matches!(
            structure.head.unwrap().act,
            ActivationConfig::Relu
        ));
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            small_config().with_repetition(0).to_structure(3, [64, 64]).err(),
            Some(ZooError::invalid_repetition("repetition", 0))
        );
        assert!(matches!(
            small_config().to_structure(3, [16, 64]),
            Err(ZooError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: Vgg<B> = small_config()
            .with_include_top(true)
            .with_num_classes(3)
            .try_init(&device)
            .unwrap();
        assert_eq!(model.stage_widths(), vec![2, 4, 8, 16, 16]);
        assert_eq!(model.num_classes(), Some(3));

        let input = Tensor::ones([2, 3, 64, 32], &device);
        assert_eq!(model.forward_features(input.clone()).dims(), [2, 16, 2, 1]);
        assert_eq!(model.forward(input).dims(), vec![2, 3]);
    }
}
