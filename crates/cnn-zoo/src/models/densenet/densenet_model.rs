//! # `DenseNet` Core Model
//!
//! ```text,ignore
//! stem -> (dense block -> transition) * (n - 1) -> dense block -> bn -> act -> [head]
//! ```

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::errors::{ZooError, expect_positive};
use crate::layers::blocks::norm_act::{NormAct2d, NormAct2dConfig};
use crate::layers::heads::{ClassificationHead, ClassificationHeadConfig};
use crate::models::DEFAULT_MODEL_NAME;
use crate::models::classifier::BuildOutput;
use crate::models::common::{ConvPolicy, HE_INITIALIZER, InputConfig, ModelOutput};
use crate::models::densenet::dense_block::{DenseBlock, DenseBlockConfig, DenseLayerConfig};
use crate::models::densenet::stem::{DenseNetStem, DenseNetStemConfig};
use crate::models::densenet::transition::{Transition, TransitionConfig, compressed_channels};
use burn::config::Config;
use burn::module::Module;
use burn::nn::Initializer;
use burn::prelude::{Backend, Tensor};
use tracing::debug;

/// High-level `DenseNet` builder configuration.
#[derive(Config, Debug)]
pub struct DenseNetConfig {
    /// Input binding.
    pub input: InputConfig,

    /// Layers per dense block; when empty, derived from `depth`.
    #[config(default = "vec![6, 12, 24, 16]")]
    pub nb_layers: Vec<usize>,

    /// Network depth; used when `nb_layers` is empty.
    #[config(default = "121")]
    pub depth: usize,

    /// Channels added by each dense layer.
    #[config(default = "32")]
    pub growth_rate: usize,

    /// Transition width reduction; ``compression = 1 - reduction``.
    #[config(default = "0.0")]
    pub reduction: f64,

    /// Number of dense blocks followed by a transition;
    /// used when `nb_layers` is empty.
    #[config(default = "3")]
    pub nb_blocks: usize,

    /// Keep probability of dropout layers; `None` for no dropout.
    #[config(default = "None")]
    pub dropout_p_keep: Option<f64>,

    /// Use a bias on conv layers.
    #[config(default = "false")]
    pub use_bias: bool,

    /// Insert ``1x1`` bottleneck convs into dense layers.
    #[config(default = "true")]
    pub use_bottleneck: bool,

    /// Use the ``7x7/2`` conv + pool stem, rather than one ``3x3`` conv.
    #[config(default = "true")]
    pub subsample_initial_block: bool,

    /// Activation config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,

    /// Append a global-pool + linear classification head.
    #[config(default = "false")]
    pub include_top: bool,

    /// Number of classes of the head.
    #[config(default = "1000")]
    pub num_classes: usize,

    /// Wrap the network in a named [`crate::models::classifier::Classifier`].
    #[config(default = "false")]
    pub create_model: bool,

    /// Classifier name.
    #[config(default = "DEFAULT_MODEL_NAME.to_string()")]
    pub name_model: String,

    /// Conv kernel initializer.
    #[config(default = "HE_INITIALIZER")]
    pub kernel_initializer: Initializer,

    /// Normalization config; resized per layer.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,
}

impl DenseNetConfig {
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

    /// Transition compression; ``1 - reduction``.
    pub fn compression(&self) -> f64 {
        1.0 - self.reduction
    }

    /// Dropout probability derived from `dropout_p_keep`.
    pub fn drop_prob(&self) -> Option<f64> {
        self.dropout_p_keep
            .map(|p_keep| 1.0 - p_keep)
            .filter(|&p| p > 0.0)
    }

    /// Resolve the number of layers of each dense block.
    ///
    /// With an empty `nb_layers`, every one of the ``nb_blocks + 1`` blocks gets
    /// ``(depth - 4) / 3`` layers, halved for bottleneck layers.
    pub fn layer_counts(&self) -> Result<Vec<usize>, ZooError> {
        let counts = if self.nb_layers.is_empty() {
            if self.depth < 4 {
                return Err(ZooError::invalid_config(format!(
                    "depth must be at least 4, got {}",
                    self.depth
                )));
            }
            let mut count = (self.depth - 4) / 3;
            if self.use_bottleneck {
                count /= 2;
            }
            vec![count; self.nb_blocks + 1]
        } else {
            self.nb_layers.clone()
        };

        for &count in &counts {
            expect_positive("nb_layers", count)?;
        }
        Ok(counts)
    }

    /// Check the config.
    pub fn try_validate(&self) -> Result<(), ZooError> {
        self.layer_counts()?;
        if self.growth_rate == 0 {
            return Err(ZooError::invalid_config("growth_rate must be positive"));
        }
        if !(0.0..1.0).contains(&self.reduction) {
            return Err(ZooError::invalid_config(format!(
                "reduction must be in [0, 1), got {}",
                self.reduction
            )));
        }
        if let Some(p_keep) = self.dropout_p_keep {
            if !(p_keep > 0.0 && p_keep <= 1.0) {
                return Err(ZooError::invalid_config(format!(
                    "dropout_p_keep must be in (0, 1], got {p_keep}"
                )));
            }
        }
        if self.include_top && self.num_classes == 0 {
            return Err(ZooError::invalid_config("num_classes must be positive"));
        }
        Ok(())
    }

    /// Convert to a [`DenseNetStructureConfig`].
    ///
    /// # Arguments
    ///
    /// - `in_channels`: the number of input image channels.
    pub fn to_structure(
        &self,
        in_channels: usize,
    ) -> Result<DenseNetStructureConfig, ZooError> {
        self.try_validate()?;
        let counts = self.layer_counts()?;

        let conv = self.conv_policy();
        let drop_prob = self.drop_prob();

        let stem = DenseNetStemConfig::build(
            in_channels,
            2 * self.growth_rate,
            self.subsample_initial_block,
            &conv,
            self.normalization.clone(),
            self.activation.clone(),
        );

        let mut channels = stem.out_channels();
        let mut blocks = Vec::with_capacity(counts.len());
        let mut transitions = Vec::with_capacity(counts.len() - 1);
        for (idx, &count) in counts.iter().enumerate() {
            let block = DenseBlockConfig::build(count, channels, |c| {
                DenseLayerConfig::new(c, self.growth_rate)
                    .with_use_bottleneck(self.use_bottleneck)
                    .with_drop_prob(drop_prob)
                    .with_conv(conv.clone())
                    .with_normalization(self.normalization.clone())
                    .with_activation(self.activation.clone())
            });
            let block_out = block.out_channels().unwrap_or(channels);
            debug!(
                block = idx,
                layers = count,
                in_channels = channels,
                out_channels = block_out,
                "densenet block"
            );
            channels = block_out;
            blocks.push(block);

            if idx + 1 < counts.len() {
                let out_channels = compressed_channels(channels, self.compression());
                if out_channels == 0 {
                    return Err(ZooError::invalid_config(format!(
                        "transition {idx} compresses {channels} channels to 0"
                    )));
                }
                transitions.push(
                    TransitionConfig::new(channels, out_channels)
                        .with_drop_prob(drop_prob)
                        .with_conv(conv.clone())
                        .with_normalization(self.normalization.clone())
                        .with_activation(self.activation.clone()),
                );
                channels = out_channels;
            }
        }

        let post_norm = NormAct2dConfig::new(channels)
            .with_norm(self.normalization.clone())
            .with_act(self.activation.clone());

        let head = if self.include_top {
            Some(ClassificationHeadConfig::new(channels, self.num_classes).with_bias(true))
        } else {
            None
        };

        Ok(DenseNetStructureConfig {
            stem,
            blocks,
            transitions,
            post_norm,
            head,
        })
    }

    /// Initialize a [`DenseNet`] network.
    #[tracing::instrument(level = "debug", skip_all, fields(name = %self.name_model))]
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<DenseNet<B>, ZooError> {
        let input = self.input.resolve()?;
        let structure = self.to_structure(input.channels())?;

        let resolution = input.resolution();
        match structure.output_resolution(resolution) {
            Some(out) => debug!(input = ?resolution, output = ?out, "densenet resolution"),
            None => {
                return Err(ZooError::invalid_config(format!(
                    "DenseNet input resolution {resolution:?} is too small"
                )));
            }
        }

        Ok(structure.init(device))
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

/// [`DenseNet`] Structure Config.
#[derive(Config, Debug)]
pub struct DenseNetStructureConfig {
    /// Input stem.
    pub stem: DenseNetStemConfig,

    /// Dense blocks.
    pub blocks: Vec<DenseBlockConfig>,

    /// Transitions; one fewer than `blocks`.
    pub transitions: Vec<TransitionConfig>,

    /// Closing ``bn -> act``.
    pub post_norm: NormAct2dConfig,

    /// Optional classification head.
    pub head: Option<ClassificationHeadConfig>,
}

impl DenseNetStructureConfig {
    /// Output widths of each dense block.
    pub fn stage_widths(&self) -> Vec<usize> {
        let mut channels = self.stem.out_channels();
        let mut widths = Vec::with_capacity(self.blocks.len());
        for (idx, block) in self.blocks.iter().enumerate() {
            channels = block.out_channels().unwrap_or(channels);
            widths.push(channels);
            if let Some(transition) = self.transitions.get(idx) {
                channels = transition.out_channels;
            }
        }
        widths
    }

    /// Resolution of the backbone feature map; `None` when the input is too small.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> Option<[usize; 2]> {
        self.transitions.iter().try_fold(
            self.stem.output_resolution(input_resolution)?,
            |resolution, transition| transition.output_resolution(resolution),
        )
    }

    /// Initialize a [`DenseNet`] network.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DenseNet<B> {
        DenseNet {
            stem: self.stem.init(device),
            blocks: self
                .blocks
                .into_iter()
                .map(|block| block.init(device))
                .collect(),
            transitions: self
                .transitions
                .into_iter()
                .map(|transition| transition.init(device))
                .collect(),
            post_norm: self.post_norm.init(device),
            head: self.head.map(|head| head.init(device)),
        }
    }
}

/// `DenseNet` network.
#[derive(Module, Debug)]
pub struct DenseNet<B: Backend> {
    /// Input stem.
    pub stem: DenseNetStem<B>,

    /// Dense blocks.
    pub blocks: Vec<DenseBlock<B>>,

    /// Transitions between dense blocks.
    pub transitions: Vec<Transition<B>>,

    /// Closing ``bn -> act``.
    pub post_norm: NormAct2d<B>,

    /// Classification head.
    pub head: Option<ClassificationHead<B>>,
}

impl<B: Backend> DenseNet<B> {
    /// Output widths of each dense block.
    pub fn stage_widths(&self) -> Vec<usize> {
        self.blocks.iter().map(|b| b.out_channels()).collect()
    }

    /// Width of the backbone feature map.
    pub fn out_channels(&self) -> usize {
        self.post_norm.num_features()
    }

    /// Number of head classes, if there is a head.
    pub fn num_classes(&self) -> Option<usize> {
        self.head.as_ref().map(|h| h.num_classes())
    }

    /// Backbone forward pass.
    pub fn forward_features(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let mut x = self.stem.forward(input);
        for (idx, block) in self.blocks.iter().enumerate() {
            x = block.forward(x);
            if let Some(transition) = self.transitions.get(idx) {
                x = transition.forward(x);
            }
        }
        self.post_norm.forward(x)
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

    fn small_config() -> DenseNetConfig {
        DenseNetConfig::new([1, 3, 32, 32].into())
            .with_nb_layers(vec![2, 3, 2])
            .with_growth_rate(4)
            .with_reduction(0.5)
    }

    #[test]
    fn test_layer_counts() {
        let config = DenseNetConfig::new([1, 3, 32, 32].into()).with_nb_layers(vec![]);
        // (121 - 4) / 3 = 39, halved for bottlenecks.
        assert_eq!(config.layer_counts(), Ok(vec![19; 4]));

        let config = config.with_depth(40).with_use_bottleneck(false).with_nb_blocks(2);
        assert_eq!(config.layer_counts(), Ok(vec![12; 3]));

        let config = DenseNetConfig::new([1, 3, 32, 32].into())
            .with_nb_layers(vec![])
            .with_depth(6);
        assert_eq!(
            config.layer_counts(),
            Err(ZooError::invalid_repetition("nb_layers", 0))
        );
        assert!(matches!(
            config.with_depth(2).layer_counts(),
            Err(ZooError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validation() {
        assert!(small_config().try_validate().is_ok());
        assert!(matches!(
            small_config().with_reduction(1.0).try_validate(),
            Err(ZooError::InvalidConfig(_))
        ));
        assert!(matches!(
            small_config().with_dropout_p_keep(Some(0.0)).try_validate(),
            Err(ZooError::InvalidConfig(_))
        ));
        assert!(small_config().with_dropout_p_keep(Some(1.0)).drop_prob().is_none());
        let device = Default::default();
        assert_eq!(
            small_config()
                .with_input(InputConfig::new())
                .try_init::<NdArray<f32>>(&device)
                .err(),
            Some(ZooError::MissingInput)
        );
        assert!(matches!(
            small_config()
                .with_input([1, 3, 4, 4].into())
                .try_init::<NdArray<f32>>(&device),
            Err(ZooError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_structure() {
        let structure = small_config().to_structure(3).unwrap();
        // stem 8; +2*4 = 16 -> 8; +3*4 = 20 -> 10; +2*4 = 18.
        assert_eq!(structure.stem.out_channels(), 8);
        assert_eq!(structure.stage_widths(), vec![16, 20, 18]);
        assert_eq!(
            structure
                .transitions
                .iter()
                .map(|t| t.out_channels)
                .collect::<Vec<_>>(),
            vec![8, 10]
        );
        assert_eq!(structure.post_norm.num_features, 18);
        assert!(structure.head.is_none());
        // 32 -> stem 8 -> 4 -> 2
        assert_eq!(structure.output_resolution([32, 32]), Some([2, 2]));
        assert_eq!(structure.output_resolution([4, 4]), None);
    }

    #[test]
    fn test_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: DenseNet<B> = small_config()
            .with_include_top(true)
            .with_num_classes(4)
            .try_init(&device)
            .unwrap();
        assert_eq!(model.stage_widths(), vec![16, 20, 18]);
        assert_eq!(model.out_channels(), 18);
        assert!(model.head.as_ref().unwrap().fc.bias.is_some());

        let input = Tensor::ones([2, 3, 32, 32], &device);
        // 32 -> stem 8 -> 4 -> 2.
        assert_eq!(model.forward_features(input.clone()).dims(), [2, 18, 2, 2]);
        assert_eq!(model.forward(input).dims(), vec![2, 4]);
    }

    #[test]
    fn test_plain_stem_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: DenseNet<B> = small_config()
            .with_subsample_initial_block(false)
            .with_use_bottleneck(false)
            .with_dropout_p_keep(Some(0.8))
            .try_init(&device)
            .unwrap();
        assert!(model.blocks[0].layers[0].bottleneck.is_none());
        assert!(model.blocks[0].layers[0].dropout.is_some());

        let output = model.forward(Tensor::ones([1, 3, 16, 16], &device));
        assert_eq!(output.dims(), vec![1, 18, 4, 4]);
    }
}
