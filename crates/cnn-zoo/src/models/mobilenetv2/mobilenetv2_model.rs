//! # `MobileNetV2` Core Model
//!
//! ```text,ignore
//! 3x3/2 stem -> inverted residual stages -> 1x1 last conv -> [head]
//! ```
//!
//! Every width is scaled by `alpha` and rounded with [`make_divisible`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::errors::{ZooError, expect_positive};
use crate::layers::blocks::cna::{AbstractCNA2dConfig, CNA2d, CNA2dConfig, CNA2dMeta};
use crate::layers::heads::{ClassificationHead, ClassificationHeadConfig};
use crate::models::DEFAULT_MODEL_NAME;
use crate::models::classifier::BuildOutput;
use crate::models::common::{ConvPolicy, HE_INITIALIZER, InputConfig, ModelOutput};
use crate::models::mobilenetv2::inverted_residual::{InvertedResidual, InvertedResidualConfig};
use crate::models::mobilenetv2::util::make_divisible;
use burn::config::Config;
use burn::module::Module;
use burn::nn::Initializer;
use burn::prelude::{Backend, Tensor};
use tracing::debug;

/// Channel rounding divisor.
pub const MOBILENET_DIVISOR: usize = 8;

/// Unscaled width of the stem.
pub const MOBILENET_STEM_WIDTH: usize = 32;

/// Unscaled width of the last conv.
pub const MOBILENET_LAST_WIDTH: usize = 1280;

/// One row of the inverted residual stage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvertedResidualSetting {
    /// Use the configured expansion; otherwise ``1``.
    pub expand: bool,

    /// Unscaled output width.
    pub channels: usize,

    /// Number of blocks.
    pub repeats: usize,

    /// Stride of the first block.
    pub stride: usize,
}

const fn setting(
    expand: bool,
    channels: usize,
    repeats: usize,
    stride: usize,
) -> InvertedResidualSetting {
    InvertedResidualSetting {
        expand,
        channels,
        repeats,
        stride,
    }
}

/// The ``(t, c, n, s)`` stage table.
pub const MOBILENET_V2_SETTINGS: [InvertedResidualSetting; 7] = [
    setting(false, 16, 1, 1),
    setting(true, 24, 2, 2),
    setting(true, 32, 3, 2),
    setting(true, 64, 4, 2),
    setting(true, 96, 3, 1),
    setting(true, 160, 3, 2),
    setting(true, 320, 1, 1),
];

/// High-level `MobileNetV2` builder configuration.
#[derive(Config, Debug)]
pub struct MobileNetV2Config {
    /// Input binding.
    pub input: InputConfig,

    /// Width multiplier.
    #[config(default = "1.0")]
    pub alpha: f64,

    /// Expansion factor of the inverted residual blocks.
    #[config(default = "6")]
    pub expansion: usize,

    /// Append a global-pool + linear classification head.
    #[config(default = "false")]
    pub include_top: bool,

    /// Number of classes of the head.
    #[config(default = "1000")]
    pub num_classes: usize,

    /// Use a bias on conv layers.
    #[config(default = "false")]
    pub use_bias: bool,

    /// Activation config.
    #[config(default = "ActivationConfig::Relu6")]
    pub activation: ActivationConfig,

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

impl MobileNetV2Config {
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

    /// Scale and round a width.
    pub fn scaled_width(
        &self,
        channels: usize,
    ) -> usize {
        make_divisible(channels as f64 * self.alpha, MOBILENET_DIVISOR)
    }

    /// Scale and round an inverted residual output width.
    ///
    /// The scaled width is truncated to an integer before rounding.
    pub fn block_width(
        &self,
        channels: usize,
    ) -> usize {
        make_divisible((channels as f64 * self.alpha).trunc(), MOBILENET_DIVISOR)
    }

    /// Width of the stem.
    pub fn stem_width(&self) -> usize {
        self.scaled_width(MOBILENET_STEM_WIDTH)
    }

    /// Width of the last conv; only widened for ``alpha > 1``.
    pub fn last_width(&self) -> usize {
        if self.alpha > 1.0 {
            self.scaled_width(MOBILENET_LAST_WIDTH)
        } else {
            MOBILENET_LAST_WIDTH
        }
    }

    /// Output width of each stage.
    pub fn stage_widths(&self) -> Vec<usize> {
        MOBILENET_V2_SETTINGS
            .iter()
            .map(|s| self.block_width(s.channels))
            .collect()
    }

    /// Check the config.
    pub fn try_validate(&self) -> Result<(), ZooError> {
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(ZooError::invalid_config(format!(
                "alpha must be positive, got {}",
                self.alpha
            )));
        }
        expect_positive("expansion", self.expansion)?;
        if self.include_top && self.num_classes == 0 {
            return Err(ZooError::invalid_config("num_classes must be positive"));
        }
        Ok(())
    }

    /// Convert to a [`MobileNetV2StructureConfig`].
    ///
    /// # Arguments
    ///
    /// - `in_channels`: the number of input image channels.
    pub fn to_structure(
        &self,
        in_channels: usize,
    ) -> Result<MobileNetV2StructureConfig, ZooError> {
        self.try_validate()?;

        let conv = self.conv_policy();
        let cna = AbstractCNA2dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        };

        let stem = cna.build_config(conv.same_conv([in_channels, self.stem_width()], 3, 2));

        let mut channels = self.stem_width();
        let mut stages = Vec::with_capacity(MOBILENET_V2_SETTINGS.len());
        for (idx, s) in MOBILENET_V2_SETTINGS.iter().enumerate() {
            let out_channels = self.block_width(s.channels);
            let expansion = if s.expand { self.expansion } else { 1 };
            debug!(
                stage = idx,
                expansion,
                out_channels,
                repeats = s.repeats,
                stride = s.stride,
                "mobilenetv2 stage"
            );

            let mut blocks = Vec::with_capacity(s.repeats);
            for b in 0..s.repeats {
                let block = InvertedResidualConfig::new(channels, out_channels)
                    .with_expansion(expansion)
                    .with_stride(if b == 0 { s.stride } else { 1 })
                    .with_conv(conv.clone())
                    .with_normalization(self.normalization.clone())
                    .with_activation(self.activation.clone());
                block.try_validate()?;
                blocks.push(block);
                channels = out_channels;
            }
            stages.push(blocks);
        }

        let last_conv = cna.build_config(conv.same_conv([channels, self.last_width()], 1, 1));

        let head = if self.include_top {
            Some(ClassificationHeadConfig::new(self.last_width(), self.num_classes).with_bias(true))
        } else {
            None
        };

        Ok(MobileNetV2StructureConfig {
            stem,
            stages,
            last_conv,
            head,
        })
    }

    /// Initialize a [`MobileNetV2`] network.
    #[tracing::instrument(level = "debug", skip_all, fields(name = %self.name_model))]
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<MobileNetV2<B>, ZooError> {
        let input = self.input.resolve()?;
        Ok(self.to_structure(input.channels())?.init(device))
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

/// [`MobileNetV2`] Structure Config.
#[derive(Config, Debug)]
pub struct MobileNetV2StructureConfig {
    /// ``3x3/2`` stem.
    pub stem: CNA2dConfig,

    /// Inverted residual blocks, grouped by stage.
    pub stages: Vec<Vec<InvertedResidualConfig>>,

    /// ``1x1`` last conv.
    pub last_conv: CNA2dConfig,

    /// Optional classification head.
    pub head: Option<ClassificationHeadConfig>,
}

impl MobileNetV2StructureConfig {
    /// Output width of each stage.
    pub fn stage_widths(&self) -> Vec<usize> {
        self.stages
            .iter()
            .filter_map(|stage| stage.last().map(|b| b.out_channels))
            .collect()
    }

    /// Initialize a [`MobileNetV2`] network.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> MobileNetV2<B> {
        MobileNetV2 {
            stem: self.stem.init(device),
            stages: self
                .stages
                .into_iter()
                .map(|stage| stage.into_iter().map(|b| b.init(device)).collect())
                .collect(),
            last_conv: self.last_conv.init(device),
            head: self.head.map(|head| head.init(device)),
        }
    }
}

/// `MobileNetV2` network.
#[derive(Module, Debug)]
pub struct MobileNetV2<B: Backend> {
    /// ``3x3/2`` stem.
    pub stem: CNA2d<B>,

    /// Inverted residual blocks, grouped by stage.
    pub stages: Vec<Vec<InvertedResidual<B>>>,

    /// ``1x1`` last conv.
    pub last_conv: CNA2d<B>,

    /// Classification head.
    pub head: Option<ClassificationHead<B>>,
}

impl<B: Backend> MobileNetV2<B> {
    /// Output width of each stage.
    pub fn stage_widths(&self) -> Vec<usize> {
        self.stages
            .iter()
            .filter_map(|stage| stage.last().map(|b| b.out_channels()))
            .collect()
    }

    /// Width of the backbone feature map.
    pub fn out_channels(&self) -> usize {
        self.last_conv.out_channels()
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
        let x = self.stem.forward(input);
        let x = self
            .stages
            .iter()
            .flatten()
            .fold(x, |x, block| block.forward(x));
        self.last_conv.forward(x)
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

    #[test]
    fn test_widths() {
        let config = MobileNetV2Config::new([1, 3, 224, 224].into());
        assert_eq!(config.stem_width(), 32);
        assert_eq!(config.stage_widths(), vec![16, 24, 32, 64, 96, 160, 320]);
        assert_eq!(config.last_width(), 1280);

        let config = config.with_alpha(1.4);
        assert_eq!(config.stem_width(), 48);
        assert_eq!(config.stage_widths(), vec![24, 32, 48, 88, 136, 224, 448]);
        assert_eq!(config.last_width(), 1792);

        let config = config.with_alpha(0.75);
        assert_eq!(config.stem_width(), 24);
        assert_eq!(config.stage_widths(), vec![16, 24, 24, 48, 72, 120, 240]);
        assert_eq!(config.last_width(), 1280);
    }

    #[test]
    fn test_block_widths_truncate() {
        // 16 * 0.56 = 8.96 rounds up to 16 untruncated.
        let config = MobileNetV2Config::new([1, 3, 224, 224].into()).with_alpha(0.56);
        assert_eq!(config.scaled_width(16), 16);
        assert_eq!(config.block_width(16), 8);
        assert_eq!(config.stage_widths()[0], 8);

        // The stem is not truncated: 32 * 0.56 = 17.92.
        assert_eq!(config.stem_width(), 24);
    }

    #[test]
    fn test_validation() {
        let config = MobileNetV2Config::new([1, 3, 32, 32].into());
        assert!(config.try_validate().is_ok());
        assert!(matches!(
            config.clone().with_alpha(0.0).try_validate(),
            Err(ZooError::InvalidConfig(_))
        ));
        assert_eq!(
            config.with_expansion(0).try_validate(),
            Err(ZooError::invalid_repetition("expansion", 0))
        );
    }

    #[test]
    fn test_structure() {
        let structure = MobileNetV2Config::new([1, 3, 224, 224].into())
            .to_structure(3)
            .unwrap();
        assert_eq!(structure.stem.out_channels(), 32);
        assert_eq!(
            structure.stages.iter().map(|s| s.len()).sum::<usize>(),
            17
        );
        assert_eq!(structure.stages[0][0].expansion, 1);
        assert_eq!(structure.stages[1][0].expansion, 6);
        assert_eq!(structure.stages[1][0].stride, 2);
        assert_eq!(structure.stages[1][1].stride, 1);
        assert_eq!(structure.last_conv.out_channels(), 1280);
        assert!(matches!(structure.stem.act, ActivationConfig::Relu6));
        assert!(structure.head.is_none());
    }

    #[test]
    fn test_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: MobileNetV2<B> = MobileNetV2Config::new([1, 3, 32, 32].into())
            .with_alpha(0.35)
            .with_expansion(2)
            .with_include_top(true)
            .with_num_classes(5)
            .try_init(&device)
            .unwrap();
        assert_eq!(model.stage_widths(), vec![8, 8, 16, 24, 32, 56, 112]);
        assert_eq!(model.out_channels(), 1280);
        assert_eq!(model.num_classes(), Some(5));
        assert!(model.stages[2][1].has_residual());

        let input = Tensor::ones([2, 3, 32, 32], &device);
        // 32 / 2^5 = 1
        assert_eq!(
            model.forward_features(input.clone()).dims(),
            [2, 1280, 1, 1]
        );
        assert_eq!(model.forward(input).dims(), vec![2, 5]);
    }
}
