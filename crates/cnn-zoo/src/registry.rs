//! # Prefab Model Registry
//!
//! [`ZooModelConfig`] unifies the family configs, and [`PREFAB_MODELS`]
//! lists every well-known prefab under one config type.
//!
//! ```rust,ignore
//! let prefab = lookup_prefab("resnet50")?;
//! let output = prefab
//!     .new_config()
//!     .with_include_top(true)
//!     .build::<B>(&device)?;
//! ```

use crate::errors::ZooError;
use crate::models::classifier::{BuildOutput, ZooNetwork};
use crate::models::common::InputConfig;
use crate::models::densenet::DenseNetConfig;
use crate::models::densenet::prefabs::DENSENET_PREFABS;
use crate::models::mobilenetv2::MobileNetV2Config;
use crate::models::mobilenetv2::prefabs::MOBILENET_V2_PREFABS;
use crate::models::resnet::ResNetV1Config;
use crate::models::resnet::prefabs::RESNET_V1_PREFABS;
use crate::models::vgg::VggConfig;
use crate::models::vgg::prefabs::VGG_PREFABS;
use crate::prefabs::PreFabConfig;
use burn::config::Config;
use burn::prelude::Backend;
use std::sync::LazyLock;

/// Any zoo family config.
#[derive(Config, Debug)]
pub enum ZooModelConfig {
    /// A `ResNetV1` config.
    ResNetV1(ResNetV1Config),

    /// A VGG config.
    Vgg(VggConfig),

    /// A `DenseNet` config.
    DenseNet(DenseNetConfig),

    /// A `MobileNetV2` config.
    MobileNetV2(MobileNetV2Config),
}

impl From<ResNetV1Config> for ZooModelConfig {
    fn from(config: ResNetV1Config) -> Self {
        Self::ResNetV1(config)
    }
}

impl From<VggConfig> for ZooModelConfig {
    fn from(config: VggConfig) -> Self {
        Self::Vgg(config)
    }
}

impl From<DenseNetConfig> for ZooModelConfig {
    fn from(config: DenseNetConfig) -> Self {
        Self::DenseNet(config)
    }
}

impl From<MobileNetV2Config> for ZooModelConfig {
    fn from(config: MobileNetV2Config) -> Self {
        Self::MobileNetV2(config)
    }
}

/// Apply the same update to whichever family config is held.
macro_rules! update_family {
    ($self:expr, $config:ident => $update:expr) => {
        match $self {
            ZooModelConfig::ResNetV1($config) => ZooModelConfig::ResNetV1($update),
            ZooModelConfig::Vgg($config) => ZooModelConfig::Vgg($update),
            ZooModelConfig::DenseNet($config) => ZooModelConfig::DenseNet($update),
            ZooModelConfig::MobileNetV2($config) => ZooModelConfig::MobileNetV2($update),
        }
    };
}

impl ZooModelConfig {
    /// Family name.
    pub fn family(&self) -> &'static str {
        match self {
            Self::ResNetV1(_) => "resnet_v1",
            Self::Vgg(_) => "vgg",
            Self::DenseNet(_) => "densenet",
            Self::MobileNetV2(_) => "mobilenet_v2",
        }
    }

    /// The input binding.
    pub fn input(&self) -> &InputConfig {
        match self {
            Self::ResNetV1(config) => &config.input,
            Self::Vgg(config) => &config.input,
            Self::DenseNet(config) => &config.input,
            Self::MobileNetV2(config) => &config.input,
        }
    }

    /// Classifier name.
    pub fn name_model(&self) -> &str {
        match self {
            Self::ResNetV1(config) => &config.name_model,
            Self::Vgg(config) => &config.name_model,
            Self::DenseNet(config) => &config.name_model,
            Self::MobileNetV2(config) => &config.name_model,
        }
    }

    /// Rebind the input.
    pub fn with_input(
        self,
        input: InputConfig,
    ) -> Self {
        update_family!(self, config => config.with_input(input))
    }

    /// Set the head class count.
    pub fn with_num_classes(
        self,
        num_classes: usize,
    ) -> Self {
        update_family!(self, config => config.with_num_classes(num_classes))
    }

    /// Enable or disable the classification head.
    pub fn with_include_top(
        self,
        include_top: bool,
    ) -> Self {
        update_family!(self, config => config.with_include_top(include_top))
    }

    /// Select [`BuildOutput::Model`] or [`BuildOutput::Graph`].
    pub fn with_create_model(
        self,
        create_model: bool,
    ) -> Self {
        update_family!(self, config => config.with_create_model(create_model))
    }

    /// Rename the classifier.
    pub fn with_name_model(
        self,
        name_model: String,
    ) -> Self {
        update_family!(self, config => config.with_name_model(name_model))
    }

    /// Initialize the network.
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<ZooNetwork<B>, ZooError> {
        Ok(match self {
            Self::ResNetV1(config) => config.try_init::<B>(device)?.into(),
            Self::Vgg(config) => config.try_init::<B>(device)?.into(),
            Self::DenseNet(config) => config.try_init::<B>(device)?.into(),
            Self::MobileNetV2(config) => config.try_init::<B>(device)?.into(),
        })
    }

    /// Build the network, as a graph or a named classifier.
    pub fn build<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<BuildOutput<B>, ZooError> {
        match self {
            Self::ResNetV1(config) => config.build(device),
            Self::Vgg(config) => config.build(device),
            Self::DenseNet(config) => config.build(device),
            Self::MobileNetV2(config) => config.build(device),
        }
    }
}

/// A [`ZooModelConfig`] Well-Known Pre-Fab.
pub type ZooPreFabConfig = PreFabConfig<ZooModelConfig>;

/// Every prefab model, in family order.
pub static PREFAB_MODELS: LazyLock<Vec<ZooPreFabConfig>> = LazyLock::new(|| {
    let mut prefabs = Vec::new();
    prefabs.extend(
        RESNET_V1_PREFABS
            .iter()
            .map(|p| p.map_prefab(ZooModelConfig::ResNetV1)),
    );
    prefabs.extend(VGG_PREFABS.iter().map(|p| p.map_prefab(ZooModelConfig::Vgg)));
    prefabs.extend(
        DENSENET_PREFABS
            .iter()
            .map(|p| p.map_prefab(ZooModelConfig::DenseNet)),
    );
    prefabs.extend(
        MOBILENET_V2_PREFABS
            .iter()
            .map(|p| p.map_prefab(ZooModelConfig::MobileNetV2)),
    );
    prefabs
});

/// Names of every prefab model.
pub fn prefab_names() -> Vec<&'static str> {
    PREFAB_MODELS.iter().map(|p| p.name.as_str()).collect()
}

/// Find a prefab model by name.
///
/// # Errors
///
/// [`ZooError::UnknownModel`] when there is no such prefab.
pub fn lookup_prefab(name: &str) -> Result<ZooPreFabConfig, ZooError> {
    PREFAB_MODELS
        .iter()
        .find(|p| p.name == name)
        .cloned()
        .ok_or_else(|| ZooError::UnknownModel(name.to_string()))
}
