//! # `ResNetV1` Prefabs
//!
//! Prefabs bind the [`DEFAULT_INPUT_SHAPE`]; rebind with
//! [`ResNetV1Config::with_input`].

use crate::models::DEFAULT_INPUT_SHAPE;
use crate::models::resnet::block_type::ResNetBlockType;
use crate::models::resnet::resnet_model::{
    RESNET18_BLOCKS, RESNET34_BLOCKS, RESNET50_BLOCKS, RESNET101_BLOCKS, RESNET152_BLOCKS,
    ResNetV1Config,
};
use crate::prefabs::{PreFabConfig, StaticPreFabConfig};

/// Static builder for [`ResNetV1PreFabConfig`].
pub type StaticResNetV1PreFabConfig = StaticPreFabConfig<ResNetV1Config>;

/// A [`ResNetV1Config`] Well-Known Pre-Fab.
pub type ResNetV1PreFabConfig = PreFabConfig<ResNetV1Config>;

fn resnet_v1(
    repetition: [usize; 4],
    block_type: ResNetBlockType,
    name_model: &str,
) -> ResNetV1Config {
    ResNetV1Config::new(DEFAULT_INPUT_SHAPE.into())
        .with_repetition(repetition.to_vec())
        .with_block_type(block_type)
        .with_name_model(name_model.to_string())
}

/// `ResNet18`.
pub static RESNET18: StaticResNetV1PreFabConfig = StaticPreFabConfig {
    name: "resnet18",
    description: "ResNet18: pre-activation basic blocks [2, 2, 2, 2]",
    builder: || resnet_v1(RESNET18_BLOCKS, ResNetBlockType::WithoutPointwise, "ResNet18"),
};

/// `ResNet34`.
pub static RESNET34: StaticResNetV1PreFabConfig = StaticPreFabConfig {
    name: "resnet34",
    description: "ResNet34: pre-activation basic blocks [3, 4, 6, 3]",
    builder: || resnet_v1(RESNET34_BLOCKS, ResNetBlockType::WithoutPointwise, "ResNet34"),
};

/// `ResNet50`.
pub static RESNET50: StaticResNetV1PreFabConfig = StaticPreFabConfig {
    name: "resnet50",
    description: "ResNet50: bottleneck blocks [3, 4, 6, 3]",
    builder: || resnet_v1(RESNET50_BLOCKS, ResNetBlockType::WithPointwise, "ResNet50"),
};

/// `ResNet101`.
pub static RESNET101: StaticResNetV1PreFabConfig = StaticPreFabConfig {
    name: "resnet101",
    description: "ResNet101: bottleneck blocks [3, 4, 23, 3]",
    builder: || resnet_v1(RESNET101_BLOCKS, ResNetBlockType::WithPointwise, "ResNet101"),
};

/// `ResNet152`.
pub static RESNET152: StaticResNetV1PreFabConfig = StaticPreFabConfig {
    name: "resnet152",
    description: "ResNet152: bottleneck blocks [3, 8, 36, 3]",
    builder: || resnet_v1(RESNET152_BLOCKS, ResNetBlockType::WithPointwise, "ResNet152"),
};

/// All `ResNetV1` prefabs.
pub static RESNET_V1_PREFABS: [&StaticResNetV1PreFabConfig; 5] =
    [&RESNET18, &RESNET34, &RESNET50, &RESNET101, &RESNET152];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefabs() {
        let config = RESNET18.new_config();
        assert_eq!(config.repetition, vec![2, 2, 2, 2]);
        assert_eq!(config.block_type, ResNetBlockType::WithoutPointwise);
        assert_eq!(config.name_model, "ResNet18");
        assert_eq!(config.input.input_shape, Some(DEFAULT_INPUT_SHAPE));

        let config = RESNET50.new_config();
        assert_eq!(config.repetition, vec![3, 4, 6, 3]);
        assert_eq!(config.block_type, ResNetBlockType::WithPointwise);

        let structure = RESNET50.new_config().to_structure(3).unwrap();
        assert_eq!(structure.stage_widths(), vec![256, 512, 1024, 2048]);

        let structure = RESNET34.new_config().to_structure(3).unwrap();
        assert_eq!(structure.stage_widths(), vec![64, 128, 256, 512]);

        for prefab in RESNET_V1_PREFABS {
            assert!(prefab.name.starts_with("resnet"));
            assert!(prefab.new_config().try_validate().is_ok());
        }
    }
}
