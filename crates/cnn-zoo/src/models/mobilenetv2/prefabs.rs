//! # `MobileNetV2` Prefabs
//!
//! All prefabs use `Relu6`, no conv bias, and expansion ``6``.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::models::DEFAULT_INPUT_SHAPE;
use crate::models::mobilenetv2::mobilenetv2_model::MobileNetV2Config;
use crate::prefabs::{PreFabConfig, StaticPreFabConfig};

/// Static builder for [`MobileNetV2PreFabConfig`].
pub type StaticMobileNetV2PreFabConfig = StaticPreFabConfig<MobileNetV2Config>;

/// A [`MobileNetV2Config`] Well-Known Pre-Fab.
pub type MobileNetV2PreFabConfig = PreFabConfig<MobileNetV2Config>;

fn mobilenet_v2_prefab(
    alpha: f64,
    name: &str,
) -> MobileNetV2Config {
    MobileNetV2Config::new(DEFAULT_INPUT_SHAPE.into())
        .with_alpha(alpha)
        .with_expansion(6)
        .with_use_bias(false)
        .with_activation(ActivationConfig::Relu6)
        .with_name_model(name.to_string())
}

/// `MobileNetV2` with ``alpha = 1.0``.
pub static MOBILENET_V2_1_0: StaticMobileNetV2PreFabConfig = StaticPreFabConfig {
    name: "mobilenet_v2_1_0",
    description: "MobileNetV2, width multiplier 1.0",
    builder: || mobilenet_v2_prefab(1.0, "MobileNetV2_1_0"),
};

/// `MobileNetV2` with ``alpha = 1.4``.
pub static MOBILENET_V2_1_4: StaticMobileNetV2PreFabConfig = StaticPreFabConfig {
    name: "mobilenet_v2_1_4",
    description: "MobileNetV2, width multiplier 1.4",
    builder: || mobilenet_v2_prefab(1.4, "MobileNetV2_1_4"),
};

/// `MobileNetV2` with ``alpha = 0.75``.
pub static MOBILENET_V2_0_75: StaticMobileNetV2PreFabConfig = StaticPreFabConfig {
    name: "mobilenet_v2_0_75",
    description: "MobileNetV2, width multiplier 0.75",
    builder: || mobilenet_v2_prefab(0.75, "MobileNetV2_0_75"),
};

/// `MobileNetV2` with ``alpha = 1.3``.
pub static MOBILENET_V2_1_3: StaticMobileNetV2PreFabConfig = StaticPreFabConfig {
    name: "mobilenet_v2_1_3",
    description: "MobileNetV2, width multiplier 1.3",
    builder: || mobilenet_v2_prefab(1.3, "MobileNetV2_1_3"),
};

/// All `MobileNetV2` prefabs.
pub static MOBILENET_V2_PREFABS: [&StaticMobileNetV2PreFabConfig; 4] = [
    &MOBILENET_V2_1_0,
    &MOBILENET_V2_1_4,
    &MOBILENET_V2_0_75,
    &MOBILENET_V2_1_3,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefabs() {
        for prefab in MOBILENET_V2_PREFABS {
            let config = prefab.new_config();
            assert!(!config.use_bias);
            assert_eq!(config.expansion, 6);
            assert!(matches!(config.activation, ActivationConfig::Relu6));
            assert_eq!(config.input.input_shape, Some(DEFAULT_INPUT_SHAPE));
        }

        assert_eq!(MOBILENET_V2_1_0.new_config().name_model, "MobileNetV2_1_0");
        assert_eq!(MOBILENET_V2_0_75.new_config().name_model, "MobileNetV2_0_75");
    }

    #[test]
    fn test_last_width() {
        // 1280 * 1.3 = 1664
        assert_eq!(MOBILENET_V2_1_3.new_config().last_width(), 1664);
        assert_eq!(MOBILENET_V2_0_75.new_config().last_width(), 1280);
    }
}
