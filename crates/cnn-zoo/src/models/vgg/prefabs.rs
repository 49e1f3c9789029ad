//! # VGG Prefabs

use crate::models::DEFAULT_INPUT_SHAPE;
use crate::models::vgg::vgg_model::VggConfig;
use crate::prefabs::{PreFabConfig, StaticPreFabConfig};

/// Static builder for [`VggPreFabConfig`].
pub type StaticVggPreFabConfig = StaticPreFabConfig<VggConfig>;

/// A [`VggConfig`] Well-Known Pre-Fab.
pub type VggPreFabConfig = PreFabConfig<VggConfig>;

/// `VGG16`.
pub static VGG16: StaticVggPreFabConfig = StaticPreFabConfig {
    name: "vgg16",
    description: "VGG16: 3 convs in stages 3-5",
    builder: || {
        VggConfig::new(DEFAULT_INPUT_SHAPE.into())
            .with_repetition(3)
            .with_name_model("VGG16".to_string())
    },
};

/// `VGG19`.
pub static VGG19: StaticVggPreFabConfig = StaticPreFabConfig {
    name: "vgg19",
    description: "VGG19: 4 convs in stages 3-5",
    builder: || {
        VggConfig::new(DEFAULT_INPUT_SHAPE.into())
            .with_repetition(4)
            .with_name_model("VGG19".to_string())
    },
};

/// All VGG prefabs.
pub static VGG_PREFABS: [&StaticVggPreFabConfig; 2] = [&VGG16, &VGG19];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefabs() {
        let conv_count = |config: VggConfig| config.stage_depths().iter().sum::<usize>();

        assert_eq!(conv_count(VGG16.new_config()), 13);
        assert_eq!(conv_count(VGG19.new_config()), 16);

        let structure = VGG16
            .new_config()
            .with_include_top(true)
            .to_structure(3, [224, 224])
            .unwrap();
        assert_eq!(structure.head.unwrap().in_features, 512 * 7 * 7);
    }
}
