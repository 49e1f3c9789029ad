//! # `DenseNet` Prefabs
//!
//! All prefabs use a ``0.5`` transition reduction, and the subsampling stem.

use crate::models::DEFAULT_INPUT_SHAPE;
use crate::models::densenet::densenet_model::DenseNetConfig;
use crate::prefabs::{PreFabConfig, StaticPreFabConfig};

/// Static builder for [`DenseNetPreFabConfig`].
pub type StaticDenseNetPreFabConfig = StaticPreFabConfig<DenseNetConfig>;

/// A [`DenseNetConfig`] Well-Known Pre-Fab.
pub type DenseNetPreFabConfig = PreFabConfig<DenseNetConfig>;

fn densenet_prefab(
    nb_layers: [usize; 4],
    growth_rate: usize,
    name: &str,
) -> DenseNetConfig {
    DenseNetConfig::new(DEFAULT_INPUT_SHAPE.into())
        .with_nb_layers(nb_layers.to_vec())
        .with_growth_rate(growth_rate)
        .with_reduction(0.5)
        .with_name_model(name.to_string())
}

/// `DenseNet121`.
pub static DENSENET121: StaticDenseNetPreFabConfig = StaticPreFabConfig {
    name: "densenet121",
    description: "DenseNet121: [6, 12, 24, 16] layers, growth 32",
    builder: || densenet_prefab([6, 12, 24, 16], 32, "DenseNet121"),
};

/// `DenseNet161`.
pub static DENSENET161: StaticDenseNetPreFabConfig = StaticPreFabConfig {
    name: "densenet161",
    description: "DenseNet161: [6, 12, 36, 24] layers, growth 48",
    builder: || densenet_prefab([6, 12, 36, 24], 48, "DenseNet161"),
};

/// `DenseNet169`.
pub static DENSENET169: StaticDenseNetPreFabConfig = StaticPreFabConfig {
    name: "densenet169",
    description: "DenseNet169: [6, 12, 32, 32] layers, growth 32",
    builder: || densenet_prefab([6, 12, 32, 32], 32, "DenseNet169"),
};

/// `DenseNet201`.
pub static DENSENET201: StaticDenseNetPreFabConfig = StaticPreFabConfig {
    name: "densenet201",
    description: "DenseNet201: [6, 12, 48, 32] layers, growth 32",
    builder: || densenet_prefab([6, 12, 48, 32], 32, "DenseNet201"),
};

/// `DenseNet264`.
pub static DENSENET264: StaticDenseNetPreFabConfig = StaticPreFabConfig {
    name: "densenet264",
    description: "DenseNet264: [6, 12, 64, 48] layers, growth 32",
    builder: || densenet_prefab([6, 12, 64, 48], 32, "DenseNet264"),
};

/// All `DenseNet` prefabs.
pub static DENSENET_PREFABS: [&StaticDenseNetPreFabConfig; 5] = [
    &DENSENET121,
    &DENSENET161,
    &DENSENET169,
    &DENSENET201,
    &DENSENET264,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_densenet121() {
        let config = DENSENET121.new_config();
        assert_eq!(config.growth_rate, 32);
        assert_eq!(config.compression(), 0.5);

        let structure = config.to_structure(3).unwrap();
        // 64 +6*32 = 256 -> 128 +12*32 = 512 -> 256 +24*32 = 1024 -> 512 +16*32 = 1024
        assert_eq!(structure.stage_widths(), vec![256, 512, 1024, 1024]);
    }

    #[test]
    fn test_layer_totals() {
        // Two convs per layer, plus the stem conv, 3 transitions and the head.
        // The published DenseNet264 block table actually counts 265.
        let depth = |prefab: &StaticDenseNetPreFabConfig| {
            2 * prefab.new_config().nb_layers.iter().sum::<usize>() + 5
        };
        assert_eq!(
            DENSENET_PREFABS.iter().map(|p| depth(p)).collect::<Vec<_>>(),
            vec![121, 161, 169, 201, 265]
        );
    }

    #[test]
    fn test_densenet161_widths() {
        let structure = DENSENET161.new_config().to_structure(3).unwrap();
        assert_eq!(structure.stem.out_channels(), 96);
        assert_eq!(structure.stage_widths(), vec![384, 768, 2112, 2208]);
    }
}
