use burn::backend::NdArray;
use burn::prelude::Tensor;
use cnn_zoo::errors::ZooError;
use cnn_zoo::models::classifier::BuildOutput;
use cnn_zoo::models::common::{InputConfig, InputSource};
use cnn_zoo::models::densenet::DenseNetConfig;
use cnn_zoo::models::mobilenetv2::MobileNetV2Config;
use cnn_zoo::models::resnet::{ResNetBlockType, ResNetV1Config};
use cnn_zoo::models::vgg::VggConfig;
use cnn_zoo::registry::{ZooModelConfig, lookup_prefab};

type B = NdArray<f32>;

const INPUT: [usize; 4] = [2, 3, 32, 32];

fn small_configs() -> Vec<ZooModelConfig> {
    vec![
        ResNetV1Config::new(INPUT.into())
            .with_repetition(vec![1, 1, 1])
            .with_init_filters(4)
            .with_min_reduction(4)
            .into(),
        ResNetV1Config::new(INPUT.into())
            .with_block_type(ResNetBlockType::WithoutPointwise)
            .with_factorization_first_layer(true)
            .with_repetition(vec![2, 1])
            .with_init_filters(4)
            .into(),
        VggConfig::new(INPUT.into())
            .with_repetition(1)
            .with_base_width(4)
            .with_fc_width(16)
            .into(),
        DenseNetConfig::new(INPUT.into())
            .with_nb_layers(vec![2, 2])
            .with_growth_rate(4)
            .with_reduction(0.5)
            .into(),
        MobileNetV2Config::new(INPUT.into())
            .with_alpha(0.35)
            .with_expansion(2)
            .into(),
    ]
}

#[test]
fn test_graph_outputs_have_no_head() {
    let device = Default::default();

    for config in small_configs() {
        let output: BuildOutput<B> = config.build(&device).unwrap();
        assert!(!output.is_model(), "{}", config.family());
        assert_eq!(output.input().shape, INPUT);

        let (_, network) = output.into_graph().unwrap();
        assert_eq!(network.num_classes(), None);

        let features = network
            .forward(Tensor::ones(INPUT, &device))
            .features()
            .unwrap();
        assert_eq!(features.dims()[0], 2);
        assert_eq!(features.dims()[1], network.out_channels());
    }
}

#[test]
fn test_include_top_appends_one_head() {
    let device = Default::default();

    for config in small_configs() {
        let family = config.family();
        let model = config
            .with_include_top(true)
            .with_num_classes(7)
            .with_create_model(true)
            .with_name_model(format!("small_{family}"))
            .build::<B>(&device)
            .unwrap()
            .into_model()
            .unwrap();

        assert_eq!(model.name(), format!("small_{family}"));
        assert_eq!(model.network.num_classes(), Some(7));

        let probs = model.predict(Tensor::ones(INPUT, &device)).unwrap();
        assert_eq!(probs.dims(), [2, 7], "{family}");
    }
}

#[test]
fn test_upstream_input() {
    let device = Default::default();

    let output: BuildOutput<B> = VggConfig::new(InputConfig::from_tensor([1, 1, 64, 64]))
        .with_repetition(1)
        .with_base_width(2)
        .with_include_top(true)
        .with_num_classes(3)
        .with_fc_width(8)
        .build(&device)
        .unwrap();
    assert_eq!(output.input().source, InputSource::Upstream);

    let logits = output
        .network()
        .forward(Tensor::ones([1, 1, 64, 64], &device))
        .logits()
        .unwrap();
    assert_eq!(logits.dims(), [1, 3]);
}

#[test]
fn test_documented_errors() {
    let device = Default::default();

    assert_eq!(
        "bottleneck".parse::<ResNetBlockType>().err(),
        Some(ZooError::UnknownBlockType("bottleneck".to_string()))
    );

    let err = ResNetV1Config::new(INPUT.into())
        .with_repetition(vec![2, 0])
        .build::<B>(&device)
        .err();
    assert_eq!(err, Some(ZooError::invalid_repetition("repetition", 0)));

    let err = VggConfig::new(INPUT.into())
        .with_repetition(0)
        .build::<B>(&device)
        .err();
    assert_eq!(err, Some(ZooError::invalid_repetition("repetition", 0)));

    let err = DenseNetConfig::new(InputConfig::new())
        .build::<B>(&device)
        .err();
    assert_eq!(err, Some(ZooError::MissingInput));

    assert_eq!(
        lookup_prefab("lenet").err(),
        Some(ZooError::UnknownModel("lenet".to_string()))
    );
}

#[test]
fn test_prefab_topologies() {
    let widths = |name: &str| -> Vec<usize> {
        match lookup_prefab(name).unwrap().new_config() {
            ZooModelConfig::ResNetV1(config) => config.to_structure(3).unwrap().stage_widths(),
            ZooModelConfig::Vgg(config) => config.stage_widths().to_vec(),
            ZooModelConfig::DenseNet(config) => config.to_structure(3).unwrap().stage_widths(),
            ZooModelConfig::MobileNetV2(config) => config.stage_widths(),
        }
    };

    assert_eq!(widths("resnet18"), vec![64, 128, 256, 512]);
    assert_eq!(widths("resnet101"), vec![256, 512, 1024, 2048]);
    assert_eq!(widths("vgg16"), vec![64, 128, 256, 512, 512]);
    assert_eq!(widths("densenet201"), vec![256, 512, 1792, 1920]);
    assert_eq!(
        widths("mobilenet_v2_1_0"),
        vec![16, 24, 32, 64, 96, 160, 320]
    );
}

#[test]
fn test_pointwise_widths_ignore_init_filters() {
    for init_filters in [16, 32, 64] {
        let structure = ResNetV1Config::new(INPUT.into())
            .with_block_type(ResNetBlockType::WithPointwise)
            .with_init_filters(init_filters)
            .with_repetition(vec![1, 1, 1])
            .to_structure(3)
            .unwrap();

        assert_eq!(structure.stem.out_channels(), init_filters);
        assert_eq!(
            structure.stage_widths(),
            vec![256, 512, 1024],
            "init_filters={init_filters}"
        );
    }

    let structure = ResNetV1Config::new(INPUT.into())
        .with_block_type(ResNetBlockType::WithoutPointwise)
        .with_init_filters(32)
        .with_repetition(vec![1, 1, 1])
        .to_structure(3)
        .unwrap();
    assert_eq!(structure.stage_widths(), vec![32, 64, 128]);
}

#[test]
fn test_default_model_name() {
    let device = Default::default();

    for config in small_configs() {
        assert_eq!(config.name_model(), "MakiClassificator");

        let model = config
            .with_create_model(true)
            .build::<B>(&device)
            .unwrap()
            .into_model()
            .unwrap();
        assert_eq!(model.name(), "MakiClassificator");
    }
}
