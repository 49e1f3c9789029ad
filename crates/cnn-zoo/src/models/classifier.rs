//! # Build Outputs and the Named Classifier
//!
//! Every family `build` returns a [`BuildOutput`]:
//! * [`BuildOutput::Graph`] - the resolved input binding and the raw network,
//! * [`BuildOutput::Model`] - a named [`Classifier`] wrapping both.

use crate::errors::ZooError;
use crate::models::common::{ModelInput, ModelOutput};
use crate::models::densenet::DenseNet;
use crate::models::mobilenetv2::MobileNetV2;
use crate::models::resnet::ResNetV1;
use crate::models::vgg::Vgg;
use burn::module::{Ignored, Module};
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::softmax;
use tracing::debug;

/// Any zoo network.
#[derive(Module, Debug)]
pub enum ZooNetwork<B: Backend> {
    /// A `ResNetV1` network.
    ResNetV1(ResNetV1<B>),

    /// A VGG network.
    Vgg(Vgg<B>),

    /// A `DenseNet` network.
    DenseNet(DenseNet<B>),

    /// A `MobileNetV2` network.
    MobileNetV2(MobileNetV2<B>),
}

impl<B: Backend> From<ResNetV1<B>> for ZooNetwork<B> {
    fn from(network: ResNetV1<B>) -> Self {
        Self::ResNetV1(network)
    }
}

impl<B: Backend> From<Vgg<B>> for ZooNetwork<B> {
    fn from(network: Vgg<B>) -> Self {
        Self::Vgg(network)
    }
}

impl<B: Backend> From<DenseNet<B>> for ZooNetwork<B> {
    fn from(network: DenseNet<B>) -> Self {
        Self::DenseNet(network)
    }
}

impl<B: Backend> From<MobileNetV2<B>> for ZooNetwork<B> {
    fn from(network: MobileNetV2<B>) -> Self {
        Self::MobileNetV2(network)
    }
}

impl<B: Backend> ZooNetwork<B> {
    /// Family name.
    pub fn family(&self) -> &'static str {
        match self {
            Self::ResNetV1(_) => "resnet_v1",
            Self::Vgg(_) => "vgg",
            Self::DenseNet(_) => "densenet",
            Self::MobileNetV2(_) => "mobilenet_v2",
        }
    }

    /// Output widths of each stage.
    pub fn stage_widths(&self) -> Vec<usize> {
        match self {
            Self::ResNetV1(net) => net.stage_widths(),
            Self::Vgg(net) => net.stage_widths(),
            Self::DenseNet(net) => net.stage_widths(),
            Self::MobileNetV2(net) => net.stage_widths(),
        }
    }

    /// Width of the backbone feature map.
    pub fn out_channels(&self) -> usize {
        match self {
            Self::ResNetV1(net) => net.out_channels(),
            Self::Vgg(net) => net.out_channels(),
            Self::DenseNet(net) => net.out_channels(),
            Self::MobileNetV2(net) => net.out_channels(),
        }
    }

    /// Number of head classes, if there is a head.
    pub fn num_classes(&self) -> Option<usize> {
        match self {
            Self::ResNetV1(net) => net.num_classes(),
            Self::Vgg(net) => net.num_classes(),
            Self::DenseNet(net) => net.num_classes(),
            Self::MobileNetV2(net) => net.num_classes(),
        }
    }

    /// Backbone forward pass.
    pub fn forward_features(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::ResNetV1(net) => net.forward_features(input),
            Self::Vgg(net) => net.forward_features(input),
            Self::DenseNet(net) => net.forward_features(input),
            Self::MobileNetV2(net) => net.forward_features(input),
        }
    }

    /// Forward pass; through the head, when there is one.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> ModelOutput<B> {
        match self {
            Self::ResNetV1(net) => net.forward(input),
            Self::Vgg(net) => net.forward(input),
            Self::DenseNet(net) => net.forward(input),
            Self::MobileNetV2(net) => net.forward(input),
        }
    }
}

/// A named classification model.
#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    /// The wrapped network.
    pub network: ZooNetwork<B>,

    /// Model name.
    pub name: Ignored<String>,

    /// Input binding the network was built for.
    pub input: Ignored<ModelInput>,
}

impl<B: Backend> Classifier<B> {
    /// Wrap a network.
    pub fn new(
        network: ZooNetwork<B>,
        input: ModelInput,
        name: &str,
    ) -> Self {
        Self {
            network,
            name: Ignored(name.to_string()),
            input: Ignored(input),
        }
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name.0
    }

    /// Input binding.
    pub fn input(&self) -> ModelInput {
        self.input.0
    }

    /// Does the network end in a classification head?
    pub fn has_head(&self) -> bool {
        self.network.num_classes().is_some()
    }

    /// Forward pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> ModelOutput<B> {
        self.network.forward(input)
    }

    /// Class probabilities.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]``, softmax over the logits.
    ///
    /// # Errors
    ///
    /// [`ZooError::MissingHead`] when the network has no head.
    pub fn predict(
        &self,
        input: Tensor<B, 4>,
    ) -> Result<Tensor<B, 2>, ZooError> {
        if !self.has_head() {
            return Err(ZooError::MissingHead(self.name().to_string()));
        }
        self.forward(input)
            .logits()
            .map(|logits| softmax(logits, 1))
            .ok_or_else(|| ZooError::MissingHead(self.name().to_string()))
    }
}

/// Output of a family `build`.
#[derive(Debug)]
pub enum BuildOutput<B: Backend> {
    /// Raw input binding / network pair.
    Graph {
        /// The resolved input binding.
        input: ModelInput,

        /// The network.
        network: ZooNetwork<B>,
    },

    /// A named classifier.
    Model(Classifier<B>),
}

impl<B: Backend> BuildOutput<B> {
    /// Assemble a build output.
    ///
    /// `create_model` selects [`BuildOutput::Model`], named `name`.
    pub fn assemble(
        network: ZooNetwork<B>,
        input: ModelInput,
        create_model: bool,
        name: &str,
    ) -> Self {
        debug!(
            family = network.family(),
            name,
            create_model,
            input_shape = ?input.shape,
            "assembled network"
        );
        if create_model {
            Self::Model(Classifier::new(network, input, name))
        } else {
            Self::Graph { input, network }
        }
    }

    /// Is this a named classifier?
    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model(_))
    }

    /// The input binding.
    pub fn input(&self) -> ModelInput {
        match self {
            Self::Graph { input, .. } => *input,
            Self::Model(model) => model.input(),
        }
    }

    /// The network.
    pub fn network(&self) -> &ZooNetwork<B> {
        match self {
            Self::Graph { network, .. } => network,
            Self::Model(model) => &model.network,
        }
    }

    /// The input / network pair, if this is a graph.
    pub fn into_graph(self) -> Option<(ModelInput, ZooNetwork<B>)> {
        match self {
            Self::Graph { input, network } => Some((input, network)),
            Self::Model(_) => None,
        }
    }

    /// The classifier, if this is a model.
    pub fn into_model(self) -> Option<Classifier<B>> {
        match self {
            Self::Model(model) => Some(model),
            Self::Graph { .. } => None,
        }
    }

    /// The network, dropping any wrapper.
    pub fn into_network(self) -> ZooNetwork<B> {
        match self {
            Self::Graph { network, .. } => network,
            Self::Model(model) => model.network,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::InputSource;
    use crate::models::resnet::{ResNetBlockType, ResNetV1Config};
    use burn::backend::NdArray;

    fn tiny_resnet() -> ResNetV1Config {
        ResNetV1Config::new([2, 3, 32, 32].into())
            .with_block_type(ResNetBlockType::WithoutPointwise)
            .with_repetition(vec![1, 1])
            .with_init_filters(4)
            .with_min_reduction(4)
            .with_num_classes(3)
    }

    #[test]
    fn test_graph_output() {
        type B = NdArray<f32>;
        let device = Default::default();

        let output: BuildOutput<B> = tiny_resnet().build(&device).unwrap();
        assert!(!output.is_model());
        assert_eq!(output.input().source, InputSource::Placeholder);
        assert_eq!(output.network().family(), "resnet_v1");

        let (input, network) = output.into_graph().unwrap();
        assert_eq!(input.shape, [2, 3, 32, 32]);
        assert_eq!(network.num_classes(), None);
        assert_eq!(network.stage_widths(), vec![4, 8]);
    }

    #[test]
    fn test_model_output() {
        type B = NdArray<f32>;
        let device = Default::default();

        let output: BuildOutput<B> = tiny_resnet()
            .with_include_top(true)
            .with_create_model(true)
            .with_name_model("tiny".to_string())
            .build(&device)
            .unwrap();
        assert!(output.is_model());

        let model = output.into_model().unwrap();
        assert_eq!(model.name(), "tiny");
        assert_eq!(model.input().shape, [2, 3, 32, 32]);
        assert!(model.has_head());

        let probs = model
            .predict(Tensor::ones([2, 3, 32, 32], &device))
            .unwrap();
        assert_eq!(probs.dims(), [2, 3]);
        probs
            .sum_dim(1)
            .to_data()
            .assert_approx_eq::<f32>(
                &Tensor::<B, 2>::ones([2, 1], &device).to_data(),
                Default::default(),
            );
    }

    #[test]
    fn test_predict_without_head() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: Classifier<B> = tiny_resnet()
            .with_create_model(true)
            .build(&device)
            .unwrap()
            .into_model()
            .unwrap();
        assert_eq!(model.name(), crate::models::DEFAULT_MODEL_NAME);
        assert_eq!(
            model
                .predict(Tensor::ones([2, 3, 32, 32], &device))
                .err(),
            Some(ZooError::MissingHead(
                crate::models::DEFAULT_MODEL_NAME.to_string()
            ))
        );

        let features = model
            .forward(Tensor::ones([2, 3, 32, 32], &device))
            .features()
            .unwrap();
        assert_eq!(features.dims(), [2, 8, 4, 4]);
    }
}
