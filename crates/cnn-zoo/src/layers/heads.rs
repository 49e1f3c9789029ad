//! # Classification Heads
//!
//! * [`ClassificationHead`] - global average pool, then a single linear layer.
//! * [`FlattenHead`] - flatten, hidden dense layers, then an output dense layer.

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::{Backend, Tensor};

/// [`ClassificationHead`] Config.
#[derive(Config, Debug)]
pub struct ClassificationHeadConfig {
    /// Number of input feature channels.
    pub in_channels: usize,

    /// Number of output classes.
    pub num_classes: usize,

    /// Use a bias on the linear layer.
    #[config(default = "true")]
    pub bias: bool,
}

impl ClassificationHeadConfig {
    /// Initialize a [`ClassificationHead`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ClassificationHead<B> {
        ClassificationHead {
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(self.in_channels, self.num_classes)
                .with_bias(self.bias)
                .init(device),
        }
    }
}

/// Global average pool + linear head.
#[derive(Module, Debug)]
pub struct ClassificationHead<B: Backend> {
    /// Global pool.
    pub pool: AdaptiveAvgPool2d,

    /// Class projection.
    pub fc: Linear<B>,
}

impl<B: Backend> ClassificationHead<B> {
    /// Number of input feature channels.
    pub fn in_channels(&self) -> usize {
        self.fc.weight.shape().dims[0]
    }

    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        self.fc.weight.shape().dims[1]
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]`` logits.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "height", "width"],
            &input,
            &["batch"],
            &[("in_channels", self.in_channels())]
        );

        let x = self.pool.forward(input);
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.fc.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes"],
            &x,
            &[("batch", batch), ("num_classes", self.num_classes())]
        );

        x
    }
}

/// [`FlattenHead`] Config.
#[derive(Config, Debug)]
pub struct FlattenHeadConfig {
    /// Flattened input width: ``channels * height * width``.
    pub in_features: usize,

    /// Widths of the hidden dense layers.
    pub hidden: Vec<usize>,

    /// Number of output classes.
    pub num_classes: usize,

    /// Activation applied after each hidden layer.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl FlattenHeadConfig {
    /// Initialize a [`FlattenHead`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> FlattenHead<B> {
        let mut width = self.in_features;
        let mut hidden = Vec::with_capacity(self.hidden.len());
        for &out in &self.hidden {
            hidden.push(LinearConfig::new(width, out).init(device));
            width = out;
        }

        FlattenHead {
            hidden,
            act: self.act.init(device),
            output: LinearConfig::new(width, self.num_classes).init(device),
        }
    }
}

/// Flatten + dense stack head.
#[derive(Module, Debug)]
pub struct FlattenHead<B: Backend> {
    /// Hidden dense layers; each followed by `act`.
    pub hidden: Vec<Linear<B>>,

    /// Hidden activation.
    pub act: Activation<B>,

    /// Output dense layer, no activation.
    pub output: Linear<B>,
}

impl<B: Backend> FlattenHead<B> {
    /// Flattened input width.
    pub fn in_features(&self) -> usize {
        match self.hidden.first() {
            Some(fc) => fc.weight.shape().dims[0],
            None => self.output.weight.shape().dims[0],
        }
    }

    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        self.output.weight.shape().dims[1]
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``,
    ///   with ``channels * height * width == in_features``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]`` logits.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let mut x: Tensor<B, 2> = input.flatten(1, 3);
        let [batch] = unpack_shape_contract!(
            ["batch", "in_features"],
            &x,
            &["batch"],
            &[("in_features", self.in_features())]
        );

        for fc in &self.hidden {
            x = self.act.forward(fc.forward(x));
        }
        let x = self.output.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes"],
            &x,
            &[("batch", batch), ("num_classes", self.num_classes())]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_classification_head() {
        type B = NdArray<f32>;
        let device = Default::default();

        let head: ClassificationHead<B> = ClassificationHeadConfig::new(16, 10).init(&device);
        assert_eq!(head.in_channels(), 16);
        assert_eq!(head.num_classes(), 10);
        assert!(head.fc.bias.is_some());

        let input = Tensor::random([3, 16, 5, 7], Distribution::Default, &device);
        let output = head.forward(input.clone());
        assert_eq!(output.dims(), [3, 10]);

        let expected = {
            let x: Tensor<B, 2> = input.mean_dim(3).mean_dim(2).flatten(1, 3);
            head.fc.forward(x)
        };
        output.to_data().assert_approx_eq::<f32>(&expected.to_data(), Default::default());
    }

    #[test]
    fn test_flatten_head() {
        type B = NdArray<f32>;
        let device = Default::default();

        let head: FlattenHead<B> = FlattenHeadConfig::new(4 * 2 * 2, vec![12, 12], 5).init(&device);
        assert_eq!(head.hidden.len(), 2);
        assert_eq!(head.in_features(), 16);
        assert_eq!(head.num_classes(), 5);

        let input = Tensor::random([2, 4, 2, 2], Distribution::Default, &device);
        let output = head.forward(input);
        assert_eq!(output.dims(), [2, 5]);
    }

    #[test]
    #[should_panic(expected = "in_features")]
    fn test_flatten_head_width_mismatch() {
        type B = NdArray<f32>;
        let device = Default::default();

        let head: FlattenHead<B> = FlattenHeadConfig::new(16, vec![4], 2).init(&device);
        let _ = head.forward(Tensor::ones([1, 4, 3, 3], &device));
    }

    #[test]
    fn test_flatten_head_no_hidden() {
        type B = NdArray<f32>;
        let device = Default::default();

        let head: FlattenHead<B> = FlattenHeadConfig::new(8, vec![], 3).init(&device);
        assert_eq!(head.in_features(), 8);

        let output = head.forward(Tensor::ones([1, 8, 1, 1], &device));
        assert_eq!(output.dims(), [1, 3]);
    }
}
