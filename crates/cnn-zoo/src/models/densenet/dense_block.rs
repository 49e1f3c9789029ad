//! # `DenseNet` Dense Block
//!
//! A [`DenseBlock`] is a sequence of [`DenseLayer`]s; each layer
//! concatenates `growth_rate` new channels onto its input.
//!
//! ```text,ignore
//! y = bn -> act -> [1x1 conv(4 * growth) -> bn -> act] -> 3x3 conv(growth) -> [dropout]
//! return cat([x, y], channels)
//! ```

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA2dConfig, CNA2d};
use crate::layers::blocks::norm_act::{NormAct2d, NormAct2dConfig};
use crate::models::common::ConvPolicy;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::nn::{Dropout, DropoutConfig};
use burn::prelude::{Backend, Tensor};

/// Bottleneck width factor of a dense layer: ``4 * growth_rate``.
pub const DENSE_BOTTLENECK_FACTOR: usize = 4;

/// [`DenseLayer`] Config.
#[derive(Config, Debug)]
pub struct DenseLayerConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Channels added by the layer.
    pub growth_rate: usize,

    /// Insert a ``1x1`` bottleneck conv.
    #[config(default = "true")]
    pub use_bottleneck: bool,

    /// Dropout probability; `None` for no dropout.
    #[config(default = "None")]
    pub drop_prob: Option<f64>,

    /// Conv bias / initializer policy.
    #[config(default = "ConvPolicy::new()")]
    pub conv: ConvPolicy,

    /// Normalization config; resized per layer.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// Activation config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl DenseLayerConfig {
    /// Output channels: ``in_channels + growth_rate``.
    pub fn out_channels(&self) -> usize {
        self.in_channels + self.growth_rate
    }

    /// Initialize a [`DenseLayer`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DenseLayer<B> {
        let inner = if self.use_bottleneck {
            DENSE_BOTTLENECK_FACTOR * self.growth_rate
        } else {
            self.in_channels
        };

        let bottleneck = if self.use_bottleneck {
            Some(
                AbstractCNA2dConfig {
                    norm: self.normalization.clone(),
                    act: self.activation.clone(),
                }
                .build_config(self.conv.same_conv([self.in_channels, inner], 1, 1))
                .init(device),
            )
        } else {
            None
        };

        DenseLayer {
            norm_act: NormAct2dConfig::new(self.in_channels)
                .with_norm(self.normalization.clone())
                .with_act(self.activation.clone())
                .init(device),
            bottleneck,
            conv: self
                .conv
                .same_conv([inner, self.growth_rate], 3, 1)
                .init(device),
            dropout: self.drop_prob.map(|p| DropoutConfig::new(p).init()),
        }
    }
}

/// `DenseNet` composite layer.
#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    /// Input ``bn -> act``.
    pub norm_act: NormAct2d<B>,

    /// Optional ``1x1 conv -> bn -> act`` bottleneck.
    pub bottleneck: Option<CNA2d<B>>,

    /// ``3x3`` conv to `growth_rate` channels.
    pub conv: Conv2d<B>,

    /// Optional dropout.
    pub dropout: Option<Dropout>,
}

impl<B: Backend> DenseLayer<B> {
    /// Input channels.
    pub fn in_channels(&self) -> usize {
        self.norm_act.num_features()
    }

    /// Channels added by the layer.
    pub fn growth_rate(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.in_channels() + self.growth_rate()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, in_channels + growth_rate, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.norm_act.forward(input.clone());
        let x = match &self.bottleneck {
            Some(bottleneck) => bottleneck.forward(x),
            None => x,
        };
        let x = self.conv.forward(x);
        let x = match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        };

        Tensor::cat(vec![input, x], 1)
    }
}

/// [`DenseBlock`] Config.
#[derive(Config, Debug)]
pub struct DenseBlockConfig {
    /// The component layers.
    pub layers: Vec<DenseLayerConfig>,
}

impl DenseBlockConfig {
    /// Build a block of `num_layers` layers.
    ///
    /// `layer` sets up each layer config from its input width.
    pub fn build<F>(
        num_layers: usize,
        in_channels: usize,
        layer: F,
    ) -> Self
    where
        F: Fn(usize) -> DenseLayerConfig,
    {
        let mut channels = in_channels;
        let layers = (0..num_layers)
            .map(|_| {
                let config = layer(channels);
                channels = config.out_channels();
                config
            })
            .collect();
        Self { layers }
    }

    /// Output channels.
    pub fn out_channels(&self) -> Option<usize> {
        self.layers.last().map(|l| l.out_channels())
    }

    /// Initialize a [`DenseBlock`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DenseBlock<B> {
        DenseBlock {
            layers: self
                .layers
                .into_iter()
                .map(|layer| layer.init(device))
                .collect(),
        }
    }
}

/// `DenseNet` dense block.
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    /// Dense layers.
    pub layers: Vec<DenseLayer<B>>,
}

impl<B: Backend> DenseBlock<B> {
    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if the block is empty.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Input channels.
    pub fn in_channels(&self) -> usize {
        self.layers[0].in_channels()
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.layers[self.layers.len() - 1].out_channels()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, height, width] = unpack_shape_contract!(
            ["batch", "in_channels", "height", "width"],
            &input,
            &["batch", "height", "width"],
            &[("in_channels", self.in_channels())]
        );

        let x = self.layers.iter().fold(input, |x, layer| layer.forward(x));

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("height", height),
                ("width", width)
            ]
        );

        x
    }
}
