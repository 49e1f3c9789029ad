//! # `CNA2d` - conv/norm/activation unit.
//!
//! The workhorse layer of every zoo family:
//! ``conv -> norm -> act``, with an optional hook between norm and act.
//!
//! Residual units use the hook to add their shortcut before the
//! closing activation:
//!
//! ```rust,ignore
//! let y = block.cna3.hook_forward(x, |x| x + shortcut);
//! ```

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use crate::compat::normalization_wrapper::{Normalization, NormalizationConfig};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::{Backend, Tensor};

/// Norm / activation policy of a network, without a conv.
///
/// [`AbstractCNA2dConfig::build_config`] pairs the policy with a conv,
/// sizing the norm to the conv output.
#[derive(Config, Debug)]
pub struct AbstractCNA2dConfig {
    /// Norm config; the feature count is replaced on build.
    pub norm: NormalizationConfig,

    /// Activation config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl AbstractCNA2dConfig {
    /// Pair with a conv.
    pub fn build_config(
        &self,
        conv: Conv2dConfig,
    ) -> CNA2dConfig {
        CNA2dConfig::new(conv, self.norm.clone())
            .with_act(self.act.clone())
            .match_norm_features()
    }
}

/// Channel / stride accessors shared by [`CNA2dConfig`] and [`CNA2d`].
pub trait CNA2dMeta {
    /// Input channels.
    fn in_channels(&self) -> usize;

    /// Conv groups; equal to the channel count for depthwise convs.
    fn groups(&self) -> usize;

    /// Output channels.
    fn out_channels(&self) -> usize;

    /// Conv stride, ``[height, width]``.
    fn stride(&self) -> [usize; 2];

    /// Is this a depthwise conv?
    fn is_depthwise(&self) -> bool {
        self.groups() > 1 && self.groups() == self.in_channels()
    }
}

/// [`CNA2d`] Config.
#[derive(Config, Debug)]
pub struct CNA2dConfig {
    /// Conv config.
    pub conv: Conv2dConfig,

    /// Norm config; sized to the conv output on init.
    pub norm: NormalizationConfig,

    /// Activation config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl CNA2dMeta for CNA2dConfig {
    fn in_channels(&self) -> usize {
        self.conv.channels[0]
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl CNA2dConfig {
    /// Resize the norm to the conv output channels.
    pub fn match_norm_features(self) -> Self {
        let out_channels = self.out_channels();
        let norm = self.norm.with_num_features(out_channels);
        Self { norm, ..self }
    }

    /// Initialize a [`CNA2d`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> CNA2d<B> {
        let config = self.match_norm_features();
        CNA2d {
            conv: config.conv.init(device),
            norm: config.norm.init(device),
            act: config.act.init(device),
        }
    }
}

/// ``conv -> norm -> act`` unit.
#[derive(Module, Debug)]
pub struct CNA2d<B: Backend> {
    /// Conv layer.
    pub conv: Conv2d<B>,

    /// Norm layer.
    pub norm: Normalization<B>,

    /// Activation layer.
    pub act: Activation<B>,
}

impl<B: Backend> CNA2dMeta for CNA2d<B> {
    fn in_channels(&self) -> usize {
        // Weights are ``[out, in / groups, kh, kw]``.
        self.conv.weight.shape().dims[1] * self.groups()
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl<B: Backend> CNA2d<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.hook_forward(input, |x| x)
    }

    /// Forward Pass, with `hook` applied to the norm output.
    ///
    /// ``act(hook(norm(conv(input))))``
    pub fn hook_forward<F>(
        &self,
        input: Tensor<B, 4>,
        hook: F,
    ) -> Tensor<B, 4>
    where
        F: FnOnce(Tensor<B, 4>) -> Tensor<B, 4>,
    {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch"],
            &[("in_channels", self.in_channels())]
        );

        let x = self.norm.forward(self.conv.forward(input));
        let x = self.act.forward(hook(x));

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[("batch", batch), ("out_channels", self.out_channels())]
        );
        x
    }
}
