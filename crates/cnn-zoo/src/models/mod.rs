//! # Model Families
//!
//! Each family provides a high-level `Config` (the builder options),
//! a structure config (the resolved topology), and the network `Module`.

pub mod classifier;
pub mod common;
pub mod densenet;
pub mod mobilenetv2;
pub mod resnet;
pub mod vgg;

/// Default name of built classifiers.
pub const DEFAULT_MODEL_NAME: &str = "MakiClassificator";

/// Default prefab input shape: ``[batch, channels, height, width]``.
pub const DEFAULT_INPUT_SHAPE: [usize; 4] = [1, 3, 224, 224];
