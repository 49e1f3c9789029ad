#![warn(missing_docs)]
//!# cnn-zoo - Classic CNN Builders for Burn
//!
//! ## Notable Components
//!
//! * [`compat`] - wrappers over ``burn`` layers.
//!   * [`compat::activation_wrapper::Activation`] - activation layer abstraction wrapper.
//!   * [`compat::normalization_wrapper::Normalization`] - norm layer abstraction wrapper.
//!   * [`compat::conv_shape`] - conv / pool output shape arithmetic.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::blocks`] - conv/norm/act blocks.
//!   * [`layers::heads`] - classification heads.
//! * [`models`] - complete model families.
//!   * [`models::resnet`] - `ResNetV1` (bottleneck and pre-activation variants).
//!   * [`models::vgg`] - `VGG`.
//!   * [`models::densenet`] - `DenseNet`.
//!   * [`models::mobilenetv2`] - `MobileNetV2`.
//!   * [`models::classifier`] - build outputs and the named classifier wrapper.
//! * [`prefabs`] - well-known config factories.
//! * [`registry`] - lookup of prefab models by name.
//! * [`errors`] - the [`errors::ZooError`] type.

pub mod compat;
pub mod errors;
pub mod layers;
pub mod models;
pub mod prefabs;
pub mod registry;
