//! # `DenseNet`
//!
//! Densely connected networks; each layer sees the concatenation of
//! every earlier feature map in its block.

pub mod dense_block;
pub mod densenet_model;
pub mod prefabs;
pub mod stem;
pub mod transition;

pub use densenet_model::{DenseNet, DenseNetConfig, DenseNetStructureConfig};
