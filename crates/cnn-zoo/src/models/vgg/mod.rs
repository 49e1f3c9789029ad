//! # VGG

pub mod prefabs;
pub mod stage;
pub mod vgg_model;

pub use vgg_model::{Vgg, VggConfig, VggStructureConfig};
