//! # `MobileNetV2`

pub mod inverted_residual;
pub mod mobilenetv2_model;
pub mod prefabs;
pub mod util;

pub use mobilenetv2_model::{MobileNetV2, MobileNetV2Config, MobileNetV2StructureConfig};
