//! # `ResNetV1`
//!
//! Residual networks in two block families, selected by [`ResNetBlockType`]:
//! * [`ResNetBlockType::WithPointwise`] - bottleneck [`pointwise::PointwiseBlock`]s.
//! * [`ResNetBlockType::WithoutPointwise`] - pre-activation [`preact::PreActBlock`]s.

pub mod block_type;
pub mod layer_block;
pub mod pointwise;
pub mod preact;
pub mod prefabs;
pub mod residual_block;
pub mod resnet_model;
pub mod stem;
pub mod util;

pub use block_type::ResNetBlockType;
pub use resnet_model::{ResNetV1, ResNetV1Config, ResNetV1StructureConfig};
