//! # Conv Blocks
//!
//! * [`cna`] - ``Conv2d + Norm + Act``.
//! * [`conv_norm`] - ``Conv2d + Norm``.
//! * [`norm_act`] - ``Norm + Act``.
pub mod cna;
pub mod conv_norm;
pub mod norm_act;
