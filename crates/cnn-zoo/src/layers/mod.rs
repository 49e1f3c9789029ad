//! Common modules for assembling convolutional networks in Burn.
pub mod blocks;
pub mod heads;
