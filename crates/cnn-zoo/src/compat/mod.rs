//! # Compat
//!
//! Wrappers and arithmetic over ``burn`` primitives.
pub mod activation_wrapper;
pub mod conv_shape;
pub mod normalization_wrapper;
