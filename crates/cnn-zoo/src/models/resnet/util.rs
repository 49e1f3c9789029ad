//! # `ResNetV1` Utilities

/// Output resolution of a ``SAME`` padded layer with a given stride.
///
/// # Arguments
///
/// - `input_resolution`: ``[in_height, in_width]``.
/// - `stride`: the layer stride.
///
/// # Returns
///
/// ``[ceil(in_height / stride), ceil(in_width / stride)]``
pub fn same_output_resolution(
    input_resolution: [usize; 2],
    stride: usize,
) -> [usize; 2] {
    input_resolution.map(|d| d.div_ceil(stride))
}
