//! # Convolution Shape Utilities
//!
//! Output shape arithmetic for convolution and pooling windows.

/// Predict the output size of a 1D convolution operation.
///
/// ```text
/// out_size = floor( ((in_size + 2*padding - dilation*(kernel_size-1) - 1) / stride) + 1 )
/// ```
///
/// Pooling windows follow the same arithmetic with ``dilation = 1``.
///
/// # Reference
///
/// - [conv_arithmetic diagram](https://github.com/vdumoulin/conv_arithmetic/blob/master/README.md)
///   visual explanations of these convolution parameters.
///
/// # Arguments
///
/// - `input_size`: The input dimension size, must be > 0.
/// - `kernel_size`: The kernel size, must be > 0.
/// - `stride`: The stride of the convolution, must be > 0.
/// - `padding`: The padding of the convolution, added evenly to all sides of the input.
/// - `dilation`: The dilation of the convolution, must be > 0.
///
/// # Returns
///
/// An `Option<usize>` representing the output size; or `None` for <= 0.
pub fn maybe_conv1d_output_size(
    input_size: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
) -> Option<usize> {
    assert!(input_size > 0);
    assert!(kernel_size > 0);
    assert!(stride > 0);
    assert!(dilation > 0);

    let effective_size = input_size + 2 * padding;
    let pos = effective_size + stride;
    let kernel_width = 1 + dilation * (kernel_size - 1);

    if pos < kernel_width {
        return None;
    }
    let x = (pos - kernel_width) / stride;
    if x < 1 { None } else { Some(x) }
}

/// Predict the output shape of a D convolution operation.
///
/// This is the generalization of [`maybe_conv1d_output_size`] to D dimensions.
///
/// # Returns
///
/// An `Option<[usize; D]>` representing the output shape; or `None` for <= 0.
pub fn maybe_conv_output_shape<const D: usize>(
    input_shape: [usize; D],
    kernel_shape: [usize; D],
    stride: [usize; D],
    padding: [usize; D],
    dilation: [usize; D],
) -> Option<[usize; D]> {
    let mut output_shape = input_shape;
    for i in 0..D {
        output_shape[i] = maybe_conv1d_output_size(
            input_shape[i],
            kernel_shape[i],
            stride[i],
            padding[i],
            dilation[i],
        )?;
    }
    Some(output_shape)
}

/// Symmetric padding which keeps ``out = ceil(in / stride)``
/// for odd kernels; the ``SAME`` padding of graph frameworks.
pub fn same_padding(
    kernel_size: usize,
    dilation: usize,
) -> usize {
    dilation * (kernel_size - 1) / 2
}

/// Square-kernel 2d variant of [`maybe_conv_output_shape`].
///
/// # Arguments
///
/// - `resolution`: ``[height, width]``.
///
/// # Returns
///
/// ``Some([out_height, out_width])``; or `None` when the window does not fit.
pub fn maybe_square_output_resolution(
    resolution: [usize; 2],
    kernel_size: usize,
    stride: usize,
    padding: usize,
) -> Option<[usize; 2]> {
    maybe_conv_output_shape(
        resolution,
        [kernel_size; 2],
        [stride; 2],
        [padding; 2],
        [1; 2],
    )
}
