//! # `MobileNetV2` Utilities

/// Round a scaled width to a multiple of `divisor`.
///
/// Rounds to the nearest multiple, no smaller than `divisor`,
/// and never more than 10% below `value`.
pub fn make_divisible(
    value: f64,
    divisor: usize,
) -> usize {
    let rounded = ((value + divisor as f64 / 2.0) / divisor as f64).floor() as usize * divisor;
    let rounded = rounded.max(divisor);
    if (rounded as f64) < 0.9 * value {
        rounded + divisor
    } else {
        rounded
    }
}
