//! # Builder Errors

use thiserror::Error;

/// Errors raised while validating or building a network.
///
/// Shape errors during a forward pass are not reported here;
/// they surface from the block shape contracts and from ``burn``.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ZooError {
    /// An unsupported residual block type name.
    #[error("{0} type is not found; expected one of: with_pointwise, without_pointwise")]
    UnknownBlockType(String),

    /// A repetition count that must be positive.
    #[error("{name} should be more than 0, got {value}")]
    InvalidRepetition {
        /// Name of the offending parameter.
        name: String,
        /// The rejected value.
        value: usize,
    },

    /// Neither an input shape nor an input tensor was configured.
    #[error("wrong input: one of `input_tensor` or `input_shape` is required")]
    MissingInput,

    /// Any other invalid parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No prefab with this name.
    #[error("model not found: {0}")]
    UnknownModel(String),

    /// The classifier was built without a classification head.
    #[error("model `{0}` has no classification head")]
    MissingHead(String),
}

impl ZooError {
    /// Build an [`ZooError::InvalidRepetition`].
    pub fn invalid_repetition(
        name: impl Into<String>,
        value: usize,
    ) -> Self {
        Self::InvalidRepetition {
            name: name.into(),
            value,
        }
    }

    /// Build an [`ZooError::InvalidConfig`].
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Check that a repetition count is positive.
pub fn expect_positive(
    name: &str,
    value: usize,
) -> Result<usize, ZooError> {
    if value == 0 {
        Err(ZooError::invalid_repetition(name, value))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_positive() {
        assert_eq!(expect_positive("repetition", 3), Ok(3));
        assert_eq!(
            expect_positive("repetition", 0),
            Err(ZooError::InvalidRepetition {
                name: "repetition".to_string(),
                value: 0
            })
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ZooError::UnknownBlockType("bogus".to_string()).to_string(),
            "bogus type is not found; expected one of: with_pointwise, without_pointwise"
        );
        assert_eq!(
            ZooError::invalid_repetition("repetition", 0).to_string(),
            "repetition should be more than 0, got 0"
        );
    }
}
