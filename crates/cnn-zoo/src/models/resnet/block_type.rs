//! # `ResNetV1` Block Type

use crate::errors::ZooError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Residual block family of a `ResNetV1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResNetBlockType {
    /// Bottleneck blocks: ``1x1 -> 3x3 -> 1x1``.
    #[default]
    WithPointwise,

    /// Pre-activation basic blocks: ``3x3 -> 3x3``.
    WithoutPointwise,
}

impl ResNetBlockType {
    /// The canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::WithPointwise => "with_pointwise",
            Self::WithoutPointwise => "without_pointwise",
        }
    }

    /// Does this block family use pointwise (1x1) bottlenecks?
    pub fn is_pointwise(&self) -> bool {
        matches!(self, Self::WithPointwise)
    }
}

impl Display for ResNetBlockType {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ResNetBlockType {
    type Err = ZooError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "with_pointwise" => Ok(Self::WithPointwise),
            "without_pointwise" => Ok(Self::WithoutPointwise),
            _ => Err(ZooError::UnknownBlockType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(
            "with_pointwise".parse::<ResNetBlockType>(),
            Ok(ResNetBlockType::WithPointwise)
        );
        assert_eq!(
            "without_pointwise".parse::<ResNetBlockType>(),
            Ok(ResNetBlockType::WithoutPointwise)
        );

        let err = "bottleneck".parse::<ResNetBlockType>().unwrap_err();
        assert_eq!(err, ZooError::UnknownBlockType("bottleneck".to_string()));
        assert!(err.to_string().starts_with("bottleneck type is not found"));
    }

    #[test]
    fn test_display() {
        for block_type in [
            ResNetBlockType::WithPointwise,
            ResNetBlockType::WithoutPointwise,
        ] {
            assert_eq!(block_type.to_string().parse(), Ok(block_type));
        }
        assert!(ResNetBlockType::default().is_pointwise());
    }
}
