//! Resource kinds understood by the planner.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a declared resource
///
/// Each kind corresponds to exactly one resource type in the provisioning
/// engine's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Object storage bucket
    Bucket,
    /// Access role assumed by managed services
    Role,
    /// Live encoder input
    Input,
    /// Live encoder channel
    Channel,
    /// Packaging channel receiving the encoder's output
    PackagingChannel,
    /// Packaging origin endpoint serving playback
    PackagingEndpoint,
}

impl ResourceKind {
    /// Every kind, in declaration order
    pub const ALL: [ResourceKind; 6] = [
        Self::Bucket,
        Self::Role,
        Self::Input,
        Self::Channel,
        Self::PackagingChannel,
        Self::PackagingEndpoint,
    ];

    /// Resource type name in the engine's template format
    #[must_use]
    pub const fn engine_type(&self) -> &'static str {
        match self {
            Self::Bucket => "AWS::S3::Bucket",
            Self::Role => "AWS::IAM::Role",
            Self::Input => "AWS::MediaLive::Input",
            Self::Channel => "AWS::MediaLive::Channel",
            Self::PackagingChannel => "AWS::MediaPackage::Channel",
            Self::PackagingEndpoint => "AWS::MediaPackage::OriginEndpoint",
        }
    }

    /// Short name as used in declaration files
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bucket => "Bucket",
            Self::Role => "Role",
            Self::Input => "Input",
            Self::Channel => "Channel",
            Self::PackagingChannel => "PackagingChannel",
            Self::PackagingEndpoint => "PackagingEndpoint",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s || k.engine_type() == s)
            .ok_or_else(|| CoreError::UnknownKind {
                kind: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Bucket".parse::<ResourceKind>().unwrap(), ResourceKind::Bucket);
        assert_eq!(
            "AWS::MediaPackage::OriginEndpoint".parse::<ResourceKind>().unwrap(),
            ResourceKind::PackagingEndpoint
        );
        assert!("Queue".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.name().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_engine_types_distinct() {
        let mut types: Vec<_> = ResourceKind::ALL.iter().map(|k| k.engine_type()).collect();
        types.sort_unstable();
        types.dedup();
        assert_eq!(types.len(), ResourceKind::ALL.len());
    }
}
