// SPDX-License-Identifier: MPL-2.0
//! Request version and access level enums.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which rendition of an asset's data a request targets.
///
/// Raw values match the framework's request-options constants. Any other
/// value is rejected locally before a framework call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssetVersion {
    /// Current version with all edits applied.
    #[default]
    Current,
    /// Original highest-fidelity version.
    Original,
    /// Highest-quality version without adjustments.
    Unadjusted,
}

impl AssetVersion {
    pub fn raw(self) -> i32 {
        match self {
            AssetVersion::Current => 0,
            AssetVersion::Original => 1,
            AssetVersion::Unadjusted => 2,
        }
    }
}

impl TryFrom<i32> for AssetVersion {
    type Error = Error;

    fn try_from(raw: i32) -> Result<Self, Error> {
        match raw {
            0 => Ok(AssetVersion::Current),
            1 => Ok(AssetVersion::Original),
            2 => Ok(AssetVersion::Unadjusted),
            other => Err(Error::InvalidVersion(other)),
        }
    }
}

/// Library access level for authorization queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessLevel {
    /// May add assets but not read or modify existing ones.
    AddOnly,
    ReadWrite,
}
