// SPDX-License-Identifier: MPL-2.0
//! Local identifiers for library objects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one asset or album within a library.
///
/// The framework hands out identifiers of the form
/// `1F2A3B4C-5D6E-7F8A-9B0C-D1E2F3A4B5C6/L0/001`. Only the UUID prefix
/// before the first `/` is stable across sessions; the suffix is a
/// framework-internal path component. Comparisons for library lookups must
/// therefore go through [`LocalIdentifier::uuid`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalIdentifier(String);

impl LocalIdentifier {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Full identifier as reported by the framework, suffix included.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The durable UUID portion: everything before the first `/`.
    pub fn uuid(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for LocalIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocalIdentifier {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for LocalIdentifier {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_strips_path_suffix() {
        let id = LocalIdentifier::new("ABCD-1234/L0/001");
        assert_eq!(id.uuid(), "ABCD-1234");
        assert_eq!(id.as_str(), "ABCD-1234/L0/001");
    }

    #[test]
    fn uuid_of_bare_identifier_is_identity() {
        let id = LocalIdentifier::new("ABCD-1234");
        assert_eq!(id.uuid(), "ABCD-1234");
    }
}
