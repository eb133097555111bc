//! Native library version parsing and ordering
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// `major.minor` release of the native library
///
/// Entry points are tagged with the release that introduced them; the
/// patch level never changes the exported surface so it is not tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
}

/// Errors produced while reading a version
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("No version number found in '{0}'")]
    NotFound(String),

    #[error("Invalid version format: {0}")]
    InvalidFormat(String),
}

impl LibraryVersion {
    /// Oldest release with a C API this crate knows how to drive
    pub const FLOOR: LibraryVersion = LibraryVersion::new(2, 7);

    /// Create a new version
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse a bare `major.minor[.patch]` number
    pub fn parse(version_str: &str) -> Result<Self, VersionError> {
        let version_str = version_str.trim();
        let version_str = version_str.strip_prefix('v').unwrap_or(version_str);

        // Drop distribution suffixes such as `14.0.0-1ubuntu1`
        let numeric = version_str
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .next()
            .unwrap_or("");

        let mut parts = numeric.split('.');
        let major = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| VersionError::InvalidFormat(format!("Expected X.Y, got: {}", version_str)))?
            .parse()
            .map_err(|_| VersionError::InvalidFormat(format!("Invalid major version: {}", version_str)))?;
        let minor = match parts.next() {
            Some(p) if !p.is_empty() => p
                .parse()
                .map_err(|_| VersionError::InvalidFormat(format!("Invalid minor version: {}", p)))?,
            _ => 0,
        };

        Ok(Self::new(major, minor))
    }

    /// Extract the version from the banner returned by `clang_getClangVersion`
    ///
    /// Accepts banners such as `clang version 17.0.6 (https://...)`,
    /// `Apple clang version 15.0.0 (clang-1500.1.0.2.5)` and
    /// `Ubuntu clang version 14.0.0-1ubuntu1`.
    pub fn from_banner(banner: &str) -> Result<Self, VersionError> {
        let tail = match banner.find("version") {
            Some(pos) => &banner[pos + "version".len()..],
            None => banner,
        };

        tail.split_whitespace()
            .find(|word| word.starts_with(|c: char| c.is_ascii_digit()))
            .ok_or_else(|| VersionError::NotFound(banner.to_string()))
            .and_then(Self::parse)
    }
}

impl Default for LibraryVersion {
    fn default() -> Self {
        Self::FLOOR
    }
}

impl FromStr for LibraryVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_plain() {
        assert_eq!(LibraryVersion::parse("3.4").unwrap(), LibraryVersion::new(3, 4));
        assert_eq!(LibraryVersion::parse("17.0.6").unwrap(), LibraryVersion::new(17, 0));
        assert_eq!(LibraryVersion::parse("v2.9").unwrap(), LibraryVersion::new(2, 9));
        assert_eq!(LibraryVersion::parse("18").unwrap(), LibraryVersion::new(18, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(LibraryVersion::parse("").is_err());
        assert!(LibraryVersion::parse("clang").is_err());
    }

    #[test]
    fn test_from_banner() {
        let cases = [
            ("clang version 17.0.6 (https://github.com/llvm/llvm-project 6009708b)", (17, 0)),
            ("Apple clang version 15.0.0 (clang-1500.1.0.2.5)", (15, 0)),
            ("Ubuntu clang version 14.0.0-1ubuntu1.1", (14, 0)),
            ("clang version 2.9 (tags/RELEASE_29/final)", (2, 9)),
            ("Debian clang version 3.4.2-14 (tags/RELEASE_34/dot2-final)", (3, 4)),
        ];
        for (banner, (major, minor)) in cases {
            assert_eq!(
                LibraryVersion::from_banner(banner).unwrap(),
                LibraryVersion::new(major, minor),
                "banner: {}",
                banner
            );
        }
    }

    #[test]
    fn test_banner_without_number() {
        assert_eq!(
            LibraryVersion::from_banner("clang version unknown"),
            Err(VersionError::NotFound("clang version unknown".to_string()))
        );
    }

    #[test]
    fn test_ordering() {
        assert!(LibraryVersion::new(2, 7) < LibraryVersion::new(2, 8));
        assert!(LibraryVersion::new(2, 9) < LibraryVersion::new(3, 0));
        assert!(LibraryVersion::new(10, 0) > LibraryVersion::new(9, 9));
        assert_eq!(LibraryVersion::default(), LibraryVersion::FLOOR);
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(major in 0u32..1000, minor in 0u32..1000) {
            let version = LibraryVersion::new(major, minor);
            prop_assert_eq!(version.to_string().parse::<LibraryVersion>().unwrap(), version);
        }

        #[test]
        fn prop_ordering_is_lexicographic(a in (0u32..50, 0u32..50), b in (0u32..50, 0u32..50)) {
            let left = LibraryVersion::new(a.0, a.1);
            let right = LibraryVersion::new(b.0, b.1);
            prop_assert_eq!(left.cmp(&right), a.cmp(&b));
        }
    }
}
