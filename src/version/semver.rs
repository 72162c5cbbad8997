//! Semantic version comparison with ordered build metadata
//!
//! Release versions carry meaningful build metadata (`v1.17.9+vmware.2-tkg.3`):
//! two releases shipping the same Kubernetes core version are told apart by it.
//! Plain semver ignores build metadata for precedence, so this module layers a
//! token-wise comparison of the metadata on top of the semantic core.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Prerelease;

use crate::version::error::VersionError;

/// A parsed version: semantic core, pre-release and tokenized build metadata.
#[derive(Debug, Clone)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Prerelease,
    /// Alternating alphanumeric and separator runs of the build metadata
    build: Vec<String>,
    raw: String,
}

impl Version {
    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Build metadata tokens, e.g. `["vmware", ".", "2", "-", "tkg", ".", "3"]`
    pub fn build_tokens(&self) -> &[String] {
        &self.build
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true if `self` ranks strictly before `other`
    pub fn less_than(&self, other: &Version) -> bool {
        self.cmp(other) == Ordering::Less
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_version(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| self.pre.cmp(&other.pre))
            .then_with(|| compare_build_metadata(&self.build, &other.build))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Hex tokens may compare equal while differing textually ("a" vs "0a"),
// so equality has to follow the ordering.
impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

/// Parse a version string, with or without a leading `v`.
///
/// The string must be a full semantic version (`major.minor.patch`), optionally
/// followed by a pre-release and build metadata.
///
/// Examples:
/// - "v1.20.1" -> core 1.20.1, no build metadata
/// - "v1.17.9+vmware.2-tkg.3" -> core 1.17.9, build `vmware.2-tkg.3`
/// - "1.20" -> error
pub fn parse_version(version: &str) -> Result<Version, VersionError> {
    let stripped = version.strip_prefix('v').unwrap_or(version);
    let parsed = semver::Version::parse(stripped).map_err(|source| VersionError::Parse {
        version: version.to_string(),
        source,
    })?;

    Ok(Version {
        major: parsed.major,
        minor: parsed.minor,
        patch: parsed.patch,
        build: build_tokens(parsed.build.as_str()),
        pre: parsed.pre,
        raw: version.to_string(),
    })
}

/// Compare two version strings. Fails if either does not parse.
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, VersionError> {
    Ok(parse_version(a)?.cmp(&parse_version(b)?))
}

/// Split build metadata into runs of alphanumeric characters and runs of
/// everything else, keeping both kinds of runs in order.
fn build_tokens(metadata: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut last_alphanumeric = None;

    for c in metadata.chars() {
        let alphanumeric = c.is_ascii_alphanumeric();
        match tokens.last_mut() {
            Some(token) if last_alphanumeric == Some(alphanumeric) => token.push(c),
            _ => tokens.push(c.to_string()),
        }
        last_alphanumeric = Some(alphanumeric);
    }

    tokens
}

/// Token-by-token comparison. A pair of tokens that both parse as base-16
/// integers is compared numerically, otherwise as strings. A sequence that is a
/// strict prefix of the other ranks first.
fn compare_build_metadata(a: &[String], b: &[String]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ordering = match (u64::from_str_radix(x, 16), u64::from_str_radix(y, 16)) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(y),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.len().cmp(&b.len())
}
