use crate::error::{Result, VersyncError};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static STRICT_SEMVER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").expect("valid semver regex"));

/// A strict `MAJOR.MINOR.PATCH` version. Ordering is lexicographic on the triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionTriple {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl VersionTriple {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses a version, accepting nothing but three dot-separated integers.
    ///
    /// Pre-release and build metadata, a leading `v`, or a different number of
    /// components are all rejected with [`VersyncError::InvalidFormat`].
    pub fn parse(input: &str) -> Result<Self> {
        let caps = STRICT_SEMVER
            .captures(input.trim())
            .ok_or_else(|| VersyncError::InvalidFormat(input.to_string()))?;

        let component = |idx: usize| -> Result<u64> {
            caps[idx]
                .parse::<u64>()
                .map_err(|_| VersyncError::InvalidFormat(input.to_string()))
        };

        Ok(Self::new(component(1)?, component(2)?, component(3)?))
    }

    /// Fails with [`VersyncError::VersionOverflow`] when the bumped component
    /// would not fit in a `u64`.
    pub fn bump(&self, kind: BumpKind) -> Result<Self> {
        let overflow = || VersyncError::VersionOverflow {
            version: self.to_string(),
            kind: kind.to_string(),
        };
        let bumped = match kind {
            BumpKind::Major => Self::new(self.major.checked_add(1).ok_or_else(overflow)?, 0, 0),
            BumpKind::Minor => {
                Self::new(self.major, self.minor.checked_add(1).ok_or_else(overflow)?, 0)
            }
            BumpKind::Patch => Self::new(
                self.major,
                self.minor,
                self.patch.checked_add(1).ok_or_else(overflow)?,
            ),
        };
        Ok(bumped)
    }
}

impl fmt::Display for VersionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BumpKind {
    Major,
    Minor,
    Patch,
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BumpKind::Major => "major",
            BumpKind::Minor => "minor",
            BumpKind::Patch => "patch",
        };
        f.write_str(label)
    }
}

/// Bumps a version string, failing if it is not strict semver.
pub fn bump_version(version: &str, kind: BumpKind) -> Result<String> {
    Ok(VersionTriple::parse(version)?.bump(kind)?.to_string())
}

/// Advisory checks on a version change. Never blocks the operation.
pub fn validate_progression(old: &str, new: &str, kind: BumpKind) -> Vec<String> {
    let (Ok(old), Ok(new)) = (VersionTriple::parse(old), VersionTriple::parse(new)) else {
        return Vec::new();
    };

    let mut warnings = Vec::new();

    match kind {
        BumpKind::Major => {
            if Some(new.major) != old.major.checked_add(1) {
                warnings.push(format!(
                    "Major version jump: {} → {} (skipping versions)",
                    old.major, new.major
                ));
            }
        }
        BumpKind::Minor => {
            if new.major != old.major {
                warnings.push(format!(
                    "Major version changed during minor bump: {} → {}",
                    old.major, new.major
                ));
            } else if Some(new.minor) != old.minor.checked_add(1) {
                warnings.push(format!(
                    "Minor version jump: {} → {} (skipping versions)",
                    old.minor, new.minor
                ));
            }
        }
        BumpKind::Patch => {
            if new.major != old.major {
                warnings.push(format!(
                    "Major version changed during patch bump: {} → {}",
                    old.major, new.major
                ));
            } else if new.minor != old.minor {
                warnings.push(format!(
                    "Minor version changed during patch bump: {} → {}",
                    old.minor, new.minor
                ));
            } else if Some(new.patch) != old.patch.checked_add(1) {
                warnings.push(format!(
                    "Patch version jump: {} → {} (skipping versions)",
                    old.patch, new.patch
                ));
            }
        }
    }

    if new <= old {
        warnings.push("New version is not greater than old version".to_string());
    }

    warnings
}

/// Loose classification for display only; the strict gate is [`VersionTriple::parse`].
pub fn describe_loose(version: &str) -> Option<&'static str> {
    if VersionTriple::parse(version).is_ok() {
        return None;
    }

    match semver::Version::parse(version.trim()) {
        Ok(v) if !v.pre.is_empty() => Some("pre-release versions cannot be bumped"),
        Ok(_) => Some("build metadata is not accepted by the strict X.Y.Z format"),
        Err(_) => Some("not a semantic version"),
    }
}
